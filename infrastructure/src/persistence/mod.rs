pub mod document_repository;
pub mod id_allocator;
pub mod in_memory_repository;

// Re-export the repository types
pub use document_repository::DocumentAccountRepository;
pub use id_allocator::IdAllocator;
pub use in_memory_repository::InMemoryAccountRepository;
