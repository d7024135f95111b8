// Module declarations
pub mod factory;
pub mod persistence;

// Re-export all implementations
pub use factory::{BackendConfig, BackendType, RepositoryFactory};
pub use persistence::{DocumentAccountRepository, IdAllocator, InMemoryAccountRepository};
