use async_trait::async_trait;
use domain::{Account, AccountId, AccountInput, DomainError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// --- Repository Errors ---

/// Coarse classification the HTTP layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError),
    #[error("No account present with id {0}")]
    NotFound(AccountId),
    #[error("No accounts present in the store")]
    Empty,
    #[error("Storage operation '{operation}' failed: {source}")]
    Storage {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Operation cancelled before completion")]
    Cancelled,
}

impl RepositoryError {
    pub fn storage(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Storage {
            operation,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Validation(_) => ErrorKind::Validation,
            RepositoryError::NotFound(_) | RepositoryError::Empty => ErrorKind::NotFound,
            RepositoryError::Storage { .. } | RepositoryError::Cancelled => ErrorKind::Storage,
        }
    }
}

// --- Request Context ---

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Per-call handle carrying cancellation and a request id for tracing.
/// Stores pass it through; only the cancellation signal is acted upon.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: u64,
    token: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            request_id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            token,
        }
    }

    /// A context that is cancelled whenever `parent` is.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self::with_token(parent.child_token())
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails fast with `Cancelled` if the token has already fired.
    pub fn ensure_active(&self) -> Result<(), RepositoryError> {
        if self.is_cancelled() {
            warn!(request_id = self.request_id, "Request cancelled before reaching the store");
            return Err(RepositoryError::Cancelled);
        }
        Ok(())
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

// --- Listing Policy ---

/// What `list_all` reports for a store holding zero accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPolicy {
    /// Fail with `RepositoryError::Empty`.
    #[default]
    NotFound,
    /// Succeed with an empty list.
    EmptyOk,
}

impl ListPolicy {
    pub fn apply(self, accounts: Vec<Account>) -> Result<Vec<Account>, RepositoryError> {
        match self {
            ListPolicy::NotFound if accounts.is_empty() => Err(RepositoryError::Empty),
            _ => Ok(accounts),
        }
    }
}

// --- Infrastructure Interface (Trait) ---

/// Storage capability consumed by request handling. Every operation takes the
/// request context first; implementations must be safe to call concurrently.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Validates `input`, allocates the next id and persists a new account.
    async fn insert(
        &self,
        ctx: &RequestContext,
        input: AccountInput,
    ) -> Result<Account, RepositoryError>;
    /// Returns every stored account, subject to the store's `ListPolicy`.
    async fn list_all(&self, ctx: &RequestContext) -> Result<Vec<Account>, RepositoryError>;
    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<Account, RepositoryError>;
    /// Replaces the name of an existing account. The id never changes.
    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        input: AccountInput,
    ) -> Result<(), RepositoryError>;
    /// Removes one account. Remaining ids are not renumbered.
    async fn delete_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<(), RepositoryError>;
}

// --- Application Service (Use Cases) ---

/// Use-case layer called by the HTTP handlers.
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, ctx, input), fields(request_id = ctx.request_id()))]
    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        input: AccountInput,
    ) -> Result<Account, RepositoryError> {
        let input = input.validate()?;
        let account = self.repo.insert(ctx, input).await?;
        info!(account = %account, "Account created");
        Ok(account)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    pub async fn list_accounts(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<Account>, RepositoryError> {
        let accounts = self.repo.list_all(ctx).await?;
        debug!(count = accounts.len(), "Accounts listed");
        Ok(accounts)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    pub async fn get_account(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<Account, RepositoryError> {
        self.repo.get_by_id(ctx, id).await
    }

    /// Renames the account and returns the stored record as re-read from the store.
    #[instrument(skip(self, ctx, input), fields(request_id = ctx.request_id()))]
    pub async fn rename_account(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        input: AccountInput,
    ) -> Result<Account, RepositoryError> {
        let input = input.validate()?;
        self.repo.update_by_id(ctx, id, input).await?;
        let account = self.repo.get_by_id(ctx, id).await?;
        info!(account = %account, "Account renamed");
        Ok(account)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    pub async fn delete_account(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<(), RepositoryError> {
        self.repo.delete_by_id(ctx, id).await?;
        info!(%id, "Account deleted");
        Ok(())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records which operations reached the store.
    #[derive(Default)]
    struct RecordingRepository {
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingRepository {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
        fn record(&self, op: &'static str) {
            self.calls.lock().unwrap().push(op);
        }
    }

    #[async_trait]
    impl AccountRepository for RecordingRepository {
        async fn insert(
            &self,
            _ctx: &RequestContext,
            input: AccountInput,
        ) -> Result<Account, RepositoryError> {
            self.record("insert");
            Ok(Account::new(AccountId::new(1), input)?)
        }
        async fn list_all(&self, _ctx: &RequestContext) -> Result<Vec<Account>, RepositoryError> {
            self.record("list_all");
            ListPolicy::NotFound.apply(Vec::new())
        }
        async fn get_by_id(
            &self,
            _ctx: &RequestContext,
            id: AccountId,
        ) -> Result<Account, RepositoryError> {
            self.record("get_by_id");
            Ok(Account {
                id,
                name: "renamed".to_string(),
            })
        }
        async fn update_by_id(
            &self,
            _ctx: &RequestContext,
            _id: AccountId,
            _input: AccountInput,
        ) -> Result<(), RepositoryError> {
            self.record("update_by_id");
            Ok(())
        }
        async fn delete_by_id(
            &self,
            _ctx: &RequestContext,
            id: AccountId,
        ) -> Result<(), RepositoryError> {
            self.record("delete_by_id");
            Err(RepositoryError::NotFound(id))
        }
    }

    fn service() -> (Arc<RecordingRepository>, AccountService) {
        let repo = Arc::new(RecordingRepository::default());
        (repo.clone(), AccountService::new(repo))
    }

    #[tokio::test]
    async fn create_with_empty_name_never_reaches_store() {
        let (repo, service) = service();
        let err = service
            .create_account(&RequestContext::new(), AccountInput::new(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn rename_updates_then_rereads() {
        let (repo, service) = service();
        let account = service
            .rename_account(&RequestContext::new(), AccountId::new(4), AccountInput::new("renamed"))
            .await
            .unwrap();
        assert_eq!(account.id, AccountId::new(4));
        assert_eq!(repo.calls(), vec!["update_by_id", "get_by_id"]);
    }

    #[tokio::test]
    async fn rename_with_empty_name_never_reaches_store() {
        let (repo, service) = service();
        let err = service
            .rename_account(&RequestContext::new(), AccountId::new(4), AccountInput::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_propagates_not_found() {
        let (_, service) = service();
        let err = service
            .delete_account(&RequestContext::new(), AccountId::new(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(id) if id == AccountId::new(-1)));
    }

    #[test]
    fn error_kinds_cover_taxonomy() {
        assert_eq!(RepositoryError::Empty.kind(), ErrorKind::NotFound);
        assert_eq!(RepositoryError::Cancelled.kind(), ErrorKind::Storage);
        assert_eq!(
            RepositoryError::storage("insert", "connection reset").kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            RepositoryError::from(DomainError::InvalidName("x".into())).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn list_policy_on_empty_store() {
        assert!(matches!(
            ListPolicy::NotFound.apply(Vec::new()),
            Err(RepositoryError::Empty)
        ));
        assert_eq!(ListPolicy::EmptyOk.apply(Vec::new()).unwrap(), Vec::new());
    }

    #[test]
    fn list_policy_passes_non_empty_through() {
        let accounts = vec![Account {
            id: AccountId::new(1),
            name: "Alice".to_string(),
        }];
        assert_eq!(ListPolicy::NotFound.apply(accounts.clone()).unwrap(), accounts);
    }

    #[test]
    fn child_context_follows_parent_cancellation() {
        let root = CancellationToken::new();
        let ctx = RequestContext::child_of(&root);
        assert!(ctx.ensure_active().is_ok());
        root.cancel();
        assert!(matches!(ctx.ensure_active(), Err(RepositoryError::Cancelled)));
    }

    #[test]
    fn request_ids_are_distinct() {
        assert_ne!(RequestContext::new().request_id(), RequestContext::new().request_id());
    }
}
