// ./infrastructure/src/persistence/in_memory_repository.rs
use crate::persistence::IdAllocator;
use application::{AccountRepository, ListPolicy, RepositoryError, RequestContext};
use async_trait::async_trait;
use domain::{Account, AccountId, AccountInput};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Accounts in insertion order plus the id sequence that numbers them.
/// Both live behind the same lock so allocation and append are one step.
#[derive(Debug, Default)]
struct AccountTable {
    accounts: Vec<Account>,
    ids: IdAllocator,
}

impl AccountTable {
    fn position(&self, id: AccountId) -> Option<usize> {
        self.accounts.iter().position(|account| account.id == id)
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountRepository {
    table: Arc<Mutex<AccountTable>>,
    policy: ListPolicy,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ListPolicy) -> Self {
        Self {
            table: Arc::new(Mutex::new(AccountTable::default())),
            policy,
        }
    }

    /// Highest id handed out so far, including ids of deleted accounts.
    #[cfg(test)]
    async fn last_issued_id(&self) -> Option<AccountId> {
        self.table.lock().await.ids.last_issued()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    #[instrument(skip(self, ctx, input), fields(request_id = ctx.request_id()))]
    async fn insert(
        &self,
        ctx: &RequestContext,
        input: AccountInput,
    ) -> Result<Account, RepositoryError> {
        ctx.ensure_active()?;
        // Reject before touching the counter
        let input = input.validate()?;

        let mut table = self.table.lock().await;
        let id = table.ids.next();
        let account = Account::new(id, input)?;
        table.accounts.push(account.clone());
        debug!(%id, total = table.accounts.len(), "Inserted account into in-memory store");
        Ok(account)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    async fn list_all(&self, ctx: &RequestContext) -> Result<Vec<Account>, RepositoryError> {
        ctx.ensure_active()?;
        let accounts = self.table.lock().await.accounts.clone();
        debug!(count = accounts.len(), "Listing accounts from in-memory store");
        self.policy.apply(accounts)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<Account, RepositoryError> {
        ctx.ensure_active()?;
        let table = self.table.lock().await;
        match table.accounts.iter().find(|account| account.id == id) {
            Some(account) => Ok(account.clone()),
            None => {
                warn!(%id, "Account not found in in-memory store");
                Err(RepositoryError::NotFound(id))
            }
        }
    }

    #[instrument(skip(self, ctx, input), fields(request_id = ctx.request_id()))]
    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        input: AccountInput,
    ) -> Result<(), RepositoryError> {
        ctx.ensure_active()?;
        input.check()?;

        let mut table = self.table.lock().await;
        let Some(index) = table.position(id) else {
            warn!(%id, "Update failed: account not found in in-memory store");
            return Err(RepositoryError::NotFound(id));
        };
        table.accounts[index].rename(&input)?;
        debug!(%id, "Renamed account in in-memory store");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    async fn delete_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<(), RepositoryError> {
        ctx.ensure_active()?;

        let mut table = self.table.lock().await;
        let Some(index) = table.position(id) else {
            warn!(%id, "Delete failed: account not found in in-memory store");
            return Err(RepositoryError::NotFound(id));
        };
        // Stable removal keeps the remaining accounts in insertion order.
        table.accounts.remove(index);
        debug!(%id, remaining = table.accounts.len(), "Deleted account from in-memory store");
        Ok(())
    }
}
