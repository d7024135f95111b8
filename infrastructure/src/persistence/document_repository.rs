// ./infrastructure/src/persistence/document_repository.rs
use application::{AccountRepository, ListPolicy, RepositoryError, RequestContext};
use async_trait::async_trait;
use domain::{Account, AccountId, AccountInput};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Client, Collection, IndexModel};
use std::future::Future;
use tracing::{debug, error, info, instrument, warn};

/// Collection holding one sequence document per account collection.
pub const COUNTERS_COLLECTION: &str = "counters";

/// Store backed by a MongoDB collection. Each account is one document shaped
/// `{id, name}`; ids come from an atomic per-collection sequence kept in the
/// database, so several service instances can share one collection.
#[derive(Debug, Clone)]
pub struct DocumentAccountRepository {
    accounts: Collection<Account>,
    counters: Collection<Document>,
    sequence_key: String,
    policy: ListPolicy,
}

impl DocumentAccountRepository {
    /// Connects to `uri`, verifies the server answers, and prepares indexes.
    #[instrument(skip(uri))]
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        policy: ListPolicy,
    ) -> Result<Self, RepositoryError> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|e| storage_failure("connect", e))?;
        let client = Client::with_options(options).map_err(|e| storage_failure("connect", e))?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| storage_failure("ping", e))?;
        info!(database, collection, "Connected to document store");

        let repo = Self::with_collections(
            db.collection::<Account>(collection),
            db.collection::<Document>(COUNTERS_COLLECTION),
            policy,
        );
        repo.ensure_indexes().await?;
        Ok(repo)
    }

    /// Wraps existing collection handles without touching the server.
    pub fn with_collections(
        accounts: Collection<Account>,
        counters: Collection<Document>,
        policy: ListPolicy,
    ) -> Self {
        let sequence_key = accounts.name().to_string();
        Self {
            accounts,
            counters,
            sequence_key,
            policy,
        }
    }

    async fn ensure_indexes(&self) -> Result<(), RepositoryError> {
        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.accounts
            .create_index(unique_id, None)
            .await
            .map_err(|e| storage_failure("create_index", e))?;
        debug!(collection = %self.sequence_key, "Unique index on id ensured");
        Ok(())
    }

    /// Atomically bumps the sequence document, creating it on first use.
    async fn next_id(&self, ctx: &RequestContext) -> Result<AccountId, RepositoryError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = with_cancellation(
            ctx,
            "allocate_id",
            self.counters.find_one_and_update(
                doc! { "_id": self.sequence_key.as_str() },
                doc! { "$inc": { "seq": 1_i64 } },
                options,
            ),
        )
        .await?
        .ok_or_else(|| {
            RepositoryError::storage("allocate_id", "sequence document missing after upsert")
        })?;
        sequence_value(&counter)
    }
}

/// Races a driver call against the context's cancellation signal.
async fn with_cancellation<T, F>(
    ctx: &RequestContext,
    operation: &'static str,
    call: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = mongodb::error::Result<T>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => {
            warn!(operation, request_id = ctx.request_id(), "Document store call cancelled");
            Err(RepositoryError::Cancelled)
        }
        result = call => result.map_err(|e| storage_failure(operation, e)),
    }
}

fn storage_failure(operation: &'static str, err: mongodb::error::Error) -> RepositoryError {
    error!(operation, "Document store call failed: {}", err);
    RepositoryError::storage(operation, err)
}

fn id_filter(id: AccountId) -> Document {
    doc! { "id": id.value() }
}

fn rename_update(input: &AccountInput) -> Document {
    doc! { "$set": { "name": input.name.as_str() } }
}

/// A write that touched no document means the id does not exist.
fn require_match(affected: u64, id: AccountId) -> Result<(), RepositoryError> {
    if affected == 0 {
        warn!(%id, "Write matched no account document");
        return Err(RepositoryError::NotFound(id));
    }
    Ok(())
}

/// Reads the counter value; a sequence seeded by hand may hold an int32.
fn sequence_value(counter: &Document) -> Result<AccountId, RepositoryError> {
    match counter.get("seq") {
        Some(Bson::Int64(seq)) => Ok(AccountId::new(*seq)),
        Some(Bson::Int32(seq)) => Ok(AccountId::new(i64::from(*seq))),
        other => Err(RepositoryError::storage(
            "allocate_id",
            format!("sequence document holds an invalid value: {other:?}"),
        )),
    }
}

#[async_trait]
impl AccountRepository for DocumentAccountRepository {
    #[instrument(skip(self, ctx, input), fields(request_id = ctx.request_id()))]
    async fn insert(
        &self,
        ctx: &RequestContext,
        input: AccountInput,
    ) -> Result<Account, RepositoryError> {
        let input = input.validate()?;
        let id = self.next_id(ctx).await?;
        let account = Account::new(id, input)?;
        with_cancellation(ctx, "insert", self.accounts.insert_one(&account, None)).await?;
        debug!(%id, "Inserted account document");
        Ok(account)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    async fn list_all(&self, ctx: &RequestContext) -> Result<Vec<Account>, RepositoryError> {
        let options = FindOptions::builder().sort(doc! { "id": 1 }).build();
        // A document that fails to decode aborts the whole listing.
        let accounts = with_cancellation(ctx, "list_all", async {
            let cursor = self.accounts.find(doc! {}, options).await?;
            cursor.try_collect::<Vec<Account>>().await
        })
        .await?;
        debug!(count = accounts.len(), "Listed account documents");
        self.policy.apply(accounts)
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<Account, RepositoryError> {
        let found = with_cancellation(
            ctx,
            "get_by_id",
            self.accounts.find_one(id_filter(id), None),
        )
        .await?;
        found.ok_or_else(|| {
            warn!(%id, "Account document not found");
            RepositoryError::NotFound(id)
        })
    }

    #[instrument(skip(self, ctx, input), fields(request_id = ctx.request_id()))]
    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        input: AccountInput,
    ) -> Result<(), RepositoryError> {
        input.check()?;
        let result = with_cancellation(
            ctx,
            "update_by_id",
            self.accounts.update_one(id_filter(id), rename_update(&input), None),
        )
        .await?;
        require_match(result.matched_count, id)?;
        debug!(%id, modified = result.modified_count, "Renamed account document");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    async fn delete_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<(), RepositoryError> {
        let result = with_cancellation(
            ctx,
            "delete_by_id",
            self.accounts.delete_one(id_filter(id), None),
        )
        .await?;
        require_match(result.deleted_count, id)?;
        debug!(%id, "Deleted account document");
        Ok(())
    }
}
