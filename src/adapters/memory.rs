//! Process-local token store, for development without Postgres and for tests.

use crate::adapters::token_store::TokenStore;
use crate::domain::push::TokenRecord;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    records: Arc<DashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = TokenRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.user_id.clone(), record);
        }
        store
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<TokenRecord> {
        self.records.get(user_id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn list_all(&self) -> BoxStream<'_, Result<TokenRecord>> {
        // Copied out so no shard lock is held while the consumer awaits.
        let mut snapshot: Vec<TokenRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        snapshot.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }

    async fn upsert(&self, user_id: &str, token: &str) -> Result<()> {
        self.records.insert(user_id.to_string(), TokenRecord::new(user_id, token));
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<()> {
        self.records.remove(user_id);
        Ok(())
    }
}
