use crate::adapters::database::DbPool;
use crate::adapters::token_store::TokenStore;
use crate::domain::push::TokenRecord;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
struct PushTokenRow {
    user_id: String,
    token: String,
    updated_at: OffsetDateTime,
}

impl From<PushTokenRow> for TokenRecord {
    fn from(row: PushTokenRow) -> Self {
        Self { user_id: row.user_id, token: row.token, updated_at: row.updated_at }
    }
}

enum Cursor {
    Start,
    After(String),
    Done,
}

#[derive(Clone, Debug)]
pub struct PushTokenRepository {
    pool: DbPool,
    page_size: i64,
}

impl PushTokenRepository {
    #[must_use]
    pub fn new(pool: DbPool, page_size: i64) -> Self {
        Self { pool, page_size: page_size.max(1) }
    }

    /// Fetches one page of tokens ordered by user id, strictly after `after` when given.
    async fn fetch_page(&self, after: Option<&str>) -> Result<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, PushTokenRow>(
            r"
            SELECT user_id, token, updated_at
            FROM push_tokens
            WHERE $1::text IS NULL OR user_id > $1
            ORDER BY user_id
            LIMIT $2
            ",
        )
        .bind(after)
        .bind(self.page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }
}

#[async_trait]
impl TokenStore for PushTokenRepository {
    fn list_all(&self) -> BoxStream<'_, Result<TokenRecord>> {
        let page_len = usize::try_from(self.page_size).unwrap_or(usize::MAX);

        // Keyset pagination on the last user id seen. The first page has no lower bound.
        stream::try_unfold(Cursor::Start, move |cursor| async move {
            let after = match cursor {
                Cursor::Start => None,
                Cursor::After(user_id) => Some(user_id),
                Cursor::Done => return Ok::<_, AppError>(None),
            };

            let page = self.fetch_page(after.as_deref()).await?;
            tracing::trace!(after = ?after, rows = page.len(), "Fetched push token page");

            let next = match page.last() {
                Some(last) if page.len() >= page_len => Cursor::After(last.user_id.clone()),
                _ => Cursor::Done,
            };
            Ok(Some((page, next)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, AppError>)))
        .try_flatten()
        .boxed()
    }

    #[tracing::instrument(level = "debug", skip(self, token), err)]
    async fn upsert(&self, user_id: &str, token: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO push_tokens (user_id, token, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET token = EXCLUDED.token, updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn remove(&self, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM push_tokens WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
