//! Sponsored message impression log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use lyceum_core::{AdEvent, ImpressionId};

use super::RepositoryError;

/// One event in the life of a sponsored message.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AdImpression {
    pub impression_id: ImpressionId,
    pub ad_id: String,
    pub user_id: String,
    pub chat_id: String,
    pub conversation_turn: i32,
    pub event: AdEvent,
    pub created_at: DateTime<Utc>,
}

impl AdImpression {
    /// A new event stamped with the current time.
    #[must_use]
    pub fn new(
        impression_id: ImpressionId,
        ad_id: impl Into<String>,
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        conversation_turn: usize,
        event: AdEvent,
    ) -> Self {
        Self {
            impression_id,
            ad_id: ad_id.into(),
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            conversation_turn: i32::try_from(conversation_turn).unwrap_or(i32::MAX),
            event,
            created_at: Utc::now(),
        }
    }
}

/// Repository for ad impression events.
pub struct AdImpressionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdImpressionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, impression), fields(impression_id = %impression.impression_id, event = %impression.event))]
    pub async fn record(&self, impression: &AdImpression) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO ad_impressions
                (impression_id, ad_id, user_id, chat_id, conversation_turn, event, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&impression.impression_id)
        .bind(&impression.ad_id)
        .bind(&impression.user_id)
        .bind(&impression.chat_id)
        .bind(impression.conversation_turn)
        .bind(impression.event)
        .bind(impression.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
