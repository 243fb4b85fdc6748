//! PostgreSQL-backed URL rewrite rules.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::SanitizingRule;
use crate::domain::ports::{SanitizingRuleRepository, SanitizingRuleRepositoryError};

use super::diesel_error_mapping;
use super::models::SanitizingRuleRow;
use super::pool::DbPool;
use super::schema::url_sanitizing_rules;

/// Diesel-backed implementation of the sanitizing rule port.
#[derive(Clone)]
pub struct DieselSanitizingRuleRepository {
    pool: DbPool,
}

impl DieselSanitizingRuleRepository {
    /// Create a new repository with the given connection pool.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl From<SanitizingRuleRow> for SanitizingRule {
    fn from(row: SanitizingRuleRow) -> Self {
        Self {
            priority: row.priority,
            search: row.search,
            replace: row.replacement,
            use_podcast: row.use_podcast,
            use_episode: row.use_episode,
        }
    }
}

#[async_trait]
impl SanitizingRuleRepository for DieselSanitizingRuleRepository {
    async fn list_rules(&self) -> Result<Vec<SanitizingRule>, SanitizingRuleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(|err| {
            diesel_error_mapping::map_pool_error(err, SanitizingRuleRepositoryError::connection)
        })?;
        let rows: Vec<SanitizingRuleRow> = url_sanitizing_rules::table
            .order((url_sanitizing_rules::priority.asc(), url_sanitizing_rules::id.asc()))
            .select(SanitizingRuleRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| {
                diesel_error_mapping::map_diesel_error(
                    &err,
                    SanitizingRuleRepositoryError::query,
                    SanitizingRuleRepositoryError::connection,
                )
            })?;
        Ok(rows.into_iter().map(SanitizingRule::from).collect())
    }
}
