//! Port for the configured URL rewrite rules.

use async_trait::async_trait;

use crate::domain::SanitizingRule;

use super::define_port_error;

define_port_error! {
    /// Errors raised by sanitizing rule adapters.
    pub enum SanitizingRuleRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "sanitizing rule repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "sanitizing rule repository query failed: {message}",
    }
}

/// Source of URL rewrite rules.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SanitizingRuleRepository: Send + Sync {
    /// Every configured rule, in any order.
    async fn list_rules(&self) -> Result<Vec<SanitizingRule>, SanitizingRuleRepositoryError>;
}

/// Fixture repository with no rules configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSanitizingRuleRepository;

#[async_trait]
impl SanitizingRuleRepository for FixtureSanitizingRuleRepository {
    async fn list_rules(&self) -> Result<Vec<SanitizingRule>, SanitizingRuleRepositoryError> {
        Ok(Vec::new())
    }
}
