use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

pub mod mkr_redeemer;

pub use mkr_redeemer::MkrRedeemer;

/// A one-off action an account may still need to take after a system upgrade.
#[async_trait]
pub trait Migration: Send + Sync {
    fn id(&self) -> &'static str;

    /// Whether the current account has anything to migrate.
    async fn check(&self) -> Result<bool>;
}

/// Run every check, keyed by migration id.
pub async fn run_all_checks(migrations: &[Box<dyn Migration>]) -> Result<BTreeMap<&'static str, bool>> {
    let mut results = BTreeMap::new();
    for migration in migrations {
        let pending = migration.check().await?;
        tracing::debug!(migration = migration.id(), pending, "migration checked");
        results.insert(migration.id(), pending);
    }
    Ok(results)
}
