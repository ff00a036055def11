// Boss catalog import.
//
// The catalog file is a JSON list of bosses. Reconciliation is idempotent:
// bosses are upserted by display name and aliases inserted only when missing,
// so it is safe to run on every start-up.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub display_name: String,
    pub respawn_hours: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("boss {name:?} has a non-positive respawn interval ({hours})")]
    InvalidInterval { name: String, hours: f64 },
    #[error("catalog entry with an empty display name")]
    EmptyName,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub bosses: usize,
    pub aliases_added: usize,
}

pub fn parse_catalog(raw: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(raw)?;
    for entry in &entries {
        if entry.display_name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if !(entry.respawn_hours.is_finite() && entry.respawn_hours > 0.0) {
            return Err(CatalogError::InvalidInterval {
                name: entry.display_name.clone(),
                hours: entry.respawn_hours,
            });
        }
    }
    Ok(entries)
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let raw = std::fs::read_to_string(path)?;
    parse_catalog(&raw)
}

/// Bring storage in line with the catalog. The display name always works as
/// a keyword in addition to the listed ones.
pub async fn reconcile(
    store: &dyn Store,
    entries: &[CatalogEntry],
) -> Result<ReconcileSummary, CatalogError> {
    let mut summary = ReconcileSummary::default();
    for entry in entries {
        let name = entry.display_name.trim();
        let boss = store.upsert_boss(name, entry.respawn_hours).await?;
        summary.bosses += 1;

        for keyword in std::iter::once(name).chain(entry.keywords.iter().map(String::as_str)) {
            if keyword.trim().is_empty() {
                continue;
            }
            if store.add_alias(boss.id, keyword).await? {
                summary.aliases_added += 1;
            }
        }
    }
    tracing::info!(
        bosses = summary.bosses,
        aliases_added = summary.aliases_added,
        "Boss catalog reconciled"
    );
    Ok(summary)
}
