// Storage contract consumed by the kill reporter, the upcoming-respawn reporter,
// the reminder scanner and the alias commands.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{Boss, BossStatus, GroupAliases, KillRecord, TrackedKill};

/// Everything the bot reads from or writes to durable storage.
///
/// `Database` is the production implementation. Each method is one logical
/// operation; multi-statement writes are transactional inside the implementation.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Catalog ──────────────────────────────────────────────────────

    /// Insert a boss or update its interval, keyed by display name.
    async fn upsert_boss(&self, display_name: &str, respawn_hours: f64) -> Result<Boss, sqlx::Error>;

    async fn list_bosses(&self) -> Result<Vec<Boss>, sqlx::Error>;

    /// Case-insensitive lookup by display name.
    async fn find_boss_by_name(&self, display_name: &str) -> Result<Option<Boss>, sqlx::Error>;

    // ── Aliases ──────────────────────────────────────────────────────

    /// Resolve a keyword (case-insensitive) to its boss.
    async fn find_alias_target(&self, keyword: &str) -> Result<Option<Boss>, sqlx::Error>;

    /// Map a keyword to a boss. Returns false when the pair already existed.
    async fn add_alias(&self, boss_id: i64, keyword: &str) -> Result<bool, sqlx::Error>;

    /// Remove every mapping for a keyword, returning how many rows went away.
    async fn delete_alias(&self, keyword: &str) -> Result<u64, sqlx::Error>;

    /// Keywords of the bosses that currently have a ledger row in `group_id`.
    async fn list_aliases_for_group(&self, group_id: &str) -> Result<Vec<GroupAliases>, sqlx::Error>;

    // ── Ledger ───────────────────────────────────────────────────────

    async fn find_latest_kill(&self, boss_id: i64, group_id: &str)
        -> Result<Option<KillRecord>, sqlx::Error>;

    /// Replace the (boss, group) ledger row with a fresh kill.
    async fn upsert_kill(
        &self,
        boss_id: i64,
        group_id: &str,
        kill_time: DateTime<Utc>,
        respawn_time: DateTime<Utc>,
    ) -> Result<KillRecord, sqlx::Error>;

    /// Move a record forward after a catch-up. `cycles_passed` is the new total.
    /// Returns false if the record no longer exists (superseded meanwhile).
    async fn update_respawn_time(
        &self,
        record_id: i64,
        respawn_time: DateTime<Utc>,
        cycles_passed: i64,
    ) -> Result<bool, sqlx::Error>;

    /// Remember that a reminder went out for this respawn instant.
    async fn mark_notified(&self, record_id: i64, respawn_time: DateTime<Utc>)
        -> Result<bool, sqlx::Error>;

    /// Delete a group's ledger rows, or only one boss's row when `boss_id` is set.
    async fn delete_kills(&self, group_id: &str, boss_id: Option<i64>) -> Result<u64, sqlx::Error>;

    /// Every catalog boss left-joined to the group's current kill record.
    async fn list_bosses_with_latest_kill(&self, group_id: &str)
        -> Result<Vec<BossStatus>, sqlx::Error>;

    /// All ledger rows across groups, each with its boss.
    async fn list_all_kills(&self) -> Result<Vec<TrackedKill>, sqlx::Error>;
}
