// Database access layer (SQLite via sqlx).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Boss {
    pub id: i64,
    pub display_name: String,
    pub respawn_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct KillRecord {
    pub id: i64,
    pub boss_id: i64,
    pub group_id: String,
    pub kill_time: DateTime<Utc>,
    pub respawn_time: DateTime<Utc>,
    /// Cycles elapsed without a new kill since `kill_time`.
    pub cycles_passed: i64,
    /// Respawn instant the last reminder was pushed for.
    pub notified_for: Option<DateTime<Utc>>,
}

/// A catalog boss with the group's current kill record, if any.
#[derive(Debug, Clone)]
pub struct BossStatus {
    pub boss: Boss,
    pub kill: Option<KillRecord>,
}

/// A ledger row joined to its boss.
#[derive(Debug, Clone)]
pub struct TrackedKill {
    pub boss: Boss,
    pub kill: KillRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAliases {
    pub boss_name: String,
    pub keywords: Vec<String>,
}

/// Flat row for boss/kill joins; kill columns are NULL on a LEFT JOIN miss.
#[derive(sqlx::FromRow)]
struct BossKillRow {
    boss_id: i64,
    display_name: String,
    respawn_hours: f64,
    kill_id: Option<i64>,
    group_id: Option<String>,
    kill_time: Option<DateTime<Utc>>,
    respawn_time: Option<DateTime<Utc>>,
    cycles_passed: Option<i64>,
    notified_for: Option<DateTime<Utc>>,
}

impl BossKillRow {
    fn into_status(self) -> BossStatus {
        let kill = match (self.kill_id, self.group_id, self.kill_time, self.respawn_time) {
            (Some(id), Some(group_id), Some(kill_time), Some(respawn_time)) => Some(KillRecord {
                id,
                boss_id: self.boss_id,
                group_id,
                kill_time,
                respawn_time,
                cycles_passed: self.cycles_passed.unwrap_or(0),
                notified_for: self.notified_for,
            }),
            _ => None,
        };
        BossStatus {
            boss: Boss {
                id: self.boss_id,
                display_name: self.display_name,
                respawn_hours: self.respawn_hours,
            },
            kill,
        }
    }
}

const BOSS_KILL_COLUMNS: &str = "b.id AS boss_id, b.display_name, b.respawn_hours, \
     k.id AS kill_id, k.group_id, k.kill_time, k.respawn_time, k.cycles_passed, k.notified_for";

const KILL_COLUMNS: &str =
    "id, boss_id, group_id, kill_time, respawn_time, cycles_passed, notified_for";

/// Keywords are matched case-insensitively; they are stored folded.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // Every connection to `sqlite::memory:` is its own database.
        let in_memory = database_url.contains(":memory:");
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bosses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name TEXT NOT NULL UNIQUE,
                respawn_hours REAL NOT NULL CHECK (respawn_hours > 0)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS boss_aliases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                boss_id INTEGER NOT NULL REFERENCES bosses(id) ON DELETE CASCADE,
                keyword TEXT NOT NULL,
                UNIQUE(boss_id, keyword)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kill_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                boss_id INTEGER NOT NULL REFERENCES bosses(id) ON DELETE CASCADE,
                group_id TEXT NOT NULL,
                kill_time TEXT NOT NULL,
                respawn_time TEXT NOT NULL,
                cycles_passed INTEGER NOT NULL DEFAULT 0,
                notified_for TEXT,
                UNIQUE(boss_id, group_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_boss_aliases_keyword ON boss_aliases(keyword)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for Database {
    // ── Catalog ──────────────────────────────────────────────────────

    async fn upsert_boss(&self, display_name: &str, respawn_hours: f64) -> Result<Boss, sqlx::Error> {
        sqlx::query_as::<_, Boss>(
            "INSERT INTO bosses (display_name, respawn_hours) VALUES (?, ?) \
             ON CONFLICT(display_name) DO UPDATE SET respawn_hours = excluded.respawn_hours \
             RETURNING id, display_name, respawn_hours",
        )
        .bind(display_name)
        .bind(respawn_hours)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_bosses(&self) -> Result<Vec<Boss>, sqlx::Error> {
        sqlx::query_as::<_, Boss>("SELECT id, display_name, respawn_hours FROM bosses ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    async fn find_boss_by_name(&self, display_name: &str) -> Result<Option<Boss>, sqlx::Error> {
        sqlx::query_as::<_, Boss>(
            "SELECT id, display_name, respawn_hours FROM bosses WHERE display_name = ? COLLATE NOCASE",
        )
        .bind(display_name.trim())
        .fetch_optional(&self.pool)
        .await
    }

    // ── Aliases ──────────────────────────────────────────────────────

    async fn find_alias_target(&self, keyword: &str) -> Result<Option<Boss>, sqlx::Error> {
        sqlx::query_as::<_, Boss>(
            "SELECT b.id, b.display_name, b.respawn_hours \
             FROM boss_aliases a JOIN bosses b ON a.boss_id = b.id \
             WHERE a.keyword = ? ORDER BY a.id LIMIT 1",
        )
        .bind(normalize_keyword(keyword))
        .fetch_optional(&self.pool)
        .await
    }

    async fn add_alias(&self, boss_id: i64, keyword: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT OR IGNORE INTO boss_aliases (boss_id, keyword) VALUES (?, ?)")
            .bind(boss_id)
            .bind(normalize_keyword(keyword))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_alias(&self, keyword: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boss_aliases WHERE keyword = ?")
            .bind(normalize_keyword(keyword))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_aliases_for_group(&self, group_id: &str) -> Result<Vec<GroupAliases>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT b.display_name, a.keyword \
             FROM boss_aliases a \
             JOIN bosses b ON a.boss_id = b.id \
             JOIN kill_records k ON k.boss_id = b.id \
             WHERE k.group_id = ? \
             ORDER BY b.display_name, a.keyword",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: Vec<GroupAliases> = Vec::new();
        for (boss_name, keyword) in rows {
            match grouped.last_mut() {
                Some(last) if last.boss_name == boss_name => last.keywords.push(keyword),
                _ => grouped.push(GroupAliases {
                    boss_name,
                    keywords: vec![keyword],
                }),
            }
        }
        Ok(grouped)
    }

    // ── Ledger ───────────────────────────────────────────────────────

    async fn find_latest_kill(
        &self,
        boss_id: i64,
        group_id: &str,
    ) -> Result<Option<KillRecord>, sqlx::Error> {
        sqlx::query_as::<_, KillRecord>(&format!(
            "SELECT {KILL_COLUMNS} FROM kill_records WHERE boss_id = ? AND group_id = ? \
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(boss_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn upsert_kill(
        &self,
        boss_id: i64,
        group_id: &str,
        kill_time: DateTime<Utc>,
        respawn_time: DateTime<Utc>,
    ) -> Result<KillRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM kill_records WHERE boss_id = ? AND group_id = ?")
            .bind(boss_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, KillRecord>(&format!(
            "INSERT INTO kill_records (boss_id, group_id, kill_time, respawn_time) \
             VALUES (?, ?, ?, ?) RETURNING {KILL_COLUMNS}"
        ))
        .bind(boss_id)
        .bind(group_id)
        .bind(kill_time)
        .bind(respawn_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn update_respawn_time(
        &self,
        record_id: i64,
        respawn_time: DateTime<Utc>,
        cycles_passed: i64,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE kill_records SET respawn_time = ?, cycles_passed = ? WHERE id = ?")
                .bind(respawn_time)
                .bind(cycles_passed)
                .bind(record_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_notified(
        &self,
        record_id: i64,
        respawn_time: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE kill_records SET notified_for = ? WHERE id = ?")
            .bind(respawn_time)
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_kills(&self, group_id: &str, boss_id: Option<i64>) -> Result<u64, sqlx::Error> {
        let result = match boss_id {
            Some(boss_id) => {
                sqlx::query("DELETE FROM kill_records WHERE group_id = ? AND boss_id = ?")
                    .bind(group_id)
                    .bind(boss_id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM kill_records WHERE group_id = ?")
                    .bind(group_id)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn list_bosses_with_latest_kill(
        &self,
        group_id: &str,
    ) -> Result<Vec<BossStatus>, sqlx::Error> {
        let rows = sqlx::query_as::<_, BossKillRow>(&format!(
            "SELECT {BOSS_KILL_COLUMNS} FROM bosses b \
             LEFT JOIN kill_records k ON k.boss_id = b.id AND k.group_id = ? \
             ORDER BY k.respawn_time IS NULL, k.respawn_time, b.id"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BossKillRow::into_status).collect())
    }

    async fn list_all_kills(&self) -> Result<Vec<TrackedKill>, sqlx::Error> {
        let rows = sqlx::query_as::<_, BossKillRow>(&format!(
            "SELECT {BOSS_KILL_COLUMNS} FROM kill_records k \
             JOIN bosses b ON k.boss_id = b.id \
             ORDER BY k.respawn_time, k.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(BossKillRow::into_status)
            .filter_map(|status| {
                status.kill.map(|kill| TrackedKill {
                    boss: status.boss,
                    kill,
                })
            })
            .collect())
    }
}
