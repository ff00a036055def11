// Kill reporting and ledger clearing for one group.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::commands::KillTime;
use crate::error::BotError;
use crate::metrics;
use crate::respawn::{catch_up, compute_respawn};
use crate::store::Store;

/// What was written for a kill report, in the bot's time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct KillReport {
    pub boss_name: String,
    pub kill_time: DateTime<Tz>,
    pub respawn_time: DateTime<Tz>,
    /// Next respawn at or after the report, as `kb all` will show it.
    pub next_respawn: DateTime<Tz>,
    /// Cycles already behind us for a retroactive report.
    pub cycles_passed: i64,
}

/// Record a kill of the boss `keyword` resolves to, replacing the group's
/// previous record for that boss.
pub async fn report_kill(
    store: &dyn Store,
    keyword: &str,
    group_id: &str,
    at: KillTime,
    now: DateTime<Tz>,
) -> Result<KillReport, BotError> {
    let kill_time = at.resolve(&now)?;

    let boss = store
        .find_alias_target(keyword)
        .await?
        .ok_or_else(|| BotError::UnknownKeyword(keyword.to_string()))?;

    let respawn_time = compute_respawn(kill_time, boss.respawn_hours);
    store
        .upsert_kill(
            boss.id,
            group_id,
            kill_time.with_timezone(&Utc),
            respawn_time.with_timezone(&Utc),
        )
        .await?;
    metrics::KILLS_RECORDED_TOTAL.inc();

    tracing::info!(
        boss = %boss.display_name,
        group_id,
        %kill_time,
        %respawn_time,
        "Kill recorded"
    );

    let caught = catch_up(respawn_time, boss.respawn_hours, &now);
    Ok(KillReport {
        boss_name: boss.display_name,
        kill_time,
        respawn_time,
        next_respawn: caught.next_respawn,
        cycles_passed: caught.cycles_passed,
    })
}

/// Outcome of a `clear` command.
#[derive(Debug, Clone, PartialEq)]
pub struct Cleared {
    /// Set when a single boss was cleared.
    pub boss_name: Option<String>,
    pub removed: u64,
}

/// Delete the group's whole ledger, or one boss's row when a keyword is given.
pub async fn clear_kills(
    store: &dyn Store,
    group_id: &str,
    keyword: Option<&str>,
) -> Result<Cleared, BotError> {
    let Some(keyword) = keyword else {
        let removed = store.delete_kills(group_id, None).await?;
        tracing::info!(group_id, removed, "Cleared group ledger");
        return Ok(Cleared {
            boss_name: None,
            removed,
        });
    };

    let boss = store
        .find_alias_target(keyword)
        .await?
        .ok_or_else(|| BotError::UnknownKeyword(keyword.to_string()))?;
    let removed = store.delete_kills(group_id, Some(boss.id)).await?;
    Ok(Cleared {
        boss_name: Some(boss.display_name),
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;
    use chrono_tz::Asia::Taipei;

    async fn seeded() -> (Database, i64) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let boss = db.upsert_boss("Core", 4.0).await.unwrap();
        db.add_alias(boss.id, "core").await.unwrap();
        (db, boss.id)
    }

    #[tokio::test]
    async fn test_report_kill_now() {
        let (db, boss_id) = seeded().await;
        let now = Taipei.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let report = report_kill(&db, "CORE", "C1", KillTime::Now, now).await.unwrap();
        assert_eq!(report.boss_name, "Core");
        assert_eq!(report.kill_time, now);
        assert_eq!(report.respawn_time, Taipei.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap());
        assert_eq!(report.next_respawn, report.respawn_time);
        assert_eq!(report.cycles_passed, 0);

        let stored = db.find_latest_kill(boss_id, "C1").await.unwrap().unwrap();
        assert_eq!(stored.respawn_time, report.respawn_time.with_timezone(&Utc));
    }

    #[tokio::test]
    async fn test_retroactive_report_counts_elapsed_cycles() {
        let (db, _) = seeded().await;
        let now = Taipei.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let at = KillTime::At {
            days_ago: 1,
            hour: 10,
            minute: 0,
            second: 0,
        };

        let report = report_kill(&db, "core", "C1", at, now).await.unwrap();
        assert_eq!(report.kill_time, Taipei.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
        // Respawn 01-02 14:00; by 01-03 12:00 the next boundary is 01-03 14:00, six cycles on.
        assert_eq!(report.cycles_passed, 6);
        assert_eq!(report.next_respawn, Taipei.with_ymd_and_hms(2024, 1, 3, 14, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_keyword_writes_nothing() {
        let (db, _) = seeded().await;
        let now = Taipei.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let err = report_kill(&db, "xyz", "C1", KillTime::Now, now).await.unwrap_err();
        assert!(matches!(err, BotError::UnknownKeyword(k) if k == "xyz"));
        assert!(db.list_all_kills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_single_boss_and_all() {
        let (db, _) = seeded().await;
        let other = db.upsert_boss("Shade", 2.0).await.unwrap();
        db.add_alias(other.id, "shade").await.unwrap();
        let now = Taipei.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        for keyword in ["core", "shade"] {
            report_kill(&db, keyword, "C1", KillTime::Now, now).await.unwrap();
        }
        report_kill(&db, "core", "C2", KillTime::Now, now).await.unwrap();

        let one = clear_kills(&db, "C1", Some("shade")).await.unwrap();
        assert_eq!(one.boss_name.as_deref(), Some("Shade"));
        assert_eq!(one.removed, 1);

        let all = clear_kills(&db, "C1", None).await.unwrap();
        assert_eq!(all.removed, 1);

        let left = db.list_all_kills().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kill.group_id, "C2");

        assert!(matches!(
            clear_kills(&db, "C1", Some("nope")).await,
            Err(BotError::UnknownKeyword(_))
        ));
    }
}
