// Reminder scanner: periodic sweep over every group's ledger.
//
// Each tick catches stale records up (persisting the advancement before anything
// else), then pushes one reminder per record whose respawn falls inside the lead
// window. `notified_for` remembers the instant a reminder went out for, so the
// same respawn is never pushed twice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::TrackedKill;
use crate::error::BotError;
use crate::messenger::{MessageSender, OutboundMessage};
use crate::metrics;
use crate::render;
use crate::respawn::catch_up;
use crate::store::Store;

/// Group id used for one-to-one chats, which cannot receive unsolicited pushes.
pub const SINGLE_CONTEXT: &str = "single";

pub fn is_push_destination(group_id: &str) -> bool {
    !group_id.is_empty() && group_id != SINGLE_CONTEXT
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub tick: std::time::Duration,
    pub lead_window: Duration,
    pub time_zone: Tz,
}

/// Counters for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub scanned: usize,
    pub advanced: usize,
    pub notified: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Run one sweep at `now`. A storage error aborts the tick; a push error only
/// affects its own record.
pub async fn run_tick(
    store: &dyn Store,
    sender: &dyn MessageSender,
    settings: &ScanSettings,
    now: DateTime<Utc>,
) -> Result<TickSummary, BotError> {
    let kills = store.list_all_kills().await?;
    let mut summary = TickSummary {
        scanned: kills.len(),
        ..Default::default()
    };
    let window_end = now + settings.lead_window;

    for TrackedKill { boss, kill } in kills {
        let caught = catch_up(kill.respawn_time, boss.respawn_hours, &now);
        let cycles_passed = kill.cycles_passed + caught.cycles_passed;

        if caught.cycles_passed > 0 {
            if !store
                .update_respawn_time(kill.id, caught.next_respawn, cycles_passed)
                .await?
            {
                // Superseded by a new kill report since the read.
                continue;
            }
            summary.advanced += 1;
            metrics::RECORDS_ADVANCED_TOTAL.inc();
        }

        let respawn = caught.next_respawn;
        if respawn > window_end || kill.notified_for == Some(respawn) {
            continue;
        }

        if !is_push_destination(&kill.group_id) {
            tracing::debug!(record_id = kill.id, group_id = %kill.group_id, "Skipping non-push destination");
            summary.skipped += 1;
            continue;
        }

        let text = render::reminder(
            &boss.display_name,
            &respawn.with_timezone(&settings.time_zone),
            cycles_passed,
        );
        match sender.push(&kill.group_id, &[OutboundMessage::text(text)]).await {
            Ok(()) => {
                store.mark_notified(kill.id, respawn).await?;
                summary.notified += 1;
                metrics::REMINDERS_SENT_TOTAL.inc();
            }
            Err(e) => {
                let err = BotError::PushDeliveryFailed {
                    destination: kill.group_id.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(boss = %boss.display_name, "{err}");
                summary.failed += 1;
                metrics::PUSH_FAILURES_TOTAL.inc();
            }
        }
    }

    Ok(summary)
}

/// Spawn the background task that runs a tick every `settings.tick`.
pub fn spawn_reminder_scanner(
    store: Arc<dyn Store>,
    sender: Arc<dyn MessageSender>,
    settings: ScanSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let timer = metrics::SCAN_DURATION_SECONDS.start_timer();
            match run_tick(store.as_ref(), sender.as_ref(), &settings, Utc::now()).await {
                Ok(summary) => {
                    metrics::SCAN_TICKS_TOTAL.with_label_values(&["ok"]).inc();
                    if summary.advanced > 0 || summary.notified > 0 || summary.failed > 0 {
                        tracing::info!(
                            scanned = summary.scanned,
                            advanced = summary.advanced,
                            notified = summary.notified,
                            failed = summary.failed,
                            "Reminder scan complete"
                        );
                    }
                }
                Err(e) => {
                    metrics::SCAN_TICKS_TOTAL.with_label_values(&["error"]).inc();
                    tracing::error!("Reminder scan aborted: {e}");
                }
            }
            timer.observe_duration();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::messenger::fake::RecordingSender;
    use chrono::TimeZone;

    fn settings() -> ScanSettings {
        ScanSettings {
            tick: std::time::Duration::from_secs(60),
            lead_window: Duration::minutes(2),
            time_zone: chrono_tz::UTC,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    async fn db_with_respawn(groups: &[&str], respawn: DateTime<Utc>) -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let boss = db.upsert_boss("Core", 4.0).await.unwrap();
        for group in groups {
            db.upsert_kill(boss.id, group, respawn - Duration::hours(4), respawn)
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_fires_once_inside_lead_window() {
        let db = db_with_respawn(&["C1"], at(14, 0, 30)).await;
        let sender = RecordingSender::default();

        let first = run_tick(&db, &sender, &settings(), at(13, 59, 0)).await.unwrap();
        assert_eq!(first.notified, 1);
        assert_eq!(sender.pushed_to(), vec!["C1"]);

        let second = run_tick(&db, &sender, &settings(), at(14, 0, 0)).await.unwrap();
        assert_eq!(second.notified, 0);
        assert_eq!(sender.pushed_to().len(), 1);

        let pushes = sender.pushes.lock().unwrap();
        assert_eq!(pushes[0].1, vec![OutboundMessage::text("⏰ Core 即將於 14:00:30 重生")]);
    }

    #[tokio::test]
    async fn test_outside_window_does_not_fire() {
        let db = db_with_respawn(&["C1"], at(14, 0, 30)).await;
        let sender = RecordingSender::default();

        let summary = run_tick(&db, &sender, &settings(), at(13, 50, 0)).await.unwrap();
        assert_eq!(summary, TickSummary { scanned: 1, ..Default::default() });
        assert!(sender.pushed_to().is_empty());
    }

    #[tokio::test]
    async fn test_overdue_record_is_advanced_and_persisted() {
        let db = db_with_respawn(&["C1"], at(6, 0, 0)).await;
        let sender = RecordingSender::default();

        // 06:00 + 4h cycles: 10:00, 14:00. At 13:59 the next respawn is 14:00 (2 cycles).
        let summary = run_tick(&db, &sender, &settings(), at(13, 59, 0)).await.unwrap();
        assert_eq!(summary.advanced, 1);
        assert_eq!(summary.notified, 1);

        let stored = db.list_all_kills().await.unwrap();
        assert_eq!(stored[0].kill.respawn_time, at(14, 0, 0));
        assert_eq!(stored[0].kill.cycles_passed, 2);
        assert_eq!(stored[0].kill.notified_for, Some(at(14, 0, 0)));

        let pushes = sender.pushes.lock().unwrap();
        assert_eq!(pushes[0].1, vec![OutboundMessage::text("⏰ Core 即將於 14:00:00 重生【過2】")]);
    }

    #[tokio::test]
    async fn test_advanced_respawn_rearms_reminder() {
        let db = db_with_respawn(&["C1"], at(14, 0, 0)).await;
        let sender = RecordingSender::default();

        run_tick(&db, &sender, &settings(), at(13, 59, 0)).await.unwrap();
        // Next cycle lands at 18:00; its own window fires again.
        run_tick(&db, &sender, &settings(), at(14, 1, 0)).await.unwrap();
        run_tick(&db, &sender, &settings(), at(17, 59, 0)).await.unwrap();
        assert_eq!(sender.pushed_to(), vec!["C1", "C1"]);
    }

    #[tokio::test]
    async fn test_single_context_is_skipped() {
        let db = db_with_respawn(&[SINGLE_CONTEXT, "C1"], at(14, 0, 30)).await;
        let sender = RecordingSender::default();

        let summary = run_tick(&db, &sender, &settings(), at(13, 59, 0)).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(sender.pushed_to(), vec!["C1"]);
    }

    #[tokio::test]
    async fn test_push_failure_does_not_abort_other_groups() {
        let db = db_with_respawn(&["C1", "C2", "C3"], at(14, 0, 30)).await;
        let sender = RecordingSender::rejecting(&["C2"]);

        let summary = run_tick(&db, &sender, &settings(), at(13, 59, 0)).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.notified, 2);
        assert_eq!(sender.pushed_to(), vec!["C1", "C3"]);

        // The failed group is not marked and is retried while still in the window.
        let retry = run_tick(&db, &sender, &settings(), at(13, 59, 30)).await.unwrap();
        assert_eq!(retry.failed, 1);
        assert_eq!(retry.notified, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_tick_and_next_tick_recovers() {
        let db = db_with_respawn(&["C1"], at(14, 0, 30)).await;
        let sender = RecordingSender::default();

        sqlx::query("ALTER TABLE kill_records RENAME TO kill_records_offline")
            .execute(db.pool())
            .await
            .unwrap();
        let err = run_tick(&db, &sender, &settings(), at(13, 59, 0)).await.unwrap_err();
        assert!(matches!(err, BotError::StorageUnavailable(_)), "{err}");
        assert!(sender.pushed_to().is_empty());

        sqlx::query("ALTER TABLE kill_records_offline RENAME TO kill_records")
            .execute(db.pool())
            .await
            .unwrap();
        let summary = run_tick(&db, &sender, &settings(), at(13, 59, 30)).await.unwrap();
        assert_eq!(summary.notified, 1);
        assert_eq!(sender.pushed_to(), vec!["C1"]);
    }

    #[test]
    fn test_is_push_destination() {
        assert!(is_push_destination("C4af4980629"));
        assert!(is_push_destination("Rb3f0a1"));
        assert!(!is_push_destination(SINGLE_CONTEXT));
        assert!(!is_push_destination(""));
    }
}
