// Upcoming respawns for one group.
//
// Every catalog boss is listed. Bosses with a kill record show their next actual
// respawn; stale records are caught up and the advancement written back so the
// scanner starts from the corrected instant.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::BotError;
use crate::metrics;
use crate::respawn::catch_up;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingRow {
    pub boss_name: String,
    /// `None` when the group has never reported this boss.
    pub respawn: Option<DateTime<Tz>>,
    pub interval_hours: f64,
    /// Cycles elapsed since the last reported kill.
    pub cycles_passed: i64,
}

/// Known respawns first, ascending; unknown ones after, in catalog order.
pub fn sort_upcoming(rows: &mut [UpcomingRow]) {
    rows.sort_by_key(|row| (row.respawn.is_none(), row.respawn));
}

pub async fn list_upcoming(
    store: &dyn Store,
    group_id: &str,
    now: DateTime<Tz>,
) -> Result<Vec<UpcomingRow>, BotError> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let statuses = store.list_bosses_with_latest_kill(group_id).await?;

    let mut rows = Vec::with_capacity(statuses.len());
    for status in statuses {
        let Some(kill) = status.kill else {
            rows.push(UpcomingRow {
                boss_name: status.boss.display_name,
                respawn: None,
                interval_hours: status.boss.respawn_hours,
                cycles_passed: 0,
            });
            continue;
        };

        let caught = catch_up(kill.respawn_time, status.boss.respawn_hours, &now_utc);
        let cycles_passed = kill.cycles_passed + caught.cycles_passed;
        if caught.cycles_passed > 0 {
            // A failed write leaves the record stale until the next read or scan.
            match store
                .update_respawn_time(kill.id, caught.next_respawn, cycles_passed)
                .await
            {
                Ok(true) => metrics::RECORDS_ADVANCED_TOTAL.inc(),
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    record_id = kill.id,
                    "Failed to persist advanced respawn: {e}"
                ),
            }
        }

        rows.push(UpcomingRow {
            boss_name: status.boss.display_name,
            respawn: Some(caught.next_respawn.with_timezone(&tz)),
            interval_hours: status.boss.respawn_hours,
            cycles_passed,
        });
    }

    sort_upcoming(&mut rows);
    Ok(rows)
}
