// Command dispatch: turn one chat message into at most one reply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::commands::{parse_command, Command};
use crate::error::BotError;
use crate::kill::{clear_kills, report_kill};
use crate::messenger::OutboundMessage;
use crate::metrics;
use crate::render::{self, ColorMap};
use crate::store::Store;
use crate::upcoming::list_upcoming;

/// Reply for failures the user cannot fix by rephrasing.
pub const BUSY_REPLY: &str = "⚠️ 系統忙碌中，請稍後再試";

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub time_zone: Tz,
    /// Answer `kb all` with a flex card instead of plain text.
    pub list_as_card: bool,
    pub colors: ColorMap,
}

pub struct Bot {
    store: Arc<dyn Store>,
    settings: BotSettings,
}

impl Bot {
    pub fn new(store: Arc<dyn Store>, settings: BotSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Current instant in the bot's time zone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.settings.time_zone)
    }

    /// Handle one text message from `group_id`. Returns `None` for text that is
    /// not a command.
    pub async fn handle_text(
        &self,
        group_id: &str,
        text: &str,
        now: DateTime<Tz>,
    ) -> Option<OutboundMessage> {
        let command = match parse_command(text) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                metrics::COMMANDS_TOTAL
                    .with_label_values(&["unparsed", "error"])
                    .inc();
                return Some(error_reply(&e));
            }
        };

        let label = command.label();
        match self.execute(group_id, command, now).await {
            Ok(reply) => {
                metrics::COMMANDS_TOTAL.with_label_values(&[label, "ok"]).inc();
                Some(reply)
            }
            Err(e) => {
                metrics::COMMANDS_TOTAL.with_label_values(&[label, "error"]).inc();
                Some(error_reply(&e))
            }
        }
    }

    async fn execute(
        &self,
        group_id: &str,
        command: Command,
        now: DateTime<Tz>,
    ) -> Result<OutboundMessage, BotError> {
        let store = self.store();
        let reply = match command {
            Command::Kill { keyword, at } => {
                let report = report_kill(store, &keyword, group_id, at, now).await?;
                OutboundMessage::text(render::kill_confirmation(&report))
            }
            Command::ListUpcoming => {
                let rows = list_upcoming(store, group_id, now).await?;
                if self.settings.list_as_card {
                    render::upcoming_card(&rows, &self.settings.colors)
                } else {
                    OutboundMessage::text(render::upcoming_text(&rows))
                }
            }
            Command::ClearAll => {
                let cleared = clear_kills(store, group_id, None).await?;
                OutboundMessage::text(render::cleared(&cleared))
            }
            Command::ClearBoss { keyword } => {
                let cleared = clear_kills(store, group_id, Some(&keyword)).await?;
                OutboundMessage::text(render::cleared(&cleared))
            }
            Command::AddAlias {
                keyword,
                display_name,
            } => {
                let boss = store
                    .find_boss_by_name(&display_name)
                    .await?
                    .ok_or(BotError::UnknownBoss(display_name))?;
                if let Some(existing) = store.find_alias_target(&keyword).await? {
                    if existing.id != boss.id {
                        return Err(BotError::AliasTaken {
                            keyword,
                            boss: existing.display_name,
                        });
                    }
                }
                let text = if store.add_alias(boss.id, &keyword).await? {
                    tracing::info!(keyword = %keyword, boss = %boss.display_name, "Alias added");
                    format!("✅ 已新增關鍵字 {keyword} → {}", boss.display_name)
                } else {
                    format!("關鍵字 {keyword} 已對應 {}", boss.display_name)
                };
                OutboundMessage::text(text)
            }
            Command::DeleteAlias { keyword } => {
                if store.delete_alias(&keyword).await? == 0 {
                    return Err(BotError::UnknownKeyword(keyword));
                }
                OutboundMessage::text(format!("🗑 已刪除關鍵字 {keyword}"))
            }
            Command::CheckAlias { keyword } => {
                let boss = store
                    .find_alias_target(&keyword)
                    .await?
                    .ok_or_else(|| BotError::UnknownKeyword(keyword.clone()))?;
                OutboundMessage::text(format!(
                    "🔎 {keyword} → {}（{} 小時）",
                    boss.display_name, boss.respawn_hours
                ))
            }
            Command::ListAliases => {
                let aliases = store.list_aliases_for_group(group_id).await?;
                OutboundMessage::text(render::alias_list(&aliases))
            }
            Command::Help => OutboundMessage::text(render::HELP),
        };
        Ok(reply)
    }
}

/// User-facing text for a failed command.
pub fn error_reply(err: &BotError) -> OutboundMessage {
    let text = match err {
        BotError::UnknownKeyword(keyword) => render::boss_not_found(keyword),
        BotError::UnknownBoss(name) => format!("❌ 目錄中沒有 BOSS：{name}"),
        BotError::AliasTaken { keyword, boss } => format!("⚠️ 關鍵字 {keyword} 已屬於 {boss}"),
        BotError::BadTimeFormat(hint) => format!("⚠️ {hint}"),
        BotError::StorageUnavailable(e) => {
            tracing::error!("Database error: {e}");
            BUSY_REPLY.to_string()
        }
        BotError::PushDeliveryFailed { .. } => {
            tracing::error!("{err}");
            BUSY_REPLY.to_string()
        }
    };
    OutboundMessage::text(text)
}
