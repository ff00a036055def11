// End-to-end command flows through Bot::handle_text against an in-memory ledger:
// kill reports, supersede, listing, clearing and alias management.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use chrono_tz::{Asia::Taipei, Tz};

use respawn_bot::bot::{Bot, BotSettings};
use respawn_bot::catalog::{parse_catalog, reconcile};
use respawn_bot::commands::KILL_USAGE;
use respawn_bot::db::Database;
use respawn_bot::messenger::OutboundMessage;
use respawn_bot::render::{ColorMap, LIST_HEADER};
use respawn_bot::store::Store;

const CATALOG: &str = r#"[
    { "display_name": "Core", "respawn_hours": 4, "keywords": ["core", "cr"] },
    { "display_name": "Shade", "respawn_hours": 1 },
    { "display_name": "Wyrm", "respawn_hours": 12, "keywords": ["wyrm"] }
]"#;

fn at(h: u32, m: u32, s: u32) -> DateTime<Tz> {
    Taipei.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

async fn test_bot() -> (Bot, Arc<Database>) {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    reconcile(db.as_ref(), &parse_catalog(CATALOG).unwrap())
        .await
        .unwrap();
    let bot = Bot::new(
        db.clone(),
        BotSettings {
            time_zone: Taipei,
            list_as_card: false,
            colors: ColorMap::default(),
        },
    );
    (bot, db)
}

async fn say(bot: &Bot, group: &str, text: &str, now: DateTime<Tz>) -> String {
    match bot.handle_text(group, text, now).await {
        Some(OutboundMessage::Text { text }) => text,
        other => panic!("expected a text reply to {text:?}, got {other:?}"),
    }
}

// ── Kill reports ──────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_keyword_records_nothing() {
    let (bot, db) = test_bot().await;
    let reply = say(&bot, "C1", "k xyz", at(20, 0, 0)).await;
    assert!(reply.contains("找不到 BOSS：xyz"), "{reply}");
    assert!(db.list_all_kills().await.unwrap().is_empty());
}

#[tokio::test]
async fn keyword_lookup_ignores_case() {
    let (bot, db) = test_bot().await;
    say(&bot, "C1", "k CR", at(20, 0, 0)).await;
    let kills = db.list_all_kills().await.unwrap();
    assert_eq!(kills.len(), 1);
    assert_eq!(kills[0].boss.display_name, "Core");
}

#[tokio::test]
async fn second_kill_supersedes_first() {
    let (bot, db) = test_bot().await;
    say(&bot, "C1", "k core 100000", at(20, 0, 0)).await;
    say(&bot, "C1", "k core 120000", at(20, 0, 0)).await;

    let kills = db.list_all_kills().await.unwrap();
    assert_eq!(kills.len(), 1);
    assert_eq!(kills[0].kill.kill_time, at(12, 0, 0));
    assert_eq!(kills[0].kill.respawn_time, at(16, 0, 0));
}

#[tokio::test]
async fn retroactive_kill_matches_listing() {
    let (bot, _) = test_bot().await;
    // Yesterday 10:00 + 4h respawns at 14:00; the next boundary after today 20:00
    // is 22:00, eight cycles on.
    let reply = say(&bot, "C1", "kr1 core 100000", at(20, 0, 0)).await;
    assert!(reply.starts_with("✅ 已記錄 Core"), "{reply}");
    assert!(reply.contains("擊殺：12/31 10:00:00"), "{reply}");
    assert!(reply.contains("重生：12/31 14:00:00"), "{reply}");
    assert!(reply.contains("下次：01/01 22:00:00【過8】"), "{reply}");

    let listing = say(&bot, "C1", "kb all", at(20, 1, 0)).await;
    assert_eq!(listing.lines().nth(1), Some("22:00:00 Core【過8】"));
}

#[tokio::test]
async fn bad_time_gets_usage_hint() {
    let (bot, db) = test_bot().await;
    let reply = say(&bot, "C1", "k core 25xx00", at(20, 0, 0)).await;
    assert!(reply.contains("25xx00") && reply.contains("HHMMSS"), "{reply}");
    assert!(db.list_all_kills().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_kill_gets_usage() {
    let (bot, _) = test_bot().await;
    let reply = say(&bot, "C1", "k core 100000 extra", at(20, 0, 0)).await;
    assert!(reply.contains(KILL_USAGE), "{reply}");
}

#[tokio::test]
async fn help_lists_commands() {
    let (bot, _) = test_bot().await;
    let reply = say(&bot, "C1", "指令", at(20, 0, 0)).await;
    assert!(reply.contains("kb all"), "{reply}");
    assert!(reply.contains("alias"), "{reply}");
}

#[tokio::test]
async fn chatter_is_ignored() {
    let (bot, _) = test_bot().await;
    assert!(bot.handle_text("C1", "anyone up for core?", at(20, 0, 0)).await.is_none());
}

// ── Listing ───────────────────────────────────────────────────────────

#[tokio::test]
async fn list_orders_known_before_unknown() {
    let (bot, db) = test_bot().await;
    say(&bot, "C1", "k wyrm 080000", at(9, 0, 0)).await;
    say(&bot, "C1", "k core 063000", at(9, 0, 0)).await;

    let reply = say(&bot, "C1", "kb all", at(9, 0, 0)).await;
    let lines: Vec<&str> = reply.lines().collect();
    assert_eq!(
        lines,
        vec![LIST_HEADER, "10:30:00 Core", "20:00:00 Wyrm", "__:__:__ Shade"]
    );

    // Four hours later Core has passed once and is caught up on read.
    let reply = say(&bot, "C1", "出", at(13, 0, 0)).await;
    assert_eq!(reply.lines().nth(1), Some("14:30:00 Core【過1】"));
    let core = db
        .list_all_kills()
        .await
        .unwrap()
        .into_iter()
        .find(|k| k.boss.display_name == "Core")
        .unwrap();
    assert_eq!(core.kill.respawn_time, at(14, 30, 0));
    assert_eq!(core.kill.cycles_passed, 1);
}

#[tokio::test]
async fn list_is_scoped_to_group() {
    let (bot, _) = test_bot().await;
    say(&bot, "C1", "k core 080000", at(9, 0, 0)).await;

    let reply = say(&bot, "C2", "kb all", at(9, 0, 0)).await;
    assert!(reply.contains("__:__:__ Core"), "{reply}");
}

#[tokio::test]
async fn list_as_card_returns_flex() {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    reconcile(db.as_ref(), &parse_catalog(CATALOG).unwrap())
        .await
        .unwrap();
    let bot = Bot::new(
        db,
        BotSettings {
            time_zone: Taipei,
            list_as_card: true,
            colors: ColorMap::default(),
        },
    );
    let reply = bot.handle_text("C1", "kb all", at(9, 0, 0)).await;
    assert!(matches!(reply, Some(OutboundMessage::Flex { .. })));
}

// ── Clearing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_all_only_touches_own_group() {
    let (bot, db) = test_bot().await;
    for kw in ["core", "shade", "wyrm"] {
        say(&bot, "C1", &format!("k {kw}"), at(9, 0, 0)).await;
    }
    say(&bot, "C2", "k core", at(9, 0, 0)).await;

    let reply = say(&bot, "C1", "clear all", at(9, 0, 0)).await;
    assert!(reply.contains("3 筆"), "{reply}");

    let remaining = db.list_all_kills().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kill.group_id, "C2");
}

#[tokio::test]
async fn clear_single_boss() {
    let (bot, db) = test_bot().await;
    say(&bot, "C1", "k core", at(9, 0, 0)).await;
    say(&bot, "C1", "k shade", at(9, 0, 0)).await;

    let reply = say(&bot, "C1", "clear cr", at(9, 0, 0)).await;
    assert_eq!(reply, "🧹 已清除 Core 的紀錄");
    let remaining = db.list_all_kills().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].boss.display_name, "Shade");
}

// ── Aliases ───────────────────────────────────────────────────────────

#[tokio::test]
async fn alias_lifecycle() {
    let (bot, _) = test_bot().await;
    let now = at(9, 0, 0);

    let reply = say(&bot, "C1", "alias sh Shade", now).await;
    assert!(reply.contains("sh → Shade"), "{reply}");

    let reply = say(&bot, "C1", "alias check SH", now).await;
    assert!(reply.contains("Shade"), "{reply}");

    say(&bot, "C1", "k sh", now).await;
    let reply = say(&bot, "C1", "alias list", now).await;
    assert!(reply.contains("Shade："), "{reply}");
    assert!(reply.contains("sh"), "{reply}");

    let reply = say(&bot, "C1", "alias del sh", now).await;
    assert!(reply.contains("已刪除"), "{reply}");
    let reply = say(&bot, "C1", "k sh", now).await;
    assert!(reply.contains("找不到 BOSS"), "{reply}");
}

#[tokio::test]
async fn alias_conflicts_are_rejected() {
    let (bot, _) = test_bot().await;
    let now = at(9, 0, 0);

    let reply = say(&bot, "C1", "alias cr Wyrm", now).await;
    assert!(reply.contains("已屬於 Core"), "{reply}");

    let reply = say(&bot, "C1", "alias x Nobody", now).await;
    assert!(reply.contains("Nobody"), "{reply}");

    let reply = say(&bot, "C1", "alias del missing", now).await;
    assert!(reply.contains("找不到 BOSS"), "{reply}");
}
