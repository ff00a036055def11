// Chat rendering: plain-text replies and the upcoming-respawn card.

use std::collections::HashMap;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::GroupAliases;
use crate::kill::{Cleared, KillReport};
use crate::messenger::OutboundMessage;
use crate::upcoming::UpcomingRow;

pub const UNKNOWN_TIME: &str = "__:__:__";
pub const LIST_HEADER: &str = "🕓 接下來 24 小時內重生 BOSS：";
const DEFAULT_COLOR: &str = "#555555";

/// Boss name → category → card color. Unknown names get a neutral color.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorMap {
    #[serde(default)]
    pub categories: HashMap<String, String>,
    #[serde(default)]
    pub bosses: HashMap<String, String>,
}

impl ColorMap {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn color_for(&self, boss_name: &str) -> &str {
        self.bosses
            .get(boss_name)
            .and_then(|category| self.categories.get(category))
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }
}

fn clock(time: &DateTime<Tz>) -> String {
    time.format("%H:%M:%S").to_string()
}

fn stamp(time: &DateTime<Tz>) -> String {
    time.format("%m/%d %H:%M:%S").to_string()
}

fn passed_annotation(cycles: i64) -> String {
    if cycles >= 1 {
        format!("【過{cycles}】")
    } else {
        String::new()
    }
}

/// `HH:MM:SS name【過N】`, or the placeholder when the respawn is unknown.
pub fn upcoming_line(row: &UpcomingRow) -> String {
    let time = row.respawn.as_ref().map(clock).unwrap_or_else(|| UNKNOWN_TIME.to_string());
    format!("{time} {}{}", row.boss_name, passed_annotation(row.cycles_passed))
}

pub fn upcoming_text(rows: &[UpcomingRow]) -> String {
    let mut lines = vec![LIST_HEADER.to_string()];
    lines.extend(rows.iter().map(upcoming_line));
    lines.join("\n")
}

/// A flex bubble with one colored row per boss.
pub fn upcoming_card(rows: &[UpcomingRow], colors: &ColorMap) -> OutboundMessage {
    let mut contents: Vec<Value> = vec![json!({
        "type": "text",
        "text": LIST_HEADER,
        "weight": "bold",
        "size": "md",
        "wrap": true,
    })];

    for row in rows {
        let time = row.respawn.as_ref().map(clock).unwrap_or_else(|| UNKNOWN_TIME.to_string());
        contents.push(json!({
            "type": "box",
            "layout": "horizontal",
            "backgroundColor": colors.color_for(&row.boss_name),
            "cornerRadius": "sm",
            "paddingAll": "xs",
            "contents": [
                { "type": "text", "text": time, "flex": 0, "size": "sm", "color": "#FFFFFF" },
                {
                    "type": "text",
                    "text": format!("{}{}", row.boss_name, passed_annotation(row.cycles_passed)),
                    "size": "sm",
                    "color": "#FFFFFF",
                    "margin": "md",
                    "wrap": true,
                },
            ],
        }));
    }

    OutboundMessage::Flex {
        alt_text: LIST_HEADER.to_string(),
        contents: json!({
            "type": "bubble",
            "body": {
                "type": "box",
                "layout": "vertical",
                "spacing": "xs",
                "contents": contents,
            },
        }),
    }
}

pub fn kill_confirmation(report: &KillReport) -> String {
    let mut text = format!(
        "✅ 已記錄 {}\n擊殺：{}\n重生：{}",
        report.boss_name,
        stamp(&report.kill_time),
        stamp(&report.respawn_time)
    );
    if report.cycles_passed >= 1 {
        text.push_str(&format!(
            "\n下次：{}{}",
            stamp(&report.next_respawn),
            passed_annotation(report.cycles_passed)
        ));
    }
    text
}

pub fn reminder(boss_name: &str, respawn: &DateTime<Tz>, cycles_passed: i64) -> String {
    format!(
        "⏰ {boss_name} 即將於 {} 重生{}",
        clock(respawn),
        passed_annotation(cycles_passed)
    )
}

pub fn cleared(outcome: &Cleared) -> String {
    match &outcome.boss_name {
        Some(name) if outcome.removed > 0 => format!("🧹 已清除 {name} 的紀錄"),
        Some(name) => format!("{name} 沒有紀錄"),
        None => format!("🧹 已清除本群組 {} 筆紀錄", outcome.removed),
    }
}

pub fn boss_not_found(keyword: &str) -> String {
    format!("❌ 找不到 BOSS：{keyword}")
}

pub fn alias_list(aliases: &[GroupAliases]) -> String {
    if aliases.is_empty() {
        return "本群組目前沒有使用中的關鍵字".to_string();
    }
    aliases
        .iter()
        .map(|entry| format!("{}：{}", entry.boss_name, entry.keywords.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub const HELP: &str = "指令列表：
k <關鍵字> — 回報現在擊殺
k <關鍵字> <HHMMSS> — 回報今天指定時間擊殺
kr1 / kr2 <關鍵字> <HHMMSS> — 回報昨天 / 前天擊殺
kb all 或 出 — 查看重生時間
clear all — 清除本群組所有紀錄
clear <關鍵字> — 清除單一 BOSS 紀錄
alias <關鍵字> <BOSS名稱> — 新增關鍵字
alias del <關鍵字> / alias check <關鍵字> / alias list";
