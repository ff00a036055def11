// Text command parsing.
//
// Verbs and keywords are matched case-insensitively. Parsing is pure: it never
// touches storage, so arity and digit errors are reported before any lookup.

use chrono::{DateTime, Days, SubsecRound, TimeZone};

use crate::error::BotError;

pub const KILL_USAGE: &str = "格式：k <關鍵字> [HHMMSS]";
pub const KILL_RETRO_USAGE: &str = "格式：kr1 <關鍵字> <HHMMSS>（kr2 為前天）";
pub const CLEAR_USAGE: &str = "格式：clear all 或 clear <關鍵字>";
pub const ALIAS_USAGE: &str =
    "格式：alias <關鍵字> <BOSS名稱> / alias del <關鍵字> / alias check <關鍵字> / alias list";

/// When a kill happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillTime {
    Now,
    /// A time of day on the current day, or `days_ago` days earlier.
    At {
        days_ago: u32,
        hour: u32,
        minute: u32,
        second: u32,
    },
}

impl KillTime {
    /// Turn the reported time into an instant in `now`'s time zone.
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Tz>, BotError> {
        match *self {
            KillTime::Now => Ok(now.clone().trunc_subsecs(0)),
            KillTime::At {
                days_ago,
                hour,
                minute,
                second,
            } => {
                let bad = || BotError::BadTimeFormat(KILL_USAGE.to_string());
                let date = now
                    .date_naive()
                    .checked_sub_days(Days::new(u64::from(days_ago)))
                    .ok_or_else(bad)?;
                let naive = date.and_hms_opt(hour, minute, second).ok_or_else(bad)?;
                now.timezone()
                    .from_local_datetime(&naive)
                    .single()
                    .ok_or_else(bad)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Kill { keyword: String, at: KillTime },
    ListUpcoming,
    ClearAll,
    ClearBoss { keyword: String },
    AddAlias { keyword: String, display_name: String },
    DeleteAlias { keyword: String },
    CheckAlias { keyword: String },
    ListAliases,
    Help,
}

impl Command {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Kill { .. } => "kill",
            Command::ListUpcoming => "list",
            Command::ClearAll => "clear_all",
            Command::ClearBoss { .. } => "clear_boss",
            Command::AddAlias { .. } => "alias_add",
            Command::DeleteAlias { .. } => "alias_del",
            Command::CheckAlias { .. } => "alias_check",
            Command::ListAliases => "alias_list",
            Command::Help => "help",
        }
    }
}

/// Parse a 6-digit `HHMMSS` string.
pub fn parse_hhmmss(value: &str) -> Result<(u32, u32, u32), BotError> {
    let bad = || BotError::BadTimeFormat(format!("時間格式錯誤：{value}（需為 HHMMSS）"));
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let field = |range: std::ops::Range<usize>| value[range].parse::<u32>().map_err(|_| bad());
    let (hour, minute, second) = (field(0..2)?, field(2..4)?, field(4..6)?);
    if hour > 23 || minute > 59 || second > 59 {
        return Err(bad());
    }
    Ok((hour, minute, second))
}

fn kill_at(days_ago: u32, value: &str) -> Result<KillTime, BotError> {
    let (hour, minute, second) = parse_hhmmss(value)?;
    Ok(KillTime::At {
        days_ago,
        hour,
        minute,
        second,
    })
}

fn usage(hint: &str) -> BotError {
    BotError::BadTimeFormat(hint.to_string())
}

/// Parse one chat message. `Ok(None)` means the text is not addressed to the bot.
pub fn parse_command(text: &str) -> Result<Option<Command>, BotError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return Ok(None);
    };
    let verb = first.to_lowercase();
    let second = tokens.get(1).map(|t| t.to_lowercase());

    let command = match (verb.as_str(), second.as_deref(), tokens.len()) {
        ("出", None, 1) => Command::ListUpcoming,
        ("kb", Some("all"), 2) => Command::ListUpcoming,
        ("help" | "指令", None, 1) => Command::Help,

        ("k", _, 2) => Command::Kill {
            keyword: tokens[1].to_string(),
            at: KillTime::Now,
        },
        ("k", _, 3) => Command::Kill {
            keyword: tokens[1].to_string(),
            at: kill_at(0, tokens[2])?,
        },
        ("k", _, _) => return Err(usage(KILL_USAGE)),
        ("kr1" | "kr2", _, 3) => Command::Kill {
            keyword: tokens[1].to_string(),
            at: kill_at(if verb == "kr1" { 1 } else { 2 }, tokens[2])?,
        },
        ("kr1" | "kr2", _, _) => return Err(usage(KILL_RETRO_USAGE)),

        ("clear" | "/clear", Some("all"), 2) => Command::ClearAll,
        ("clear", Some(_), 2) => Command::ClearBoss {
            keyword: tokens[1].to_string(),
        },
        ("clear" | "/clear", _, _) => return Err(usage(CLEAR_USAGE)),

        ("alias", Some("list"), 2) => Command::ListAliases,
        ("alias", Some("del"), 3) => Command::DeleteAlias {
            keyword: tokens[2].to_string(),
        },
        ("alias", Some("check"), 3) => Command::CheckAlias {
            keyword: tokens[2].to_string(),
        },
        ("alias", Some("del" | "check" | "list"), _) => return Err(usage(ALIAS_USAGE)),
        ("alias" | "add", Some(_), n) if n >= 3 => Command::AddAlias {
            keyword: tokens[1].to_string(),
            display_name: tokens[2..].join(" "),
        },
        ("alias", _, _) => return Err(usage(ALIAS_USAGE)),

        _ => return Ok(None),
    };
    Ok(Some(command))
}
