// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;

pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Asia::Taipei;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Zone used for parsing HHMMSS and rendering times.
    pub time_zone: Tz,
    /// How long before a respawn the reminder fires.
    pub reminder_lead_minutes: i64,
    /// Seconds between reminder scans.
    pub scan_interval_seconds: u64,
    /// Boss catalog JSON file.
    pub catalog_path: PathBuf,
    /// Optional card color lookup JSON file.
    pub color_map_path: PathBuf,
    pub line_access_token: Option<String>,
    pub line_channel_secret: Option<String>,
    /// Reply to list commands with a flex card rather than plain text.
    pub list_as_card: bool,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:respawn.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 5000)
    /// - `BOT_TIME_ZONE` - IANA zone name (default: `Asia/Taipei`)
    /// - `REMINDER_LEAD_MINUTES` - reminder lead window (default: 2)
    /// - `SCAN_INTERVAL_SECONDS` - scanner tick (default: 60)
    /// - `CATALOG_PATH` - boss catalog (default: `data/bosses.json`)
    /// - `COLOR_MAP_PATH` - card colors (default: `data/colors.json`)
    /// - `LINE_CHANNEL_ACCESS_TOKEN`, `LINE_CHANNEL_SECRET` - messaging credentials
    /// - `LIST_AS_CARD` - `false` to reply with plain text
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = env("DATABASE_URL").unwrap_or_else(|| "sqlite:respawn.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| parse_or_warn(&env, "PORT"))
            .unwrap_or(5000);

        let time_zone = parse_or_warn(&env, "BOT_TIME_ZONE").unwrap_or(DEFAULT_TIME_ZONE);

        let reminder_lead_minutes = parse_or_warn::<i64>(&env, "REMINDER_LEAD_MINUTES")
            .filter(|m| *m > 0)
            .unwrap_or(2);

        let scan_interval_seconds = parse_or_warn::<u64>(&env, "SCAN_INTERVAL_SECONDS")
            .filter(|s| *s > 0)
            .unwrap_or(60);

        let catalog_path = env("CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/bosses.json"));

        let color_map_path = env("COLOR_MAP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/colors.json"));

        let list_as_card = env("LIST_AS_CARD")
            .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
            .unwrap_or(true);

        Config {
            database_url,
            port,
            time_zone,
            reminder_lead_minutes,
            scan_interval_seconds,
            catalog_path,
            color_map_path,
            line_access_token: env("LINE_CHANNEL_ACCESS_TOKEN").filter(|v| !v.is_empty()),
            line_channel_secret: env("LINE_CHANNEL_SECRET").filter(|v| !v.is_empty()),
            list_as_card,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

/// Read and parse a variable, logging and ignoring values that do not parse.
fn parse_or_warn<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {key}={raw:?}, using default");
            None
        }
    }
}
