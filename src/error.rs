// Error taxonomy for command handling and reminder delivery.

use thiserror::Error;

/// Errors surfaced while handling a chat command or pushing a reminder.
///
/// None of these are fatal: the dispatcher turns each into a reply, and the
/// scanner logs and moves on.
#[derive(Error, Debug)]
pub enum BotError {
    /// The keyword has no alias row.
    #[error("no boss matches keyword {0:?}")]
    UnknownKeyword(String),
    /// No catalog entry carries this display name.
    #[error("no boss named {0:?}")]
    UnknownBoss(String),
    /// The keyword already points at another boss.
    #[error("keyword {keyword:?} already belongs to {boss}")]
    AliasTaken { keyword: String, boss: String },
    /// Malformed HHMMSS value or wrong command arity. Carries a usage hint.
    #[error("bad time format: {0}")]
    BadTimeFormat(String),
    /// The store could not be reached or a query failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
    /// A single destination could not be reached.
    #[error("push to {destination} failed: {reason}")]
    PushDeliveryFailed { destination: String, reason: String },
}
