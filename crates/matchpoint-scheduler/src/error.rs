use thiserror::Error;

/// A template rejected at intake — never persisted, never scheduled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("date {date} is already in the past")]
    DateInPast { date: chrono::NaiveDate },

    #[error("recurrence end {end} is before the first date {start}")]
    EndBeforeStart {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("duration {minutes} min is not a positive multiple of the {slot} min slot (max {max} min)")]
    BadDuration { minutes: u32, slot: u32, max: u32 },

    #[error("party size must be at least 1")]
    EmptyParty,

    #[error("time of day {value:?} is not HH:MM")]
    BadTimeOfDay { value: String },
}

/// Errors surfaced by the scheduling subsystem.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] matchpoint_store::StoreError),

    #[error("Invalid template: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
