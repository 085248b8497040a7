use thiserror::Error;

/// Input and domain violations raised before anything reaches the store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChecklistError {
    #[error("score {score} for item {item_id} is outside 0..=10")]
    InvalidScore { item_id: String, score: i64 },
    #[error("unknown checklist item {0}")]
    UnknownItem(String),
    #[error("quarter must be between 1 and 4, got {0}")]
    InvalidQuarter(u32),
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("no observation at position {0}")]
    UnknownObservation(usize),
    #[error("branch {0} is not in the branch catalog")]
    UnknownBranch(String),
    #[error("no {kind} supervisor configured for branch {branch_code}")]
    MissingSupervisor { branch_code: String, kind: String },
}

/// Failures talking to a record store. Each one ends the request that hit it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("record store answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("record store JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}
