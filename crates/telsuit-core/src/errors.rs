/// Core error type for TelSuit.
///
/// The adapter crate maps platform-specific failures into this type so the
/// core can handle them consistently (fatal-to-one-task vs fatal-to-session).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two formatting ranges cover the same UTF-16 code units. Fatal to the
    /// current task only; the worker moves on to the next one.
    #[error("formatting ranges overlap at utf-16 offset {offset}")]
    RangeConflict { offset: i32 },

    /// The platform refused the edit (bad entity bounds, missing rights, ...).
    #[error("edit rejected for post {post_id}: {reason}")]
    EditRejected { post_id: i32, reason: String },

    /// Transport-level failure while editing (may be transient).
    #[error("edit failed for post {post_id}: {reason}")]
    EditFailed { post_id: i32, reason: String },

    /// One deletion batch failed; remaining batches are still attempted.
    #[error("delete failed for {count} posts: {reason}")]
    DeleteFailed { count: usize, reason: String },

    #[error("history search failed: {0}")]
    SearchFailed(String),

    /// The pipeline already has a live worker for this session.
    #[error("enhancement worker already running")]
    PipelineAlreadyRunning,

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
