use thiserror::Error;

/// Storage failures that must reach the channel unhandled. Leaving the
/// message unacknowledged makes the broker redeliver it, and the
/// conflict-tolerant admission insert absorbs the replay.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("connection pool error: {0}")]
    Pool(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}
