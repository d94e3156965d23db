use thiserror::Error;

/// Errors from the dispatch shell around the jog handler.
///
/// The handler itself cannot fail: clamping, saturation and timer
/// rescheduling are corrected in place.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event queue is gone
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Reading controller input failed
    #[error("Input error: {0}")]
    InputError(#[from] std::io::Error),

    /// The dispatcher task panicked or was aborted
    #[error("Task error: {0}")]
    TaskError(String),
}
