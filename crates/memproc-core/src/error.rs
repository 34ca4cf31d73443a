use crate::Pa;

/// An error that can occur while maintaining the process view.
#[derive(thiserror::Error, Debug)]
pub enum VmmError {
    /// An error occurred in the physical memory driver.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync>),

    /// An OS-specific error occurred.
    #[error(transparent)]
    Os(Box<dyn std::error::Error + Send + Sync>),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The physical page is not backed by the memory source.
    #[error("Page not present ({0})")]
    PageNotPresent(Pa),

    /// Out of bounds.
    #[error("Out of bounds")]
    OutOfBounds,

    /// Operation not supported.
    #[error("Operation not supported.")]
    NotSupported,

    /// Neither OS auto-detection nor a user-supplied paging root produced
    /// a usable process view.
    #[error("Unable to auto-identify the operating system; specify the paging root (DTB/CR3) if known")]
    InitializationFailed,

    /// The system process is missing from the registry of a recognized OS.
    #[error("System process not found")]
    SystemProcessNotFound,

    /// The background refresh engine is already running.
    #[error("Refresh thread already running")]
    RefreshThreadRunning,

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}
