use memproc_core::Pa;

/// Error types for Windows heuristics.
#[derive(thiserror::Error, Debug)]
pub enum WindowsError {
    /// The layout constants cannot describe a valid scan.
    #[error("Invalid layout: {0}")]
    InvalidLayout(&'static str),

    /// The scan range is empty or reversed.
    #[error("Invalid scan range {start}..{end}")]
    InvalidRange {
        /// Start of the range.
        start: Pa,

        /// End of the range.
        end: Pa,
    },
}

impl From<WindowsError> for memproc_core::VmmError {
    fn from(value: WindowsError) -> Self {
        memproc_core::VmmError::Os(value.into())
    }
}
