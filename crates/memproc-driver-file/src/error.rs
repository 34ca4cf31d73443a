/// Error type for the file driver.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The dump file contains no data.
    #[error("Empty memory image")]
    Empty,
}

impl From<Error> for memproc_core::VmmError {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(value) => Self::Io(value),
            Error::Empty => Self::Driver(Box::new(value)),
        }
    }
}
