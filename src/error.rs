use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("unable to open the index")]
    Database,
    #[display("scan failed")]
    Scan,
    #[display("interrupted")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Scan)
    }

    /// Process exit status for a run that failed with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}
