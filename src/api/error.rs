use std::fmt::Formatter;
use std::io;
use std::result;

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Tree(u32, String),
    /// A hazard reader held the page, or a sibling edge was mid-transition;
    /// the caller should reselect a victim and retry later.
    Contention(String),
    /// A child could merge in principle but reconciliation has not yet
    /// cleaned it (dirty split/empty, or no mergeable flag at all).
    Unmergeable(String),
    /// The unlock walk observed a child state it should never observe.
    /// Indicates a bug upstream, not a retryable condition.
    Protocol(String),
    Other(String),
}

pub type Result<T> = result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IO(io) => write!(f, "IO error: '{}'.", io),
            Error::Tree(id, msg) => write!(f, "Tree error (page: {}): '{}'.", id, msg),
            Error::Contention(msg) => write!(f, "Contention: '{}'.", msg),
            Error::Unmergeable(msg) => write!(f, "Unmergeable child: '{}'.", msg),
            Error::Protocol(msg) => write!(f, "Protocol violation: '{}'.", msg),
            Error::Other(msg) => write!(f, "Other error: '{}'.", msg),
        }
    }
}

impl std::error::Error for Error {
    fn cause(&self) -> Option<&dyn std::error::Error> {
        match self {
            Error::IO(io) => Some(io),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IO(e)
    }
}

impl From<String> for Error {
    fn from(str: String) -> Self {
        Error::Other(str)
    }
}
