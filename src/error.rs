use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use diesel::r2d2::PoolError;
use diesel::result::Error as DbError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error: {}", self.message)
    }
}

impl Error for ValidationError {}

pub fn ballot_empty() -> ValidationError {
    ValidationError {
        message: String::from("ballot has no category selections"),
    }
}

pub fn ballot_invalid_selection(field: &str, value: &str) -> ValidationError {
    ValidationError {
        message: format!("selection {field} is not a study id, got {value:?}"),
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("migration failed: {0}")]
    Migration(Box<dyn Error + Send + Sync>),

    #[error("store task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

/// Why a ticket holder could not see or submit a ballot.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("ticket not found")]
    TicketNotFound,

    #[error("ticket already used")]
    TicketSpent,

    #[error("voting is not open")]
    PollClosed,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VoteError {
    /// Text shown to the voter after the redirect.
    pub fn user_message(&self) -> &'static str {
        match self {
            VoteError::TicketNotFound => "Ticket not found. Please try again.",
            VoteError::TicketSpent => {
                "Ticket is invalid. You may have already voted. If you believe this is wrong, please contact the admin."
            }
            VoteError::PollClosed => "Voting is not yet open. Please try again later.",
            VoteError::Invalid(_) => "Your ballot could not be read. Please choose a study in each category.",
            VoteError::Store(_) => "An error occurred while recording your vote. Please try again.",
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("tokens need at least one random byte")]
    NoEntropy,

    #[error("could not find a unique token after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum QrError {
    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode {url}: {source}")]
    Encode {
        url: String,
        #[source]
        source: qrcode::types::QrError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Why a batch of tickets could not be issued.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("environment variable {key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
}
