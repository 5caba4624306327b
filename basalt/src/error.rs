use std::fmt;
use std::io;

use crate::TableId;

/// Errors surfaced by the storage engine.
#[derive(Debug)]
pub enum DbError {
    /// A page lock could not be acquired before the request's timeout. The
    /// caller must roll the transaction back.
    TransactionAborted,
    /// No table with this id is registered in the catalog.
    TableNotFound(TableId),
    /// A structural failure: every page dirty on eviction, a missing record
    /// id, an unopened cursor, invalid arguments.
    Db(String),
    /// An underlying page I/O failure.
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::TransactionAborted => write!(f, "transaction aborted"),
            DbError::TableNotFound(table_id) => write!(f, "table {} not found", table_id),
            DbError::Db(message) => write!(f, "{}", message),
            DbError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DbError {
    fn from(err: io::Error) -> Self {
        DbError::Io(err)
    }
}
