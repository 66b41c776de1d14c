use std::ops::{Deref, DerefMut};
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{EtlError, EtlResult};

/// How the materializer holds its database connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Open a connection for each table and close it when the table is done.
    #[default]
    PerTable,
    /// Hold one connection for the whole run. Commits still happen per table.
    PerRun,
}

pub(crate) fn open(path: &Path) -> EtlResult<Connection> {
    debug!(path = %path.display(), "opening store");
    Connection::open(path).map_err(|source| EtlError::StoreIo {
        path: path.to_path_buf(),
        source,
    })
}

/// A connection scoped to one table's materialization.
///
/// An owned connection is closed on drop, on success or failure. A borrowed one stays open.
pub(crate) enum ScopedConnection<'a> {
    Owned(Connection),
    Shared(&'a mut Connection),
}

impl<'a> ScopedConnection<'a> {
    pub(crate) fn acquire(path: &Path, shared: Option<&'a mut Connection>) -> EtlResult<Self> {
        match shared {
            Some(conn) => Ok(Self::Shared(conn)),
            None => open(path).map(Self::Owned),
        }
    }
}

impl Deref for ScopedConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Owned(c) => c,
            Self::Shared(c) => &**c,
        }
    }
}

impl DerefMut for ScopedConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match self {
            Self::Owned(c) => c,
            Self::Shared(c) => &mut **c,
        }
    }
}
