//! Coordination-service tree access.
//!
//! The coordination client itself (sessions, watches, consistency) lives
//! outside this crate; discovery only needs to list children and read node
//! payloads.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failures reported by a coordination-service client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The node does not exist
    #[error("Node {0} does not exist")]
    NoNode(String),

    /// The session could not be established or was lost
    #[error("Coordination service connection error: {0}")]
    Connection(String),
}

/// Result alias for tree operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// An open session against the coordination service.
#[async_trait]
pub trait CoordinationTree: Send + Sync {
    /// Names of the direct children of `path`.
    async fn children(&self, path: &str) -> TreeResult<Vec<String>>;

    /// Payload stored at `path`.
    async fn data(&self, path: &str) -> TreeResult<Bytes>;

    /// End the session. Further calls fail with [`TreeError::Connection`].
    async fn close(&self);
}

/// Opens sessions from a connection string.
#[async_trait]
pub trait TreeConnector: Send + Sync {
    /// Open one session. A failed attempt is retried by the caller.
    async fn connect(&self, connection_string: &str) -> TreeResult<Box<dyn CoordinationTree>>;
}
