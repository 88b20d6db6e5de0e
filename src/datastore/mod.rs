//! The pluggable storage contract Modbus requests are served from.

pub mod external_kv;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::encoding::{Encoding, RegisterValue};
use crate::frame::{Address, ObjectKind, Quantity, Response};

/// Failure modes a backend can report, kept distinct from the crate-level
/// [`crate::error::Error`] and from wire-level Modbus exceptions: the
/// transaction handler is the single place that maps these onto exception
/// codes.
#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum DatastoreError {
    /// The requested `(kind, address)` has no value - becomes exception 2.
    #[error("address not found")]
    NotFound,

    /// The backend itself failed (I/O, connection, parse) - becomes
    /// exception 4.
    #[error("backend failure: {0}")]
    BackendFailure(String),
}

/// A value to write through the seed API, already validated against its
/// target object kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedValue {
    Bit(bool),
    Register(RegisterValue, Encoding),
}

/// The storage abstraction both backends implement.
///
/// `read` serves protocol-level requests and always returns exactly
/// `quantity` elements on success. `write` is used only by the seed API and
/// by the external-KV backend's own auto-vivification; the wire protocol
/// this server speaks never writes.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn read(
        &self,
        kind: ObjectKind,
        first_address: Address,
        quantity: Quantity,
    ) -> Result<Response, DatastoreError>;

    async fn write(
        &self,
        kind: ObjectKind,
        address: Address,
        value: SeedValue,
    ) -> Result<(), DatastoreError>;

    /// A snapshot of the backend's contents, for diagnostics. Backends are
    /// free to describe what "contents" means for them; the external-KV
    /// backend, for instance, snapshots its address map rather than
    /// re-reading every key.
    async fn dump(&self) -> serde_json::Value;
}
