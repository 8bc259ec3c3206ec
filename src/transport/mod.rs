//! Abstract transport boundary to the remote record store.
//!
//! The engine talks to the store exclusively through [`Transport`]: a generic
//! create/read/update/delete/search/count surface over loosely-typed records.
//! By using a trait we enable:
//! - the in-memory backend for testing and embedded use
//! - real RPC clients for production stores
//!
//! A record is a string-keyed map of wire values; `false` is the store's null
//! sentinel for scalars. Retry, timeout and cancellation policy live behind
//! this boundary, never in the engine.

pub mod memory;

use std::fmt;

use thiserror::Error;

use crate::domain::Domain;
use crate::value::RecordId;

pub use memory::{CallStats, FieldSeed, MemoryTransport, ModelSeed};

/// Wire representation of one record.
pub type WireRecord = serde_json::Map<String, serde_json::Value>;

/// Errors reported by transport implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The store could not be reached.
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// A request could not be encoded.
    #[error("failed to serialize request: {message}")]
    SerializationFailed { message: String },

    /// A response could not be decoded.
    #[error("failed to deserialize response: {message}")]
    DeserializationFailed { message: String },

    /// The store rejected the request.
    #[error("server error (code {code}): {message}")]
    ServerError { code: u32, message: String },
}

/// Sort direction of one order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

/// Options for record and id queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    /// Fields to read; empty means all fields.
    pub fields: Vec<String>,
    /// Order clause, e.g. `"name asc, id desc"`.
    pub order: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Number of results to skip.
    pub offset: Option<u32>,
}

/// One write instruction for a record inside a to-many field.
///
/// The store applies these server-side when a relational field is written; the
/// converter emits them from the collection diff.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// Create a new related record from the given data and link it.
    Create(WireRecord),
    /// Update an already-linked record with the given data.
    Update(RecordId, WireRecord),
    /// Link an existing record by id.
    Link(RecordId),
    /// Unlink (detach) a record by id.
    Unlink(RecordId),
}

impl LinkCommand {
    /// Encodes the command as the store's `[op, id, data]` triplet.
    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        use serde_json::{json, Value};

        match self {
            Self::Create(data) => json!([0, 0, Value::Object(data.clone())]),
            Self::Update(id, data) => json!([1, id.as_i64(), Value::Object(data.clone())]),
            Self::Link(id) => json!([4, id.as_i64(), 0]),
            Self::Unlink(id) => json!([3, id.as_i64(), 0]),
        }
    }
}

/// Synchronous client surface of the remote record store.
///
/// Every call blocks until the store responds; the engine adds no concurrency
/// of its own.
pub trait Transport {
    /// Stable identity of the backing store (endpoint plus database), used to
    /// scope cache keys.
    fn identifier(&self) -> String;

    /// Reads one record by id, restricted to `fields` (empty = all). Returns
    /// `None` when the record does not exist.
    fn find(
        &self,
        model: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<WireRecord>, TransportError>;

    /// Reads all records matching `domain`.
    fn find_by(
        &self,
        model: &str,
        domain: Option<&Domain>,
        options: &SearchOptions,
    ) -> Result<Vec<WireRecord>, TransportError>;

    /// Returns ids of records matching `domain`.
    fn search(
        &self,
        model: &str,
        domain: Option<&Domain>,
        options: &SearchOptions,
    ) -> Result<Vec<RecordId>, TransportError>;

    /// Counts records matching `domain`.
    fn count(&self, model: &str, domain: Option<&Domain>) -> Result<u64, TransportError>;

    /// Tests whether a record exists.
    fn exists(&self, model: &str, id: RecordId) -> Result<bool, TransportError>;

    /// Creates a record and returns its new id.
    fn create(&self, model: &str, data: WireRecord) -> Result<RecordId, TransportError>;

    /// Applies a partial update to a record.
    fn update(&self, model: &str, id: RecordId, data: WireRecord) -> Result<(), TransportError>;

    /// Deletes a record.
    fn delete(&self, model: &str, id: RecordId) -> Result<(), TransportError>;
}
