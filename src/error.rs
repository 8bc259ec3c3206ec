//! Error types for the mapping engine.
//!
//! Every public operation either returns a well-typed result or fails with one
//! of the named kinds below; collaborator failures (transport, cache) are
//! wrapped so callers never see a foreign error type unwrapped.

use thiserror::Error;

use crate::transport::TransportError;
use crate::value::RecordId;

/// Remote schema discovery errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The remote store reports no model under the requested name.
    #[error("model \"{model}\" was not found on the remote store")]
    ModelNotFound {
        model: String,
    },
}

/// Static mapping-declaration errors.
///
/// These indicate a mismatch between declared descriptors and the remote
/// schema (or between two declarations). They are configuration errors:
/// surfaced immediately, never retried.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The type has no model binding and cannot be persisted or queried.
    #[error("type {class} is not bound to a remote model - did you forget the model binding in its descriptor?")]
    ClassNotSupported {
        class: &'static str,
    },

    /// A declared field name does not exist on the remote model.
    #[error("field \"{field}\" is not valid for the model of type {class}")]
    FieldNotSupported {
        field: String,
        class: &'static str,
    },

    /// The same property was declared twice for one type.
    #[error("cannot redeclare property \"{property}\" on type {class}")]
    DuplicateProperty {
        property: String,
        class: &'static str,
    },

    /// Two properties of one type map to the same remote field.
    #[error("cannot map field \"{field}\" to property \"{property}\" on type {class} because it is already mapped to property \"{existing}\"")]
    DuplicateField {
        field: String,
        property: String,
        existing: String,
        class: &'static str,
    },

    /// Two types claim the same remote model.
    #[error("cannot bind model \"{model}\" to type {class} because it is already bound to type {existing}")]
    DuplicateModel {
        model: String,
        class: &'static str,
        existing: &'static str,
    },

    /// No registered type claims the given remote model.
    #[error("no registered type is bound to model \"{model}\"")]
    ModelNotSupported {
        model: String,
    },

    /// The type declares no identifier property.
    #[error("no identifier property found for type {class}")]
    IdentifierNotFound {
        class: &'static str,
    },
}

/// Runtime conversion and collaborator failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A value could not be converted between its typed and wire forms.
    #[error("failed to convert value for property {property} (field kind \"{kind}\")")]
    ConversionFailed {
        property: String,
        kind: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A to-one association points at an object without a persisted id.
    #[error("cannot normalize property {property}: the referenced {class} object is not persisted yet")]
    UnpersistedAssociation {
        property: String,
        class: &'static str,
    },

    /// The cache backend itself failed (distinct from a failed compute).
    #[error("cache access failed for key \"{key}\": {message}")]
    CacheAccessFailed {
        key: String,
        message: String,
    },
}

/// Programmer errors in operation ordering.
#[derive(Debug, Error)]
pub enum LogicError {
    /// `refresh` or `delete` was called on an object without an identifier.
    #[error("object of type {class} is not persisted yet")]
    NotPersisted {
        class: &'static str,
    },
}

/// Top-level error type of the engine.
#[derive(Debug, Error)]
pub enum OrmError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("logic error: {0}")]
    Logic(#[from] LogicError),

    /// A record expected to exist was not found on the remote store.
    ///
    /// `get` and `refresh` fail with this kind; `find` returns `None` instead.
    #[error("record {id} of model \"{model}\" was not found")]
    RecordNotFound {
        model: String,
        id: RecordId,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Engine invariant violation (accessor-table type mismatch, unknown
    /// instance key). Indicates a bug, not a user error.
    #[error("internal error: {message}")]
    Internal {
        message: String,
    },
}

impl OrmError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a schema discovery error.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns true if this is a static mapping-declaration error.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Returns true if the error reports a missing record.
    #[must_use]
    pub const fn is_record_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    /// Returns true if the failure came from the transport collaborator.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias for engine operations.
pub type OrmResult<T> = Result<T, OrmError>;
