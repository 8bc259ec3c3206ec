//! # Remodel - typed objects over a dynamically-typed record store
//!
//! Remodel maps typed in-memory objects onto records of a remote
//! business-object store that is reachable only through a generic
//! create/read/update/delete/search/count surface. The store exposes no
//! static schema: field names, kinds and associations are discovered at
//! runtime and cached.
//!
//! ## Core Concepts
//!
//! - **Entity**: a Rust type declaring its binding to a remote model
//! - **Engine**: the unit of work - identity map, dirty tracking, saves
//! - **Repository**: per-type query surface (`get`, `find_by`, `search`, ...)
//! - **Obj / Collection**: handles to managed objects and lazy associations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use remodel::{Domain, Engine, Entity, EntityDescriptor, Obj, RecordId};
//!
//! let engine = Engine::new(transport);
//! engine.register::<Company>()?;
//!
//! // Fetch, mutate, save: only changed fields go over the wire.
//! let partner: Obj<Partner> = engine.get(RecordId::new(42))?;
//! engine.write(partner, |p| p.email = Some("new@example.com".into()))?;
//! engine.persist(partner)?;
//!
//! // Associations materialize lazily, on first non-id access.
//! let company = engine.read(partner, |p| p.company)?.unwrap();
//! let name = engine.read(company, |c| c.name.clone())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cache;
pub mod domain;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod object;
pub mod schema;
pub mod transport;
pub mod value;

// Re-export primary types at crate root for convenience
pub use cache::{Cache, CacheError, CacheFailure, CachedValue, MemoryCache};
pub use domain::Domain;
pub use engine::{Configuration, Engine, Repository};
pub use error::{LogicError, MappingError, OrmError, OrmResult, RuntimeError, SchemaError};
pub use mapping::{
    AccessError, ClassMetadata, DescriptorBuilder, Entity, EntityDescriptor, MetadataRegistry,
    PropertyMetadata,
};
pub use object::{Collection, ErasedCollection, ErasedObj, InstanceKey, Obj};
pub use schema::{Choice, Field, FieldKind, Model, SchemaCache, Selection};
pub use transport::{
    CallStats, FieldSeed, LinkCommand, MemoryTransport, ModelSeed, Order, SearchOptions,
    Transport, TransportError, WireRecord,
};
pub use value::{RecordId, TypedValue, ValueTypeError};
