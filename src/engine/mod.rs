//! The mapping engine.
//!
//! `Engine` wires the collaborators together and owns the unit of work: it is
//! the single entry point for fetching, reading, mutating and saving managed
//! objects. The engine is synchronous and single-threaded; every remote call
//! blocks the calling path, and interior state lives behind a `RefCell`
//! (re-entering the engine from inside a `read`/`write` closure is reported
//! as an error, not a deadlock).

mod normalizer;
mod repository;
mod unit_of_work;

use std::cell::{RefCell, RefMut};
use std::sync::Arc;

use crate::cache::{Cache, MemoryCache};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ClassMetadata, Entity, MetadataRegistry};
use crate::object::Obj;
use crate::schema::SchemaCache;
use crate::transport::{Transport, WireRecord};
use crate::value::RecordId;

use normalizer::Converter;
use unit_of_work::{SlotState, UnitOfWork};

pub use repository::Repository;

/// Engine configuration: pluggable cache backends.
pub struct Configuration {
    schema_cache: Arc<dyn Cache>,
}

impl Configuration {
    /// Configuration with the in-memory schema cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_cache: Arc::new(MemoryCache::new()),
        }
    }

    /// Replaces the schema cache backend.
    #[must_use]
    pub fn with_schema_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.schema_cache = cache;
        self
    }

    /// The configured schema cache backend.
    #[must_use]
    pub fn schema_cache(&self) -> &Arc<dyn Cache> {
        &self.schema_cache
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// Object mapping engine over one remote store.
pub struct Engine {
    transport: Arc<dyn Transport>,
    configuration: Configuration,
    schema: SchemaCache,
    registry: MetadataRegistry,
    unit_of_work: RefCell<UnitOfWork>,
}

impl Engine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_configuration(transport, Configuration::default())
    }

    /// Creates an engine with an explicit configuration.
    #[must_use]
    pub fn with_configuration(transport: Arc<dyn Transport>, configuration: Configuration) -> Self {
        let schema = SchemaCache::new(transport.clone(), configuration.schema_cache().clone());
        Self {
            transport,
            configuration,
            schema,
            registry: MetadataRegistry::new(),
            unit_of_work: RefCell::new(UnitOfWork::new()),
        }
    }

    /// The engine's transport collaborator.
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// The engine's configuration.
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The engine's schema cache.
    #[must_use]
    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    /// Returns (deriving on first access) the class metadata for `T`.
    pub fn metadata<T: Entity>(&self) -> OrmResult<Arc<ClassMetadata>> {
        self.registry.class_metadata::<T>(&self.schema)
    }

    /// Registers `T` with the engine. Association targets must be registered
    /// before records referencing them are denormalized; this is the explicit
    /// way to do that up front.
    pub fn register<T: Entity>(&self) -> OrmResult<()> {
        self.metadata::<T>().map(|_| ())
    }

    /// Builds the typed repository for `T`.
    ///
    /// # Errors
    ///
    /// `MappingError::ClassNotSupported` when `T` has no model binding.
    pub fn repository<T: Entity>(&self) -> OrmResult<Repository<'_, T>> {
        Repository::new(self)
    }

    /// Fetches a record by id; missing records are an error.
    pub fn get<T: Entity>(&self, id: RecordId) -> OrmResult<Obj<T>> {
        self.repository::<T>()?.get(id)
    }

    /// Fetches a record by id; missing records yield `None`.
    pub fn find<T: Entity>(&self, id: RecordId) -> OrmResult<Option<Obj<T>>> {
        self.repository::<T>()?.find(id)
    }

    /// Takes ownership of a new object and returns its handle. The object
    /// becomes managed but nothing is written until [`Engine::persist`].
    pub fn attach<T: Entity>(&self, value: T) -> OrmResult<Obj<T>> {
        let metadata = self.metadata::<T>()?;
        let model_name = metadata.model_name_or_err()?.to_string();

        let mut uow = self.borrow_uow()?;
        let key = uow.insert(Box::new(value), metadata, SlotState::Ready);
        if let Some(id) = uow.read_id(key)? {
            uow.identity_claim(&model_name, id, key);
        }
        Ok(Obj::new(key))
    }

    /// Returns a reference-only handle to record `id` of type `T` without any
    /// remote call: a lazy proxy, materialized on first non-id access.
    pub fn reference<T: Entity>(&self, id: RecordId) -> OrmResult<Obj<T>> {
        let metadata = self.metadata::<T>()?;
        let mut uow = self.borrow_uow()?;
        let key = uow.create_proxy(&metadata, id)?;
        Ok(Obj::new(key))
    }

    /// Reads the object behind `obj`, materializing it first if it is an
    /// unmaterialized proxy.
    pub fn read<T: Entity, R>(&self, obj: Obj<T>, f: impl FnOnce(&T) -> R) -> OrmResult<R> {
        let mut uow = self.borrow_uow()?;
        let converter = Converter {
            registry: &self.registry,
        };
        unit_of_work::ensure_ready(self.transport.as_ref(), &converter, &mut uow, obj.key())?;

        let slot = uow.slot(obj.key())?;
        let instance = slot.object.downcast_ref::<T>().ok_or_else(|| {
            OrmError::internal(format!(
                "instance {} is not of type {}",
                obj.key(),
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(instance))
    }

    /// Mutates the object behind `obj`, materializing it first if needed.
    /// Changes stay local until [`Engine::persist`].
    pub fn write<T: Entity, R>(&self, obj: Obj<T>, f: impl FnOnce(&mut T) -> R) -> OrmResult<R> {
        let mut uow = self.borrow_uow()?;
        let converter = Converter {
            registry: &self.registry,
        };
        unit_of_work::ensure_ready(self.transport.as_ref(), &converter, &mut uow, obj.key())?;

        let slot = uow.slot_mut(obj.key())?;
        let instance = slot.object.downcast_mut::<T>().ok_or_else(|| {
            OrmError::internal(format!(
                "instance {} is not of type {}",
                obj.key(),
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(instance))
    }

    /// Reads the object's identifier. Never materializes a proxy.
    pub fn id_of<T: Entity>(&self, obj: Obj<T>) -> OrmResult<Option<RecordId>> {
        self.borrow_uow()?.read_id(obj.key())
    }

    /// Saves the object: `create` when it has no identifier yet, partial
    /// `update` otherwise. Saving an unchanged object is a no-op.
    pub fn persist<T: Entity>(&self, obj: Obj<T>) -> OrmResult<()> {
        let mut uow = self.borrow_uow()?;
        let converter = Converter {
            registry: &self.registry,
        };
        unit_of_work::persist(self.transport.as_ref(), &converter, &mut uow, obj.key())
    }

    /// Deletes the object's record and clears its local identifier.
    pub fn delete<T: Entity>(&self, obj: Obj<T>) -> OrmResult<()> {
        let mut uow = self.borrow_uow()?;
        unit_of_work::delete(self.transport.as_ref(), &mut uow, obj.key())
    }

    /// Re-reads the object's record from the store, overwriting local state.
    pub fn refresh<T: Entity>(&self, obj: Obj<T>) -> OrmResult<()> {
        let mut uow = self.borrow_uow()?;
        let converter = Converter {
            registry: &self.registry,
        };
        unit_of_work::refresh(self.transport.as_ref(), &converter, &mut uow, obj.key())
    }

    /// The last raw record seen for `(model, id)`, if any.
    #[must_use]
    pub fn cached_record(&self, model: &str, id: RecordId) -> Option<WireRecord> {
        self.unit_of_work
            .try_borrow()
            .ok()
            .and_then(|uow| uow.cached_record(model, id).cloned())
    }

    pub(crate) fn denormalize_record<T: Entity>(
        &self,
        metadata: &Arc<ClassMetadata>,
        record: &WireRecord,
    ) -> OrmResult<Obj<T>> {
        let mut uow = self.borrow_uow()?;
        let converter = Converter {
            registry: &self.registry,
        };
        let key = converter.denormalize(&mut uow, metadata, record)?;
        Ok(Obj::new(key))
    }

    fn borrow_uow(&self) -> OrmResult<RefMut<'_, UnitOfWork>> {
        self.unit_of_work
            .try_borrow_mut()
            .map_err(|_| OrmError::internal("engine re-entered from a read/write closure"))
    }
}
