//! Engine-scoped class metadata registry.
//!
//! Metadata is computed once per type and cached for the engine's lifetime.
//! The registry also maintains the reverse index from remote model names to
//! registered types, which is how association targets resolve back to local
//! types. There is deliberately no global state: each engine owns one
//! registry.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MappingError, OrmError, OrmResult};
use crate::mapping::{ClassMetadata, Entity};
use crate::schema::SchemaCache;

/// Compute-if-absent store of [`ClassMetadata`], scoped to one engine.
#[derive(Default)]
pub struct MetadataRegistry {
    by_type: RefCell<HashMap<TypeId, Arc<ClassMetadata>>>,
    by_model: RefCell<HashMap<String, TypeId>>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns metadata for `T`, deriving it on first access.
    ///
    /// Derivation reads the type's descriptor, resolves the remote model
    /// through the schema cache when one is bound, and cross-references each
    /// declared field against it.
    pub fn class_metadata<T: Entity>(&self, schema: &SchemaCache) -> OrmResult<Arc<ClassMetadata>> {
        let type_id = TypeId::of::<T>();
        if let Some(metadata) = self.by_type.borrow().get(&type_id) {
            return Ok(metadata.clone());
        }

        let descriptor = T::descriptor();
        if descriptor.type_id != type_id {
            return Err(OrmError::internal(format!(
                "descriptor of {} was built for a different type",
                std::any::type_name::<T>()
            )));
        }

        // Resolve the remote model outside any registry borrow: the schema
        // fetch goes through the transport and must not re-enter us holding
        // a borrow.
        let model = match descriptor.model {
            Some(model_name) => Some(schema.model(model_name)?),
            None => None,
        };

        let metadata = Arc::new(ClassMetadata::from_descriptor(
            descriptor,
            model.as_deref(),
        )?);

        if let Some(model_name) = metadata.model_name() {
            let mut by_model = self.by_model.borrow_mut();
            if let Some(existing_type) = by_model.get(model_name) {
                if *existing_type != type_id {
                    let existing = self
                        .by_type
                        .borrow()
                        .get(existing_type)
                        .map_or("<unknown>", |metadata| metadata.class_name());
                    return Err(MappingError::DuplicateModel {
                        model: model_name.to_string(),
                        class: metadata.class_name(),
                        existing,
                    }
                    .into());
                }
            }
            by_model.insert(model_name.to_string(), type_id);
        }

        self.by_type.borrow_mut().insert(type_id, metadata.clone());
        Ok(metadata)
    }

    /// Returns already-derived metadata by type id, if present.
    #[must_use]
    pub fn get(&self, type_id: TypeId) -> Option<Arc<ClassMetadata>> {
        self.by_type.borrow().get(&type_id).cloned()
    }

    /// Maps a remote model name back to the registered local type.
    ///
    /// # Errors
    ///
    /// `MappingError::ModelNotSupported` when no registered type claims the
    /// model. Types are registered on first metadata access, so association
    /// targets must be loaded before records referencing them are read.
    pub fn resolve_by_model_name(&self, model_name: &str) -> OrmResult<Arc<ClassMetadata>> {
        let type_id = self
            .by_model
            .borrow()
            .get(model_name)
            .copied()
            .ok_or_else(|| MappingError::ModelNotSupported {
                model: model_name.to_string(),
            })?;

        self.get(type_id).ok_or_else(|| {
            OrmError::internal(format!(
                "model \"{model_name}\" is indexed but its metadata is missing"
            ))
        })
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.borrow().is_empty()
    }
}
