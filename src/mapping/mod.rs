//! Declarative mapping descriptors.
//!
//! Entity types declare their binding to a remote model with a builder: an
//! optional model name plus one `(property, field)` pair per mapped property,
//! each carrying typed get/set closures. The closures form the accessor table
//! that replaces reflective property access; building them happens once per
//! type, at metadata-load time.
//!
//! ```
//! use remodel::{Entity, EntityDescriptor, RecordId};
//!
//! #[derive(Debug, Default)]
//! struct Tag {
//!     id: Option<RecordId>,
//!     name: Option<String>,
//! }
//!
//! impl Entity for Tag {
//!     fn descriptor() -> EntityDescriptor {
//!         EntityDescriptor::model::<Self>("res.partner.tag")
//!             .property("id", "id", |t| t.id.into(), |t, v| {
//!                 t.id = v.try_into()?;
//!                 Ok(())
//!             })
//!             .property("name", "name", |t| t.name.clone().into(), |t, v| {
//!                 t.name = v.try_into()?;
//!                 Ok(())
//!             })
//!             .build()
//!     }
//! }
//! ```

pub mod class_metadata;
pub mod registry;

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use thiserror::Error;

use crate::value::{TypedValue, ValueTypeError};

pub use class_metadata::{ClassMetadata, PropertyMetadata};
pub use registry::MetadataRegistry;

/// A type mappable onto the remote store.
///
/// `Default` provides the blank instance the engine fills when denormalizing
/// records and building lazy proxies.
pub trait Entity: Default + Sized + 'static {
    /// The type's declarative mapping.
    fn descriptor() -> EntityDescriptor;
}

/// Failure inside an accessor-table closure.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The slab object is not of the closure's type. Engine bug class.
    #[error("instance is not of type {expected}")]
    InstanceType { expected: &'static str },

    /// The supplied value does not fit the property's Rust type.
    #[error(transparent)]
    Value(#[from] ValueTypeError),
}

pub(crate) type GetFn = Box<dyn Fn(&dyn Any) -> Result<TypedValue, AccessError>>;
pub(crate) type SetFn = Box<dyn Fn(&mut dyn Any, TypedValue) -> Result<(), AccessError>>;

/// One declared property-to-field binding with its accessors.
pub struct PropertyDescriptor {
    pub(crate) property: &'static str,
    pub(crate) field: &'static str,
    pub(crate) get: GetFn,
    pub(crate) set: SetFn,
}

fn new_boxed<T: Entity>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// Declarative class-level binding of one entity type.
pub struct EntityDescriptor {
    pub(crate) class_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) model: Option<&'static str>,
    pub(crate) repository: Option<&'static str>,
    pub(crate) new_instance: fn() -> Box<dyn Any>,
    pub(crate) properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    /// Declares a type with no model binding. Such types are legal but not
    /// mappable; the registry produces transient metadata for them.
    #[must_use]
    pub fn transient<T: Entity>() -> Self {
        Self {
            class_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            model: None,
            repository: None,
            new_instance: new_boxed::<T>,
            properties: Vec::new(),
        }
    }

    /// Declares a type bound to the given remote model and starts the
    /// property list.
    #[must_use]
    pub fn model<T: Entity>(model: &'static str) -> DescriptorBuilder<T> {
        DescriptorBuilder {
            inner: Self {
                model: Some(model),
                ..Self::transient::<T>()
            },
            marker: PhantomData,
        }
    }

    /// The Rust type name, for diagnostics.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The declared remote model name, if any.
    #[must_use]
    pub const fn model_name(&self) -> Option<&'static str> {
        self.model
    }

    /// The declared repository tag, if any.
    #[must_use]
    pub const fn repository(&self) -> Option<&'static str> {
        self.repository
    }
}

/// Typed builder for [`EntityDescriptor`].
pub struct DescriptorBuilder<T: Entity> {
    inner: EntityDescriptor,
    marker: PhantomData<fn() -> T>,
}

impl<T: Entity> DescriptorBuilder<T> {
    /// Tags the type with a custom repository name. The engine treats the tag
    /// as opaque; custom repositories are wrapper types on the caller side.
    #[must_use]
    pub fn repository(mut self, name: &'static str) -> Self {
        self.inner.repository = Some(name);
        self
    }

    /// Declares one property-to-field binding with its typed accessors.
    #[must_use]
    pub fn property<G, S>(
        mut self,
        property: &'static str,
        field: &'static str,
        get: G,
        set: S,
    ) -> Self
    where
        G: Fn(&T) -> TypedValue + 'static,
        S: Fn(&mut T, TypedValue) -> Result<(), ValueTypeError> + 'static,
    {
        let expected = std::any::type_name::<T>();
        let get: GetFn = Box::new(move |any| {
            let instance = any
                .downcast_ref::<T>()
                .ok_or(AccessError::InstanceType { expected })?;
            Ok(get(instance))
        });
        let set: SetFn = Box::new(move |any, value| {
            let instance = any
                .downcast_mut::<T>()
                .ok_or(AccessError::InstanceType { expected })?;
            set(instance, value).map_err(AccessError::from)
        });

        self.inner.properties.push(PropertyDescriptor {
            property,
            field,
            get,
            set,
        });
        self
    }

    /// Finishes the declaration.
    #[must_use]
    pub fn build(self) -> EntityDescriptor {
        self.inner
    }
}
