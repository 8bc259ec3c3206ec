//! Per-type mapping metadata.
//!
//! `ClassMetadata` binds an entity type to its remote model and owns the
//! property-to-field mapping, which is a true bijection within the type:
//! declaring a property twice, or mapping two properties to one field, fails
//! at construction. `PropertyMetadata` is one pair of that mapping, holding
//! the remote field descriptor and the accessor closures.

use std::any::Any;
use std::collections::HashMap;

use crate::error::MappingError;
use crate::mapping::{AccessError, EntityDescriptor, GetFn, SetFn};
use crate::schema::{Field, Model};
use crate::value::TypedValue;

/// Metadata of one mapped property.
pub struct PropertyMetadata {
    property_name: &'static str,
    field_name: &'static str,
    class_name: &'static str,
    field: Field,
    get: GetFn,
    set: SetFn,
}

impl PropertyMetadata {
    /// The Rust-side property name.
    #[must_use]
    pub const fn property_name(&self) -> &'static str {
        self.property_name
    }

    /// The remote field name.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        self.field_name
    }

    /// The remote field descriptor this property is bound to.
    #[must_use]
    pub const fn field(&self) -> &Field {
        &self.field
    }

    /// `Type::property`, for diagnostics.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.class_name, self.property_name)
    }

    /// True when this property carries the record identifier.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        self.field.is_identifier()
    }

    /// Reads the property off an instance of the owning type.
    pub fn get(&self, instance: &dyn Any) -> Result<TypedValue, AccessError> {
        (self.get)(instance)
    }

    /// Writes the property on an instance of the owning type.
    pub fn set(&self, instance: &mut dyn Any, value: TypedValue) -> Result<(), AccessError> {
        (self.set)(instance, value)
    }
}

impl std::fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("property", &self.property_name)
            .field("field", &self.field_name)
            .field("kind", &self.field.kind)
            .finish_non_exhaustive()
    }
}

/// Mapping metadata of one entity type.
pub struct ClassMetadata {
    class_name: &'static str,
    model_name: Option<String>,
    repository: Option<&'static str>,
    transient: bool,
    new_instance: fn() -> Box<dyn Any>,
    properties: Vec<PropertyMetadata>,
    by_property: HashMap<&'static str, usize>,
    by_field: HashMap<&'static str, usize>,
}

impl ClassMetadata {
    /// Builds metadata by cross-referencing a descriptor against the remote
    /// model. With no model, the result is transient and no declared
    /// properties are inspected.
    pub(crate) fn from_descriptor(
        descriptor: EntityDescriptor,
        model: Option<&Model>,
    ) -> Result<Self, MappingError> {
        let mut metadata = Self {
            class_name: descriptor.class_name,
            model_name: model.map(|model| model.name.clone()),
            repository: descriptor.repository,
            transient: model.map_or(true, Model::is_transient),
            new_instance: descriptor.new_instance,
            properties: Vec::new(),
            by_property: HashMap::new(),
            by_field: HashMap::new(),
        };

        let Some(model) = model else {
            return Ok(metadata);
        };

        for declared in descriptor.properties {
            let field = model
                .field(declared.field)
                .ok_or(MappingError::FieldNotSupported {
                    field: declared.field.to_string(),
                    class: metadata.class_name,
                })?
                .clone();

            metadata.add_property(PropertyMetadata {
                property_name: declared.property,
                field_name: declared.field,
                class_name: metadata.class_name,
                field,
                get: declared.get,
                set: declared.set,
            })?;
        }

        Ok(metadata)
    }

    fn add_property(&mut self, property: PropertyMetadata) -> Result<(), MappingError> {
        if self.by_property.contains_key(property.property_name) {
            return Err(MappingError::DuplicateProperty {
                property: property.property_name.to_string(),
                class: self.class_name,
            });
        }
        if let Some(existing) = self.by_field.get(property.field_name) {
            return Err(MappingError::DuplicateField {
                field: property.field_name.to_string(),
                property: property.property_name.to_string(),
                existing: self.properties[*existing].property_name.to_string(),
                class: self.class_name,
            });
        }

        let index = self.properties.len();
        self.by_property.insert(property.property_name, index);
        self.by_field.insert(property.field_name, index);
        self.properties.push(property);
        Ok(())
    }

    /// The Rust type name.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The bound remote model name, if any.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// The bound remote model name, or `ClassNotSupported` for unbound types.
    pub fn model_name_or_err(&self) -> Result<&str, MappingError> {
        self.model_name
            .as_deref()
            .ok_or(MappingError::ClassNotSupported {
                class: self.class_name,
            })
    }

    /// The declared repository tag, if any.
    #[must_use]
    pub const fn repository(&self) -> Option<&'static str> {
        self.repository
    }

    /// Transient types are not persistable (unbound, or bound to a transient
    /// remote model).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    /// Mapped properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter()
    }

    pub(crate) fn property_at(&self, index: usize) -> Option<&PropertyMetadata> {
        self.properties.get(index)
    }

    pub(crate) fn property_index(&self, field_name: &str) -> Option<usize> {
        self.by_field.get(field_name).copied()
    }

    /// Looks up a property by its Rust-side name.
    #[must_use]
    pub fn property(&self, property_name: &str) -> Option<&PropertyMetadata> {
        self.by_property
            .get(property_name)
            .map(|index| &self.properties[*index])
    }

    /// Looks up a property by its remote field name.
    #[must_use]
    pub fn resolve_property(&self, field_name: &str) -> Option<&PropertyMetadata> {
        self.by_field
            .get(field_name)
            .map(|index| &self.properties[*index])
    }

    #[must_use]
    pub fn has_property(&self, property_name: &str) -> bool {
        self.by_property.contains_key(property_name)
    }

    #[must_use]
    pub fn has_field(&self, field_name: &str) -> bool {
        self.by_field.contains_key(field_name)
    }

    /// The identifier property, when mapped.
    #[must_use]
    pub fn id_property(&self) -> Option<&PropertyMetadata> {
        self.resolve_property("id")
    }

    /// The identifier property, or `IdentifierNotFound`.
    pub fn id_property_or_err(&self) -> Result<&PropertyMetadata, MappingError> {
        self.id_property().ok_or(MappingError::IdentifierNotFound {
            class: self.class_name,
        })
    }

    /// All mapped remote field names, in declaration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.properties
            .iter()
            .map(|property| property.field_name.to_string())
            .collect()
    }

    /// Creates a blank instance of the owning type.
    pub(crate) fn new_instance(&self) -> Box<dyn Any> {
        (self.new_instance)()
    }
}

impl std::fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("class", &self.class_name)
            .field("model", &self.model_name)
            .field("transient", &self.transient)
            .field("properties", &self.properties.len())
            .finish()
    }
}
