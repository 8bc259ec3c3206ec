//! Bidirectional conversion between managed objects and wire records.
//!
//! Normalization walks the mapped properties of an object and produces the
//! write payload: scalars with the `false` null sentinel, dates in the store's
//! formats, to-one associations as bare ids, and to-many associations as a
//! structurally-diffed link-command list. Given a prior snapshot, scalar and
//! to-one fields equal to it are suppressed, which is what turns a save into a
//! partial update; to-many fields are never equality-suppressed (their command
//! list is omitted when it is empty or only re-links already-stored members).
//!
//! Denormalization is the inverse: `false` and absent become `None`, to-one
//! ids become lazy proxies, and to-many id sets become lazy collections. No
//! remote call is made for either.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::error::{OrmError, OrmResult, RuntimeError};
use crate::mapping::{AccessError, ClassMetadata, MetadataRegistry, PropertyMetadata};
use crate::object::{ErasedCollection, InstanceKey};
use crate::schema::FieldKind;
use crate::transport::{LinkCommand, WireRecord};
use crate::value::{wire, RecordId, TypedValue};

use super::unit_of_work::{access_internal, SlotState, UnitOfWork};

/// Shape mismatch between a wire value and its field kind.
#[derive(Debug, Error)]
#[error("{0}")]
struct ShapeError(String);

fn shape(message: impl Into<String>) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(ShapeError(message.into()))
}

/// The value converter. Association handling needs the registry to map target
/// model names back to local types.
pub(crate) struct Converter<'a> {
    pub registry: &'a MetadataRegistry,
}

impl Converter<'_> {
    /// Converts an object into its wire payload.
    ///
    /// With `prior` set, fields whose computed value equals the snapshot's
    /// are dropped, yielding the partial-update payload.
    pub fn normalize(
        &self,
        uow: &UnitOfWork,
        key: InstanceKey,
        prior: Option<&WireRecord>,
    ) -> OrmResult<WireRecord> {
        let slot = uow.slot(key)?;
        let metadata = slot.metadata.clone();
        let object = slot.object.as_ref();

        let mut data = WireRecord::new();
        for property in metadata.properties() {
            let field = property.field();
            if field.read_only {
                continue;
            }

            let typed = property
                .get(object)
                .map_err(|err| self.wrap_access(property, err))?;

            let wire_value = match &field.kind {
                FieldKind::OneToMany | FieldKind::ManyToMany => {
                    let Some(commands) = self.collection_commands(uow, property, &typed)? else {
                        continue;
                    };
                    if commands.is_empty() {
                        continue;
                    }
                    Value::Array(commands)
                }
                _ => self
                    .typed_to_wire(uow, property, typed)
                    .map_err(|cause| self.conversion_error(property, cause))?,
            };

            if !field.is_multiple_association() {
                if let Some(old) = prior.and_then(|prior| prior.get(&field.name)) {
                    let old = if field.is_single_association() {
                        wire::opt_record_id(old).map_or(Value::Bool(false), Value::from)
                    } else {
                        old.clone()
                    };
                    if old == wire_value {
                        continue;
                    }
                }
            }

            data.insert(field.name.clone(), wire_value);
        }

        Ok(data)
    }

    /// Converts one non-collection typed value to its wire form.
    fn typed_to_wire(
        &self,
        uow: &UnitOfWork,
        property: &PropertyMetadata,
        typed: TypedValue,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let field = property.field();
        let value = match &field.kind {
            FieldKind::Boolean => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Bool(v) => Value::Bool(v),
                other => return Err(mismatch(&other, field)),
            },
            FieldKind::Integer => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Int(v) => Value::from(v),
                other => return Err(mismatch(&other, field)),
            },
            FieldKind::Float | FieldKind::Monetary => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Float(v) => Value::from(v),
                TypedValue::Int(v) => Value::from(v as f64),
                other => return Err(mismatch(&other, field)),
            },
            FieldKind::Binary
            | FieldKind::Char
            | FieldKind::Html
            | FieldKind::Selection
            | FieldKind::Text => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Text(v) => Value::from(v),
                other => return Err(mismatch(&other, field)),
            },
            FieldKind::Date | FieldKind::DateTime => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Date(date) => Value::from(
                    date.and_time(chrono::NaiveTime::MIN)
                        .format(field.date_format())
                        .to_string(),
                ),
                TypedValue::DateTime(at) => {
                    Value::from(at.naive_utc().format(field.date_format()).to_string())
                }
                other => return Err(mismatch(&other, field)),
            },
            FieldKind::ManyToOne => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Reference(erased) => {
                    let target = uow.slot(erased.key())?;
                    match uow.read_id(erased.key())? {
                        Some(id) => Value::from(id),
                        None => {
                            return Err(Box::new(OrmError::from(
                                RuntimeError::UnpersistedAssociation {
                                    property: property.full_name(),
                                    class: target.metadata.class_name(),
                                },
                            )))
                        }
                    }
                }
                // Raw wire data held verbatim: extract the id.
                TypedValue::Json(raw) => {
                    wire::opt_record_id(&raw).map_or(Value::Bool(false), Value::from)
                }
                other => return Err(mismatch(&other, field)),
            },
            FieldKind::OneToMany | FieldKind::ManyToMany => {
                return Err(shape("collection field reached scalar conversion"))
            }
            FieldKind::Other(_) => match typed {
                TypedValue::Null => Value::Bool(false),
                TypedValue::Json(raw) => raw,
                other => return Err(mismatch(&other, field)),
            },
        };
        Ok(value)
    }

    /// Diffs a collection into link commands. `None` means the property holds
    /// no collection at all (skip the field).
    fn collection_commands(
        &self,
        uow: &UnitOfWork,
        property: &PropertyMetadata,
        typed: &TypedValue,
    ) -> OrmResult<Option<Vec<Value>>> {
        let collection: &ErasedCollection = match typed {
            TypedValue::Null => return Ok(None),
            TypedValue::Many(collection) => collection,
            other => {
                return Err(self.conversion_error(
                    property,
                    mismatch(other, property.field()),
                ))
            }
        };

        let mut retained: Vec<RecordId> = Vec::new();
        let mut commands: Vec<LinkCommand> = Vec::new();

        for member in collection.members() {
            let state = uow.slot(*member)?.state;
            match uow.read_id(*member)? {
                // Unpersisted member: create it in place.
                None => {
                    let mut payload = self.normalize(uow, *member, None)?;
                    payload.remove("id");
                    commands.push(LinkCommand::Create(payload));
                }
                Some(id) => {
                    retained.push(id);
                    if state != SlotState::Ready {
                        // An unmaterialized proxy has no payload to diff; a
                        // newly added reference still needs an explicit link.
                        if !collection.stored_ids().contains(&id) {
                            commands.push(LinkCommand::Link(id));
                        }
                        continue;
                    }
                    let prior = uow.snapshot(*member);
                    let mut payload = self.normalize(uow, *member, prior)?;
                    payload.remove("id");
                    if payload.is_empty() {
                        commands.push(LinkCommand::Link(id));
                    } else {
                        commands.push(LinkCommand::Update(id, payload));
                    }
                }
            }
        }

        let stored = collection.stored_ids();
        for stored_id in stored {
            if !retained.contains(stored_id) {
                commands.push(LinkCommand::Unlink(*stored_id));
            }
        }

        // Re-linking members that are already stored is a net no-op; dropping
        // such a diff keeps an untouched association off the wire.
        if commands
            .iter()
            .all(|command| matches!(command, LinkCommand::Link(id) if stored.contains(id)))
        {
            return Ok(Some(Vec::new()));
        }

        Ok(Some(
            commands.iter().map(LinkCommand::to_wire).collect(),
        ))
    }

    /// Denormalizes a record into a new or identity-mapped instance and
    /// returns its key. The instance ends up materialized.
    pub fn denormalize(
        &self,
        uow: &mut UnitOfWork,
        metadata: &Arc<ClassMetadata>,
        record: &WireRecord,
    ) -> OrmResult<InstanceKey> {
        let model_name = metadata.model_name_or_err()?.to_string();
        let id = record.get("id").and_then(wire::opt_record_id);

        let key = match id.and_then(|id| uow.identity_get(&model_name, id)) {
            Some(existing) => existing,
            None => {
                let object = metadata.new_instance();
                let key = uow.insert(object, metadata.clone(), SlotState::Ready);
                if let Some(id) = id {
                    uow.identity_claim(&model_name, id, key);
                }
                key
            }
        };

        self.denormalize_into(uow, key, metadata, record)?;
        uow.set_state(key, SlotState::Ready)?;
        Ok(key)
    }

    /// Denormalizes a record into an existing instance, overwriting its
    /// snapshot. Unmapped wire fields are skipped silently.
    pub fn denormalize_into(
        &self,
        uow: &mut UnitOfWork,
        key: InstanceKey,
        metadata: &Arc<ClassMetadata>,
        record: &WireRecord,
    ) -> OrmResult<()> {
        let model_name = metadata.model_name_or_err()?.to_string();
        if let Some(id) = record.get("id").and_then(wire::opt_record_id) {
            uow.cache_record(&model_name, id, record.clone());
        }

        // Two phases: association conversion creates proxy slots, which needs
        // the unit of work mutable, so values are built before the target
        // object is borrowed.
        let mut assignments: Vec<(usize, TypedValue)> = Vec::new();
        for (field_name, value) in record {
            let Some(index) = metadata.property_index(field_name) else {
                continue;
            };
            let Some(property) = metadata.property_at(index) else {
                continue;
            };
            let typed = self.wire_to_typed(uow, property, value)?;
            assignments.push((index, typed));
        }

        let slot = uow.slot_mut(key)?;
        let object = slot.object.as_mut();
        for (index, typed) in assignments {
            let Some(property) = metadata.property_at(index) else {
                continue;
            };
            property
                .set(object, typed)
                .map_err(|err| self.wrap_access(property, err))?;
        }

        uow.set_snapshot(key, record.clone());
        Ok(())
    }

    /// Converts one wire value to its typed form, creating proxies and
    /// collections for association fields.
    fn wire_to_typed(
        &self,
        uow: &mut UnitOfWork,
        property: &PropertyMetadata,
        value: &Value,
    ) -> OrmResult<TypedValue> {
        let field = property.field();

        if field.is_identifier() {
            // Identifier is copied verbatim.
            return Ok(wire::opt_record_id(value).map_or(TypedValue::Null, TypedValue::from));
        }

        let typed = match &field.kind {
            FieldKind::Boolean => TypedValue::Bool(match value {
                Value::Bool(v) => *v,
                Value::Null => false,
                Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
                Value::String(s) => !s.is_empty(),
                other => {
                    return Err(self.conversion_error(property, mismatch_wire(other, field)))
                }
            }),
            FieldKind::Integer => {
                if wire::is_absent(value) {
                    TypedValue::Null
                } else {
                    match wire::opt_i64(value) {
                        Some(v) => TypedValue::Int(v),
                        None => {
                            return Err(
                                self.conversion_error(property, mismatch_wire(value, field))
                            )
                        }
                    }
                }
            }
            FieldKind::Float | FieldKind::Monetary => {
                if wire::is_absent(value) {
                    TypedValue::Null
                } else {
                    match value.as_f64() {
                        Some(v) => TypedValue::Float(v),
                        None => {
                            return Err(
                                self.conversion_error(property, mismatch_wire(value, field))
                            )
                        }
                    }
                }
            }
            FieldKind::Binary
            | FieldKind::Char
            | FieldKind::Html
            | FieldKind::Selection
            | FieldKind::Text => {
                if wire::is_absent(value) {
                    TypedValue::Null
                } else {
                    match value {
                        Value::String(s) => TypedValue::Text(s.clone()),
                        Value::Number(n) => TypedValue::Text(n.to_string()),
                        other => {
                            return Err(
                                self.conversion_error(property, mismatch_wire(other, field))
                            )
                        }
                    }
                }
            }
            FieldKind::Date => {
                if wire::is_absent(value) {
                    TypedValue::Null
                } else {
                    let text = wire::opt_str(value).ok_or_else(|| {
                        self.conversion_error(property, mismatch_wire(value, field))
                    })?;
                    let date = NaiveDate::parse_from_str(text, field.date_format())
                        .map_err(|err| self.conversion_error(property, Box::new(err)))?;
                    TypedValue::Date(date)
                }
            }
            FieldKind::DateTime => {
                if wire::is_absent(value) {
                    TypedValue::Null
                } else {
                    let text = wire::opt_str(value).ok_or_else(|| {
                        self.conversion_error(property, mismatch_wire(value, field))
                    })?;
                    let naive = NaiveDateTime::parse_from_str(text, field.date_format())
                        .map_err(|err| self.conversion_error(property, Box::new(err)))?;
                    TypedValue::DateTime(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
                }
            }
            FieldKind::ManyToOne => match wire::opt_record_id(value) {
                // A bare id becomes a lazy proxy of the target type.
                Some(id) => {
                    let target = self.target_metadata(property)?;
                    let proxy = uow.create_proxy(&target, id)?;
                    TypedValue::Reference(crate::object::ErasedObj { key: proxy })
                }
                None => TypedValue::Null,
            },
            FieldKind::OneToMany | FieldKind::ManyToMany => {
                let ids = wire::record_ids(value);
                let target = self.target_metadata(property)?;
                TypedValue::Many(uow.create_collection(&target, &ids)?)
            }
            FieldKind::Other(_) => TypedValue::Json(value.clone()),
        };

        Ok(typed)
    }

    /// Resolves the local type mapped to an association's target model.
    fn target_metadata(&self, property: &PropertyMetadata) -> OrmResult<Arc<ClassMetadata>> {
        let field = property.field();
        let target_model = field.target_model.as_deref().ok_or_else(|| {
            self.conversion_error(
                property,
                shape(format!(
                    "field \"{}\" of kind \"{}\" declares no association target",
                    field.name, field.kind
                )),
            )
        })?;
        self.registry.resolve_by_model_name(target_model)
    }

    fn conversion_error(
        &self,
        property: &PropertyMetadata,
        cause: Box<dyn std::error::Error + Send + Sync>,
    ) -> OrmError {
        // Engine errors raised mid-conversion keep their own kind.
        match cause.downcast::<OrmError>() {
            Ok(inner) => *inner,
            Err(cause) => RuntimeError::ConversionFailed {
                property: property.full_name(),
                kind: property.field().kind.wire_name().to_string(),
                source: cause,
            }
            .into(),
        }
    }

    fn wrap_access(&self, property: &PropertyMetadata, err: AccessError) -> OrmError {
        match err {
            AccessError::Value(cause) => RuntimeError::ConversionFailed {
                property: property.full_name(),
                kind: property.field().kind.wire_name().to_string(),
                source: Box::new(cause),
            }
            .into(),
            err @ AccessError::InstanceType { .. } => access_internal(err),
        }
    }
}

fn mismatch(
    value: &TypedValue,
    field: &crate::schema::Field,
) -> Box<dyn std::error::Error + Send + Sync> {
    shape(format!(
        "cannot convert {} value to field kind \"{}\"",
        value.type_name(),
        field.kind
    ))
}

fn mismatch_wire(
    value: &Value,
    field: &crate::schema::Field,
) -> Box<dyn std::error::Error + Send + Sync> {
    let shape_name = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    shape(format!(
        "cannot convert wire {shape_name} to field kind \"{}\"",
        field.kind
    ))
}
