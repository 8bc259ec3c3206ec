//! Unit of work: object slab, identity map, snapshots and write orchestration.
//!
//! Managed objects live here. Each slot carries the object, its class
//! metadata and its proxy state; alongside the slab sit the per-instance wire
//! snapshots (the diff base for partial updates), the per-(model, id) record
//! cache, and the identity index that makes repeated fetches of one record
//! resolve to one instance.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{LogicError, OrmError, OrmResult};
use crate::mapping::{AccessError, ClassMetadata};
use crate::object::{ErasedCollection, InstanceKey};
use crate::transport::{Transport, WireRecord};
use crate::value::{RecordId, TypedValue};

use super::normalizer::Converter;

/// Lazy-proxy state of a slot.
///
/// `Uninitialized` slots hold only their identifier; the first access to any
/// other property moves them through `Initializing` (a re-entrancy guard)
/// into `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Uninitialized,
    Initializing,
    Ready,
}

pub(crate) struct Slot {
    pub object: Box<dyn Any>,
    pub metadata: Arc<ClassMetadata>,
    pub state: SlotState,
}

pub(crate) fn access_internal(err: AccessError) -> OrmError {
    OrmError::internal(format!("accessor failure: {err}"))
}

#[derive(Default)]
pub(crate) struct UnitOfWork {
    slots: HashMap<InstanceKey, Slot>,
    snapshots: HashMap<InstanceKey, WireRecord>,
    records: HashMap<(String, RecordId), WireRecord>,
    identity: HashMap<(String, RecordId), InstanceKey>,
    next_key: u64,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        object: Box<dyn Any>,
        metadata: Arc<ClassMetadata>,
        state: SlotState,
    ) -> InstanceKey {
        self.next_key += 1;
        let key = InstanceKey::new(self.next_key);
        self.slots.insert(
            key,
            Slot {
                object,
                metadata,
                state,
            },
        );
        key
    }

    pub fn slot(&self, key: InstanceKey) -> OrmResult<&Slot> {
        self.slots
            .get(&key)
            .ok_or_else(|| OrmError::internal(format!("unknown instance {key}")))
    }

    pub fn slot_mut(&mut self, key: InstanceKey) -> OrmResult<&mut Slot> {
        self.slots
            .get_mut(&key)
            .ok_or_else(|| OrmError::internal(format!("unknown instance {key}")))
    }

    pub fn set_state(&mut self, key: InstanceKey, state: SlotState) -> OrmResult<()> {
        self.slot_mut(key)?.state = state;
        Ok(())
    }

    /// Reads the identifier property without touching the proxy state.
    pub fn read_id(&self, key: InstanceKey) -> OrmResult<Option<RecordId>> {
        let slot = self.slot(key)?;
        let property = slot.metadata.id_property_or_err()?;
        match property.get(slot.object.as_ref()).map_err(access_internal)? {
            TypedValue::Null => Ok(None),
            TypedValue::Int(raw) => Ok(Some(RecordId::new(raw))),
            other => Err(OrmError::internal(format!(
                "identifier property of {} returned a {} value",
                slot.metadata.class_name(),
                other.type_name()
            ))),
        }
    }

    pub fn set_id(&mut self, key: InstanceKey, id: Option<RecordId>) -> OrmResult<()> {
        let slot = self.slot_mut(key)?;
        let Slot {
            object, metadata, ..
        } = slot;
        let property = metadata.id_property_or_err()?;
        let value = id.map_or(TypedValue::Null, TypedValue::from);
        property.set(object.as_mut(), value).map_err(access_internal)
    }

    pub fn snapshot(&self, key: InstanceKey) -> Option<&WireRecord> {
        self.snapshots.get(&key)
    }

    pub fn set_snapshot(&mut self, key: InstanceKey, record: WireRecord) {
        self.snapshots.insert(key, record);
    }

    pub fn clear_snapshot(&mut self, key: InstanceKey) {
        self.snapshots.remove(&key);
    }

    pub fn cache_record(&mut self, model: &str, id: RecordId, record: WireRecord) {
        self.records.insert((model.to_string(), id), record);
    }

    pub fn cached_record(&self, model: &str, id: RecordId) -> Option<&WireRecord> {
        self.records.get(&(model.to_string(), id))
    }

    pub fn remove_record(&mut self, model: &str, id: RecordId) {
        self.records.remove(&(model.to_string(), id));
    }

    pub fn identity_get(&self, model: &str, id: RecordId) -> Option<InstanceKey> {
        self.identity.get(&(model.to_string(), id)).copied()
    }

    /// Registers `key` as the canonical instance of `(model, id)`, keeping an
    /// earlier registration when one exists.
    pub fn identity_claim(&mut self, model: &str, id: RecordId, key: InstanceKey) {
        if let Entry::Vacant(entry) = self.identity.entry((model.to_string(), id)) {
            entry.insert(key);
        }
    }

    pub fn identity_remove(&mut self, model: &str, id: RecordId) {
        self.identity.remove(&(model.to_string(), id));
    }

    /// Builds (or reuses) a lazy proxy for `(metadata, id)`: an uninitialized
    /// slot holding a blank instance with only the identifier set. No remote
    /// call happens here.
    pub fn create_proxy(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        id: RecordId,
    ) -> OrmResult<InstanceKey> {
        let model_name = metadata.model_name_or_err()?.to_string();
        if let Some(existing) = self.identity_get(&model_name, id) {
            return Ok(existing);
        }

        let object = metadata.new_instance();
        let key = self.insert(object, metadata.clone(), SlotState::Uninitialized);
        self.set_id(key, Some(id))?;
        self.identity_claim(&model_name, id, key);
        Ok(key)
    }

    /// Builds a lazy collection of proxies, recording `ids` as the
    /// originally-stored set.
    pub fn create_collection(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        ids: &[RecordId],
    ) -> OrmResult<ErasedCollection> {
        let mut collection = ErasedCollection::with_stored_ids(ids.to_vec());
        for id in ids {
            let member = self.create_proxy(metadata, *id)?;
            collection.push(member);
        }
        Ok(collection)
    }
}

/// Reads one record by id, restricted to the type's mapped fields.
pub(crate) fn load_record(
    transport: &dyn Transport,
    metadata: &ClassMetadata,
    id: RecordId,
) -> OrmResult<Option<WireRecord>> {
    let model_name = metadata.model_name_or_err()?;
    Ok(transport.find(model_name, id, &metadata.field_names())?)
}

/// Like [`load_record`], but a missing record is an error.
pub(crate) fn get_record(
    transport: &dyn Transport,
    metadata: &ClassMetadata,
    id: RecordId,
) -> OrmResult<WireRecord> {
    load_record(transport, metadata, id)?.ok_or_else(|| OrmError::RecordNotFound {
        model: metadata.model_name().unwrap_or_default().to_string(),
        id,
    })
}

/// Saves an object: create when it has no identifier, partial update
/// otherwise. A successful write is followed by a refresh, which re-snapshots
/// the instance. Unmaterialized proxies and empty payloads are no-ops.
pub(crate) fn persist(
    transport: &dyn Transport,
    converter: &Converter<'_>,
    uow: &mut UnitOfWork,
    key: InstanceKey,
) -> OrmResult<()> {
    if uow.slot(key)?.state != SlotState::Ready {
        return Ok(());
    }

    let metadata = uow.slot(key)?.metadata.clone();
    let model_name = metadata.model_name_or_err()?.to_string();

    match uow.read_id(key)? {
        None => {
            let data = converter.normalize(uow, key, None)?;
            if data.is_empty() {
                return Ok(());
            }
            debug!(model = %model_name, "creating record");
            let id = transport.create(&model_name, data)?;
            uow.set_id(key, Some(id))?;
            refresh(transport, converter, uow, key)
        }
        Some(id) => {
            let prior = uow.snapshot(key).cloned();
            let data = converter.normalize(uow, key, prior.as_ref())?;
            if data.is_empty() {
                return Ok(());
            }
            debug!(model = %model_name, %id, fields = data.len(), "updating record");
            transport.update(&model_name, id, data)?;
            refresh(transport, converter, uow, key)
        }
    }
}

/// Re-reads an object's record and denormalizes it into the same instance,
/// overwriting its snapshot.
pub(crate) fn refresh(
    transport: &dyn Transport,
    converter: &Converter<'_>,
    uow: &mut UnitOfWork,
    key: InstanceKey,
) -> OrmResult<()> {
    let metadata = uow.slot(key)?.metadata.clone();
    let id = uow
        .read_id(key)?
        .ok_or(LogicError::NotPersisted {
            class: metadata.class_name(),
        })?;

    let model_name = metadata.model_name_or_err()?.to_string();
    debug!(model = %model_name, %id, "refreshing record");
    let record = get_record(transport, &metadata, id)?;
    uow.identity_claim(&model_name, id, key);
    converter.denormalize_into(uow, key, &metadata, &record)?;
    uow.set_state(key, SlotState::Ready)
}

/// Deletes an object's record and clears its local identifier.
pub(crate) fn delete(
    transport: &dyn Transport,
    uow: &mut UnitOfWork,
    key: InstanceKey,
) -> OrmResult<()> {
    let metadata = uow.slot(key)?.metadata.clone();
    let id = uow
        .read_id(key)?
        .ok_or(LogicError::NotPersisted {
            class: metadata.class_name(),
        })?;
    let model_name = metadata.model_name_or_err()?.to_string();

    debug!(model = %model_name, %id, "deleting record");
    transport.delete(&model_name, id)?;

    uow.set_id(key, None)?;
    uow.identity_remove(&model_name, id);
    uow.clear_snapshot(key);
    uow.remove_record(&model_name, id);
    Ok(())
}

/// Materializes a lazy proxy on first real access. Ready slots pass through;
/// a slot already initializing means the engine was re-entered.
pub(crate) fn ensure_ready(
    transport: &dyn Transport,
    converter: &Converter<'_>,
    uow: &mut UnitOfWork,
    key: InstanceKey,
) -> OrmResult<()> {
    match uow.slot(key)?.state {
        SlotState::Ready => Ok(()),
        SlotState::Initializing => Err(OrmError::internal(
            "re-entrant proxy initialization".to_string(),
        )),
        SlotState::Uninitialized => {
            uow.set_state(key, SlotState::Initializing)?;
            let result = refresh(transport, converter, uow, key);
            if result.is_err() {
                // Leave the proxy retryable.
                uow.set_state(key, SlotState::Uninitialized)?;
            }
            result
        }
    }
}
