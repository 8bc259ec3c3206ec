//! Handles to engine-managed objects and lazy association containers.
//!
//! Managed objects live in a slab owned by the engine's unit of work; user
//! code holds lightweight `Obj<T>` handles. A handle is the object's identity:
//! two handles are the same object exactly when their keys are equal. This is
//! what collection membership is defined on, so a not-yet-persisted member
//! (no record id) is still a first-class element.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::value::{RecordId, TypedValue, ValueTypeError};

/// Process-local identity of a managed object instance.
///
/// Allocated by the unit of work when an object is attached, denormalized or
/// proxied; never reused within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey(u64);

impl InstanceKey {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed handle to a managed object.
///
/// Copyable and cheap; all access goes through the engine
/// (`Engine::read` / `Engine::write` / `Engine::id_of`), which is where lazy
/// proxies are materialized.
pub struct Obj<T> {
    key: InstanceKey,
    marker: PhantomData<fn() -> T>,
}

impl<T> Obj<T> {
    pub(crate) const fn new(key: InstanceKey) -> Self {
        Self {
            key,
            marker: PhantomData,
        }
    }

    /// The process-local identity of this object.
    #[must_use]
    pub const fn key(self) -> InstanceKey {
        self.key
    }

    /// Drops the compile-time type from the handle.
    #[must_use]
    pub const fn erased(self) -> ErasedObj {
        ErasedObj { key: self.key }
    }

    /// Restores a typed handle from an erased one.
    ///
    /// The type is trusted here; the engine re-checks it against the slab
    /// entry on every access.
    #[must_use]
    pub const fn from_erased(erased: ErasedObj) -> Self {
        Self::new(erased.key)
    }
}

// Manual impls: `T` itself need not be Clone/Copy/Eq for the handle to be.
impl<T> Clone for Obj<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Obj<T> {}

impl<T> PartialEq for Obj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Obj<T> {}

impl<T> Hash for Obj<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({})", self.key)
    }
}

/// Type-erased handle, as carried inside `TypedValue::Reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErasedObj {
    pub(crate) key: InstanceKey,
}

impl ErasedObj {
    /// The process-local identity of the referenced object.
    #[must_use]
    pub const fn key(self) -> InstanceKey {
        self.key
    }
}

/// Type-erased lazy collection state, as carried inside `TypedValue::Many`.
///
/// Tracks the id set as stored remotely separately from the current members so
/// the converter can diff them into link commands on save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErasedCollection {
    stored_ids: Vec<RecordId>,
    members: Vec<InstanceKey>,
}

impl ErasedCollection {
    pub(crate) fn with_stored_ids(stored_ids: Vec<RecordId>) -> Self {
        Self {
            stored_ids,
            members: Vec::new(),
        }
    }

    /// The id set as last loaded from the store.
    #[must_use]
    pub fn stored_ids(&self) -> &[RecordId] {
        &self.stored_ids
    }

    /// Current member handles, in insertion order.
    #[must_use]
    pub fn members(&self) -> &[InstanceKey] {
        &self.members
    }

    pub(crate) fn push(&mut self, key: InstanceKey) {
        if !self.members.contains(&key) {
            self.members.push(key);
        }
    }

    pub(crate) fn remove(&mut self, key: InstanceKey) {
        self.members.retain(|member| *member != key);
    }

    pub(crate) fn contains(&self, key: InstanceKey) -> bool {
        self.members.contains(&key)
    }
}

/// Lazy multi-valued association.
///
/// Members are handles; adding an object twice is a no-op, and removal is by
/// handle identity, never by record id. An untouched collection normalizes to
/// nothing at all.
pub struct Collection<T> {
    inner: ErasedCollection,
    marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T> {
    /// Creates an empty collection with no stored ids.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ErasedCollection::default(),
            marker: PhantomData,
        }
    }

    pub(crate) fn from_erased(inner: ErasedCollection) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }

    pub(crate) fn into_erased(self) -> ErasedCollection {
        self.inner
    }

    /// The id set as last loaded from the store.
    #[must_use]
    pub fn stored_ids(&self) -> &[RecordId] {
        self.inner.stored_ids()
    }

    /// Adds a member; no-op when it is already present.
    pub fn push(&mut self, member: Obj<T>) {
        self.inner.push(member.key());
    }

    /// Removes a member by handle identity.
    pub fn remove(&mut self, member: Obj<T>) {
        self.inner.remove(member.key());
    }

    #[must_use]
    pub fn contains(&self, member: Obj<T>) -> bool {
        self.inner.contains(member.key())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.members().is_empty()
    }

    /// Drops all members; stored ids are kept, so persisting afterwards
    /// unlinks everything that was stored.
    pub fn clear(&mut self) {
        let keys: Vec<_> = self.inner.members().to_vec();
        for key in keys {
            self.inner.remove(key);
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<Obj<T>> {
        self.inner.members().first().map(|key| Obj::new(*key))
    }

    #[must_use]
    pub fn last(&self) -> Option<Obj<T>> {
        self.inner.members().last().map(|key| Obj::new(*key))
    }

    /// Iterates current members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Obj<T>> + '_ {
        self.inner.members().iter().map(|key| Obj::new(*key))
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("stored_ids", &self.inner.stored_ids())
            .field("members", &self.inner.members())
            .finish()
    }
}

impl<T> From<Obj<T>> for TypedValue {
    fn from(obj: Obj<T>) -> Self {
        Self::Reference(obj.erased())
    }
}

impl<T> TryFrom<TypedValue> for Option<Obj<T>> {
    type Error = ValueTypeError;

    fn try_from(value: TypedValue) -> Result<Self, Self::Error> {
        match value {
            TypedValue::Null => Ok(None),
            TypedValue::Reference(erased) => Ok(Some(Obj::from_erased(erased))),
            other => Err(ValueTypeError::new("reference", &other)),
        }
    }
}

impl<T> From<Collection<T>> for TypedValue {
    fn from(collection: Collection<T>) -> Self {
        Self::Many(collection.into_erased())
    }
}

impl<T> TryFrom<TypedValue> for Collection<T> {
    type Error = ValueTypeError;

    fn try_from(value: TypedValue) -> Result<Self, Self::Error> {
        match value {
            // An absent to-many value is just an empty collection.
            TypedValue::Null => Ok(Self::new()),
            TypedValue::Many(inner) => Ok(Self::from_erased(inner)),
            other => Err(ValueTypeError::new("collection", &other)),
        }
    }
}
