//! Identifier registry.
//!
//! Maps log IDs to builder-side handles for the duration of one replay run.
//! Entries are never removed. Slots keep their registration position; an
//! overwrite bumps the slot generation so a [`RegistryKey`] taken before the
//! rebind no longer resolves.

use crate::api::{BuilderRef, TypeRef, ValueRef};
use ilreplay_core::{EntryKind, LogId, RegistryError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// What happens when an already-bound ID is registered again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebindPolicy {
    /// Fail with [`RegistryError::AlreadyBound`]
    #[default]
    Reject,
    /// Replace the entry and bump its generation
    Overwrite,
}

/// A registered object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handle {
    /// The method builder
    MethodBuilder(BuilderRef),
    /// An IL builder
    IlBuilder(BuilderRef),
    /// A value
    Value(ValueRef),
    /// A type
    Type(TypeRef),
    /// A string literal
    Text(String),
    /// An address literal
    Address(u64),
}

impl Handle {
    /// Entry kind of this handle
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        match self {
            Self::MethodBuilder(_) => EntryKind::MethodBuilder,
            Self::IlBuilder(_) => EntryKind::IlBuilder,
            Self::Value(_) => EntryKind::IlValue,
            Self::Type(_) => EntryKind::IlType,
            Self::Text(_) => EntryKind::RawString,
            Self::Address(_) => EntryKind::RawAddress,
        }
    }
}

/// Stable reference to a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    id: LogId,
    slot: usize,
    generation: u32,
}

impl RegistryKey {
    /// ID the key was taken for
    #[must_use]
    pub const fn id(&self) -> LogId {
        self.id
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    handle: Handle,
}

/// ID to handle map for one replay run
#[derive(Debug, Clone, Default)]
pub struct Registry {
    policy: RebindPolicy,
    slots: IndexMap<LogId, Slot>,
}

impl Registry {
    /// Create an empty registry that rejects rebinding
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given rebind policy
    #[must_use]
    pub fn with_policy(policy: RebindPolicy) -> Self {
        Self {
            policy,
            slots: IndexMap::new(),
        }
    }

    /// Active rebind policy
    #[must_use]
    pub const fn policy(&self) -> RebindPolicy {
        self.policy
    }

    /// Bind `id` to `handle`
    ///
    /// # Errors
    ///
    /// Returns error if `id` is reserved, or already bound under
    /// [`RebindPolicy::Reject`]
    pub fn register(&mut self, id: LogId, handle: Handle) -> Result<RegistryKey, RegistryError> {
        if id == LogId::NONE || id == LogId::RECORDER {
            return Err(RegistryError::ReservedId { id });
        }

        if let Some((slot, _, existing)) = self.slots.get_full_mut(&id) {
            if self.policy == RebindPolicy::Reject {
                return Err(RegistryError::AlreadyBound {
                    id,
                    existing: existing.handle.kind(),
                });
            }
            warn!(%id, from = %existing.handle.kind(), to = %handle.kind(), "rebinding ID");
            existing.generation += 1;
            existing.handle = handle;
            return Ok(RegistryKey {
                id,
                slot,
                generation: existing.generation,
            });
        }

        trace!(%id, kind = %handle.kind(), "binding ID");
        let (slot, _) = self.slots.insert_full(
            id,
            Slot {
                generation: 0,
                handle,
            },
        );
        Ok(RegistryKey {
            id,
            slot,
            generation: 0,
        })
    }

    /// Handle bound to `id`
    ///
    /// # Errors
    ///
    /// Returns error if nothing is bound to `id`
    pub fn resolve(&self, id: LogId) -> Result<&Handle, RegistryError> {
        self.slots
            .get(&id)
            .map(|slot| &slot.handle)
            .ok_or(RegistryError::Unbound { id })
    }

    /// Key for the current binding of `id`
    ///
    /// # Errors
    ///
    /// Returns error if nothing is bound to `id`
    pub fn key(&self, id: LogId) -> Result<RegistryKey, RegistryError> {
        let (slot, _, entry) = self
            .slots
            .get_full(&id)
            .ok_or(RegistryError::Unbound { id })?;
        Ok(RegistryKey {
            id,
            slot,
            generation: entry.generation,
        })
    }

    /// Handle behind a key
    ///
    /// # Errors
    ///
    /// Returns error if the slot was rebound after the key was taken
    pub fn get(&self, key: RegistryKey) -> Result<&Handle, RegistryError> {
        match self.slots.get_index(key.slot) {
            Some((_, slot)) if slot.generation == key.generation => Ok(&slot.handle),
            _ => Err(RegistryError::StaleKey { id: key.id }),
        }
    }

    /// Builder bound to `id`; the method builder counts as an IL builder
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unbound or not a builder
    pub fn builder(&self, id: LogId) -> Result<BuilderRef, RegistryError> {
        match self.resolve(id)? {
            Handle::MethodBuilder(b) | Handle::IlBuilder(b) => Ok(*b),
            other => Err(mismatch(id, EntryKind::IlBuilder, other)),
        }
    }

    /// Method builder bound to `id`
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unbound or not the method builder
    pub fn method_builder(&self, id: LogId) -> Result<BuilderRef, RegistryError> {
        match self.resolve(id)? {
            Handle::MethodBuilder(b) => Ok(*b),
            other => Err(mismatch(id, EntryKind::MethodBuilder, other)),
        }
    }

    /// Value bound to `id`
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unbound or not a value
    pub fn value(&self, id: LogId) -> Result<ValueRef, RegistryError> {
        match self.resolve(id)? {
            Handle::Value(v) => Ok(*v),
            other => Err(mismatch(id, EntryKind::IlValue, other)),
        }
    }

    /// Type bound to `id`
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unbound or not a type
    pub fn ty(&self, id: LogId) -> Result<TypeRef, RegistryError> {
        match self.resolve(id)? {
            Handle::Type(t) => Ok(*t),
            other => Err(mismatch(id, EntryKind::IlType, other)),
        }
    }

    /// String literal bound to `id`
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unbound or not a string
    pub fn text(&self, id: LogId) -> Result<&str, RegistryError> {
        match self.resolve(id)? {
            Handle::Text(s) => Ok(s),
            other => Err(mismatch(id, EntryKind::RawString, other)),
        }
    }

    /// Address literal bound to `id`
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unbound or not an address
    pub fn address(&self, id: LogId) -> Result<u64, RegistryError> {
        match self.resolve(id)? {
            Handle::Address(a) => Ok(*a),
            other => Err(mismatch(id, EntryKind::RawAddress, other)),
        }
    }

    /// Number of bound IDs
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `id` is bound
    #[must_use]
    pub fn contains(&self, id: LogId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Kind of the entry bound to `id`
    #[must_use]
    pub fn kind_of(&self, id: LogId) -> Option<EntryKind> {
        self.slots.get(&id).map(|slot| slot.handle.kind())
    }

    /// Bindings in registration order
    pub fn iter(&self) -> impl Iterator<Item = (LogId, &Handle)> {
        self.slots.iter().map(|(id, slot)| (*id, &slot.handle))
    }
}

fn mismatch(id: LogId, expected: EntryKind, found: &Handle) -> RegistryError {
    RegistryError::KindMismatch {
        id,
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(raw: u32) -> LogId {
        LogId::new(raw)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut reg = Registry::new();
        reg.register(id(15), Handle::Value(ValueRef::new(3))).unwrap();
        assert_eq!(reg.value(id(15)), Ok(ValueRef::new(3)));
        assert_eq!(reg.kind_of(id(15)), Some(EntryKind::IlValue));
        assert!(reg.contains(id(15)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_resolve_unbound() {
        let reg = Registry::new();
        assert_eq!(reg.resolve(id(13)), Err(RegistryError::Unbound { id: id(13) }));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_reserved_ids() {
        let mut reg = Registry::with_policy(RebindPolicy::Overwrite);
        assert_eq!(
            reg.register(LogId::NONE, Handle::Address(0)),
            Err(RegistryError::ReservedId { id: LogId::NONE })
        );
        assert_eq!(
            reg.register(LogId::RECORDER, Handle::Address(0)),
            Err(RegistryError::ReservedId {
                id: LogId::RECORDER
            })
        );
    }

    #[test]
    fn test_rebind_rejected() {
        let mut reg = Registry::new();
        reg.register(id(4), Handle::Text("Add".to_string())).unwrap();
        assert_eq!(
            reg.register(id(4), Handle::Value(ValueRef::new(0))),
            Err(RegistryError::AlreadyBound {
                id: id(4),
                existing: EntryKind::RawString
            })
        );
        assert_eq!(reg.text(id(4)), Ok("Add"));
    }

    #[test]
    fn test_rebind_overwrite_stales_keys() {
        let mut reg = Registry::with_policy(RebindPolicy::Overwrite);
        reg.register(id(4), Handle::Value(ValueRef::new(0))).unwrap();
        let old = reg.key(id(4)).unwrap();
        assert_eq!(reg.get(old), Ok(&Handle::Value(ValueRef::new(0))));

        let new = reg.register(id(4), Handle::Value(ValueRef::new(9))).unwrap();
        assert_eq!(reg.get(old), Err(RegistryError::StaleKey { id: id(4) }));
        assert_eq!(reg.get(new), Ok(&Handle::Value(ValueRef::new(9))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_typed_resolvers() {
        let mut reg = Registry::new();
        reg.register(id(2), Handle::MethodBuilder(BuilderRef::new(0))).unwrap();
        reg.register(id(19), Handle::IlBuilder(BuilderRef::new(1))).unwrap();
        reg.register(id(7), Handle::Type(TypeRef::new(0))).unwrap();
        reg.register(id(40), Handle::Address(0x10)).unwrap();

        assert_eq!(reg.builder(id(2)), Ok(BuilderRef::new(0)));
        assert_eq!(reg.builder(id(19)), Ok(BuilderRef::new(1)));
        assert_eq!(reg.method_builder(id(2)), Ok(BuilderRef::new(0)));
        assert_eq!(
            reg.method_builder(id(19)),
            Err(RegistryError::KindMismatch {
                id: id(19),
                expected: EntryKind::MethodBuilder,
                found: EntryKind::IlBuilder
            })
        );
        assert_eq!(reg.ty(id(7)), Ok(TypeRef::new(0)));
        assert_eq!(reg.address(id(40)), Ok(0x10));
        assert!(matches!(
            reg.value(id(7)),
            Err(RegistryError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_iter_registration_order() {
        let mut reg = Registry::new();
        for raw in [9, 3, 27] {
            reg.register(id(raw), Handle::Address(u64::from(raw))).unwrap();
        }
        let ids: Vec<u32> = reg.iter().map(|(id, _)| id.as_u32()).collect();
        assert_eq!(ids, vec![9, 3, 27]);
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&RebindPolicy::Overwrite).unwrap();
        assert_eq!(json, "\"overwrite\"");
    }

    proptest! {
        #[test]
        fn prop_each_id_resolves_to_its_handle(ids in proptest::collection::hash_set(2u32..10_000, 1..64)) {
            let mut reg = Registry::new();
            for raw in &ids {
                reg.register(id(*raw), Handle::Value(ValueRef::new(*raw))).unwrap();
            }
            prop_assert_eq!(reg.len(), ids.len());
            for raw in &ids {
                prop_assert_eq!(reg.value(id(*raw)), Ok(ValueRef::new(*raw)));
            }
        }

        #[test]
        fn prop_unregistered_ids_are_unbound(bound in 2u32..500, probe in 500u32..1000) {
            let mut reg = Registry::new();
            reg.register(id(bound), Handle::Address(0)).unwrap();
            prop_assert_eq!(reg.resolve(id(probe)), Err(RegistryError::Unbound { id: id(probe) }));
        }
    }
}
