//! # Type Registry
//!
//! Stable mapping between user-facing message type names and the compact
//! 32-bit identifiers carried on the wire.
//!
//! Identifiers are the FNV-1a 32-bit hash of the UTF-8 type name, so both
//! peers derive the same id independently. The registry keeps both directions
//! and refuses to register two distinct names that hash to the same id: the
//! collision probability over realistic type counts is negligible, and
//! failing loudly beats disambiguating silently.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{ProtocolError, Result};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash over the UTF-8 bytes of a type name.
pub const fn fnv1a_32(data: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < data.len() {
        hash ^= data[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Bidirectional name ↔ id registry, one per processor.
///
/// Lookups are the hot path (once per inbound frame) and take the read lock;
/// registration is rare and takes the write lock.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    maps: RwLock<Maps>,
}

#[derive(Debug, Default)]
struct Maps {
    name_to_id: HashMap<String, u32>,
    id_to_name: HashMap<u32, String>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }

    /// Register a message type name, returning its 32-bit id.
    ///
    /// Idempotent for the same name. Fails with `TypeConflict` when a
    /// different name already owns the same hash.
    pub fn register(&self, msg_type: &str) -> Result<u32> {
        let id = fnv1a_32(msg_type.as_bytes());

        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = maps.id_to_name.get(&id) {
            if existing != msg_type {
                return Err(ProtocolError::TypeConflict(format!(
                    "{msg_type:?} collides with {existing:?} (id {id:#010x})"
                )));
            }
            return Ok(id);
        }

        maps.name_to_id.insert(msg_type.to_string(), id);
        maps.id_to_name.insert(id, msg_type.to_string());
        Ok(id)
    }

    /// Look up the id for a registered name.
    pub fn get_id(&self, msg_type: &str) -> Option<u32> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.name_to_id.get(msg_type).copied()
    }

    /// Look up the name for a registered id.
    pub fn get_name(&self, id: u32) -> Option<String> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.id_to_name.get(&id).cloned()
    }

    /// Snapshot of every registered type, for diagnostics.
    pub fn all_types(&self) -> HashMap<String, u32> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.name_to_id.clone()
    }

    /// Empty both maps. Intended for test use.
    pub fn clear(&self) {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        maps.name_to_id.clear();
        maps.id_to_name.clear();
    }
}
