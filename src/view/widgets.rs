//! Widget registry: structured keys to stable handles.
//!
//! Populated once when a surface is built; lookups afterwards are by key
//! only, never by assembling names at runtime.

use std::collections::HashMap;

use super::RegionId;
use crate::types::{Channel, VehicleId};

/// What a widget displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKey {
    Icon(VehicleId, Channel),
    Text(RegionId),
}

/// Index of a widget within its registry. Stable for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WidgetHandle(usize);

impl WidgetHandle {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct WidgetRegistry {
    handles: HashMap<WidgetKey, WidgetHandle>,
    keys: Vec<WidgetKey>,
}

impl WidgetRegistry {
    /// One icon per (vehicle, channel), a status and last-message region per
    /// vehicle, and the shared notice region.
    pub fn build(vehicles: &[VehicleId], channels: &[Channel]) -> Self {
        let mut registry = Self {
            handles: HashMap::new(),
            keys: Vec::with_capacity(vehicles.len() * (channels.len() + 2) + 1),
        };
        for &vehicle in vehicles {
            for &channel in channels {
                registry.insert(WidgetKey::Icon(vehicle, channel));
            }
            registry.insert(WidgetKey::Text(RegionId::Status(vehicle)));
            registry.insert(WidgetKey::Text(RegionId::LastMessage(vehicle)));
        }
        registry.insert(WidgetKey::Text(RegionId::Notice));
        registry
    }

    fn insert(&mut self, key: WidgetKey) {
        if !self.handles.contains_key(&key) {
            let handle = WidgetHandle(self.keys.len());
            self.keys.push(key);
            self.handles.insert(key, handle);
        }
    }

    pub fn get(&self, key: &WidgetKey) -> Option<WidgetHandle> {
        self.handles.get(key).copied()
    }

    pub fn key(&self, handle: WidgetHandle) -> Option<&WidgetKey> {
        self.keys.get(handle.0)
    }

    /// Keys in handle order.
    pub fn keys(&self) -> impl Iterator<Item = &WidgetKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_layout() {
        let vehicles: Vec<_> = VehicleId::fleet(3).collect();
        let registry = WidgetRegistry::build(&vehicles, &Channel::DEFAULT_SET);
        assert_eq!(registry.len(), 3 * (7 + 2) + 1);

        let key = WidgetKey::Icon(vehicles[1], Channel::DEFAULT_SET[0]);
        let handle = registry.get(&key).unwrap();
        assert_eq!(registry.key(handle), Some(&key));
        // Lookup is stable
        assert_eq!(registry.get(&key), Some(handle));
    }

    #[test]
    fn test_unknown_key_has_no_handle() {
        let vehicles: Vec<_> = VehicleId::fleet(1).collect();
        let registry = WidgetRegistry::build(&vehicles, &Channel::DEFAULT_SET);
        let stranger = VehicleId::new(5).unwrap();
        assert!(registry.get(&WidgetKey::Text(RegionId::Status(stranger))).is_none());
    }
}
