//! Fleet Status Store: the single source of truth for render state
//!
//! State lives in an immutable [`FleetStatusSnapshot`] behind an `ArcSwap`.
//! Every mutation clones the current snapshot, edits the copy and publishes
//! it in one atomic swap, so a reader holding a snapshot never observes a
//! partially applied update or batch.
//!
//! Mutation requires `&mut FleetStatusStore`; the render context only ever
//! receives a [`StoreReader`]. That split is the single-writer discipline.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::FleetConfig;
use crate::types::{Channel, LastMessage, StatusKind, StatusMessage, TelemetryEvent, VehicleId};

// ============================================================================
// Errors
// ============================================================================

/// An update referenced a vehicle or channel outside the configured fleet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidChannelError {
    #[error("unknown vehicle {0} (not part of the configured fleet)")]
    UnknownVehicle(VehicleId),
    #[error("channel {channel} is not configured for vehicle {vehicle}")]
    UnknownChannel { vehicle: VehicleId, channel: Channel },
}

// ============================================================================
// Snapshot
// ============================================================================

/// Status and message state of one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VehicleMessages {
    pub status: StatusMessage,
    pub last: LastMessage,
}

/// Immutable, fully consistent copy of the whole fleet state.
#[derive(Debug, Clone)]
pub struct FleetStatusSnapshot {
    generation: u64,
    channel_order: Arc<[Channel]>,
    channels: BTreeMap<(VehicleId, Channel), StatusKind>,
    messages: BTreeMap<VehicleId, VehicleMessages>,
}

impl FleetStatusSnapshot {
    fn initial(vehicles: &[VehicleId], channels: &[Channel]) -> Self {
        let mut channel_map = BTreeMap::new();
        let mut messages = BTreeMap::new();
        for &vehicle in vehicles {
            for &channel in channels {
                channel_map.insert((vehicle, channel), StatusKind::default());
            }
            messages.insert(vehicle, VehicleMessages::default());
        }
        Self {
            generation: 0,
            channel_order: channels.into(),
            channels: channel_map,
            messages,
        }
    }

    /// Increases by one with every published change.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self, vehicle: VehicleId, channel: Channel) -> Option<StatusKind> {
        self.channels.get(&(vehicle, channel)).copied()
    }

    pub fn status_message(&self, vehicle: VehicleId) -> Option<&StatusMessage> {
        self.messages.get(&vehicle).map(|m| &m.status)
    }

    pub fn last_message(&self, vehicle: VehicleId) -> Option<&LastMessage> {
        self.messages.get(&vehicle).map(|m| &m.last)
    }

    /// Configured vehicles in id order.
    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.messages.keys().copied()
    }

    /// Configured channels in display order.
    pub fn channel_order(&self) -> &[Channel] {
        &self.channel_order
    }

    /// Every (vehicle, channel, status) entry, ordered by vehicle then channel.
    pub fn channel_entries(&self) -> impl Iterator<Item = (VehicleId, Channel, StatusKind)> + '_ {
        self.channels.iter().map(|(&(v, c), &k)| (v, c, k))
    }

    pub fn vehicle_messages(&self) -> impl Iterator<Item = (VehicleId, &VehicleMessages)> {
        self.messages.iter().map(|(&v, m)| (v, m))
    }

    fn messages_mut(&mut self, vehicle: VehicleId) -> Result<&mut VehicleMessages, InvalidChannelError> {
        self.messages
            .get_mut(&vehicle)
            .ok_or(InvalidChannelError::UnknownVehicle(vehicle))
    }

    /// Returns whether the stored value changed.
    fn set_channel(
        &mut self,
        vehicle: VehicleId,
        channel: Channel,
        status: StatusKind,
    ) -> Result<bool, InvalidChannelError> {
        if !self.messages.contains_key(&vehicle) {
            return Err(InvalidChannelError::UnknownVehicle(vehicle));
        }
        let entry = self
            .channels
            .get_mut(&(vehicle, channel))
            .ok_or(InvalidChannelError::UnknownChannel { vehicle, channel })?;
        let changed = *entry != status;
        *entry = status;
        Ok(changed)
    }

    fn set_status_message(&mut self, vehicle: VehicleId, text: &str) -> Result<bool, InvalidChannelError> {
        let entry = self.messages_mut(vehicle)?;
        let next = StatusMessage::classify(text);
        let changed = entry.status != next;
        entry.status = next;
        Ok(changed)
    }

    fn set_last_message(&mut self, vehicle: VehicleId, text: &str) -> Result<bool, InvalidChannelError> {
        let entry = self.messages_mut(vehicle)?;
        entry.last = LastMessage::received(text);
        Ok(true)
    }

    fn apply_event(&mut self, event: &TelemetryEvent) -> Result<bool, InvalidChannelError> {
        match event {
            TelemetryEvent::ChannelUpdate {
                vehicle,
                channel,
                status,
            } => self.set_channel(*vehicle, *channel, *status),
            TelemetryEvent::StatusMessageUpdate { vehicle, text } => {
                self.set_status_message(*vehicle, text)
            }
            TelemetryEvent::LastMessageUpdate { vehicle, text } => self.set_last_message(*vehicle, text),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Result of applying one batch of telemetry events.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Events that were valid and written
    pub applied: usize,
    /// Events refused at the store boundary, with the reason
    pub rejected: Vec<(TelemetryEvent, InvalidChannelError)>,
    /// Generation visible to readers after the batch
    pub generation: u64,
    /// Whether a new snapshot was published
    pub changed: bool,
}

/// Authoritative fleet status, created once at startup.
pub struct FleetStatusStore {
    current: Arc<ArcSwap<FleetStatusSnapshot>>,
}

/// Cloneable read-only handle used by the render context.
#[derive(Clone)]
pub struct StoreReader {
    current: Arc<ArcSwap<FleetStatusSnapshot>>,
}

impl StoreReader {
    pub fn snapshot(&self) -> Arc<FleetStatusSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }
}

impl FleetStatusStore {
    /// Every (vehicle, channel) pair starts `Waiting`; status messages start
    /// empty and last messages start as never received.
    pub fn new(vehicles: impl IntoIterator<Item = VehicleId>, channels: &[Channel]) -> Self {
        let vehicles: Vec<VehicleId> = vehicles.into_iter().collect();
        let initial = FleetStatusSnapshot::initial(&vehicles, channels);
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(config.vehicles(), &config.fleet.channels)
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            current: Arc::clone(&self.current),
        }
    }

    pub fn snapshot(&self) -> Arc<FleetStatusSnapshot> {
        self.current.load_full()
    }

    /// The only path that mutates connection/sensor/node state.
    ///
    /// Unknown vehicles or unconfigured channels are rejected and the store is
    /// left untouched.
    pub fn apply_update(
        &mut self,
        vehicle: VehicleId,
        channel: Channel,
        status: StatusKind,
    ) -> Result<(), InvalidChannelError> {
        self.mutate(|next| next.set_channel(vehicle, channel, status))
    }

    /// Classifies `text` against the status phrase table and stores it.
    pub fn apply_status_message(&mut self, vehicle: VehicleId, text: &str) -> Result<(), InvalidChannelError> {
        self.mutate(|next| next.set_status_message(vehicle, text))
    }

    /// Unconditional overwrite, empty text included.
    pub fn apply_last_message(&mut self, vehicle: VehicleId, text: &str) -> Result<(), InvalidChannelError> {
        self.mutate(|next| next.set_last_message(vehicle, text))
    }

    /// Apply a batch of events and publish the result as a single snapshot.
    ///
    /// Invalid events are skipped individually; valid ones in the same batch
    /// still land.
    pub fn apply_batch(&mut self, events: impl IntoIterator<Item = TelemetryEvent>) -> BatchOutcome {
        let mut next = FleetStatusSnapshot::clone(&self.current.load());
        let mut outcome = BatchOutcome::default();

        for event in events {
            match next.apply_event(&event) {
                Ok(changed) => {
                    outcome.applied += 1;
                    outcome.changed |= changed;
                }
                Err(e) => outcome.rejected.push((event, e)),
            }
        }

        if outcome.changed {
            outcome.generation = self.publish(next);
        } else {
            outcome.generation = next.generation;
        }
        outcome
    }

    fn mutate(
        &mut self,
        edit: impl FnOnce(&mut FleetStatusSnapshot) -> Result<bool, InvalidChannelError>,
    ) -> Result<(), InvalidChannelError> {
        let mut next = FleetStatusSnapshot::clone(&self.current.load());
        if edit(&mut next)? {
            self.publish(next);
        }
        Ok(())
    }

    fn publish(&mut self, mut next: FleetStatusSnapshot) -> u64 {
        next.generation += 1;
        let generation = next.generation;
        self.current.store(Arc::new(next));
        generation
    }
}
