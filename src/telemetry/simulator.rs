//! Random fleet telemetry for demos and tests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::types::{Channel, StatusKind, TelemetryEvent, VehicleId};

/// Status phrases the simulator draws from; the last one is deliberately
/// outside the recognized phrase table.
pub const SIMULATED_MESSAGES: [&str; 4] = ["running", "no connection", "waiting", "garbage data"];

/// Produces frames of random channel states and messages for every vehicle.
pub struct TelemetrySimulator {
    rng: StdRng,
    vehicles: Vec<VehicleId>,
    channels: Vec<Channel>,
    frames: u64,
}

impl TelemetrySimulator {
    pub fn new(vehicles: impl IntoIterator<Item = VehicleId>, channels: &[Channel], seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            vehicles: vehicles.into_iter().collect(),
            channels: channels.to_vec(),
            frames: 0,
        }
    }

    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// One update for every (vehicle, channel) pair plus a status message and
    /// a last message per vehicle.
    pub fn frame(&mut self) -> Vec<TelemetryEvent> {
        self.frames += 1;
        let mut events = Vec::with_capacity(self.vehicles.len() * (self.channels.len() + 2));

        for &vehicle in &self.vehicles {
            for &channel in &self.channels {
                let status = StatusKind::ALL[self.rng.gen_range(0..StatusKind::ALL.len())];
                events.push(TelemetryEvent::ChannelUpdate {
                    vehicle,
                    channel,
                    status,
                });
            }
            events.push(TelemetryEvent::StatusMessageUpdate {
                vehicle,
                text: pick_message(&mut self.rng).to_string(),
            });
            events.push(TelemetryEvent::LastMessageUpdate {
                vehicle,
                text: pick_message(&mut self.rng).to_string(),
            });
        }
        events
    }
}

fn pick_message(rng: &mut StdRng) -> &'static str {
    SIMULATED_MESSAGES.choose(rng).copied().unwrap_or("")
}
