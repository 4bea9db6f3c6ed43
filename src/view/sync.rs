//! View Synchronizer: store snapshots to render instructions
//!
//! Each tick takes one snapshot, diffs it against the snapshot rendered last
//! time and applies only what changed. `tick` takes `&mut self`, so two ticks
//! can never overlap; the render loop coalesces timer ticks that fire while
//! one is running.

use std::sync::Arc;

use super::{RegionId, RenderInstruction, RenderSurface};
use crate::config::defaults::NOTICE_PLACEHOLDER;
use crate::fleet::{FleetStatusSnapshot, StoreReader};
use crate::types::{LastMessage, StatusColor};

struct Notice {
    text: String,
    color: StatusColor,
    dirty: bool,
    /// Background notices may not replace this one
    held: bool,
}

pub struct ViewSynchronizer {
    reader: StoreReader,
    rendered: Option<Arc<FleetStatusSnapshot>>,
    notice: Notice,
    ticks: u64,
    instructions_applied: u64,
}

impl ViewSynchronizer {
    pub fn new(reader: StoreReader) -> Self {
        Self {
            reader,
            rendered: None,
            notice: Notice {
                text: NOTICE_PLACEHOLDER.to_string(),
                color: StatusColor::Neutral,
                dirty: true,
                held: false,
            },
            ticks: 0,
            instructions_applied: 0,
        }
    }

    /// Instructions that turn a surface showing `prev` into one showing `next`.
    ///
    /// With no previous snapshot every icon and text region is emitted. Equal
    /// generations short-circuit to nothing.
    pub fn diff(prev: Option<&FleetStatusSnapshot>, next: &FleetStatusSnapshot) -> Vec<RenderInstruction> {
        if prev.is_some_and(|p| p.generation() == next.generation()) {
            return Vec::new();
        }

        let mut out = Vec::new();
        for (vehicle, channel, status) in next.channel_entries() {
            if prev.and_then(|p| p.status(vehicle, channel)) != Some(status) {
                out.push(RenderInstruction::SetIcon {
                    vehicle,
                    channel,
                    status,
                });
            }
        }

        for (vehicle, messages) in next.vehicle_messages() {
            let status_changed = prev
                .and_then(|p| p.status_message(vehicle))
                .map_or(true, |old| {
                    old.display_text() != messages.status.display_text() || old.color() != messages.status.color()
                });
            if status_changed {
                out.push(RenderInstruction::SetText {
                    region: RegionId::Status(vehicle),
                    text: messages.status.display_text().to_string(),
                    color: messages.status.color(),
                });
            }

            let last_changed = prev
                .and_then(|p| p.last_message(vehicle))
                .map_or(true, |old| {
                    old.display_text() != messages.last.display_text() || old.color() != messages.last.color()
                });
            if last_changed {
                out.push(RenderInstruction::SetText {
                    region: RegionId::LastMessage(vehicle),
                    text: messages.last.display_text().to_string(),
                    color: messages.last.color(),
                });
            }
        }
        out
    }

    /// Replace the notice line; rendered on the next tick.
    ///
    /// Operator-facing notices in a color (a confirmation prompt, a canceled
    /// or failed command) stay up until the next call here, whatever the
    /// background posts meanwhile.
    pub fn set_notice(&mut self, text: impl Into<String>, color: StatusColor) {
        self.replace_notice(text.into(), color, color != StatusColor::Neutral);
    }

    /// Background notice (received messages, link state). Dropped while a
    /// held notice is showing; returns whether it was taken.
    pub fn post_notice(&mut self, text: impl Into<String>, color: StatusColor) -> bool {
        if self.notice.held {
            return false;
        }
        self.replace_notice(text.into(), color, false);
        true
    }

    fn replace_notice(&mut self, text: String, color: StatusColor, held: bool) {
        self.notice.held = held;
        if text != self.notice.text || color != self.notice.color {
            self.notice.text = text;
            self.notice.color = color;
            self.notice.dirty = true;
        }
    }

    pub fn notice(&self) -> (&str, StatusColor) {
        (&self.notice.text, self.notice.color)
    }

    /// Render whatever changed since the last tick. Returns the number of
    /// instructions applied.
    pub fn tick<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        self.ticks += 1;
        let next = self.reader.snapshot();
        let mut instructions = Self::diff(self.rendered.as_deref(), &next);

        if let Some(prev) = self.rendered.clone() {
            self.mirror_new_messages(&prev, &next);
        }
        if self.notice.dirty {
            self.notice.dirty = false;
            instructions.push(RenderInstruction::SetText {
                region: RegionId::Notice,
                text: self.notice.text.clone(),
                color: self.notice.color,
            });
        }

        for instruction in &instructions {
            instruction.apply_to(surface);
        }
        if !instructions.is_empty() {
            surface.flush();
        }

        self.rendered = Some(next);
        self.instructions_applied += instructions.len() as u64;
        instructions.len()
    }

    /// Newly received vehicle messages are echoed on the notice line unless
    /// a held notice is up.
    fn mirror_new_messages(&mut self, prev: &FleetStatusSnapshot, next: &FleetStatusSnapshot) {
        if prev.generation() == next.generation() {
            return;
        }
        for (vehicle, messages) in next.vehicle_messages() {
            if let LastMessage::Received { text, .. } = &messages.last {
                if prev.last_message(vehicle) != Some(&messages.last) {
                    self.post_notice(format!("{}: {}", vehicle.label(), text), StatusColor::Neutral);
                }
            }
        }
    }

    pub fn rendered_generation(&self) -> Option<u64> {
        self.rendered.as_ref().map(|s| s.generation())
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    pub const fn instructions_applied(&self) -> u64 {
        self.instructions_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use crate::fleet::FleetStatusStore;
    use crate::types::{Channel, ConnectionChannel, StatusKind, VehicleId};
    use crate::view::RecordingSurface;

    const WIFI: Channel = Channel::Connection(ConnectionChannel::Wifi);

    fn vid(n: u8) -> VehicleId {
        VehicleId::new(n).unwrap()
    }

    fn setup() -> (FleetStatusStore, ViewSynchronizer, RecordingSurface) {
        let store = FleetStatusStore::from_config(&FleetConfig::default());
        let sync = ViewSynchronizer::new(store.reader());
        (store, sync, RecordingSurface::default())
    }

    #[test]
    fn test_first_tick_renders_everything() {
        let (_store, mut sync, mut surface) = setup();
        let applied = sync.tick(&mut surface);
        // 21 icons, 3 status regions, 3 last-message regions, the notice
        assert_eq!(applied, 21 + 3 + 3 + 1);
        assert_eq!(surface.flushes, 1);
        assert!(surface.instructions.contains(&RenderInstruction::SetText {
            region: RegionId::Notice,
            text: NOTICE_PLACEHOLDER.to_string(),
            color: StatusColor::Neutral,
        }));
    }

    #[test]
    fn test_unchanged_store_renders_nothing() {
        let (_store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);
        surface.instructions.clear();

        assert_eq!(sync.tick(&mut surface), 0);
        assert!(surface.instructions.is_empty());
        assert_eq!(surface.flushes, 1);
    }

    #[test]
    fn test_diff_of_same_snapshot_is_empty() {
        let (store, _sync, _surface) = setup();
        let a = store.snapshot();
        let b = store.snapshot();
        assert!(ViewSynchronizer::diff(Some(a.as_ref()), &b).is_empty());
    }

    #[test]
    fn test_single_update_renders_single_icon() {
        let (mut store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);
        surface.instructions.clear();

        store.apply_update(vid(2), WIFI, StatusKind::Positive).unwrap();
        assert_eq!(sync.tick(&mut surface), 1);
        assert_eq!(
            surface.instructions,
            vec![RenderInstruction::SetIcon {
                vehicle: vid(2),
                channel: WIFI,
                status: StatusKind::Positive
            }]
        );
    }

    #[test]
    fn test_status_text_changes_render_with_color() {
        let (mut store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);
        surface.instructions.clear();

        store.apply_status_message(vid(1), "running").unwrap();
        sync.tick(&mut surface);
        assert_eq!(
            surface.instructions,
            vec![RenderInstruction::SetText {
                region: RegionId::Status(vid(1)),
                text: "running".to_string(),
                color: StatusColor::Green,
            }]
        );

        surface.instructions.clear();
        store.apply_status_message(vid(1), "").unwrap();
        sync.tick(&mut surface);
        assert_eq!(
            surface.instructions,
            vec![RenderInstruction::SetText {
                region: RegionId::Status(vid(1)),
                text: "No message to be read".to_string(),
                color: StatusColor::Orange,
            }]
        );
    }

    #[test]
    fn test_last_message_is_mirrored_to_notice() {
        let (mut store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);
        surface.instructions.clear();

        store.apply_last_message(vid(3), "surfaced").unwrap();
        assert_eq!(sync.tick(&mut surface), 2);
        assert_eq!(
            surface.instructions[1],
            RenderInstruction::SetText {
                region: RegionId::Notice,
                text: "Coug 3: surfaced".to_string(),
                color: StatusColor::Neutral,
            }
        );
        assert_eq!(sync.notice().0, "Coug 3: surfaced");
    }

    #[test]
    fn test_pending_prompt_survives_incoming_messages() {
        let (mut store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);

        let prompt = "Are you sure that you want to abort all missions?";
        sync.set_notice(prompt, StatusColor::Yellow);
        sync.tick(&mut surface);

        store.apply_last_message(vid(2), "running").unwrap();
        sync.tick(&mut surface);
        assert_eq!(sync.notice(), (prompt, StatusColor::Yellow));

        // The next operator notice releases the line again
        sync.set_notice("Aborting all missions...", StatusColor::Neutral);
        store.apply_last_message(vid(2), "surfacing").unwrap();
        sync.tick(&mut surface);
        assert_eq!(sync.notice(), ("Coug 2: surfacing", StatusColor::Neutral));
    }

    #[test]
    fn test_failure_notice_is_not_overwritten_by_background() {
        let (_store, mut sync, mut surface) = setup();
        sync.set_notice("Command failed: link down", StatusColor::Red);
        assert!(!sync.post_notice("Telemetry link up (base:7000)", StatusColor::Neutral));
        sync.tick(&mut surface);
        assert_eq!(sync.notice(), ("Command failed: link down", StatusColor::Red));
    }

    #[test]
    fn test_notice_only_renders_when_changed() {
        let (_store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);

        sync.set_notice("Recalling the Cougs...", StatusColor::Neutral);
        assert_eq!(sync.tick(&mut surface), 1);
        sync.set_notice("Recalling the Cougs...", StatusColor::Neutral);
        assert_eq!(sync.tick(&mut surface), 0);
    }

    #[test]
    fn test_coalesced_updates_render_final_state_once() {
        let (mut store, mut sync, mut surface) = setup();
        sync.tick(&mut surface);
        surface.instructions.clear();

        store.apply_update(vid(1), WIFI, StatusKind::Positive).unwrap();
        store.apply_update(vid(1), WIFI, StatusKind::Negative).unwrap();
        assert_eq!(sync.tick(&mut surface), 1);
        assert_eq!(sync.rendered_generation(), Some(2));
        assert!(matches!(
            surface.instructions[0],
            RenderInstruction::SetIcon { status: StatusKind::Negative, .. }
        ));
    }
}
