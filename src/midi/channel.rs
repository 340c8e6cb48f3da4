/// Output channel - owns the selected destination and the note lifecycle
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::timing::DelayQueue;

use super::{Destination, DestinationRegistry, OutputError, SendPort};

/// How long a note sounds before its scheduled note-off.
pub const SUSTAIN: Duration = Duration::from_millis(200);

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const CONTROL_CHANGE: u8 = 0xB0;
const ALL_NOTES_OFF: u8 = 123;
const VELOCITY: u8 = 100;

type SharedPort = Arc<Mutex<Box<dyn SendPort>>>;

/// A note-off waiting for its due time. The port handle is captured when
/// the note-on is sent, so the off always targets the destination that
/// heard the on, even if the selection changed in the meantime.
struct PendingOff {
    pitch: u8,
    port: SharedPort,
}

/// Sends note-on/note-off pairs to the currently selected destination and
/// guarantees the device is silenced on every transition away from it.
/// Transport failures are logged, never escalated: the caller keeps
/// ticking and the next note retries naturally.
pub struct OutputChannel {
    registry: Box<dyn DestinationRegistry>,
    active: Option<(Destination, SharedPort)>,
    pending_offs: DelayQueue<PendingOff>,
}

impl OutputChannel {
    pub fn new(registry: Box<dyn DestinationRegistry>) -> Self {
        Self {
            registry,
            active: None,
            pending_offs: DelayQueue::new(),
        }
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.registry.list()
    }

    pub fn current_destination(&self) -> Option<&Destination> {
        self.active.as_ref().map(|(dest, _)| dest)
    }

    pub fn destination_label(&self) -> Option<String> {
        self.active.as_ref().map(|(dest, _)| dest.name.clone())
    }

    /// Switch the active destination. The previous destination receives
    /// all-notes-off before the swap; re-selecting the current destination
    /// only refreshes its label. If the new port cannot be opened the
    /// previous selection stays active.
    pub fn select_destination(&mut self, id: &str) -> Result<(), OutputError> {
        let dest = self
            .registry
            .list()
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| OutputError::NotFound(id.to_string()))?;

        if let Some((active, _)) = &mut self.active {
            if active.id == dest.id {
                active.name = dest.name;
                return Ok(());
            }
        }

        let port = self.registry.open(id)?;
        self.all_notes_off();
        info!("MIDI output -> {}", dest.name);
        self.active = Some((dest, Arc::new(Mutex::new(port))));
        Ok(())
    }

    /// Deselect the active destination, silencing it first.
    pub fn clear_destination(&mut self) {
        if self.active.is_some() {
            self.all_notes_off();
            info!("MIDI output deselected");
            self.active = None;
        }
    }

    /// Send a note-on now and schedule the matching note-off one sustain
    /// delay later. With no destination selected this is a logged no-op,
    /// not an error: the sequencer keeps running silently.
    pub fn send_note(&mut self, pitch: u8) {
        self.send_note_at(pitch, Instant::now());
    }

    pub fn send_note_at(&mut self, pitch: u8, now: Instant) {
        let Some((dest, port)) = &self.active else {
            debug!("no destination selected, dropping note {}", pitch);
            return;
        };

        if let Err(e) = port.lock().unwrap().send([NOTE_ON, pitch, VELOCITY]) {
            warn!("note-on {} to {} failed: {}", pitch, dest.name, e);
        }

        self.pending_offs.schedule(
            now + SUSTAIN,
            PendingOff {
                pitch,
                port: Arc::clone(port),
            },
        );
    }

    /// Send every note-off that has come due. The playback engine calls
    /// this on each pass; tests call it with synthetic instants.
    pub fn fire_due(&mut self, now: Instant) {
        for off in self.pending_offs.pop_due(now) {
            if let Err(e) = off.port.lock().unwrap().send([NOTE_OFF, off.pitch, 0]) {
                warn!("note-off {} failed: {}", off.pitch, e);
            }
        }
    }

    /// Panic operation: control change 123 on all 16 channels of the active
    /// destination. Callable with no destination (no-op) and idempotent
    /// beyond redundant device traffic.
    pub fn all_notes_off(&mut self) {
        let Some((dest, port)) = &self.active else {
            return;
        };

        let mut port = port.lock().unwrap();
        for channel in 0..16u8 {
            if let Err(e) = port.send([CONTROL_CHANGE | channel, ALL_NOTES_OFF, 0]) {
                warn!(
                    "all-notes-off on channel {} to {} failed: {}",
                    channel, dest.name, e
                );
            }
        }
    }

    pub fn pending_note_offs(&self) -> usize {
        self.pending_offs.len()
    }
}

impl Drop for OutputChannel {
    fn drop(&mut self) {
        // Best-effort silence on teardown; pending offs never fire after
        // this, all-notes-off covers them.
        self.all_notes_off();
    }
}
