/// Playback engine - the worker thread behind the periodic schedule
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

use crate::generator::NoteGenerator;
use crate::midi::OutputChannel;

use super::{SequencerEvent, SequencerState};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One pass of the engine loop: expire feedback clears, emit a tick if one
/// is due, fire due note-offs. Pure in `now`, so tests drive it with
/// synthetic instants instead of sleeping.
pub(crate) fn step(
    state: &Mutex<SequencerState>,
    output: &Mutex<OutputChannel>,
    events: &Sender<SequencerEvent>,
    now: Instant,
) {
    let mut st = state.lock().unwrap();
    st.expire_feedback(now);

    let period = st.period();
    let pitch = if st.running && st.clock.poll(now, period) {
        let pitch = NoteGenerator::generate(&st.config);
        st.note_emitted(pitch, now);
        Some(pitch)
    } else {
        None
    };

    // Keep holding the state lock while touching the output. stop() takes
    // the same locks in the same order, so a tick and a stop can never
    // interleave: whichever ran second sees the other completed.
    let mut out = output.lock().unwrap();
    out.fire_due(now);
    if let Some(pitch) = pitch {
        out.send_note_at(pitch, now);
        let _ = events.send(SequencerEvent::Note(pitch));
    }
}

/// Long-lived worker owned by a Sequencer. It runs for the sequencer's
/// whole lifetime, not just while playing, so deferred note-offs and
/// feedback clears keep firing after a stop.
pub struct PlaybackEngine {
    shutdown: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub(crate) fn spawn(
        state: Arc<Mutex<SequencerState>>,
        output: Arc<Mutex<OutputChannel>>,
        events: Sender<SequencerEvent>,
    ) -> Self {
        let shutdown = Arc::new(Mutex::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            debug!("playback engine running");
            while !*shutdown_flag.lock().unwrap() {
                step(&state, &output, &events, Instant::now());
                thread::sleep(POLL_INTERVAL);
            }
            debug!("playback engine shut down");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        *self.shutdown.lock().unwrap() = true;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
