/// Core sequencer logic - transport state machine and note emission
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::info;

use crate::generator::GeneratorConfig;
use crate::midi::{Destination, DestinationRegistry, OutputChannel, OutputError};
use crate::scale::ScaleType;
use crate::timing::{DelayQueue, TickClock};

pub mod playback;

use playback::PlaybackEngine;

pub const MIN_TEMPO: f32 = 60.0;
pub const MAX_TEMPO: f32 = 240.0;

/// How long an emitted pitch stays visible to observers before it is
/// cleared again.
pub const FEEDBACK_WINDOW: Duration = Duration::from_millis(200);

/// State changes published to observers, polled like the rest of the
/// surface. No UI binding is assumed.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    Started,
    Stopped,
    Note(u8),
    TempoChanged(f32),
    DestinationChanged(String),
}

/// Everything the engine step needs under one lock. Lock order throughout
/// the crate is state first, then output.
pub(crate) struct SequencerState {
    pub(crate) tempo: f32,
    pub(crate) running: bool,
    pub(crate) config: GeneratorConfig,
    pub(crate) last_played: Option<u8>,
    pub(crate) feedback_gen: u64,
    pub(crate) clock: TickClock,
    pub(crate) pending_clears: DelayQueue<u64>,
}

impl SequencerState {
    pub(crate) fn new() -> Self {
        Self {
            tempo: 120.0,
            running: false,
            config: GeneratorConfig::new(),
            last_played: None,
            feedback_gen: 0,
            clock: TickClock::new(),
            pending_clears: DelayQueue::new(),
        }
    }

    pub(crate) fn period(&self) -> Duration {
        Duration::from_secs_f32(60.0 / self.tempo)
    }

    /// Stopped -> Running. Returns false (and does nothing) if already
    /// running, so a second start never creates a second schedule.
    pub(crate) fn start(&mut self, now: Instant) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.clock.arm(now, self.period());
        true
    }

    /// Running -> Stopped. Disarms the clock so no tick is reported after
    /// this returns. Returns false if already stopped.
    pub(crate) fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.clock.disarm();
        true
    }

    /// Clamp and apply a new tempo. While running the schedule is re-armed
    /// (cancel-then-reschedule), so the new spacing takes effect with the
    /// very next tick; while stopped it applies on the next start.
    pub(crate) fn retune(&mut self, bpm: f32, now: Instant) -> f32 {
        self.tempo = bpm.clamp(MIN_TEMPO, MAX_TEMPO);
        if self.running {
            self.clock.arm(now, self.period());
        }
        self.tempo
    }

    /// Record an emitted pitch and arm its feedback clear. The generation
    /// counter guards the clear: a stale timer never clobbers a fresher
    /// pitch.
    pub(crate) fn note_emitted(&mut self, pitch: u8, now: Instant) {
        self.feedback_gen += 1;
        self.last_played = Some(pitch);
        self.pending_clears
            .schedule(now + FEEDBACK_WINDOW, self.feedback_gen);
    }

    pub(crate) fn expire_feedback(&mut self, now: Instant) {
        for generation in self.pending_clears.pop_due(now) {
            if generation == self.feedback_gen {
                self.last_played = None;
            }
        }
    }
}

/// Glue between the tick schedule, the note generator and the output
/// channel. One worker thread per instance pumps the schedule and the
/// deferred note-offs/clears; every public method is a short critical
/// section, never a blocking wait.
pub struct Sequencer {
    state: Arc<Mutex<SequencerState>>,
    output: Arc<Mutex<OutputChannel>>,
    events_tx: Sender<SequencerEvent>,
    events_rx: Receiver<SequencerEvent>,
    _engine: PlaybackEngine,
}

impl Sequencer {
    pub fn new(registry: Box<dyn DestinationRegistry>) -> Self {
        let state = Arc::new(Mutex::new(SequencerState::new()));
        let output = Arc::new(Mutex::new(OutputChannel::new(registry)));
        let (events_tx, events_rx) = channel();
        let engine = PlaybackEngine::spawn(
            Arc::clone(&state),
            Arc::clone(&output),
            events_tx.clone(),
        );

        Self {
            state,
            output,
            events_tx,
            events_rx,
            _engine: engine,
        }
    }

    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        if state.start(Instant::now()) {
            info!("sequencer started at {} BPM", state.tempo);
            let _ = self.events_tx.send(SequencerEvent::Started);
        }
    }

    /// Stop the schedule and silence the device. The state lock is held
    /// across both, so a tick that raced the stop is discarded rather than
    /// sounding after the panic sweep.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if state.stop() {
            self.output.lock().unwrap().all_notes_off();
            info!("sequencer stopped");
            let _ = self.events_tx.send(SequencerEvent::Stopped);
        }
    }

    pub fn set_tempo(&self, bpm: f32) {
        let mut state = self.state.lock().unwrap();
        let applied = state.retune(bpm, Instant::now());
        let _ = self.events_tx.send(SequencerEvent::TempoChanged(applied));
    }

    pub fn set_scale(&self, scale: ScaleType) {
        self.state.lock().unwrap().config.set_scale(scale);
    }

    pub fn set_base_octave(&self, octave: i32) {
        self.state.lock().unwrap().config.set_base_octave(octave);
    }

    pub fn tempo(&self) -> f32 {
        self.state.lock().unwrap().tempo
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn last_played(&self) -> Option<u8> {
        self.state.lock().unwrap().last_played
    }

    pub fn config(&self) -> GeneratorConfig {
        self.state.lock().unwrap().config
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.output.lock().unwrap().destinations()
    }

    pub fn destination_label(&self) -> Option<String> {
        self.output.lock().unwrap().destination_label()
    }

    pub fn select_destination(&self, id: &str) -> Result<(), OutputError> {
        let mut output = self.output.lock().unwrap();
        output.select_destination(id)?;
        if let Some(label) = output.destination_label() {
            let _ = self
                .events_tx
                .send(SequencerEvent::DestinationChanged(label));
        }
        Ok(())
    }

    pub fn clear_destination(&self) {
        self.output.lock().unwrap().clear_destination();
    }

    /// Drain everything published since the last poll.
    pub fn poll_events(&self) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::testing::MockRegistry;

    #[test]
    fn test_start_stop_transitions() {
        let registry = MockRegistry::with_ports(&[]);
        let seq = Sequencer::new(Box::new(registry));

        assert!(!seq.is_running());
        seq.start();
        assert!(seq.is_running());
        seq.start(); // no-op
        assert!(seq.is_running());
        seq.stop();
        assert!(!seq.is_running());
        seq.stop(); // no-op

        let events = seq.poll_events();
        assert_eq!(events, vec![SequencerEvent::Started, SequencerEvent::Stopped]);
    }

    #[test]
    fn test_stop_sends_all_notes_off_exactly_once() {
        let registry = MockRegistry::with_ports(&["Synth A"]);
        let log = registry.log("mock-0");
        let seq = Sequencer::new(Box::new(registry));
        seq.select_destination("mock-0").unwrap();

        seq.start();
        seq.stop();
        assert_eq!(log.lock().unwrap().len(), 16);

        // Stopping again does not repeat the sweep.
        seq.stop();
        assert_eq!(log.lock().unwrap().len(), 16);
    }

    #[test]
    fn test_tempo_clamped() {
        let registry = MockRegistry::with_ports(&[]);
        let seq = Sequencer::new(Box::new(registry));
        seq.set_tempo(30.0);
        assert_eq!(seq.tempo(), 60.0);
        seq.set_tempo(999.0);
        assert_eq!(seq.tempo(), 240.0);
        seq.set_tempo(93.5);
        assert_eq!(seq.tempo(), 93.5);
    }

    #[test]
    fn test_config_setters_clamp() {
        let registry = MockRegistry::with_ports(&[]);
        let seq = Sequencer::new(Box::new(registry));
        seq.set_base_octave(1);
        assert_eq!(seq.config().base_octave(), 2);
        seq.set_scale(ScaleType::MinorPentatonic);
        assert_eq!(seq.config().scale(), ScaleType::MinorPentatonic);
    }

    #[test]
    fn test_destination_selection_surface() {
        let registry = MockRegistry::with_ports(&["Synth A", "Synth B"]);
        let seq = Sequencer::new(Box::new(registry));

        assert_eq!(seq.destinations().len(), 2);
        assert!(seq.destination_label().is_none());

        seq.select_destination("mock-1").unwrap();
        assert_eq!(seq.destination_label().as_deref(), Some("Synth B"));
        assert!(seq
            .poll_events()
            .contains(&SequencerEvent::DestinationChanged("Synth B".to_string())));

        assert!(seq.select_destination("nope").is_err());
        assert_eq!(seq.destination_label().as_deref(), Some("Synth B"));
    }

    #[test]
    fn test_feedback_clear_is_generation_guarded() {
        let t0 = Instant::now();
        let mut state = SequencerState::new();

        // P at t=0, P' at t=0.05.
        state.note_emitted(60, t0);
        state.note_emitted(64, t0 + Duration::from_millis(50));

        // Inside the window P' is visible.
        state.expire_feedback(t0 + Duration::from_millis(150));
        assert_eq!(state.last_played, Some(64));

        // P's timer fires at t=0.2 but must not clear the fresher P'.
        state.expire_feedback(t0 + Duration::from_millis(210));
        assert_eq!(state.last_played, Some(64));

        // P''s own timer clears it at t=0.25.
        state.expire_feedback(t0 + Duration::from_millis(260));
        assert_eq!(state.last_played, None);
    }

    #[test]
    fn test_retune_while_stopped_applies_on_next_start() {
        let t0 = Instant::now();
        let mut state = SequencerState::new();
        state.retune(60.0, t0);
        assert!(!state.clock.is_armed());
        assert!(state.start(t0));
        assert_eq!(state.period(), Duration::from_secs(1));
    }
}
