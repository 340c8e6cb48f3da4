/// GENSEQ - A generative MIDI note sequencer library
///
/// This library provides the core components for a small real-time
/// generative sequencer:
/// - Scale tables and random note generation
/// - A MIDI output channel with guaranteed note-off handling
/// - A playback engine for timing and coordination

pub mod generator;
pub mod midi;
pub mod scale;
pub mod sequencer;
pub mod timing;

// Re-export commonly used types
pub use generator::{GeneratorConfig, NoteGenerator};
pub use midi::{midi_note_name, Destination, DestinationRegistry, MidirRegistry, OutputChannel, OutputError, SendPort};
pub use scale::ScaleType;
pub use sequencer::{Sequencer, SequencerEvent, MAX_TEMPO, MIN_TEMPO};
pub use timing::{DelayQueue, TickClock};
