/// Note generation - one random scale tone per tick
use rand::Rng;

use crate::scale::ScaleType;

/// Tuning parameters for note generation. Read fresh on every tick so a
/// setting change is picked up by the very next note.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    scale: ScaleType,
    base_octave: i32,
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self {
            scale: ScaleType::Major,
            base_octave: 4, // C4 = 60
        }
    }

    pub fn scale(&self) -> ScaleType {
        self.scale
    }

    pub fn set_scale(&mut self, scale: ScaleType) {
        self.scale = scale;
    }

    pub fn base_octave(&self) -> i32 {
        self.base_octave
    }

    pub fn set_base_octave(&mut self, octave: i32) {
        self.base_octave = octave.clamp(2, 6);
    }

    /// Root note for the configured octave, derived rather than stored.
    pub fn root_pitch(&self) -> i32 {
        60 + (self.base_octave - 4) * 12
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NoteGenerator;

impl NoteGenerator {
    /// Generate one pitch: the scale root offset by a uniformly random
    /// interval, clamped to the MIDI range. Each draw is independent.
    pub fn generate(config: &GeneratorConfig) -> u8 {
        Self::generate_with(&mut rand::thread_rng(), config)
    }

    pub fn generate_with<R: Rng>(rng: &mut R, config: &GeneratorConfig) -> u8 {
        let root = config.root_pitch();
        let intervals = config.scale().intervals();

        // Degenerate fallback: an empty scale plays its root rather than
        // nothing, so a broken table stays audible instead of silent.
        if intervals.is_empty() {
            return root.clamp(0, 127) as u8;
        }

        let interval = intervals[rng.gen_range(0..intervals.len())];
        (root + interval as i32).clamp(0, 127) as u8
    }
}
