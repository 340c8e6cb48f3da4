/// Musical scale definitions - interval lookup tables

/// The scale a generated note is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleType {
    Major,
    NaturalMinor,
    MajorPentatonic,
    MinorPentatonic,
}

impl ScaleType {
    pub const ALL: [ScaleType; 4] = [
        ScaleType::Major,
        ScaleType::NaturalMinor,
        ScaleType::MajorPentatonic,
        ScaleType::MinorPentatonic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScaleType::Major => "Major",
            ScaleType::NaturalMinor => "Natural Minor",
            ScaleType::MajorPentatonic => "Major Pentatonic",
            ScaleType::MinorPentatonic => "Minor Pentatonic",
        }
    }

    /// Semitone offsets from the root note. Never empty; always starts at 0
    /// and ascends within a single octave.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleType::MinorPentatonic => &[0, 3, 5, 7, 10],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_never_empty() {
        for scale in ScaleType::ALL {
            assert!(!scale.intervals().is_empty(), "{} is empty", scale.name());
        }
    }

    #[test]
    fn test_intervals_root_first_and_ascending() {
        for scale in ScaleType::ALL {
            let intervals = scale.intervals();
            assert_eq!(intervals[0], 0);
            for pair in intervals.windows(2) {
                assert!(pair[0] < pair[1], "{} is not ascending", scale.name());
            }
            assert!(*intervals.last().unwrap() <= 11);
        }
    }

    #[test]
    fn test_major_scale_degrees() {
        assert_eq!(ScaleType::Major.intervals(), &[0, 2, 4, 5, 7, 9, 11]);
        assert_eq!(ScaleType::MinorPentatonic.intervals().len(), 5);
    }
}
