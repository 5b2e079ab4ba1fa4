//! nearest-note quantizer over a fixed three octave table
//!
//! Equal tempered solfège names, do3 through si5, referenced to la4 at
//! 440 Hz.  The table is scanned in pitch order and a tie keeps the earlier
//! entry, so lookups are deterministic.
use std::fmt;

pub const NOTE_TABLE: [(&str, f32); 36] = [
    ("do3", 130.8127827),
    ("do3#", 138.5913155),
    ("re3", 146.832384),
    ("re3#", 155.5634919),
    ("mi3", 164.8137785),
    ("fa3", 174.6141157),
    ("fa3#", 184.9972114),
    ("sol3", 195.997718),
    ("sol3#", 207.6523488),
    ("la3", 220.0),
    ("la3#", 233.0818808),
    ("si3", 246.9416506),
    ("do4", 261.6255653),
    ("do4#", 277.182631),
    ("re4", 293.6647679),
    ("re4#", 311.1269837),
    ("mi4", 329.6275569),
    ("fa4", 349.2282314),
    ("fa4#", 369.9944227),
    ("sol4", 391.995436),
    ("sol4#", 415.3046976),
    ("la4", 440.0),
    ("la4#", 466.1637615),
    ("si4", 493.8833013),
    ("do5", 523.2511306),
    ("do5#", 554.365262),
    ("re5", 587.3295358),
    ("re5#", 622.2539674),
    ("mi5", 659.2551138),
    ("fa5", 698.4564629),
    ("fa5#", 739.9888454),
    ("sol5", 783.990872),
    ("sol5#", 830.6093952),
    ("la5", 880.0),
    ("la5#", 932.327523),
    ("si5", 987.7666025),
];

/// result of quantizing a detected frequency to the note table
///
/// `difference` keeps its sign: negative means the note sits below the
/// input, so the player is sharp and should come down.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMatch {
    pub frequency: f32,
    pub name: &'static str,
    pub difference: f32,
}

impl Default for NoteMatch {
    fn default() -> NoteMatch {
        NoteMatch {
            frequency: -1.0,
            name: "no sound",
            difference: 0.0,
        }
    }
}

impl fmt::Display for NoteMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({:.2} Hz, {:+.2})",
            self.name, self.frequency, self.difference
        )
    }
}

/// map a frequency to the nearest table entry; non-positive input means
/// nothing is sounding and yields the default match
pub fn nearest_note(frequency: f32) -> NoteMatch {
    if frequency <= 0.0 {
        return NoteMatch::default();
    }
    let (first_name, first_freq) = NOTE_TABLE[0];
    let mut best = NoteMatch {
        frequency: first_freq,
        name: first_name,
        difference: first_freq - frequency,
    };
    for (name, note_freq) in NOTE_TABLE.iter().skip(1) {
        let difference = note_freq - frequency;
        if difference.abs() < best.difference.abs() {
            best = NoteMatch {
                frequency: *note_freq,
                name,
                difference,
            };
        }
    }
    best
}

#[cfg(test)]
mod test_tuner {
    use super::*;

    #[test]
    fn slightly_sharp_la4() {
        let m = nearest_note(442.0);
        assert_eq!(m.name, "la4");
        assert_eq!(m.frequency, 440.0);
        assert_eq!(m.difference, -2.0);
    }

    #[test]
    fn no_sound_sentinel() {
        for f in [-1.0, 0.0, -220.0] {
            let m = nearest_note(f);
            assert_eq!(m.frequency, -1.0);
            assert_eq!(m.name, "no sound");
            assert_eq!(m.difference, 0.0);
        }
    }

    #[test]
    fn exact_note_has_zero_difference() {
        let m = nearest_note(220.0);
        assert_eq!(m.name, "la3");
        assert_eq!(m.difference, 0.0);
    }

    #[test]
    fn clamps_to_the_table_edges() {
        assert_eq!(nearest_note(20.0).name, "do3");
        assert_eq!(nearest_note(5000.0).name, "si5");
    }

    #[test]
    fn flat_input_says_come_up() {
        let m = nearest_note(438.0);
        assert_eq!(m.name, "la4");
        assert!(m.difference > 0.0);
    }
}
