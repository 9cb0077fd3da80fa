//! # Musical Tuning Module
//!
//! This module provides the pitch tables the listener classifies against and
//! the nearest-pitch lookup itself.
//!
//! ## Features
//! - Immutable, frequency-sorted pitch tables with O(1) lookup by name
//! - A two-octave flute range (C5 to C7) with chromatic steps
//! - The 88-key equal-tempered piano (A0 to C8, A4 = 440 Hz)
//! - Binary-search nearest-pitch classification with deterministic ties
//! - Cent deviation calculations for tuning readouts
//!
//! Every table starts with a "pause" sentinel at -1 Hz, so silence (reported
//! by the detector as -1 Hz) classifies as a pause.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TableError;

/// Frequency of the pause sentinel; matches the detector's "no pitch" value.
pub const PAUSE_FREQUENCY: f32 = -1.0;

/// Name of the pause sentinel in the built-in tables.
pub const PAUSE_NAME: &str = "p";

/// Represents a single musical pitch with its staff placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    /// Frequency in Hz (-1 for the pause sentinel)
    pub frequency: f32,
    /// Pitch name (e.g., "fis'", "C#5")
    pub name: String,
    /// Position relative to the reference staff line (E5), in line intervals
    pub line_offset: f32,
    /// Whether this is a "black key" note
    pub is_half_step: bool,
}

impl Pitch {
    pub fn new(frequency: f32, name: impl Into<String>, line_offset: f32, is_half_step: bool) -> Self {
        Self { frequency, name: name.into(), line_offset, is_half_step }
    }

    pub fn pause() -> Self {
        Self::new(PAUSE_FREQUENCY, PAUSE_NAME, 0.0, false)
    }

    pub fn is_pause(&self) -> bool {
        self.frequency == PAUSE_FREQUENCY
    }

    /// Display title: `fis'` becomes `F#`, `bes` becomes `Bb`.
    pub fn title(&self) -> String {
        self.name
            .to_uppercase()
            .replace("IS", "#")
            .replace("ES", "b")
            .replace('\'', "")
    }

    /// Whether the note sits on a ledger line of its own outside the staff.
    ///
    /// Notes inside the five lines (offsets 0 to 4) never need one; outside,
    /// only notes placed exactly on a line do.
    pub fn has_ledger_line(&self) -> bool {
        if (0.0..=4.0).contains(&self.line_offset) {
            return false;
        }
        (self.line_offset * 4.0) as i32 % 4 == 0
    }
}

/// Index of the entry in `items` whose key frequency is closest to `frequency`.
///
/// `items` must be non-empty and sorted by strictly increasing `key`.
/// Frequencies at or below the first entry map to index 0, at or above the
/// last to the last index. Between two neighbours the numerically closer one
/// wins, with exact ties going to the lower index. NaN is treated as silence.
///
/// # Panics
/// * If `items` is empty
pub fn nearest_index<T>(items: &[T], frequency: f32, key: impl Fn(&T) -> f32) -> usize {
    assert!(!items.is_empty(), "cannot classify against an empty table");
    if frequency.is_nan() {
        return 0;
    }

    let mut min = 0;
    let mut max = items.len() - 1;
    loop {
        if frequency <= key(&items[min]) {
            return min;
        }
        if frequency >= key(&items[max]) {
            return max;
        }
        if max - min <= 1 {
            let to_max = key(&items[max]) - frequency;
            let to_min = frequency - key(&items[min]);
            return if to_max < to_min { max } else { min };
        }
        let middle = (min + max) / 2;
        if frequency <= key(&items[middle]) {
            max = middle;
        } else {
            min = middle;
        }
    }
}

/// An immutable pitch table sorted by frequency, with a name index.
#[derive(Debug, Clone)]
pub struct PitchTable {
    pitches: Vec<Pitch>,
    by_name: HashMap<String, usize>,
}

impl PitchTable {
    /// Builds a table from pitches that are already in frequency order.
    ///
    /// # Returns
    /// * `Err(TableError)` - If the table is empty, not strictly increasing,
    ///   or repeats a name
    pub fn new(pitches: Vec<Pitch>) -> Result<Self, TableError> {
        if pitches.is_empty() {
            return Err(TableError::Empty);
        }
        for (index, pair) in pitches.windows(2).enumerate() {
            // Written so that NaN frequencies are rejected too.
            if !(pair[1].frequency > pair[0].frequency) {
                return Err(TableError::NotSorted { index: index + 1, frequency: pair[1].frequency });
            }
        }

        let mut by_name = HashMap::with_capacity(pitches.len());
        for (index, pitch) in pitches.iter().enumerate() {
            if by_name.insert(pitch.name.clone(), index).is_some() {
                return Err(TableError::DuplicateName(pitch.name.clone()));
            }
        }

        debug!(entries = pitches.len(), "pitch table built");
        Ok(Self { pitches, by_name })
    }

    /// The pause sentinel plus two chromatic octaves from C5, topped with C7.
    pub fn flute() -> Self {
        const OCTAVE: [(f32, &str, f32, bool); 12] = [
            (523.25, "c", -1.0, false),
            (554.37, "cis", -0.75, true),
            (587.33, "d", -0.5, false),
            (622.25, "dis", -0.25, true),
            (659.25, "e", 0.0, false),
            (698.46, "f", 0.5, false),
            (739.99, "fis", 0.75, true),
            (783.99, "g", 1.0, false),
            (830.61, "gis", 1.25, true),
            (880.00, "a", 1.5, false),
            (932.33, "bes", 1.75, true),
            (987.77, "b", 2.0, false),
        ];

        let mut pitches = Vec::with_capacity(2 * OCTAVE.len() + 2);
        pitches.push(Pitch::pause());
        pitches.extend(OCTAVE.iter().map(|&(f, name, offset, half)| Pitch::new(f, name, offset, half)));
        pitches.extend(
            OCTAVE
                .iter()
                .map(|&(f, name, offset, half)| Pitch::new(f * 2.0, format!("{name}'"), offset + 3.5, half)),
        );
        pitches.push(Pitch::new(2093.00, "c''", 6.0, false));

        Self::new(pitches).expect("built-in flute table is sorted and uniquely named")
    }

    /// The pause sentinel plus the 88 keys of a standard piano (A0 to C8).
    ///
    /// Frequencies use equal temperament with A4 = 440 Hz. Staff offsets
    /// count diatonic steps from E5 at half a line interval each, with a
    /// further quarter for sharps.
    pub fn piano() -> Self {
        const NOTE_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        const DIATONIC_STEP: [i32; 12] = [0, 0, 1, 1, 2, 3, 3, 4, 4, 5, 5, 6];
        const REFERENCE_STEP: i32 = 5 * 7 + 2; // E5

        let mut pitches = Vec::with_capacity(89);
        pitches.push(Pitch::pause());
        for key in 0..88 {
            // A4 is the 49th key, which is index 48 in a 0-indexed loop.
            let frequency = 440.0 * 2.0_f32.powf((key as f32 - 48.0) / 12.0);
            let midi = key + 21;
            let class = midi % 12;
            let octave = midi / 12 - 1;
            let is_half_step = NOTE_NAMES[class as usize].ends_with('#');
            let step = octave * 7 + DIATONIC_STEP[class as usize];
            let line_offset =
                (step - REFERENCE_STEP) as f32 * 0.5 + if is_half_step { 0.25 } else { 0.0 };
            pitches.push(Pitch::new(
                frequency,
                format!("{}{}", NOTE_NAMES[class as usize], octave),
                line_offset,
                is_half_step,
            ));
        }

        Self::new(pitches).expect("built-in piano table is sorted and uniquely named")
    }

    /// Loads a table from a JSON array of pitches.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let pitches: Vec<Pitch> = serde_json::from_str(json).context("Invalid pitch table")?;
        Ok(Self::new(pitches)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pitch table {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Finds the closest pitch to a given frequency.
    ///
    /// # Arguments
    /// * `frequency` - Input frequency in Hz; -1 (no pitch) maps to the first entry
    ///
    /// # Returns
    /// * `(pitch, index)` - Closest pitch and its position in the table
    pub fn nearest(&self, frequency: f32) -> (&Pitch, usize) {
        let index = nearest_index(&self.pitches, frequency, |p| p.frequency);
        (&self.pitches[index], index)
    }

    pub fn by_name(&self, name: &str) -> Option<&Pitch> {
        self.index_of(name).map(|index| &self.pitches[index])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Pitch> {
        self.pitches.get(index)
    }

    pub fn first(&self) -> &Pitch {
        &self.pitches[0]
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pitch> {
        self.pitches.iter()
    }

    pub fn as_slice(&self) -> &[Pitch] {
        &self.pitches
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hundreds() -> PitchTable {
        PitchTable::new(vec![
            Pitch::new(100.0, "low", 0.0, false),
            Pitch::new(200.0, "mid", 0.5, false),
            Pitch::new(300.0, "high", 1.0, false),
        ])
        .unwrap()
    }

    #[test]
    fn nearest_picks_closer_neighbour() {
        let table = hundreds();
        assert_eq!(table.nearest(149.0).1, 0);
        assert_eq!(table.nearest(151.0).1, 1);
        assert_eq!(table.nearest(151.0).0.frequency, 200.0);
    }

    #[test]
    fn exact_midpoint_is_deterministic() {
        let table = hundreds();
        let (first, index) = table.nearest(250.0);
        assert_eq!(index, 1, "ties go to the lower index");
        for _ in 0..10 {
            assert_eq!(table.nearest(250.0), (first, index));
        }
    }

    #[test]
    fn out_of_range_clamps_to_ends() {
        let table = hundreds();
        for frequency in [-1.0, 0.0, 50.0, 100.0] {
            assert_eq!(table.nearest(frequency).1, 0);
        }
        for frequency in [300.0, 301.0, 20_000.0, f32::INFINITY] {
            assert_eq!(table.nearest(frequency).1, 2);
        }
        assert_eq!(table.nearest(f32::NAN).1, 0);
    }

    #[test]
    fn exact_frequencies_return_their_entry() {
        for table in [PitchTable::flute(), PitchTable::piano()] {
            for (index, pitch) in table.iter().enumerate() {
                assert_eq!(table.nearest(pitch.frequency), (pitch, index));
            }
        }
    }

    #[test]
    fn silence_classifies_as_pause() {
        let table = PitchTable::flute();
        let (pitch, index) = table.nearest(-1.0);
        assert_eq!(index, 0);
        assert!(pitch.is_pause());
        assert_eq!(pitch.title(), "P");
    }

    #[test]
    fn flute_table_layout() {
        let table = PitchTable::flute();
        assert_eq!(table.len(), 26);
        assert_eq!(table.by_name("a").unwrap().frequency, 880.0);
        assert_eq!(table.by_name("a'").unwrap().frequency, 1760.0);
        assert_eq!(table.by_name("c'").unwrap().line_offset, 2.5);
        assert_eq!(table.index_of("c''"), Some(25));
        assert!(table.by_name("h").is_none());

        let (pitch, _) = table.nearest(445.0 * 2.0);
        assert_eq!(pitch.name, "a");
    }

    #[test]
    fn piano_table_layout() {
        let table = PitchTable::piano();
        assert_eq!(table.len(), 89);
        assert_eq!(table.get(1).unwrap().name, "A0");
        assert_eq!(table.get(88).unwrap().name, "C8");

        let a4 = table.by_name("A4").unwrap();
        assert_eq!(a4.frequency, 440.0);
        assert!(!a4.is_half_step);

        // Staff placement agrees with the flute table.
        let flute_table = PitchTable::flute();
        for (piano, flute) in [("C5", "c"), ("C#5", "cis"), ("A#5", "bes"), ("C6", "c'"), ("C7", "c''")] {
            let piano = table.by_name(piano).unwrap();
            let flute = flute_table.by_name(flute).unwrap();
            assert_eq!(piano.line_offset, flute.line_offset);
            assert_eq!(piano.is_half_step, flute.is_half_step);
        }
    }

    #[test]
    fn titles() {
        let table = PitchTable::flute();
        assert_eq!(table.by_name("fis'").unwrap().title(), "F#");
        assert_eq!(table.by_name("bes").unwrap().title(), "Bb");
        assert_eq!(table.by_name("e").unwrap().title(), "E");
        assert_eq!(PitchTable::piano().by_name("C#5").unwrap().title(), "C#5");
    }

    #[test]
    fn ledger_lines() {
        let table = PitchTable::flute();
        assert!(table.by_name("c").unwrap().has_ledger_line());
        assert!(!table.by_name("cis").unwrap().has_ledger_line());
        assert!(!table.by_name("g").unwrap().has_ledger_line());
        assert!(!table.by_name("f'").unwrap().has_ledger_line());
        assert!(table.by_name("a'").unwrap().has_ledger_line());
    }

    #[test]
    fn rejects_invalid_tables() {
        assert_eq!(PitchTable::new(vec![]).unwrap_err(), TableError::Empty);
        assert_eq!(
            PitchTable::new(vec![Pitch::new(200.0, "x", 0.0, false), Pitch::new(200.0, "y", 0.0, false)])
                .unwrap_err(),
            TableError::NotSorted { index: 1, frequency: 200.0 }
        );
        assert_eq!(
            PitchTable::new(vec![Pitch::new(100.0, "x", 0.0, false), Pitch::new(200.0, "x", 0.0, false)])
                .unwrap_err(),
            TableError::DuplicateName("x".into())
        );
    }

    #[test]
    fn loads_json_tables() {
        let table = PitchTable::from_json_str(
            r#"[
                { "frequency": -1.0, "name": "p", "line_offset": 0.0, "is_half_step": false },
                { "frequency": 440.0, "name": "a", "line_offset": 1.5, "is_half_step": false }
            ]"#,
        )
        .unwrap();
        assert_eq!(table.nearest(430.0).0.name, "a");
        assert!(PitchTable::from_json_str(r#"[]"#).is_err());
    }

    #[test]
    fn cents() {
        assert!((cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((cents_deviation(440.0, 440.0)).abs() < 1e-6);
        assert!(cents_deviation(430.0, 440.0) < 0.0);
    }
}
