// Keyhook Hotkey Automaton
// Chord transition table with failure links for multi-step hotkeys

use std::collections::HashMap;

use super::Hotkey;
use crate::key::ScanCode;

/// Deterministic transition table for one hotkey.
///
/// States run from 0 (idle) to N (all N steps matched). Looking up a state
/// and a sorted chord gives the next state; unknown pairs go back to 0.
///
/// Besides the forward edges `i -> i+1`, the table holds failure links: when
/// the chord typed at state `i` is wrong for step `i` but equals an earlier
/// step's chord, matching resumes from the deepest state that chord reaches
/// when read as the continuation of a later suffix of the sequence. This is
/// the prefix function of streaming string matchers, over chords instead of
/// characters.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    transitions: HashMap<(usize, Vec<ScanCode>), usize>,
    steps: usize,
}

impl TransitionTable {
    /// Build the table for `hotkey`
    pub fn build(hotkey: &Hotkey) -> Self {
        let mut table = Self {
            transitions: HashMap::new(),
            steps: hotkey.len(),
        };

        // Chords of each step already added, in step order
        let mut history: Vec<Vec<Vec<ScanCode>>> = Vec::new();

        for (i, step) in hotkey.steps().iter().enumerate() {
            let path: Vec<&Vec<ScanCode>> = history.iter().filter_map(|v| v.first()).collect();

            let mut seen: Vec<&Vec<ScanCode>> = Vec::new();
            for previous in history.iter().flatten() {
                if seen.contains(&previous) {
                    continue;
                }
                seen.push(previous);

                let overlapping = (1..=path.len())
                    .map(|j| {
                        let suffix = path[j..].iter().copied().chain(std::iter::once(previous));
                        table.final_state(suffix)
                    })
                    .max()
                    .unwrap_or(0);
                table.transitions.insert((i, previous.clone()), overlapping);
            }

            let chords = step.chords();
            for chord in &chords {
                table.transitions.insert((i, chord.clone()), i + 1);
            }
            history.push(chords);
        }

        table
    }

    /// Next state after typing `chord` (sorted) in `state`
    pub fn next(&self, state: usize, chord: &[ScanCode]) -> usize {
        // Borrowed lookup would need a (usize, &[ScanCode]) key type
        self.transitions
            .get(&(state, chord.to_vec()))
            .copied()
            .unwrap_or(0)
    }

    /// State reached from idle after typing every chord in order
    pub fn final_state<'a, I>(&self, chords: I) -> usize
    where
        I: IntoIterator<Item = &'a Vec<ScanCode>>,
    {
        chords
            .into_iter()
            .fold(0, |state, chord| self.next(state, chord))
    }

    /// Number of steps, which is also the accepting state
    pub fn accepting_state(&self) -> usize {
        self.steps
    }

    /// Number of explicit (non-default) transitions
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
