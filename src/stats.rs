use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::typewriter::Word;
use crate::util::{mean, std_dev};

/// By-value snapshot of a finished (or in-progress) session. Once produced
/// it is fully detached from the session that created it, and it is what the
/// history store persists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedStat {
    pub words: Vec<Word>,
    pub keystroke_count: u32,

    /// Typo count per expected character.
    pub char_typos: BTreeMap<char, u32>,

    /// Observed typing delays per expected character, in order.
    pub char_durations: BTreeMap<char, Vec<f64>>,

    /// Inter-word delay samples, in order.
    pub word_delays: Vec<f64>,

    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Aggregate metrics derived from one snapshot. Every degenerate input
/// (nothing typed, no delay samples) is `None` rather than a panic so the
/// display layer can special-case un-attempted sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct Metrics {
    /// Words per minute, one word = 5 characters, floored.
    pub wpm: Option<u32>,

    /// 1 minus the share of keystrokes that were typos.
    pub keystroke_accuracy: Option<f64>,

    /// 1 minus the share of units left with a flagged typo.
    pub word_accuracy: Option<f64>,

    /// Mean typing delay per expected character, seconds.
    pub avg_char_delay: BTreeMap<char, f64>,

    /// Mean inter-word delay, seconds.
    pub avg_word_delay: Option<f64>,

    /// 100 x population std-dev of the inter-word delays. Lower is steadier.
    pub word_rhythm: Option<f64>,

    /// 100 x population std-dev of all per-character delays pooled together.
    pub keystroke_rhythm: Option<f64>,
}

impl CompletedStat {
    /// Derives the aggregate metrics. Pure; the snapshot is not mutated.
    pub fn metrics(&self) -> Metrics {
        let total_duration: f64 = self.words.iter().map(|w| w.duration).sum();

        // units the user never engaged contribute no characters
        let typed_chars: usize = self
            .words
            .iter()
            .filter(|w| w.duration > 0.0)
            .map(Word::char_count)
            .sum();

        let wpm = if total_duration > 0.0 {
            let words_per_min = (typed_chars as f64 / 5.0) / (total_duration / 60.0);
            Some(words_per_min.floor() as u32)
        } else {
            None
        };

        let typo_total: u32 = self.char_typos.values().sum();
        let keystroke_accuracy = if self.keystroke_count > 0 {
            Some(1.0 - typo_total as f64 / self.keystroke_count as f64)
        } else {
            None
        };

        let word_accuracy = if self.words.is_empty() {
            None
        } else {
            let flawed = self.words.iter().filter(|w| !w.typos.is_empty()).count();
            Some(1.0 - flawed as f64 / self.words.len() as f64)
        };

        let avg_char_delay = self
            .char_durations
            .iter()
            .filter_map(|(c, durations)| mean(durations).map(|avg| (*c, avg)))
            .collect();

        let pooled = self
            .char_durations
            .values()
            .flatten()
            .copied()
            .collect_vec();

        Metrics {
            wpm,
            keystroke_accuracy,
            word_accuracy,
            avg_char_delay,
            avg_word_delay: mean(&self.word_delays),
            word_rhythm: std_dev(&self.word_delays).map(|sd| sd * 100.0),
            keystroke_rhythm: std_dev(&pooled).map(|sd| sd * 100.0),
        }
    }
}
