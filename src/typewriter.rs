use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::history::HistoryStore;
use crate::stats::CompletedStat;

/// One unit the user must type: a real word, or the literal space that
/// separates two words.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,

    /// Seconds spent on this unit's characters so far.
    pub duration: f64,

    /// Char offsets within `text` whose most recent attempt was wrong.
    pub typos: BTreeSet<usize>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration: 0.0,
            typos: BTreeSet::new(),
        }
    }

    /// Splits source text into the alternating word/space sequence the user
    /// types against. Adjacent spaces yield zero-length word units, which are
    /// preserved; the sequence never ends with a space unit, and concatenating
    /// the produced texts reconstructs the input exactly.
    pub fn sequence(text: &str) -> Vec<Word> {
        let mut words = Vec::new();

        for token in text.split(' ') {
            words.push(Word::new(token));
            words.push(Word::new(" "));
        }

        // no separator after the last word
        words.pop();
        words
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn char_at(&self, idx: usize) -> Option<char> {
        self.text.chars().nth(idx)
    }
}

/// Session lifecycle. There is no transition out of `Ended`; `reset`
/// replaces the whole session instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Ended,
}

/// A keystroke delivered to the tracker. `Enter` is the commit control that
/// ends a session once every unit has been consumed; anywhere else it simply
/// fails to match the expected character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
}

type Observer = Box<dyn FnMut()>;

/// Tracks one typing session: cursor position within the word sequence,
/// per-character timing, and typo bookkeeping.
///
/// Every input is either accepted (a state transition) or silently ignored;
/// wrong characters are bookkeeping, not errors, so nothing here can fail on
/// user input.
pub struct Typewriter {
    words: Vec<Word>,

    word_index: usize,
    char_index: usize,

    phase: Phase,

    keystroke_count: u32,

    /// Typo count per expected character. Expecting 'e' and receiving 'r'
    /// increments the count for 'e'.
    char_typos: BTreeMap<char, u32>,

    /// Observed typing delays per expected character, in order.
    char_durations: BTreeMap<char, Vec<f64>>,

    /// One sample per completed real word: the time from finishing the
    /// previous unit to finishing that word.
    word_delays: Vec<f64>,

    char_anchor: Instant,
    word_anchor: Instant,

    render_observers: Vec<Observer>,
    end_observers: Vec<Observer>,

    history: Option<Box<dyn HistoryStore>>,
}

impl Typewriter {
    pub fn new(text: &str) -> Self {
        let now = Instant::now();
        Self {
            words: Word::sequence(text),
            word_index: 0,
            char_index: 0,
            phase: Phase::NotStarted,
            keystroke_count: 0,
            char_typos: BTreeMap::new(),
            char_durations: BTreeMap::new(),
            word_delays: Vec::new(),
            char_anchor: now,
            word_anchor: now,
            render_observers: Vec::new(),
            end_observers: Vec::new(),
            history: None,
        }
    }

    /// Attaches the store that receives the session snapshot when the
    /// session ends.
    pub fn with_history(text: &str, history: Box<dyn HistoryStore>) -> Self {
        let mut tw = Self::new(text);
        tw.history = Some(history);
        tw
    }

    /// Replaces the session with a fresh one built from `text`. The only way
    /// to abandon a session.
    pub fn reset(&mut self, text: &str) {
        self.words = Word::sequence(text);
        self.word_index = 0;
        self.char_index = 0;
        self.phase = Phase::NotStarted;
        self.keystroke_count = 0;
        self.char_typos.clear();
        self.char_durations.clear();
        self.word_delays.clear();

        let now = Instant::now();
        self.char_anchor = now;
        self.word_anchor = now;

        self.notify_render();
    }

    // Accessors hand out copies; callers can never alias internal state.

    pub fn words(&self) -> Vec<Word> {
        self.words.clone()
    }

    pub fn word_index(&self) -> usize {
        self.word_index
    }

    pub fn char_index(&self) -> usize {
        self.char_index
    }

    pub fn keystroke_count(&self) -> u32 {
        self.keystroke_count
    }

    pub fn char_typos(&self) -> BTreeMap<char, u32> {
        self.char_typos.clone()
    }

    pub fn char_durations(&self) -> BTreeMap<char, Vec<f64>> {
        self.char_durations.clone()
    }

    pub fn word_delays(&self) -> Vec<f64> {
        self.word_delays.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.phase != Phase::NotStarted
    }

    pub fn has_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Registers a callback fired after every successful mutation.
    pub fn on_render(&mut self, f: impl FnMut() + 'static) {
        self.render_observers.push(Box::new(f));
    }

    /// Registers a callback fired exactly once, when the session ends,
    /// before the snapshot is handed to the history store.
    pub fn on_end(&mut self, f: impl FnMut() + 'static) {
        self.end_observers.push(Box::new(f));
    }

    /// Feeds one keystroke to the session.
    pub fn write(&mut self, key: Key) {
        if self.phase == Phase::Ended {
            return;
        }

        if self.phase == Phase::NotStarted {
            self.start();
        }

        self.skip_empty_units();

        if self.word_index == self.words.len() {
            // everything consumed; only the commit control ends the session
            if key == Key::Enter {
                self.end();
            }
            return;
        }

        let Some(expected) = self.words[self.word_index].char_at(self.char_index) else {
            return;
        };

        let hit = matches!(key, Key::Char(c) if c == expected);
        if hit {
            // a corrected offset is no longer a typo
            self.words[self.word_index].typos.remove(&self.char_index);
        } else {
            *self.char_typos.entry(expected).or_insert(0) += 1;
            self.words[self.word_index].typos.insert(self.char_index);
        }

        let elapsed = self.char_anchor.elapsed().as_secs_f64();
        self.words[self.word_index].duration += elapsed;
        self.char_durations.entry(expected).or_default().push(elapsed);

        self.keystroke_count += 1;
        self.char_index += 1;

        let mut ended_now = false;

        if self.char_index == self.words[self.word_index].char_count() {
            self.word_index += 1;
            self.char_index = 0;

            // a flawless final word ends the session without a commit
            let ends = self.word_index == self.words.len()
                && self.words.last().is_some_and(|w| w.typos.is_empty());

            // a completed real word contributes one delay sample, measured
            // from the previous unit boundary; the word that ends the
            // session has no next word to pace against
            if !ends && expected != ' ' {
                self.word_delays.push(self.word_anchor.elapsed().as_secs_f64());
            }

            self.word_anchor = Instant::now();
            ended_now = ends;
        }

        self.char_anchor = Instant::now();
        self.notify_render();

        if ended_now {
            self.end();
        }
    }

    /// Moves the cursor back one character for re-typing. Recorded durations
    /// and typo counts are never reversed.
    pub fn backspace(&mut self) {
        if self.phase != Phase::InProgress {
            return;
        }

        if self.word_index == 0 && self.char_index == 0 {
            return;
        }

        if self.char_index == 0 {
            // step back over any zero-length units
            while self.word_index > 0 {
                self.word_index -= 1;
                let len = self.words[self.word_index].char_count();
                if len > 0 {
                    self.char_index = len - 1;
                    break;
                }
            }
        } else {
            self.char_index -= 1;
        }

        self.char_anchor = Instant::now();
        self.notify_render();
    }

    /// Snapshots the session by value; later session mutation cannot touch
    /// the result.
    pub fn snapshot(&self) -> CompletedStat {
        CompletedStat {
            words: self.words.clone(),
            keystroke_count: self.keystroke_count,
            char_typos: self.char_typos.clone(),
            char_durations: self.char_durations.clone(),
            word_delays: self.word_delays.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn start(&mut self) {
        let now = Instant::now();
        self.word_anchor = now;
        self.char_anchor = now;
        self.phase = Phase::InProgress;
    }

    fn end(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        self.phase = Phase::Ended;

        for observer in &mut self.end_observers {
            observer();
        }

        if let Some(store) = &self.history {
            let _ = store.append(&self.snapshot());
        }
    }

    /// Zero-length units (from adjacent spaces, or an empty source text)
    /// have nothing to type; the cursor passes straight over them.
    fn skip_empty_units(&mut self) {
        while self.word_index < self.words.len() && self.words[self.word_index].text.is_empty() {
            self.word_index += 1;
            self.char_index = 0;
        }
    }

    fn notify_render(&mut self) {
        for observer in &mut self.render_observers {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingStore {
        appended: Rc<RefCell<Vec<CompletedStat>>>,
    }

    impl HistoryStore for RecordingStore {
        fn append(&self, stat: &CompletedStat) -> std::io::Result<()> {
            self.appended.borrow_mut().push(stat.clone());
            Ok(())
        }

        fn load(&self) -> Vec<CompletedStat> {
            self.appended.borrow().clone()
        }
    }

    fn type_str(tw: &mut Typewriter, s: &str) {
        for c in s.chars() {
            tw.write(Key::Char(c));
        }
    }

    #[test]
    fn test_sequence_alternates_words_and_spaces() {
        let words = Word::sequence("cat dog");

        assert_eq!(words.len(), 3);
        assert_eq!(words[0].text, "cat");
        assert_eq!(words[1].text, " ");
        assert_eq!(words[2].text, "dog");
        assert!(words.iter().all(|w| w.duration == 0.0 && w.typos.is_empty()));
    }

    #[test]
    fn test_sequence_single_word_has_no_separator() {
        let words = Word::sequence("hello");

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "hello");
    }

    #[test]
    fn test_sequence_empty_text() {
        let words = Word::sequence("");

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "");
    }

    #[test]
    fn test_sequence_preserves_adjacent_spaces() {
        let words = Word::sequence("a  b");

        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["a", " ", "", " ", "b"]);
    }

    #[test]
    fn test_sequence_reconstructs_source() {
        for text in ["cat dog", "one", "", "a  b", " lead", "trail ", "x y z"] {
            let joined: String = Word::sequence(text).iter().map(|w| w.text.as_str()).collect();
            assert_eq!(joined, text, "reconstruction failed for {text:?}");
        }
    }

    #[test]
    fn test_write_correct_char_advances_cursor() {
        let mut tw = Typewriter::new("test");

        tw.write(Key::Char('t'));

        assert!(tw.has_started());
        assert_eq!(tw.keystroke_count(), 1);
        assert_eq!(tw.word_index(), 0);
        assert_eq!(tw.char_index(), 1);
        assert!(tw.words()[0].typos.is_empty());
    }

    #[test]
    fn test_write_incorrect_char_still_advances() {
        let mut tw = Typewriter::new("test");

        tw.write(Key::Char('x'));

        assert_eq!(tw.keystroke_count(), 1);
        assert_eq!(tw.char_index(), 1);
        assert_eq!(tw.char_typos().get(&'t'), Some(&1));
        assert!(tw.words()[0].typos.contains(&0));
    }

    #[test]
    fn test_spec_example_ab() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('x'));
        tw.write(Key::Char('b'));

        assert_eq!(tw.keystroke_count(), 2);
        assert_eq!(tw.char_typos().get(&'a'), Some(&1));
        // final word still flawed, so the session did not auto-end
        assert!(!tw.has_ended());

        // committing from the consumed position ends it
        tw.write(Key::Enter);
        assert!(tw.has_ended());

        let metrics = tw.snapshot().metrics();
        assert_eq!(metrics.keystroke_accuracy, Some(0.5));
    }

    #[test]
    fn test_flawless_final_word_ends_without_commit() {
        let mut tw = Typewriter::new("hi");

        tw.write(Key::Char('h'));
        assert_eq!(tw.phase(), Phase::InProgress);
        tw.write(Key::Char('i'));

        assert!(tw.has_ended());
        assert_eq!(tw.phase(), Phase::Ended);
    }

    #[test]
    fn test_write_after_end_is_ignored() {
        let mut tw = Typewriter::new("a");

        tw.write(Key::Char('a'));
        assert!(tw.has_ended());

        tw.write(Key::Char('a'));
        tw.write(Key::Enter);
        assert_eq!(tw.keystroke_count(), 1);
    }

    #[test]
    fn test_enter_mid_word_counts_as_typo() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Enter);

        assert_eq!(tw.keystroke_count(), 1);
        assert_eq!(tw.char_index(), 1);
        assert_eq!(tw.char_typos().get(&'a'), Some(&1));
    }

    #[test]
    fn test_non_commit_input_after_consumption_is_ignored() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('x'));
        tw.write(Key::Char('b'));
        let count = tw.keystroke_count();

        tw.write(Key::Char('q'));
        assert_eq!(tw.keystroke_count(), count);
        assert!(!tw.has_ended());
    }

    #[test]
    fn test_typo_set_corrected_by_retype() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('x'));
        assert!(tw.words()[0].typos.contains(&0));

        tw.backspace();
        tw.write(Key::Char('a'));

        assert!(tw.words()[0].typos.is_empty());
        // the global count is never reversed
        assert_eq!(tw.char_typos().get(&'a'), Some(&1));
    }

    #[test]
    fn test_typo_set_readd_is_idempotent() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('x'));
        tw.backspace();
        tw.write(Key::Char('y'));

        let words = tw.words();
        assert_eq!(words[0].typos.len(), 1);
        assert!(words[0].typos.contains(&0));
        assert_eq!(tw.char_typos().get(&'a'), Some(&2));
    }

    #[test]
    fn test_backspace_before_start_is_ignored() {
        let mut tw = Typewriter::new("ab");

        tw.backspace();

        assert_eq!(tw.word_index(), 0);
        assert_eq!(tw.char_index(), 0);
        assert!(!tw.has_started());
    }

    #[test]
    fn test_backspace_at_origin_is_ignored() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('x'));
        tw.backspace();
        tw.backspace();

        assert_eq!(tw.word_index(), 0);
        assert_eq!(tw.char_index(), 0);
    }

    #[test]
    fn test_backspace_wraps_to_previous_unit() {
        let mut tw = Typewriter::new("ab cd");

        type_str(&mut tw, "ab ");
        assert_eq!(tw.word_index(), 2);
        assert_eq!(tw.char_index(), 0);

        tw.backspace();
        assert_eq!(tw.word_index(), 1);
        assert_eq!(tw.char_index(), 0);

        tw.backspace();
        assert_eq!(tw.word_index(), 0);
        assert_eq!(tw.char_index(), 1);
    }

    #[test]
    fn test_backspace_then_retype_restores_position() {
        let mut tw = Typewriter::new("cat");

        type_str(&mut tw, "ca");
        let forward = tw.keystroke_count();

        tw.backspace();
        assert_eq!(tw.char_index(), 1);

        tw.write(Key::Char('a'));
        assert_eq!(tw.char_index(), 2);
        assert_eq!(tw.keystroke_count(), forward + 1);
    }

    #[test]
    fn test_keystroke_count_tracks_every_accepted_input() {
        let mut tw = Typewriter::new("cat dog");

        type_str(&mut tw, "cxt dog");
        assert_eq!(tw.keystroke_count(), 7);
    }

    #[test]
    fn test_perfect_run_has_no_typos() {
        let mut tw = Typewriter::new("cat dog");

        type_str(&mut tw, "cat dog");

        assert!(tw.has_ended());
        assert!(tw.char_typos().is_empty());
        assert!(tw.words().iter().all(|w| w.typos.is_empty()));

        let metrics = tw.snapshot().metrics();
        assert_eq!(metrics.keystroke_accuracy, Some(1.0));
        assert_eq!(metrics.word_accuracy, Some(1.0));
    }

    #[test]
    fn test_empty_text_commits_immediately() {
        let mut tw = Typewriter::new("");

        tw.write(Key::Enter);

        assert!(tw.has_ended());
        assert_eq!(tw.keystroke_count(), 0);
    }

    #[test]
    fn test_empty_text_ignores_ordinary_chars() {
        let mut tw = Typewriter::new("");

        tw.write(Key::Char('a'));

        assert!(!tw.has_ended());
        assert_eq!(tw.keystroke_count(), 0);
    }

    #[test]
    fn test_adjacent_spaces_are_typed_through() {
        let mut tw = Typewriter::new("a  b");

        type_str(&mut tw, "a  b");

        assert!(tw.has_ended());
        assert!(tw.char_typos().is_empty());
    }

    #[test]
    fn test_backspace_skips_empty_units() {
        let mut tw = Typewriter::new("a  b");

        type_str(&mut tw, "a  ");
        tw.backspace();

        // lands on the second space, not the zero-length unit between them
        assert_eq!(tw.words()[tw.word_index()].text, " ");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tw = Typewriter::new("cat");

        type_str(&mut tw, "cxt");
        tw.reset("dog");

        assert!(!tw.has_started());
        assert_eq!(tw.keystroke_count(), 0);
        assert_eq!(tw.word_index(), 0);
        assert_eq!(tw.char_index(), 0);
        assert!(tw.char_typos().is_empty());
        assert!(tw.char_durations().is_empty());
        assert!(tw.word_delays().is_empty());
        assert_eq!(tw.words()[0].text, "dog");
    }

    #[test]
    fn test_accessors_return_independent_copies() {
        let mut tw = Typewriter::new("ab");
        tw.write(Key::Char('x'));

        let mut words = tw.words();
        words[0].typos.clear();
        words[0].duration = 99.0;

        let mut typos = tw.char_typos();
        typos.insert('z', 42);

        assert!(tw.words()[0].typos.contains(&0));
        assert!(tw.char_typos().get(&'z').is_none());
    }

    #[test]
    fn test_durations_are_recorded_per_expected_char() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('a'));
        thread::sleep(Duration::from_millis(20));
        tw.write(Key::Char('x'));

        let durations = tw.char_durations();
        assert_eq!(durations.get(&'a').map(Vec::len), Some(1));
        // the miss is recorded under the expected 'b', not the typed 'x'
        assert_eq!(durations.get(&'b').map(Vec::len), Some(1));
        assert!(durations.get(&'x').is_none());
        assert!(durations[&'b'][0] >= 0.02);
    }

    #[test]
    fn test_word_duration_accumulates() {
        let mut tw = Typewriter::new("ab");

        tw.write(Key::Char('a'));
        thread::sleep(Duration::from_millis(15));
        tw.write(Key::Char('b'));

        assert!(tw.words()[0].duration > 0.0);
    }

    #[test]
    fn test_word_delays_sample_between_words() {
        let mut tw = Typewriter::new("ab cd ef");

        type_str(&mut tw, "ab cd ef");

        // "ab" and "cd" each pace against a following word; "ef" ends the
        // session and contributes nothing, and neither do the spaces
        assert_eq!(tw.word_delays().len(), 2);
        assert!(tw.word_delays().iter().all(|d| *d >= 0.0));
    }

    #[test]
    fn test_word_delay_measures_whole_word() {
        let mut tw = Typewriter::new("ab cd");

        tw.write(Key::Char('a'));
        thread::sleep(Duration::from_millis(30));
        tw.write(Key::Char('b'));

        let delays = tw.word_delays();
        assert_eq!(delays.len(), 1);
        assert!(delays[0] >= 0.03);
    }

    #[test]
    fn test_single_word_session_has_no_delay_samples() {
        let mut tw = Typewriter::new("a");

        tw.write(Key::Char('a'));

        assert!(tw.has_ended());
        assert!(tw.word_delays().is_empty());
    }

    #[test]
    fn test_flawed_final_word_still_samples_before_commit() {
        let mut tw = Typewriter::new("ab");

        type_str(&mut tw, "xb");
        assert_eq!(tw.word_delays().len(), 1);

        tw.write(Key::Enter);
        assert!(tw.has_ended());
        assert_eq!(tw.word_delays().len(), 1);
    }

    #[test]
    fn test_end_observer_fires_once() {
        let fired = Rc::new(RefCell::new(0));
        let seen = fired.clone();

        let mut tw = Typewriter::new("a");
        tw.on_end(move || *seen.borrow_mut() += 1);

        tw.write(Key::Char('a'));
        tw.write(Key::Enter);

        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_render_observers_fire_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut tw = Typewriter::new("ab");
        let first = log.clone();
        tw.on_render(move || first.borrow_mut().push(1));
        let second = log.clone();
        tw.on_render(move || second.borrow_mut().push(2));

        tw.write(Key::Char('a'));

        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_render_fires_on_reset_write_and_backspace() {
        let count = Rc::new(RefCell::new(0));
        let seen = count.clone();

        let mut tw = Typewriter::new("abc");
        tw.on_render(move || *seen.borrow_mut() += 1);

        tw.write(Key::Char('a'));
        tw.backspace();
        tw.reset("abc");

        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_session_end_appends_snapshot_to_history() {
        let store = RecordingStore::default();
        let appended = store.appended.clone();

        let mut tw = Typewriter::with_history("hi", Box::new(store));
        type_str(&mut tw, "hi");

        let stats = appended.borrow();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].keystroke_count, 2);
        assert_eq!(stats[0].words.len(), 1);
        assert!(stats[0].timestamp_ms > 0);
    }

    #[test]
    fn test_snapshot_is_detached_from_session() {
        let mut tw = Typewriter::new("ab cd");
        type_str(&mut tw, "ab ");

        let snap = tw.snapshot();
        type_str(&mut tw, "cd");

        assert_eq!(snap.keystroke_count, 3);
        assert!(snap.words[2].duration == 0.0);
    }
}
