//! Procedural crossword generation: seeded blocked-cell layouts, a
//! dictionary-backed candidate index, and a backtracking fill solver raced
//! across independent worker threads.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use bit_set::BitSet;
use instant::{Duration, Instant};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use thiserror::Error;

/// The expected maximum length for a single slot, used to size stack buffers.
pub const MAX_SLOT_LENGTH: usize = 21;

/// Number of racing attempts launched when no seed is pinned.
pub const DEFAULT_ATTEMPT_COUNT: usize = 10;

/// Probability that a given even-row perturbation adds an extra blocked cell
/// during layout generation.
const EXTRA_BLOCK_CHANCE: f64 = 0.75;

/// An identifier for a given word, based on its index in the dictionary's
/// `words` field.
pub type WordId = usize;

/// The letters covered by one slot, with 0 standing for a cell that holds no
/// letter yet.
pub type SlotValue = SmallVec<[u8; MAX_SLOT_LENGTH]>;

const EMPTY: u8 = 0;
const BLOCK: u8 = b'.';

#[derive(Debug, Error)]
pub enum CrosswordError {
    #[error("dictionary contains no words")]
    EmptyDictionary,

    #[error("invalid grid dimensions: {rows}x{columns}")]
    InvalidDimensions { rows: usize, columns: usize },

    #[error("malformed grid template: {0}")]
    MalformedTemplate(&'static str),

    #[error("no attempt produced a solution within its step budget")]
    Unsolved,
}

/// Key for the per-position letter index: which words carry `letter` at
/// offset `pos`?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LetterKey {
    letter: u8,
    pos: usize,
}

/// An immutable word list with the two lookup structures the solver queries:
/// words bucketed by length, and word-id sets keyed by (letter, position).
/// Built once and shared read-only across all concurrent attempts.
pub struct WordDict {
    words: Vec<String>,
    word_set: HashSet<String>,
    length_buckets: HashMap<usize, Vec<WordId>>,
    letter_index: HashMap<LetterKey, BitSet>,
}

impl Debug for WordDict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordDict")
            .field("words", &(["(", &self.words.len().to_string(), " entries)"].join("")))
            .finish()
    }
}

impl WordDict {
    /// Index a word list. Duplicate entries are kept once. Words are expected
    /// to use a fixed lowercase alphabet; callers must pre-filter anything
    /// else.
    pub fn build<I, S>(words: I) -> Result<WordDict, CrosswordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dict = WordDict {
            words: Vec::new(),
            word_set: HashSet::new(),
            length_buckets: HashMap::new(),
            letter_index: HashMap::new(),
        };

        for word in words {
            let word: String = word.into();
            if !dict.word_set.insert(word.clone()) {
                continue;
            }

            let word_id = dict.words.len();
            dict.length_buckets.entry(word.len()).or_default().push(word_id);
            for (pos, letter) in word.bytes().enumerate() {
                dict.letter_index.entry(LetterKey { letter, pos }).or_default().insert(word_id);
            }
            dict.words.push(word);
        }

        if dict.words.is_empty() {
            return Err(CrosswordError::EmptyDictionary);
        }

        Ok(dict)
    }

    /// Exact membership test.
    pub fn contains(&self, word: &str) -> bool {
        self.word_set.contains(word)
    }

    pub fn word(&self, id: WordId) -> &str {
        &self.words[id]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Always false for a built dictionary; provided to pair with `len`.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// All word ids matching a partial slot value, where 0 marks an
    /// unconstrained position. We start from the length bucket and discard
    /// ids missing from the (letter, position) set of each fixed position,
    /// which bounds the work to the number of same-length words.
    pub fn candidates(&self, partial: &[u8]) -> Vec<WordId> {
        let Some(bucket) = self.length_buckets.get(&partial.len()) else {
            return Vec::new();
        };

        let mut candidates = bucket.clone();
        for (pos, &letter) in partial.iter().enumerate() {
            if letter == EMPTY {
                continue;
            }
            match self.letter_index.get(&LetterKey { letter, pos }) {
                Some(ids) => candidates.retain(|&id| ids.contains(id)),
                None => return Vec::new(),
            }
            if candidates.is_empty() {
                break;
            }
        }

        candidates
    }
}

/// What a single grid cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Blocked,
    Empty,
    Letter(char),
}

/// Direction that a slot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Across,
    Down,
}

/// A rows x columns cell array. Blocked cells are fixed at layout time; only
/// empty<->letter transitions happen during solving. Each solving attempt
/// owns its grid exclusively.
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    columns: usize,
    data: Vec<u8>,
}

impl Debug for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("cells", &format_args!("\n{self}"))
            .finish()
    }
}

impl Display for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.columns {
                if col > 0 {
                    f.write_str(" ")?;
                }
                match self.data[row * self.columns + col] {
                    BLOCK => f.write_str("#")?,
                    EMPTY => f.write_str("·")?,
                    letter => write!(f, "{}", letter as char)?,
                }
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

impl Grid {
    /// Generate the blocked/open pattern for the given dimensions.
    /// Deterministic: identical (rows, columns, seed) always produce
    /// identical layouts.
    pub fn generate(rows: usize, columns: usize, seed: u64) -> Result<Grid, CrosswordError> {
        if rows < 1 || columns < 1 {
            return Err(CrosswordError::InvalidDimensions { rows, columns });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(Grid::layout(rows, columns, &mut rng))
    }

    /// Layout generation proper. All randomness comes from the caller's
    /// stream, so concurrent generations never interfere.
    fn layout(rows: usize, columns: usize, rng: &mut StdRng) -> Grid {
        let mut data = vec![EMPTY; rows * columns];

        // The odd rows carry the characteristic diagonal block pattern; the
        // randomized perturbations break up long straight runs (row 0 seeds
        // extra verticals, wide grids get one extra block per even row).
        for i in 0..rows {
            for j in 0..columns {
                if i % 2 == 1 && (i + j) % 2 == 0 {
                    data[i * columns + j] = BLOCK;
                }
                if i == 0 && j % 2 == 0 && rng.gen::<f64>() < EXTRA_BLOCK_CHANCE {
                    data[j + rng.gen_range(0..rows) * columns] = BLOCK;
                }
            }
            if i % 2 == 0 && columns > 7 && rng.gen::<f64>() < EXTRA_BLOCK_CHANCE {
                data[i * columns + rng.gen_range(0..columns)] = BLOCK;
            }
        }

        // A cell walled in on all four sides would form a one-letter word, so
        // block it out too.
        for y in 0..rows {
            for x in 0..columns {
                if data[y * columns + x] == BLOCK {
                    continue;
                }
                if (x == 0 || data[y * columns + x - 1] == BLOCK)
                    && (x == columns - 1 || data[y * columns + x + 1] == BLOCK)
                    && (y == 0 || data[(y - 1) * columns + x] == BLOCK)
                    && (y == rows - 1 || data[(y + 1) * columns + x] == BLOCK)
                {
                    data[y * columns + x] = BLOCK;
                }
            }
        }

        Grid { rows, columns, data }
    }

    /// Build a grid from a template string: `#` for blocked cells, `.` for
    /// empty cells, lowercase letters for themselves. Blank lines and
    /// per-line indentation are ignored.
    pub fn from_template(template: &str) -> Result<Grid, CrosswordError> {
        let lines: Vec<&str> = template
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let rows = lines.len();
        if rows == 0 {
            return Err(CrosswordError::MalformedTemplate("template has no rows"));
        }
        let columns = lines[0].len();

        let mut data = Vec::with_capacity(rows * columns);
        for line in &lines {
            if line.len() != columns {
                return Err(CrosswordError::MalformedTemplate("template rows differ in length"));
            }
            for byte in line.bytes() {
                data.push(match byte {
                    b'#' => BLOCK,
                    b'.' => EMPTY,
                    b'a'..=b'z' => byte,
                    _ => {
                        return Err(CrosswordError::MalformedTemplate(
                            "cells must be '#', '.' or a lowercase letter",
                        ))
                    }
                });
            }
        }

        Ok(Grid { rows, columns, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell(&self, row: usize, column: usize) -> Cell {
        match self.data[row * self.columns + column] {
            BLOCK => Cell::Blocked,
            EMPTY => Cell::Empty,
            letter => Cell::Letter(letter as char),
        }
    }

    /// True once every non-blocked cell holds a letter.
    pub fn is_filled(&self) -> bool {
        self.data.iter().all(|&byte| byte != EMPTY)
    }

    /// All fillable slots: across slots in row-major order followed by down
    /// slots in column-major order.
    pub fn slots(&self) -> Vec<Slot> {
        let mut slots = self.across_slots();
        slots.extend(self.down_slots());
        slots
    }

    /// Maximal horizontal runs of open cells, length >= 2, in row-major scan
    /// order. Length-1 runs are dropped; layout post-processing should have
    /// removed them already, but the filter stays regardless.
    pub fn across_slots(&self) -> Vec<Slot> {
        let mut slots = Vec::new();
        for row in 0..self.rows {
            let mut run = 0;
            for col in 0..self.columns {
                if self.data[row * self.columns + col] == BLOCK {
                    if run >= 2 {
                        slots.push(Slot {
                            pos: row * self.columns + col - run,
                            length: run,
                            direction: Direction::Across,
                        });
                    }
                    run = 0;
                } else {
                    run += 1;
                }
            }
            if run >= 2 {
                slots.push(Slot {
                    pos: row * self.columns + self.columns - run,
                    length: run,
                    direction: Direction::Across,
                });
            }
        }
        slots
    }

    /// Maximal vertical runs of open cells, length >= 2, in column-major scan
    /// order.
    pub fn down_slots(&self) -> Vec<Slot> {
        let mut slots = Vec::new();
        for col in 0..self.columns {
            let mut run = 0;
            for row in 0..self.rows {
                if self.data[row * self.columns + col] == BLOCK {
                    if run >= 2 {
                        slots.push(Slot {
                            pos: (row - run) * self.columns + col,
                            length: run,
                            direction: Direction::Down,
                        });
                    }
                    run = 0;
                } else {
                    run += 1;
                }
            }
            if run >= 2 {
                slots.push(Slot {
                    pos: (self.rows - run) * self.columns + col,
                    length: run,
                    direction: Direction::Down,
                });
            }
        }
        slots
    }
}

/// A non-owning coordinate view into a grid: start offset, length and
/// direction. Slots are derived once from the fixed blocked-cell pattern and
/// must not outlive the grid they were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pos: usize,
    length: usize,
    direction: Direction,
}

impl Slot {
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The slot's starting cell as a 1-based (row, column) pair, the way
    /// presentation collaborators number clues.
    pub fn anchor(&self, grid: &Grid) -> (usize, usize) {
        (self.pos / grid.columns + 1, self.pos % grid.columns + 1)
    }

    fn positions(&self, columns: usize) -> impl Iterator<Item = usize> {
        let step = match self.direction {
            Direction::Across => 1,
            Direction::Down => columns,
        };
        let pos = self.pos;
        (0..self.length).map(move |i| pos + i * step)
    }

    /// The current letters along the slot, 0 for cells without a letter.
    pub fn value(&self, grid: &Grid) -> SlotValue {
        self.positions(grid.columns).map(|pos| grid.data[pos]).collect()
    }

    /// The slot's covered text, with `·` placeholders for empty cells.
    pub fn text(&self, grid: &Grid) -> String {
        self.positions(grid.columns)
            .map(|pos| match grid.data[pos] {
                EMPTY => '·',
                letter => letter as char,
            })
            .collect()
    }

    /// Write letters along the slot. The value length must equal the slot
    /// length; a mismatch is a contract violation, not a recoverable error.
    pub fn set_value(&self, grid: &mut Grid, value: &[u8]) {
        assert_eq!(
            value.len(),
            self.length,
            "slot of length {} assigned a value of length {}",
            self.length,
            value.len()
        );
        for (pos, &letter) in self.positions(grid.columns).zip(value) {
            grid.data[pos] = letter;
        }
    }

    pub fn is_filled(&self, grid: &Grid) -> bool {
        self.positions(grid.columns).all(|pos| grid.data[pos] != EMPTY)
    }
}

/// Tuning for the crawler's adaptive backtracking: undo `initial_depth`
/// placements per backtrack, undo `escalation_step` more after every
/// `escalation_period`-th consecutive failure, reset once the decision stack
/// empties. `escalation_period` must be at least 1.
#[derive(Debug, Clone, Copy)]
pub struct BacktrackTuning {
    pub initial_depth: usize,
    pub escalation_period: usize,
    pub escalation_step: usize,
}

impl Default for BacktrackTuning {
    fn default() -> BacktrackTuning {
        BacktrackTuning { initial_depth: 3, escalation_period: 10, escalation_step: 3 }
    }
}

/// A struct tracking statistics about one fill attempt.
#[derive(Debug, Clone)]
pub struct Statistics {
    pub steps: u64,
    pub backtracks: u64,
    pub duration: Duration,
}

/// How one fill attempt ended.
enum FillOutcome {
    Solved,
    Cancelled,
    OutOfSteps,
}

/// One undoable decision: which slot was written and what it held before.
struct Placement {
    slot_index: usize,
    previous: SlotValue,
}

/// The backtracking fill engine. Walks the slots longest-first, commits a
/// random dictionary candidate per slot, and unwinds the decision stack with
/// escalating depth when it dead-ends. Owned by a single attempt; never
/// shared.
struct Crawler<'a> {
    dict: &'a WordDict,
    slots: Vec<Slot>,
    stack: Vec<Placement>,
    used_words: HashSet<String>,
    cursor: usize,
    consecutive_failures: usize,
    backtrack_depth: usize,
    tuning: BacktrackTuning,
}

impl<'a> Crawler<'a> {
    fn new(grid: &Grid, dict: &'a WordDict, tuning: BacktrackTuning) -> Crawler<'a> {
        // Longest first: long slots have the fewest candidates and should be
        // pinned down before crossings constrain them further. The sort is
        // stable, so ties keep scan-discovery order.
        let mut slots = grid.slots();
        slots.sort_by(|a, b| b.length.cmp(&a.length));

        Crawler {
            dict,
            slots,
            stack: Vec::new(),
            used_words: HashSet::new(),
            cursor: 0,
            consecutive_failures: 0,
            backtrack_depth: tuning.initial_depth,
            tuning,
        }
    }

    fn run(
        &mut self,
        grid: &mut Grid,
        rng: &mut StdRng,
        cancelled: &AtomicBool,
        step_budget: Option<u64>,
        statistics: &mut Statistics,
    ) -> FillOutcome {
        loop {
            // Cooperative cancellation: a sibling attempt already won.
            if cancelled.load(Ordering::Relaxed) {
                return FillOutcome::Cancelled;
            }

            // Once the cursor has passed every slot, each one has been
            // validated against the dictionary and the used-word set, and
            // every open cell belongs to some slot.
            if self.cursor == self.slots.len() {
                debug_assert!(grid.is_filled());
                return FillOutcome::Solved;
            }

            if step_budget.is_some_and(|budget| statistics.steps >= budget) {
                return FillOutcome::OutOfSteps;
            }
            statistics.steps += 1;

            let slot = self.slots[self.cursor];
            let value = slot.value(grid);

            if slot.is_filled(grid) {
                // Completed as a side effect of crossing fills. It still has
                // to be a dictionary word that isn't used elsewhere.
                let word = match str::from_utf8(&value) {
                    Ok(word) => word,
                    Err(_) => {
                        self.backtrack(grid, statistics);
                        continue;
                    }
                };
                if !self.dict.contains(word) || self.used_words.contains(word) {
                    self.backtrack(grid, statistics);
                    continue;
                }
                self.used_words.insert(word.to_owned());
                self.stack.push(Placement { slot_index: self.cursor, previous: value });
                self.cursor += 1;
                continue;
            }

            let mut candidates = self.dict.candidates(&value);
            candidates.retain(|&id| !self.used_words.contains(self.dict.word(id)));
            if candidates.is_empty() {
                self.backtrack(grid, statistics);
                continue;
            }

            let word = self.dict.word(candidates[rng.gen_range(0..candidates.len())]);
            self.stack.push(Placement { slot_index: self.cursor, previous: value });
            slot.set_value(grid, word.as_bytes());
            self.used_words.insert(word.to_owned());
            self.cursor += 1;
        }
    }

    /// Undo the most recent placements and move the cursor back to the
    /// earliest undone slot. Draining the stack resets the escalation, since
    /// the search is back at the start.
    fn backtrack(&mut self, grid: &mut Grid, statistics: &mut Statistics) {
        statistics.backtracks += 1;
        self.consecutive_failures += 1;
        if self.consecutive_failures % self.tuning.escalation_period == 0 {
            self.backtrack_depth += self.tuning.escalation_step;
        }

        for _ in 0..self.backtrack_depth {
            let Some(placement) = self.stack.pop() else {
                self.reset_escalation();
                break;
            };

            let slot = self.slots[placement.slot_index];
            let committed = slot.value(grid);
            if let Ok(word) = str::from_utf8(&committed) {
                self.used_words.remove(word);
            }
            slot.set_value(grid, &placement.previous);
            self.cursor = placement.slot_index;

            if self.stack.is_empty() {
                self.reset_escalation();
                break;
            }
        }
    }

    fn reset_escalation(&mut self) {
        self.consecutive_failures = 0;
        self.backtrack_depth = self.tuning.initial_depth;
    }
}

/// Parameters for `solve`.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    pub rows: usize,
    pub columns: usize,
    /// A non-zero seed pins a single reproducible attempt; 0 means draw a
    /// fresh seed per racing attempt.
    pub seed: u64,
    /// Number of concurrent attempts when no seed is pinned.
    pub attempts: usize,
    /// Optional safety valve: give up an attempt after this many solver
    /// steps. The search has no inherent bound.
    pub step_budget: Option<u64>,
    pub tuning: BacktrackTuning,
}

impl SolveConfig {
    pub fn new(rows: usize, columns: usize) -> SolveConfig {
        SolveConfig {
            rows,
            columns,
            seed: 0,
            attempts: DEFAULT_ATTEMPT_COUNT,
            step_budget: None,
            tuning: BacktrackTuning::default(),
        }
    }
}

/// A filled grid together with the seed that produced it, which is enough to
/// reproduce the puzzle later with a pinned-seed `solve`.
#[derive(Debug, Clone)]
pub struct Solution {
    pub grid: Grid,
    pub seed: u64,
    pub statistics: Statistics,
}

/// Generate and fill a crossword. With a pinned seed this runs one
/// deterministic attempt and blocks until it solves; otherwise it races
/// `attempts` independent attempts and returns the first completed solution,
/// cancelling the rest.
pub fn solve(config: &SolveConfig, dict: &WordDict) -> Result<Solution, CrosswordError> {
    if config.rows < 1 || config.columns < 1 {
        return Err(CrosswordError::InvalidDimensions {
            rows: config.rows,
            columns: config.columns,
        });
    }

    let cancelled = AtomicBool::new(false);

    if config.seed != 0 {
        let solution =
            run_attempt(config, config.seed, dict, &cancelled).ok_or(CrosswordError::Unsolved)?;
        info!(
            "solved {}x{} with pinned seed {:#018x} in {:?}",
            config.rows, config.columns, solution.seed, solution.statistics.duration
        );
        return Ok(solution);
    }

    // Fill time is heavily seed-dependent, so racing independent attempts
    // turns a heavy-tailed latency into roughly the fastest attempt's. The
    // channel buffers a single result: the first finisher lands, flips the
    // cancellation flag, and the rest exit at their next check.
    let (sender, receiver) = mpsc::sync_channel::<Solution>(1);
    let received = thread::scope(|scope| {
        for _ in 0..config.attempts.max(1) {
            let sender = sender.clone();
            let cancelled = &cancelled;
            let seed = random_seed();
            scope.spawn(move || {
                if let Some(solution) = run_attempt(config, seed, dict, cancelled) {
                    let _ = sender.try_send(solution);
                    cancelled.store(true, Ordering::Relaxed);
                }
            });
        }
        drop(sender);
        receiver.recv()
    });

    match received {
        Ok(solution) => {
            info!(
                "solved {}x{} with seed {:#018x} after {} steps",
                config.rows, config.columns, solution.seed, solution.statistics.steps
            );
            Ok(solution)
        }
        Err(_) => Err(CrosswordError::Unsolved),
    }
}

/// One self-contained attempt: a private grid and crawler driven by a single
/// seeded stream covering both layout and candidate choice. The dictionary is
/// the only shared structure, and it is read-only.
fn run_attempt(
    config: &SolveConfig,
    seed: u64,
    dict: &WordDict,
    cancelled: &AtomicBool,
) -> Option<Solution> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut grid = Grid::layout(config.rows, config.columns, &mut rng);
    let mut crawler = Crawler::new(&grid, dict, config.tuning);
    let mut statistics =
        Statistics { steps: 0, backtracks: 0, duration: Duration::from_millis(0) };

    let start = Instant::now();
    let outcome = crawler.run(&mut grid, &mut rng, cancelled, config.step_budget, &mut statistics);
    statistics.duration = start.elapsed();

    match outcome {
        FillOutcome::Solved => {
            debug!("attempt {seed:#018x} solved in {:?}", statistics.duration);
            Some(Solution { grid, seed, statistics })
        }
        FillOutcome::Cancelled => {
            debug!("attempt {seed:#018x} cancelled after {} steps", statistics.steps);
            None
        }
        FillOutcome::OutOfSteps => {
            debug!("attempt {seed:#018x} gave up after {} steps", statistics.steps);
            None
        }
    }
}

fn random_seed() -> u64 {
    loop {
        let seed = rand::thread_rng().gen::<u64>();
        // 0 is reserved as the "draw a seed" sentinel
        if seed != 0 {
            return seed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every combination of the letters a/c/r/t of lengths 2..=max_len, so
    /// any slot value always has a candidate and the solver terminates fast.
    fn closed_dictionary(max_len: usize) -> Vec<String> {
        let letters = ['a', 'c', 'r', 't'];
        let mut prefixes = vec![String::new()];
        let mut words = Vec::new();
        for len in 1..=max_len {
            prefixes = prefixes
                .iter()
                .flat_map(|prefix| letters.iter().map(move |letter| format!("{prefix}{letter}")))
                .collect();
            if len >= 2 {
                words.extend_from_slice(&prefixes);
            }
        }
        words
    }

    /// Solve config with a step budget so a regression fails the assertion
    /// instead of hanging the test runner.
    fn budgeted(rows: usize, columns: usize, seed: u64) -> SolveConfig {
        let mut config = SolveConfig::new(rows, columns);
        config.seed = seed;
        config.step_budget = Some(5_000_000);
        config
    }

    fn assert_solved(grid: &Grid, dict: &WordDict) {
        assert!(grid.is_filled(), "unfilled cells remain:\n{grid}");
        let mut seen = HashSet::new();
        for slot in grid.slots() {
            let value = slot.value(grid);
            let word = str::from_utf8(&value).unwrap();
            assert!(dict.contains(word), "{word:?} is not a dictionary word");
            assert!(seen.insert(word.to_owned()), "{word:?} appears in two slots");
        }
    }

    #[test]
    fn build_rejects_an_empty_word_list() {
        assert!(matches!(
            WordDict::build(Vec::<String>::new()),
            Err(CrosswordError::EmptyDictionary)
        ));
    }

    #[test]
    fn contains_is_an_exact_membership_test() {
        let dict = WordDict::build(["cat", "car", "art", "rat"]).unwrap();
        assert!(dict.contains("cat"));
        assert!(!dict.contains("dog"));
        assert!(!dict.contains("ca"));
    }

    #[test]
    fn duplicate_words_are_indexed_once() {
        let dict = WordDict::build(["cat", "cat", "rat"]).unwrap();
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn candidates_respect_length_and_fixed_letters() {
        let dict = WordDict::build(["cat", "car", "art", "rat", "at"]).unwrap();

        fn words(dict: &WordDict, ids: Vec<WordId>) -> HashSet<&str> {
            ids.iter().map(|&id| dict.word(id)).collect()
        }

        assert_eq!(
            words(&dict, dict.candidates(&[EMPTY, EMPTY, EMPTY])),
            HashSet::from(["cat", "car", "art", "rat"])
        );
        assert_eq!(
            words(&dict, dict.candidates(&[b'c', EMPTY, EMPTY])),
            HashSet::from(["cat", "car"])
        );
        assert_eq!(words(&dict, dict.candidates(&[EMPTY, b't'])), HashSet::from(["at"]));
        assert!(dict.candidates(&[b'z', EMPTY, EMPTY]).is_empty());
        assert!(dict.candidates(&[EMPTY; 4]).is_empty());
    }

    #[test]
    fn layouts_are_deterministic_per_seed() {
        let first = Grid::generate(9, 9, 1234).unwrap();
        let second = Grid::generate(9, 9, 1234).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn layout_rejects_zero_dimensions() {
        assert!(matches!(Grid::generate(0, 5, 1), Err(CrosswordError::InvalidDimensions { .. })));
        assert!(matches!(Grid::generate(5, 0, 1), Err(CrosswordError::InvalidDimensions { .. })));
    }

    #[test]
    fn layouts_never_leave_isolated_cells() {
        for seed in 1..=25 {
            let grid = Grid::generate(9, 11, seed).unwrap();
            let slots = grid.slots();
            assert!(slots.iter().all(|slot| slot.length() >= 2));

            // every open cell must be covered by at least one slot
            let mut covered = vec![false; 9 * 11];
            for slot in &slots {
                let (row, col) = slot.anchor(&grid);
                for i in 0..slot.length() {
                    let (r, c) = match slot.direction() {
                        Direction::Across => (row - 1, col - 1 + i),
                        Direction::Down => (row - 1 + i, col - 1),
                    };
                    covered[r * 11 + c] = true;
                }
            }
            for row in 0..9 {
                for col in 0..11 {
                    if grid.cell(row, col) != Cell::Blocked {
                        assert!(
                            covered[row * 11 + col],
                            "seed {seed}: open cell ({row},{col}) not in any slot"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn templates_parse_into_the_expected_slots() {
        let grid = Grid::from_template(
            "
            ..#
            ...
            #..
            ",
        )
        .unwrap();
        assert_eq!((grid.rows(), grid.columns()), (3, 3));

        let across = grid.across_slots();
        let lengths: Vec<_> = across.iter().map(Slot::length).collect();
        let anchors: Vec<_> = across.iter().map(|slot| slot.anchor(&grid)).collect();
        assert_eq!(lengths, vec![2, 3, 2]);
        assert_eq!(anchors, vec![(1, 1), (2, 1), (3, 2)]);

        let down = grid.down_slots();
        let lengths: Vec<_> = down.iter().map(Slot::length).collect();
        let anchors: Vec<_> = down.iter().map(|slot| slot.anchor(&grid)).collect();
        assert_eq!(lengths, vec![2, 3, 2]);
        assert_eq!(anchors, vec![(1, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(matches!(Grid::from_template(""), Err(CrosswordError::MalformedTemplate(_))));
        assert!(matches!(
            Grid::from_template("..\n..."),
            Err(CrosswordError::MalformedTemplate(_))
        ));
        assert!(matches!(Grid::from_template("A."), Err(CrosswordError::MalformedTemplate(_))));
    }

    #[test]
    fn slot_values_read_and_write_through_the_grid() {
        let mut grid = Grid::from_template("...\n...\n###").unwrap();
        let slot = grid.across_slots()[0];

        assert!(!slot.is_filled(&grid));
        slot.set_value(&mut grid, b"cat");
        assert_eq!(&slot.value(&grid)[..], b"cat");
        assert!(slot.is_filled(&grid));
        assert_eq!(grid.cell(0, 1), Cell::Letter('a'));
        assert_eq!(slot.text(&grid), "cat");

        // a crossing slot reads the same letter through the shared cell
        let down = grid.down_slots()[0];
        assert_eq!(down.value(&grid)[0], b'c');
        assert_eq!(down.text(&grid), "c·");
    }

    #[test]
    #[should_panic]
    fn set_value_rejects_mismatched_lengths() {
        let mut grid = Grid::from_template("...\n###\n...").unwrap();
        let slot = grid.across_slots()[0];
        slot.set_value(&mut grid, b"no");
    }

    #[test]
    fn pinned_seeds_reproduce_identical_grids() {
        let dict = WordDict::build(closed_dictionary(5)).unwrap();
        let config = budgeted(5, 5, 42);

        let first = solve(&config, &dict).unwrap();
        let second = solve(&config, &dict).unwrap();

        assert_eq!(first.seed, 42);
        assert_eq!(first.grid, second.grid);
        assert_solved(&first.grid, &dict);
    }

    #[test]
    fn solved_grids_are_valid_unique_and_complete() {
        let dict = WordDict::build(closed_dictionary(6)).unwrap();
        let solution = solve(&budgeted(6, 6, 7), &dict).unwrap();
        assert_solved(&solution.grid, &dict);
    }

    #[test]
    fn racing_attempts_yield_one_valid_solution() {
        let dict = WordDict::build(closed_dictionary(5)).unwrap();
        let mut config = budgeted(5, 5, 0);
        config.attempts = 8;

        let solution = solve(&config, &dict).unwrap();
        assert_ne!(solution.seed, 0);
        assert_solved(&solution.grid, &dict);
    }

    #[test]
    fn custom_backtrack_tuning_still_solves() {
        let dict = WordDict::build(closed_dictionary(5)).unwrap();
        let mut config = budgeted(5, 5, 3);
        config.tuning =
            BacktrackTuning { initial_depth: 1, escalation_period: 5, escalation_step: 2 };

        let solution = solve(&config, &dict).unwrap();
        assert_solved(&solution.grid, &dict);
    }

    #[test]
    fn single_row_grids_hold_only_across_words() {
        let dict = WordDict::build(closed_dictionary(7)).unwrap();
        let solution = solve(&budgeted(1, 7, 11), &dict).unwrap();
        assert!(solution.grid.down_slots().is_empty());
        assert_solved(&solution.grid, &dict);
    }

    #[test]
    fn one_by_one_grids_are_trivially_solved() {
        let dict = WordDict::build(["at"]).unwrap();
        let solution = solve(&budgeted(1, 1, 5), &dict).unwrap();
        assert!(solution.grid.slots().is_empty());
        assert!(solution.grid.is_filled());
    }

    #[test]
    fn an_inadequate_dictionary_exhausts_the_step_budget() {
        // 5x5 layouts always contain a slot longer than two cells, so a
        // two-letter dictionary can never complete one
        let dict = WordDict::build(["aa", "at", "ta"]).unwrap();
        let mut config = SolveConfig::new(5, 5);
        config.seed = 9;
        config.step_budget = Some(10_000);

        assert!(matches!(solve(&config, &dict), Err(CrosswordError::Unsolved)));
    }

    #[test]
    fn solve_rejects_zero_dimensions() {
        let dict = WordDict::build(["at"]).unwrap();
        assert!(matches!(
            solve(&SolveConfig::new(0, 3), &dict),
            Err(CrosswordError::InvalidDimensions { .. })
        ));
    }
}
