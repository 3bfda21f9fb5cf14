//! LRU replacement with second chance over five priority queues.
//!
//! Resident frames are kept in five queues, `Q00`, `Q01`, `Q10`, `Q11` and
//! `HQ`, from least to most recently used. The victim is always taken from
//! the head of `Q00`:
//!
//! 1. A head entry with `R = 0` is the victim.
//! 2. A head entry with `R = 1` gets a second chance: `R` is cleared and the
//!    entry goes to the tail of `Q00`.
//! 3. When `Q00` runs dry every queue moves down one tier and `HQ` is left
//!    empty.
//!
//! The victim's `C` bit decides whether the frame has to be paged out first.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use crate::constants::MAX_EVICTION_STEPS;
use crate::error::{DatError, Result};

/// The five replacement queues, lowest tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueName {
    Q00,
    Q01,
    Q10,
    Q11,
    Hq,
}

impl QueueName {
    pub const ALL: [QueueName; 5] = [
        QueueName::Q00,
        QueueName::Q01,
        QueueName::Q10,
        QueueName::Q11,
        QueueName::Hq,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            QueueName::Q00 => "Q00",
            QueueName::Q01 => "Q01",
            QueueName::Q10 => "Q10",
            QueueName::Q11 => "Q11",
            QueueName::Hq => "HQ",
        }
    }
}

impl FromStr for QueueName {
    type Err = DatError;

    fn from_str(s: &str) -> Result<Self> {
        QueueName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DatError::invalid(format!("unknown replacement queue: {s}")))
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A resident frame with its referenced (`R`) and changed (`C`) bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    pub frame: u16,
    pub referenced: bool,
    pub modified: bool,
}

impl QueueEntry {
    pub const fn new(frame: u16, referenced: bool, modified: bool) -> Self {
        QueueEntry {
            frame,
            referenced,
            modified,
        }
    }

    /// Build an entry from the `(frame, R, C)` triple notation; `R` and `C`
    /// must be 0 or 1.
    pub fn from_bits(frame: u16, referenced: u8, modified: u8) -> Result<Self> {
        match (referenced, modified) {
            (0 | 1, 0 | 1) => Ok(Self::new(frame, referenced == 1, modified == 1)),
            _ => Err(DatError::invalid(format!(
                "frame {frame}: R and C must be 0 or 1, got R={referenced} C={modified}"
            ))),
        }
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, R={}, C={})",
            self.frame, self.referenced as u8, self.modified as u8
        )
    }
}

/// Snapshot of the five replacement queues.
///
/// The same frame may appear in more than one queue; such input is accepted
/// as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSet {
    queues: [VecDeque<QueueEntry>; 5],
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one queue's contents, head first.
    pub fn with_queue(mut self, name: QueueName, entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        self.queues[name.index()] = entries.into_iter().collect();
        self
    }

    pub fn push(&mut self, name: QueueName, entry: QueueEntry) {
        self.queues[name.index()].push_back(entry);
    }

    pub fn queue(&self, name: QueueName) -> &VecDeque<QueueEntry> {
        &self.queues[name.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (QueueName, &VecDeque<QueueEntry>)> {
        QueueName::ALL.into_iter().zip(self.queues.iter())
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Move every queue down one tier and leave `HQ` empty.
    fn rotate(&mut self) {
        self.queues.rotate_left(1);
        self.queues[QueueName::Hq.index()].clear();
    }
}

impl Index<QueueName> for QueueSet {
    type Output = VecDeque<QueueEntry>;

    fn index(&self, name: QueueName) -> &Self::Output {
        self.queue(name)
    }
}

impl fmt::Display for QueueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, queue)) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{name:<3}:")?;
            for entry in queue {
                write!(f, " {entry}")?;
            }
        }
        Ok(())
    }
}

/// One decision taken while searching for a victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionStep {
    /// Head of `Q00` had `R = 1`; it was cleared and moved to the tail.
    SecondChance { frame: u16, modified: bool },
    /// `Q00` was empty and the queues moved down one tier.
    RotateQueues,
    VictimFound(QueueEntry),
}

impl fmt::Display for EvictionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionStep::SecondChance { frame, .. } => {
                write!(f, "frame {frame} has R=1: clear R, move to tail of Q00")
            }
            EvictionStep::RotateQueues => {
                write!(f, "Q00 empty: Q01->Q00, Q10->Q01, Q11->Q10, HQ->Q11")
            }
            EvictionStep::VictimFound(entry) => {
                write!(f, "frame {} has R=0: victim", entry.frame)
            }
        }
    }
}

/// Outcome of a replacement run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub victim: QueueEntry,
    pub steps: Vec<EvictionStep>,
    pub before: QueueSet,
    pub after: QueueSet,
}

impl Eviction {
    /// A changed victim has to be written back before its frame is reused.
    #[inline]
    pub fn needs_page_out(&self) -> bool {
        self.victim.modified
    }

    pub fn rotations(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, EvictionStep::RotateQueues))
            .count()
    }
}

/// Second chance victim selection with a bounded number of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondChance {
    limit: usize,
}

impl SecondChance {
    pub const fn new() -> Self {
        Self::with_limit(MAX_EVICTION_STEPS)
    }

    pub const fn with_limit(limit: usize) -> Self {
        SecondChance { limit }
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Pick a victim from a copy of `queues`.
    ///
    /// # Errors
    /// - [`DatError::NoVictimAvailable`] if every queue is empty.
    /// - [`DatError::ReplacementLimitExceeded`] if no victim turns up within
    ///   the iteration limit.
    pub fn evict(&self, queues: &QueueSet) -> Result<Eviction> {
        let mut working = queues.clone();
        let mut steps = Vec::new();

        for _ in 0..self.limit {
            let head = working.queues[QueueName::Q00.index()].pop_front();
            match head {
                Some(entry) if !entry.referenced => {
                    log::debug!("frame {} R=0 C={}: victim", entry.frame, entry.modified as u8);
                    steps.push(EvictionStep::VictimFound(entry));
                    return Ok(Eviction {
                        victim: entry,
                        steps,
                        before: queues.clone(),
                        after: working,
                    });
                }
                Some(entry) => {
                    log::debug!("frame {} R=1: second chance", entry.frame);
                    working.push(
                        QueueName::Q00,
                        QueueEntry {
                            referenced: false,
                            ..entry
                        },
                    );
                    steps.push(EvictionStep::SecondChance {
                        frame: entry.frame,
                        modified: entry.modified,
                    });
                }
                None => {
                    if working.is_empty() {
                        log::warn!("all replacement queues are empty");
                        return Err(DatError::NoVictimAvailable);
                    }
                    log::debug!("Q00 empty: rotating queues");
                    working.rotate();
                    steps.push(EvictionStep::RotateQueues);
                }
            }
        }

        log::warn!("no victim within {} iterations", self.limit);
        Err(DatError::ReplacementLimitExceeded { limit: self.limit })
    }
}

impl Default for SecondChance {
    fn default() -> Self {
        Self::new()
    }
}
