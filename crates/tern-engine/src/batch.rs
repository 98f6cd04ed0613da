//! Batch requests and results.

use crate::error::EngineError;
use std::fmt;
use tern_core::UnitId;

/// Which way a batch moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply pending units
    Up,
    /// Revert applied units
    Down,
}

impl Direction {
    /// Past-tense verb for messages.
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Up => "applied",
            Direction::Down => "reverted",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// How far a batch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Every eligible unit
    All,
    /// At most this many units
    Count(usize),
    /// Up: pending units with id <= target. Down: applied units with id >= target.
    Through(UnitId),
}

impl Limit {
    /// Limit used when the caller gives none: everything forward, one unit
    /// backward.
    pub fn default_for(direction: Direction) -> Self {
        match direction {
            Direction::Up => Limit::All,
            Direction::Down => Limit::Count(1),
        }
    }
}

/// Outcome of one [`Engine::run`](crate::Engine::run).
#[derive(Debug)]
pub struct BatchResult {
    /// Direction of the batch
    pub direction: Direction,

    /// Units applied or reverted, in execution order
    pub completed: Vec<UnitId>,

    /// Failure that stopped the batch
    pub error: Option<EngineError>,
}

impl BatchResult {
    pub(crate) fn settled(direction: Direction, completed: Vec<UnitId>) -> Self {
        Self {
            direction,
            completed,
            error: None,
        }
    }

    pub(crate) fn failed(direction: Direction, completed: Vec<UnitId>, error: EngineError) -> Self {
        Self {
            direction,
            completed,
            error: Some(error),
        }
    }

    /// True when the batch finished without error, including a no-op batch.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Process exit code for this batch: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}
