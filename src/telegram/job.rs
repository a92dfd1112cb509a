//! Job lifecycle state machine.
//!
//! ```text
//! Idle -> AwaitingFormatChoice -> Downloading -> Uploading -> Idle
//!   \__________________________/^        ^           |
//!                                        \-----------/  (playlists only)
//! ```
//! Any state may fall back to `Idle` on completion or error.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    AwaitingFormatChoice,
    Downloading,
    Uploading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal job transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// State of one inbound event's work.
#[derive(Debug, Clone)]
pub struct Job {
    state: JobState,
    playlist: bool,
    visited: Vec<JobState>,
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl Job {
    pub fn new() -> Self {
        Self::starting_at(JobState::Idle, false)
    }

    /// Job that may loop `Uploading -> Downloading` once per entry.
    pub fn for_playlist() -> Self {
        Self::starting_at(JobState::Idle, true)
    }

    /// Job resumed from a quality button press.
    pub fn resumed() -> Self {
        Self::starting_at(JobState::AwaitingFormatChoice, false)
    }

    fn starting_at(state: JobState, playlist: bool) -> Self {
        Self {
            state,
            playlist,
            visited: vec![state],
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state this job has been in, in order.
    pub fn visited(&self) -> &[JobState] {
        &self.visited
    }

    pub fn can_advance(&self, to: JobState) -> bool {
        use JobState::*;
        match (self.state, to) {
            (Idle, AwaitingFormatChoice) | (Idle, Downloading) => true,
            (AwaitingFormatChoice, Downloading) => true,
            (Downloading, Uploading) => true,
            (Uploading, Downloading) => self.playlist,
            (from, Idle) => from != Idle,
            _ => false,
        }
    }

    /// Moves to `to`, or rejects and logs an illegal transition.
    pub fn advance(&mut self, to: JobState) -> Result<(), TransitionError> {
        if !self.can_advance(to) {
            let err = TransitionError { from: self.state, to };
            log::error!("{}", err);
            return Err(err);
        }
        log::debug!("Job transition {:?} -> {:?}", self.state, to);
        self.state = to;
        self.visited.push(to);
        Ok(())
    }

    /// Returns to `Idle` unless already there.
    pub fn finish(&mut self) {
        if self.state != JobState::Idle {
            self.state = JobState::Idle;
            self.visited.push(JobState::Idle);
        }
    }
}
