//! Change detection for readers that follow the ledger.
//!
//! The ledger only ever grows, so `(mtime, length)` is enough to notice a
//! new append. A [`Watcher`] polls that pair and replays when it moves.

use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::error::LedgerError;
use crate::log::AppendLog;
use crate::replay::{LedgerState, replay};

/// Polling watcher over one ledger file.
#[derive(Debug)]
pub struct Watcher {
    log: AppendLog,
    last: Option<(SystemTime, u64)>,
    state: Option<LedgerState>,
}

impl Watcher {
    #[must_use]
    pub const fn new(log: AppendLog) -> Self {
        Self {
            log,
            last: None,
            state: None,
        }
    }

    /// Check the ledger once.
    ///
    /// Returns the freshly replayed state when the file changed since the
    /// previous poll (the first successful poll always counts as a change),
    /// or `None` when nothing moved. A missing ledger is reported as no
    /// change.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file cannot be stat'ed or read.
    pub fn poll(&mut self) -> Result<Option<&LedgerState>, LedgerError> {
        let Some(stamp) = self.log.modified()? else {
            return Ok(None);
        };
        if self.last == Some(stamp) && self.state.is_some() {
            return Ok(None);
        }

        let state = replay(&self.log.read_all()?);
        tracing::debug!(
            events = state.events_applied(),
            len = stamp.1,
            "ledger changed"
        );
        self.last = Some(stamp);
        Ok(Some(&*self.state.insert(state)))
    }

    /// The state from the most recent change, if any poll has seen one.
    #[must_use]
    pub const fn state(&self) -> Option<&LedgerState> {
        self.state.as_ref()
    }

    /// Poll every `interval` until the ledger changes or `timeout` passes.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Watcher::poll`].
    pub fn wait_for_change(
        &mut self,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Option<&LedgerState>, LedgerError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll()?.is_some() {
                return Ok(self.state.as_ref());
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(interval);
        }
    }
}
