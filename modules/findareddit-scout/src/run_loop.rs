//! Scheduling loop: scan, report, sleep, repeat. Request-level failures are
//! retried with a linearly growing backoff until the failure ceiling.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use findareddit_common::{Config, ScoutError};

use crate::report::Reporter;
use crate::scan::Scanner;
use crate::traits::Platform;

/// Consecutive failed iterations tolerated before giving up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Scanning,
    Reporting,
    Sleeping,
    Aborted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::Reporting => write!(f, "reporting"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// In-memory failure bookkeeping. Reset by any successful iteration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    pub consecutive_failures: u32,
    pub backoff: Duration,
}

pub struct RunLoop<'a> {
    platform: &'a dyn Platform,
    config: &'a Config,
    state: LoopState,
    run_state: RunState,
}

impl<'a> RunLoop<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a Config) -> Self {
        Self {
            platform,
            config,
            state: LoopState::Idle,
            run_state: RunState::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Run until aborted. Only returns with the error that ended the loop.
    pub async fn run(mut self) -> Result<(), ScoutError> {
        loop {
            let pause = self.iterate().await?;
            self.state = LoopState::Sleeping;
            info!(secs = pause.as_secs(), "Sleeping");
            tokio::time::sleep(pause).await;
        }
    }

    /// One scan + report attempt. Returns how long to sleep before the next.
    ///
    /// Errors mean the loop is over: either a non-recoverable failure, or
    /// more than `MAX_CONSECUTIVE_FAILURES` recoverable ones in a row.
    pub async fn iterate(&mut self) -> Result<Duration, ScoutError> {
        if self.state == LoopState::Aborted {
            return Err(ScoutError::Aborted {
                failures: self.run_state.consecutive_failures,
            });
        }

        info!("Beginning scan");
        match self.scan_and_report().await {
            Ok(()) => {
                self.run_state = RunState::default();
                Ok(self.config.sleep_time)
            }
            Err(e) if e.is_recoverable() => {
                self.run_state.consecutive_failures += 1;
                let failures = self.run_state.consecutive_failures;
                if failures > MAX_CONSECUTIVE_FAILURES {
                    self.state = LoopState::Aborted;
                    error!(
                        failures,
                        error = %e,
                        "Too many consecutive failures without a successful run, exiting"
                    );
                    return Err(e);
                }

                let backoff = self.config.error_sleep.saturating_mul(failures);
                self.run_state.backoff = backoff;
                warn!(
                    failures,
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "Iteration failed, retrying after backoff"
                );
                Ok(backoff)
            }
            Err(e) => {
                self.state = LoopState::Aborted;
                error!(error = %e, "Unrecoverable error, exiting");
                Err(e)
            }
        }
    }

    async fn scan_and_report(&mut self) -> Result<(), ScoutError> {
        self.state = LoopState::Scanning;
        let outcome = Scanner::new(self.platform, self.config)
            .scan(Utc::now())
            .await?;

        self.state = LoopState::Reporting;
        let persistence = Reporter::new(self.platform, self.config)
            .report(&outcome.results, Utc::now())
            .await?;

        info!(
            found = outcome.results.len(),
            persistence = ?persistence,
            "Run complete. {}",
            outcome.stats
        );
        Ok(())
    }
}
