//! Per-candidate validation against live subreddit state.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use findareddit_common::{
    CandidateRecord, ExclusionSet, PlatformError, ResultSet, SubredditInfo, Visibility,
};

use crate::traits::Platform;

/// Outcome of validating one candidate name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Already listed in a known-name source.
    Excluded,
    /// Accepted earlier in this run.
    AlreadyFound,
    NotFound,
    NotPublic,
    Quarantined,
    /// The lookup failed for this candidate only.
    Error,
    Accepted,
}

impl Disposition {
    /// Outcomes that settle a name for the rest of the run.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Error)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excluded => write!(f, "excluded"),
            Self::AlreadyFound => write!(f, "already_found"),
            Self::NotFound => write!(f, "not_found"),
            Self::NotPublic => write!(f, "not_public"),
            Self::Quarantined => write!(f, "quarantined"),
            Self::Error => write!(f, "error"),
            Self::Accepted => write!(f, "accepted"),
        }
    }
}

/// Classify a successful lookup.
pub fn classify_subreddit(info: &SubredditInfo) -> Disposition {
    if info.visibility != Visibility::Public {
        Disposition::NotPublic
    } else if info.quarantined {
        Disposition::Quarantined
    } else {
        Disposition::Accepted
    }
}

/// Validates candidates for a single run, remembering every settled outcome
/// so each name is queried at most once.
pub struct CandidateValidator<'a> {
    platform: &'a dyn Platform,
    excluded: &'a ExclusionSet,
    settled: HashMap<String, Disposition>,
}

impl<'a> CandidateValidator<'a> {
    pub fn new(platform: &'a dyn Platform, excluded: &'a ExclusionSet) -> Self {
        Self {
            platform,
            excluded,
            settled: HashMap::new(),
        }
    }

    /// Decide what to do with `name`, adding it to `results` if accepted.
    ///
    /// Lookup failures for the candidate are logged and reported as
    /// `Error`; only non-request-level failures are returned.
    pub async fn validate(
        &mut self,
        name: &str,
        results: &mut ResultSet,
    ) -> Result<Disposition, PlatformError> {
        if let Some(previous) = self.settled.get(name) {
            debug!(subreddit = name, disposition = %previous, "Already validated this run");
            return Ok(match previous {
                Disposition::Accepted => Disposition::AlreadyFound,
                other => *other,
            });
        }

        let disposition = self.evaluate(name, results).await?;
        if disposition.is_final() {
            self.settled.insert(name.to_string(), disposition);
        }
        Ok(disposition)
    }

    async fn evaluate(
        &self,
        name: &str,
        results: &mut ResultSet,
    ) -> Result<Disposition, PlatformError> {
        if self.excluded.contains(name) {
            info!(subreddit = name, "Already in directory");
            return Ok(Disposition::Excluded);
        }
        if results.contains(name) {
            info!(subreddit = name, "Already found this scan");
            return Ok(Disposition::AlreadyFound);
        }

        let subreddit = match self.platform.subreddit(name).await {
            Ok(info) => info,
            Err(PlatformError::NotFound(_) | PlatformError::Redirect(_)) => {
                info!(subreddit = name, "Not found");
                return Ok(Disposition::NotFound);
            }
            Err(PlatformError::Forbidden(_)) => {
                info!(subreddit = name, "Not public (forbidden)");
                return Ok(Disposition::NotPublic);
            }
            Err(e @ (PlatformError::MalformedRequest(_) | PlatformError::Transport(_))) => {
                warn!(subreddit = name, error = %e, "Lookup failed, skipping candidate");
                return Ok(Disposition::Error);
            }
            Err(e @ PlatformError::Other(_)) => return Err(e),
        };

        let disposition = classify_subreddit(&subreddit);
        match disposition {
            Disposition::NotPublic => {
                info!(subreddit = name, visibility = %subreddit.visibility, "Not public");
            }
            Disposition::Quarantined => {
                info!(subreddit = name, "Quarantined");
            }
            Disposition::Accepted => {
                results.insert(CandidateRecord {
                    name: name.to_string(),
                    description: subreddit.description,
                });
                info!(subreddit = name, "Adding to report");
            }
            _ => {}
        }
        Ok(disposition)
    }
}
