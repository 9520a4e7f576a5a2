//! Known-name registry: every subreddit already listed in the directory wiki
//! pages (and, optionally, the discoveries page) is excluded from reports.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

use findareddit_common::{Config, ExclusionSet, PlatformError};

use crate::mentions::extract_mentions;
use crate::traits::Platform;

/// A wiki page holding known subreddit names.
///
/// Written either as a bare page path (`directory`), resolved against the
/// scanned subreddit, or fully qualified (`/r/other/wiki/network`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiSource {
    pub subreddit: Option<String>,
    pub page: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid wiki source {descriptor:?}: {reason}")]
pub struct WikiSourceError {
    pub descriptor: String,
    pub reason: &'static str,
}

impl WikiSource {
    pub fn on(subreddit: &str, page: &str) -> Self {
        Self {
            subreddit: Some(subreddit.to_string()),
            page: page.to_string(),
        }
    }

    /// The subreddit this page lives on, falling back to `default`.
    pub fn subreddit_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.subreddit.as_deref().unwrap_or(default)
    }
}

impl FromStr for WikiSource {
    type Err = WikiSourceError;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let fail = |reason| WikiSourceError {
            descriptor: descriptor.to_string(),
            reason,
        };

        let path = descriptor.trim().trim_start_matches('/');
        let (subreddit, page) = match path.strip_prefix("r/") {
            Some(rest) => {
                let (subreddit, page) = rest
                    .split_once("/wiki/")
                    .ok_or_else(|| fail("expected r/<subreddit>/wiki/<page>"))?;
                if subreddit.is_empty() || !subreddit.chars().all(is_name_char) {
                    return Err(fail("invalid subreddit name"));
                }
                (Some(subreddit.to_string()), page)
            }
            None => (None, path),
        };

        let page = page.trim_end_matches('/');
        if page.is_empty() {
            return Err(fail("empty page name"));
        }
        if !page.chars().all(|c| is_name_char(c) || matches!(c, '/' | '-' | '.'))
            || page.split('/').any(|seg| seg.is_empty() || seg == "..")
        {
            return Err(fail("invalid page path"));
        }

        Ok(Self {
            subreddit,
            page: page.to_string(),
        })
    }
}

impl fmt::Display for WikiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subreddit {
            Some(sub) => write!(f, "/r/{sub}/wiki/{}", self.page),
            None => write!(f, "wiki/{}", self.page),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Ordered list of sources for this configuration. The discoveries page is
/// appended when `check_newsubs` is on. Unparseable descriptors are logged
/// and dropped.
pub fn known_name_sources(config: &Config) -> Vec<WikiSource> {
    let mut sources: Vec<WikiSource> = config
        .directory_wikis
        .iter()
        .filter_map(|descriptor| match descriptor.parse() {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(error = %e, "Skipping known-name source");
                None
            }
        })
        .collect();

    if config.check_newsubs {
        sources.push(WikiSource::on(&config.newsubs_subreddit, &config.newsubs_wiki));
    }
    sources
}

/// Union of every subreddit mentioned across the configured known-name sources.
///
/// Missing or inaccessible pages are skipped. Transport failures propagate:
/// a partial registry would re-report names that are already known.
pub async fn build_exclusion_set(
    platform: &dyn Platform,
    config: &Config,
) -> Result<ExclusionSet, PlatformError> {
    let mut excluded = ExclusionSet::new();

    for source in known_name_sources(config) {
        let subreddit = source.subreddit_or(&config.subreddit);
        match platform.wiki_page(subreddit, &source.page).await {
            Ok(content) => {
                let names = extract_mentions(&content);
                info!(source = %source, names = names.len(), "Loaded known-name source");
                excluded.extend(names);
            }
            Err(PlatformError::NotFound(_)) => {
                warn!(source = %source, "Wiki page not found, skipping");
            }
            Err(e @ PlatformError::Transport(_)) => return Err(e),
            Err(
                e @ (PlatformError::Forbidden(_)
                | PlatformError::Redirect(_)
                | PlatformError::MalformedRequest(_)
                | PlatformError::Other(_)),
            ) => {
                warn!(source = %source, error = %e, "Could not read wiki page, skipping");
            }
        }
    }

    info!(total = excluded.len(), "Built exclusion set");
    Ok(excluded)
}
