//! Scan orchestration: walk the last window of posts, pull mentions out of
//! their comments, and validate each candidate.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::info;

use findareddit_common::{Config, Post, ResultSet, ScoutError};

use crate::mentions::extract_mentions;
use crate::registry::build_exclusion_set;
use crate::traits::Platform;
use crate::validator::{CandidateValidator, Disposition};

/// Counters from one scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub excluded_names: u64,
    pub posts_fetched: u64,
    pub posts_scanned: u64,
    pub mentions: u64,
    pub excluded: u64,
    pub already_found: u64,
    pub not_found: u64,
    pub not_public: u64,
    pub quarantined: u64,
    pub errors: u64,
    pub accepted: u64,
}

impl ScanStats {
    fn record(&mut self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Excluded => &mut self.excluded,
            Disposition::AlreadyFound => &mut self.already_found,
            Disposition::NotFound => &mut self.not_found,
            Disposition::NotPublic => &mut self.not_public,
            Disposition::Quarantined => &mut self.quarantined,
            Disposition::Error => &mut self.errors,
            Disposition::Accepted => &mut self.accepted,
        };
        *counter += 1;
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "posts_fetched={} posts_scanned={} mentions={} excluded={} already_found={} not_found={} not_public={} quarantined={} errors={} accepted={} known_names={}",
            self.posts_fetched,
            self.posts_scanned,
            self.mentions,
            self.excluded,
            self.already_found,
            self.not_found,
            self.not_public,
            self.quarantined,
            self.errors,
            self.accepted,
            self.excluded_names,
        )
    }
}

/// Result of a scan: the accepted candidates plus counters.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub results: ResultSet,
    pub stats: ScanStats,
}

/// A post is inside the window only if strictly newer than the cutoff.
pub fn in_window(post: &Post, cutoff: DateTime<Utc>) -> bool {
    post.created_at > cutoff
}

pub struct Scanner<'a> {
    platform: &'a dyn Platform,
    config: &'a Config,
}

impl<'a> Scanner<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a Config) -> Self {
        Self { platform, config }
    }

    /// Scan posts newer than `now - scan_window`.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanOutcome, ScoutError> {
        let mut stats = ScanStats::default();
        let excluded = build_exclusion_set(self.platform, self.config).await?;
        stats.excluded_names = excluded.len() as u64;

        let cutoff = now - self.config.scan_window;
        let posts = self.fetch_posts(cutoff).await?;
        stats.posts_fetched = posts.len() as u64;
        info!(
            count = posts.len(),
            cutoff = %cutoff.format("%Y-%m-%dT%H:%M:%S"),
            "Retrieved posts"
        );

        let mut results = ResultSet::new();
        let mut validator = CandidateValidator::new(self.platform, &excluded);

        for post in &posts {
            // The stream is newest first; nothing after this can be in the window.
            if !in_window(post, cutoff) {
                break;
            }
            info!(
                title = %post.title,
                created = %post.created_at.format("%Y-%m-%dT%H:%M:%S"),
                "Scanning post"
            );
            stats.posts_scanned += 1;

            let comments = self.platform.comment_bodies(post).await?;
            let candidates = extract_mentions(&comments.join(" "));
            stats.mentions += candidates.len() as u64;

            for name in &candidates {
                let disposition = validator.validate(name, &mut results).await?;
                stats.record(disposition);
            }
        }

        info!("Scan complete. {stats}");
        Ok(ScanOutcome { results, stats })
    }

    /// Page through the `new` stream until a post falls outside the window,
    /// the stream ends, or the page limit is hit.
    async fn fetch_posts(&self, cutoff: DateTime<Utc>) -> Result<Vec<Post>, ScoutError> {
        let mut posts: Vec<Post> = Vec::new();
        let mut after: Option<String> = None;

        for page_number in 0..self.config.scan_max_pages {
            let page = self
                .platform
                .new_posts(
                    &self.config.subreddit,
                    after.as_deref(),
                    self.config.scan_page_size,
                )
                .await?;

            let reached_cutoff = page.posts.iter().any(|p| !in_window(p, cutoff));
            let fetched = page.posts.len();
            posts.extend(page.posts);

            if reached_cutoff || fetched == 0 || page.after.is_none() {
                break;
            }
            if page_number + 1 == self.config.scan_max_pages {
                info!(pages = self.config.scan_max_pages, "Reached page limit");
            }
            after = page.after;
        }

        Ok(posts)
    }
}
