//! Digest delivery and the append-only discoveries page.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use findareddit_common::config::{COUNT_SLOT, SUBREDDITS_SLOT};
use findareddit_common::{Config, PlatformError, ResultSet, ScoutError};

use crate::traits::Platform;

/// Render the operator message from the configured template.
pub fn format_digest(template: &str, results: &ResultSet) -> String {
    let list = results
        .names()
        .map(|name| format!("/r/{name}"))
        .collect::<Vec<_>>()
        .join("\n\n* ");
    template
        .replace(COUNT_SLOT, &results.len().to_string())
        .replace(SUBREDDITS_SLOT, &list)
}

/// Append a timestamped table of `results` to existing page content.
pub fn append_discoveries(existing: &str, results: &ResultSet, now: DateTime<Utc>) -> String {
    let rows = results
        .records()
        .map(|r| {
            let description = r.description.replace(['\r', '\n'], " ");
            format!("/r/{}|||{}", r.name, description.trim())
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n{}\n\nSubreddit|||Description\n---|---|---|---\n{rows}",
        existing.trim_end(),
        now.format("%Y-%m-%dT%H:%M:%S"),
    )
}

/// What happened to the discoveries page this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Saved,
    Disabled,
    NothingToSave,
    PageMissing,
    Failed,
}

pub struct Reporter<'a> {
    platform: &'a dyn Platform,
    config: &'a Config,
}

impl<'a> Reporter<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a Config) -> Self {
        Self { platform, config }
    }

    /// Deliver the digest, then record the new names on the discoveries page.
    ///
    /// Delivery failures are returned. The page is only written after a
    /// successful delivery, and a failed write never fails the report.
    pub async fn report(
        &self,
        results: &ResultSet,
        now: DateTime<Utc>,
    ) -> Result<Persistence, ScoutError> {
        let body = format_digest(&self.config.pm_template, results);
        info!(found = results.len(), "Digest:\n{body}");

        self.platform
            .send_message(&self.config.pm_to, &self.config.pm_subject, &body)
            .await?;
        info!(to = %self.config.pm_to, "Sent digest");

        Ok(self.persist(results, now).await)
    }

    async fn persist(&self, results: &ResultSet, now: DateTime<Utc>) -> Persistence {
        if !self.config.save_newsubs {
            return Persistence::Disabled;
        }
        if results.is_empty() {
            return Persistence::NothingToSave;
        }

        let subreddit = &self.config.newsubs_subreddit;
        let page = &self.config.newsubs_wiki;

        let existing = match self.platform.wiki_page(subreddit, page).await {
            Ok(content) => content,
            Err(PlatformError::NotFound(_)) => {
                warn!(subreddit = %subreddit, page = %page, "Discoveries page not found, not saving");
                return Persistence::PageMissing;
            }
            Err(e) => {
                warn!(subreddit = %subreddit, page = %page, error = %e, "Could not read discoveries page");
                return Persistence::Failed;
            }
        };

        let content = append_discoveries(&existing, results, now);
        let reason = format!("Add {} newly found subreddits", results.len());
        match self
            .platform
            .edit_wiki_page(subreddit, page, &content, &reason)
            .await
        {
            Ok(()) => {
                info!(subreddit = %subreddit, page = %page, "Saved discoveries");
                Persistence::Saved
            }
            Err(e) => {
                warn!(subreddit = %subreddit, page = %page, error = %e, "Error writing discoveries page");
                Persistence::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, MockPlatform};
    use chrono::TimeZone;
    use findareddit_common::CandidateRecord;

    fn results(entries: &[(&str, &str)]) -> ResultSet {
        let mut set = ResultSet::new();
        for (name, description) in entries {
            set.insert(CandidateRecord {
                name: name.to_string(),
                description: description.to_string(),
            });
        }
        set
    }

    #[test]
    fn digest_lists_each_name_with_prefix() {
        let config = test_config();
        let body = format_digest(&config.pm_template, &results(&[("catgifs", "Cat pictures")]));
        assert!(body.starts_with("I found 1 subreddits mentioned in the last 24 hours"));
        assert!(body.contains("* /r/catgifs"));
    }

    #[test]
    fn digest_separates_multiple_names() {
        let body = format_digest(
            "{count}: * {subreddits}",
            &results(&[("b", ""), ("a", "")]),
        );
        assert_eq!(body, "2: * /r/a\n\n* /r/b");
    }

    #[test]
    fn discoveries_table_is_appended_after_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let content = append_discoveries(
            "Earlier finds\n\n",
            &results(&[("catgifs", "Cat\npictures"), ("birbs", "")]),
            now,
        );
        assert_eq!(
            content,
            "Earlier finds\n\n2024-03-01T12:30:00\n\nSubreddit|||Description\n---|---|---|---\n/r/birbs|||\n/r/catgifs|||Cat pictures"
        );
    }

    #[tokio::test]
    async fn saves_after_delivery() {
        let config = test_config();
        let platform = MockPlatform::new().on_wiki("findareddit", "newsubs", "old");

        let outcome = Reporter::new(&platform, &config)
            .report(&results(&[("catgifs", "Cat pictures")]), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome, Persistence::Saved);
        assert_eq!(platform.sent_messages().len(), 1);
        let edits = platform.wiki_edits();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].content.starts_with("old\n\n"));
        assert!(edits[0].content.ends_with("/r/catgifs|||Cat pictures"));
    }

    #[tokio::test]
    async fn missing_page_skips_save_but_still_delivers() {
        let config = test_config();
        let platform = MockPlatform::new();

        let outcome = Reporter::new(&platform, &config)
            .report(&results(&[("catgifs", "")]), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome, Persistence::PageMissing);
        assert_eq!(platform.sent_messages().len(), 1);
        assert!(platform.wiki_edits().is_empty());
    }

    #[tokio::test]
    async fn failed_write_does_not_fail_report() {
        let config = test_config();
        let platform = MockPlatform::new()
            .on_wiki("findareddit", "newsubs", "")
            .fail_wiki_edits(PlatformError::Forbidden("wiki edit".into()));

        let outcome = Reporter::new(&platform, &config)
            .report(&results(&[("catgifs", "")]), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, Persistence::Failed);
    }

    #[tokio::test]
    async fn delivery_failure_is_surfaced_and_nothing_saved() {
        let config = test_config();
        let platform = MockPlatform::new()
            .on_wiki("findareddit", "newsubs", "")
            .fail_messages(1, PlatformError::Transport("timed out".into()));

        let err = Reporter::new(&platform, &config)
            .report(&results(&[("catgifs", "")]), Utc::now())
            .await
            .unwrap_err();

        assert!(err.is_recoverable());
        assert!(platform.wiki_edits().is_empty());
    }

    #[tokio::test]
    async fn empty_results_still_deliver_without_saving() {
        let config = test_config();
        let platform = MockPlatform::new().on_wiki("findareddit", "newsubs", "");

        let outcome = Reporter::new(&platform, &config)
            .report(&ResultSet::new(), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome, Persistence::NothingToSave);
        let sent = platform.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.starts_with("I found 0 subreddits"));
    }
}
