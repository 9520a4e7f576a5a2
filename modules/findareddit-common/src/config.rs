use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;

pub const COUNT_SLOT: &str = "{count}";
pub const SUBREDDITS_SLOT: &str = "{subreddits}";

const DEFAULT_PM_TEMPLATE: &str = "I found {count} subreddits mentioned in the last 24 hours that aren't in the directory:

* {subreddits}
";

/// Upper bound for `SLEEP_TIME_SECS` (one week).
const MAX_SLEEP_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper bound for `ERROR_SLEEP_SECS` (one hour). Backoff multiplies it by the
/// failure count, so the longest retry pause stays well under a day.
const MAX_ERROR_SLEEP_SECS: u64 = 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Reddit script-app credentials
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_username: String,
    pub reddit_password: String,
    pub reddit_user_agent: String,

    // Scan target
    pub subreddit: String,
    pub scan_window: chrono::Duration,
    pub scan_max_pages: u32,
    pub scan_page_size: u32,

    // Known-name sources
    pub directory_wikis: Vec<String>,
    pub newsubs_wiki: String,
    pub newsubs_subreddit: String,
    pub check_newsubs: bool,
    pub save_newsubs: bool,

    // Report
    pub pm_to: String,
    pub pm_subject: String,
    pub pm_template: String,

    // Scheduling
    pub sleep_time: Duration,
    pub error_sleep: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let reddit_username = vars.required("REDDIT_USERNAME")?;
        let subreddit = vars.or("SUBREDDIT_NAME", "findareddit");
        let reddit_user_agent = vars.or(
            "REDDIT_USER_AGENT",
            &format!(
                "findareddit-scout/{} by /u/{reddit_username}",
                env!("CARGO_PKG_VERSION")
            ),
        );

        let directory_wikis = vars
            .or("DIRECTORY_WIKIS", "directory,/r/sfwpornnetwork/wiki/network")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let pm_template = vars.or("PM_TEMPLATE", DEFAULT_PM_TEMPLATE);
        for slot in [COUNT_SLOT, SUBREDDITS_SLOT] {
            if !pm_template.contains(slot) {
                return Err(ConfigError::Invalid {
                    key: "PM_TEMPLATE".to_string(),
                    value: pm_template,
                    reason: format!("missing {slot} slot"),
                });
            }
        }

        let scan_window_hours: i64 = vars.parsed("SCAN_WINDOW_HOURS", 24)?;
        let scan_page_size: u32 = vars.parsed("SCAN_PAGE_SIZE", 100)?;

        Ok(Self {
            reddit_client_id: vars.required("REDDIT_CLIENT_ID")?,
            reddit_client_secret: vars.required("REDDIT_CLIENT_SECRET")?,
            reddit_password: vars.required("REDDIT_PASSWORD")?,
            reddit_username,
            reddit_user_agent,
            newsubs_subreddit: vars.or("NEWSUBS_SUBREDDIT", &subreddit),
            subreddit,
            scan_window: chrono::Duration::hours(scan_window_hours),
            scan_max_pages: vars.parsed("SCAN_MAX_PAGES", 10)?,
            scan_page_size: scan_page_size.clamp(1, 100),
            directory_wikis,
            newsubs_wiki: vars.or("NEWSUBS_WIKI", "newsubs"),
            check_newsubs: vars.flag("CHECK_NEWSUBS", true)?,
            save_newsubs: vars.flag("SAVE_NEWSUBS", true)?,
            pm_to: vars.required("PM_TO")?,
            pm_subject: vars.or("PM_SUBJECT", "Found new Subreddits!"),
            pm_template,
            sleep_time: vars.seconds("SLEEP_TIME_SECS", 60 * 60 * 12, MAX_SLEEP_SECS)?,
            error_sleep: vars.seconds("ERROR_SLEEP_SECS", 30, MAX_ERROR_SLEEP_SECS)?,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            subreddit = %self.subreddit,
            username = %self.reddit_username,
            client_id = %redact(&self.reddit_client_id),
            client_secret = %redact(&self.reddit_client_secret),
            password = %redact(&self.reddit_password),
            pm_to = %self.pm_to,
            directory_wikis = ?self.directory_wikis,
            newsubs = %format!("/r/{}/wiki/{}", self.newsubs_subreddit, self.newsubs_wiki),
            check_newsubs = self.check_newsubs,
            save_newsubs = self.save_newsubs,
            scan_window_hours = self.scan_window.num_hours(),
            scan_max_pages = self.scan_max_pages,
            scan_page_size = self.scan_page_size,
            sleep_secs = self.sleep_time.as_secs(),
            error_sleep_secs = self.error_sleep.as_secs(),
            "Loaded configuration"
        );
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        "(unset)".to_string()
    } else {
        "****".to_string()
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn seconds(&self, key: &str, default: u64, max: u64) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parsed(key, default)?;
        if secs > max {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                value: secs.to_string(),
                reason: format!("must be at most {max} seconds"),
            });
        }
        Ok(Duration::from_secs(secs))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.clone(),
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, String> {
        HashMap::from([
            ("REDDIT_CLIENT_ID", "id".to_string()),
            ("REDDIT_CLIENT_SECRET", "secret".to_string()),
            ("REDDIT_USERNAME", "dirbot".to_string()),
            ("REDDIT_PASSWORD", "hunter2".to_string()),
            ("PM_TO", "modteam".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_directory_bot() {
        let config = load(&required()).unwrap();

        assert_eq!(config.subreddit, "findareddit");
        assert_eq!(config.newsubs_subreddit, "findareddit");
        assert_eq!(config.newsubs_wiki, "newsubs");
        assert_eq!(
            config.directory_wikis,
            vec!["directory", "/r/sfwpornnetwork/wiki/network"]
        );
        assert!(config.check_newsubs);
        assert!(config.save_newsubs);
        assert_eq!(config.sleep_time, Duration::from_secs(43_200));
        assert_eq!(config.error_sleep, Duration::from_secs(30));
        assert_eq!(config.scan_window, chrono::Duration::hours(24));
        assert_eq!(config.scan_max_pages, 10);
        assert_eq!(config.scan_page_size, 100);
        assert!(config.reddit_user_agent.ends_with("by /u/dirbot"));
    }

    #[test]
    fn missing_recipient_is_an_error() {
        let mut vars = required();
        vars.remove("PM_TO");
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("PM_TO".into()));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut vars = required();
        vars.insert("REDDIT_PASSWORD", "   ".to_string());
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("REDDIT_PASSWORD".into())
        );
    }

    #[test]
    fn template_must_carry_both_slots() {
        let mut vars = required();
        vars.insert("PM_TEMPLATE", "Found {count} subs".to_string());
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { key, .. }) if key == "PM_TEMPLATE"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = required();
        vars.insert("SUBREDDIT_NAME", "somedirectory".to_string());
        vars.insert("NEWSUBS_SUBREDDIT", "workshop".to_string());
        vars.insert("DIRECTORY_WIKIS", " directory , , index ".to_string());
        vars.insert("CHECK_NEWSUBS", "false".to_string());
        vars.insert("ERROR_SLEEP_SECS", "3".to_string());
        vars.insert("SCAN_PAGE_SIZE", "500".to_string());

        let config = load(&vars).unwrap();
        assert_eq!(config.subreddit, "somedirectory");
        assert_eq!(config.newsubs_subreddit, "workshop");
        assert_eq!(config.directory_wikis, vec!["directory", "index"]);
        assert!(!config.check_newsubs);
        assert_eq!(config.error_sleep, Duration::from_secs(3));
        assert_eq!(config.scan_page_size, 100);
    }

    #[test]
    fn oversized_sleeps_are_rejected() {
        let mut vars = required();
        vars.insert("ERROR_SLEEP_SECS", u64::MAX.to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key, .. }) if key == "ERROR_SLEEP_SECS"
        ));

        let mut vars = required();
        vars.insert("SLEEP_TIME_SECS", "604801".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key, .. }) if key == "SLEEP_TIME_SECS"
        ));

        let mut vars = required();
        vars.insert("ERROR_SLEEP_SECS", "3600".to_string());
        assert_eq!(load(&vars).unwrap().error_sleep, Duration::from_secs(3600));
    }

    #[test]
    fn bad_number_is_rejected() {
        let mut vars = required();
        vars.insert("SLEEP_TIME_SECS", "twelve hours".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key, .. }) if key == "SLEEP_TIME_SECS"
        ));
    }
}
