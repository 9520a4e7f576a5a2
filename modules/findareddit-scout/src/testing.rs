// Test mocks for the scout pipeline.
//
// MockPlatform implements `Platform` over in-memory state: a post stream,
// comment bodies per post, wiki pages, subreddit lookups, plus scripted
// failures. It records every lookup, message and wiki edit so tests can
// assert on what the pipeline asked for.
//
// Plus helpers for building configs, posts and subreddit states.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use findareddit_common::{
    Config, PlatformError, Post, PostPage, SubredditInfo, Visibility,
};

use crate::traits::Platform;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Config with the bot's defaults and a single `directory` wiki source.
pub fn test_config() -> Config {
    let vars = HashMap::from([
        ("REDDIT_CLIENT_ID", "test-id"),
        ("REDDIT_CLIENT_SECRET", "test-secret"),
        ("REDDIT_USERNAME", "dirbot"),
        ("REDDIT_PASSWORD", "test-password"),
        ("PM_TO", "modteam"),
        ("DIRECTORY_WIKIS", "directory"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("test config should load")
}

pub fn post_at(id: &str, created_at: DateTime<Utc>) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Looking for a subreddit ({id})"),
        created_at,
    }
}

pub fn public_subreddit(name: &str, description: &str) -> SubredditInfo {
    SubredditInfo {
        name: name.to_string(),
        visibility: Visibility::Public,
        quarantined: false,
        description: description.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiEdit {
    pub subreddit: String,
    pub page: String,
    pub content: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// MockPlatform
// ---------------------------------------------------------------------------

/// In-memory platform. Unregistered wiki pages and subreddits are `NotFound`;
/// unregistered posts have no comments.
/// Builder pattern: `.with_posts()`, `.on_comments()`, `.on_wiki()`, `.on_subreddit()`.
pub struct MockPlatform {
    posts: Vec<Post>,
    comments: HashMap<String, Vec<String>>,
    wikis: Mutex<HashMap<(String, String), Result<String, PlatformError>>>,
    subreddits: HashMap<String, Result<SubredditInfo, PlatformError>>,

    new_posts_script: Mutex<VecDeque<Option<PlatformError>>>,
    message_failures: Mutex<VecDeque<PlatformError>>,
    wiki_edit_failure: Option<PlatformError>,

    page_requests: Mutex<u32>,
    lookups: Mutex<HashMap<String, u32>>,
    comment_fetches: Mutex<HashMap<String, u32>>,
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<WikiEdit>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            posts: Vec::new(),
            comments: HashMap::new(),
            wikis: Mutex::new(HashMap::new()),
            subreddits: HashMap::new(),
            new_posts_script: Mutex::new(VecDeque::new()),
            message_failures: Mutex::new(VecDeque::new()),
            wiki_edit_failure: None,
            page_requests: Mutex::new(0),
            lookups: Mutex::new(HashMap::new()),
            comment_fetches: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
        }
    }

    /// The `new` stream, newest first.
    pub fn with_posts(mut self, posts: Vec<Post>) -> Self {
        self.posts = posts;
        self
    }

    pub fn on_comments(mut self, post_id: &str, bodies: &[&str]) -> Self {
        self.comments.insert(
            post_id.to_string(),
            bodies.iter().map(|b| b.to_string()).collect(),
        );
        self
    }

    pub fn on_wiki(self, subreddit: &str, page: &str, content: &str) -> Self {
        self.insert_wiki(subreddit, page, Ok(content.to_string()));
        self
    }

    pub fn on_wiki_error(self, subreddit: &str, page: &str, err: PlatformError) -> Self {
        self.insert_wiki(subreddit, page, Err(err));
        self
    }

    pub fn on_subreddit(mut self, info: SubredditInfo) -> Self {
        self.subreddits.insert(info.name.to_lowercase(), Ok(info));
        self
    }

    pub fn on_subreddit_error(mut self, name: &str, err: PlatformError) -> Self {
        self.subreddits.insert(name.to_string(), Err(err));
        self
    }

    /// Fail the next `times` post-stream requests with `err`.
    pub fn fail_new_posts(self, times: usize, err: PlatformError) -> Self {
        self.new_posts_script
            .lock()
            .unwrap()
            .extend(std::iter::repeat(Some(err)).take(times));
        self
    }

    /// Let the next `times` post-stream requests through. Used to interleave
    /// successes with `fail_new_posts`.
    pub fn pass_new_posts(self, times: usize) -> Self {
        self.new_posts_script
            .lock()
            .unwrap()
            .extend(std::iter::repeat(None).take(times));
        self
    }

    /// Fail the next `times` message sends with `err`.
    pub fn fail_messages(self, times: usize, err: PlatformError) -> Self {
        self.message_failures
            .lock()
            .unwrap()
            .extend(std::iter::repeat(err).take(times));
        self
    }

    pub fn fail_wiki_edits(mut self, err: PlatformError) -> Self {
        self.wiki_edit_failure = Some(err);
        self
    }

    fn insert_wiki(&self, subreddit: &str, page: &str, value: Result<String, PlatformError>) {
        self.wikis
            .lock()
            .unwrap()
            .insert((subreddit.to_string(), page.to_string()), value);
    }

    // --- Recorded calls ---

    pub fn page_requests(&self) -> u32 {
        *self.page_requests.lock().unwrap()
    }

    pub fn lookups(&self, name: &str) -> u32 {
        self.lookups.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn comment_fetches(&self, post_id: &str) -> u32 {
        self.comment_fetches
            .lock()
            .unwrap()
            .get(post_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn wiki_edits(&self) -> Vec<WikiEdit> {
        self.edits.lock().unwrap().clone()
    }

    /// Current content of a wiki page, including any edits made by the pipeline.
    pub fn wiki_content(&self, subreddit: &str, page: &str) -> Option<String> {
        self.wikis
            .lock()
            .unwrap()
            .get(&(subreddit.to_string(), page.to_string()))
            .and_then(|v| v.clone().ok())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn new_posts(
        &self,
        _subreddit: &str,
        after: Option<&str>,
        limit: u32,
    ) -> Result<PostPage, PlatformError> {
        *self.page_requests.lock().unwrap() += 1;
        if let Some(Some(err)) = self.new_posts_script.lock().unwrap().pop_front() {
            return Err(err);
        }

        let start = match after {
            Some(cursor) => self
                .posts
                .iter()
                .position(|p| p.id == cursor)
                .map(|i| i + 1)
                .unwrap_or(self.posts.len()),
            None => 0,
        };
        let end = (start + limit as usize).min(self.posts.len());
        let posts = self.posts[start..end].to_vec();
        let after = if end < self.posts.len() {
            posts.last().map(|p| p.id.clone())
        } else {
            None
        };
        Ok(PostPage { posts, after })
    }

    async fn comment_bodies(&self, post: &Post) -> Result<Vec<String>, PlatformError> {
        *self
            .comment_fetches
            .lock()
            .unwrap()
            .entry(post.id.clone())
            .or_default() += 1;
        Ok(self.comments.get(&post.id).cloned().unwrap_or_default())
    }

    async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String, PlatformError> {
        self.wikis
            .lock()
            .unwrap()
            .get(&(subreddit.to_string(), page.to_string()))
            .cloned()
            .unwrap_or_else(|| Err(PlatformError::NotFound(format!("/r/{subreddit}/wiki/{page}"))))
    }

    async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        if let Some(err) = &self.wiki_edit_failure {
            return Err(err.clone());
        }
        self.edits.lock().unwrap().push(WikiEdit {
            subreddit: subreddit.to_string(),
            page: page.to_string(),
            content: content.to_string(),
            reason: reason.to_string(),
        });
        self.insert_wiki(subreddit, page, Ok(content.to_string()));
        Ok(())
    }

    async fn subreddit(&self, name: &str) -> Result<SubredditInfo, PlatformError> {
        *self
            .lookups
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default() += 1;
        self.subreddits
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(PlatformError::NotFound(format!("/r/{name}"))))
    }

    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<(), PlatformError> {
        if let Some(err) = self.message_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
