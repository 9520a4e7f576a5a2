// Platform seam for the scan pipeline.
//
// Everything the scout needs from Reddit goes through `Platform`, so the
// pipeline can be driven by `testing::MockPlatform` with no network.
// `RedditClient` is the production implementation; its errors are folded
// into the closed `PlatformError` taxonomy here and nowhere else.

use async_trait::async_trait;

use findareddit_common::{Post, PostPage, PlatformError, SubredditInfo, Visibility};
use reddit_client::{RedditClient, RedditError};

#[async_trait]
pub trait Platform: Send + Sync {
    /// One page of the subreddit's `new` stream, newest first.
    async fn new_posts(
        &self,
        subreddit: &str,
        after: Option<&str>,
        limit: u32,
    ) -> Result<PostPage, PlatformError>;

    /// Bodies of every comment on the post, with collapsed branches expanded.
    async fn comment_bodies(&self, post: &Post) -> Result<Vec<String>, PlatformError>;

    /// Markdown content of a wiki page.
    async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String, PlatformError>;

    /// Replace the content of a wiki page.
    async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Existence, visibility, quarantine state and description of a subreddit.
    async fn subreddit(&self, name: &str) -> Result<SubredditInfo, PlatformError>;

    /// Send a private message.
    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<(), PlatformError>;
}

/// Fold client errors into the platform taxonomy.
///
/// Only a credential rejection at the token endpoint is `Other`. A 401 on an
/// API call means the cached token went stale and is retried as `Transport`;
/// any other unexpected 4xx is scoped to the request that got it.
pub fn classify(err: RedditError) -> PlatformError {
    match err {
        RedditError::NotFound(m) => PlatformError::NotFound(m),
        RedditError::Redirect(m) => PlatformError::Redirect(m),
        RedditError::Forbidden { path, reason } => match reason {
            Some(reason) => PlatformError::Forbidden(format!("{path} ({reason})")),
            None => PlatformError::Forbidden(path),
        },
        RedditError::BadRequest(m) => PlatformError::MalformedRequest(m),
        RedditError::Network(m) | RedditError::Parse(m) => PlatformError::Transport(m),
        RedditError::Unauthorized(m) => {
            PlatformError::Transport(format!("access token rejected: {m}"))
        }
        RedditError::Api { status, message } if (400..500).contains(&status) && status != 429 => {
            PlatformError::MalformedRequest(format!("status {status}: {message}"))
        }
        RedditError::Api { status, message } => {
            PlatformError::Transport(format!("status {status}: {message}"))
        }
        RedditError::Auth(m) => PlatformError::Other(format!("authentication failed: {m}")),
    }
}

/// Reddit answers `/about` for a quarantined subreddit with a 403 unless the
/// account has opted in. Quarantine gates only apply to public subreddits.
fn quarantine_gate(name: &str, err: &RedditError) -> Option<SubredditInfo> {
    match err {
        RedditError::Forbidden {
            reason: Some(reason),
            ..
        } if reason == "quarantined" => Some(SubredditInfo {
            name: name.to_string(),
            visibility: Visibility::Public,
            quarantined: true,
            description: String::new(),
        }),
        _ => None,
    }
}

#[async_trait]
impl Platform for RedditClient {
    async fn new_posts(
        &self,
        subreddit: &str,
        after: Option<&str>,
        limit: u32,
    ) -> Result<PostPage, PlatformError> {
        let page = RedditClient::new_posts(self, subreddit, limit, after)
            .await
            .map_err(classify)?;
        Ok(PostPage {
            posts: page
                .items
                .into_iter()
                .map(|link| Post {
                    created_at: link.created_at(),
                    id: link.id,
                    title: link.title,
                })
                .collect(),
            after: page.after,
        })
    }

    async fn comment_bodies(&self, post: &Post) -> Result<Vec<String>, PlatformError> {
        RedditClient::comment_bodies(self, &post.id)
            .await
            .map_err(classify)
    }

    async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String, PlatformError> {
        RedditClient::wiki_page(self, subreddit, page)
            .await
            .map_err(classify)
    }

    async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        RedditClient::edit_wiki_page(self, subreddit, page, content, reason)
            .await
            .map_err(classify)
    }

    async fn subreddit(&self, name: &str) -> Result<SubredditInfo, PlatformError> {
        let about = match self.subreddit_about(name).await {
            Ok(about) => about,
            Err(e) => return quarantine_gate(name, &e).ok_or_else(|| classify(e)),
        };
        Ok(SubredditInfo {
            name: about.display_name,
            visibility: Visibility::from_subreddit_type(&about.subreddit_type),
            quarantined: about.quarantine,
            description: about.public_description.unwrap_or_default(),
        })
    }

    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<(), PlatformError> {
        RedditClient::send_message(self, to, subject, body)
            .await
            .map_err(classify)
    }
}
