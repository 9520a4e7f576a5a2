pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{
    Comment, CommentThing, Identity, Link, Listing, MoreChildren, Page, SubredditAbout, Thing,
    WikiPage,
};

use std::collections::HashSet;
use std::time::{Duration, Instant};

use reqwest::{redirect, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use types::{CommentsResponse, ErrorBody, JsonEnvelope, MoreChildrenData, TokenResponse};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// `/api/morechildren` accepts at most this many ids per call.
const MORE_CHILDREN_BATCH: usize = 100;

/// Refresh the token this long before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Script-app credentials for the OAuth password grant.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    client: reqwest::Client,
    credentials: Credentials,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        // Unknown subreddits answer with a redirect to search; surface it instead of following.
        let client = reqwest::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, fetching a new one if missing or near expiry.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RedditError::Auth("client id or secret rejected".to_string()));
        }
        let resp = Self::check(resp).await?;
        let body = resp.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)?;

        let Some(value) = token.access_token else {
            let reason = token.error.unwrap_or_else(|| "no access_token in response".to_string());
            return Err(RedditError::Auth(reason));
        };
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        tracing::debug!(expires_in = lifetime.as_secs(), "Obtained Reddit access token");

        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status.is_redirection() {
            let location = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(RedditError::Redirect(location));
        }

        let url = resp.url().path().to_string();
        let body = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::BAD_REQUEST => RedditError::BadRequest(format!("{url}: {body}")),
            StatusCode::UNAUTHORIZED => RedditError::Unauthorized(format!("{url}: {body}")),
            StatusCode::FORBIDDEN => RedditError::Forbidden {
                path: url,
                reason: forbidden_reason(&body),
            },
            StatusCode::NOT_FOUND => RedditError::NotFound(url),
            _ => RedditError::Api {
                status: status.as_u16(),
                message: body,
            },
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(&token)
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let resp = Self::check(resp).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(&str, &str)]) -> Result<T> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(&token)
            .form(form)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let resp = Self::check(resp).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// The account the credentials authenticate as.
    pub async fn me(&self) -> Result<Identity> {
        self.get("/api/v1/me", &[]).await
    }

    /// One page of a subreddit's `new` stream, newest first.
    pub async fn new_posts(
        &self,
        subreddit: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<Link>> {
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str())];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let listing: Thing<Listing<Thing<Link>>> =
            self.get(&format!("/r/{subreddit}/new"), &query).await?;
        let page = Page::from(listing.data);
        tracing::debug!(subreddit, count = page.items.len(), "Fetched new posts");
        Ok(page)
    }

    /// Bodies of every comment on a post, expanding all "load more" and
    /// "continue this thread" stubs.
    pub async fn comment_bodies(&self, article: &str) -> Result<Vec<String>> {
        let (_, listing): CommentsResponse = self
            .get(&format!("/comments/{article}"), &[("limit", "500")])
            .await?;

        let mut bodies = Vec::new();
        let mut pending = Vec::new();
        collect_comments(listing.data.children, &mut bodies, &mut pending);

        let mut expanded = HashSet::new();
        while let Some(more) = pending.pop() {
            if !expanded.insert(format!("{}:{}", more.parent_id, more.id)) {
                continue;
            }

            if more.is_continue_thread() {
                let parent = more.parent_id.trim_start_matches("t1_");
                let (_, listing): CommentsResponse = self
                    .get(&format!("/comments/{article}/_/{parent}"), &[("limit", "500")])
                    .await?;
                // The parent comment comes back as the root; its body is already collected.
                for thing in listing.data.children {
                    match thing {
                        CommentThing::Comment(c) if c.name == more.parent_id => {
                            collect_comments(c.replies.into_children(), &mut bodies, &mut pending);
                        }
                        other => collect_comments(vec![other], &mut bodies, &mut pending),
                    }
                }
                continue;
            }

            let link_id = format!("t3_{article}");
            for batch in more.children.chunks(MORE_CHILDREN_BATCH) {
                let ids = batch.join(",");
                let envelope: JsonEnvelope<MoreChildrenData> = self
                    .get(
                        "/api/morechildren",
                        &[
                            ("api_type", "json"),
                            ("link_id", link_id.as_str()),
                            ("children", ids.as_str()),
                        ],
                    )
                    .await?;
                if let Some(message) = envelope.json.error_message() {
                    return Err(RedditError::BadRequest(message));
                }
                let things = envelope.json.data.map(|d| d.things).unwrap_or_default();
                collect_comments(things, &mut bodies, &mut pending);
            }
        }

        tracing::debug!(article, comments = bodies.len(), "Materialized comment tree");
        Ok(bodies)
    }

    /// Raw markdown of a wiki page.
    pub async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String> {
        let thing: Thing<WikiPage> = self
            .get(&format!("/r/{subreddit}/wiki/{page}"), &[])
            .await?;
        Ok(thing.data.content_md)
    }

    pub async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .post_form(
                &format!("/r/{subreddit}/api/wiki/edit"),
                &[("page", page), ("content", content), ("reason", reason)],
            )
            .await?;
        Ok(())
    }

    /// Existence, type and quarantine state of a subreddit.
    pub async fn subreddit_about(&self, name: &str) -> Result<SubredditAbout> {
        let thing: Thing<serde_json::Value> =
            self.get(&format!("/r/{name}/about"), &[]).await?;
        // Nonexistent names sometimes come back as an empty search listing.
        if thing.kind != "t5" {
            return Err(RedditError::NotFound(format!("/r/{name}")));
        }
        Ok(serde_json::from_value(thing.data)?)
    }

    /// Send a private message.
    pub async fn send_message(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let envelope: JsonEnvelope<serde_json::Value> = self
            .post_form(
                "/api/compose",
                &[
                    ("api_type", "json"),
                    ("to", to),
                    ("subject", subject),
                    ("text", text),
                ],
            )
            .await?;
        if let Some(message) = envelope.json.error_message() {
            return Err(RedditError::BadRequest(message));
        }
        tracing::info!(to, "Sent private message");
        Ok(())
    }
}

/// The `reason` field of a 403 body, e.g. `{"reason": "quarantined", ...}`.
fn forbidden_reason(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.reason)
}

fn collect_comments(
    things: Vec<CommentThing>,
    bodies: &mut Vec<String>,
    pending: &mut Vec<MoreChildren>,
) {
    for thing in things {
        match thing {
            CommentThing::Comment(comment) => {
                bodies.push(comment.body);
                collect_comments(comment.replies.into_children(), bodies, pending);
            }
            CommentThing::More(more) => {
                if more.children.is_empty() && !more.is_continue_thread() {
                    continue;
                }
                pending.push(more);
            }
        }
    }
}
