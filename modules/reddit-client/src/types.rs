use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::Deserialize;

// --- Envelope types ---

/// Every Reddit object is wrapped as `{"kind": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub after: Option<String>,
    pub children: Vec<T>,
}

/// One page of a listing with the cursor for the next request.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub after: Option<String>,
}

impl<T> From<Listing<Thing<T>>> for Page<T> {
    fn from(listing: Listing<Thing<T>>) -> Self {
        Self {
            items: listing.children.into_iter().map(|t| t.data).collect(),
            after: listing.after,
        }
    }
}

// --- Links (posts) ---

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub id: String,
    /// Fullname, e.g. `t3_abc123`. Used as the `after` cursor.
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub num_comments: u64,
}

impl Link {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_utc.trunc() as i64, 0).unwrap_or_default()
    }
}

// --- Comments ---

/// Comment tree node. A listing mixes real comments with "more" stubs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum CommentThing {
    #[serde(rename = "t1")]
    Comment(Comment),
    #[serde(rename = "more")]
    More(MoreChildren),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub replies: Replies,
}

/// Reddit sends `""` instead of an empty listing when a comment has no replies.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Replies {
    Listing(Box<Thing<Listing<CommentThing>>>),
    Empty(IgnoredAny),
}

impl Default for Replies {
    fn default() -> Self {
        Replies::Empty(IgnoredAny)
    }
}

impl Replies {
    pub fn into_children(self) -> Vec<CommentThing> {
        match self {
            Replies::Listing(thing) => thing.data.children,
            Replies::Empty(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoreChildren {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub children: Vec<String>,
}

impl MoreChildren {
    /// "Continue this thread" stubs carry no child ids; the subtree has to be
    /// fetched from the parent comment instead.
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty() && self.parent_id.starts_with("t1_")
    }
}

/// Response of `GET /comments/{article}`: `[link listing, comment listing]`.
pub type CommentsResponse = (IgnoredAny, Thing<Listing<CommentThing>>);

#[derive(Debug, Clone, Deserialize)]
pub struct MoreChildrenData {
    #[serde(default)]
    pub things: Vec<CommentThing>,
}

// --- Wiki ---

#[derive(Debug, Clone, Deserialize)]
pub struct WikiPage {
    #[serde(default)]
    pub content_md: String,
}

// --- Subreddits ---

#[derive(Debug, Clone, Deserialize)]
pub struct SubredditAbout {
    pub display_name: String,
    /// `public`, `private`, `restricted`, `gold_restricted`, `archived`, `user`, ...
    #[serde(default)]
    pub subreddit_type: String,
    #[serde(default)]
    pub quarantine: bool,
    #[serde(default)]
    pub public_description: Option<String>,
}

// --- Account ---

#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub name: String,
}

// --- api_type=json responses ---

#[derive(Debug, Clone, Deserialize)]
pub struct JsonEnvelope<T> {
    pub json: JsonBody<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBody<T> {
    /// Each error is `[code, message, field]`.
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    pub data: Option<T>,
}

impl<T> JsonBody<T> {
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| {
                e.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(": ")
            })
            .collect();
        Some(parts.join("; "))
    }
}

// --- Error bodies ---

/// JSON body Reddit sends with some 4xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub reason: Option<String>,
}

// --- OAuth ---

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Reddit reports grant failures with a 200 and an `error` field.
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_tree_with_empty_and_nested_replies() {
        let json = r#"[
            {"kind": "Listing", "data": {"children": []}},
            {"kind": "Listing", "data": {"after": null, "children": [
                {"kind": "t1", "data": {"id": "c1", "name": "t1_c1", "body": "try r/aww", "parent_id": "t3_p",
                    "replies": {"kind": "Listing", "data": {"children": [
                        {"kind": "t1", "data": {"id": "c2", "name": "t1_c2", "body": "or /r/cats", "parent_id": "t1_c1", "replies": ""}},
                        {"kind": "more", "data": {"id": "_", "parent_id": "t1_c2", "count": 0, "children": []}}
                    ]}}}},
                {"kind": "more", "data": {"id": "m1", "parent_id": "t3_p", "count": 2, "children": ["c3", "c4"]}}
            ]}}
        ]"#;

        let (_, listing): CommentsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.children.len(), 2);

        let CommentThing::Comment(first) = &listing.data.children[0] else {
            panic!("expected a comment");
        };
        assert_eq!(first.body, "try r/aww");
        let replies = first.replies.clone().into_children();
        assert_eq!(replies.len(), 2);
        match &replies[1] {
            CommentThing::More(more) => assert!(more.is_continue_thread()),
            other => panic!("expected more stub, got {other:?}"),
        }
        match &listing.data.children[1] {
            CommentThing::More(more) => {
                assert!(!more.is_continue_thread());
                assert_eq!(more.children, vec!["c3", "c4"]);
            }
            other => panic!("expected more stub, got {other:?}"),
        }
    }

    #[test]
    fn link_created_at_uses_utc_seconds() {
        let link: Link = serde_json::from_str(
            r#"{"id": "abc", "name": "t3_abc", "title": "Looking for subs", "created_utc": 1700000000.0}"#,
        )
        .unwrap();
        assert_eq!(link.created_at().timestamp(), 1_700_000_000);
    }

    #[test]
    fn json_body_joins_error_triples() {
        let env: JsonEnvelope<serde_json::Value> = serde_json::from_str(
            r#"{"json": {"errors": [["USER_DOESNT_EXIST", "that user doesn't exist", "to"]]}}"#,
        )
        .unwrap();
        assert_eq!(
            env.json.error_message().as_deref(),
            Some("USER_DOESNT_EXIST: that user doesn't exist: to")
        );
    }

    #[test]
    fn token_grant_failure_reports_error() {
        let token: TokenResponse = serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        assert!(token.access_token.is_none());
        assert_eq!(token.error.as_deref(), Some("invalid_grant"));
    }
}
