use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};

/// Names already known to the directory or to earlier discoveries. Lowercase.
pub type ExclusionSet = HashSet<String>;

/// A post from the scanned subreddit's `new` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One page of posts plus the cursor for the next request.
#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Restricted,
    Private,
    Other(String),
}

impl Visibility {
    pub fn from_subreddit_type(kind: &str) -> Self {
        match kind {
            "public" => Self::Public,
            "restricted" => Self::Restricted,
            "private" => Self::Private,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Restricted => write!(f, "restricted"),
            Self::Private => write!(f, "private"),
            Self::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Live state of a subreddit as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubredditInfo {
    pub name: String,
    pub visibility: Visibility,
    pub quarantined: bool,
    /// Public description; empty when the subreddit has none.
    pub description: String,
}

/// A newly found subreddit accepted for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub name: String,
    pub description: String,
}

/// Accepted candidates for one run, keyed by lowercase name.
///
/// First insertion wins: re-inserting a name never replaces its record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    records: BTreeMap<String, CandidateRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its name is already present. Returns true if inserted.
    pub fn insert(&mut self, record: CandidateRecord) -> bool {
        if self.records.contains_key(&record.name) {
            return false;
        }
        self.records.insert(record.name.clone(), record);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CandidateRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.records.values()
    }
}
