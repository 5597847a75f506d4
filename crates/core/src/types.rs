use serde::{Deserialize, Serialize};
use std::fmt;

/// Rate-limit accounting category for a family of upstream endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    UserRead,
    FollowRead,
    TweetRead,
    TweetWrite,
    LikeWrite,
    Bookmark,
    TimelineRead,
    Search,
    Trends,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::UserRead,
        Category::FollowRead,
        Category::TweetRead,
        Category::TweetWrite,
        Category::LikeWrite,
        Category::Bookmark,
        Category::TimelineRead,
        Category::Search,
        Category::Trends,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::UserRead => "user-read",
            Category::FollowRead => "follow-read",
            Category::TweetRead => "tweet-read",
            Category::TweetWrite => "tweet-write",
            Category::LikeWrite => "like-write",
            Category::Bookmark => "bookmark",
            Category::TimelineRead => "timeline-read",
            Category::Search => "search",
            Category::Trends => "trends",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential tier a tool needs before it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTier {
    /// Read-only; an app bearer token is enough
    ReadOnly,
    /// Acts as the authenticated account; needs the full OAuth 1.0a set
    UserContext,
}

/// Where the data in a successful result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Returned as-is (after shaping) by the upstream API
    Upstream,
    /// Computed locally from one or more upstream responses
    Derived,
    /// No upstream call was made; the operation has no upstream equivalent
    Simulated,
}

impl Provenance {
    pub fn is_upstream(&self) -> bool {
        matches!(self, Provenance::Upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&Category::TweetWrite).unwrap();
        assert_eq!(json, "\"tweet-write\"");

        let parsed: Category = serde_json::from_str("\"timeline-read\"").unwrap();
        assert_eq!(parsed, Category::TimelineRead);
    }

    #[test]
    fn test_category_display_matches_serde() {
        for category in Category::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json.as_str(), Some(category.as_str()));
        }
    }

    #[test]
    fn test_provenance_lowercase() {
        assert_eq!(
            serde_json::to_value(Provenance::Simulated).unwrap(),
            serde_json::json!("simulated")
        );
        assert!(Provenance::Upstream.is_upstream());
        assert!(!Provenance::Derived.is_upstream());
    }
}
