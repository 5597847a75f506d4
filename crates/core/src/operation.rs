// Typed upstream operations a tool maps to

use crate::types::Provenance;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Page request for list endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub max_results: u32,
    pub cursor: Option<String>,
}

impl Page {
    pub fn new(max_results: u32) -> Self {
        Self {
            max_results,
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub options: Vec<String>,
    pub duration_minutes: u32,
}

/// Content of a tweet to create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTweet {
    pub text: String,
    pub reply_to: Option<String>,
    pub media_paths: Vec<PathBuf>,
    pub poll: Option<PollSpec>,
}

impl NewTweet {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Ordering for recent search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevancy,
    Recency,
}

impl SortOrder {
    /// Map the `Top` / `Latest` product names onto the upstream sort order.
    pub fn from_product(product: &str) -> Self {
        if product.eq_ignore_ascii_case("latest") {
            SortOrder::Recency
        } else {
            SortOrder::Relevancy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevancy => "relevancy",
            SortOrder::Recency => "recency",
        }
    }
}

/// Worldwide location id for trends
pub const WORLDWIDE_WOEID: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    GetUser {
        user_id: String,
    },
    GetUserByUsername {
        username: String,
    },
    GetFollowers {
        user_id: String,
        page: Page,
    },
    GetFollowing {
        user_id: String,
        page: Page,
    },
    /// Followers of `user_id` that the authenticated account also follows
    FollowersYouKnow {
        user_id: String,
        page: Page,
    },
    /// Accounts `user_id` follows, standing in for paid subscriptions
    Subscriptions {
        user_id: String,
        page: Page,
    },
    PostTweet(NewTweet),
    DeleteTweet {
        tweet_id: String,
    },
    GetTweet {
        tweet_id: String,
    },
    /// Poll voting has no upstream endpoint
    VoteOnPoll {
        tweet_id: String,
        choice: String,
    },
    LikeTweet {
        tweet_id: String,
    },
    UnlikeTweet {
        tweet_id: String,
    },
    BookmarkTweet {
        tweet_id: String,
        folder_id: Option<String>,
    },
    RemoveBookmark {
        tweet_id: String,
    },
    /// Lists every bookmark and removes them one at a time
    DeleteAllBookmarks,
    HomeTimeline {
        page: Page,
        exclude_replies_and_retweets: bool,
    },
    SearchRecent {
        query: String,
        sort_order: SortOrder,
        page: Page,
    },
    Trends {
        woeid: u32,
        category: Option<String>,
        count: u32,
    },
    /// A user's own recent tweets, standing in for highlights
    Highlights {
        user_id: String,
        page: Page,
    },
    UserMentions {
        user_id: String,
        page: Page,
    },
}

impl Operation {
    /// Short stable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetUser { .. } => "get_user",
            Operation::GetUserByUsername { .. } => "get_user_by_username",
            Operation::GetFollowers { .. } => "get_followers",
            Operation::GetFollowing { .. } => "get_following",
            Operation::FollowersYouKnow { .. } => "followers_you_know",
            Operation::Subscriptions { .. } => "subscriptions",
            Operation::PostTweet(_) => "post_tweet",
            Operation::DeleteTweet { .. } => "delete_tweet",
            Operation::GetTweet { .. } => "get_tweet",
            Operation::VoteOnPoll { .. } => "vote_on_poll",
            Operation::LikeTweet { .. } => "like_tweet",
            Operation::UnlikeTweet { .. } => "unlike_tweet",
            Operation::BookmarkTweet { .. } => "bookmark_tweet",
            Operation::RemoveBookmark { .. } => "remove_bookmark",
            Operation::DeleteAllBookmarks => "delete_all_bookmarks",
            Operation::HomeTimeline { .. } => "home_timeline",
            Operation::SearchRecent { .. } => "search_recent",
            Operation::Trends { .. } => "trends",
            Operation::Highlights { .. } => "highlights",
            Operation::UserMentions { .. } => "user_mentions",
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            Operation::VoteOnPoll { .. } => Provenance::Simulated,
            Operation::FollowersYouKnow { .. }
            | Operation::Subscriptions { .. }
            | Operation::Highlights { .. }
            | Operation::DeleteAllBookmarks => Provenance::Derived,
            _ => Provenance::Upstream,
        }
    }

    /// Caveat the caller should see alongside a successful result.
    pub fn warning(&self) -> Option<String> {
        match self {
            Operation::VoteOnPoll { .. } => Some(
                "Poll voting is not available through the API; no vote was cast".to_string(),
            ),
            Operation::FollowersYouKnow { .. } => Some(
                "Computed locally from the user's followers and the accounts you follow"
                    .to_string(),
            ),
            Operation::Subscriptions { .. } => Some(
                "No subscriptions endpoint exists; accounts the user follows are returned instead"
                    .to_string(),
            ),
            Operation::Highlights { .. } => Some(
                "No highlights endpoint exists; the user's recent tweets are returned instead"
                    .to_string(),
            ),
            Operation::BookmarkTweet {
                folder_id: Some(_), ..
            } => Some("Bookmark folders are not supported; folder_id was ignored".to_string()),
            _ => None,
        }
    }

    /// Local result for operations that never reach the upstream.
    pub fn simulated_payload(&self) -> Option<Value> {
        match self {
            Operation::VoteOnPoll { tweet_id, choice } => Some(json!({
                "tweetId": tweet_id,
                "choice": choice,
                "status": "voted",
            })),
            _ => None,
        }
    }

    /// Operations that change many resources in one call; never abandoned midway.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Operation::DeleteAllBookmarks)
    }
}
