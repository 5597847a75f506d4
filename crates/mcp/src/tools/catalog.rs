// The fixed set of X tools served over MCP

use super::registry::ToolDefinition;
use super::shape;
use std::path::PathBuf;
use xbridge_core::{
    ArgumentSchema, Arguments, Category, NewTweet, Operation, Page, ParamSpec, PollSpec,
    SortOrder, ToolError, ToolTier, WORLDWIDE_WOEID,
};

/// Longest tweet the platform accepts
pub const MAX_TWEET_CHARS: usize = 280;
pub const MAX_POLL_OPTION_CHARS: usize = 25;
pub const MAX_MEDIA_ATTACHMENTS: usize = 4;

const DEFAULT_PAGE: i64 = 100;

fn user_id() -> ParamSpec {
    ParamSpec::id("user_id", "The ID of the user").aliases(&["userId"])
}

fn tweet_id(description: &'static str) -> ParamSpec {
    ParamSpec::id("tweet_id", description).aliases(&["tweetId"])
}

fn count(description: &'static str, min: i64, max: i64, default: i64) -> ParamSpec {
    ParamSpec::integer("count", description, min, max)
        .default_int(default)
        .aliases(&["limit"])
}

fn cursor() -> ParamSpec {
    ParamSpec::text("cursor", "Pagination cursor from a previous call", Some(512))
        .optional()
        .aliases(&["pagination_token", "nextCursor"])
}

fn page(args: &Arguments) -> Page {
    Page::new(args.count("count").unwrap_or(DEFAULT_PAGE as u32))
        .with_cursor(args.str("cursor").map(str::to_string))
}

fn owned(args: &Arguments, name: &str) -> Result<String, ToolError> {
    args.required_str(name).map(str::to_string)
}

/// Tweet body with `#tags` appended, checked against the length limit.
fn compose_text(args: &Arguments) -> Result<String, ToolError> {
    let mut text = args.required_str("text")?.trim().to_string();
    for tag in args.list("tags").unwrap_or_default() {
        let tag = tag.trim().trim_start_matches('#');
        if tag.chars().any(char::is_whitespace) {
            return Err(ToolError::invalid("tags", "hashtags must not contain spaces"));
        }
        text.push_str(" #");
        text.push_str(tag);
    }
    if text.chars().count() > MAX_TWEET_CHARS {
        return Err(ToolError::invalid(
            "text",
            format!(
                "must be at most {} characters including tags",
                MAX_TWEET_CHARS
            ),
        ));
    }
    Ok(text)
}

fn screen_name(args: &Arguments) -> Result<String, ToolError> {
    let name = args.required_str("screen_name")?.trim();
    let name = name.strip_prefix('@').unwrap_or(name);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ToolError::invalid(
            "screen_name",
            "may only contain letters, digits and underscores",
        ));
    }
    Ok(name.to_string())
}

fn tool(
    name: &'static str,
    description: &'static str,
    params: Vec<ParamSpec>,
    category: Category,
    tier: ToolTier,
) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        schema: ArgumentSchema::new(params),
        category,
        tier,
        build: |_| Err(ToolError::Client("tool has no operation".into())),
        shape: shape::passthrough,
    }
}

impl ToolDefinition {
    fn builds(mut self, build: super::registry::BuildFn) -> Self {
        self.build = build;
        self
    }

    fn shapes(mut self, shape: super::registry::ShapeFn) -> Self {
        self.shape = shape;
        self
    }
}

/// Every tool, in the order `tools/list` reports them.
pub fn tools() -> Vec<ToolDefinition> {
    use Category::*;
    use ToolTier::{ReadOnly, UserContext};

    vec![
        // Users
        tool(
            "get_user_profile",
            "Get detailed profile information for a user",
            vec![user_id()],
            UserRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::GetUser {
                user_id: owned(args, "user_id")?,
            })
        })
        .shapes(shape::user),
        tool(
            "get_user_by_screen_name",
            "Get a user by their screen name (without the leading @)",
            vec![
                ParamSpec::text("screen_name", "The screen name of the user", Some(64))
                    .aliases(&["screenName", "username"]),
            ],
            UserRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::GetUserByUsername {
                username: screen_name(args)?,
            })
        })
        .shapes(shape::user),
        tool(
            "get_user_by_id",
            "Get a user by their numeric ID",
            vec![user_id()],
            UserRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::GetUser {
                user_id: owned(args, "user_id")?,
            })
        })
        .shapes(shape::user),
        tool(
            "get_user_followers",
            "Get a list of followers for a user",
            vec![
                user_id(),
                count("Number of followers to fetch", 1, 1000, DEFAULT_PAGE),
                cursor(),
            ],
            FollowRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::GetFollowers {
                user_id: owned(args, "user_id")?,
                page: page(args),
            })
        })
        .shapes(shape::user_list),
        tool(
            "get_user_following",
            "Get a list of accounts a user is following",
            vec![
                user_id(),
                count("Number of accounts to fetch", 1, 1000, DEFAULT_PAGE),
                cursor(),
            ],
            FollowRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::GetFollowing {
                user_id: owned(args, "user_id")?,
                page: page(args),
            })
        })
        .shapes(shape::user_list),
        tool(
            "get_user_followers_you_know",
            "Get followers of a user that you also follow",
            vec![
                user_id(),
                count("Maximum number of accounts to return", 1, 1000, DEFAULT_PAGE),
                cursor(),
            ],
            FollowRead,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::FollowersYouKnow {
                user_id: owned(args, "user_id")?,
                page: page(args),
            })
        })
        .shapes(shape::user_list),
        tool(
            "get_user_subscriptions",
            "Get the accounts a user subscribes to (approximated by the accounts they follow)",
            vec![
                user_id(),
                count("Number of accounts to fetch", 1, 1000, DEFAULT_PAGE),
                cursor(),
            ],
            FollowRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::Subscriptions {
                user_id: owned(args, "user_id")?,
                page: page(args),
            })
        })
        .shapes(shape::user_list),
        // Tweets
        tool(
            "post_tweet",
            "Post a new tweet, optionally with media, hashtags or as a reply",
            vec![
                ParamSpec::text("text", "The text of the tweet", Some(MAX_TWEET_CHARS)),
                ParamSpec::list(
                    "media_paths",
                    "Local paths of images or videos to attach",
                    0,
                    MAX_MEDIA_ATTACHMENTS,
                    None,
                )
                .optional()
                .aliases(&["mediaPaths"]),
                ParamSpec::id("reply_to", "ID of the tweet to reply to")
                    .optional()
                    .aliases(&["replyTo", "in_reply_to"]),
                ParamSpec::list("tags", "Hashtags to append to the tweet", 0, 10, Some(100))
                    .optional(),
            ],
            TweetWrite,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::PostTweet(NewTweet {
                text: compose_text(args)?,
                reply_to: args.str("reply_to").map(str::to_string),
                media_paths: args
                    .list("media_paths")
                    .unwrap_or_default()
                    .iter()
                    .map(PathBuf::from)
                    .collect(),
                poll: None,
            }))
        })
        .shapes(shape::tweet),
        tool(
            "delete_tweet",
            "Delete one of your tweets",
            vec![tweet_id("The ID of the tweet to delete")],
            TweetWrite,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::DeleteTweet {
                tweet_id: owned(args, "tweet_id")?,
            })
        })
        .shapes(shape::deleted),
        tool(
            "get_tweet_details",
            "Get the details of a tweet",
            vec![tweet_id("The ID of the tweet")],
            TweetRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::GetTweet {
                tweet_id: owned(args, "tweet_id")?,
            })
        })
        .shapes(shape::tweet),
        tool(
            "create_poll_tweet",
            "Post a tweet with a poll",
            vec![
                ParamSpec::text("text", "The question asked by the poll", Some(MAX_TWEET_CHARS)),
                ParamSpec::list(
                    "choices",
                    "Poll options",
                    2,
                    4,
                    Some(MAX_POLL_OPTION_CHARS),
                )
                .aliases(&["options"]),
                ParamSpec::integer("duration_minutes", "How long the poll stays open", 5, 10080)
                    .aliases(&["durationMinutes"]),
            ],
            TweetWrite,
            UserContext,
        )
        .builds(|args| {
            let options = args.list("choices").unwrap_or_default().to_vec();
            let duration_minutes = args
                .count("duration_minutes")
                .ok_or_else(|| ToolError::invalid("duration_minutes", "is required"))?;
            Ok(Operation::PostTweet(NewTweet {
                poll: Some(PollSpec {
                    options,
                    duration_minutes,
                }),
                ..NewTweet::text(compose_text(args)?)
            }))
        })
        .shapes(shape::tweet),
        tool(
            "vote_on_poll",
            "Vote on a poll (not supported by the API; the vote is simulated)",
            vec![
                tweet_id("The ID of the tweet carrying the poll"),
                ParamSpec::text("choice", "The option to vote for", Some(MAX_POLL_OPTION_CHARS)),
            ],
            TweetWrite,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::VoteOnPoll {
                tweet_id: owned(args, "tweet_id")?,
                choice: owned(args, "choice")?,
            })
        }),
        // Likes and bookmarks
        tool(
            "favorite_tweet",
            "Like a tweet",
            vec![tweet_id("The ID of the tweet to like")],
            LikeWrite,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::LikeTweet {
                tweet_id: owned(args, "tweet_id")?,
            })
        })
        .shapes(shape::liked),
        tool(
            "unfavorite_tweet",
            "Remove a like from a tweet",
            vec![tweet_id("The ID of the tweet to unlike")],
            LikeWrite,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::UnlikeTweet {
                tweet_id: owned(args, "tweet_id")?,
            })
        })
        .shapes(shape::liked),
        tool(
            "bookmark_tweet",
            "Bookmark a tweet",
            vec![
                tweet_id("The ID of the tweet to bookmark"),
                ParamSpec::id("folder_id", "Bookmark folder (ignored)")
                    .optional()
                    .aliases(&["folderId"]),
            ],
            Bookmark,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::BookmarkTweet {
                tweet_id: owned(args, "tweet_id")?,
                folder_id: args.str("folder_id").map(str::to_string),
            })
        })
        .shapes(shape::bookmarked),
        tool(
            "delete_bookmark",
            "Remove a bookmark",
            vec![tweet_id("The ID of the bookmarked tweet")],
            Bookmark,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::RemoveBookmark {
                tweet_id: owned(args, "tweet_id")?,
            })
        })
        .shapes(shape::bookmarked),
        tool(
            "delete_all_bookmarks",
            "Remove every bookmark",
            Vec::new(),
            Bookmark,
            UserContext,
        )
        .builds(|_| Ok(Operation::DeleteAllBookmarks))
        .shapes(shape::bookmarks_cleared),
        // Timelines and search
        tool(
            "get_timeline",
            "Get tweets from your home timeline",
            vec![
                count("Number of tweets to fetch", 1, 100, DEFAULT_PAGE),
                ParamSpec::list("seen_tweet_ids", "Tweet IDs to leave out", 0, 1000, Some(64))
                    .optional()
                    .aliases(&["seenTweetIds"]),
                cursor(),
            ],
            TimelineRead,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::HomeTimeline {
                page: page(args),
                exclude_replies_and_retweets: false,
            })
        })
        .shapes(shape::tweet_list),
        tool(
            "get_latest_timeline",
            "Get the latest tweets from your home timeline, without replies or retweets",
            vec![count("Number of tweets to fetch", 1, 100, DEFAULT_PAGE), cursor()],
            TimelineRead,
            UserContext,
        )
        .builds(|args| {
            Ok(Operation::HomeTimeline {
                page: page(args),
                exclude_replies_and_retweets: true,
            })
        })
        .shapes(shape::tweet_list),
        tool(
            "search_twitter",
            "Search recent tweets",
            vec![
                ParamSpec::text("query", "Search query", Some(512)),
                ParamSpec::choice("product", "Ranking of results", &["Top", "Latest"])
                    .default_str("Top")
                    .aliases(&["sort"]),
                count("Number of tweets to fetch", 10, 100, DEFAULT_PAGE).clamped(),
                cursor(),
            ],
            Search,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::SearchRecent {
                query: args.required_str("query")?.trim().to_string(),
                sort_order: SortOrder::from_product(args.str("product").unwrap_or("Top")),
                page: page(args),
            })
        })
        .shapes(shape::tweet_list),
        tool(
            "get_trends",
            "Get current worldwide trending topics",
            vec![
                ParamSpec::text("category", "Only trends in this category", Some(64)).optional(),
                count("Number of trends to return", 1, 50, 50),
            ],
            Trends,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::Trends {
                woeid: WORLDWIDE_WOEID,
                category: args.str("category").map(|c| c.trim().to_string()),
                count: args.count("count").unwrap_or(50),
            })
        })
        .shapes(shape::trends),
        tool(
            "get_highlights_tweets",
            "Get highlighted tweets from a user's timeline (approximated by their recent tweets)",
            vec![
                user_id(),
                count("Number of tweets to fetch", 5, 100, DEFAULT_PAGE),
                cursor(),
            ],
            TimelineRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::Highlights {
                user_id: owned(args, "user_id")?,
                page: page(args),
            })
        })
        .shapes(shape::tweet_list),
        tool(
            "get_user_mentions",
            "Get recent tweets mentioning a user",
            vec![
                user_id(),
                count("Number of tweets to fetch", 5, 100, DEFAULT_PAGE),
                cursor(),
            ],
            TimelineRead,
            ReadOnly,
        )
        .builds(|args| {
            Ok(Operation::UserMentions {
                user_id: owned(args, "user_id")?,
                page: page(args),
            })
        })
        .shapes(shape::tweet_list),
    ]
}
