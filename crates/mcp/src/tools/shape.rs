// Shaping of upstream envelopes into the fields each tool documents

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use xbridge_core::Arguments;

fn put(out: &mut Map<String, Value>, key: &str, value: &Value) {
    if !value.is_null() {
        out.insert(key.to_string(), value.clone());
    }
}

fn user_fields(user: &Value) -> Value {
    let mut out = Map::new();
    put(&mut out, "id", &user["id"]);
    put(&mut out, "name", &user["name"]);
    put(&mut out, "username", &user["username"]);
    put(&mut out, "description", &user["description"]);
    put(&mut out, "profileImageUrl", &user["profile_image_url"]);
    Value::Object(out)
}

fn tweet_fields(tweet: &Value) -> Value {
    let mut out = Map::new();
    put(&mut out, "id", &tweet["id"]);
    put(&mut out, "text", &tweet["text"]);
    put(&mut out, "createdAt", &tweet["created_at"]);
    put(&mut out, "authorId", &tweet["author_id"]);
    Value::Object(out)
}

fn items(payload: &Value) -> &[Value] {
    payload["data"].as_array().map(Vec::as_slice).unwrap_or_default()
}

fn limit(args: &Arguments) -> usize {
    args.count("count").map(|n| n as usize).unwrap_or(usize::MAX)
}

fn list(key: &str, entries: Vec<Value>, payload: &Value) -> Value {
    let mut out = Map::new();
    out.insert("resultCount".to_string(), json!(entries.len()));
    out.insert(key.to_string(), Value::Array(entries));
    put(&mut out, "nextCursor", &payload["meta"]["next_token"]);
    Value::Object(out)
}

pub fn passthrough(payload: &Value, _args: &Arguments) -> Value {
    payload.clone()
}

pub fn user(payload: &Value, _args: &Arguments) -> Value {
    user_fields(&payload["data"])
}

pub fn user_list(payload: &Value, args: &Arguments) -> Value {
    let users = items(payload)
        .iter()
        .take(limit(args))
        .map(user_fields)
        .collect();
    list("users", users, payload)
}

pub fn tweet(payload: &Value, _args: &Arguments) -> Value {
    tweet_fields(&payload["data"])
}

/// Tweets in upstream order, minus any the caller has already seen.
pub fn tweet_list(payload: &Value, args: &Arguments) -> Value {
    let seen: HashSet<&str> = args
        .list("seen_tweet_ids")
        .unwrap_or_default()
        .iter()
        .map(|id| id.trim())
        .collect();
    let tweets = items(payload)
        .iter()
        .filter(|t| t["id"].as_str().map_or(true, |id| !seen.contains(id)))
        .take(limit(args))
        .map(tweet_fields)
        .collect();
    list("tweets", tweets, payload)
}

pub fn deleted(payload: &Value, args: &Arguments) -> Value {
    json!({
        "id": args.str("tweet_id"),
        "deleted": payload["data"]["deleted"].as_bool().unwrap_or(false),
    })
}

pub fn liked(payload: &Value, args: &Arguments) -> Value {
    json!({
        "tweetId": args.str("tweet_id"),
        "liked": payload["data"]["liked"].as_bool().unwrap_or(false),
    })
}

pub fn bookmarked(payload: &Value, args: &Arguments) -> Value {
    json!({
        "tweetId": args.str("tweet_id"),
        "bookmarked": payload["data"]["bookmarked"].as_bool().unwrap_or(false),
    })
}

pub fn bookmarks_cleared(payload: &Value, _args: &Arguments) -> Value {
    let data = &payload["data"];
    let deleted = data["deleted"].as_u64().unwrap_or(0);
    let total = data["total"].as_u64().unwrap_or(deleted);
    let complete = data["complete"].as_bool().unwrap_or(true);
    let status = if complete {
        format!("Deleted {} bookmarks", deleted)
    } else {
        format!("Deleted {} of {} bookmarks; the rest remain", deleted, total)
    };
    json!({
        "deleted": deleted,
        "complete": complete,
        "status": status,
    })
}

pub fn trends(payload: &Value, args: &Arguments) -> Value {
    let trends = items(payload)
        .iter()
        .take(limit(args))
        .map(|trend| {
            let mut out = Map::new();
            put(&mut out, "name", &trend["name"]);
            put(&mut out, "url", &trend["url"]);
            put(&mut out, "query", &trend["query"]);
            put(&mut out, "tweetVolume", &trend["tweet_volume"]);
            put(&mut out, "category", &trend["category"]);
            Value::Object(out)
        })
        .collect();
    list("trends", trends, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbridge_core::{ArgumentSchema, ParamSpec};

    fn args(raw: Value) -> Arguments {
        ArgumentSchema::new(vec![
            ParamSpec::id("tweet_id", "").optional(),
            ParamSpec::integer("count", "", 1, 100).optional(),
            ParamSpec::list("seen_tweet_ids", "", 0, 100, None).optional(),
        ])
        .validate(&raw)
        .unwrap()
    }

    #[test]
    fn test_tweet_is_camel_cased() {
        let payload = json!({"data": {
            "id": "1",
            "text": "Hello",
            "created_at": "2026-01-01T00:00:00.000Z",
            "author_id": "42"
        }});

        assert_eq!(
            tweet(&payload, &args(json!({}))),
            json!({
                "id": "1",
                "text": "Hello",
                "createdAt": "2026-01-01T00:00:00.000Z",
                "authorId": "42"
            })
        );
    }

    #[test]
    fn test_user_omits_missing_fields() {
        let payload = json!({"data": {"id": "7", "username": "jack", "name": null}});
        assert_eq!(
            user(&payload, &args(json!({}))),
            json!({"id": "7", "username": "jack"})
        );
    }

    #[test]
    fn test_tweet_list_filters_seen_and_truncates() {
        let payload = json!({
            "data": [
                {"id": "1", "text": "a"},
                {"id": "2", "text": "b"},
                {"id": "3", "text": "c"},
                {"id": "4", "text": "d"}
            ],
            "meta": {"result_count": 4, "next_token": "next"}
        });

        let shaped = tweet_list(&payload, &args(json!({"count": 2, "seen_tweet_ids": ["1"]})));
        assert_eq!(
            shaped,
            json!({
                "tweets": [{"id": "2", "text": "b"}, {"id": "3", "text": "c"}],
                "resultCount": 2,
                "nextCursor": "next"
            })
        );
    }

    #[test]
    fn test_empty_list_without_data() {
        let shaped = user_list(&json!({"meta": {"result_count": 0}}), &args(json!({})));
        assert_eq!(shaped, json!({"users": [], "resultCount": 0}));
    }

    #[test]
    fn test_state_shapes() {
        let args = args(json!({"tweet_id": "9"}));
        assert_eq!(
            deleted(&json!({"data": {"deleted": true}}), &args),
            json!({"id": "9", "deleted": true})
        );
        assert_eq!(
            liked(&json!({"data": {"liked": false}}), &args),
            json!({"tweetId": "9", "liked": false})
        );
        assert_eq!(
            bookmarks_cleared(&json!({"data": {"deleted": 3}}), &args),
            json!({"deleted": 3, "complete": true, "status": "Deleted 3 bookmarks"})
        );
        assert_eq!(
            bookmarks_cleared(
                &json!({"data": {"deleted": 120, "total": 300, "complete": false}}),
                &args
            ),
            json!({
                "deleted": 120,
                "complete": false,
                "status": "Deleted 120 of 300 bookmarks; the rest remain"
            })
        );
    }
}
