//! Post schemas
//!
//! `CreatePostRequest` is what Zapier sends to the create-thread action;
//! `Post` is what both the action and the new-thread trigger return.
//! Upstream payloads are parsed through `UpstreamPost`, which tolerates the
//! field variations the Graph API produces.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use threads_auth::ids::opt_string_or_number;

/// Default and maximum page size for the new-thread trigger.
pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

/// A published thread as returned to Zapier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub permalink: Option<String>,
}

/// Create-thread action payload.
///
/// Media are referenced by URL only; uploading is out of scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub link_attachment: Option<String>,
    #[serde(default)]
    pub media_urls: Option<Vec<String>>,
}

impl CreatePostRequest {
    /// Check required fields. Runs before any credential lookup or network call.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id().is_none() {
            return Err("user_id is required".into());
        }
        match self.text.as_deref() {
            None => Err("text is required".into()),
            Some(text) if text.trim().is_empty() => Err("text must not be empty".into()),
            Some(_) => Ok(()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// JSON body for the Graph API create call.
    pub(crate) fn upstream_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "text": self.text.as_deref().unwrap_or_default() });
        if let Some(reply_to) = self.reply_to_id.as_deref().filter(|s| !s.is_empty()) {
            body["reply_to_id"] = reply_to.into();
        }
        if let Some(link) = self.link_attachment.as_deref().filter(|s| !s.is_empty()) {
            body["link_attachment"] = link.into();
        }
        if let Some(urls) = self.media_urls.as_ref().filter(|urls| !urls.is_empty()) {
            body["media_urls"] = urls.clone().into();
        }
        body
    }
}

/// Paging inputs for listing recent posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPostsQuery {
    /// Cursor or timestamp forwarded verbatim
    pub since: Option<String>,
    pub limit: u32,
}

impl Default for ListPostsQuery {
    fn default() -> Self {
        Self {
            since: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// One item as the Graph API reports it.
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamPost {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    author_id: Option<String>,
}

/// Listing response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct PostPage {
    #[serde(default)]
    pub data: Vec<UpstreamPost>,
}

impl UpstreamPost {
    /// Normalize into a `Post`, filling gaps from the requesting user and,
    /// for freshly created posts, the submitted text.
    pub(crate) fn into_post(
        self,
        fallback_user_id: &str,
        fallback_text: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Post, String> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "post is missing an id".to_string())?;
        let created_at = self
            .created_at
            .as_deref()
            .or(self.timestamp.as_deref())
            .and_then(parse_timestamp)
            .unwrap_or(now);

        Ok(Post {
            id,
            user_id: self
                .author_id
                .unwrap_or_else(|| fallback_user_id.to_string()),
            text: self
                .text
                .or_else(|| fallback_text.map(str::to_owned))
                .unwrap_or_default(),
            created_at,
            permalink: self.permalink,
        })
    }
}

/// Parse the timestamp formats seen from the Graph API.
///
/// Accepts RFC 3339, the `+0000` offset form, and offset-less ISO 8601
/// (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2025-03-01T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn timestamps_are_normalized_to_utc() {
        let expected: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(parse_timestamp("2024-06-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T12:00:00+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T12:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn validate_requires_user_and_text() {
        let mut req = CreatePostRequest {
            user_id: Some("u1".into()),
            text: Some("hello".into()),
            ..Default::default()
        };
        assert!(req.validate().is_ok());

        req.text = Some("   \n".into());
        assert_eq!(req.validate().unwrap_err(), "text must not be empty");

        req.text = None;
        assert_eq!(req.validate().unwrap_err(), "text is required");

        req.text = Some("hello".into());
        req.user_id = Some(" ".into());
        assert_eq!(req.validate().unwrap_err(), "user_id is required");
    }

    #[test]
    fn create_request_accepts_numeric_user_id() {
        let req: CreatePostRequest =
            serde_json::from_str(r#"{"user_id": 1789, "text": "Zapier post"}"#).unwrap();
        assert_eq!(req.user_id(), Some("1789"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn upstream_body_omits_empty_optionals() {
        let req = CreatePostRequest {
            user_id: Some("u1".into()),
            text: Some("hi".into()),
            reply_to_id: Some(String::new()),
            link_attachment: Some("https://example.com".into()),
            media_urls: Some(vec![]),
        };
        let body = req.upstream_body();
        assert_eq!(
            body,
            serde_json::json!({"text": "hi", "link_attachment": "https://example.com"})
        );
    }

    #[test]
    fn upstream_post_fills_gaps() {
        let raw: UpstreamPost = serde_json::from_str(r#"{"id": 123}"#).unwrap();
        let post = raw.into_post("u1", Some("sent text"), now()).unwrap();
        assert_eq!(post.id, "123");
        assert_eq!(post.user_id, "u1");
        assert_eq!(post.text, "sent text");
        assert_eq!(post.created_at, now());
        assert!(post.permalink.is_none());
    }

    #[test]
    fn upstream_post_prefers_upstream_fields() {
        let raw: UpstreamPost = serde_json::from_str(
            r#"{"id":"abc","text":"Hello","timestamp":"2024-06-01T12:00:00+0000",
                "author_id":"u9","permalink":"https://threads.net/t/abc"}"#,
        )
        .unwrap();
        let post = raw.into_post("u1", Some("ignored"), now()).unwrap();
        assert_eq!(post.user_id, "u9");
        assert_eq!(post.text, "Hello");
        assert_eq!(post.created_at, "2024-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(post.permalink.as_deref(), Some("https://threads.net/t/abc"));
    }

    #[test]
    fn upstream_post_without_id_is_rejected() {
        let raw: UpstreamPost = serde_json::from_str(r#"{"text":"orphan"}"#).unwrap();
        assert!(raw.into_post("u1", None, now()).is_err());
    }

    #[test]
    fn post_serializes_rfc3339_and_null_permalink() {
        let post = Post {
            id: "1".into(),
            user_id: "u1".into(),
            text: "t".into(),
            created_at: "2024-06-01T12:00:00Z".parse().unwrap(),
            permalink: None,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["created_at"], "2024-06-01T12:00:00Z");
        assert!(json["permalink"].is_null());
    }
}
