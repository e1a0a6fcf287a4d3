//! Reddit platform client.
//!
//! Talks to the Reddit OAuth API with an application-only token obtained
//! through the `client_credentials` grant. All reads go through
//! a single request helper, which attaches the bearer token, retries
//! once on a rejected token, and maps HTTP failures onto [`PlatformError`].
//!
//! # Endpoints
//!
//! | Call | Endpoint |
//! |------|----------|
//! | comment / parent / submission | `GET /api/info?id=<fullname>` |
//! | refresh | `GET /comments/<submission>?comment=<id>&context=0` |
//! | replies behind "more" stubs | `GET /api/morechildren` (100 ids per call) |
//! | new comments | `GET /r/<subreddit>/comments?limit=100` |
//!
//! # Environment Variables
//!
//! - `REDDIT_CLIENT_ID`: required
//! - `REDDIT_CLIENT_SECRET`: required

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Platform, PlatformError};
use crate::config::{RedditConfig, RedditCredentials};
use crate::models::{Comment, Submission, SUBMISSION_PREFIX};

/// Maximum number of ids `/api/morechildren` accepts per request.
const MORECHILDREN_BATCH: usize = 100;
/// Tokens are renewed this long before they actually expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DELETED_AUTHOR: &str = "[deleted]";
/// Id of the "continue this thread" stub emitted at the depth limit.
const CONTINUE_THREAD_ID: &str = "_";

/// Authenticated client for one Reddit application.
pub struct RedditClient {
    http: Client,
    api_url: String,
    auth_url: String,
    credentials: RedditCredentials,
    token: Mutex<Option<AccessToken>>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl RedditClient {
    /// Build a client without contacting Reddit.
    pub fn new(config: &RedditConfig, credentials: RedditCredentials) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !credentials.client_id.trim().is_empty(),
            "missing Reddit client id"
        );
        anyhow::ensure!(
            config.api_url.starts_with("http://") || config.api_url.starts_with("https://"),
            "reddit.api_url must be an http(s) URL"
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid reddit.user_agent")?,
        );
        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("failed to build Reddit HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.clone(),
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Build a client and authenticate immediately, so bad credentials
    /// surface at startup rather than on the first event.
    pub async fn connect(
        config: &RedditConfig,
        credentials: RedditCredentials,
    ) -> anyhow::Result<Self> {
        let client = Self::new(config, credentials)?;
        client
            .access_token()
            .await
            .context("Reddit authentication failed")?;
        info!(api_url = %client.api_url, "authenticated with Reddit");
        Ok(client)
    }

    /// Look up a single comment by native id.
    pub async fn comment(&self, id: &str) -> Result<Comment, PlatformError> {
        let fullname = format!("t1_{}", id.trim_start_matches("t1_"));
        let thing = self.info(&fullname).await?;
        expect_comment(thing)
    }

    /// Newest comments in a subreddit, newest first (as Reddit returns them).
    pub async fn new_comments(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Comment>, PlatformError> {
        let limit = limit.to_string();
        let value = self
            .get_json(
                &format!("/r/{}/comments", subreddit),
                &[("limit", limit.as_str())],
            )
            .await?;
        listing_children(value)?
            .into_iter()
            .filter(|thing| thing.kind == "t1")
            .map(|thing| parse_comment(thing.data))
            .collect()
    }

    async fn access_token(&self) -> Result<String, PlatformError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }
        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken, PlatformError> {
        let resp = self
            .http
            .post(&self.auth_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Auth(format!(
                "token endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: TokenResponse = resp.json().await?;
        match payload.access_token {
            Some(value) => Ok(AccessToken {
                value,
                expires_at: Instant::now()
                    + Duration::from_secs(payload.expires_in.unwrap_or(3600)),
            }),
            None => Err(PlatformError::Auth(
                payload
                    .error
                    .unwrap_or_else(|| "no access_token in response".to_string()),
            )),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, PlatformError> {
        let url = format!("{}{}", self.api_url, path);
        let mut reauthenticated = false;

        loop {
            let token = self.access_token().await?;
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("raw_json", "1")])
                .query(query)
                .send()
                .await?;

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                debug!(path, "access token rejected, re-authenticating");
                *self.token.lock().await = None;
                reauthenticated = true;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(PlatformError::RateLimited { retry_after });
            }
            if status == StatusCode::NOT_FOUND {
                return Err(PlatformError::NotFound(path.to_string()));
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(PlatformError::Auth(format!("{} returned {}", path, status)));
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(PlatformError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let text = resp.text().await?;
            return Ok(serde_json::from_str(&text)?);
        }
    }

    async fn info(&self, fullname: &str) -> Result<Thing, PlatformError> {
        let value = self.get_json("/api/info", &[("id", fullname)]).await?;
        listing_children(value)?
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::NotFound(fullname.to_string()))
    }

    /// Load the comments behind "more" stubs of `parent_fullname`.
    ///
    /// Reddit answers with a flat, depth-first list; replies whose parents
    /// arrived in the same response are nested back under them. Stubs that
    /// point at yet more direct replies are followed until exhausted.
    async fn more_children(
        &self,
        link_id: &str,
        parent_fullname: &str,
        ids: &[String],
    ) -> Result<Vec<Comment>, PlatformError> {
        let mut pending: VecDeque<String> = ids.iter().cloned().collect();
        let mut requested: HashSet<String> = HashSet::new();
        let mut flat = Vec::new();
        let mut nested_more = Vec::new();

        loop {
            let mut batch = Vec::with_capacity(MORECHILDREN_BATCH);
            while batch.len() < MORECHILDREN_BATCH {
                let Some(id) = pending.pop_front() else {
                    break;
                };
                if requested.insert(id.clone()) {
                    batch.push(id);
                }
            }
            if batch.is_empty() {
                break;
            }

            let children = batch.join(",");
            let value = self
                .get_json(
                    "/api/morechildren",
                    &[
                        ("api_type", "json"),
                        ("link_id", link_id),
                        ("children", children.as_str()),
                    ],
                )
                .await?;

            for thing in morechildren_things(value)? {
                match thing.kind.as_str() {
                    "t1" => flat.push(parse_comment(thing.data)?),
                    "more" => {
                        let more: RawMore = serde_json::from_value(thing.data)?;
                        if more.parent_id == parent_fullname && more.id != CONTINUE_THREAD_ID {
                            pending.extend(more.children);
                        } else {
                            nested_more.push(more);
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(assemble_flat(flat, nested_more, parent_fullname))
    }
}

#[async_trait]
impl Platform for RedditClient {
    async fn submission(&self, comment: &Comment) -> Result<Submission, PlatformError> {
        let fullname = format!("{}{}", SUBMISSION_PREFIX, comment.submission_id());
        let thing = self.info(&fullname).await?;
        if thing.kind != "t3" {
            return Err(PlatformError::Decode(format!(
                "expected a submission for {}, got kind {}",
                fullname, thing.kind
            )));
        }
        parse_submission(thing.data)
    }

    async fn parent(&self, comment: &Comment) -> Result<Comment, PlatformError> {
        let thing = self.info(&comment.parent_id).await?;
        expect_comment(thing)
    }

    async fn refresh(&self, comment: &Comment) -> Result<Comment, PlatformError> {
        let value = self
            .get_json(
                &format!("/comments/{}", comment.submission_id()),
                &[("comment", comment.id.as_str()), ("context", "0")],
            )
            .await?;

        let Value::Array(mut listings) = value else {
            return Err(PlatformError::Decode(
                "expected [submission, comments] listing pair".to_string(),
            ));
        };
        if listings.len() < 2 {
            return Err(PlatformError::Decode(format!(
                "expected 2 listings, got {}",
                listings.len()
            )));
        }

        for thing in listing_children(listings.swap_remove(1))? {
            if thing.kind != "t1" {
                continue;
            }
            let fresh = parse_comment(thing.data)?;
            if fresh.id == comment.id {
                return Ok(fresh);
            }
        }
        Err(PlatformError::NotFound(comment.fullname()))
    }

    async fn replies(&self, comment: &Comment) -> Result<Vec<Comment>, PlatformError> {
        let refreshed;
        let source = if comment.replies_truncated {
            refreshed = self.refresh(comment).await?;
            &refreshed
        } else {
            comment
        };

        let mut replies = source.replies.clone();
        if !source.more_replies.is_empty() {
            let loaded = self
                .more_children(&source.link_id, &source.fullname(), &source.more_replies)
                .await?;
            replies.extend(loaded);
        }
        Ok(replies)
    }
}

// ============ Response decoding ============

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<String>,
    parent_id: String,
    link_id: String,
    /// Either `""` or a nested listing.
    #[serde(default)]
    replies: Value,
}

#[derive(Debug, Deserialize)]
struct RawMore {
    #[serde(default)]
    id: String,
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    upvote_ratio: f64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    link_flair_text: Option<String>,
    #[serde(default)]
    over_18: bool,
}

fn listing_children(value: Value) -> Result<Vec<Thing>, PlatformError> {
    let thing: Thing = serde_json::from_value(value)?;
    if thing.kind != "Listing" {
        return Err(PlatformError::Decode(format!(
            "expected a Listing, got kind {}",
            thing.kind
        )));
    }
    let listing: Listing = serde_json::from_value(thing.data)?;
    Ok(listing.children)
}

fn morechildren_things(value: Value) -> Result<Vec<Thing>, PlatformError> {
    let json = value
        .get("json")
        .ok_or_else(|| PlatformError::Decode("morechildren: missing json envelope".to_string()))?;
    if let Some(errors) = json.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            return Err(PlatformError::Decode(format!(
                "morechildren returned errors: {}",
                Value::Array(errors.clone())
            )));
        }
    }
    let things = json
        .get("data")
        .and_then(|d| d.get("things"))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    Ok(serde_json::from_value(things)?)
}

fn expect_comment(thing: Thing) -> Result<Comment, PlatformError> {
    if thing.kind != "t1" {
        return Err(PlatformError::Decode(format!(
            "expected a comment, got kind {}",
            thing.kind
        )));
    }
    parse_comment(thing.data)
}

fn normalize_author(author: Option<String>) -> Option<String> {
    author.filter(|a| !a.is_empty() && a != DELETED_AUTHOR)
}

fn parse_comment(data: Value) -> Result<Comment, PlatformError> {
    let raw: RawComment = serde_json::from_value(data)?;
    let mut comment = Comment {
        id: raw.id,
        body: raw.body,
        author: normalize_author(raw.author),
        parent_id: raw.parent_id,
        link_id: raw.link_id,
        ..Default::default()
    };

    if raw.replies.is_object() {
        for child in listing_children(raw.replies)? {
            match child.kind.as_str() {
                "t1" => comment.replies.push(parse_comment(child.data)?),
                "more" => absorb_more(&mut comment, serde_json::from_value(child.data)?),
                _ => {}
            }
        }
    }
    Ok(comment)
}

fn absorb_more(comment: &mut Comment, more: RawMore) {
    if more.id == CONTINUE_THREAD_ID || more.children.is_empty() {
        comment.replies_truncated = true;
    } else {
        comment.more_replies.extend(more.children);
    }
}

fn parse_submission(data: Value) -> Result<Submission, PlatformError> {
    let raw: RawSubmission = serde_json::from_value(data)?;
    Ok(Submission {
        id: raw.id,
        title: raw.title,
        selftext: raw.selftext,
        author: normalize_author(raw.author),
        url: raw.url,
        permalink: raw.permalink,
        score: raw.score,
        upvote_ratio: raw.upvote_ratio,
        created_utc: raw.created_utc,
        link_flair_text: raw.link_flair_text,
        over_18: raw.over_18,
    })
}

/// Rebuild a reply forest from a flat `morechildren` response.
///
/// Returns the direct replies of `parent_fullname`, each with its loaded
/// descendants nested in response order. Stubs addressed to loaded comments
/// become those comments' pending replies.
fn assemble_flat(
    mut flat: Vec<Comment>,
    mores: Vec<RawMore>,
    parent_fullname: &str,
) -> Vec<Comment> {
    let index: HashMap<String, usize> = flat
        .iter()
        .enumerate()
        .map(|(i, c)| (c.fullname(), i))
        .collect();

    for more in mores {
        if let Some(&i) = index.get(&more.parent_id) {
            absorb_more(&mut flat[i], more);
        }
    }

    let mut kids: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
    let mut top = Vec::new();
    for (i, comment) in flat.iter().enumerate() {
        match index.get(&comment.parent_id) {
            Some(&p) if p != i => kids[p].push(i),
            _ if comment.parent_id == parent_fullname => top.push(i),
            _ => debug!(
                comment_id = %comment.id,
                parent = %comment.parent_id,
                "dropping reply with unknown parent"
            ),
        }
    }

    let mut slots: Vec<Option<Comment>> = flat.into_iter().map(Some).collect();
    top.into_iter()
        .filter_map(|i| take_subtree(i, &mut slots, &kids))
        .collect()
}

fn take_subtree(i: usize, slots: &mut [Option<Comment>], kids: &[Vec<usize>]) -> Option<Comment> {
    let mut comment = slots[i].take()?;
    for &k in &kids[i] {
        if let Some(child) = take_subtree(k, slots, kids) {
            comment.replies.push(child);
        }
    }
    Some(comment)
}
