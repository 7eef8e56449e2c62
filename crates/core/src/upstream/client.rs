//! HTTP client for the upstream catalogue API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::auth::{protected_path, SessionToken, TokenCache};
use super::limits::RateLimits;
use super::types::normalise_error;
use super::{
    build_cover_urls, CoverUrls, UpstreamCatalog, UpstreamError, UpstreamManga,
    UpstreamSearchQuery, UpstreamTag, MAX_PAGE_SIZE, PAGINATION_CEILING,
};
use crate::config::UpstreamConfig;
use crate::metrics;
use crate::upstream::pick_localised;

/// Relationship payloads every catalogue read asks for.
const INCLUDES: [&str; 3] = ["cover_art", "author", "artist"];

/// Content ratings applied when the caller specifies none.
const DEFAULT_CONTENT_RATINGS: [&str; 2] = ["safe", "suggestive"];

/// Rate-limited, token-authenticated client to the upstream catalogue.
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    username: String,
    secret: String,
    limits: RateLimits,
    tokens: TokenCache,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            secret: config.secret.clone(),
            limits: RateLimits::new(),
            tokens: TokenCache::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform the login request. Callers must hold the token lock.
    async fn login(&self) -> Result<SessionToken, UpstreamError> {
        self.limits.acquire(Some("login"))?;
        metrics::UPSTREAM_REQUESTS
            .with_label_values(&["login"])
            .inc();

        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.secret,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = normalise_error(status.as_u16(), &body);
            return Err(match err {
                UpstreamError::Api { status: 401, message } => {
                    UpstreamError::Unauthorised(message)
                }
                other => other,
            });
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(format!("login response: {}", e)))?;

        debug!("obtained upstream session token");
        Ok(SessionToken::new(login.token.session, login.token.refresh))
    }

    /// Return a usable session token, logging in when the slot is empty or
    /// past the proactive-refresh threshold. Holding the slot lock across
    /// the login keeps concurrent refreshes down to one outstanding login.
    async fn session_token(&self, discard_current: bool) -> Result<String, UpstreamError> {
        let mut slot = self.tokens.slot.lock().await;
        if discard_current {
            *slot = None;
        }
        if let Some(token) = slot.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.session.clone());
            }
        }
        let token = self.login().await?;
        let session = token.session.clone();
        *slot = Some(token);
        Ok(session)
    }

    /// Send a request with rate limiting, token attachment for protected
    /// paths, and the single forced refresh-and-retry on 401.
    async fn execute(
        &self,
        endpoint: Option<&str>,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<Response, UpstreamError> {
        self.limits.acquire(endpoint)?;
        metrics::UPSTREAM_REQUESTS
            .with_label_values(&[endpoint.unwrap_or("catalogue")])
            .inc();

        let protected = protected_path(path);
        let retry = builder.try_clone();

        let builder = if protected {
            builder.bearer_auth(self.session_token(false).await?)
        } else {
            builder
        };

        let response = builder.send().await?;
        if protected && response.status() == StatusCode::UNAUTHORIZED {
            let Some(retry) = retry else {
                return Err(UpstreamError::Unauthorised(
                    "session rejected and request cannot be replayed".to_string(),
                ));
            };
            debug!(path, "session token rejected, refreshing once");
            let token = self.session_token(true).await?;
            let response = retry.bearer_auth(token).send().await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(UpstreamError::Unauthorised(
                    "session rejected after a forced refresh".to_string(),
                ));
            }
            return Ok(response);
        }

        Ok(response)
    }

    /// Reject non-success responses with a normalised error.
    async fn check(response: Response, subject: &str) -> Result<Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = match normalise_error(status.as_u16(), &body) {
            UpstreamError::Api {
                status: 404,
                message,
            } => UpstreamError::NotFound(if message.is_empty() {
                subject.to_string()
            } else {
                message
            }),
            other => other,
        };
        Err(err)
    }
}

#[async_trait]
impl UpstreamCatalog for UpstreamClient {
    async fn search(
        &self,
        query: &UpstreamSearchQuery,
    ) -> Result<Vec<UpstreamManga>, UpstreamError> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        if query.offset.saturating_add(limit) > PAGINATION_CEILING {
            return Err(UpstreamError::PaginationLimitExceeded {
                offset: query.offset,
                limit,
            });
        }

        let mut params: Vec<(String, String)> = vec![
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), query.offset.to_string()),
            ("order[relevance]".to_string(), "desc".to_string()),
        ];
        if !query.title.is_empty() {
            params.push(("title".to_string(), query.title.clone()));
        }
        for include in INCLUDES {
            params.push(("includes[]".to_string(), include.to_string()));
        }
        let ratings: Vec<String> = if query.content_ratings.is_empty() {
            DEFAULT_CONTENT_RATINGS.iter().map(|s| s.to_string()).collect()
        } else {
            query.content_ratings.clone()
        };
        for rating in ratings {
            params.push(("contentRating[]".to_string(), rating));
        }
        for status in &query.statuses {
            params.push(("status[]".to_string(), status.clone()));
        }
        for demographic in &query.demographics {
            params.push(("publicationDemographic[]".to_string(), demographic.clone()));
        }
        for tag in &query.included_tags {
            params.push(("includedTags[]".to_string(), tag.clone()));
        }
        for tag in &query.excluded_tags {
            params.push(("excludedTags[]".to_string(), tag.clone()));
        }

        let builder = self.http.get(self.url("/manga")).query(&params);
        let response = self.execute(None, "/manga", builder).await?;
        let response = Self::check(response, "manga search").await?;

        let envelope: ListEnvelope = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(format!("search response: {}", e)))?;

        Ok(envelope.data.into_iter().map(UpstreamManga::from).collect())
    }

    async fn get_manga(&self, uuid: &str) -> Result<UpstreamManga, UpstreamError> {
        let path = format!("/manga/{uuid}");
        let params: Vec<(String, String)> = INCLUDES
            .iter()
            .map(|include| ("includes[]".to_string(), include.to_string()))
            .collect();

        let builder = self.http.get(self.url(&path)).query(&params);
        let response = self.execute(None, &path, builder).await?;
        let response = Self::check(response, &format!("manga {uuid}")).await?;

        let envelope: OneEnvelope = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(format!("manga response: {}", e)))?;

        Ok(UpstreamManga::from(envelope.data))
    }

    async fn random(&self) -> Result<UpstreamManga, UpstreamError> {
        let path = "/manga/random";
        let params: Vec<(String, String)> = INCLUDES
            .iter()
            .map(|include| ("includes[]".to_string(), include.to_string()))
            .collect();

        let builder = self.http.get(self.url(path)).query(&params);
        let response = self.execute(Some("random"), path, builder).await?;
        let response = Self::check(response, "random manga").await?;

        let envelope: OneEnvelope = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(format!("random response: {}", e)))?;

        Ok(UpstreamManga::from(envelope.data))
    }

    async fn list_tags(&self) -> Vec<UpstreamTag> {
        let result: Result<Vec<UpstreamTag>, UpstreamError> = async {
            let builder = self.http.get(self.url("/manga/tag"));
            let response = self.execute(None, "/manga/tag", builder).await?;
            let response = Self::check(response, "tag dictionary").await?;
            let envelope: TagListEnvelope = response
                .json()
                .await
                .map_err(|e| UpstreamError::Parse(format!("tag response: {}", e)))?;
            Ok(envelope
                .data
                .into_iter()
                .map(UpstreamTag::from)
                .collect())
        }
        .await;

        match result {
            Ok(tags) => tags,
            Err(e) => {
                warn!("failed to fetch upstream tag dictionary: {}", e);
                Vec::new()
            }
        }
    }

    fn cover_urls(&self, manga: &UpstreamManga) -> Option<CoverUrls> {
        build_cover_urls(&self.base_url, manga)
    }
}

// ============================================================================
// Wire types (private)
// ============================================================================

#[derive(Debug, serde::Deserialize)]
struct LoginResponse {
    token: LoginToken,
}

#[derive(Debug, serde::Deserialize)]
struct LoginToken {
    session: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Vec<MangaData>,
}

#[derive(Debug, serde::Deserialize)]
struct OneEnvelope {
    data: MangaData,
}

#[derive(Debug, serde::Deserialize)]
struct TagListEnvelope {
    #[serde(default)]
    data: Vec<TagData>,
}

#[derive(Debug, serde::Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<RelationshipData>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(default)]
    alt_titles: Vec<HashMap<String, String>>,
    #[serde(default)]
    description: HashMap<String, String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    last_chapter: Option<String>,
    #[serde(default)]
    tags: Vec<TagData>,
}

#[derive(Debug, serde::Deserialize)]
struct RelationshipData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct TagData {
    id: String,
    attributes: TagAttributes,
}

#[derive(Debug, Default, serde::Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: HashMap<String, String>,
    #[serde(default)]
    group: Option<String>,
}

impl From<MangaData> for UpstreamManga {
    fn from(data: MangaData) -> Self {
        let cover_filename = data
            .relationships
            .iter()
            .find(|rel| rel.kind == "cover_art")
            .and_then(|rel| rel.attributes.as_ref())
            .and_then(|attrs| attrs.get("fileName"))
            .and_then(|name| name.as_str())
            .map(|name| name.to_string());

        Self {
            id: data.id,
            title: data.attributes.title,
            alt_titles: data.attributes.alt_titles,
            description: data.attributes.description,
            status: data.attributes.status,
            year: data.attributes.year,
            last_chapter: data.attributes.last_chapter,
            cover_filename,
            tags: data
                .attributes
                .tags
                .into_iter()
                .map(UpstreamTag::from)
                .collect(),
        }
    }
}

impl From<TagData> for UpstreamTag {
    fn from(data: TagData) -> Self {
        // Tolerate a missing English name by falling back to any
        // localisation.
        let name = pick_localised(&data.attributes.name, &["en"]).unwrap_or_default();
        Self {
            id: data.id,
            name,
            group: data.attributes.group.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manga_data_conversion() {
        let json = r#"{
            "id": "b1a0c6d4-aaaa-bbbb-cccc-ddddeeeeffff",
            "attributes": {
                "title": {"en": "Tower of Dawn"},
                "altTitles": [{"ko": "새벽의 탑"}, {"ko-ro": "Saebyeogui Tap"}],
                "description": {"en": "A climb to the top."},
                "status": "ongoing",
                "year": 2020,
                "lastChapter": "88",
                "tags": [
                    {"id": "t-1", "attributes": {"name": {"en": "Action"}, "group": "genre"}}
                ]
            },
            "relationships": [
                {"type": "author", "attributes": {"name": "Kim"}},
                {"type": "cover_art", "attributes": {"fileName": "cover-abc.jpg"}}
            ]
        }"#;

        let data: MangaData = serde_json::from_str(json).unwrap();
        let manga = UpstreamManga::from(data);

        assert_eq!(manga.id, "b1a0c6d4-aaaa-bbbb-cccc-ddddeeeeffff");
        assert_eq!(manga.title.get("en").unwrap(), "Tower of Dawn");
        assert_eq!(manga.cover_filename.as_deref(), Some("cover-abc.jpg"));
        assert_eq!(manga.tags.len(), 1);
        assert_eq!(manga.tags[0].name, "Action");
        assert_eq!(manga.tags[0].group, "genre");
        assert_eq!(manga.last_chapter.as_deref(), Some("88"));
    }

    #[test]
    fn test_manga_data_without_relationships() {
        let json = r#"{"id": "x", "attributes": {"title": {"en": "Bare"}}}"#;
        let data: MangaData = serde_json::from_str(json).unwrap();
        let manga = UpstreamManga::from(data);
        assert!(manga.cover_filename.is_none());
        assert!(manga.tags.is_empty());
    }

    #[test]
    fn test_tag_name_falls_back_to_any_localisation() {
        let json = r#"{"id": "t-9", "attributes": {"name": {"ja": "アクション"}, "group": "genre"}}"#;
        let data: TagData = serde_json::from_str(json).unwrap();
        let tag = UpstreamTag::from(data);
        assert_eq!(tag.name, "アクション");
    }

    #[test]
    fn test_login_response_parsing() {
        let json = r#"{"result":"ok","token":{"session":"sess-1","refresh":"ref-1"}}"#;
        let login: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(login.token.session, "sess-1");
        assert_eq!(login.token.refresh.as_deref(), Some("ref-1"));
    }

    #[tokio::test]
    async fn test_pagination_ceiling_rejected_before_any_request() {
        let client = UpstreamClient::new(&crate::config::UpstreamConfig {
            // An unroutable base URL: reaching the network would fail loudly.
            api_url: "http://192.0.2.1".to_string(),
            username: "svc".to_string(),
            secret: "secret".to_string(),
            user_agent: "test".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let query = UpstreamSearchQuery {
            title: "deep page".to_string(),
            limit: 100,
            offset: 9_950,
            ..Default::default()
        };
        let err = client.search(&query).await.unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::PaginationLimitExceeded {
                offset: 9_950,
                limit: 100
            }
        ));
    }
}
