//! The REST space adapter.
//!
//! Endpoint shape, with `{space}` fixed per adapter instance:
//!
//! ```text
//! GET    /spaces/{space}/categories
//! GET    /spaces/{space}/categories/{id}/channels
//! GET    /spaces/{space}/channels?uncategorized=true
//! POST   /spaces/{space}/categories
//! POST   /spaces/{space}/categories/{id}/channels
//! PATCH  /spaces/{space}/categories/{id}
//! PATCH  /spaces/{space}/channels/{id}
//! DELETE /spaces/{space}/categories/{id}
//! DELETE /spaces/{space}/channels/{id}
//! GET    /spaces/{space}/capability            (engine credential)
//! GET    /spaces/{space}/members/{actor}/capability
//! ```

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use concord_core::types::{
    ActorId, CategoryName, ChannelKind, ChannelName, LiveCategory, LiveChannel, RemoteId,
};
use concord_engine::confirm::CapabilityProbe;
use concord_engine::{AdapterError, ChannelEdit, NewChannel, SpaceAdapter};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Explicit client configuration, passed in as a value at construction —
/// never read from process-wide state.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the structure API, without a trailing slash.
    pub base_url: String,
    /// Bearer token for the engine's credential.
    pub token: String,
    /// The target space.
    pub space: RemoteId,
}

impl RestConfig {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        space: impl Into<RemoteId>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            space: space.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireCategory {
    id: String,
    name: String,
    position: i64,
}

impl From<WireCategory> for LiveCategory {
    fn from(wire: WireCategory) -> Self {
        LiveCategory {
            id: RemoteId(wire.id),
            name: CategoryName(wire.name),
            position: wire.position,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    name: String,
    kind: ChannelKind,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    nsfw: bool,
    position: i64,
    #[serde(default)]
    parent: Option<String>,
}

impl From<WireChannel> for LiveChannel {
    fn from(wire: WireChannel) -> Self {
        LiveChannel {
            id: RemoteId(wire.id),
            name: ChannelName(wire.name),
            kind: wire.kind,
            topic: wire.topic,
            nsfw: wire.nsfw,
            position: wire.position,
            parent: wire.parent.map(RemoteId),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateCategoryBody<'a> {
    name: &'a str,
    position: usize,
}

#[derive(Debug, Serialize)]
struct CreateChannelBody<'a> {
    name: &'a str,
    kind: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EditCategoryBody {
    position: usize,
}

#[derive(Debug, Serialize)]
struct EditChannelBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nsfw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct WireCapability {
    manage_structure: bool,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// A [`SpaceAdapter`] over the remote platform's HTTP API.
#[derive(Debug, Clone)]
pub struct RestAdapter {
    config: RestConfig,
    http: reqwest::Client,
}

impl RestAdapter {
    pub fn new(config: RestConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn space(&self) -> &RemoteId {
        &self.config.space
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/spaces/{}{}",
            self.config.base_url, self.config.space, suffix
        )
    }

    fn request(&self, method: Method, suffix: &str) -> RequestBuilder {
        let url = self.url(suffix);
        debug!(%method, %url, "remote call");
        self.http
            .request(method, url)
            .bearer_auth(&self.config.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AdapterError> {
        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Remote(format!("transport error: {e}")))?;
        into_adapter_result(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, suffix: &str) -> Result<T, AdapterError> {
        let response = self.send(self.request(Method::GET, suffix)).await?;
        response
            .json()
            .await
            .map_err(|e| AdapterError::Remote(format!("malformed response body: {e}")))
    }
}

/// Map an HTTP status onto the adapter error taxonomy. The response body is
/// folded into the reason, truncated so a huge error page cannot flood the
/// change log.
async fn into_adapter_result(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterError::Permission(format!("{status}: {excerpt}"))
        }
        StatusCode::NOT_FOUND => AdapterError::NotFound(format!("{status}: {excerpt}")),
        _ => AdapterError::Remote(format!("{status}: {excerpt}")),
    })
}

#[async_trait]
impl SpaceAdapter for RestAdapter {
    async fn check_capability(&self) -> Result<(), AdapterError> {
        let capability: WireCapability = self.get_json("/capability").await?;
        if capability.manage_structure {
            Ok(())
        } else {
            Err(AdapterError::Permission(
                "credential lacks the structural-management capability".to_string(),
            ))
        }
    }

    async fn list_categories(&self) -> Result<Vec<LiveCategory>, AdapterError> {
        let listed: Vec<WireCategory> = self.get_json("/categories").await?;
        Ok(listed.into_iter().map(Into::into).collect())
    }

    async fn list_channels(&self, category: &RemoteId) -> Result<Vec<LiveChannel>, AdapterError> {
        let listed: Vec<WireChannel> = self
            .get_json(&format!("/categories/{category}/channels"))
            .await?;
        Ok(listed.into_iter().map(Into::into).collect())
    }

    async fn list_uncategorized(&self) -> Result<Vec<LiveChannel>, AdapterError> {
        let listed: Vec<WireChannel> = self.get_json("/channels?uncategorized=true").await?;
        Ok(listed.into_iter().map(Into::into).collect())
    }

    async fn create_category(
        &self,
        name: &CategoryName,
        position: usize,
    ) -> Result<LiveCategory, AdapterError> {
        let body = CreateCategoryBody {
            name: &name.0,
            position,
        };
        let response = self
            .send(self.request(Method::POST, "/categories").json(&body))
            .await?;
        let created: WireCategory = response
            .json()
            .await
            .map_err(|e| AdapterError::Remote(format!("malformed response body: {e}")))?;
        Ok(created.into())
    }

    async fn create_channel(
        &self,
        category: &RemoteId,
        channel: NewChannel,
    ) -> Result<LiveChannel, AdapterError> {
        let body = CreateChannelBody {
            name: &channel.name.0,
            kind: channel.kind,
            topic: channel.topic.as_deref(),
            nsfw: channel.nsfw,
            position: channel.position,
        };
        let response = self
            .send(
                self.request(Method::POST, &format!("/categories/{category}/channels"))
                    .json(&body),
            )
            .await?;
        let created: WireChannel = response
            .json()
            .await
            .map_err(|e| AdapterError::Remote(format!("malformed response body: {e}")))?;
        Ok(created.into())
    }

    async fn edit_category(&self, id: &RemoteId, position: usize) -> Result<(), AdapterError> {
        let body = EditCategoryBody { position };
        self.send(
            self.request(Method::PATCH, &format!("/categories/{id}"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn edit_channel(&self, id: &RemoteId, edit: ChannelEdit) -> Result<(), AdapterError> {
        let body = EditChannelBody {
            topic: edit.topic.as_deref(),
            nsfw: edit.nsfw,
            position: edit.position,
        };
        self.send(
            self.request(Method::PATCH, &format!("/channels/{id}"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_category(&self, id: &RemoteId) -> Result<(), AdapterError> {
        self.send(self.request(Method::DELETE, &format!("/categories/{id}")))
            .await?;
        Ok(())
    }

    async fn delete_channel(&self, id: &RemoteId) -> Result<(), AdapterError> {
        self.send(self.request(Method::DELETE, &format!("/channels/{id}")))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CapabilityProbe for RestAdapter {
    async fn can_manage_structure(&self, actor: &ActorId) -> Result<bool, AdapterError> {
        let capability: WireCapability = self
            .get_json(&format!("/members/{actor}/capability"))
            .await?;
        Ok(capability.manage_structure)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
