//! Remote collaborator contract and its reqwest implementation.
//!
//! # Design
//! - `InventoryApi` is the only seam between the sync layer and the network.
//! - Every payload is decoded into the shared DTOs and validated before it is returned.
//! - The bearer token is read from the session on every request, never cached here.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use stockroom_api_models::{
    Identity, Item, ItemCreated, ItemDraft, ProblemDocument, RecordId, ReferenceEntry,
    ReferenceKind, TokenRequest, TokenResponse, Validate,
};
use url::Url;

use crate::config::{ClientConfig, HEADER_REQUEST_ID};
use crate::error::SyncError;
use crate::filters::FilterCriteria;
use crate::session::SessionStore;

/// Binary attachment uploaded after an item is saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type, when known.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Asset {
    /// Asset with a MIME type guessed from the file extension.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(str::to_string);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read an asset from disk.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be read.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(name, bytes))
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Operations offered by the inventory server.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// `POST token/`
    async fn obtain_token(&self, request: &TokenRequest) -> Result<TokenResponse, SyncError>;
    /// `GET users/me/`
    async fn current_identity(&self) -> Result<Identity, SyncError>;
    /// `GET items/?location&tag&group&name`
    async fn list_items(&self, filters: &FilterCriteria) -> Result<Vec<Item>, SyncError>;
    /// `GET items/{id}/`
    async fn get_item(&self, id: RecordId) -> Result<Item, SyncError>;
    /// `POST items/`
    async fn create_item(&self, draft: &ItemDraft) -> Result<ItemCreated, SyncError>;
    /// `PATCH items/{id}/` carrying every mutable field.
    async fn update_item(&self, id: RecordId, draft: &ItemDraft) -> Result<Item, SyncError>;
    /// `DELETE items/{id}/`
    async fn delete_item(&self, id: RecordId) -> Result<(), SyncError>;
    /// `POST items/{id}/upload_image/` with multipart field `image`.
    async fn upload_image(&self, id: RecordId, asset: &Asset) -> Result<(), SyncError>;
    /// `GET locations/`, `tags/` or `groups/`.
    async fn list_references(&self, kind: ReferenceKind)
    -> Result<Vec<ReferenceEntry>, SyncError>;
}

/// reqwest-backed [`InventoryApi`].
#[derive(Clone, Debug)]
pub struct HttpInventoryApi {
    client: Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl HttpInventoryApi {
    /// Build a client from `config`, reading credentials from `session`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the request id is not a valid header value or
    /// the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, SyncError> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(&config.request_id)
            .map_err(|_| SyncError::validation("request identifier contains invalid characters"))?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| SyncError::network(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.normalized_base_url(),
            session,
        })
    }

    /// API root all endpoints are joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base_url
            .join(path)
            .map_err(|err| SyncError::network(format!("invalid endpoint '{path}': {err}")))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, SyncError> {
        let response = builder.send().await.map_err(|err| {
            SyncError::network(format!("request to {what} failed: {err}"))
        })?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_problem(response, what).await)
        }
    }

    async fn fetch<T>(&self, builder: RequestBuilder, what: &str) -> Result<T, SyncError>
    where
        T: DeserializeOwned + Validate,
    {
        let response = self.send(self.authorize(builder), what).await?;
        decode(response, what).await
    }
}

async fn decode<T>(response: Response, what: &str) -> Result<T, SyncError>
where
    T: DeserializeOwned + Validate,
{
    let value = response
        .json::<T>()
        .await
        .map_err(|err| SyncError::network(format!("failed to parse {what} response: {err}")))?;
    value
        .validate()
        .map_err(|err| SyncError::invalid_response(what, &err))?;
    Ok(value)
}

/// Classify a non-success response into the error taxonomy.
pub(crate) async fn classify_problem(response: Response, what: &str) -> SyncError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let message = serde_json::from_slice::<ProblemDocument>(&bytes)
        .ok()
        .and_then(|problem| problem.message())
        .or_else(|| (!body_text.is_empty()).then_some(body_text))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_ascii_lowercase()
        });

    tracing::debug!(status = status.as_u16(), endpoint = what, message = %message, "request rejected");

    match status {
        StatusCode::UNAUTHORIZED => SyncError::auth(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::validation(message)
        }
        _ => SyncError::NetworkFailure {
            message,
            status: Some(status.as_u16()),
        },
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    async fn obtain_token(&self, request: &TokenRequest) -> Result<TokenResponse, SyncError> {
        // Credential exchange goes out without a bearer header.
        let url = self.endpoint("token/")?;
        let response = self.send(self.client.post(url).json(request), "token/").await?;
        decode(response, "token/").await
    }

    async fn current_identity(&self) -> Result<Identity, SyncError> {
        let url = self.endpoint("users/me/")?;
        self.fetch(self.client.get(url), "users/me/").await
    }

    async fn list_items(&self, filters: &FilterCriteria) -> Result<Vec<Item>, SyncError> {
        let mut url = self.endpoint("items/")?;
        let pairs = filters.query_pairs();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (name, value) in &pairs {
                query.append_pair(name, value);
            }
        }
        self.fetch(self.client.get(url), "items/").await
    }

    async fn get_item(&self, id: RecordId) -> Result<Item, SyncError> {
        let path = format!("items/{id}/");
        let url = self.endpoint(&path)?;
        self.fetch(self.client.get(url), &path).await
    }

    async fn create_item(&self, draft: &ItemDraft) -> Result<ItemCreated, SyncError> {
        let url = self.endpoint("items/")?;
        self.fetch(self.client.post(url).json(draft), "items/").await
    }

    async fn update_item(&self, id: RecordId, draft: &ItemDraft) -> Result<Item, SyncError> {
        let path = format!("items/{id}/");
        let url = self.endpoint(&path)?;
        self.fetch(self.client.patch(url).json(draft), &path).await
    }

    async fn delete_item(&self, id: RecordId) -> Result<(), SyncError> {
        let path = format!("items/{id}/");
        let url = self.endpoint(&path)?;
        self.send(self.authorize(self.client.delete(url)), &path).await?;
        Ok(())
    }

    async fn upload_image(&self, id: RecordId, asset: &Asset) -> Result<(), SyncError> {
        let path = format!("items/{id}/upload_image/");
        let url = self.endpoint(&path)?;
        let mut part = Part::bytes(asset.bytes.clone()).file_name(asset.file_name.clone());
        if let Some(content_type) = &asset.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|err| SyncError::validation(format!("invalid content type: {err}")))?;
        }
        let form = Form::new().part("image", part);
        self.send(self.authorize(self.client.post(url).multipart(form)), &path).await?;
        Ok(())
    }

    async fn list_references(
        &self,
        kind: ReferenceKind,
    ) -> Result<Vec<ReferenceEntry>, SyncError> {
        let url = self.endpoint(kind.path())?;
        self.fetch(self.client.get(url), kind.path()).await
    }
}
