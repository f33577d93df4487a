use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::{DocumentCollection, StoreError};

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const PAGE_SIZE: &str = "300";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Refresh a metadata token this long before the server says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// How requests to Firestore are authenticated.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// No `Authorization` header (emulator).
    None,
    /// A fixed bearer token.
    Static(String),
    /// OAuth token from the GCE/Cloud Run metadata server at this URL.
    Metadata(String),
}

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub collection: String,
    pub base_url: String,
    pub token: TokenSource,
}

impl FirestoreConfig {
    /// Production Firestore, authenticated through the metadata server.
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collection: collection.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: TokenSource::Metadata(METADATA_TOKEN_URL.to_owned()),
        }
    }

    /// Local emulator at `host` (as in `FIRESTORE_EMULATOR_HOST`).
    pub fn emulator(
        project_id: impl Into<String>,
        collection: impl Into<String>,
        host: &str,
    ) -> Self {
        Self {
            base_url: format!("http://{host}"),
            token: TokenSource::None,
            ..Self::new(project_id, collection)
        }
    }

    pub fn with_token(mut self, token: TokenSource) -> Self {
        self.token = token;
        self
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<DocumentName>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct DocumentName {
    name: String,
}

/// `DocumentCollection` over the Firestore REST API.
pub struct FirestoreCollection {
    client: reqwest::Client,
    collection_url: Url,
    token: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl FirestoreCollection {
    pub fn new(cfg: FirestoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut collection_url = Url::parse(&cfg.base_url)
            .map_err(|e| StoreError::Config(format!("invalid Firestore base URL: {e}")))?;
        collection_url
            .path_segments_mut()
            .map_err(|()| StoreError::Config("Firestore base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                cfg.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                cfg.collection.as_str(),
            ]);

        Ok(Self {
            client,
            collection_url,
            token: cfg.token,
            cached: Mutex::new(None),
        })
    }

    fn document_url(&self, id: &str) -> Url {
        let mut url = self.collection_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    async fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        match &self.token {
            TokenSource::None => Ok(req),
            TokenSource::Static(token) => Ok(req.bearer_auth(token)),
            TokenSource::Metadata(url) => {
                let token = self.metadata_token(url).await?;
                Ok(req.bearer_auth(token))
            }
        }
    }

    async fn metadata_token(&self, url: &str) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref() {
            if Instant::now() < tok.refresh_at {
                return Ok(tok.value.clone());
            }
        }

        let resp = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StoreError::Token(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StoreError::Token(format!(
                "metadata server returned {}",
                resp.status()
            )));
        }
        let body: MetadataTokenResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Token(e.to_string()))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_SLACK);
        debug!(expires_in = body.expires_in, "fetched metadata access token");
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }
}

async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

#[async_trait]
impl DocumentCollection for FirestoreCollection {
    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url.clone();
            url.query_pairs_mut().append_pair("pageSize", PAGE_SIZE);
            if let Some(tok) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", tok);
            }

            let req = self.authorize(self.client.get(url)).await?;
            let page: ListDocumentsResponse = check(req.send().await?).await?.json().await?;

            ids.extend(
                page.documents
                    .into_iter()
                    .filter_map(|d| d.name.rsplit('/').next().map(str::to_owned)),
            );

            match page.next_page_token {
                Some(tok) if !tok.is_empty() => page_token = Some(tok),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn set(&self, id: &str) -> Result<(), StoreError> {
        let req = self
            .client
            .patch(self.document_url(id))
            .json(&json!({ "fields": {} }));
        check(self.authorize(req).await?.send().await?).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let req = self.authorize(self.client.delete(self.document_url(id))).await?;
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(resp).await?;
        Ok(())
    }
}
