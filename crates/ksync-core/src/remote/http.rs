//! Knowledge API client over blocking HTTP

use std::path::Path;
use std::time::Duration;

use ksync_fs::ContentHash;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart::Form};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, trace};

use super::{CollectionListing, FileListing, PurgeOutcome, RemoteError, RemoteResult, RemoteStore};
use crate::settings::Settings;
use crate::{Error, Result};

/// Collection listings come either bare or wrapped in a page object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CollectionPage {
    Bare(Vec<CollectionItem>),
    Paged {
        #[serde(default)]
        items: Option<Vec<CollectionItem>>,
    },
}

impl CollectionPage {
    fn into_listing(self) -> CollectionListing {
        let items = match self {
            Self::Bare(items) => items,
            Self::Paged { items } => items.unwrap_or_default(),
        };
        items.into_iter().map(|c| (c.name, c.id)).collect()
    }
}

#[derive(Debug, Deserialize)]
struct CollectionItem {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FilePage {
    #[serde(default)]
    items: Option<Vec<FileItem>>,
}

impl FilePage {
    fn into_listing(self) -> FileListing {
        self.items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|f| Some((f.filename.filter(|n| !n.is_empty())?, f.id)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FileItem {
    id: String,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VectorDeleteAck {
    #[serde(default)]
    status: Option<String>,
}

/// [`RemoteStore`] backed by a knowledge API and its vector store.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    api_url: String,
    api_key: String,
    vector_store_url: String,
    vector_store_api_key: Option<String>,
    vector_collections: Vec<String>,
    settle_delay: Duration,
}

impl HttpRemote {
    /// Build a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no credential is configured or
    /// the HTTP client cannot be constructed.
    pub fn new(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| Error::configuration("no API key configured"))?
            .to_string();

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| Error::configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key,
            vector_store_url: settings.vector_store_url.trim_end_matches('/').to_string(),
            vector_store_api_key: settings.vector_store_api_key.clone(),
            vector_collections: settings.vector_collections.clone(),
            settle_delay: settings.settle_delay,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.api_url, path)
    }

    /// Send an authenticated knowledge API request and fail on non-2xx.
    fn send(&self, operation: &str, request: RequestBuilder) -> RemoteResult<Response> {
        trace!(operation, "sending request");
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| transport(operation, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(RemoteError::from_status(operation, status.as_u16(), body))
    }

    fn send_json<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> RemoteResult<T> {
        let body = self
            .send(operation, request)?
            .text()
            .map_err(|e| transport(operation, e))?;
        decode(operation, &body)
    }

    fn purge_from(&self, collection: &str, hash: &ContentHash) -> bool {
        let url = format!("{}/collections/{}/points/delete", self.vector_store_url, collection);
        let mut request = self.client.post(url).json(&json!({
            "filter": {
                "must": [{ "key": "metadata.hash", "match": { "value": hash.as_str() } }]
            }
        }));
        if let Some(key) = &self.vector_store_api_key {
            request = request.header("api-key", key);
        }

        match request.send() {
            Ok(response) if response.status().is_success() => response
                .json::<VectorDeleteAck>()
                .map(|ack| ack.status.as_deref() == Some("ok"))
                .unwrap_or(false),
            Ok(response) => {
                debug!(collection, status = response.status().as_u16(), "vector purge not applied");
                false
            }
            Err(e) => {
                debug!(collection, "vector purge failed: {}", e);
                false
            }
        }
    }
}

impl RemoteStore for HttpRemote {
    fn list_collections(&self) -> RemoteResult<CollectionListing> {
        let page: CollectionPage =
            self.send_json("list collections", self.client.get(self.api("/knowledge/")))?;
        Ok(page.into_listing())
    }

    fn create_collection(&self, name: &str) -> RemoteResult<String> {
        let operation = format!("create collection '{}'", name);
        let created: Created = self.send_json(
            &operation,
            self.client
                .post(self.api("/knowledge/create"))
                .json(&json!({ "name": name, "description": "" })),
        )?;
        Ok(created.id)
    }

    fn list_files(&self, collection_id: &str) -> RemoteResult<FileListing> {
        let page: FilePage = self.send_json(
            "list collection files",
            self.client.get(self.api(&format!("/knowledge/{}/files", collection_id))),
        )?;
        Ok(page.into_listing())
    }

    fn upload_file(&self, path: &Path) -> RemoteResult<String> {
        let operation = format!("upload {}", path.display());
        let form = Form::new().file("file", path).map_err(|source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let created: Created =
            self.send_json(&operation, self.client.post(self.api("/files/")).multipart(form))?;

        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
        Ok(created.id)
    }

    fn attach_file(&self, collection_id: &str, file_id: &str) -> RemoteResult<()> {
        self.send(
            "attach file",
            self.client
                .post(self.api(&format!("/knowledge/{}/file/add", collection_id)))
                .json(&json!({ "file_id": file_id })),
        )?;
        Ok(())
    }

    fn detach_file(&self, collection_id: &str, file_id: &str) -> RemoteResult<()> {
        self.send(
            "detach file",
            self.client
                .post(self.api(&format!("/knowledge/{}/file/remove", collection_id)))
                .json(&json!({ "file_id": file_id })),
        )?;
        Ok(())
    }

    fn purge_duplicate_vectors(&self, hash: &ContentHash) -> PurgeOutcome {
        let mut outcome = PurgeOutcome::default();
        for collection in &self.vector_collections {
            outcome.attempted += 1;
            if self.purge_from(collection, hash) {
                outcome.acknowledged += 1;
            }
        }
        debug!(
            hash = hash.short(),
            attempted = outcome.attempted,
            acknowledged = outcome.acknowledged,
            "purged duplicate vectors"
        );
        outcome
    }
}

fn transport(operation: &str, e: reqwest::Error) -> RemoteError {
    let message = if e.is_timeout() {
        format!("timed out: {}", e)
    } else {
        e.to_string()
    };
    RemoteError::Transport {
        operation: operation.to_string(),
        message,
    }
}

fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> RemoteResult<T> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}
