use crate::media::MediaBlob;
use crate::websocket::{self, Subscription};
use async_trait::async_trait;
use jar_core::{
    ErrorBody, JarError, JarId, JarResult, MediaUploaded, Memory, MemoryDraft, MemoryId,
    MemoryRow, NewMemoryRow, RemoteError, RowFields,
};
use reqwest::{header::CONTENT_TYPE, Response, StatusCode, Url};

/// CRUD, media upload and change notifications against the hosted backend.
///
/// Every call is attempted once; retrying is the caller's decision.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All memories of a jar, newest first.
    async fn fetch_all(&self, jar_id: &JarId) -> Result<Vec<Memory>, RemoteError>;

    /// Persists a new memory and returns it as stored, with its assigned id.
    async fn insert(&self, draft: &MemoryDraft, jar_id: &JarId) -> Result<Memory, RemoteError>;

    /// Replaces every mutable field of an existing memory.
    async fn update(&self, memory: &Memory) -> Result<Memory, RemoteError>;

    async fn delete(&self, id: MemoryId) -> Result<(), RemoteError>;

    /// Uploads a blob and returns its public URL.
    async fn upload_media(&self, blob: &MediaBlob) -> Result<String, RemoteError>;

    async fn subscribe(&self, jar_id: &JarId) -> Result<Subscription, RemoteError>;
}

/// `RemoteStore` speaking the jar server's HTTP and WebSocket API.
#[derive(Clone)]
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> JarResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| JarError::Validation(format!("invalid server url {}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::Network(format!("bad endpoint {}: {}", path, e)))
    }

    /// WebSocket URL of a jar's push channel.
    pub fn push_url(&self, jar_id: &JarId) -> Result<Url, RemoteError> {
        let mut url = self.endpoint("ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| RemoteError::Subscribe(format!("cannot derive push url from {}", url)))?;
        url.query_pairs_mut().append_pair("jar_id", jar_id.as_str());
        Ok(url)
    }
}

fn network(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

fn decode(e: reqwest::Error) -> RemoteError {
    RemoteError::Decode(e.to_string())
}

/// Passes successful responses through and turns the rest into
/// `RemoteError::Status`.
async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);

    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch_all(&self, jar_id: &JarId) -> Result<Vec<Memory>, RemoteError> {
        let mut url = self.endpoint("api/memories")?;
        url.query_pairs_mut().append_pair("jar_id", jar_id.as_str());

        let response = self.http.get(url).send().await.map_err(network)?;
        let rows: Vec<MemoryRow> = check(response).await?.json().await.map_err(decode)?;

        tracing::info!("REMOTE: fetched {} memories for jar {}", rows.len(), jar_id);
        Ok(rows.into_iter().map(Memory::from).collect())
    }

    async fn insert(&self, draft: &MemoryDraft, jar_id: &JarId) -> Result<Memory, RemoteError> {
        let url = self.endpoint("api/memories")?;
        let body = NewMemoryRow::from_draft(draft, jar_id);

        let response = self.http.post(url).json(&body).send().await.map_err(network)?;
        let row: MemoryRow = check(response).await?.json().await.map_err(decode)?;

        tracing::info!("REMOTE: inserted memory {} into jar {}", row.id, jar_id);
        Ok(row.into())
    }

    async fn update(&self, memory: &Memory) -> Result<Memory, RemoteError> {
        let url = self.endpoint(&format!("api/memories/{}", memory.id))?;
        let body = RowFields::from(memory);

        let response = self.http.put(url).json(&body).send().await.map_err(network)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(memory.id));
        }
        let row: MemoryRow = check(response).await?.json().await.map_err(decode)?;

        tracing::info!("REMOTE: updated memory {}", row.id);
        Ok(row.into())
    }

    async fn delete(&self, id: MemoryId) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("api/memories/{}", id))?;

        let response = self.http.delete(url).send().await.map_err(network)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!("REMOTE: memory {} was already gone", id);
            return Ok(());
        }
        check(response).await?;

        tracing::info!("REMOTE: deleted memory {}", id);
        Ok(())
    }

    async fn upload_media(&self, blob: &MediaBlob) -> Result<String, RemoteError> {
        let mut url = self.endpoint("api/media")?;
        url.query_pairs_mut().append_pair("ext", &blob.extension);

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, blob.content_type.as_str())
            .body(blob.bytes.clone())
            .send()
            .await
            .map_err(network)?;
        let uploaded: MediaUploaded = check(response).await?.json().await.map_err(decode)?;

        tracing::info!("REMOTE: uploaded {} bytes to {}", blob.bytes.len(), uploaded.url);
        Ok(uploaded.url)
    }

    async fn subscribe(&self, jar_id: &JarId) -> Result<Subscription, RemoteError> {
        let url = self.push_url(jar_id)?;
        websocket::subscribe(url, jar_id.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_resolve_against_base_path() {
        let remote = HttpRemote::new("http://localhost:8080/jar").unwrap();
        assert_eq!(remote.base_url().as_str(), "http://localhost:8080/jar/");
        assert_eq!(
            remote.endpoint("api/memories").unwrap().as_str(),
            "http://localhost:8080/jar/api/memories"
        );
    }

    #[test]
    fn test_push_url_switches_scheme() {
        let jar = JarId::parse("ab12").unwrap();

        let plain = HttpRemote::new("http://localhost:8080").unwrap();
        assert_eq!(
            plain.push_url(&jar).unwrap().as_str(),
            "ws://localhost:8080/ws?jar_id=AB12"
        );

        let tls = HttpRemote::new("https://jar.example.com/").unwrap();
        assert_eq!(
            tls.push_url(&jar).unwrap().as_str(),
            "wss://jar.example.com/ws?jar_id=AB12"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpRemote::new("not a url"),
            Err(JarError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let remote = HttpRemote::new("http://127.0.0.1:9").unwrap();
        let jar = JarId::parse("NOPE").unwrap();
        assert!(matches!(
            remote.fetch_all(&jar).await,
            Err(RemoteError::Network(_))
        ));
    }
}
