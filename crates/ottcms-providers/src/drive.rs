//! Google Drive client: metadata, folder crawling and file downloads.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ottcms_models::{dedupe_by_key, DriveLink};

use crate::error::{env_or, env_secs, ProviderError, ProviderResult};

const SERVICE: &str = "drive";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const FILE_FIELDS: &str = "id,name,mimeType,size";

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_base: String,
    pub page_size: u32,
    /// Folder nesting depth followed while crawling.
    pub max_depth: usize,
    /// Budget for metadata and listing calls; downloads use it as an idle
    /// timeout between body chunks instead.
    pub timeout: Duration,
    /// Fixed bearer token, bypassing service-account auth.
    pub access_token: Option<String>,
}

impl DriveConfig {
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            api_base: env_or("DRIVE_API_BASE", "https://www.googleapis.com/drive/v3"),
            page_size: env_or("DRIVE_PAGE_SIZE", "1000")
                .parse()
                .map_err(|_| ProviderError::config_error("DRIVE_PAGE_SIZE must be an integer"))?,
            max_depth: env_or("DRIVE_MAX_DEPTH", "10")
                .parse()
                .map_err(|_| ProviderError::config_error("DRIVE_MAX_DEPTH must be an integer"))?,
            timeout: env_secs("DRIVE_TIMEOUT_SECS", 60),
            access_token: std::env::var("DRIVE_ACCESS_TOKEN").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// A file as reported by Drive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: Option<u64>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    /// Drive encodes int64 as a string.
    size: Option<String>,
}

impl From<RawFile> for DriveFile {
    fn from(raw: RawFile) -> Self {
        Self {
            size_bytes: raw.size.and_then(|s| s.parse().ok()),
            id: raw.id,
            name: raw.name,
            mime_type: raw.mime_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RawFile>,
    next_page_token: Option<String>,
}

enum DriveAuth {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

/// Streaming body of a Drive download.
pub struct DriveDownload {
    response: Response,
    idle_timeout: Duration,
}

impl DriveDownload {
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Next chunk of the body, `None` at the end.
    ///
    /// Fails only when no data arrives for the idle timeout; a slow but
    /// steady transfer may take as long as it needs.
    pub async fn next_chunk(&mut self) -> ProviderResult<Option<Vec<u8>>> {
        match tokio::time::timeout(self.idle_timeout, self.response.chunk()).await {
            Ok(chunk) => Ok(chunk?.map(|b| b.to_vec())),
            Err(_) => Err(ProviderError::Stalled {
                service: SERVICE,
                seconds: self.idle_timeout.as_secs(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
    auth: Arc<DriveAuth>,
}

impl DriveClient {
    pub async fn new(config: DriveConfig) -> ProviderResult<Self> {
        let auth = match &config.access_token {
            Some(token) => DriveAuth::Static(token.clone()),
            None => DriveAuth::Provider(Self::create_auth_provider().await?),
        };
        // No total timeout on the client: downloads run for as long as data flows.
        let http = Client::builder().connect_timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            auth: Arc::new(auth),
        })
    }

    pub async fn from_env() -> ProviderResult<Self> {
        Self::new(DriveConfig::from_env()?).await
    }

    async fn create_auth_provider() -> ProviderResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env()
            .map_err(|e| ProviderError::AuthError(format!("Failed to load service account: {}", e)))?;
        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => gcp_auth::provider()
                .await
                .map_err(|e| ProviderError::AuthError(format!("No Google credentials available: {}", e))),
        }
    }

    async fn token(&self) -> ProviderResult<String> {
        match self.auth.as_ref() {
            DriveAuth::Static(token) => Ok(token.clone()),
            DriveAuth::Provider(provider) => provider
                .token(&[DRIVE_SCOPE])
                .await
                .map(|t| t.as_str().to_string())
                .map_err(|e| ProviderError::AuthError(e.to_string())),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn request(&self, url: &str, query: &[(&str, &str)]) -> ProviderResult<RequestBuilder> {
        Ok(self.http.get(url).bearer_auth(self.token().await?).query(query))
    }

    /// Bounded request for metadata and listings.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> ProviderResult<Response> {
        let request = self.request(url, query).await?.timeout(self.config.timeout);
        Self::send(request).await
    }

    async fn send(request: RequestBuilder) -> ProviderResult<Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, response).await);
        }
        Ok(response)
    }

    pub async fn file_metadata(&self, file_id: &str) -> ProviderResult<DriveFile> {
        let url = self.url(&format!("files/{}", urlencoding::encode(file_id)));
        let response = self
            .get(&url, &[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .await?;
        let raw: RawFile = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;
        Ok(raw.into())
    }

    /// Direct children of a folder, following pagination.
    pub async fn list_children(&self, folder_id: &str) -> ProviderResult<Vec<DriveFile>> {
        let url = self.url("files");
        let q = format!("'{}' in parents and trashed = false", folder_id.replace('\'', "\\'"));
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let page_size = self.config.page_size.to_string();

        let mut children = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("q", q.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", page_size.as_str()),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let list: FileList = self
                .get(&url, &query)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;
            children.extend(list.files.into_iter().map(DriveFile::from));

            match list.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(folder_id, count = children.len(), "Listed Drive folder");
        Ok(children)
    }

    /// Video files anywhere under a folder, up to `max_depth` levels deep.
    pub async fn crawl_folder(&self, folder_id: &str) -> ProviderResult<Vec<DriveFile>> {
        let mut videos = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![(folder_id.to_string(), 0usize)];

        while let Some((id, depth)) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            for child in self.list_children(&id).await? {
                if child.is_folder() {
                    if depth + 1 <= self.config.max_depth {
                        pending.push((child.id, depth + 1));
                    } else {
                        warn!(folder_id = %child.id, "Skipping Drive folder beyond max depth");
                    }
                } else if child.is_video() {
                    videos.push(child);
                }
            }
        }

        Ok(videos)
    }

    /// Resolve links to files, crawling folders. Each file appears once,
    /// at the position of its first occurrence.
    pub async fn resolve(&self, links: &[DriveLink]) -> ProviderResult<Vec<DriveFile>> {
        let mut files = Vec::new();
        for link in links {
            match link {
                DriveLink::Folder(id) => files.extend(self.crawl_folder(id).await?),
                DriveLink::File(id) | DriveLink::Unknown(id) => {
                    let file = self.file_metadata(id).await?;
                    if file.is_folder() {
                        files.extend(self.crawl_folder(&file.id).await?);
                    } else {
                        files.push(file);
                    }
                }
            }
        }

        let total = files.len();
        let files = dedupe_by_key(files, |f| f.id.clone());
        info!(links = links.len(), files = files.len(), duplicates = total - files.len(), "Resolved Drive links");
        Ok(files)
    }

    /// Start downloading a file's content.
    pub async fn download(&self, file_id: &str) -> ProviderResult<DriveDownload> {
        let url = self.url(&format!("files/{}", urlencoding::encode(file_id)));
        let request = self.request(&url, &[("alt", "media"), ("supportsAllDrives", "true")]).await?;
        let response = Self::send(request).await?;
        Ok(DriveDownload {
            response,
            idle_timeout: self.config.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> DriveClient {
        DriveClient::new(DriveConfig {
            api_base: server.uri(),
            page_size: 2,
            max_depth: 5,
            timeout: Duration::from_secs(5),
            access_token: Some("tok".into()),
        })
        .await
        .unwrap()
    }

    fn file(id: &str, mime: &str) -> serde_json::Value {
        json!({ "id": id, "name": format!("{id}.bin"), "mimeType": mime, "size": "1024" })
    }

    async fn mount_children(server: &MockServer, folder: &str, files: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param("q", format!("'{folder}' in parents and trashed = false")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn metadata_parses_string_sizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/vid1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file("vid1", "video/mp4")))
            .mount(&server)
            .await;

        let meta = client(&server).await.file_metadata("vid1").await.unwrap();
        assert_eq!(meta.size_bytes, Some(1024));
        assert!(meta.is_video());
    }

    #[tokio::test]
    async fn listing_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [file("c", "video/mp4")] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [file("a", "video/mp4"), file("b", "video/mp4")],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let children = client(&server).await.list_children("root").await.unwrap();
        let ids: Vec<_> = children.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn resolve_dedupes_overlapping_inputs() {
        let server = MockServer::start().await;
        mount_children(
            &server,
            "folderA",
            vec![file("v1", "video/mp4"), file("doc", "application/pdf"), file("sub", FOLDER_MIME_TYPE)],
        )
        .await;
        mount_children(&server, "sub", vec![file("v2", "video/quicktime"), file("v1", "video/mp4")]).await;
        Mock::given(method("GET"))
            .and(path("/files/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file("v2", "video/quicktime")))
            .mount(&server)
            .await;

        let links = vec![
            DriveLink::Folder("folderA".into()),
            DriveLink::File("v2".into()),
            DriveLink::Folder("sub".into()),
        ];
        let files = client(&server).await.resolve(&links).await.unwrap();
        let mut ids: Vec<_> = files.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn unknown_link_to_folder_is_crawled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/fold1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file("fold1", FOLDER_MIME_TYPE)))
            .mount(&server)
            .await;
        mount_children(&server, "fold1", vec![file("v9", "video/mp4")]).await;

        let files = client(&server)
            .await
            .resolve(&[DriveLink::Unknown("fold1".into())])
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "v9");
    }

    #[tokio::test]
    async fn download_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/v1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;

        let mut download = client(&server).await.download("v1").await.unwrap();
        let mut total = 0;
        while let Some(chunk) = download.next_chunk().await.unwrap() {
            total += chunk.len();
        }
        assert_eq!(total, 64);
    }

    /// Serves one `alt=media` response whose body arrives in `pieces`
    /// separated by `gap`, then returns the address.
    async fn trickle_server(pieces: Vec<Vec<u8>>, declared: usize, gap: Duration) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\n\r\n");
            socket.write_all(head.as_bytes()).await.unwrap();
            for piece in pieces {
                tokio::time::sleep(gap).await;
                if socket.write_all(&piece).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        format!("http://{addr}")
    }

    async fn trickle_client(api_base: String) -> DriveClient {
        DriveClient::new(DriveConfig {
            api_base,
            page_size: 2,
            max_depth: 5,
            timeout: Duration::from_secs(1),
            access_token: Some("tok".into()),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn slow_download_outlives_request_timeout() {
        let base = trickle_server(vec![vec![1u8; 10]; 3], 30, Duration::from_millis(700)).await;

        let mut download = trickle_client(base).await.download("big").await.unwrap();
        let mut total = 0;
        while let Some(chunk) = download.next_chunk().await.unwrap() {
            total += chunk.len();
        }
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn stalled_download_fails_after_idle_timeout() {
        let base = trickle_server(vec![vec![1u8; 10]], 30, Duration::from_millis(50)).await;

        let mut download = trickle_client(base).await.download("stuck").await.unwrap();
        let mut total = 0;
        let err = loop {
            match download.next_chunk().await {
                Ok(Some(chunk)) => total += chunk.len(),
                Ok(None) => panic!("stream ended early"),
                Err(e) => break e,
            }
        };
        assert_eq!(total, 10);
        assert!(matches!(err, ProviderError::Stalled { service: "drive", seconds: 1 }));
    }
}
