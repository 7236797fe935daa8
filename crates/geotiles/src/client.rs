//! HTTP client for fetching tileset manifests.
//!
//! Tile content (glTF, textures) is fetched by whatever content handler the
//! caller registers; this client only deals with `tileset.json` documents,
//! including external tilesets referenced from tile content.

use reqwest::Url;

use crate::error::{Error, Result};
use crate::types::Tileset;

/// A parsed manifest together with the URL it was fetched from.
///
/// The URL is the base against which the manifest's relative content URIs resolve.
#[derive(Debug, Clone)]
pub struct LoadedTileset {
    pub tileset: Tileset,
    pub url: Url,
}

/// HTTP client for tileset manifests.
///
/// Works on native (Tokio via reqwest) and WASM (browser fetch). The returned
/// futures are runtime-agnostic.
#[derive(Debug, Clone, Default)]
pub struct Client {
    http: reqwest::Client,
}

impl Client {
    /// Create a client with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client around a preconfigured reqwest client.
    #[must_use]
    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch and parse a manifest from a URL string.
    pub async fn fetch_tileset(&self, url: &str) -> Result<LoadedTileset> {
        let url = Url::parse(url).map_err(|e| Error::InvalidData {
            context: "tileset url",
            detail: format!("{url}: {e}"),
        })?;
        self.fetch_tileset_url(url).await
    }

    /// Fetch and parse a manifest.
    pub async fn fetch_tileset_url(&self, url: Url) -> Result<LoadedTileset> {
        let data = self.fetch_bytes(&url).await?;
        let tileset = Tileset::from_slice(&data)?;
        tracing::debug!(%url, version = %tileset.asset.version, "parsed tileset");
        Ok(LoadedTileset { tileset, url })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        tracing::debug!(%url, "fetching");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let data = response.bytes().await.map_err(|e| Error::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single HTTP response on a local port and return the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}")
    }

    const MANIFEST: &str = r#"{
        "asset": { "version": "1.1" },
        "geometricError": 10.0,
        "root": {
            "boundingVolume": { "sphere": [1, 2, 3, 4] },
            "geometricError": 1.0,
            "content": { "uri": "root.glb" }
        }
    }"#;

    #[tokio::test]
    async fn test_fetch_tileset() {
        let base = serve_once("HTTP/1.1 200 OK", MANIFEST).await;
        let client = Client::new();

        let loaded = client
            .fetch_tileset(&format!("{base}/data/tileset.json"))
            .await
            .unwrap();
        assert_eq!(loaded.tileset.asset.version, "1.1");
        assert_eq!(loaded.url.path(), "/data/tileset.json");
    }

    #[tokio::test]
    async fn test_fetch_tileset_http_status() {
        let base = serve_once("HTTP/1.1 404 Not Found", "{}").await;
        let client = Client::new();

        let result = client.fetch_tileset(&format!("{base}/missing.json")).await;
        assert!(matches!(result, Err(Error::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_fetch_tileset_bad_json() {
        let base = serve_once("HTTP/1.1 200 OK", "not json").await;
        let client = Client::new();

        let result = client.fetch_tileset(&format!("{base}/tileset.json")).await;
        assert!(matches!(result, Err(Error::Json { .. })));
    }

    #[tokio::test]
    async fn test_fetch_tileset_invalid_url() {
        let client = Client::new();
        let result = client.fetch_tileset("not a url").await;
        assert!(matches!(
            result,
            Err(Error::InvalidData {
                context: "tileset url",
                ..
            })
        ));
    }
}
