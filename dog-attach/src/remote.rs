use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Url};
use tracing::{debug, instrument};

use crate::{ByteStream, DownloadError, DownloadResult, FetchConfig, StorageResult, Uploadable};

/// Fetches remote URLs into uploadables, following a bounded number of redirects.
///
/// Redirects are followed by hand with a plain countdown, so a URL that
/// redirects to itself fails after `max_redirects` hops.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
    config: FetchConfig,
}

impl RemoteFetcher {
    pub fn new(config: FetchConfig) -> DownloadResult<Self> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET `url` and buffer the body.
    pub async fn fetch(&self, url: &str) -> DownloadResult<RemoteFile> {
        self.fetch_limited(url, None).await
    }

    /// GET `url`, giving up with `TooLarge` once the body exceeds `max_size`.
    ///
    /// A declared Content-Length over the limit fails before the body is read.
    #[instrument(skip(self), fields(max_redirects = self.config.max_redirects))]
    pub async fn fetch_limited(
        &self,
        url: &str,
        max_size: Option<u64>,
    ) -> DownloadResult<RemoteFile> {
        let requested = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(requested.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", requested.scheme()),
            });
        }

        let mut current = requested.clone();
        let mut redirects_left = self.config.max_redirects;

        let mut response = loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| DownloadError::from_reqwest(current.as_str(), e))?;

            if !response.status().is_redirection() {
                break response;
            }

            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| current.join(location).ok())
                .ok_or_else(|| DownloadError::MissingLocation {
                    url: current.to_string(),
                })?;

            if redirects_left == 0 {
                return Err(DownloadError::MaxRedirectsReached {
                    url: url.to_string(),
                    limit: self.config.max_redirects,
                });
            }
            redirects_left -= 1;

            debug!(from = %current, to = %next, status = %response.status(), "Following redirect");
            current = next;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: current.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let declared_size = response.content_length();
        let too_large = |limit| DownloadError::TooLarge {
            url: current.to_string(),
            limit,
        };

        if let (Some(limit), Some(declared)) = (max_size, declared_size) {
            if declared > limit {
                return Err(too_large(limit));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::from_reqwest(current.as_str(), e))?
        {
            body.extend_from_slice(&chunk);
            if let Some(limit) = max_size {
                if body.len() as u64 > limit {
                    return Err(too_large(limit));
                }
            }
        }
        let data = body.freeze();

        debug!(url = %current, size = data.len(), declared_size = ?declared_size, "Fetched remote file");

        Ok(RemoteFile {
            filename: filename_from_url(&requested),
            size: declared_size.unwrap_or(data.len() as u64),
            url: current.to_string(),
            content_type,
            data,
        })
    }
}

/// Last non-empty path segment, percent-decoded
fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded)
}

/// A downloaded body, ready to be cached like any other upload
#[derive(Debug, Clone)]
pub struct RemoteFile {
    url: String,
    data: Bytes,
    size: u64,
    filename: Option<String>,
    content_type: Option<String>,
}

impl RemoteFile {
    /// Final URL after redirects
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl Uploadable for RemoteFile {
    /// Content-Length when the server sent one, else the body length
    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self) -> StorageResult<ByteStream> {
        let data = self.data.clone();
        Ok(Box::pin(futures_util::stream::once(async move { Ok(data) })))
    }

    fn original_filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}
