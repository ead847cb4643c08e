use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info};

use crate::core::errors::SourceError;

const DRIVE_HOST: &str = "drive.google.com";

/// Where the input image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(Url),
}

impl ImageSource {
    /// Interpret a command-line argument.
    ///
    /// Drive share links are rewritten to their direct download URL; other
    /// `http(s)` URLs are fetched as they are; `file` URLs and anything that
    /// does not parse as a URL are local paths.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => match drive_file_id(&url) {
                Some(file_id) => ImageSource::Url(drive_download_url(&url, &file_id)),
                None => ImageSource::Url(url),
            },
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => ImageSource::Path(path),
                Err(()) => ImageSource::Path(PathBuf::from(input)),
            },
            _ => ImageSource::Path(PathBuf::from(input)),
        }
    }

    /// Fetch the raw image bytes
    pub async fn load(&self, timeout: Duration) -> Result<Vec<u8>, SourceError> {
        match self {
            ImageSource::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                debug!(path = %path.display(), bytes = bytes.len(), "Read local image");
                Ok(bytes)
            }
            ImageSource::Url(url) => {
                let client = reqwest::Client::builder().timeout(timeout).build()?;
                let response = client.get(url.clone()).send().await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::BadStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }

                let bytes = response.bytes().await?.to_vec();
                info!(%url, bytes = bytes.len(), "Downloaded image");
                Ok(bytes)
            }
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => f.write_str(url.as_str()),
        }
    }
}

/// File id of a Drive share link: `/file/d/<id>/...` or `/open?id=<id>`
fn drive_file_id(url: &Url) -> Option<String> {
    if url.host_str() != Some(DRIVE_HOST) {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    let id = match segments.as_slice() {
        ["file", "d", id, ..] => Some(id.to_string()),
        ["open"] | ["uc"] => url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned()),
        _ => None,
    }?;

    (!id.is_empty()).then_some(id)
}

/// `https://drive.google.com/uc?export=download&id=<id>`
fn drive_download_url(share_link: &Url, file_id: &str) -> Url {
    let mut url = share_link.clone();
    url.set_path("/uc");
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("export", "download")
        .append_pair("id", file_id);
    // Both calls only fail for cannot-be-a-base or non-special URLs
    let _ = url.set_port(None);
    let _ = url.set_scheme("https");
    url
}
