pub mod endpoint;

use crate::error::Error;
use crate::model::{RawReading, SourceMode};
use crate::settings::Settings;
use serde_json::Value;

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where one telemetry reading comes from. Each `fetch` performs exactly one read.
#[derive(Debug, Clone)]
pub enum Source {
    Live { client: reqwest::Client, url: String },
    Fixture(PathBuf),
}

impl Source {
    pub fn live(dtu_url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Unable to build HTTP client: {}", e)))?;

        Ok(Source::Live {
            client,
            url: format!("{}{}", dtu_url.trim_end_matches('/'), endpoint::REAL_DATA),
        })
    }

    pub fn fixture<P: Into<PathBuf>>(path: P) -> Self {
        Source::Fixture(path.into())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        match settings.source {
            SourceMode::Live => Source::live(
                &settings.dtu_url,
                Duration::from_secs(settings.timeout_secs),
            ),
            SourceMode::Fixture => Ok(Source::fixture(&settings.fixture_path)),
        }
    }

    pub async fn fetch(&self) -> Result<RawReading, Error> {
        match self {
            Source::Live { client, url } => fetch_live(client, url).await,
            Source::Fixture(path) => fetch_fixture(path).await,
        }
    }
}

/// Map transport-level failures to `SourceUnavailable`, keeping the cause readable.
fn map_source_err(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        return Error::SourceUnavailable(format!("DTU request timed out: {}", error));
    }
    match error.status() {
        Some(http::StatusCode::NOT_FOUND) => {
            Error::SourceUnavailable(format!("DTU endpoint not found: {}", error))
        }
        _ => Error::SourceUnavailable(error.to_string()),
    }
}

fn parse_document(text: &str) -> Result<RawReading, Error> {
    serde_json::from_str::<Value>(text)
        .map(RawReading::Json)
        .map_err(|e| Error::SourceUnavailable(format!("Invalid JSON from source: {}", e)))
}

async fn fetch_live(client: &reqwest::Client, url: &str) -> Result<RawReading, Error> {
    let text = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(map_source_err)?
        .text()
        .await
        .map_err(|e| Error::SourceUnavailable(format!("Error reading DTU response: {}", e)))?;

    log::trace!("url: {}, response_text: {}", url, text);

    parse_document(&text)
}

async fn fetch_fixture(path: &Path) -> Result<RawReading, Error> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::SourceUnavailable(format!("Unable to read fixture {}: {}", path.display(), e))
    })?;

    parse_document(&text)
}
