use crate::constants::UNKNOWN_VERSION;
use crate::core::AiupError;
use crate::update::transport::Fetcher;
use crate::update::verification::Sha256Digest;
use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

/// What the release endpoint says is current.
///
/// Produced fresh on every run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Where to download the artifact from.
    pub locator: String,
    /// Opaque version label, compared only for equality.
    pub version_label: String,
    /// Digest the artifact must hash to, when the endpoint provides one.
    pub expected_digest: Option<Sha256Digest>,
}

/// Wire format of the release metadata endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseMetadata {
    download_url: Option<String>,
    version: Option<String>,
    #[serde(alias = "checksum", alias = "sha256sum")]
    sha256: Option<String>,
}

/// Queries the release metadata endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    endpoint: String,
}

impl ReleaseResolver {
    /// Create a resolver for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// The metadata endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one metadata request and extract the release.
    ///
    /// # Errors
    ///
    /// [`AiupError::ResolutionFailed`] when the request fails, the body is not a
    /// JSON object of the expected shape, `downloadUrl` is missing or empty, or
    /// the advertised digest is malformed. A missing version is not an error;
    /// it becomes `"unknown"`.
    pub async fn resolve<F: Fetcher>(&self, fetcher: &F) -> Result<ReleaseInfo> {
        debug!("Fetching release metadata from {}", self.endpoint);

        let body = fetcher
            .get_json_text(&self.endpoint)
            .await
            .map_err(|e| self.failure(format!("{e:#}")))?;

        let release = self.parse(&body)?;
        info!(
            version = %release.version_label,
            has_digest = release.expected_digest.is_some(),
            "Resolved release"
        );
        Ok(release)
    }

    fn parse(&self, body: &str) -> Result<ReleaseInfo, AiupError> {
        let metadata: ReleaseMetadata = serde_json::from_str(body)
            .map_err(|e| self.failure(format!("invalid JSON response: {e}")))?;

        let locator = metadata
            .download_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| self.failure("downloadUrl not found in response".to_string()))?;

        let version_label = metadata
            .version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        let expected_digest = match metadata.sha256.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Sha256Digest>()
                    .map_err(|e| self.failure(format!("invalid sha256 in response: {e}")))?,
            ),
        };

        Ok(ReleaseInfo {
            locator,
            version_label,
            expected_digest,
        })
    }

    fn failure(&self, reason: String) -> AiupError {
        AiupError::ResolutionFailed {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}
