//! Source locator validation.
//!
//! Reachability is not checked here; a locator that passes validation can
//! still fail at acquisition time.

use crate::provision::ProvisionError;
use serde::Serialize;
use url::Url;

/// Recognized disk image extensions (matched case-insensitively on the path).
pub const IMAGE_EXTENSIONS: &[&str] = &[".img", ".qcow2", ".raw"];

/// Accept or reject a candidate locator.
///
/// Accepts only if the locator parses, has a scheme and a host, and its path
/// ends with a recognized image extension. Unparsable input is a reject.
pub fn validate_source(locator: &str) -> bool {
    Url::parse(locator.trim())
        .ok()
        .is_some_and(|url| is_image_url(&url))
}

fn is_image_url(url: &Url) -> bool {
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    let path = url.path().to_ascii_lowercase();
    let has_extension = IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext));

    !url.scheme().is_empty() && has_host && has_extension
}

/// A locator that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocator {
    url: Url,
}

impl SourceLocator {
    pub fn parse(locator: &str) -> Result<Self, ProvisionError> {
        let invalid = || ProvisionError::InvalidSource {
            locator: locator.to_string(),
        };

        let url = Url::parse(locator.trim()).map_err(|_| invalid())?;
        if !is_image_url(&url) {
            return Err(invalid());
        }

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Last path segment; names the local cache slot.
    pub fn file_name(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// What one run provisions. Immutable once validated.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionRequest {
    pub source: SourceLocator,
    /// Storage backend the disk is imported into.
    pub storage: String,
}

impl ProvisionRequest {
    pub fn new(locator: &str, storage: impl Into<String>) -> Result<Self, ProvisionError> {
        let storage = storage.into();
        if storage.trim().is_empty() {
            return Err(ProvisionError::Runtime(
                cloudplate_shared::CloudplateError::InvalidArgument(
                    "storage backend must not be empty".into(),
                ),
            ));
        }

        Ok(Self {
            source: SourceLocator::parse(locator)?,
            storage,
        })
    }
}
