//! Remote key and public URL normalization
//!
//! `UrlNormalizer` is the only place that turns a remote key into a public URL
//! and the only place that decides whether a persisted URL is safe to serve.
//! Validation parses the URL and matches it against an explicit allow-list
//! (the public base and the placeholder image base) instead of relying on
//! substring heuristics alone.

use std::fmt::{Display, Formatter, Result as FmtResult};

use url::Url;

use crate::config::{Config, PipelineConfig};
use crate::error::AppError;
use crate::models::Bucket;

/// Relative paths rooted here are assumed to live under the public base.
const RELATIVE_UPLOADS_PREFIX: &str = "uploads/";
const DEFAULT_PLACEHOLDER_LABEL: &str = "No Image";

/// Why a URL failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Empty,
    /// Contains a local filesystem fragment such as `/Users/`.
    LocalPath(String),
    Unparseable,
    /// Points at a known placeholder or example domain.
    BlockedHost(String),
    /// Well-formed but not under the current public base.
    OutsidePublicBase,
}

impl Display for InvalidReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            InvalidReason::Empty => write!(f, "empty url"),
            InvalidReason::LocalPath(marker) => write!(f, "local path fragment {}", marker),
            InvalidReason::Unparseable => write!(f, "not an absolute url"),
            InvalidReason::BlockedHost(host) => write!(f, "blocked host {}", host),
            InvalidReason::OutsidePublicBase => write!(f, "outside public base"),
        }
    }
}

/// Classification of a persisted URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlVerdict {
    /// `{public_base}/{key}`
    Canonical,
    /// A placeholder produced by [`UrlNormalizer::placeholder_url`].
    Placeholder,
    Invalid(InvalidReason),
}

impl UrlVerdict {
    pub fn is_valid(&self) -> bool {
        !matches!(self, UrlVerdict::Invalid(_))
    }
}

/// Check that `key` has the `bucket/filename` shape produced at transfer time.
pub fn check_remote_key(key: &str) -> Result<(), AppError> {
    let invalid = |why: &str| AppError::InvalidInput(format!("Invalid remote key {:?}: {}", key, why));

    if key.contains('\\') || key.contains("..") {
        return Err(invalid("path traversal"));
    }
    let (bucket, filename) = key
        .split_once('/')
        .ok_or_else(|| invalid("expected bucket/filename"))?;
    if filename.contains('/') {
        return Err(invalid("nested paths are not allowed"));
    }
    Bucket::new(bucket).map_err(|_| invalid("bad bucket"))?;
    if filename.is_empty()
        || !filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(invalid("bad filename"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    public_base: String,
    public_base_url: Url,
    placeholder_base: String,
    placeholder_base_url: Url,
    legacy_bases: Vec<String>,
    blocked_hosts: Vec<String>,
    local_markers: Vec<String>,
}

impl UrlNormalizer {
    pub fn new(public_base: &str, placeholder_base: &str) -> Result<Self, AppError> {
        let public_base = public_base.trim_end_matches('/').to_string();
        let placeholder_base = placeholder_base.trim_end_matches('/').to_string();
        let public_base_url = Url::parse(&public_base)
            .map_err(|e| AppError::InvalidInput(format!("Invalid public base: {}", e)))?;
        let placeholder_base_url = Url::parse(&placeholder_base)
            .map_err(|e| AppError::InvalidInput(format!("Invalid placeholder base: {}", e)))?;

        Ok(Self {
            public_base,
            public_base_url,
            placeholder_base,
            placeholder_base_url,
            legacy_bases: Vec::new(),
            blocked_hosts: Vec::new(),
            local_markers: Vec::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::from_pipeline(&config.0)
    }

    pub(crate) fn from_pipeline(config: &PipelineConfig) -> Result<Self, AppError> {
        Ok(Self::new(&config.public_base_url, &config.placeholder_image_base)?
            .with_legacy_bases(config.legacy_public_bases.clone())
            .with_blocked_hosts(config.blocked_placeholder_hosts.clone())
            .with_local_markers(config.local_path_markers.clone()))
    }

    pub fn with_legacy_bases(mut self, bases: Vec<String>) -> Self {
        self.legacy_bases = bases
            .into_iter()
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .collect();
        self
    }

    pub fn with_blocked_hosts(mut self, hosts: Vec<String>) -> Self {
        self.blocked_hosts = hosts.into_iter().map(|h| h.to_lowercase()).collect();
        self
    }

    pub fn with_local_markers(mut self, markers: Vec<String>) -> Self {
        self.local_markers = markers.into_iter().filter(|m| !m.is_empty()).collect();
        self
    }

    pub fn public_base(&self) -> &str {
        &self.public_base
    }

    /// `{public_base}/{remote_key}`
    pub fn canonical_url(&self, remote_key: &str) -> String {
        format!("{}/{}", self.public_base, remote_key.trim_start_matches('/'))
    }

    /// Deterministic placeholder image URL labelled with `label`.
    pub fn placeholder_url(&self, label: Option<&str>) -> String {
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_PLACEHOLDER_LABEL);
        format!(
            "{}?text={}",
            self.placeholder_base,
            urlencoding::encode(label)
        )
    }

    pub fn classify(&self, url: &str) -> UrlVerdict {
        let url = url.trim();
        if url.is_empty() {
            return UrlVerdict::Invalid(InvalidReason::Empty);
        }

        if let Some(marker) = self.local_markers.iter().find(|m| url.contains(m.as_str())) {
            return UrlVerdict::Invalid(InvalidReason::LocalPath(marker.clone()));
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return UrlVerdict::Invalid(InvalidReason::Unparseable),
        };

        if is_under(&parsed, &self.public_base_url, true) {
            return UrlVerdict::Canonical;
        }
        if is_under(&parsed, &self.placeholder_base_url, false) {
            return UrlVerdict::Placeholder;
        }

        if let Some(host) = parsed.host_str() {
            let host = host.to_lowercase();
            let blocked = self.blocked_hosts.iter().any(|blocked| {
                host == *blocked || host.ends_with(&format!(".{}", blocked))
            });
            if blocked {
                return UrlVerdict::Invalid(InvalidReason::BlockedHost(host));
            }
        }

        UrlVerdict::Invalid(InvalidReason::OutsidePublicBase)
    }

    /// True for canonical URLs and for placeholders this normalizer produced.
    pub fn is_valid(&self, url: &str) -> bool {
        self.classify(url).is_valid()
    }

    /// Best-effort correction of an invalid URL.
    ///
    /// Valid URLs are returned unchanged. Legacy base prefixes are rewritten to
    /// the current public base, relative `uploads/` paths get the public base
    /// prepended, and anything else becomes a placeholder labelled with `label`.
    pub fn repair(&self, url: &str, label: Option<&str>) -> String {
        let trimmed = url.trim();
        if self.is_valid(trimmed) {
            return trimmed.to_string();
        }

        self.rewrite_legacy(trimmed)
            .or_else(|| self.rewrite_relative(trimmed))
            .filter(|candidate| self.classify(candidate) == UrlVerdict::Canonical)
            .unwrap_or_else(|| self.placeholder_url(label))
    }

    /// Repair a stored record, returning the new URL when a change is needed.
    ///
    /// A well-formed stored key wins over any heuristic on the URL itself.
    pub fn repair_record(
        &self,
        url: Option<&str>,
        key: Option<&str>,
        label: Option<&str>,
    ) -> Option<String> {
        if let Some(url) = url {
            if self.is_valid(url) {
                return None;
            }
        }

        if let Some(key) = key.map(str::trim).filter(|k| check_remote_key(k).is_ok()) {
            return Some(self.canonical_url(key));
        }

        Some(self.repair(url.unwrap_or_default(), label))
    }

    fn rewrite_legacy(&self, url: &str) -> Option<String> {
        self.legacy_bases.iter().find_map(|legacy| {
            url.strip_prefix(legacy.as_str())
                .filter(|rest| rest.starts_with('/') && rest.len() > 1)
                .map(|rest| format!("{}{}", self.public_base, rest))
        })
    }

    fn rewrite_relative(&self, url: &str) -> Option<String> {
        url.trim_start_matches("./")
            .trim_start_matches('/')
            .strip_prefix(RELATIVE_UPLOADS_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(|rest| self.canonical_url(rest))
    }
}

/// Same origin and, when `require_child`, a path strictly below `base`.
fn is_under(candidate: &Url, base: &Url, require_child: bool) -> bool {
    if candidate.scheme() != base.scheme()
        || candidate.host_str() != base.host_str()
        || candidate.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    let base_path = base.path().trim_end_matches('/');
    let path = candidate.path();
    if require_child {
        path.strip_prefix(base_path)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|rest| !rest.is_empty())
    } else {
        path.trim_end_matches('/') == base_path
            || path.starts_with(&format!("{}/", base_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> UrlNormalizer {
        UrlNormalizer::new("https://cdn.example.com/uploads", "https://placehold.co/800x600")
            .unwrap()
            .with_legacy_bases(vec![
                "http://old-host.example.net/uploads".to_string(),
                "https://s3.amazonaws.com/motorlot-legacy".to_string(),
            ])
            .with_blocked_hosts(vec![
                "example.com".to_string(),
                "via.placeholder.com".to_string(),
            ])
            .with_local_markers(vec!["/Users/".to_string(), "/Desktop/".to_string()])
    }

    #[test]
    fn canonical_url_joins_base_and_key() {
        let n = normalizer();
        assert_eq!(
            n.canonical_url("vehicles/ab12cd34.jpg"),
            "https://cdn.example.com/uploads/vehicles/ab12cd34.jpg"
        );
    }

    #[test]
    fn local_paths_are_invalid() {
        let n = normalizer();
        assert!(!n.is_valid("/Users/alice/Desktop/car.jpg"));
        assert_eq!(
            n.classify("https://cdn.example.com/uploads//Users/alice/car.jpg"),
            UrlVerdict::Invalid(InvalidReason::LocalPath("/Users/".to_string()))
        );
    }

    #[test]
    fn public_base_wins_over_blocked_parent_domain() {
        let n = normalizer();
        assert!(n.is_valid("https://cdn.example.com/uploads/vehicles/ab12cd34.jpg"));
        assert_eq!(
            n.classify("https://www.example.com/car.jpg"),
            UrlVerdict::Invalid(InvalidReason::BlockedHost("www.example.com".to_string()))
        );
    }

    #[test]
    fn prefix_match_respects_segment_boundary() {
        let n = normalizer();
        assert!(!n.is_valid("https://cdn.example.com/uploads-old/vehicles/a.jpg"));
        assert!(!n.is_valid("https://cdn.example.com/uploads/"));
        assert!(!n.is_valid("http://cdn.example.com/uploads/vehicles/a.jpg"));
        assert!(!n.is_valid(""));
        assert!(!n.is_valid("   "));
    }

    #[test]
    fn repair_rewrites_legacy_prefix() {
        let n = normalizer();
        assert_eq!(
            n.repair("http://old-host.example.net/uploads/brands/ff00.png", None),
            "https://cdn.example.com/uploads/brands/ff00.png"
        );
    }

    #[test]
    fn repair_prepends_base_to_relative_upload_paths() {
        let n = normalizer();
        assert_eq!(
            n.repair("/uploads/vehicles/ab12.jpg", None),
            "https://cdn.example.com/uploads/vehicles/ab12.jpg"
        );
        assert_eq!(
            n.repair("uploads/vehicles/ab12.jpg", None),
            "https://cdn.example.com/uploads/vehicles/ab12.jpg"
        );
    }

    #[test]
    fn repair_falls_back_to_labelled_placeholder() {
        let n = normalizer();
        let repaired = n.repair("/Users/alice/Desktop/car.jpg", Some("Toyota Corolla"));
        assert_eq!(repaired, "https://placehold.co/800x600?text=Toyota%20Corolla");
        assert_eq!(n.classify(&repaired), UrlVerdict::Placeholder);
        assert_eq!(n.repair(&repaired, Some("Other")), repaired);
    }

    #[test]
    fn repair_record_prefers_stored_key() {
        let n = normalizer();
        assert_eq!(
            n.repair_record(Some("/Users/bob/x.jpg"), Some("vehicles/0a1b.jpg"), None),
            Some("https://cdn.example.com/uploads/vehicles/0a1b.jpg".to_string())
        );
        assert_eq!(
            n.repair_record(Some("https://cdn.example.com/uploads/vehicles/0a1b.jpg"), None, None),
            None
        );
        assert_eq!(
            n.repair_record(None, Some("../etc/passwd"), Some("Audi")),
            Some("https://placehold.co/800x600?text=Audi".to_string())
        );
    }

    #[test]
    fn remote_key_shape() {
        assert!(check_remote_key("vehicles/0a1b2c.jpg").is_ok());
        assert!(check_remote_key("vehicles").is_err());
        assert!(check_remote_key("/vehicles/a.jpg").is_err());
        assert!(check_remote_key("vehicles/../a.jpg").is_err());
        assert!(check_remote_key("vehicles/a/b.jpg").is_err());
        assert!(check_remote_key("vehicles\\a.jpg").is_err());
        assert!(check_remote_key("vehicles/").is_err());
    }
}
