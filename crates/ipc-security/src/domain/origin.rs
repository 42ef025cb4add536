//! # Origin Validation
//!
//! Baseline trust check run for every intercepted call, policed or not.
//! A caller is trusted only while it is still attached and its document was
//! loaded from one of the application's own schemes (packaged resources or
//! local files). Development servers are allowed only by exact origin.

use super::errors::SecurityViolation;
use crate::ports::outbound::CallerHandle;

/// Default trusted schemes: packaged-resource scheme and local files.
pub const DEFAULT_TRUSTED_SCHEMES: &[&str] = &["app", "file"];

/// Why a caller failed the origin check. Logged, never returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRejection {
    /// The calling surface was destroyed or detached.
    Detached,
    /// The caller exposes no document URL.
    MissingOrigin,
    /// The URL has no parseable scheme.
    Unparseable(String),
    /// Parsed fine, but the scheme or origin is not trusted.
    Untrusted(String),
}

impl std::fmt::Display for OriginRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detached => f.write_str("caller detached"),
            Self::MissingOrigin => f.write_str("caller has no origin"),
            Self::Unparseable(url) => write!(f, "unparseable origin '{url}'"),
            Self::Untrusted(url) => write!(f, "untrusted origin '{url}'"),
        }
    }
}

impl From<OriginRejection> for SecurityViolation {
    fn from(rejection: OriginRejection) -> Self {
        SecurityViolation::OriginRejected {
            reason: rejection.to_string(),
        }
    }
}

/// Decides whether an inbound call comes from the trusted front-end.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    trusted_schemes: Vec<String>,
    dev_origins: Vec<String>,
}

impl OriginValidator {
    pub fn new<S, D>(trusted_schemes: S, dev_origins: D) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            trusted_schemes: trusted_schemes
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
            dev_origins: dev_origins
                .into_iter()
                .map(|o| o.as_ref().trim_end_matches('/').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_trusted(&self, caller: &dyn CallerHandle) -> bool {
        self.check(caller).is_ok()
    }

    /// Same decision as [`Self::is_trusted`], with the reason on failure.
    pub fn check(&self, caller: &dyn CallerHandle) -> Result<(), OriginRejection> {
        if !caller.is_attached() {
            return Err(OriginRejection::Detached);
        }

        let url = caller.origin_url().ok_or(OriginRejection::MissingOrigin)?;
        let (scheme, rest) =
            split_scheme(&url).ok_or_else(|| OriginRejection::Unparseable(url.clone()))?;

        // Trusted schemes must be hierarchical ("app://", "file://"); this
        // excludes opaque forms such as "file:foo".
        if rest.starts_with("//") && self.trusted_schemes.iter().any(|s| *s == scheme) {
            return Ok(());
        }

        if !self.dev_origins.is_empty() {
            if let Some(origin) = origin_of(&scheme, rest) {
                if self.dev_origins.iter().any(|o| *o == origin) {
                    return Ok(());
                }
            }
        }

        Err(OriginRejection::Untrusted(url))
    }
}

impl Default for OriginValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_SCHEMES.iter(), std::iter::empty::<&str>())
    }
}

/// Split an absolute URL into its lowercased scheme and the remainder after ':'.
fn split_scheme(url: &str) -> Option<(String, &str)> {
    let (scheme, rest) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme.to_ascii_lowercase(), rest))
}

/// `scheme://authority`, cut at the first path, query or fragment delimiter.
fn origin_of(scheme: &str, rest: &str) -> Option<String> {
    let authority = rest.strip_prefix("//")?;
    let end = authority
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(authority.len());
    let authority = &authority[..end];
    if authority.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{}", authority.to_ascii_lowercase()))
}
