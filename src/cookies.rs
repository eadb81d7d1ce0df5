//! Parsing of the browser cookie string used to authenticate the crawl.

use thiserror::Error;

/// Fragments that mark an unedited example value instead of a real cookie.
const PLACEHOLDER_MARKERS: &[&str] = &["在这里粘贴", "paste your cookie", "<cookie>", "changeme"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthConfigError {
    #[error("no cookie string configured; set FORUM_COOKIE")]
    Missing,
    #[error("cookie string is still the placeholder value; paste the real cookie")]
    Placeholder,
    #[error("cookie string contains no name=value pairs")]
    NoPairs,
}

/// A single `name=value` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePair {
    pub name: String,
    pub value: String,
}

/// Split a `name=value; name2=value2` header into cookie pairs.
///
/// Items without `=` are ignored, values may themselves contain `=`.
///
/// # Errors
///
/// Returns an error when the string is empty, still a placeholder, or holds
/// no usable pair.
pub fn parse_cookie_string(raw: Option<&str>) -> Result<Vec<CookiePair>, AuthConfigError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(AuthConfigError::Missing)?;

    let lower = raw.to_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(AuthConfigError::Placeholder);
    }

    let pairs: Vec<CookiePair> = raw
        .split(';')
        .filter_map(|item| item.split_once('='))
        .map(|(name, value)| CookiePair {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
        })
        .filter(|pair| !pair.name.is_empty())
        .collect();

    if pairs.is_empty() {
        return Err(AuthConfigError::NoPairs);
    }
    Ok(pairs)
}
