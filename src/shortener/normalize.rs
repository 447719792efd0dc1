//! URL canonicalization and target validation.
//!
//! `normalize` turns raw user input into the canonical form stored on a
//! link: scheme always present, host lower-cased, path/query/fragment
//! untouched. `check_target` applies the self-reference and private-network
//! guards on the shorten path; it is literal string matching only and does
//! not resolve DNS, so a public hostname that resolves to a private address
//! is not caught.

use url::Url;

use crate::error::{ServiceError, ServiceResult};

pub const MAX_URL_LENGTH: usize = 2048;

/// Canonicalize a raw URL string.
///
/// Idempotent: normalizing an already-canonical URL returns it unchanged.
pub fn normalize(raw: &str) -> ServiceResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation("URL cannot be empty.".to_string()));
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    if with_scheme.len() > MAX_URL_LENGTH {
        return Err(ServiceError::Validation(format!(
            "URL is too long. Maximum allowed length is {MAX_URL_LENGTH} characters."
        )));
    }

    let parsed = Url::parse(&with_scheme)
        .map_err(|_| ServiceError::Validation("Invalid URL format.".to_string()))?;

    if parsed.host_str().is_none() {
        return Err(ServiceError::Validation(
            "Invalid URL: missing host.".to_string(),
        ));
    }

    // Url serializes with the host lower-cased while leaving the
    // path/query/fragment bytes alone.
    Ok(parsed.into())
}

/// Reject targets that point back at this service or at private/internal
/// networks. `canonical` must already be the output of [`normalize`].
pub fn check_target(canonical: &str, public_base_url: &str) -> ServiceResult<()> {
    if !public_base_url.is_empty()
        && canonical
            .to_lowercase()
            .starts_with(&public_base_url.to_lowercase())
    {
        return Err(ServiceError::Validation(
            "Cannot shorten URLs pointing to this service.".to_string(),
        ));
    }

    let host = Url::parse(canonical)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    if let Some(host) = host {
        if is_private_host(&host) {
            return Err(ServiceError::Validation(
                "URLs pointing to private/internal networks are not allowed.".to_string(),
            ));
        }
    }

    Ok(())
}

fn is_private_host(host: &str) -> bool {
    if host == "localhost"
        || host.starts_with("127.")
        || host.starts_with("10.")
        || host.starts_with("192.168.")
    {
        return true;
    }

    // 172.16.0.0/12, matched literally: 172.(16-31).x.x
    if let Some(rest) = host.strip_prefix("172.") {
        if let Some((second, _)) = rest.split_once('.') {
            if let Ok(octet) = second.parse::<u8>() {
                return (16..=31).contains(&octet);
            }
        }
    }

    false
}
