use reqwest::Url;

use crate::ApiError;

/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Normalize a configured base URL.
///
/// Workspace hosts are commonly configured without a scheme
/// (`adb-123.azuredatabricks.net`), so a missing scheme defaults to HTTPS.
/// Trailing slashes are dropped so paths can be appended directly.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Validate that a base URL is acceptable for use by a client.
///
/// Rules:
/// - `localhost` or loopback: any scheme is allowed
/// - otherwise: scheme must be HTTPS
/// - when `allowed_domains` is non-empty, the host must be one of them or a subdomain
pub fn validate_base_url(base: &str, allowed_domains: &[&str]) -> Result<Url, ApiError> {
    let url = Url::parse(base).map_err(|error| ApiError::InvalidBaseUrl(format!("'{base}': {error}")))?;
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return Err(ApiError::InvalidBaseUrl(format!("'{base}' must include a host")));
    };

    if LOCALHOST_DOMAINS.contains(&host.as_str()) {
        return Ok(url);
    }
    if url.scheme() != "https" {
        return Err(ApiError::InvalidBaseUrl(format!(
            "'{base}' must use https for non-localhost hosts; got '{}://'",
            url.scheme()
        )));
    }

    let within = |domain: &&str| host == *domain || host.ends_with(&format!(".{domain}"));
    if !allowed_domains.is_empty() && !allowed_domains.iter().any(within) {
        return Err(ApiError::InvalidBaseUrl(format!(
            "host '{host}' is not allowed; expected one of {allowed_domains:?}, a subdomain, or localhost"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAINS: &[&str] = &["cloud.databricks.com"];

    #[test]
    fn normalizes_bare_hosts_to_https() {
        assert_eq!(normalize_base_url("dbc-1.cloud.databricks.com/"), "https://dbc-1.cloud.databricks.com");
        assert_eq!(normalize_base_url("http://localhost:8001"), "http://localhost:8001");
    }

    #[test]
    fn localhost_allows_any_scheme() {
        assert!(validate_base_url("http://localhost:8001", DOMAINS).is_ok());
        assert!(validate_base_url("http://127.0.0.1:9000", DOMAINS).is_ok());
    }

    #[test]
    fn remote_hosts_require_https() {
        let error = validate_base_url("http://dbc-1.cloud.databricks.com", DOMAINS).unwrap_err();
        assert!(error.to_string().contains("must use https"));
    }

    #[test]
    fn remote_hosts_must_match_allowed_domains() {
        assert!(validate_base_url("https://dbc-1.cloud.databricks.com", DOMAINS).is_ok());
        assert!(validate_base_url("https://cloud.databricks.com.evil.example", DOMAINS).is_err());
    }

    #[test]
    fn empty_allow_list_accepts_any_https_host() {
        assert!(validate_base_url("https://promises.internal.example", &[]).is_ok());
    }
}
