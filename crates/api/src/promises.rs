use std::time::Duration;

use pledge_types::{CompletePromise, CreatePromise, PromiseRecord};
use pledge_util::env_var_trimmed;
use reqwest::{Client, Method, RequestBuilder, Url, header};
use tracing::debug;

use crate::{ApiError, base_url, bearer_headers, decode_json, user_agent};

pub const STORE_URL_ENV: &str = "PLEDGE_STORE_URL";
pub const STORE_TOKEN_ENV: &str = "PLEDGE_STORE_TOKEN";
pub const DEFAULT_STORE_URL: &str = "http://localhost:8001";

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const STRICT_HEADER: &str = "strict";

#[derive(Debug, Clone)]
/// REST client for the durable promise store.
///
/// The store owns persistence and completion semantics; this client only
/// speaks its wire format and reports non-success statuses verbatim.
pub struct PromiseStoreClient {
    pub base_url: Url,
    pub http: Client,
    pub user_agent: String,
}

impl PromiseStoreClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, ApiError> {
        let normalized = base_url.trim().trim_end_matches('/');
        let base_url = base_url::validate_base_url(normalized, &[])?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(format!("'{normalized}' cannot be used as a base")));
        }

        let http = Client::builder()
            .default_headers(bearer_headers(token)?)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            http,
            user_agent: user_agent(),
        })
    }

    /// Construct a client from `PLEDGE_STORE_URL` (default `http://localhost:8001`)
    /// and the optional `PLEDGE_STORE_TOKEN`.
    pub fn from_env() -> Result<Self, ApiError> {
        let url = env_var_trimmed(STORE_URL_ENV).unwrap_or_else(|| DEFAULT_STORE_URL.to_string());
        let token = env_var_trimmed(STORE_TOKEN_ENV);
        Self::new(&url, token.as_deref())
    }

    /// Resolve the URL for a path below the store root, percent-encoding each segment.
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url_for(segments);
        debug!(%url, %method, "building promise store request");
        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// `POST /promises`
    pub async fn create(&self, body: &CreatePromise, idempotency_key: Option<&str>, strict: bool) -> Result<PromiseRecord, ApiError> {
        let mut request = self
            .request(Method::POST, &["promises"])
            .header(STRICT_HEADER, strict.to_string())
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        decode_json(request.send().await?).await
    }

    /// `PATCH /promises/{id}`
    pub async fn complete(
        &self,
        id: &str,
        body: &CompletePromise,
        idempotency_key: Option<&str>,
        strict: bool,
    ) -> Result<PromiseRecord, ApiError> {
        let mut request = self
            .request(Method::PATCH, &["promises", id])
            .header(STRICT_HEADER, strict.to_string())
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        decode_json(request.send().await?).await
    }

    /// `GET /promises/{id}`
    pub async fn get(&self, id: &str) -> Result<PromiseRecord, ApiError> {
        decode_json(self.request(Method::GET, &["promises", id]).send().await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promise_ids_are_percent_encoded_as_one_segment() {
        let client = PromiseStoreClient::new("http://localhost:8001/", None).expect("client");
        assert_eq!(client.url_for(&["promises", "foo.1"]).as_str(), "http://localhost:8001/promises/foo.1");
        assert_eq!(
            client.url_for(&["promises", "a/b c"]).as_str(),
            "http://localhost:8001/promises/a%2Fb%20c"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        let client = PromiseStoreClient::new("https://store.example.com/api", None).expect("client");
        assert_eq!(client.url_for(&["promises"]).as_str(), "https://store.example.com/api/promises");
    }

    #[test]
    fn rejects_plain_http_for_remote_hosts() {
        assert!(PromiseStoreClient::new("http://store.example.com", None).is_err());
    }

    #[test]
    fn from_env_defaults_to_local_store() {
        temp_env::with_vars([(STORE_URL_ENV, None::<&str>), (STORE_TOKEN_ENV, None)], || {
            let client = PromiseStoreClient::from_env().expect("client");
            assert_eq!(client.base_url.as_str(), "http://localhost:8001/");
        });
    }
}
