//! Blocking HTTP client for a remote tracking service.
//!
//! Talks to the `/api/v1/records` routes served by `shotl serve`. The base
//! URL and API key come from the `tracking` section of the config file.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{TrackingError, TrackingSystem};
use crate::models::{NewRecord, Record};

#[derive(Debug, Clone)]
pub struct TrackingClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl TrackingClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of `segments` below the base URL, escaping each segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url, TrackingError> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| TrackingError::Unavailable(format!("invalid service URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| TrackingError::Unavailable("service URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, TrackingError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json()?)
        } else {
            Err(status_error(status, response.text().unwrap_or_default()))
        }
    }
}

fn status_error(status: StatusCode, body: String) -> TrackingError {
    match status {
        StatusCode::NOT_FOUND => TrackingError::NotFound(body),
        StatusCode::BAD_REQUEST => TrackingError::Rejected(body),
        StatusCode::UNAUTHORIZED => TrackingError::Unauthorized,
        _ => TrackingError::Unavailable(format!("{}: {}", status, body)),
    }
}

impl TrackingSystem for TrackingClient {
    fn create_record(&self, record: NewRecord) -> Result<Record, TrackingError> {
        let response = self
            .request(Method::POST, self.url(&["records"])?)
            .json(&record)
            .send()?;
        self.handle_response(response)
    }

    fn read_fields(
        &self,
        entity_type: &str,
        code: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, TrackingError> {
        let mut url = self.url(&["records", entity_type, code])?;
        if !fields.is_empty() {
            url.query_pairs_mut().append_pair("fields", &fields.join(","));
        }

        let response = self.request(Method::GET, url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(response).map(Some)
    }

    fn retire_record(&self, entity_type: &str, id: Uuid) -> Result<(), TrackingError> {
        let url = self.url(&["records", entity_type, &id.to_string()])?;
        let response = self.request(Method::DELETE, url).send()?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, response.text().unwrap_or_default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_escapes_segments() {
        let client = TrackingClient::new("http://tracker:8080/api/v1/", None);
        let url = client.url(&["records", "Shot", "shot 042"]).unwrap();
        assert_eq!(url.as_str(), "http://tracker:8080/api/v1/records/Shot/shot%20042");
    }

    #[test]
    fn test_unreachable_service_is_unavailable() {
        let client = TrackingClient::new("http://127.0.0.1:9/api/v1", None);
        let err = client.read_fields("Shot", "shot042", &[]).unwrap_err();
        assert!(matches!(err, TrackingError::Unavailable(_)));
    }
}
