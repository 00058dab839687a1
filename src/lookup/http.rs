//! Blocking HTTP lookup client
//!
//! Issues `GET <endpoint>?<api_key_param>=<key>&<id_param>=<identifier>` and
//! reads the category from a top-level field of the JSON response body.
//!
//! Failure classification:
//!
//! - I/O errors, timeouts, connection and DNS failures, HTTP 429 and 5xx are
//!   [`LookupError::Transient`]
//! - Other non-2xx statuses, unreadable or non-object JSON bodies are
//!   [`LookupError::Permanent`]
//!
//! A 2xx response without the category field (or with `N/A`) is a success
//! and maps to the null-marker category.

use super::{LookupClient, LookupError};
use crate::config::LookupConfig;
use crate::types::{Category, Identifier};
use serde_json::Value;
use ureq::Agent;

/// Lookup client backed by a shared `ureq` agent (connection pooling included)
pub struct HttpLookupClient {
    agent: Agent,
    endpoint: String,
    api_key: Option<String>,
    api_key_param: String,
    id_param: String,
    category_field: String,
}

impl HttpLookupClient {
    /// Build a client from the lookup section of the config
    pub fn from_config(config: &LookupConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            api_key_param: config.api_key_param.clone(),
            id_param: config.id_param.clone(),
            category_field: config.category_field.clone(),
        }
    }

    /// The endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn fetch(&self, identifier: &Identifier) -> Result<(u16, String), LookupError> {
        let mut request = self.agent.get(&self.endpoint);
        if let Some(ref key) = self.api_key {
            request = request.query(&self.api_key_param, key);
        }

        let mut response = request
            .query(&self.id_param, identifier.as_str())
            .call()
            .map_err(classify_transport_error)?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(classify_transport_error)?;

        Ok((status, body))
    }
}

impl LookupClient for HttpLookupClient {
    fn lookup(&self, identifier: &Identifier) -> Result<Category, LookupError> {
        let (status, body) = self.fetch(identifier)?;
        classify_status(status)?;
        parse_category(&body, &self.category_field)
    }
}

/// Map a `ureq` error to a lookup error
fn classify_transport_error(err: ureq::Error) -> LookupError {
    match &err {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => LookupError::Transient(err.to_string()),
        ureq::Error::StatusCode(code) => match classify_status(*code) {
            Err(e) => e,
            Ok(()) => LookupError::Permanent(err.to_string()),
        },
        _ => LookupError::Permanent(err.to_string()),
    }
}

/// Reject non-2xx statuses, marking throttling and server errors transient
fn classify_status(status: u16) -> Result<(), LookupError> {
    match status {
        200..=299 => Ok(()),
        429 | 500..=599 => Err(LookupError::Transient(format!("HTTP {}", status))),
        _ => Err(LookupError::Permanent(format!("HTTP {}", status))),
    }
}

/// Extract and normalize `field` from a JSON object body
///
/// JSON strings are used verbatim, `null` counts as absent, any other value
/// is rendered as its JSON text before normalization.
pub fn parse_category(body: &str, field: &str) -> Result<Category, LookupError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| LookupError::Permanent(format!("malformed response body: {}", e)))?;

    let object = json
        .as_object()
        .ok_or_else(|| LookupError::Permanent("response is not a JSON object".to_string()))?;

    let raw = match object.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    Ok(Category::normalize(raw.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned HTTP response per entry, returning the request lines seen
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut request_lines = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let text = String::from_utf8_lossy(&buf);
                request_lines.push(text.lines().next().unwrap_or_default().to_string());

                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            request_lines
        });

        (url, handle)
    }

    fn client_for(url: String) -> HttpLookupClient {
        let config = LookupConfig {
            endpoint: url,
            api_key: Some("k3y".to_string()),
            timeout_ms: 2_000,
            ..LookupConfig::default()
        };
        HttpLookupClient::from_config(&config)
    }

    #[test]
    fn test_parse_category_string() {
        let category = parse_category(r#"{"Title":"Heat","Country":"USA"}"#, "Country").unwrap();
        assert_eq!(category.as_str(), "USA");
    }

    #[test]
    fn test_parse_category_missing_or_na() {
        assert!(parse_category(r#"{"Title":"Heat"}"#, "Country").unwrap().is_null());
        assert!(parse_category(r#"{"Country":"N/A"}"#, "Country").unwrap().is_null());
        assert!(parse_category(r#"{"Country":null}"#, "Country").unwrap().is_null());
        assert!(parse_category(r#"{"Country":""}"#, "Country").unwrap().is_null());
    }

    #[test]
    fn test_parse_category_non_string_and_quotes() {
        assert_eq!(parse_category(r#"{"Country":42}"#, "Country").unwrap().as_str(), "42");
        assert_eq!(
            parse_category(r#"{"Country":"\"West\" Germany"}"#, "Country").unwrap().as_str(),
            "West Germany"
        );
    }

    #[test]
    fn test_parse_category_malformed() {
        assert!(matches!(
            parse_category("<html>", "Country"),
            Err(LookupError::Permanent(_))
        ));
        assert!(matches!(
            parse_category("[1,2]", "Country"),
            Err(LookupError::Permanent(_))
        ));
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(200).is_ok());
        assert!(classify_status(503).unwrap_err().is_transient());
        assert!(classify_status(429).unwrap_err().is_transient());
        assert!(!classify_status(404).unwrap_err().is_transient());
    }

    #[test]
    fn test_lookup_against_local_server() {
        let (url, server) = serve(vec![(200, r#"{"Country":"Japan"}"#)]);
        let client = client_for(url);

        let category = client.lookup(&"tt0245429".into()).unwrap();
        assert_eq!(category.as_str(), "Japan");

        let lines = server.join().unwrap();
        assert!(lines[0].starts_with("GET /?"));
        assert!(lines[0].contains("apikey=k3y"));
        assert!(lines[0].contains("i=tt0245429"));
    }

    #[test]
    fn test_server_error_is_transient() {
        let (url, server) = serve(vec![(503, "{}")]);
        let client = client_for(url);

        let err = client.lookup(&"tt1".into()).unwrap_err();
        assert!(err.is_transient());
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = client_for(url).lookup(&"tt1".into()).unwrap_err();
        assert!(err.is_transient(), "unexpected classification: {err}");
    }
}
