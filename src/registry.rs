//! Schema Registry REST client
//!
//! Blocking client for the subset of the Confluent Schema Registry API the
//! promotion workflow needs. Error payloads (`{"error_code": ..., "message": ...}`)
//! are surfaced as [`OpsError::Api`] regardless of the HTTP status they arrive with.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compatibility::CompatibilityLevel;
use crate::config::RegistryConfig;
use crate::error::{OpsError, Result};

const SCHEMA_REGISTRY_V1: &str = "application/vnd.schemaregistry.v1+json";

/// Operations the promotion workflow issues against a registry
pub trait SchemaRegistryApi {
    /// `GET /subjects`
    fn list_subjects(&self) -> Result<Vec<String>>;

    /// `GET /subjects/{subject}/versions/latest`
    fn latest_schema(&self, subject: &str) -> Result<RegisteredSchema>;

    /// `POST /compatibility/subjects/{subject}/versions/latest`
    fn check_compatibility(&self, subject: &str, schema: &SchemaPayload) -> Result<bool>;

    /// `PUT /config/{subject}`
    fn set_compatibility(&self, subject: &str, level: CompatibilityLevel) -> Result<CompatibilityLevel>;

    /// `POST /subjects/{subject}/versions`, returning the schema id
    fn register_schema(&self, subject: &str, schema: &SchemaPayload) -> Result<i64>;
}

impl<R: SchemaRegistryApi + ?Sized> SchemaRegistryApi for &R {
    fn list_subjects(&self) -> Result<Vec<String>> {
        (**self).list_subjects()
    }

    fn latest_schema(&self, subject: &str) -> Result<RegisteredSchema> {
        (**self).latest_schema(subject)
    }

    fn check_compatibility(&self, subject: &str, schema: &SchemaPayload) -> Result<bool> {
        (**self).check_compatibility(subject, schema)
    }

    fn set_compatibility(&self, subject: &str, level: CompatibilityLevel) -> Result<CompatibilityLevel> {
        (**self).set_compatibility(subject, level)
    }

    fn register_schema(&self, subject: &str, schema: &SchemaPayload) -> Result<i64> {
        (**self).register_schema(subject, schema)
    }
}

/// Reference from one schema to another registered subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i64,
}

/// A schema version as returned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredSchema {
    pub subject: String,
    pub version: i64,
    pub id: i64,
    /// Schema document text
    pub schema: String,
    /// AVRO when absent
    #[serde(rename = "schemaType", default)]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub references: Vec<SchemaReference>,
}

impl RegisteredSchema {
    /// Request body that registers this schema elsewhere
    pub fn payload(&self) -> SchemaPayload {
        SchemaPayload {
            schema: self.schema.clone(),
            schema_type: self
                .schema_type
                .clone()
                .filter(|t| !t.eq_ignore_ascii_case("AVRO")),
            references: self.references.clone(),
        }
    }
}

/// Body of compatibility and registration requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaPayload {
    pub schema: String,
    #[serde(rename = "schemaType", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

impl SchemaPayload {
    /// Plain AVRO payload
    pub fn avro(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            schema_type: None,
            references: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompatibilityResponse {
    is_compatible: bool,
    #[serde(default)]
    messages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompatibilityConfig {
    compatibility: CompatibilityLevel,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error_code: i64,
    #[serde(default)]
    message: String,
}

/// Blocking HTTP client for one registry
pub struct RegistryClient {
    base_url: Url,
    client: Client,
    credentials: Option<(String, String)>,
}

impl RegistryClient {
    /// Create a client with the default 30s timeout and no credentials
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with an explicit per-request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| OpsError::InvalidConfig(format!("registry url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(OpsError::InvalidConfig(format!(
                "registry url '{base_url}' cannot be used as a base"
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            client,
            credentials: None,
        })
    }

    /// Create a client from a `[source]` / `[target]` config section
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let client = Self::with_timeout(&config.url, Duration::from_secs(config.timeout_secs))?;
        Ok(match config.credentials() {
            Some((key, secret)) => client.with_basic_auth(key, secret),
            None => client,
        })
    }

    /// Authenticate every request with an API key/secret pair
    pub fn with_basic_auth(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((key.into(), secret.into()));
        self
    }

    /// Registry base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("{} {}", method, url);
        let builder = self
            .client
            .request(method, url)
            .header(ACCEPT, SCHEMA_REGISTRY_V1);
        match &self.credentials {
            Some((key, secret)) => builder.basic_auth(key, Some(secret)),
            None => builder,
        }
    }

    fn send_json<B: Serialize>(&self, builder: RequestBuilder, body: &B) -> RequestBuilder {
        builder.header(CONTENT_TYPE, SCHEMA_REGISTRY_V1).json(body)
    }

    fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        decode_response(status, &body)
    }
}

/// Turn a registry response into a value or an API error
pub fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(OpsError::Api {
                code: i64::from(status.as_u16()),
                message: body.trim().to_string(),
            })
        }
    };

    if value.get("error_code").is_some() {
        let payload: ErrorPayload = serde_json::from_value(value)?;
        return Err(OpsError::Api {
            code: payload.error_code,
            message: payload.message,
        });
    }

    if !status.is_success() {
        return Err(OpsError::Api {
            code: i64::from(status.as_u16()),
            message: body.trim().to_string(),
        });
    }

    Ok(serde_json::from_value(value)?)
}

impl SchemaRegistryApi for RegistryClient {
    fn list_subjects(&self) -> Result<Vec<String>> {
        self.execute(self.request(Method::GET, &["subjects"]))
    }

    fn latest_schema(&self, subject: &str) -> Result<RegisteredSchema> {
        self.execute(self.request(Method::GET, &["subjects", subject, "versions", "latest"]))
    }

    fn check_compatibility(&self, subject: &str, schema: &SchemaPayload) -> Result<bool> {
        let request = self.request(
            Method::POST,
            &["compatibility", "subjects", subject, "versions", "latest"],
        );
        let response: CompatibilityResponse = self.execute(self.send_json(request, schema))?;
        for message in &response.messages {
            debug!("Compatibility message for {}: {}", subject, message);
        }
        Ok(response.is_compatible)
    }

    fn set_compatibility(&self, subject: &str, level: CompatibilityLevel) -> Result<CompatibilityLevel> {
        let request = self.request(Method::PUT, &["config", subject]);
        let body = CompatibilityConfig { compatibility: level };
        let response: CompatibilityConfig = self.execute(self.send_json(request, &body))?;
        Ok(response.compatibility)
    }

    fn register_schema(&self, subject: &str, schema: &SchemaPayload) -> Result<i64> {
        let request = self.request(Method::POST, &["subjects", subject, "versions"]);
        let response: RegisterResponse = self.execute(self.send_json(request, schema))?;
        Ok(response.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve canned responses on a loopback port, one connection each,
    /// and hand back the raw requests that arrived.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = String::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                    request.push_str(&line);
                }
                let mut body_bytes = vec![0u8; content_length];
                reader.read_exact(&mut body_bytes).unwrap();
                request.push_str("\r\n");
                request.push_str(&String::from_utf8(body_bytes).unwrap());
                captured.push(request);

                let mut stream = stream;
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            captured
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = RegistryClient::new("https://registry.example.com/").unwrap();
        let url = client.endpoint(&["subjects", "team/orders-value", "versions", "latest"]);
        assert_eq!(
            url.as_str(),
            "https://registry.example.com/subjects/team%2Forders-value/versions/latest"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = RegistryClient::new("https://gateway.example.com/sr").unwrap();
        let url = client.endpoint(&["config", "orders-value"]);
        assert_eq!(url.as_str(), "https://gateway.example.com/sr/config/orders-value");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            RegistryClient::new("not a url"),
            Err(OpsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_decode_error_payload() {
        let body = r#"{"error_code":40401,"message":"Subject 'orders-value' not found."}"#;
        let err = decode_response::<RegisteredSchema>(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, OpsError::Api { code: 40401, .. }));
    }

    #[test]
    fn test_decode_error_payload_with_success_status() {
        let body = r#"{"error_code":50001,"message":"Error in the backend data store"}"#;
        let err = decode_response::<Vec<String>>(StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, OpsError::Api { code: 50001, .. }));
    }

    #[test]
    fn test_decode_non_json_failure() {
        let err = decode_response::<Vec<String>>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .unwrap_err();
        assert!(matches!(err, OpsError::Api { code: 502, .. }));
    }

    #[test]
    fn test_decode_latest_schema() {
        let body = r#"{"subject":"orders-value","version":3,"id":100042,"schema":"{\"type\":\"string\"}"}"#;
        let schema: RegisteredSchema = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(schema.version, 3);
        assert_eq!(schema.id, 100042);
        assert_eq!(schema.schema, r#"{"type":"string"}"#);
        assert_eq!(schema.schema_type, None);
        assert!(schema.references.is_empty());
    }

    #[test]
    fn test_payload_omits_avro_type() {
        let avro = RegisteredSchema {
            subject: "orders-value".into(),
            version: 1,
            id: 1,
            schema: "\"string\"".into(),
            schema_type: Some("AVRO".into()),
            references: vec![],
        };
        let json = serde_json::to_string(&avro.payload()).unwrap();
        assert_eq!(json, r#"{"schema":"\"string\""}"#);

        let json_schema = RegisteredSchema {
            schema_type: Some("JSON".into()),
            ..avro
        };
        let json = serde_json::to_string(&json_schema.payload()).unwrap();
        assert_eq!(json, r#"{"schema":"\"string\"","schemaType":"JSON"}"#);
    }

    #[test]
    fn test_latest_schema_sends_basic_auth() {
        let (url, server) = serve(vec![(
            200,
            r#"{"subject":"orders-value","version":1,"id":7,"schema":"\"string\""}"#,
        )]);
        let client = RegistryClient::new(&url).unwrap().with_basic_auth("KEY", "SECRET");

        let schema = client.latest_schema("orders-value").unwrap();
        assert_eq!(schema.id, 7);

        let requests = server.join().unwrap();
        let request = requests[0].to_ascii_lowercase();
        assert!(request.starts_with("get /subjects/orders-value/versions/latest http/1.1"));
        assert!(request.contains("authorization: basic s0vzolnfq1jfva=="));
    }

    #[test]
    fn test_register_posts_schema_body() {
        let (url, server) = serve(vec![(200, r#"{"id":21}"#)]);
        let client = RegistryClient::new(&url).unwrap();

        let id = client
            .register_schema("orders-value", &SchemaPayload::avro("\"string\""))
            .unwrap();
        assert_eq!(id, 21);

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("POST /subjects/orders-value/versions HTTP/1.1"));
        assert!(requests[0].ends_with(r#"{"schema":"\"string\""}"#));
    }

    #[test]
    fn test_compatibility_not_found_is_api_error() {
        let (url, server) = serve(vec![(
            404,
            r#"{"error_code":40401,"message":"Subject 'orders-value' not found."}"#,
        )]);
        let client = RegistryClient::new(&url).unwrap();

        let err = client
            .check_compatibility("orders-value", &SchemaPayload::avro("\"string\""))
            .unwrap_err();
        assert!(err.is_not_found());
        server.join().unwrap();
    }

    #[test]
    fn test_set_compatibility_round_trip() {
        let (url, server) = serve(vec![(200, r#"{"compatibility":"FULL"}"#)]);
        let client = RegistryClient::new(&url).unwrap();

        let level = client
            .set_compatibility("orders-value", CompatibilityLevel::Full)
            .unwrap();
        assert_eq!(level, CompatibilityLevel::Full);

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("PUT /config/orders-value HTTP/1.1"));
        assert!(requests[0].ends_with(r#"{"compatibility":"FULL"}"#));
    }
}
