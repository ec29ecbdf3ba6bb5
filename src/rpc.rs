//! AnkiConnect JSON-RPC client.
//!
//! Every call is one HTTP POST of `{action, version: 6, params}` to the
//! configured endpoint. The response `{result, error}` resolves to `result`
//! when `error` is null and rejects with the remote message otherwise.
//! Nothing is retried.
//!
//! The typed helpers below (`version`, `deck_names`, ...) take any
//! [`AnkiTransport`], so the submission orchestrator can be driven by a fake
//! transport in tests.

use crate::config::Configuration;
use crate::error::{Page2AnkiError, RpcError};
use crate::pipeline::compose::NoteFieldMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// AnkiConnect protocol version sent with every request.
pub const PROTOCOL_VERSION: u8 = 6;

/// One request, one outcome.
#[async_trait]
pub trait AnkiTransport: Send + Sync {
    async fn invoke(&self, action: &str, params: Value) -> Result<Value, RpcError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

/// Request body for `action`. Missing params are sent as `{}`.
pub fn request_body(action: &str, params: Value) -> Value {
    let params = if params.is_null() { json!({}) } else { params };
    json!({ "action": action, "version": PROTOCOL_VERSION, "params": params })
}

/// Resolve a raw response body to its `result`, or the rejection it carries.
pub fn parse_response(body: &str) -> Result<Value, RpcError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
    match response.error {
        None | Some(Value::Null) => Ok(response.result),
        Some(Value::String(message)) => Err(RpcError::Remote(message)),
        Some(other) => Err(RpcError::Remote(other.to_string())),
    }
}

/// HTTP transport to a running AnkiConnect instance.
#[derive(Debug, Clone)]
pub struct AnkiConnectClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl AnkiConnectClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, Page2AnkiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Page2AnkiError::Internal(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout_secs,
        })
    }

    pub fn from_config(config: &Configuration) -> Result<Self, Page2AnkiError> {
        Self::new(config.endpoint(), config.request_timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnkiTransport for AnkiConnectClient {
    async fn invoke(&self, action: &str, params: Value) -> Result<Value, RpcError> {
        debug!("AnkiConnect {} → {}", action, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body(action, params))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                RpcError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(RpcError::InvalidResponse(format!("HTTP {status}")));
        }
        parse_response(&body)
    }
}

// ── Typed actions ─────────────────────────────────────────────────────────

/// A note as `addNote` expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: String,
    pub fields: NoteFieldMap,
    pub tags: Vec<String>,
    pub options: NoteOptions,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    pub allow_duplicate: bool,
}

fn decode<T: for<'de> Deserialize<'de>>(action: &str, value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::InvalidResponse(format!("{action}: unexpected result ({e})")))
}

/// Protocol version of the remote service. Doubles as a reachability check.
pub async fn version(t: &dyn AnkiTransport) -> Result<u64, RpcError> {
    let result = t.invoke("version", Value::Null).await?;
    decode("version", result)
}

pub async fn deck_names(t: &dyn AnkiTransport) -> Result<Vec<String>, RpcError> {
    let result = t.invoke("deckNames", Value::Null).await?;
    decode("deckNames", result)
}

/// Create `deck`. A no-op on the remote side when it already exists.
pub async fn create_deck(t: &dyn AnkiTransport, deck: &str) -> Result<Value, RpcError> {
    t.invoke("createDeck", json!({ "deck": deck })).await
}

/// Field names of `model`, in declaration order.
pub async fn model_field_names(t: &dyn AnkiTransport, model: &str) -> Result<Vec<String>, RpcError> {
    let result = t.invoke("modelFieldNames", json!({ "modelName": model })).await?;
    decode("modelFieldNames", result)
}

/// Store base64 `data` as `filename` in the media folder.
///
/// Returns the name the service stored it under, which may be empty for
/// older AnkiConnect versions.
pub async fn store_media_file(t: &dyn AnkiTransport, filename: &str, data: &str) -> Result<String, RpcError> {
    let result = t
        .invoke("storeMediaFile", json!({ "filename": filename, "data": data }))
        .await?;
    Ok(result.as_str().unwrap_or_default().to_string())
}

/// Add one note and return its id.
pub async fn add_note(t: &dyn AnkiTransport, note: &NewNote) -> Result<u64, RpcError> {
    let result = t.invoke("addNote", json!({ "note": note })).await?;
    decode("addNote", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_has_fixed_shape() {
        let body = request_body("deckNames", Value::Null);
        assert_eq!(body, json!({"action": "deckNames", "version": 6, "params": {}}));

        let body = request_body("createDeck", json!({"deck": "Geo"}));
        assert_eq!(body["params"]["deck"], "Geo");
    }

    #[test]
    fn result_resolves_when_error_is_null() {
        assert_eq!(parse_response(r#"{"result":42,"error":null}"#).unwrap(), json!(42));
    }

    #[test]
    fn error_rejects_with_remote_message() {
        let err = parse_response(r#"{"result":null,"error":"duplicate"}"#).unwrap_err();
        assert_eq!(err, RpcError::Remote("duplicate".into()));
        assert_eq!(err.to_string(), "duplicate");
    }

    #[test]
    fn unparseable_body_is_invalid_response() {
        assert!(matches!(
            parse_response("<html>not json</html>"),
            Err(RpcError::InvalidResponse(_))
        ));
        assert!(matches!(parse_response("42"), Err(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn note_serialises_in_camel_case() {
        let mut fields = NoteFieldMap::new();
        fields.insert("Front".into(), "<img src=\"a.jpg\">".into());
        let note = NewNote {
            deck_name: "LearnableMeta".into(),
            model_name: "Basic".into(),
            fields,
            tags: vec!["LearnableMeta".into()],
            options: NoteOptions {
                allow_duplicate: true,
            },
        };
        let v = serde_json::to_value(&note).unwrap();
        assert_eq!(v["deckName"], "LearnableMeta");
        assert_eq!(v["modelName"], "Basic");
        assert_eq!(v["options"]["allowDuplicate"], true);
        assert_eq!(v["fields"]["Front"], "<img src=\"a.jpg\">");
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = AnkiConnectClient::new(format!("http://127.0.0.1:{port}"), 5).unwrap();
        let err = version(&client).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn silent_service_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = AnkiConnectClient::new(format!("http://{addr}"), 1).unwrap();
        let err = version(&client).await.unwrap_err();
        assert_eq!(err, RpcError::Timeout { secs: 1 });
        assert_eq!(err.to_string(), "AnkiConnect request timed out after 1s");
    }
}
