#![forbid(unsafe_code)]

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SIGN_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// The bridge function endpoint. One POST endpoint serves both the
    /// sign and upload exchanges.
    pub endpoint: Url,
    /// Project-level key sent as a bearer token alongside the per-call
    /// identity token, when the deployment requires one.
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub default_sign_ttl: Duration,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_sign_ttl: DEFAULT_SIGN_TTL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The bridge refused the identity token. Not retryable; the
    /// caller needs a fresh token.
    #[error("identity token rejected: {0}")]
    AuthRejected(String),
    /// The storage side failed. Retryable.
    #[error("storage operation failed: {0}")]
    StorageFailure(String),
    #[error("bridge request timed out")]
    Timeout,
    #[error("malformed bridge response: {0}")]
    InvalidResponse(String),
}

impl BridgeError {
    /// Only storage-side failures are safe to retry: the token was
    /// already verified, and the exchange is idempotent per path.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure(_) | Self::Timeout)
    }
}

#[derive(Debug, serde::Serialize)]
struct SignRequest<'a> {
    #[serde(rename = "identityToken")]
    identity_token: &'a str,
    #[serde(rename = "action")]
    action: &'static str,
    #[serde(rename = "filePath")]
    file_path: &'a str,
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Debug, serde::Serialize)]
struct UploadRequest<'a> {
    #[serde(rename = "identityToken")]
    identity_token: &'a str,
    #[serde(rename = "filePath")]
    file_path: &'a str,
    #[serde(rename = "base64")]
    base64: String,
    #[serde(rename = "contentType")]
    content_type: &'a str,
}

/// Response union: `{signedUrl}` for sign, `{success, filePath}` for
/// upload, `{error}` on failure.
#[derive(Debug, Default, serde::Deserialize)]
struct BridgeResponse {
    #[serde(rename = "signedUrl")]
    signed_url: Option<String>,
    #[serde(rename = "success")]
    success: Option<bool>,
    #[serde(rename = "filePath")]
    file_path: Option<String>,
    #[serde(rename = "error")]
    error: Option<String>,
}

/// Client for the exchange-and-sign/upload bridge in front of object
/// storage. The bridge verifies the identity token against the identity
/// provider itself; this client only transports it, and keeps
/// verification failures (`AuthRejected`) distinct from storage
/// failures since only the latter are retryable.
pub struct CapabilityBridge {
    http_client: reqwest::Client,
    config: BridgeConfig,
}

impl CapabilityBridge {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http_client,
            config,
        }
    }

    pub fn set_http_client(&mut self, http_client: reqwest::Client) {
        self.http_client = http_client;
    }

    /// Exchanges the identity token for a time-limited read URL on one
    /// stored object.
    pub async fn exchange_and_sign(
        &self,
        identity_token: &str,
        file_path: &str,
        ttl: Option<Duration>,
    ) -> Result<String, BridgeError> {
        let request = SignRequest {
            identity_token,
            action: "sign",
            file_path,
            expires_in: ttl.unwrap_or(self.config.default_sign_ttl).as_secs(),
        };
        let response = self.post(&request).await?;
        response
            .signed_url
            .ok_or_else(|| BridgeError::InvalidResponse("missing signedUrl".to_owned()))
    }

    /// Uploads `payload` through the bridge and returns the stored
    /// path. The payload travels base64-encoded in the JSON body.
    pub async fn exchange_and_upload(
        &self,
        identity_token: &str,
        file_path: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<String, BridgeError> {
        let request = UploadRequest {
            identity_token,
            file_path,
            base64: STANDARD.encode(payload),
            content_type,
        };
        let response = self.post(&request).await?;
        if response.success != Some(true) {
            return Err(BridgeError::InvalidResponse(
                "upload did not report success".to_owned(),
            ));
        }
        response
            .file_path
            .ok_or_else(|| BridgeError::InvalidResponse("missing filePath".to_owned()))
    }

    async fn post<T: serde::Serialize>(&self, body: &T) -> Result<BridgeResponse, BridgeError> {
        let mut request = self
            .http_client
            .post(self.config.endpoint.clone())
            .json(body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key).header("apikey", api_key);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let payload: BridgeResponse = response.json().await.unwrap_or_default();
        classify_response(status, payload)
    }
}

fn map_transport_error(error: reqwest::Error) -> BridgeError {
    if error.is_timeout() {
        BridgeError::Timeout
    } else {
        BridgeError::StorageFailure(error.to_string())
    }
}

/// HTTP status decides the error kind; the body's `error` field only
/// supplies the message.
fn classify_response(
    status: reqwest::StatusCode,
    payload: BridgeResponse,
) -> Result<BridgeResponse, BridgeError> {
    if status.is_success() {
        return Ok(payload);
    }
    let message = payload
        .error
        .unwrap_or_else(|| format!("bridge returned status {status}"));
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Err(BridgeError::AuthRejected(message))
    } else {
        Err(BridgeError::StorageFailure(message))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    fn response(
        signed_url: Option<&str>,
        success: Option<bool>,
        file_path: Option<&str>,
        error: Option<&str>,
    ) -> BridgeResponse {
        BridgeResponse {
            signed_url: signed_url.map(ToOwned::to_owned),
            success,
            file_path: file_path.map(ToOwned::to_owned),
            error: error.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn unauthorized_maps_to_auth_rejected() {
        let error = classify_response(
            StatusCode::UNAUTHORIZED,
            response(None, None, None, Some("Invalid identity token")),
        )
        .expect_err("401 should fail");
        assert!(matches!(error, BridgeError::AuthRejected(_)));
        assert!(!error.is_retryable());
    }

    #[test]
    fn server_errors_map_to_storage_failure() {
        let error = classify_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            response(None, None, None, Some("bucket unavailable")),
        )
        .expect_err("500 should fail");
        assert!(matches!(error, BridgeError::StorageFailure(_)));
        assert!(error.is_retryable());
    }

    #[test]
    fn error_message_falls_back_to_the_status() {
        let error = classify_response(StatusCode::BAD_GATEWAY, response(None, None, None, None))
            .expect_err("502 should fail");
        assert_eq!(
            error.to_string(),
            "storage operation failed: bridge returned status 502 Bad Gateway"
        );
    }

    #[test]
    fn success_passes_the_payload_through() {
        let payload = classify_response(
            StatusCode::OK,
            response(Some("https://storage.example/signed"), None, None, None),
        )
        .expect("200 should pass");
        assert_eq!(
            payload.signed_url.as_deref(),
            Some("https://storage.example/signed")
        );
    }

    #[test]
    fn sign_request_body_matches_the_wire_contract() {
        let body = SignRequest {
            identity_token: "token-1",
            action: "sign",
            file_path: "u1/1709280000-notes.pdf",
            expires_in: 600,
        };
        let value = serde_json::to_value(&body).expect("encode");
        assert_eq!(value["identityToken"], "token-1");
        assert_eq!(value["action"], "sign");
        assert_eq!(value["filePath"], "u1/1709280000-notes.pdf");
        assert_eq!(value["expiresIn"], 600);
    }

    #[test]
    fn upload_request_carries_base64_payload() {
        let body = UploadRequest {
            identity_token: "token-1",
            file_path: "u1/1709280000-notes.pdf",
            base64: STANDARD.encode(b"hello"),
            content_type: "application/pdf",
        };
        let value = serde_json::to_value(&body).expect("encode");
        assert_eq!(value["base64"], "aGVsbG8=");
        assert_eq!(value["contentType"], "application/pdf");
        assert!(value.get("action").is_none());
    }

    #[test]
    fn response_union_decodes_every_shape() {
        let sign: BridgeResponse =
            serde_json::from_str(r#"{"signedUrl":"https://storage.example/s"}"#).expect("decode");
        assert!(sign.signed_url.is_some());

        let upload: BridgeResponse =
            serde_json::from_str(r#"{"success":true,"filePath":"u1/notes.pdf"}"#).expect("decode");
        assert_eq!(upload.success, Some(true));
        assert_eq!(upload.file_path.as_deref(), Some("u1/notes.pdf"));

        let failure: BridgeResponse =
            serde_json::from_str(r#"{"error":"Missing filePath"}"#).expect("decode");
        assert_eq!(failure.error.as_deref(), Some("Missing filePath"));
    }
}
