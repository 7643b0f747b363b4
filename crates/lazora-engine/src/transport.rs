use std::time::Duration;

use lazora_contracts::edits::ServiceError;
use lazora_contracts::payload::ImagePayload;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Image,
    Text,
}

impl Modality {
    fn wire_name(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub images: Vec<ImagePayload>,
    pub prompt: String,
    pub response_modalities: Vec<Modality>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    InlineImage {
        data: String,
        mime_type: Option<String>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Candidate {
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerateResponse {
    pub candidates: Vec<Candidate>,
}

impl GenerateResponse {
    pub fn single(parts: Vec<ResponsePart>) -> Self {
        Self {
            candidates: vec![Candidate { parts }],
        }
    }
}

/// Boundary to the external image-generation capability.
pub trait EditTransport: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError>;
}

pub struct GeminiTransport {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiTransport {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl EditTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = build_generate_payload(request);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .map_err(|err| transport_error(&err))?;
        let response_payload = response_json_or_error(response)?;
        Ok(parse_generate_response(&response_payload))
    }
}

pub fn build_generate_payload(request: &GenerateRequest) -> Value {
    let mut parts: Vec<Value> = request
        .images
        .iter()
        .map(|image| {
            json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.base64,
                }
            })
        })
        .collect();
    parts.push(json!({ "text": request.prompt }));

    let modalities: Vec<Value> = request
        .response_modalities
        .iter()
        .map(|modality| Value::String(modality.wire_name().to_string()))
        .collect();
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "responseModalities": modalities,
        },
    })
}

/// Reads the candidate/part tree, tolerating both camelCase and snake_case
/// keys and skipping parts that carry neither image data nor text.
pub fn parse_generate_response(response_payload: &Value) -> GenerateResponse {
    let candidates = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut out = GenerateResponse::default();

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(Value::as_object)
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut parsed = Candidate::default();
        for part in parts {
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object);
            if let Some(inline) = inline {
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !data.is_empty() {
                    let mime_type = inline
                        .get("mimeType")
                        .or_else(|| inline.get("mime_type"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    parsed.parts.push(ResponsePart::InlineImage {
                        data: data.to_string(),
                        mime_type,
                    });
                    continue;
                }
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    parsed.parts.push(ResponsePart::Text(text.to_string()));
                }
            }
        }
        out.candidates.push(parsed);
    }

    out
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, ServiceError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| transport_error(&err))?;
    if !status.is_success() {
        return Err(parse_error_envelope(code, &body));
    }
    serde_json::from_str(&body).map_err(|err| ServiceError::Malformed {
        message: format!("invalid JSON payload: {err}"),
    })
}

/// Google APIs report failures as `{"error": {"code", "status", "message"}}`.
pub fn parse_error_envelope(http_status: u16, body: &str) -> ServiceError {
    let parsed: Option<Map<String, Value>> = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_object).cloned());
    let Some(error) = parsed else {
        return ServiceError::Api {
            http_status: Some(http_status),
            code: None,
            status: None,
            message: truncate_text(body.trim(), 512),
        };
    };
    ServiceError::Api {
        http_status: Some(http_status),
        code: error.get("code").and_then(Value::as_i64),
        status: error
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .map(|message| truncate_text(message, 512))
            .unwrap_or_default(),
    }
}

fn transport_error(err: &reqwest::Error) -> ServiceError {
    if let Some(status) = err.status() {
        return ServiceError::api(status.as_u16(), err.to_string());
    }
    ServiceError::Transport {
        message: err.to_string(),
        timed_out: err.is_timeout(),
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use lazora_contracts::edits::{classify_service_error, EditFailure, ErrorCategory, ServiceError};
    use lazora_contracts::messages::Message;
    use lazora_contracts::payload::ImagePayload;
    use serde_json::json;

    use super::{
        build_generate_payload, parse_error_envelope, parse_generate_response, EditTransport,
        GeminiTransport, GenerateRequest, Modality, ResponsePart,
    };
    use crate::client::{EditClient, RemoteEditClient};
    use crate::config::EngineConfig;

    const QUOTA_BODY: &str = r#"{"error":{"code":429,"message":"Quota exceeded.","status":"RESOURCE_EXHAUSTED"}}"#;

    /// Local HTTP endpoint that answers exactly one request.
    struct OneShotServer {
        base: String,
        handle: JoinHandle<anyhow::Result<String>>,
    }

    impl OneShotServer {
        fn start(status: &'static str, body: &'static str) -> anyhow::Result<Self> {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            let base = format!("http://{}", listener.local_addr()?);
            let handle = thread::spawn(move || -> anyhow::Result<String> {
                let (mut stream, _) = listener.accept()?;
                let mut reader = BufReader::new(stream.try_clone()?);
                let mut request_line = String::new();
                reader.read_line(&mut request_line)?;
                let mut content_length = 0;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header)?;
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse()?;
                        }
                    }
                }
                let mut request_body = vec![0; content_length];
                reader.read_exact(&mut request_body)?;

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes())?;
                Ok(request_line.trim_end().to_string())
            });
            Ok(Self { base, handle })
        }

        fn request_line(self) -> anyhow::Result<String> {
            self.handle
                .join()
                .map_err(|_| anyhow::anyhow!("server thread panicked"))?
        }
    }

    fn config_for(base: &str) -> anyhow::Result<EngineConfig> {
        EngineConfig::from_lookup(|key| match key {
            "API_KEY" => Some("test-key".to_string()),
            "GEMINI_API_BASE" => Some(base.to_string()),
            _ => None,
        })
    }

    fn image_request() -> GenerateRequest {
        GenerateRequest {
            model: "gemini-test".to_string(),
            images: vec![ImagePayload::new("aW1n", "image/jpeg")],
            prompt: "enhance".to_string(),
            response_modalities: vec![Modality::Image, Modality::Text],
        }
    }

    #[test]
    fn quota_envelope_over_http_becomes_quota_failure() -> anyhow::Result<()> {
        let server = OneShotServer::start("429 Too Many Requests", QUOTA_BODY)?;
        let config = config_for(&server.base)?;
        let client = RemoteEditClient::new(GeminiTransport::new(&config), "gemini-test");

        let result = client.enhance(&ImagePayload::new("aW1n", "image/jpeg"));

        assert_eq!(
            result.failure_kind(),
            Some(EditFailure::Service(ErrorCategory::Quota))
        );
        assert_eq!(
            result.message(),
            Some(Message::QuotaExceeded.text().as_str())
        );
        let request_line = server.request_line()?;
        assert!(
            request_line.starts_with("POST /models/gemini-test:generateContent?key=test-key "),
            "{request_line}"
        );
        Ok(())
    }

    #[test]
    fn non_json_success_body_is_malformed() -> anyhow::Result<()> {
        let server = OneShotServer::start("200 OK", "not json")?;
        let transport = GeminiTransport::new(&config_for(&server.base)?);

        let outcome = transport.generate(&image_request());

        assert!(
            matches!(outcome, Err(ServiceError::Malformed { .. })),
            "{outcome:?}"
        );
        server.request_line()?;
        Ok(())
    }

    #[test]
    fn refused_connection_is_a_generic_transport_failure() -> anyhow::Result<()> {
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let transport = GeminiTransport::new(&config_for(&format!("http://127.0.0.1:{port}"))?);

        let err = match transport.generate(&image_request()) {
            Err(err) => err,
            Ok(response) => anyhow::bail!("unexpected response {response:?}"),
        };

        let ServiceError::Transport { timed_out, .. } = &err else {
            anyhow::bail!("expected a transport error, got {err:?}");
        };
        assert!(!*timed_out);
        assert_eq!(classify_service_error(&err), ErrorCategory::Generic);
        Ok(())
    }

    #[test]
    fn payload_orders_images_before_prompt() {
        let request = GenerateRequest {
            model: "gemini-test".to_string(),
            images: vec![
                ImagePayload::new("cHJvZA==", "image/jpeg"),
                ImagePayload::new("cmVm", "image/png"),
            ],
            prompt: "swap it".to_string(),
            response_modalities: vec![Modality::Image, Modality::Text],
        };
        let payload = build_generate_payload(&request);
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["data"], json!("cHJvZA=="));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[2]["text"], json!("swap it"));
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn response_parsing_handles_both_key_styles_and_empty_parts() {
        let payload = json!({
            "candidates": [
                { "content": { "parts": [] } },
                { "content": { "parts": [
                    { "text": "here you go" },
                    { "inline_data": { "mime_type": "image/png", "data": "aW1n" } },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "" } },
                    { "text": "   " }
                ] } },
                { "finishReason": "SAFETY" }
            ]
        });
        let parsed = parse_generate_response(&payload);
        assert_eq!(parsed.candidates.len(), 3);
        assert!(parsed.candidates[0].parts.is_empty());
        assert_eq!(
            parsed.candidates[1].parts,
            vec![
                ResponsePart::Text("here you go".to_string()),
                ResponsePart::InlineImage {
                    data: "aW1n".to_string(),
                    mime_type: Some("image/png".to_string()),
                },
            ]
        );
        assert!(parsed.candidates[2].parts.is_empty());
        assert!(parse_generate_response(&json!({})).candidates.is_empty());
    }

    #[test]
    fn error_envelope_is_normalized() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            parse_error_envelope(429, body),
            ServiceError::Api {
                http_status: Some(429),
                code: Some(429),
                status: Some("RESOURCE_EXHAUSTED".to_string()),
                message: "Resource has been exhausted (e.g. check quota).".to_string(),
            }
        );
        assert_eq!(
            parse_error_envelope(502, "<html>Bad Gateway</html>"),
            ServiceError::Api {
                http_status: Some(502),
                code: None,
                status: None,
                message: "<html>Bad Gateway</html>".to_string(),
            }
        );
    }
}
