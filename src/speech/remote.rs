//! HTTP pronunciation API client.
//!
//! The endpoint answers in one of three shapes: raw audio bytes, JSON
//! carrying a playable URL (plain or `data:`), or JSON wrapping a
//! serialized byte buffer (`{"type": "Buffer", "data": [...]}`).

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use super::mime::is_binary_audio;
use crate::config::{Accent, SpeechConfig};
use crate::error::SpeechError;
use crate::text::preview;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub language: Option<String>,
    pub voice: Option<String>,
    pub accent: Option<Accent>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
            voice: None,
            accent: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTts: Send + Sync {
    /// Fetch encoded audio for `request.text`.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError>;
}

pub struct HttpTts {
    api_url: String,
    client: Client,
}

impl HttpTts {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_url: config.api_url.clone(),
            client,
        })
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, SpeechError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }

        // Relative URLs are resolved against the API endpoint.
        let resolved = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => Url::parse(&self.api_url)
                .and_then(|base| base.join(url))
                .map_err(|e| SpeechError::UnsupportedResponse(format!("bad audio url {url}: {e}")))?,
        };

        debug!("Fetching pronunciation audio from {resolved}");
        let resp = self.client.get(resolved).send().await?;
        if !resp.status().is_success() {
            return Err(SpeechError::Status(resp.status()));
        }
        non_empty(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RemoteTts for HttpTts {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError> {
        if request.text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let mut query: Vec<(&str, String)> = vec![("input", request.text.clone())];
        if let Some(language) = &request.language {
            query.push(("language", language.clone()));
        }
        if let Some(voice) = &request.voice {
            query.push(("voice", voice.clone()));
        }
        if let Some(accent) = request.accent {
            query.push(("type", accent.type_code().to_string()));
        }

        info!("Requesting pronunciation for \"{}\"", preview(&request.text, 40));
        let resp = self.client.get(&self.api_url).query(&query).send().await?;
        if !resp.status().is_success() {
            return Err(SpeechError::Status(resp.status()));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("json") {
            let body: Value = resp.json().await?;
            return match extract_audio(&body) {
                Some(AudioRef::Url(url)) => self.fetch_url(&url).await,
                Some(AudioRef::Bytes(bytes)) => non_empty(bytes),
                None => Err(SpeechError::UnsupportedResponse(
                    "JSON response without an audio field".into(),
                )),
            };
        }

        if !content_type.is_empty() && !is_binary_audio(&content_type) {
            return Err(SpeechError::UnsupportedResponse(content_type));
        }

        non_empty(resp.bytes().await?.to_vec())
    }
}

fn non_empty(bytes: Vec<u8>) -> Result<Vec<u8>, SpeechError> {
    if bytes.is_empty() {
        Err(SpeechError::EmptyAudio)
    } else {
        Ok(bytes)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AudioRef {
    Url(String),
    Bytes(Vec<u8>),
}

const URL_KEYS: [&str; 4] = ["url", "audioUrl", "audio_url", "speakUrl"];

/// Look for audio at the top level and one level down in `data`.
fn extract_audio(body: &Value) -> Option<AudioRef> {
    [Some(body), body.get("data")]
        .into_iter()
        .flatten()
        .find_map(|obj| {
            URL_KEYS
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(|u| AudioRef::Url(u.to_string()))
                .or_else(|| obj.get("audio").and_then(buffer_bytes).map(AudioRef::Bytes))
        })
}

fn buffer_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) if s.starts_with("data:") => decode_data_url(s).ok(),
        Value::String(s) => STANDARD.decode(s).ok(),
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("Buffer") => map
            .get("data")?
            .as_array()?
            .iter()
            .map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, SpeechError> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| SpeechError::DataUrl("missing payload separator".into()))?;

    if !header.ends_with(";base64") {
        return Err(SpeechError::DataUrl(format!("not base64 encoded: {header}")));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| SpeechError::DataUrl(e.to_string()))
        .and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpTts {
        let config = SpeechConfig {
            api_url: format!("{}/speech/audio", server.uri()),
            ..SpeechConfig::default()
        };
        HttpTts::new(&config).unwrap()
    }

    #[tokio::test]
    async fn binary_response_is_returned_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/speech/audio"))
            .and(query_param("input", "hello world"))
            .and(query_param("language", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"ID3audio".to_vec(), "audio/mpeg"))
            .mount(&server)
            .await;

        let tts = client_for(&server);
        let request = SpeechRequest {
            language: Some("en-US".into()),
            ..SpeechRequest::new("hello world")
        };
        assert_eq!(tts.synthesize(&request).await.unwrap(), b"ID3audio");
    }

    #[tokio::test]
    async fn json_url_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/speech/audio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": { "url": "/clips/cat.mp3" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/clips/cat.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"OggSdata".to_vec(), "audio/ogg"))
            .mount(&server)
            .await;

        let tts = client_for(&server);
        let audio = tts.synthesize(&SpeechRequest::new("cat")).await.unwrap();
        assert_eq!(audio, b"OggSdata");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tts = client_for(&server);
        let err = tts.synthesize(&SpeechRequest::new("cat")).await.unwrap_err();
        assert!(matches!(err, SpeechError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn html_response_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let tts = client_for(&server);
        let err = tts.synthesize(&SpeechRequest::new("cat")).await.unwrap_err();
        assert!(matches!(err, SpeechError::UnsupportedResponse(_)));
    }

    #[tokio::test]
    async fn empty_text_never_hits_the_network() {
        let tts = HttpTts::new(&SpeechConfig::default()).unwrap();
        let err = tts.synthesize(&SpeechRequest::new("  ")).await.unwrap_err();
        assert!(matches!(err, SpeechError::EmptyText));
    }

    #[test]
    fn extracts_serialized_node_buffer() {
        let body = json!({ "audio": { "type": "Buffer", "data": [73, 68, 51] }, "contentType": "audio/mpeg" });
        assert_eq!(extract_audio(&body), Some(AudioRef::Bytes(b"ID3".to_vec())));
    }

    #[test]
    fn extracts_camel_case_url() {
        let body = json!({ "audioUrl": "https://cdn.example/a.mp3" });
        assert_eq!(
            extract_audio(&body),
            Some(AudioRef::Url("https://cdn.example/a.mp3".into()))
        );
        assert_eq!(extract_audio(&json!({ "status": "ok" })), None);
    }

    #[test]
    fn decodes_base64_data_url() {
        let url = format!("data:audio/mpeg;base64,{}", STANDARD.encode(b"ID3xyz"));
        assert_eq!(decode_data_url(&url).unwrap(), b"ID3xyz");
        assert!(decode_data_url("data:audio/mpeg,plain").is_err());
        assert!(decode_data_url("data:audio/mpeg;base64").is_err());
    }
}
