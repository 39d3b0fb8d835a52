//! Google Cloud Text-to-Speech REST backend.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{Synthesizer, SynthesisParams, TtsError, VoiceInfo};

const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GoogleTts {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
    speaking_rate: f64,
    pitch: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

impl GoogleTts {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads the API key from `GOOGLE_TTS_API_KEY`.
    pub fn from_env() -> Result<Self, TtsError> {
        let api_key = std::env::var("GOOGLE_TTS_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(TtsError::MissingCredentials)?;
        Ok(Self::new(api_key))
    }

    /// Overrides the API endpoint, mainly for tests against a local server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Lists available voices, optionally filtered by BCP-47 language code.
    pub async fn list_voices(&self, language_code: Option<&str>) -> Result<Vec<VoiceInfo>, TtsError> {
        let url = format!("{}/v1/voices", self.base_url);
        let mut query = vec![("key", self.api_key.as_str())];
        if let Some(lang) = language_code {
            query.push(("languageCode", lang));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(TtsError::Backend { status, message });
        }

        let body: VoicesResponse = response.json().await?;
        Ok(body.voices)
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, params: &SynthesisParams) -> Result<Vec<u8>, TtsError> {
        let url = format!("{}/v1/text:synthesize", self.base_url);
        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &params.language_code,
                name: params.voice_name.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: params.audio_encoding.as_str(),
                speaking_rate: params.speaking_rate,
                pitch: params.pitch,
            },
        };

        debug!(
            language = %params.language_code,
            encoding = params.audio_encoding.as_str(),
            chars = text.chars().count(),
            "Requesting speech synthesis"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(TtsError::Backend { status, message });
        }

        let body: SynthesizeResponse = response.json().await?;
        base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| TtsError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn voices_response_parses_api_shape() {
        let raw = r#"{
            "voices": [
                {
                    "languageCodes": ["ja-JP"],
                    "name": "ja-JP-Standard-A",
                    "ssmlGender": "FEMALE",
                    "naturalSampleRateHertz": 24000
                }
            ]
        }"#;
        let parsed: VoicesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.voices.len(), 1);
        let v = &parsed.voices[0];
        assert_eq!(v.name, "ja-JP-Standard-A");
        assert_eq!(v.language_codes, vec!["ja-JP".to_string()]);
        assert_eq!(v.natural_sample_rate_hertz, 24000);
    }

    #[test]
    fn synthesize_request_serializes_camel_case() {
        let body = SynthesizeRequest {
            input: SynthesisInput { text: "hello" },
            voice: VoiceSelection {
                language_code: "ja-JP",
                name: None,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 1.0,
                pitch: 0.0,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"]["text"], "hello");
        assert_eq!(json["voice"]["languageCode"], "ja-JP");
        assert!(json["voice"].get("name").is_none());
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(json["audioConfig"]["speakingRate"], 1.0);
    }

    #[tokio::test]
    async fn synthesize_decodes_audio_content() {
        let server = wiremock::MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fake-audio");
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/text:synthesize"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "audioContent": encoded })),
            )
            .mount(&server)
            .await;

        let tts = GoogleTts::new("test-key").with_base_url(server.uri());
        let bytes = tts
            .synthesize("hello", &SynthesisParams::default())
            .await
            .unwrap();
        assert_eq!(bytes, b"fake-audio");
    }

    #[tokio::test]
    async fn backend_error_carries_status_and_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/text:synthesize"))
            .respond_with(wiremock::ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let tts = GoogleTts::new("bad-key").with_base_url(server.uri());
        let err = tts
            .synthesize("hello", &SynthesisParams::default())
            .await
            .unwrap_err();
        match err {
            TtsError::Backend { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "permission denied");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn missing_key_is_reported() {
        std::env::remove_var("GOOGLE_TTS_API_KEY");
        assert!(matches!(
            GoogleTts::from_env(),
            Err(TtsError::MissingCredentials)
        ));
    }
}
