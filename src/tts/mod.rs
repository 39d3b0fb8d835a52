//! Text-to-speech backends behind a common `Synthesizer` trait.
//!
//! The real backend is [`GoogleTts`] (Google Cloud TTS REST API); tests use
//! deterministic doubles. The disk cache wraps any `Synthesizer` without
//! knowing which backend sits behind it.

pub mod google;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

pub use google::GoogleTts;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("GOOGLE_TTS_API_KEY is not set; configure Google Cloud TTS credentials")]
    MissingCredentials,

    #[error("Failed to decode audio payload: {0}")]
    Decode(String),

    #[error("Unsupported audio encoding: {0}. Use MP3, LINEAR16, or OGG_OPUS")]
    UnsupportedEncoding(String),
}

/// Output formats supported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    Mp3,
    Linear16,
    OggOpus,
}

impl AudioEncoding {
    /// Wire name as the backend API expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "MP3",
            AudioEncoding::Linear16 => "LINEAR16",
            AudioEncoding::OggOpus => "OGG_OPUS",
        }
    }

    /// File extension (with dot) for audio in this encoding.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => ".mp3",
            AudioEncoding::Linear16 => ".wav",
            AudioEncoding::OggOpus => ".ogg",
        }
    }
}

impl FromStr for AudioEncoding {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MP3" => Ok(AudioEncoding::Mp3),
            "LINEAR16" => Ok(AudioEncoding::Linear16),
            "OGG_OPUS" => Ok(AudioEncoding::OggOpus),
            other => Err(TtsError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for AudioEncoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for AudioEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Voice parameters for one synthesis request.
#[derive(Debug, Clone)]
pub struct SynthesisParams {
    pub language_code: String,
    pub voice_name: Option<String>,
    pub speaking_rate: f64,
    pub pitch: f64,
    pub audio_encoding: AudioEncoding,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            language_code: "ja-JP".to_string(),
            voice_name: None,
            speaking_rate: 1.0,
            pitch: 0.0,
            audio_encoding: AudioEncoding::Mp3,
        }
    }
}

/// Common seam for all TTS backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes `text` into audio bytes in the requested encoding.
    async fn synthesize(&self, text: &str, params: &SynthesisParams) -> Result<Vec<u8>, TtsError>;
}

/// One voice as reported by the backend's voice listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    pub name: String,
    pub language_codes: Vec<String>,
    #[serde(default)]
    pub ssml_gender: String,
    #[serde(default)]
    pub natural_sample_rate_hertz: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encoding_parses_case_insensitively() {
        assert_eq!("mp3".parse::<AudioEncoding>().unwrap(), AudioEncoding::Mp3);
        assert_eq!(
            "LINEAR16".parse::<AudioEncoding>().unwrap(),
            AudioEncoding::Linear16
        );
        assert_eq!(
            "ogg_opus".parse::<AudioEncoding>().unwrap(),
            AudioEncoding::OggOpus
        );
        assert!("FLAC".parse::<AudioEncoding>().is_err());
    }

    #[test]
    fn encoding_maps_to_extension() {
        assert_eq!(AudioEncoding::Mp3.extension(), ".mp3");
        assert_eq!(AudioEncoding::Linear16.extension(), ".wav");
        assert_eq!(AudioEncoding::OggOpus.extension(), ".ogg");
    }
}
