use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::tts::{AudioEncoding, SynthesisParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Days a schedule fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

/// Wall-clock trigger time, parsed from "HH:MM" (24h).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTime {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for ScheduleTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let (Some(hour), Some(minute), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err("time must be in HH:MM format".to_string());
        };
        let hour: u8 = hour
            .parse()
            .map_err(|_| "time must be in HH:MM format".to_string())?;
        let minute: u8 = minute
            .parse()
            .map_err(|_| "time must be in HH:MM format".to_string())?;
        if hour > 23 || minute > 59 {
            return Err("time must be a valid 24h time".to_string());
        }
        Ok(ScheduleTime { hour, minute })
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl<'de> Deserialize<'de> for ScheduleTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for ScheduleTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One recurring spoken message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    pub time: ScheduleTime,
    pub days: Vec<Weekday>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub schedules: Vec<Schedule>,
}

/// Loads and validates the schedule config from a JSON file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = read_config_file(path)?;
    let cfg: AppConfig = serde_json::from_str(&raw)?;
    Ok(cfg)
}

/// Voice settings, loadable from a JSON file to override CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub language_code: String,
    pub voice_name: Option<String>,
    pub speaking_rate: f64,
    pub pitch: f64,
    pub audio_encoding: AudioEncoding,
}

impl Default for VoiceConfig {
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

impl VoiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.25..=4.0).contains(&self.speaking_rate) {
            return Err(ConfigError::Validation(format!(
                "speaking_rate must be between 0.25 and 4.0, got: {}",
                self.speaking_rate
            )));
        }
        if !(-20.0..=20.0).contains(&self.pitch) {
            return Err(ConfigError::Validation(format!(
                "pitch must be between -20.0 and 20.0 semitones, got: {}",
                self.pitch
            )));
        }
        Ok(())
    }

    pub fn to_params(&self) -> SynthesisParams {
        SynthesisParams {
            language_code: self.language_code.clone(),
            voice_name: self.voice_name.clone(),
            speaking_rate: self.speaking_rate,
            pitch: self.pitch,
            audio_encoding: self.audio_encoding,
        }
    }
}

pub fn load_voice_config(path: &Path) -> Result<VoiceConfig, ConfigError> {
    let raw = read_config_file(path)?;
    let cfg: VoiceConfig = serde_json::from_str(&raw)?;
    cfg.validate()?;
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_json(dir: &tempfile::TempDir, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn valid_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "cfg.json",
            &serde_json::json!({
                "schedules": [
                    {"name": "Test", "time": "09:30", "days": ["mon", "wed"], "message": "Hello"}
                ]
            }),
        );

        let cfg = load_config(&path).unwrap();
        let s = &cfg.schedules[0];
        assert_eq!(s.time, ScheduleTime { hour: 9, minute: 30 });
        assert_eq!(s.days, vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(s.message, "Hello");
    }

    #[test]
    fn invalid_time_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "cfg.json",
            &serde_json::json!({
                "schedules": [
                    {"name": "Bad", "time": "25:00", "days": ["mon"], "message": "Hi"}
                ]
            }),
        );

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn schedule_time_round_trips() {
        let t: ScheduleTime = "05:07".parse().unwrap();
        assert_eq!(t.to_string(), "05:07");
        assert!("7:5:3".parse::<ScheduleTime>().is_err());
        assert!("ab:cd".parse::<ScheduleTime>().is_err());
        assert!("12:60".parse::<ScheduleTime>().is_err());
    }

    #[test]
    fn voice_config_loads_and_normalizes_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "voice.json",
            &serde_json::json!({
                "language_code": "ja-JP",
                "voice_name": "ja-JP-Standard-A",
                "speaking_rate": 1.2,
                "pitch": -3.5,
                "audio_encoding": "mp3"
            }),
        );

        let cfg = load_voice_config(&path).unwrap();
        assert_eq!(cfg.voice_name.as_deref(), Some("ja-JP-Standard-A"));
        assert_eq!(cfg.speaking_rate, 1.2);
        assert_eq!(cfg.pitch, -3.5);
        assert_eq!(cfg.audio_encoding, AudioEncoding::Mp3);
    }

    #[test]
    fn voice_config_rejects_unknown_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "voice.json",
            &serde_json::json!({"language_code": "ja-JP", "audio_encoding": "FLAC"}),
        );
        assert!(matches!(load_voice_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn voice_config_rejects_out_of_range_pitch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "voice.json",
            &serde_json::json!({"language_code": "ja-JP", "pitch": 30.0}),
        );
        assert!(matches!(
            load_voice_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }
}
