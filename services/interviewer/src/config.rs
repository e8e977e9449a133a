//! Application Configuration Module
//!
//! Loads the interviewer's settings from environment variables (and a `.env`
//! file during development) and turns them into the audio core's config.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use interview_audio::{AudioConfig, RecognitionOptions, SynthesisOptions};
use secrecy::SecretString;
use tracing::Level;

// --- Application Constants ---

/// Frames per callback requested from the microphone stream.
pub const INPUT_CHUNK_SIZE: usize = 1024;
/// Frames per callback requested from the speaker stream.
pub const OUTPUT_CHUNK_SIZE: usize = 1024;
/// How much audio the speaker ring buffer holds, in milliseconds.
pub const OUTPUT_LATENCY_MS: usize = 1000;

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub deepgram_api_key: SecretString,
    pub tts_model: String,
    pub stt_model: String,
    pub stt_language: String,
    pub audio_cache_dir: PathBuf,
    pub listening_window: Duration,
    pub max_pending_jobs: usize,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid number for {var}: {value}")]
    InvalidNumber { var: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `DEEPGRAM_API_KEY`: Your secret key for the Deepgram API. Required.
    // *   `TTS_MODEL`: (Optional) Voice model. Defaults to "aura-2-thalia-en".
    // *   `STT_MODEL` / `STT_LANGUAGE`: (Optional) Defaults to "nova-2" / "en".
    // *   `AUDIO_CACHE_DIR`: (Optional) Filler clip directory. Defaults to "audio_cache".
    // *   `LISTENING_WINDOW`: (Optional) Seconds to wait for an answer. Defaults to 30.
    // *   `MAX_PENDING_JOBS`: (Optional) Playback queue bound. Defaults to 32.
    // *   `INPUT_DEVICE` / `OUTPUT_DEVICE`: (Optional) Device names. Defaults to the host default.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let deepgram_api_key = lookup("DEEPGRAM_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DEEPGRAM_API_KEY".to_string()))?;

        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let listening_window = parse_number(&lookup, "LISTENING_WINDOW", 30u64)?;
        let max_pending_jobs = parse_number(&lookup, "MAX_PENDING_JOBS", 32usize)?;

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            deepgram_api_key: SecretString::from(deepgram_api_key),
            tts_model: or_default("TTS_MODEL", "aura-2-thalia-en"),
            stt_model: or_default("STT_MODEL", "nova-2"),
            stt_language: or_default("STT_LANGUAGE", "en"),
            audio_cache_dir: PathBuf::from(or_default("AUDIO_CACHE_DIR", "audio_cache")),
            listening_window: Duration::from_secs(listening_window),
            max_pending_jobs,
            input_device: lookup("INPUT_DEVICE"),
            output_device: lookup("OUTPUT_DEVICE"),
            log_level,
        })
    }

    /// The audio core configuration derived from these settings.
    pub fn audio_config(&self) -> AudioConfig {
        let mut audio = AudioConfig::default().with_filler_dir(&self.audio_cache_dir);
        audio.playback.max_pending_jobs = self.max_pending_jobs;
        audio.synthesis = SynthesisOptions {
            model: self.tts_model.clone(),
            ..SynthesisOptions::default()
        };
        audio.recognition = RecognitionOptions {
            model: self.stt_model.clone(),
            language: self.stt_language.clone(),
            ..RecognitionOptions::default()
        };
        audio
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_the_key_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DEEPGRAM_API_KEY", "dg-key")])).unwrap();

        assert_eq!(config.deepgram_api_key.expose_secret(), "dg-key");
        assert_eq!(config.tts_model, "aura-2-thalia-en");
        assert_eq!(config.stt_model, "nova-2");
        assert_eq!(config.listening_window, Duration::from_secs(30));
        assert_eq!(config.max_pending_jobs, 32);
        assert_eq!(config.audio_cache_dir, PathBuf::from("audio_cache"));
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.input_device.is_none());
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("DEEPGRAM_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DEEPGRAM_API_KEY"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DEEPGRAM_API_KEY", "dg-key"),
            ("LISTENING_WINDOW", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var, .. } if var == "LISTENING_WINDOW"));

        let err = Config::from_lookup(lookup_from(&[
            ("DEEPGRAM_API_KEY", "dg-key"),
            ("RUST_LOG", "chatty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));
    }

    #[test]
    fn test_audio_config_carries_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DEEPGRAM_API_KEY", "dg-key"),
            ("TTS_MODEL", "aura-asteria-en"),
            ("STT_LANGUAGE", "en-GB"),
            ("MAX_PENDING_JOBS", "4"),
            ("AUDIO_CACHE_DIR", "/tmp/fillers"),
        ]))
        .unwrap();

        let audio = config.audio_config();
        assert_eq!(audio.synthesis.model, "aura-asteria-en");
        assert_eq!(audio.recognition.language, "en-GB");
        assert_eq!(audio.playback.max_pending_jobs, 4);
        assert_eq!(audio.filler_dir, Some(PathBuf::from("/tmp/fillers")));
    }
}
