use crate::client::consts::{DEFAULT_LISTEN_MODEL, DEFAULT_SPEAK_MODEL};

/// Query parameters for the speak socket.
#[derive(Debug, Clone)]
pub struct SpeakOptions {
    model: String,
    encoding: String,
    sample_rate: u32,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_SPEAK_MODEL.to_string(),
            encoding: "linear16".to_string(),
            sample_rate: 24_000,
        }
    }
}

impl SpeakOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = encoding.to_string();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model", self.model.clone()),
            ("encoding", self.encoding.clone()),
            ("sample_rate", self.sample_rate.to_string()),
        ]
    }
}

/// Query parameters for the listen socket.
#[derive(Debug, Clone)]
pub struct ListenOptions {
    model: String,
    language: String,
    encoding: String,
    sample_rate: u32,
    channels: u16,
    /// Silence in ms before a fragment is finalized.
    endpointing_ms: u32,
    /// Silence in ms before an `UtteranceEnd` is sent. Requires interim results.
    utterance_end_ms: u32,
    interim_results: bool,
    smart_format: bool,
    filler_words: bool,
    vad_events: bool,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_LISTEN_MODEL.to_string(),
            language: "en".to_string(),
            encoding: "linear16".to_string(),
            sample_rate: 16_000,
            channels: 1,
            endpointing_ms: 300,
            utterance_end_ms: 1000,
            interim_results: true,
            smart_format: true,
            filler_words: true,
            vad_events: true,
        }
    }
}

impl ListenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_endpointing_ms(mut self, endpointing_ms: u32) -> Self {
        self.endpointing_ms = endpointing_ms;
        self
    }

    pub fn with_utterance_end_ms(mut self, utterance_end_ms: u32) -> Self {
        self.utterance_end_ms = utterance_end_ms;
        self
    }

    pub fn with_filler_words(mut self, filler_words: bool) -> Self {
        self.filler_words = filler_words;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model", self.model.clone()),
            ("language", self.language.clone()),
            ("encoding", self.encoding.clone()),
            ("sample_rate", self.sample_rate.to_string()),
            ("channels", self.channels.to_string()),
            ("endpointing", self.endpointing_ms.to_string()),
            ("utterance_end_ms", self.utterance_end_ms.to_string()),
            ("interim_results", self.interim_results.to_string()),
            ("smart_format", self.smart_format.to_string()),
            ("filler_words", self.filler_words.to_string()),
            ("vad_events", self.vad_events.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_defaults_request_utterance_end_events() {
        let query = ListenOptions::default().query();
        assert!(query.contains(&("utterance_end_ms", "1000".to_string())));
        assert!(query.contains(&("interim_results", "true".to_string())));
        assert!(query.contains(&("sample_rate", "16000".to_string())));
    }

    #[test]
    fn speak_options_override_model() {
        let options = SpeakOptions::new().with_model("aura-asteria-en");
        assert_eq!(options.query()[0], ("model", "aura-asteria-en".to_string()));
    }
}
