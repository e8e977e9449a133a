/// Control messages the client sends on the listen socket. Audio itself is
/// sent as binary frames.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ListenClientMessage {
    /// Keeps the connection open while no audio is being sent.
    KeepAlive,
    /// Flushes pending audio into a final result.
    Finalize,
    /// Tells the server no more audio will follow.
    CloseStream,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Word {
    word: String,
    start: f64,
    end: f64,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    punctuated_word: Option<String>,
}

impl Word {
    pub fn word(&self) -> &str {
        self.punctuated_word.as_deref().unwrap_or(&self.word)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Alternative {
    transcript: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    words: Vec<Word>,
}

impl Alternative {
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultChannel {
    alternatives: Vec<Alternative>,
}

impl ResultChannel {
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }
}

/// `Results` message: an interim or final transcript for a span of audio.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultsEvent {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    duration: f64,
    /// The transcript for this span will not change any more.
    #[serde(default)]
    is_final: bool,
    /// The speaker paused long enough to end the current phrase.
    #[serde(default)]
    speech_final: bool,
    #[serde(default)]
    from_finalize: bool,
    channel: ResultChannel,
}

impl ResultsEvent {
    /// The best alternative's transcript, or an empty string.
    pub fn transcript(&self) -> &str {
        self.channel
            .alternatives
            .first()
            .map(Alternative::transcript)
            .unwrap_or("")
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn speech_final(&self) -> bool {
        self.speech_final
    }

    pub fn from_finalize(&self) -> bool {
        self.from_finalize
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn channel(&self) -> &ResultChannel {
        &self.channel
    }
}

/// `UtteranceEnd` message: no words were heard for `utterance_end_ms`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UtteranceEndEvent {
    #[serde(default)]
    channel: Vec<u32>,
    #[serde(default)]
    last_word_end: f64,
}

impl UtteranceEndEvent {
    pub fn last_word_end(&self) -> f64 {
        self.last_word_end
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeechStartedEvent {
    #[serde(default)]
    channel: Vec<u32>,
    #[serde(default)]
    timestamp: f64,
}

impl SpeechStartedEvent {
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ListenMetadata {
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    channels: u32,
}

impl ListenMetadata {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ListenServerMessage {
    Results(ResultsEvent),
    UtteranceEnd(UtteranceEndEvent),
    SpeechStarted(SpeechStartedEvent),
    Metadata(ListenMetadata),
    #[serde(other)]
    Unknown,
}
