/// `Speak` message: text to be synthesized.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakText {
    text: String,
}

impl SpeakText {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Messages the client sends on the speak socket.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum SpeakClientMessage {
    Speak(SpeakText),
    /// Asks the server to synthesize everything buffered so far.
    Flush,
    /// Discards buffered text.
    Clear,
    Close,
}

impl SpeakClientMessage {
    pub fn speak(text: &str) -> Self {
        Self::Speak(SpeakText::new(text))
    }
}

/// `Metadata` message sent once the connection is established.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakMetadata {
    request_id: String,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    model_version: Option<String>,
}

impl SpeakMetadata {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }
}

/// `Flushed` / `Cleared` acknowledgement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SequenceAck {
    #[serde(default)]
    sequence_id: u32,
}

impl SequenceAck {
    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakWarning {
    #[serde(default)]
    description: String,
    #[serde(default)]
    code: String,
}

impl SpeakWarning {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakError {
    #[serde(default)]
    err_code: String,
    #[serde(default)]
    err_msg: String,
    #[serde(default)]
    description: Option<String>,
}

impl SpeakError {
    pub fn err_code(&self) -> &str {
        &self.err_code
    }

    pub fn err_msg(&self) -> &str {
        &self.err_msg
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Text messages the server sends on the speak socket. Audio arrives as
/// binary frames and never passes through this type.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum SpeakServerMessage {
    Metadata(SpeakMetadata),
    Flushed(SequenceAck),
    Cleared(SequenceAck),
    Warning(SpeakWarning),
    Error(SpeakError),
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_carry_their_type_tag() {
        let speak = serde_json::to_value(SpeakClientMessage::speak("Hello there")).unwrap();
        assert_eq!(speak, serde_json::json!({"type": "Speak", "text": "Hello there"}));

        let flush = serde_json::to_string(&SpeakClientMessage::Flush).unwrap();
        assert_eq!(flush, r#"{"type":"Flush"}"#);
    }

    #[test]
    fn parses_server_messages() {
        let metadata: SpeakServerMessage = serde_json::from_str(
            r#"{"type":"Metadata","request_id":"5d6f1c1e","model_name":"aura-2-thalia-en","model_version":"2025-04-07","model_uuid":"ecb76e9d"}"#,
        )
        .unwrap();
        let SpeakServerMessage::Metadata(metadata) = metadata else {
            panic!("expected metadata");
        };
        assert_eq!(metadata.request_id(), "5d6f1c1e");
        assert_eq!(metadata.model_name(), Some("aura-2-thalia-en"));

        let flushed: SpeakServerMessage =
            serde_json::from_str(r#"{"type":"Flushed","sequence_id":3}"#).unwrap();
        assert!(matches!(flushed, SpeakServerMessage::Flushed(ack) if ack.sequence_id() == 3));

        let warning: SpeakServerMessage = serde_json::from_str(
            r#"{"type":"Warning","description":"Text too long","code":"TEXT_LENGTH"}"#,
        )
        .unwrap();
        assert!(matches!(warning, SpeakServerMessage::Warning(w) if w.code() == "TEXT_LENGTH"));
    }

    #[test]
    fn unknown_server_messages_do_not_fail() {
        let msg: SpeakServerMessage =
            serde_json::from_str(r#"{"type":"SomethingNew","detail":1}"#).unwrap();
        assert_eq!(msg, SpeakServerMessage::Unknown);
    }
}
