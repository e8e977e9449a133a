use std::time::Duration;

pub const DEEPGRAM_API_KEY: &str = "DEEPGRAM_API_KEY";

pub const BASE_URL: &str = "wss://api.deepgram.com/v1";
pub const SPEAK_PATH: &str = "speak";
pub const LISTEN_PATH: &str = "listen";

pub const DEFAULT_SPEAK_MODEL: &str = "aura-2-thalia-en";
pub const DEFAULT_LISTEN_MODEL: &str = "nova-2";

pub const AUTHORIZATION_HEADER: &str = "Authorization";

// Deepgram drops a listen socket after ~10s without audio or a KeepAlive.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
