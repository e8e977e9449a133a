mod client;
mod error;

pub use deepgram_realtime_types as types;
pub use client::config::{Config, ConfigBuilder};
pub use client::listen::{self, ListenConnection};
pub use client::options::{ListenOptions, SpeakOptions};
pub use client::speak::{self, SpeakClient, SpeakEvent};
pub use error::Error;
