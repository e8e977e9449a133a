pub mod audio_in;
pub mod audio_out;
pub mod config;
pub mod deepgram_adapter;
pub mod fillers;
