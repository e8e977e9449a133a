//message types for Deepgram's streaming speak and listen websockets
pub mod listen;
pub mod speak;

//re-export types for easier access
pub use listen::{ListenClientMessage, ListenServerMessage, ResultsEvent};
pub use speak::{SpeakClientMessage, SpeakServerMessage};
