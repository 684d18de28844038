//! Live conversation: capture → remote, remote → scheduled playback.

pub mod schedule;
pub mod session;
pub mod state;
pub mod transcript;
pub mod transport;

pub use session::{LiveSession, SessionEvent, SessionId, SessionStats};
pub use state::SessionState;
