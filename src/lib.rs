pub mod audio;
pub mod config;
pub mod error;
pub mod live;
pub mod production;
pub mod subtitle;

// Re-export the main entry points for convenient access
pub use live::LiveSession;
pub use production::{render_production, Production};
