pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod relay;
pub mod session;
pub mod signaling;

pub use config::SessionConfig;
pub use connection::{Connection, ConnectionCommand};
pub use error::SignalingError;
pub use registry::RoomRegistry;
pub use relay::{MediaRelay, Subscription};
pub use session::{
    MediaTrack, PeerSession, SessionDescription, SessionError, SessionEvent, SessionFactory,
};
pub use signaling::{SignalingService, router};
