mod peer_session;
pub mod rtc;

pub use peer_session::{
    MediaTrack, PeerSession, SessionDescription, SessionError, SessionEvent, SessionFactory,
};
pub use rtc::{RtcPeerSession, RtcSessionFactory, RtcTrack};
