mod media_relay;
mod subscription;

pub use media_relay::MediaRelay;
pub use subscription::Subscription;
