use crate::integration::init_tracing;
use crate::utils::MockTrack;
use beacon_core::{ConnectionId, RoomId};
use beacon_server::{ConnectionCommand, MediaRelay, RoomRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A join racing a publish must never lose the track: either the publish
/// sees the joiner in the member list, or the joiner's sync sees the
/// published track.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_join_and_publish_wires_joiner() {
    init_tracing();

    for _ in 0..200 {
        let registry = Arc::new(RoomRegistry::new());
        let relay = Arc::new(MediaRelay::<MockTrack>::new(Arc::clone(&registry)));

        let source = ConnectionId::new();
        let joiner = ConnectionId::new();
        let (source_tx, _source_rx) = mpsc::channel(8);
        let (joiner_tx, mut joiner_rx) = mpsc::channel(8);
        relay.register(source, source_tx);
        relay.register(joiner, joiner_tx);
        registry.join(source, RoomId::from("r1")).unwrap();

        let join = tokio::spawn({
            let registry = Arc::clone(&registry);
            let relay = Arc::clone(&relay);
            async move {
                let peers = registry.join(joiner, RoomId::from("r1")).unwrap();
                relay.sync_new_member(joiner, &peers).await;
            }
        });
        let publish = tokio::spawn({
            let relay = Arc::clone(&relay);
            async move {
                relay.publish(source, MockTrack::video("t-a")).await;
            }
        });
        join.await.unwrap();
        publish.await.unwrap();

        let subscriptions = relay.subscriptions();
        assert_eq!(subscriptions.len(), 1, "joiner missed the track");
        assert_eq!(subscriptions[0].source, source);
        assert_eq!(subscriptions[0].destination, joiner);

        // Dedup still holds under the race: exactly one forward.
        let cmd = joiner_rx.try_recv().expect("joiner got no track");
        assert!(matches!(cmd, ConnectionCommand::AddTrack { .. }));
        assert!(joiner_rx.try_recv().is_err());
    }
}
