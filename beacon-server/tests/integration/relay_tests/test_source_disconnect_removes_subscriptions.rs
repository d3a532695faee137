use crate::integration::init_tracing;
use crate::utils::{MockTrack, TestServer, settle};
use beacon_core::TrackId;

#[tokio::test]
async fn test_source_disconnect_removes_subscriptions() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect a");
    let mut b = server.connect().await.expect("connect b");
    a.join("r1").await.expect("join a");
    b.join("r1").await.expect("join b");

    a.publish(MockTrack::video("t-a")).await.expect("publish");
    b.expect_offer().await.expect("offer for b");
    b.answer().await.expect("answer");
    settle().await;

    let a_session = a.session.clone();
    drop(a);
    settle().await;

    // The source going away tears its track out of every subscriber.
    let ended = b.expect_track_ended().await.expect("track-ended for b");
    assert_eq!(ended, TrackId::from("t-a"));
    b.expect_offer().await.expect("removal offer for b");
    b.answer().await.expect("answer removal");
    settle().await;

    assert!(a_session.is_closed());
    assert_eq!(b.session.removed_tracks(), vec![TrackId::from("t-a")]);
    assert!(server.service.relay().subscriptions().is_empty());
}
