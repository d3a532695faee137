use crate::integration::init_tracing;
use crate::utils::{MockTrack, TestServer, settle};
use beacon_core::TrackId;

#[tokio::test]
async fn test_duplicate_publish_is_deduplicated() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect a");
    let mut b = server.connect().await.expect("connect b");
    a.join("r1").await.expect("join a");
    b.join("r1").await.expect("join b");

    a.publish(MockTrack::audio("t-a")).await.expect("publish");
    a.publish(MockTrack::audio("t-a")).await.expect("republish");

    b.expect_offer().await.expect("offer for b");
    settle().await;

    // The second publish of the same (source, track) pair is a no-op.
    assert_eq!(b.session.added_tracks(), vec![TrackId::from("t-a")]);
    assert_eq!(server.service.relay().subscriptions().len(), 1);

    b.answer().await.expect("answer");
    b.expect_silence().await.expect("no second offer");
}
