use crate::integration::init_tracing;
use crate::utils::{MockTrack, TestServer, settle};
use beacon_core::TrackId;

#[tokio::test]
async fn test_late_joiner_receives_existing_tracks() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect a");
    let mut b = server.connect().await.expect("connect b");
    a.join("r1").await.expect("join a");
    b.join("r1").await.expect("join b");

    a.publish(MockTrack::video("t-a")).await.expect("publish a");
    b.expect_offer().await.expect("offer for b");
    b.answer().await.expect("answer b");

    b.publish(MockTrack::audio("t-b")).await.expect("publish b");
    a.expect_offer().await.expect("offer for a");
    a.answer().await.expect("answer a");
    settle().await;

    // A fresh member is wired up to every track already in the room. The
    // second track lands while the first offer is in flight, so it rides
    // the queued renegotiation.
    let mut c = server.connect().await.expect("connect c");
    let peers = c.join("r1").await.expect("join c");
    assert_eq!(peers.len(), 2);

    c.expect_offer().await.expect("first offer for c");
    c.answer().await.expect("first answer c");
    c.expect_offer().await.expect("queued offer for c");
    c.answer().await.expect("second answer c");
    settle().await;

    let mut added = c.session.added_tracks();
    added.sort();
    assert_eq!(added, vec![TrackId::from("t-a"), TrackId::from("t-b")]);
    assert_eq!(server.service.relay().subscriptions().len(), 4);
}
