use crate::integration::init_tracing;
use crate::utils::{MockTrack, TestServer, settle};
use beacon_core::TrackId;

/// Walks one room through its whole life: two members, one published
/// track, the subscriber leaving, then the source leaving.
#[tokio::test]
async fn test_full_room_lifecycle() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect a");
    let peers = a.join("r1").await.expect("join a");
    assert!(peers.is_empty());

    let mut b = server.connect().await.expect("connect b");
    let peers = b.join("r1").await.expect("join b");
    assert_eq!(peers, vec![a.id]);

    a.publish(MockTrack::video("t-a")).await.expect("publish");
    b.expect_offer().await.expect("offer for b");
    b.answer().await.expect("answer b");
    settle().await;
    assert_eq!(b.session.added_tracks(), vec![TrackId::from("t-a")]);

    // Subscriber leaves: its session closes and the source renegotiates
    // the now-dangling sender away.
    b.leave().await.expect("leave b");
    settle().await;
    assert!(b.session.is_closed());

    a.expect_offer().await.expect("cleanup offer for a");
    a.answer().await.expect("answer a");
    settle().await;
    assert!(server.service.relay().subscriptions().is_empty());

    a.leave().await.expect("leave a");
    settle().await;
    assert!(a.session.is_closed());
    assert!(server.service.registry().room_names().is_empty());
}
