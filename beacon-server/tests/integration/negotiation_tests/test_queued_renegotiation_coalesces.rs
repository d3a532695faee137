use crate::integration::init_tracing;
use crate::utils::{MockTrack, TestServer, settle};

#[tokio::test]
async fn test_queued_renegotiation_coalesces() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect a");
    let mut b = server.connect().await.expect("connect b");
    a.join("r1").await.expect("join a");
    b.join("r1").await.expect("join b");

    // Three triggers: the first starts an exchange, the other two collapse
    // into a single queued follow-up.
    a.publish(MockTrack::video("t1")).await.expect("publish t1");
    a.publish(MockTrack::audio("t2")).await.expect("publish t2");
    a.publish(MockTrack::audio("t3")).await.expect("publish t3");

    b.expect_offer().await.expect("first offer");
    // Let the remaining triggers queue up before answering.
    settle().await;
    b.answer().await.expect("answer first");
    b.expect_offer().await.expect("coalesced offer");
    b.answer().await.expect("answer second");
    b.expect_silence().await.expect("no third offer");
    settle().await;

    assert_eq!(b.session.offers_created(), 2);
    assert_eq!(b.session.added_tracks().len(), 3);
}
