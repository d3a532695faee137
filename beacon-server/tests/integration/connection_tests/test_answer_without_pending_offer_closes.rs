use crate::integration::init_tracing;
use crate::utils::{TestServer, settle};
use beacon_core::SignalMessage;

#[tokio::test]
async fn test_answer_without_pending_offer_closes() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect");
    a.join("r1").await.expect("join");

    a.answer().await.expect("send stray answer");

    let msg = a.recv().await.expect("error report");
    assert!(
        matches!(msg, SignalMessage::Error { .. }),
        "expected error, got {msg:?}"
    );

    settle().await;
    assert!(a.session.is_closed());
    // Teardown removed the only member, so the room is gone.
    assert!(server.service.registry().room_names().is_empty());
}
