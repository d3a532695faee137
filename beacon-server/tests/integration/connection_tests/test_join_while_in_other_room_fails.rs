use crate::integration::init_tracing;
use crate::utils::TestServer;
use beacon_core::{RoomId, SignalMessage};

#[tokio::test]
async fn test_join_while_in_other_room_fails() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect");
    a.join("r1").await.expect("join r1");

    a.send(SignalMessage::Join {
        room: RoomId::from("r2"),
    })
    .await
    .expect("send second join");

    match a.recv().await.expect("rejection") {
        SignalMessage::JoinFailed { reason } => assert!(reason.contains("r1"), "{reason}"),
        other => panic!("expected join-failed, got {other:?}"),
    }

    // Prior membership is untouched and the connection still works.
    assert_eq!(
        server.service.registry().room_of(&a.id),
        Some(RoomId::from("r1"))
    );
    assert!(server.service.registry().members_of(&"r2".into()).is_empty());

    a.send(SignalMessage::Offer {
        sdp: "v=0 still-alive".to_owned(),
    })
    .await
    .expect("send offer");
    assert!(matches!(
        a.recv().await.expect("answer"),
        SignalMessage::Answer { .. }
    ));
}
