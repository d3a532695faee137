use crate::integration::init_tracing;
use crate::utils::{SessionOp, TestServer, settle};
use beacon_core::{IceCandidate, SignalMessage};

#[tokio::test]
async fn test_ice_candidate_reaches_session() {
    init_tracing();
    let server = TestServer::new();

    let mut a = server.connect().await.expect("connect a");
    a.join("r1").await.expect("join");

    a.send(SignalMessage::IceCandidate {
        candidate: "candidate:1 1 UDP 2122252543 127.0.0.1 50000 typ host".to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
    })
    .await
    .expect("send candidate");
    a.send(SignalMessage::from(IceCandidate::end_of_candidates()))
        .await
        .expect("send end of candidates");
    settle().await;

    let candidates: Vec<IceCandidate> = a
        .session
        .ops()
        .into_iter()
        .filter_map(|op| match op {
            SessionOp::Candidate(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(candidates.len(), 2);
    assert!(candidates[0].candidate.starts_with("candidate:1"));
    assert!(candidates[1].is_end_of_candidates());

    // Before joining, a candidate is out of sequence and fatal.
    let mut b = server.connect().await.expect("connect b");
    b.send(SignalMessage::from(IceCandidate::end_of_candidates()))
        .await
        .expect("send premature candidate");
    let msg = b.recv().await.expect("error report");
    assert!(
        matches!(msg, SignalMessage::Error { .. }),
        "expected error, got {msg:?}"
    );
    settle().await;
    assert!(b.session.is_closed());
    assert!(b.session.ops().is_empty());
}
