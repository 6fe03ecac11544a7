//! End-to-end session flows over the scripted transport.

use std::sync::Arc;
use std::time::Duration;

use forge_client::{ForgeClient, MockReply, MockTransport, RetryPolicy};
use forge_session::{
    ConnectivityMonitor, ConversationSequencer, DirectorySink, ExportTrigger, LivenessState,
    MessageRole, RefinementWorkflow, SessionContext, SessionError, SubmitOutcome, OFFLINE_MESSAGE,
};
use serde_json::json;

fn client(transport: &MockTransport) -> ForgeClient {
    ForgeClient::new(
        Some("http://localhost:8000".to_string()),
        Arc::new(transport.clone()),
        RetryPolicy::default(),
    )
}

/// A refused probe gates chat until the next probe succeeds.
#[tokio::test(start_paused = true)]
async fn test_offline_then_recovered_chat() {
    let transport = MockTransport::new()
        .on("/", MockReply::refused())
        .on("/", MockReply::status(200))
        .on("/chat", MockReply::ok(json!({ "response": "Welcome back" })));
    let session = SessionContext::new();
    let client = client(&transport);
    let mut liveness = session.watch_liveness();

    let monitor = ConnectivityMonitor::new(session.clone(), client.clone()).spawn();
    let sequencer = ConversationSequencer::new(session.clone(), client);

    liveness.wait_for(|s| *s == LivenessState::Offline).await.unwrap();
    assert_eq!(sequencer.send("Build a blog").await, SubmitOutcome::Blocked);
    assert_eq!(session.last_message().unwrap().content, OFFLINE_MESSAGE);
    assert!(!transport.was_called("/chat"));

    liveness.wait_for(|s| *s == LivenessState::Online).await.unwrap();
    assert_eq!(sequencer.send("Build a blog").await, SubmitOutcome::Replied);

    let roles: Vec<_> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant
        ]
    );

    session.close();
    monitor.await.unwrap();
}

/// Generated files flow into refinement and the merged result is exported.
#[tokio::test(start_paused = true)]
async fn test_chat_refine_export_flow() {
    let transport = MockTransport::new()
        .on(
            "/chat",
            MockReply::ok(json!({
                "response": "Here is your API",
                "code_generated": [
                    { "filepath": "A.ts", "content": "1" },
                    { "filepath": "B.ts", "content": "2" }
                ],
                "build_status": "clean"
            })),
        )
        .on(
            "/refine",
            MockReply::ok(json!({
                "success": true,
                "modified_files": { "A.ts": "1'", "C.ts": "3" }
            })),
        )
        .on("/export", MockReply::bytes(200, b"PK\x05\x06".to_vec()));
    let session = SessionContext::new();
    session.set_liveness(LivenessState::Online);
    let client = client(&transport);

    let sequencer = ConversationSequencer::new(session.clone(), client.clone());
    assert_eq!(sequencer.send("Build a REST API").await, SubmitOutcome::Replied);
    assert_eq!(session.selected_file().as_deref(), Some("A.ts"));

    let refiner = RefinementWorkflow::new(session.clone(), client.clone());
    let summary = refiner.refine("Add validation").await.unwrap();
    assert_eq!(summary.updated, vec!["A.ts"]);
    assert_eq!(summary.added, vec!["C.ts"]);
    assert_eq!(session.artifacts().paths(), vec!["A.ts", "B.ts", "C.ts"]);

    let refine_body = transport.get_path_calls("/refine")[0].body.clone().unwrap();
    assert_eq!(refine_body["current_files"], json!({ "A.ts": "1", "B.ts": "2" }));

    let out = tempfile::tempdir().unwrap();
    let receipt = ExportTrigger::new(session.clone(), client, Arc::new(DirectorySink::new(out.path())))
        .export()
        .await
        .unwrap();

    assert_eq!(receipt.files, 3);
    assert_eq!(receipt.path, out.path().join("aegis_project.zip"));
    assert_eq!(std::fs::read(&receipt.path).unwrap(), b"PK\x05\x06");

    let export_body = transport.get_path_calls("/export")[0].body.clone().unwrap();
    assert_eq!(
        export_body,
        json!({ "files": { "A.ts": "1'", "B.ts": "2", "C.ts": "3" } })
    );
}

/// Disjoint chat and refine results both survive regardless of arrival order.
#[tokio::test(start_paused = true)]
async fn test_concurrent_chat_and_refine_keep_both_results() {
    let transport = MockTransport::new()
        .on(
            "/chat",
            MockReply::ok(json!({
                "response": "added the router",
                "code_generated": [{ "filepath": "router.ts", "content": "r" }]
            })),
        )
        .on(
            "/refine",
            MockReply::ok(json!({
                "success": true,
                "modified_files": { "index.ts": "i'" }
            })),
        );
    let session = SessionContext::new();
    session.set_liveness(LivenessState::Online);
    session.artifacts().merge(vec![("index.ts".to_string(), "i".to_string())]);
    let client = client(&transport);

    let sequencer = ConversationSequencer::new(session.clone(), client.clone());
    let refiner = RefinementWorkflow::new(session.clone(), client);

    let (chat, refine) = tokio::join!(sequencer.send("add a router"), refiner.refine("tidy index"));

    assert_eq!(chat, SubmitOutcome::Replied);
    assert!(refine.is_ok());
    assert_eq!(session.artifacts().get("index.ts").as_deref(), Some("i'"));
    assert_eq!(session.artifacts().get("router.ts").as_deref(), Some("r"));
    assert_eq!(session.artifacts().len(), 2);
}

/// Closing the session aborts an in-flight turn instead of waiting out the
/// request budget.
#[tokio::test(start_paused = true)]
async fn test_close_aborts_in_flight_requests() {
    let transport = MockTransport::new().on("/refine", MockReply::Hang);
    let session = SessionContext::new();
    session.artifacts().merge(vec![("a.ts".to_string(), "1".to_string())]);
    let refiner = Arc::new(RefinementWorkflow::new(session.clone(), client(&transport)));

    let pending = {
        let refiner = Arc::clone(&refiner);
        tokio::spawn(async move { refiner.refine("slow edit").await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    session.close();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::Client(_)));
    assert_eq!(transport.get_path_calls("/refine").len(), 1);
    assert_eq!(session.artifacts().get("a.ts").as_deref(), Some("1"));
}
