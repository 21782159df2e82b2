use super::*;
use crate::test_support::*;
use serde_json::json;
use shared::protocol::ChatTurn;

fn tracker(api: Arc<ScriptedApi>, identity: Option<UserId>) -> Arc<IdentityScope> {
    let scope = IdentityScope::new(
        DiagnosisController::new(api.clone()),
        ChatSessionController::new(api),
    );
    scope.observe(identity);
    scope
}

#[tokio::test]
async fn chat_mount_clears_state_left_by_a_previous_view() {
    let identity = tracker(ScriptedApi::new(), Some(user("u1")));
    identity
        .chat()
        .set_history(vec![ChatTurn::user("from another view")]);

    let view = ChatScope::mount(Arc::clone(&identity));

    assert!(view.chat().snapshot().history.is_empty());
    assert_eq!(view.current(), Some(user("u1")));
}

#[tokio::test]
async fn identity_change_resets_both_controllers() {
    let api = ScriptedApi::new();
    api.push_diagnosis(Ok(json!({"summary": "u1 finances"}))).await;
    api.push_chat(Ok("hello u1".into())).await;
    let identity = tracker(api, Some(user("u1")));
    let summary = DiagnosisScope::mount(Arc::clone(&identity));
    let chat = ChatScope::mount(Arc::clone(&identity));

    summary.ensure_diagnosis().await.expect("diagnosis");
    chat.send_message("Hi").await.expect("reply");
    assert!(summary.diagnosis().snapshot().result.is_some());
    assert_eq!(chat.chat().snapshot().history.len(), 2);

    assert!(!identity.observe(Some(user("u1"))));
    assert_eq!(chat.chat().snapshot().history.len(), 2);

    assert!(identity.observe(Some(user("u2"))));
    assert_eq!(summary.diagnosis().snapshot().result, None);
    assert!(chat.chat().snapshot().history.is_empty());
    assert_eq!(chat.current(), Some(user("u2")));
}

#[tokio::test]
async fn views_of_one_client_do_not_clobber_each_other() {
    let api = ScriptedApi::new();
    api.push_diagnosis(Ok(json!({"summary": "u1 finances"}))).await;
    api.push_chat(Ok("hello".into())).await;
    let identity = tracker(api.clone(), Some(user("u1")));

    let summary = DiagnosisScope::mount(Arc::clone(&identity));
    summary.ensure_diagnosis().await.expect("diagnosis");

    {
        let chat = ChatScope::mount(Arc::clone(&identity));
        assert!(summary.diagnosis().snapshot().result.is_some());
        chat.send_message("Hi").await.expect("reply");
    }
    assert!(summary.diagnosis().snapshot().result.is_some());
    assert_eq!(api.diagnosis_call_count().await, 1);
}

#[tokio::test]
async fn identity_change_seen_by_one_view_applies_to_all() {
    let api = ScriptedApi::new();
    api.push_diagnosis(Ok(json!({"summary": "u1 finances"}))).await;
    api.push_chat(Ok("hello".into())).await;
    let identity = tracker(api.clone(), Some(user("u1")));
    let summary = DiagnosisScope::mount(Arc::clone(&identity));
    let chat = ChatScope::mount(Arc::clone(&identity));
    summary.ensure_diagnosis().await.expect("diagnosis");

    assert!(summary.observe(Some(user("u2"))));
    chat.send_message("my balance?").await.expect("reply");

    assert_eq!(chat.current(), Some(user("u2")));
    assert_eq!(
        *api.chat_calls.lock().await,
        vec![(user("u2"), "my balance?".to_string())]
    );
    assert_eq!(summary.diagnosis().snapshot().result, None);
}

#[tokio::test]
async fn logging_out_resets_and_blocks_operations() {
    let api = ScriptedApi::new();
    api.push_chat(Ok("hello".into())).await;
    let identity = tracker(api.clone(), Some(user("u1")));
    let chat = ChatScope::mount(Arc::clone(&identity));
    let summary = DiagnosisScope::mount(Arc::clone(&identity));
    chat.send_message("Hi").await.expect("reply");

    assert!(chat.observe(None));
    assert!(chat.chat().snapshot().history.is_empty());
    assert_eq!(
        chat.send_message("again").await.expect_err("no identity"),
        ChatError::Validation
    );
    assert_eq!(
        summary.ensure_diagnosis().await.expect_err("no identity"),
        DiagnosisError::Validation
    );
    assert_eq!(api.chat_call_count().await, 1);
    assert_eq!(api.diagnosis_call_count().await, 0);
}

#[tokio::test]
async fn blank_identity_counts_as_no_identity() {
    let identity = tracker(ScriptedApi::new(), Some(user("   ")));
    assert_eq!(identity.current(), None);
    assert!(!identity.observe(Some(user(""))));
}

#[tokio::test]
async fn reply_for_previous_identity_is_never_shown() {
    let api = ScriptedApi::new();
    let gate = api.gate_chat().await;
    let identity = tracker(api, Some(user("u1")));
    let view = Arc::new(ChatScope::mount(Arc::clone(&identity)));

    let task = {
        let view = Arc::clone(&view);
        tokio::spawn(async move { view.send_message("my balance?").await })
    };
    wait_until(|| view.chat().snapshot().chat_loading).await;

    identity.observe(Some(user("u2")));
    let _ = gate.send(Ok("u1 has 1000".into()));

    assert_eq!(
        task.await.expect("join").expect_err("cancelled"),
        ChatError::Cancelled
    );
    let snapshot = view.chat().snapshot();
    assert!(snapshot.history.is_empty());
    assert!(!snapshot.chat_loading);
}

#[tokio::test]
async fn dropping_a_view_tears_down_only_its_controller() {
    let api = ScriptedApi::new();
    api.push_chat(Ok("hello".into())).await;
    api.push_diagnosis(Ok(json!({"summary": "ok"}))).await;
    let identity = tracker(api, Some(user("u1")));
    let summary = DiagnosisScope::mount(Arc::clone(&identity));
    summary.ensure_diagnosis().await.expect("diagnosis");

    {
        let chat = ChatScope::mount(Arc::clone(&identity));
        chat.send_message("Hi").await.expect("reply");
    }
    assert!(identity.chat().snapshot().history.is_empty());
    assert!(identity.diagnosis().snapshot().result.is_some());

    drop(summary);
    assert_eq!(identity.diagnosis().snapshot().result, None);
}

#[tokio::test]
async fn remounting_a_view_cancels_its_pending_request() {
    let api = ScriptedApi::new();
    let gate = api.gate_diagnosis().await;
    let identity = tracker(api, Some(user("u1")));
    let summary = Arc::new(DiagnosisScope::mount(Arc::clone(&identity)));

    let task = {
        let summary = Arc::clone(&summary);
        tokio::spawn(async move { summary.ensure_diagnosis().await })
    };
    wait_until(|| identity.diagnosis().snapshot().loading).await;

    let _remount = DiagnosisScope::mount(Arc::clone(&identity));
    let _ = gate.send(Ok(json!({"summary": "late"})));

    assert_eq!(
        task.await.expect("join").expect_err("cancelled"),
        DiagnosisError::Cancelled
    );
    assert_eq!(identity.diagnosis().snapshot().result, None);
    assert!(!identity.diagnosis().snapshot().loading);
}
