//! Integration tests for the outreach workflow executor.

use std::sync::Arc;

use tempfile::tempdir;

use outreach_core::{
    CheckpointStore, CoreError, DecodedReply, FileCheckpointStore, InfluencerInfo, Intent, JsonlEscalationSink,
    MemoryCheckpointStore, MemoryEscalationSink, Node, PredicateResolver, ScriptedTransport, StageId,
    StageRegistry, TemplateContentProvider, WorkflowExecutor, MIN_STEPS_FOR_FULL_RUN, STAGE_ORDER,
};

fn registry() -> StageRegistry {
    StageRegistry::standard(Arc::new(TemplateContentProvider::seeded(2024)))
}

fn influencer() -> InfluencerInfo {
    InfluencerInfo::new("Mia", "xiaohongshu")
        .with_followers(48_000)
        .with_content_type("beauty")
}

/// Every reply accepted: nine stages, then a clean finish.
#[tokio::test]
async fn test_all_accept_run_visits_every_stage() {
    let transport = ScriptedTransport::new();
    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport.clone()))
        .build()
        .unwrap();

    let outcome = executor.run("accept-all", Some(influencer())).await.unwrap();
    let state = &outcome.state;

    assert_eq!(outcome.stages_visited, STAGE_ORDER.to_vec());
    assert_eq!(outcome.steps, MIN_STEPS_FOR_FULL_RUN);
    assert!(state.workflow_complete);
    assert_eq!(state.current_stage_index, STAGE_ORDER.len() - 1);
    assert_eq!(state.current_stage, StageId::Final);
    assert!(!state.needs_human_review);
    assert!(!state.has_questions);

    // Confirmations carried forward by the later stages
    assert!(state.schedule_confirmed);
    assert!(state.product_selected);
    assert!(state.address_collected);

    assert_eq!(
        state.message_log.first().map(String::as_str),
        Some("[init] Workflow initialized - starting at GREET stage")
    );
    assert_eq!(state.latest_log(), Some("[advance] All stages completed - workflow finished"));
    assert!(state
        .message_log
        .iter()
        .any(|l| l == "[advance] Stage advanced: greet → type"));

    // One outgoing message per stage, nothing else
    let sent = transport.sent();
    assert_eq!(sent.len(), STAGE_ORDER.len());
    for (send, stage) in sent.iter().zip(STAGE_ORDER) {
        assert_eq!(send.stage, stage);
        assert!(!send.text.trim().is_empty());
    }
}

/// A question at the schedule stage is answered, not escalated.
#[tokio::test]
async fn test_question_at_schedule_is_auto_resolved() {
    let transport = ScriptedTransport::new().reply_at(StageId::Schedule, "What dates work best for you?");
    let sink = MemoryEscalationSink::new();
    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport.clone()))
        .escalation_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let outcome = executor.run("question", Some(influencer())).await.unwrap();
    let state = &outcome.state;

    assert!(state.workflow_complete);
    assert!(state.has_questions);
    assert!(!state.needs_human_review);
    assert!(sink.is_empty());
    assert_eq!(outcome.steps, MIN_STEPS_FOR_FULL_RUN + 1);

    assert!(state
        .message_log
        .iter()
        .any(|l| l == "[response_check] Intent: question, Route: question"));
    assert!(state
        .message_log
        .iter()
        .any(|l| l == "[question_handler] Question resolved for stage: schedule"));
    assert!(!state.message_log.iter().any(|l| l.starts_with("[human_escalation]")));

    // Stage message plus the answer
    assert_eq!(transport.sent_for(StageId::Schedule).len(), 2);
}

/// A decline escalates to a human but the conversation still finishes.
#[tokio::test]
async fn test_decline_escalates_and_continues() {
    let transport = ScriptedTransport::new().reply_at(StageId::Type, "Sorry, I don't do commission deals");
    let sink = MemoryEscalationSink::new();
    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport))
        .escalation_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let outcome = executor.run("decline", Some(influencer())).await.unwrap();

    assert!(outcome.state.workflow_complete);
    assert!(outcome.state.needs_human_review);
    assert_eq!(outcome.stages_visited.len(), STAGE_ORDER.len());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].thread_id, "decline");
    assert_eq!(events[0].stage, StageId::Type);
    assert_eq!(events[0].intent, Intent::Decline);
    assert_eq!(events[0].reason, "Stage: type, Intent: decline");

    // Escalated replies never populate captured details
    assert!(outcome.state.collaboration_type.is_none());
}

/// A stage with no handler is skipped without sending anything.
#[tokio::test]
async fn test_missing_handler_is_skipped() {
    let mut registry = registry();
    registry.unregister(StageId::Brief);

    let transport = ScriptedTransport::new();
    let executor = WorkflowExecutor::builder(Arc::new(registry))
        .transport(Arc::new(transport.clone()))
        .build()
        .unwrap();

    let outcome = executor.run("missing", None).await.unwrap();

    assert!(outcome.state.workflow_complete);
    assert_eq!(outcome.stages_visited.len(), STAGE_ORDER.len());
    assert!(outcome.state.message_log.iter().any(|l| l == "Unknown stage: brief"));
    assert!(transport.sent_for(StageId::Brief).is_empty());
    assert!(!transport.receives().contains(&StageId::Brief));
    assert!(outcome.steps < MIN_STEPS_FOR_FULL_RUN);
}

/// The iteration ceiling stops a run with a dedicated error.
#[tokio::test]
async fn test_iteration_limit_exceeded() {
    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .max_steps(20)
        .build()
        .unwrap();

    let err = executor.run("limited", None).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::IterationLimitExceeded { limit: 20, steps: 20 }
    ));

    let latest = executor.checkpoints().load_latest("limited").unwrap().unwrap();
    assert_eq!(latest.step, 20);
    assert!(!latest.state.workflow_complete);
}

/// State invariants hold at every saved checkpoint.
#[tokio::test]
async fn test_invariants_hold_at_every_checkpoint() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let transport = ScriptedTransport::new()
        .reply_at(StageId::Brief, "How long should the video be?")
        .reply_at(StageId::Product, "No, none of these suit my audience");
    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport))
        .checkpoints(store.clone())
        .build()
        .unwrap();

    executor.run("invariants", Some(influencer())).await.unwrap();
    let history = store.history("invariants").unwrap();
    assert!(!history.is_empty());

    for checkpoint in &history {
        checkpoint.state.check_invariants().unwrap();

        // A fresh stage never carries the previous stage's reply
        if checkpoint.next == Some(Node::StageProcessor) {
            assert!(checkpoint.state.pending_reply.is_none());
            assert!(checkpoint.state.decoded.is_none());
            assert!(checkpoint.state.intent.is_none());
            assert!(checkpoint.state.route_decision.is_none());
        }
    }

    // Completion is set once, by the final step
    let completed: Vec<_> = history.iter().filter(|c| c.state.workflow_complete).collect();
    assert_eq!(completed.len(), 1);
    assert!(completed[0].is_finished());

    // The audit trail only grows
    for pair in history.windows(2) {
        let (before, after) = (&pair[0].state.message_log, &pair[1].state.message_log);
        assert!(after.len() >= before.len());
        assert_eq!(&after[..before.len()], &before[..]);
    }
}

/// A run interrupted while waiting for a reply resumes without re-sending.
#[tokio::test]
async fn test_file_checkpoint_resume_after_transport_failure() {
    let temp = tempdir().unwrap();
    let store = Arc::new(FileCheckpointStore::new(temp.path()));

    let transport = ScriptedTransport::new();
    transport.fail_next_receive("connection dropped");

    let first = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport.clone()))
        .checkpoints(store.clone())
        .build()
        .unwrap();
    let err = first.run("resumable", Some(influencer())).await.unwrap_err();
    assert!(matches!(err, CoreError::Transport(_)));

    let latest = store.load_latest("resumable").unwrap().unwrap();
    assert_eq!(latest.next, Some(Node::AwaitResponse));
    assert!(latest.state.message_sent);

    // A fresh executor, as after a process restart
    let second = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport.clone()))
        .checkpoints(store.clone())
        .build()
        .unwrap();
    let outcome = second.resume("resumable").await.unwrap();

    assert!(outcome.state.workflow_complete);
    assert_eq!(outcome.steps, MIN_STEPS_FOR_FULL_RUN);
    assert_eq!(outcome.stages_visited.len(), STAGE_ORDER.len() - 1);
    assert_eq!(transport.sent_for(StageId::Greet).len(), 1);
    assert_eq!(transport.sent().len(), STAGE_ORDER.len());

    // Resuming a finished thread is a no-op
    let again = second.resume("resumable").await.unwrap();
    assert_eq!(again.steps, outcome.steps);
    assert!(again.stages_visited.is_empty());
    assert_eq!(again.state, outcome.state);

    assert_eq!(store.threads().unwrap(), vec!["resumable"]);
}

/// An escalation reply that fails to send is retried on resume without paging twice.
#[tokio::test]
async fn test_resume_after_escalation_reply_failure_notifies_once() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let sink = MemoryEscalationSink::new();
    let transport = ScriptedTransport::new().reply_at(StageId::Type, "Sorry, I won't do it");
    // Send 0 is the stage message, send 1 the escalation reply
    transport.fail_send(StageId::Type, 1, "connection reset");

    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport.clone()))
        .escalation_sink(Arc::new(sink.clone()))
        .checkpoints(store.clone())
        .build()
        .unwrap();

    let err = executor.run("escalated", Some(influencer())).await.unwrap_err();
    assert!(matches!(err, CoreError::Transport(_)));
    assert_eq!(sink.len(), 1);

    let latest = store.load_latest("escalated").unwrap().unwrap();
    assert_eq!(latest.next, Some(Node::HumanEscalation));
    assert!(latest.state.escalation_notified);

    let outcome = executor.resume("escalated").await.unwrap();

    assert!(outcome.state.workflow_complete);
    assert_eq!(sink.len(), 1);
    assert_eq!(transport.sent_for(StageId::Type).len(), 2);
}

/// A holding reply already sent is not repeated when the sink recovers.
#[tokio::test]
async fn test_resume_after_sink_failure_sends_holding_reply_once() {
    let sink = MemoryEscalationSink::new();
    sink.fail_next_notify("pager offline");
    let transport = ScriptedTransport::new().reply_at(StageId::Schedule, "Can the date move?");

    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport.clone()))
        .resolver(Arc::new(PredicateResolver::new(|_, _: &DecodedReply| false)))
        .escalation_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let err = executor.run("held", Some(influencer())).await.unwrap_err();
    assert!(matches!(err, CoreError::Escalation(_)));
    assert!(sink.is_empty());
    assert_eq!(transport.sent_for(StageId::Schedule).len(), 2);

    let outcome = executor.resume("held").await.unwrap();

    assert!(outcome.state.workflow_complete);
    assert!(outcome.state.needs_human_review);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.events()[0].stage, StageId::Schedule);
    assert_eq!(transport.sent_for(StageId::Schedule).len(), 2);
}

#[tokio::test]
async fn test_resume_unknown_thread() {
    let executor = WorkflowExecutor::builder(Arc::new(registry())).build().unwrap();
    let err = executor.resume("never-started").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));
}

/// Escalations land in the JSONL file next to the checkpoints.
#[tokio::test]
async fn test_escalations_are_persisted() {
    let temp = tempdir().unwrap();
    let sink = Arc::new(JsonlEscalationSink::new(temp.path().join("escalations.jsonl")));

    let transport = ScriptedTransport::new()
        .reply_at(StageId::Greet, "Not interested right now")
        .reply_at(StageId::Address, "I'd rather not share my address");
    let executor = WorkflowExecutor::builder(Arc::new(registry()))
        .transport(Arc::new(transport))
        .escalation_sink(sink.clone())
        .build()
        .unwrap();

    executor.run("persisted", None).await.unwrap();

    let events = sink.load().unwrap();
    assert_eq!(
        events.iter().map(|e| e.stage).collect::<Vec<_>>(),
        vec![StageId::Greet, StageId::Address]
    );
}
