//! End-to-end orchestrator scenarios against in-memory fakes.

use std::sync::Arc;

use chrono::Utc;

use reverie_domain::{
    CompanionId, CompanionProfile, Conversation, ConversationId, ConversationMessage,
    ExecutionId, ExecutionRecord, ExecutionStatus, MessageId, SceneState,
};

use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::ports::{ConversationRepo, LlmError};
use crate::infrastructure::retry::RetryConfig;
use crate::test_fixtures::{
    InMemoryConversationRepo, InMemoryExecutionRepo, MemoryAssetStore, ScriptedLlm, StubImageGen,
};
use crate::use_cases::continuity::AnalyzeScene;
use crate::use_cases::imaging::RenderScene;
use crate::use_cases::reply::GenerateReply;
use crate::use_cases::turn::{
    ExecutionRegistry, FinalizeTurn, RunTurn, RunTurnCommand, SubmitTurn, TurnError,
};

const INITIAL_ANALYSIS: &str = r#"{"outfit": "hoodie, thong", "location": "bedroom", "action": "lounging on the bed", "is_user_present": true}"#;
const FINAL_ANALYSIS: &str = r#"{"outfit": "thong", "location": "bedroom", "action": "stretching out on the bed", "is_user_present": true}"#;

struct World {
    llm: Arc<ScriptedLlm>,
    executions: Arc<InMemoryExecutionRepo>,
    conversations: Arc<InMemoryConversationRepo>,
    registry: Arc<ExecutionRegistry>,
    image_gen: Arc<StubImageGen>,
    runner: Arc<RunTurn>,
    conversation_id: ConversationId,
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_factor: 0.0,
    }
}

fn build_world(image_gen: StubImageGen) -> World {
    let llm = Arc::new(ScriptedLlm::new());
    let executions = Arc::new(InMemoryExecutionRepo::new());
    let conversations = Arc::new(InMemoryConversationRepo::new());
    let registry = Arc::new(ExecutionRegistry::new());
    let image_gen = Arc::new(image_gen);

    let companion = CompanionProfile {
        id: CompanionId::new(),
        name: "Mira".to_string(),
        persona: "Warm and teasing.".to_string(),
        base_visual: "1girl, long red hair".to_string(),
        user_appearance: None,
    };
    let conversation = Conversation {
        id: ConversationId::new(),
        companion_id: companion.id,
        user_name: "Alex".to_string(),
        scene: SceneState::new("hoodie, thong", "bedroom", "lounging on the bed"),
        created_at: Utc::now(),
    };
    let conversation_id = conversation.id;
    conversations.add_companion(companion);
    conversations.add_conversation(conversation);

    let runner = Arc::new(RunTurn::new(
        AnalyzeScene::new(llm.clone()),
        GenerateReply::new(llm.clone(), executions.clone()),
        RenderScene::new(image_gen.clone(), Arc::new(MemoryAssetStore::new())),
        executions.clone(),
        conversations.clone(),
        registry.clone(),
        fast_retry(),
    ));

    World {
        llm,
        executions,
        conversations,
        registry,
        image_gen,
        runner,
        conversation_id,
    }
}

/// Insert the durable rows submission would have written, then run the turn.
async fn run_turn(world: &World, message: &str, generate_image: bool) -> ExecutionRecord {
    let now = Utc::now();
    let user_message = ConversationMessage::user(world.conversation_id, message, now);
    world.conversations.insert_message(&user_message).await.unwrap();

    let execution_id = ExecutionId::new();
    let record = ExecutionRecord::new(execution_id, world.conversation_id, user_message.id, now);
    world.executions.insert_record(record).await;

    let handle = world.registry.register(execution_id);
    let command = RunTurnCommand {
        execution_id,
        conversation_id: world.conversation_id,
        user_message: message.to_string(),
        source_message_id: user_message.id,
        generate_image,
    };

    world.runner.execute(command, handle).await;
    world.executions.get_record(execution_id).await.unwrap()
}

#[tokio::test]
async fn hoodie_removal_updates_scene_once_and_renders_final_outfit() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world.llm.push_stream(vec!["I slip ", "it off"]);
    world.llm.push_response(Ok(FINAL_ANALYSIS.to_string()));

    let record = run_turn(&world, "take off your hoodie", true).await;

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.progress, 100);
    assert_eq!(record.result_text.as_deref(), Some("I slip it off"));
    assert!(record.result_image_ref.is_some());

    let final_scene = record.result_scene.unwrap();
    assert_eq!(final_scene.outfit, "thong");

    // Exactly one scene write, and it is durable.
    assert_eq!(world.conversations.scene_write_count(), 1);
    let conversation = world
        .conversations
        .get(world.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.scene.outfit, "thong");

    // The render saw the post-reply outfit, not the prior one.
    let request = world.image_gen.last_request().unwrap();
    assert!(request.positive_prompt.contains("wearing thong"));
    assert!(!request.positive_prompt.contains("hoodie"));

    // Terminal turns leave the live registry.
    assert!(world.registry.get(record.id).is_none());
}

#[tokio::test]
async fn second_analysis_pass_wins_over_the_first() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world.llm.push_stream(vec!["I wander ", "to the kitchen"]);
    world.llm.push_response(Ok(
        r#"{"outfit": "hoodie, thong", "location": "kitchen", "action": "walking to the kitchen", "is_user_present": true}"#.to_string(),
    ));

    let record = run_turn(&world, "grab us a drink?", false).await;

    let final_scene = record.result_scene.unwrap();
    assert_eq!(final_scene.location, "kitchen");
    assert_eq!(final_scene.action, "walking to the kitchen");
    // Both analysis passes ran.
    assert_eq!(world.llm.generate_calls(), 2);
}

#[tokio::test]
async fn unchanged_scene_writes_nothing() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world.llm.push_stream(vec!["Just getting ", "comfy."]);
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));

    let record = run_turn(&world, "what are you up to?", false).await;

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(world.conversations.scene_write_count(), 0);
}

#[tokio::test]
async fn reply_retries_twice_then_succeeds() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world
        .llm
        .push_stream_failure(LlmError::RequestFailed("timeout".to_string()));
    world
        .llm
        .push_stream_failure(LlmError::RequestFailed("timeout".to_string()));
    world.llm.push_stream(vec!["Third time ", "lucky."]);
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));

    let record = run_turn(&world, "hey", false).await;

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.result_text.as_deref(), Some("Third time lucky."));
    assert_eq!(world.llm.stream_calls(), 3);
}

#[tokio::test]
async fn retried_reply_does_not_duplicate_streamed_text() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    // First attempt dies after streaming a partial reply.
    world
        .llm
        .push_stream_then_failure(vec!["I slip "], LlmError::Stream("connection reset".to_string()));
    world.llm.push_stream(vec!["I slip ", "it off"]);
    world.llm.push_response(Ok(FINAL_ANALYSIS.to_string()));

    let now = Utc::now();
    let user_message = ConversationMessage::user(world.conversation_id, "take off your hoodie", now);
    world.conversations.insert_message(&user_message).await.unwrap();

    let execution_id = ExecutionId::new();
    let record = ExecutionRecord::new(execution_id, world.conversation_id, user_message.id, now);
    world.executions.insert_record(record).await;

    let handle = world.registry.register(execution_id);
    let command = RunTurnCommand {
        execution_id,
        conversation_id: world.conversation_id,
        user_message: "take off your hoodie".to_string(),
        source_message_id: user_message.id,
        generate_image: false,
    };
    world.runner.execute(command, handle.clone()).await;

    let record = world.executions.get_record(execution_id).await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.result_text.as_deref(), Some("I slip it off"));
    assert_eq!(world.llm.stream_calls(), 2);

    // Neither sink holds the aborted attempt's partial text.
    assert_eq!(record.streamed_text, "I slip it off");
    assert_eq!(handle.snapshot().await.streamed_text, "I slip it off");
}

#[tokio::test]
async fn imaging_failure_fails_the_turn_but_keeps_the_reply() {
    let world = build_world(StubImageGen::failing());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world.llm.push_stream(vec!["Here you ", "go."]);
    world.llm.push_response(Ok(FINAL_ANALYSIS.to_string()));

    let record = run_turn(&world, "send me a pic", true).await;

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.error.is_some());
    // The streamed reply survives the failed render.
    assert_eq!(record.streamed_text, "Here you go.");
    // Scene persistence already happened before the render step.
    assert_eq!(world.conversations.scene_write_count(), 1);
}

#[tokio::test]
async fn analysis_exhausting_retries_fails_the_turn() {
    let world = build_world(StubImageGen::succeeding());
    for _ in 0..3 {
        world
            .llm
            .push_response(Err(LlmError::RequestFailed("refused".to_string())));
    }

    let record = run_turn(&world, "hello?", false).await;

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(world.llm.generate_calls(), 3);
}

#[tokio::test]
async fn submission_guard_rejects_second_active_turn() {
    let world = build_world(StubImageGen::succeeding());

    // An in-flight record for the conversation.
    let active = ExecutionRecord::new(
        ExecutionId::new(),
        world.conversation_id,
        MessageId::new(),
        Utc::now(),
    );
    world.executions.insert_record(active.clone()).await;

    let submit = SubmitTurn::new(
        world.executions.clone(),
        world.conversations.clone(),
        world.registry.clone(),
        Arc::new(SystemClock::new()),
        world.runner.clone(),
    );

    let err = submit
        .execute(world.conversation_id, "another one", false)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::TurnAlreadyActive(id) if id == active.id));

    let err = submit
        .execute(ConversationId::new(), "hi", false)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::ConversationNotFound));
}

#[tokio::test]
async fn submission_persists_user_message_before_running() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world.llm.push_stream(vec!["hi!"]);
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));

    let submit = SubmitTurn::new(
        world.executions.clone(),
        world.conversations.clone(),
        world.registry.clone(),
        Arc::new(SystemClock::new()),
        world.runner.clone(),
    );

    let execution_id = submit
        .execute(world.conversation_id, "hey there", false)
        .await
        .unwrap();

    // The user message is durable immediately, before the turn finishes.
    let messages = world.conversations.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hey there");

    // Wait for the spawned turn to reach a terminal state.
    for _ in 0..200 {
        if let Some(record) = world.executions.get_record(execution_id).await {
            if record.is_terminal() {
                assert_eq!(record.status, ExecutionStatus::Completed);
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("turn never reached a terminal state");
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let world = build_world(StubImageGen::succeeding());
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));
    world.llm.push_stream(vec!["Sure ", "thing."]);
    world.llm.push_response(Ok(INITIAL_ANALYSIS.to_string()));

    let record = run_turn(&world, "hey", false).await;
    assert_eq!(record.status, ExecutionStatus::Completed);

    let finalize = FinalizeTurn::new(
        world.executions.clone(),
        world.conversations.clone(),
        Arc::new(SystemClock::new()),
    );

    let first = finalize.execute(record.id).await.unwrap();
    assert!(!first.already_finalized);

    let second = finalize.execute(record.id).await.unwrap();
    assert!(second.already_finalized);
    assert_eq!(second.message_id, first.message_id);

    // Exactly one assistant message despite two calls.
    let assistant_count = world
        .conversations
        .messages()
        .iter()
        .filter(|m| m.content == "Sure thing.")
        .count();
    assert_eq!(assistant_count, 1);
}

#[tokio::test]
async fn finalize_rejects_running_and_unknown_executions() {
    let world = build_world(StubImageGen::succeeding());

    let running = ExecutionRecord::new(
        ExecutionId::new(),
        world.conversation_id,
        MessageId::new(),
        Utc::now(),
    );
    world.executions.insert_record(running.clone()).await;

    let finalize = FinalizeTurn::new(
        world.executions.clone(),
        world.conversations.clone(),
        Arc::new(SystemClock::new()),
    );

    assert!(matches!(
        finalize.execute(running.id).await.unwrap_err(),
        TurnError::NotCompleted
    ));
    assert!(matches!(
        finalize.execute(ExecutionId::new()).await.unwrap_err(),
        TurnError::ExecutionNotFound
    ));
}
