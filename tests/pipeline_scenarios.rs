//! End-to-end chat turns through the orchestrator with scripted engines.
//!
//! The fakes record every call so each scenario can assert which paths
//! reached the reasoning or embedding service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use taskwise::embedding::Embedder;
use taskwise::llm::{LlmError, Message, ReasoningEngine, RequestOptions, Role};
use taskwise::pipeline::Stage;
use taskwise::{
    Action, AssistantError, ChatMessage, ChatRequest, IntentTag, Orchestrator, PipelineContext,
    PipelineSettings, Priority, Task, TimeBlock,
};

// ────────────────────────────────────────────────────────────────────────────
// Fakes
// ────────────────────────────────────────────────────────────────────────────

/// Replays queued replies in order; repeats the last one once drained.
#[derive(Default)]
struct ScriptedReasoner {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    last: Mutex<Option<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedReasoner {
    fn new(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    fn json(value: serde_json::Value) -> Arc<Self> {
        Self::new([Ok(value.to_string())])
    }

    fn unused() -> Arc<Self> {
        Self::new([])
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call(&self, i: usize) -> Vec<Message> {
        self.calls.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_text(
        &self,
        messages: &[Message],
        _options: &RequestOptions,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(LlmError::ProviderError("no scripted reply".into())))
    }
}

/// Bag-of-words embedder over a fixed vocabulary.
struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    calls: AtomicUsize,
    fail: bool,
}

impl KeywordEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            vocabulary: vec![
                "milk", "meeting", "team", "client", "gym", "dentist", "report", "mom",
            ],
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            vocabulary: Vec::new(),
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
            .collect();
        // constant component keeps every vector non-zero
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::RequestError("embedding service unreachable".into()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn task(id: &str, title: &str) -> Task {
    Task {
        id: id.into(),
        title: title.into(),
        description: None,
        is_completed: false,
        priority: None,
        creation_date: Utc.with_ymd_and_hms(2024, 2, 20, 9, 0, 0).unwrap(),
        deadline: None,
        predicted_duration_in_minutes: None,
    }
}

fn block(id: &str, task_id: &str, hour: u32) -> TimeBlock {
    TimeBlock {
        id: id.into(),
        task_id: task_id.into(),
        start_time: Utc.with_ymd_and_hms(2024, 3, 2, hour, 0, 0).unwrap(),
        duration_in_minutes: 60,
    }
}

fn request(tasks: Vec<Task>, utterance: &str) -> ChatRequest {
    ChatRequest::new(tasks, vec![ChatMessage::user(utterance)])
}

fn orchestrator(reasoner: &Arc<ScriptedReasoner>, embedder: &Arc<KeywordEmbedder>) -> Orchestrator {
    Orchestrator::new(PipelineContext::new(reasoner.clone(), embedder.clone()))
}

// ────────────────────────────────────────────────────────────────────────────
// Pattern router shortcut
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn simple_create_needs_no_model_call() {
    let reasoner = ScriptedReasoner::unused();
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(vec![], "Add a task to buy milk"), now())
        .await
        .unwrap();

    assert_eq!(outcome.intent, IntentTag::CreateTask);
    assert_eq!(outcome.stages, vec![Stage::IntentRouter, Stage::FinalResponse]);
    assert_eq!(
        outcome.response.chat_response,
        "OK, I've added 'buy milk' to your list."
    );
    match outcome.response.actions.as_slice() {
        [Action::CreateTask { task }] => {
            assert_eq!(task.title, "buy milk");
            assert!(!task.is_completed);
            assert!(!task.id.is_empty());
        }
        other => panic!("expected one createTask, got {other:?}"),
    }
    assert_eq!(reasoner.call_count(), 0);
    assert_eq!(embedder.call_count(), 0);
}

#[tokio::test]
async fn create_with_date_goes_to_agent() {
    let reasoner = ScriptedReasoner::json(json!({
        "response_message": "Added your dentist appointment for tomorrow.",
        "actions": [{
            "action_type": "createTask",
            "payload": {"task": {
                "id": "new-task-uuid",
                "title": "Dentist appointment",
                "deadline": "2024-03-02T15:00:00Z"
            }}
        }]
    }));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(
            &request(vec![task("t1", "Buy milk")], "add dentist appointment tomorrow at 3pm"),
            now(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.intent, IntentTag::AgentFallback);
    assert_eq!(
        outcome.stages,
        vec![
            Stage::IntentRouter,
            Stage::PromptPreparation,
            Stage::CandidateRetrieval,
            Stage::GeneralAgent,
            Stage::FinalResponse,
        ]
    );
    assert_eq!(reasoner.call_count(), 1);
    // creation vocabulary skips task retrieval, and there are no time blocks
    assert_eq!(embedder.call_count(), 0);

    let messages = reasoner.call(0);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.contains("Current date and time (UTC): 2024-03-01T12:00:00Z"));
    assert!(messages[0].content.contains("- ID: t1, Title: 'Buy milk'"));
    assert!(messages[1].content.ends_with("User's latest message: 'add dentist appointment tomorrow at 3pm'"));

    match outcome.response.actions.as_slice() {
        [Action::CreateTask { task }] => {
            assert_eq!(task.title, "Dentist appointment");
            assert_eq!(task.deadline, Some(Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap()));
            assert_eq!(task.creation_date, now());
        }
        other => panic!("expected one createTask, got {other:?}"),
    }
}

#[tokio::test]
async fn recurring_and_relative_creates_go_to_agent() {
    for utterance in [
        "add call mom in an hour",
        "add go to the gym every week",
        "add water the plants daily",
        "add pay rent in May",
        "add submit report in a few days",
    ] {
        let reasoner = ScriptedReasoner::json(json!({"response_message": "Noted.", "actions": []}));
        let embedder = KeywordEmbedder::new();
        let outcome = orchestrator(&reasoner, &embedder)
            .run_at(&request(vec![], utterance), now())
            .await
            .unwrap();

        assert_eq!(outcome.intent, IntentTag::AgentFallback, "{utterance}");
        assert!(outcome.stages.contains(&Stage::GeneralAgent), "{utterance}");
        assert_eq!(reasoner.call_count(), 1, "{utterance}");
    }
}

#[tokio::test]
async fn disabled_router_sends_everything_to_agent() {
    let reasoner = ScriptedReasoner::json(json!({"response_message": "Done.", "actions": []}));
    let embedder = KeywordEmbedder::new();
    let ctx = PipelineContext::new(reasoner.clone(), embedder.clone()).with_parser(None);
    let outcome = Orchestrator::new(ctx)
        .run_at(&request(vec![], "add buy milk"), now())
        .await
        .unwrap();

    assert_eq!(outcome.intent, IntentTag::AgentFallback);
    assert_eq!(reasoner.call_count(), 1);
    assert_eq!(outcome.response.chat_response, "Done.");
}

// ────────────────────────────────────────────────────────────────────────────
// Focused resolver
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_with_no_tasks_makes_no_model_call() {
    let reasoner = ScriptedReasoner::unused();
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(vec![], "delete the dentist appointment"), now())
        .await
        .unwrap();

    assert_eq!(outcome.intent, IntentTag::DeleteTask);
    assert_eq!(
        outcome.stages,
        vec![
            Stage::IntentRouter,
            Stage::CandidateRetrieval,
            Stage::FocusedResolver,
            Stage::FinalResponse,
        ]
    );
    assert_eq!(
        outcome.response.chat_response,
        "I couldn't find any tasks matching your request."
    );
    assert!(outcome.response.actions.is_empty());
    assert_eq!(reasoner.call_count(), 0);
    assert_eq!(embedder.call_count(), 0);
}

#[tokio::test]
async fn toggle_resolves_selected_candidate() {
    let reasoner = ScriptedReasoner::json(json!({"id": "t2"}));
    let embedder = KeywordEmbedder::new();
    let tasks = vec![
        task("t1", "Buy milk"),
        task("t2", "Client meeting"),
        task("t3", "Write report"),
    ];
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(tasks, "mark the client meeting as done"), now())
        .await
        .unwrap();

    assert_eq!(outcome.intent, IntentTag::ToggleTask);
    assert_eq!(
        outcome.response.actions,
        vec![Action::ToggleTaskCompletion { id: "t2".into() }]
    );
    assert_eq!(
        outcome.response.chat_response,
        "OK, I've toggled the completion status of 'Client meeting'."
    );
    assert_eq!(reasoner.call_count(), 1);
    let prompt = &reasoner.call(0)[0];
    assert_eq!(prompt.role, Role::User);
    assert!(prompt.content.contains("t2"));
}

#[tokio::test]
async fn ambiguous_toggle_asks_for_clarification() {
    let reasoner = ScriptedReasoner::json(json!({"id": null}));
    let embedder = KeywordEmbedder::new();
    let tasks = vec![
        task("t1", "Team meeting"),
        task("t2", "Client meeting"),
        task("t3", "Buy milk"),
    ];
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(tasks, "mark the meeting as done"), now())
        .await
        .unwrap();

    let reply = &outcome.response.chat_response;
    assert!(outcome.response.actions.is_empty());
    assert!(reply.contains("more than one"), "{reply}");
    assert!(reply.contains("'Team meeting'"), "{reply}");
    assert!(reply.contains("'Client meeting'"), "{reply}");
    assert!(!reply.contains("Buy milk"), "{reply}");
}

#[tokio::test]
async fn resolver_id_outside_candidates_emits_nothing() {
    let reasoner = ScriptedReasoner::json(json!({"id": "made-up"}));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(
            &request(vec![task("t1", "Buy milk")], "delete the milk task"),
            now(),
        )
        .await
        .unwrap();

    assert!(outcome.response.actions.is_empty());
    assert!(outcome.response.chat_response.contains("more specific"));
}

#[tokio::test]
async fn undecodable_resolver_output_degrades_to_clarification() {
    let reasoner = ScriptedReasoner::new([Ok("I think it's the milk one".to_owned())]);
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(
            &request(vec![task("t1", "Buy milk")], "remove buy milk"),
            now(),
        )
        .await
        .unwrap();

    assert!(outcome.response.actions.is_empty());
    assert_eq!(
        outcome.response.chat_response,
        "I had trouble understanding which task you meant. Could you be more specific?"
    );
}

#[tokio::test]
async fn cancel_session_removes_time_block() {
    let reasoner = ScriptedReasoner::json(json!({"id": "b1"}));
    let embedder = KeywordEmbedder::new();
    let tasks = vec![task("t1", "Gym"), task("t2", "Write report")];
    let req = request(tasks, "cancel my gym session")
        .with_time_blocks(vec![block("b1", "t1", 18), block("b2", "t2", 9)]);

    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&req, now())
        .await
        .unwrap();

    assert_eq!(outcome.intent, IntentTag::DeleteTimeBlock);
    assert_eq!(
        outcome.response.actions,
        vec![Action::DeleteTimeBlock { id: "b1".into() }]
    );
    assert_eq!(
        outcome.response.chat_response,
        "OK, I've removed the time block for 'Gym'."
    );
}

#[tokio::test]
async fn repeated_turn_gives_identical_response() {
    let reasoner = ScriptedReasoner::json(json!({"id": "t1"}));
    let embedder = KeywordEmbedder::new();
    let orchestrator = orchestrator(&reasoner, &embedder);
    let req = request(vec![task("t1", "Buy milk"), task("t2", "Call mom")], "delete buy milk");

    let first = orchestrator.run_at(&req, now()).await.unwrap();
    let second = orchestrator.run_at(&req, now()).await.unwrap();
    assert_eq!(first, second);
}

// ────────────────────────────────────────────────────────────────────────────
// General agent + normalizer
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scheduling_unknown_task_creates_it_first() {
    let reasoner = ScriptedReasoner::json(json!({
        "response_message": "I've created 'Gym' and scheduled it for tomorrow at 6pm.",
        "actions": [
            {"action_type": "createTask", "payload": {"task": {"id": "new-task-uuid", "title": "Gym"}}},
            {"action_type": "createTimeBlock", "payload": {
                "task_id": "new-task-uuid",
                "start_time": "2024-03-02T18:00:00Z",
                "duration_in_minutes": 60
            }}
        ]
    }));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(
            &request(vec![task("t1", "Buy milk")], "schedule gym for tomorrow at 6pm"),
            now(),
        )
        .await
        .unwrap();

    match outcome.response.actions.as_slice() {
        [
            Action::CreateTask { task },
            Action::CreateTimeBlock {
                task_id,
                start_time,
                duration_in_minutes,
            },
        ] => {
            assert_eq!(task.title, "Gym");
            assert_eq!(task_id, &task.id);
            assert_eq!(*start_time, Utc.with_ymd_and_hms(2024, 3, 2, 18, 0, 0).unwrap());
            assert_eq!(*duration_in_minutes, 60);
        }
        other => panic!("expected createTask then createTimeBlock, got {other:?}"),
    }
}

#[tokio::test]
async fn colliding_create_id_leaves_existing_task_schedule_alone() {
    let reasoner = ScriptedReasoner::json(json!({
        "response_message": "Added 'Gym' and scheduled 'Buy milk'.",
        "actions": [
            {"action_type": "createTask", "payload": {"task": {"id": "t1", "title": "Gym"}}},
            {"action_type": "createTimeBlock", "payload": {
                "task_id": "t1",
                "start_time": "2024-03-02T18:00:00Z",
                "duration_in_minutes": 30
            }}
        ]
    }));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(vec![task("t1", "Buy milk")], "plan gym tomorrow"), now())
        .await
        .unwrap();

    match outcome.response.actions.as_slice() {
        [Action::CreateTask { task }, Action::CreateTimeBlock { task_id, .. }] => {
            assert_ne!(task.id, "t1");
            assert_eq!(task_id, "t1");
        }
        other => panic!("unexpected actions {other:?}"),
    }
}

#[tokio::test]
async fn update_carries_every_field() {
    let mut original = task("t1", "Buy milk");
    original.priority = Some(Priority::High);
    original.description = Some("2 litres".into());
    let reasoner = ScriptedReasoner::json(json!({
        "response_message": "Renamed.",
        "actions": [{
            "action_type": "updateTask",
            "payload": {"id": "t1", "updatedTask": {"title": "Buy oat milk"}}
        }]
    }));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(
            &request(vec![original.clone()], "rename buy milk to buy oat milk"),
            now(),
        )
        .await
        .unwrap();

    match outcome.response.actions.as_slice() {
        [Action::UpdateTask { id, updated_task }] => {
            assert_eq!(id, "t1");
            assert_eq!(updated_task.title, "Buy oat milk");
            assert_eq!(updated_task.priority, Some(Priority::High));
            assert_eq!(updated_task.description.as_deref(), Some("2 litres"));
            assert_eq!(updated_task.creation_date, original.creation_date);
        }
        other => panic!("expected one updateTask, got {other:?}"),
    }
}

#[tokio::test]
async fn actions_on_unknown_ids_are_dropped() {
    let reasoner = ScriptedReasoner::json(json!({
        "response_message": "Done.",
        "actions": [
            {"action_type": "deleteTask", "payload": {"id": "ghost"}},
            {"action_type": "toggleTaskCompletion", "payload": {"id": "t1"}},
            {"action_type": "launchRocket", "payload": {}}
        ]
    }));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(vec![task("t1", "Buy milk")], "I bought the milk"), now())
        .await
        .unwrap();

    assert_eq!(
        outcome.response.actions,
        vec![Action::ToggleTaskCompletion { id: "t1".into() }]
    );
    assert_eq!(outcome.response.chat_response, "Done.");
}

#[tokio::test]
async fn retrieved_candidates_reach_agent_prompt() {
    let reasoner = ScriptedReasoner::json(json!({"response_message": "Sure.", "actions": []}));
    let embedder = KeywordEmbedder::new();
    let tasks = vec![task("t1", "Buy milk"), task("t2", "Write report")];
    orchestrator(&reasoner, &embedder)
        .run_at(&request(tasks, "what's left on the report?"), now())
        .await
        .unwrap();

    let system = &reasoner.call(0)[0].content;
    let section = system
        .split("most likely tasks the user is referring to:\n")
        .nth(1)
        .unwrap();
    assert!(section.starts_with("- ID: t2"));
    assert_eq!(embedder.call_count(), 2);
}

#[tokio::test]
async fn undecodable_agent_output_apologises() {
    let reasoner = ScriptedReasoner::new([Ok("Sure! I'll do that.".to_owned())]);
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(vec![], "hello there"), now())
        .await
        .unwrap();

    assert!(outcome.response.actions.is_empty());
    assert_eq!(
        outcome.response.chat_response,
        "I'm sorry, I encountered an error processing your request. Please try again."
    );
}

#[tokio::test]
async fn missing_message_gets_generic_reply() {
    let reasoner = ScriptedReasoner::json(json!({"actions": []}));
    let embedder = KeywordEmbedder::new();
    let outcome = orchestrator(&reasoner, &embedder)
        .run_at(&request(vec![], "hello there"), now())
        .await
        .unwrap();
    assert_eq!(outcome.response.chat_response, "I processed your request.");
}

// ────────────────────────────────────────────────────────────────────────────
// Failures
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reasoning_outage_propagates() {
    let reasoner = ScriptedReasoner::new([Err(LlmError::ProviderError("HTTP 503".into()))]);
    let embedder = KeywordEmbedder::new();
    let err = orchestrator(&reasoner, &embedder)
        .run(&request(vec![], "what should I do today?"))
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::Llm(LlmError::ProviderError(_))));
}

#[tokio::test]
async fn embedding_outage_propagates() {
    let reasoner = ScriptedReasoner::unused();
    let embedder = KeywordEmbedder::failing();
    let err = orchestrator(&reasoner, &embedder)
        .run(&request(vec![task("t1", "Buy milk")], "delete buy milk"))
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::Llm(LlmError::RequestError(_))));
    assert_eq!(reasoner.call_count(), 0);
}

#[tokio::test]
async fn empty_history_is_invalid() {
    let reasoner = ScriptedReasoner::unused();
    let embedder = KeywordEmbedder::new();
    let err = orchestrator(&reasoner, &embedder)
        .run(&ChatRequest::new(vec![], vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::InvalidRequest(_)));
}

#[tokio::test]
async fn history_ending_with_bot_is_invalid() {
    let reasoner = ScriptedReasoner::unused();
    let embedder = KeywordEmbedder::new();
    let req = ChatRequest::new(
        vec![],
        vec![ChatMessage::user("hi"), ChatMessage::bot("hello")],
    );
    let err = orchestrator(&reasoner, &embedder).run(&req).await.unwrap_err();
    assert!(matches!(err, AssistantError::InvalidRequest(_)));
}

#[tokio::test]
async fn oversized_state_is_rejected_before_any_call() {
    let reasoner = ScriptedReasoner::unused();
    let embedder = KeywordEmbedder::new();
    let ctx = PipelineContext::new(reasoner.clone(), embedder.clone()).with_settings(
        PipelineSettings {
            max_entities: 2,
            ..PipelineSettings::default()
        },
    );
    let tasks = vec![task("t1", "a"), task("t2", "b"), task("t3", "c")];
    let err = Orchestrator::new(ctx)
        .run(&request(tasks, "what is next?"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AssistantError::PromptTooLarge {
            entities: 3,
            limit: 2
        }
    ));
    assert_eq!(reasoner.call_count(), 0);
    assert_eq!(embedder.call_count(), 0);
}
