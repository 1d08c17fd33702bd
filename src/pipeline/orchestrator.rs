//! The routing state machine that runs one chat turn.

use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info, info_span, warn};

use super::context::PipelineContext;
use super::stage::{Stage, next_stage};
use crate::agent::{GeneralAgent, MISSING_REPLY};
use crate::error::{AssistantError, Result};
use crate::intent::{IntentTag, PatternRouter};
use crate::model::{Action, ChatRequest, ChatResponse, Task, TimeBlock, new_entity_id};
use crate::observability::{
    FIELD_ACTION_COUNT, FIELD_CANDIDATE_COUNT, FIELD_INTENT, FIELD_REQUEST_ID, FIELD_STAGE,
    SPAN_PIPELINE_STAGE, SPAN_PIPELINE_TURN,
};
use crate::prompt::{PromptBuilder, PromptInputs};
use crate::resolver::{Candidate, FocusedIntent, FocusedResolver};
use crate::retrieval::SimilarityRetriever;

/// Mutable state carried between stages of one turn.
#[derive(Debug)]
pub struct TurnState<'a> {
    pub request: &'a ChatRequest,
    /// Reference time for the whole turn.
    pub now: DateTime<Utc>,
    intent: Option<IntentTag>,
    pub transcript: Option<String>,
    pub task_candidates: Vec<Task>,
    pub time_block_candidates: Vec<TimeBlock>,
    pub reply: Option<String>,
    pub actions: Vec<Action>,
    /// Stages entered so far, in order.
    pub visited: Vec<Stage>,
}

impl<'a> TurnState<'a> {
    pub fn new(request: &'a ChatRequest, now: DateTime<Utc>) -> Self {
        Self {
            request,
            now,
            intent: None,
            transcript: None,
            task_candidates: Vec::new(),
            time_block_candidates: Vec::new(),
            reply: None,
            actions: Vec::new(),
            visited: Vec::new(),
        }
    }

    /// The intent assigned by the router; `AGENT_FALLBACK` before routing.
    pub fn intent(&self) -> IntentTag {
        self.intent.unwrap_or(IntentTag::AgentFallback)
    }

    /// Assign the intent. Only the first assignment sticks.
    fn set_intent(&mut self, intent: IntentTag) {
        if self.intent.is_none() {
            self.intent = Some(intent);
        }
    }

    fn finish(&mut self, response: ChatResponse) {
        self.reply = Some(response.chat_response);
        self.actions = response.actions;
    }
}

/// The result of a turn with its routing trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub response: ChatResponse,
    pub intent: IntentTag,
    pub stages: Vec<Stage>,
}

/// Runs chat turns through router, retriever, resolver or agent, and
/// final assembly.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    ctx: PipelineContext,
    router: PatternRouter,
    retriever: SimilarityRetriever,
    resolver: FocusedResolver,
    agent: GeneralAgent,
    prompts: PromptBuilder,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        let router = match &ctx.parser {
            Some(parser) => PatternRouter::new(parser.clone()),
            None => PatternRouter::disabled(),
        };
        let options = ctx.settings.request_options.clone();
        Self {
            router,
            retriever: SimilarityRetriever::new(ctx.embedder.clone()),
            resolver: FocusedResolver::new(ctx.reasoner.clone()).with_options(options.clone()),
            agent: GeneralAgent::new(ctx.reasoner.clone()).with_options(options),
            prompts: PromptBuilder::new(ctx.settings.max_entities),
            ctx,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Answer one chat turn.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::InvalidRequest`] if the history is empty or does
    ///   not end with a user message.
    /// - [`AssistantError::Llm`] if the reasoning or embedding service fails.
    /// - [`AssistantError::PromptTooLarge`] if the state cannot be rendered in full.
    pub async fn run(&self, request: &ChatRequest) -> Result<ChatResponse> {
        Ok(self.run_at(request, Utc::now()).await?.response)
    }

    /// Answer one chat turn against a fixed reference time.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_at(&self, request: &ChatRequest, now: DateTime<Utc>) -> Result<TurnOutcome> {
        request.validate()?;
        let request_id = new_entity_id();
        let span = info_span!(SPAN_PIPELINE_TURN, { FIELD_REQUEST_ID } = %request_id);
        self.drive(TurnState::new(request, now)).instrument(span).await
    }

    async fn drive(&self, mut state: TurnState<'_>) -> Result<TurnOutcome> {
        let mut stage = Stage::IntentRouter;
        loop {
            state.visited.push(stage);
            let span = info_span!(SPAN_PIPELINE_STAGE, { FIELD_STAGE } = stage.as_str());
            self.execute(stage, &mut state).instrument(span).await?;

            match next_stage(stage, state.intent()) {
                Some(next) => {
                    debug!({ FIELD_STAGE } = next.as_str(), { FIELD_INTENT } = state.intent().as_str(), "transition");
                    stage = next;
                }
                None => break,
            }
        }

        let response = ChatResponse::new(
            state.reply.take().unwrap_or_else(|| MISSING_REPLY.to_owned()),
            std::mem::take(&mut state.actions),
        );
        info!(
            { FIELD_INTENT } = state.intent().as_str(),
            { FIELD_ACTION_COUNT } = response.actions.len(),
            "turn complete"
        );
        Ok(TurnOutcome {
            response,
            intent: state.intent(),
            stages: state.visited,
        })
    }

    async fn execute(&self, stage: Stage, state: &mut TurnState<'_>) -> Result<()> {
        match stage {
            Stage::IntentRouter => {
                let outcome = self.router.route(state.request.utterance());
                state.set_intent(outcome.intent);
                if let Some(reply) = outcome.reply {
                    state.reply = Some(reply);
                    state.actions = outcome.actions;
                }
                debug!({ FIELD_INTENT } = state.intent().as_str(), "routed");
            }
            Stage::PromptPreparation => {
                self.prompts
                    .check_capacity(&state.request.tasks, &state.request.time_blocks)?;
                state.transcript = Some(PromptBuilder::build_transcript(
                    &state.request.chat_history,
                ));
            }
            Stage::CandidateRetrieval => self.retrieve(state).await?,
            Stage::FocusedResolver => {
                let intent = FocusedIntent::try_from(state.intent()).map_err(|tag| {
                    AssistantError::InvalidRequest(format!("{tag} cannot be resolved by the focused resolver"))
                })?;
                let candidates: Vec<Candidate> = match intent {
                    FocusedIntent::DeleteTimeBlock => state
                        .time_block_candidates
                        .iter()
                        .map(|b| Candidate::from_time_block(b, &state.request.tasks))
                        .collect(),
                    FocusedIntent::DeleteTask | FocusedIntent::ToggleTask => state
                        .task_candidates
                        .iter()
                        .map(Candidate::from_task)
                        .collect(),
                };
                let response = self
                    .resolver
                    .resolve(intent, state.request.utterance(), &candidates)
                    .await?;
                state.finish(response);
            }
            Stage::GeneralAgent => {
                let system_prompt = self.prompts.build_system_prompt(&PromptInputs {
                    tasks: &state.request.tasks,
                    time_blocks: &state.request.time_blocks,
                    task_candidates: &state.task_candidates,
                    time_block_candidates: &state.time_block_candidates,
                    now: state.now,
                })?;
                let transcript = state.transcript.take().unwrap_or_else(|| {
                    PromptBuilder::build_transcript(&state.request.chat_history)
                });
                let outcome = self
                    .agent
                    .run(system_prompt, transcript, state.request, state.now)
                    .await?;
                if let Some(report) = &outcome.report
                    && !report.is_clean()
                {
                    warn!(
                        kept = report.kept,
                        dropped = report.dropped.len(),
                        reasons = ?report.dropped,
                        "general agent emitted actions that were dropped"
                    );
                }
                state.finish(outcome.response);
            }
            // assembly point only; the response is built from the state in `drive`
            Stage::FinalResponse => {}
        }
        Ok(())
    }

    async fn retrieve(&self, state: &mut TurnState<'_>) -> Result<()> {
        let settings = &self.ctx.settings;
        let request = state.request;
        let utterance = request.utterance();

        match state.intent() {
            IntentTag::DeleteTimeBlock => {
                state.time_block_candidates = self
                    .retriever
                    .similar_time_blocks(
                        utterance,
                        &request.time_blocks,
                        &request.tasks,
                        settings.time_block_top_k,
                    )
                    .await?;
            }
            IntentTag::DeleteTask | IntentTag::ToggleTask => {
                state.task_candidates = self
                    .retriever
                    .task_candidates(utterance, &request.tasks, settings.task_top_k)
                    .await?;
            }
            IntentTag::CreateTask | IntentTag::AgentFallback => {
                state.task_candidates = self
                    .retriever
                    .task_candidates(utterance, &request.tasks, settings.task_top_k)
                    .await?;
                state.time_block_candidates = self
                    .retriever
                    .similar_time_blocks(
                        utterance,
                        &request.time_blocks,
                        &request.tasks,
                        settings.time_block_top_k,
                    )
                    .await?;
            }
        }
        debug!(
            { FIELD_CANDIDATE_COUNT } =
                state.task_candidates.len() + state.time_block_candidates.len(),
            tasks = state.task_candidates.len(),
            time_blocks = state.time_block_candidates.len(),
            "candidates retrieved"
        );
        Ok(())
    }
}
