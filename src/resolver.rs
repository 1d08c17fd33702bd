//! Focused resolver: picks one existing item out of a small candidate set
//! for an intent the router already recognised.
//!
//! One narrow model call per turn. The model only ever sees the candidate
//! ids, and any id it returns that is not among them is treated as "no
//! match", so this stage cannot emit an id for an item that does not exist.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::intent::IntentTag;
use crate::intent::parser::tokenize;
use crate::llm::{LlmError, Message, ReasoningEngine, RequestOptions};
use crate::model::{Action, ChatResponse, Task, TimeBlock};
use crate::normalizer::parse_json_object;

/// An intent the focused resolver can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedIntent {
    DeleteTask,
    ToggleTask,
    DeleteTimeBlock,
}

impl FocusedIntent {
    fn noun(self) -> &'static str {
        match self {
            Self::DeleteTask | Self::ToggleTask => "task",
            Self::DeleteTimeBlock => "time block",
        }
    }

    fn verb_phrase(self) -> &'static str {
        match self {
            Self::DeleteTask => "delete a task",
            Self::ToggleTask => "toggle completion of a task",
            Self::DeleteTimeBlock => "remove a scheduled time block",
        }
    }

    fn action(self, id: String) -> Action {
        match self {
            Self::DeleteTask => Action::DeleteTask { id },
            Self::ToggleTask => Action::ToggleTaskCompletion { id },
            Self::DeleteTimeBlock => Action::DeleteTimeBlock { id },
        }
    }

    fn confirmation(self, title: &str) -> String {
        match self {
            Self::DeleteTask => format!("OK, I've deleted '{title}' from your list."),
            Self::ToggleTask => format!("OK, I've toggled the completion status of '{title}'."),
            Self::DeleteTimeBlock => format!("OK, I've removed the time block for '{title}'."),
        }
    }

    fn nothing_found(self) -> &'static str {
        match self {
            Self::DeleteTask | Self::ToggleTask => {
                "I couldn't find any tasks matching your request."
            }
            Self::DeleteTimeBlock => {
                "I couldn't find any scheduled time blocks matching your request."
            }
        }
    }
}

impl TryFrom<IntentTag> for FocusedIntent {
    type Error = IntentTag;

    fn try_from(tag: IntentTag) -> Result<Self, Self::Error> {
        match tag {
            IntentTag::DeleteTask => Ok(Self::DeleteTask),
            IntentTag::ToggleTask => Ok(Self::ToggleTask),
            IntentTag::DeleteTimeBlock => Ok(Self::DeleteTimeBlock),
            other => Err(other),
        }
    }
}

/// One selectable item, reduced to what the resolver shows the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    /// Display title used in prompts and confirmations.
    pub title: String,
    /// Extra context for the model (completion state, start time).
    pub detail: Option<String>,
}

impl Candidate {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            detail: Some(format!("Completed: {}", task.is_completed)),
        }
    }

    /// A time block, titled by the task it schedules.
    pub fn from_time_block(block: &TimeBlock, tasks: &[Task]) -> Self {
        let title = tasks
            .iter()
            .find(|t| t.id == block.task_id)
            .map_or_else(|| "a scheduled task".to_owned(), |t| t.title.clone());
        Self {
            id: block.id.clone(),
            title,
            detail: Some(format!(
                "Start: {}, Duration: {} minutes",
                block.start_time.format("%Y-%m-%d %H:%M UTC"),
                block.duration_in_minutes
            )),
        }
    }
}

const DECODE_FAILURE_REPLY: &str =
    "I had trouble understanding which task you meant. Could you be more specific?";

/// Verbs and generic nouns that say nothing about which item is meant.
const NON_DISCRIMINATING: &[&str] = &[
    "task", "tasks", "item", "items", "reminder", "todo", "entry", "done", "mark", "delete",
    "remove", "toggle", "complete", "completed", "finish", "finished", "cancel", "did", "get",
    "rid", "time", "block", "blocks", "slot", "please", "one",
];

/// Narrow single-id resolution over a candidate set.
#[derive(Clone)]
pub struct FocusedResolver {
    engine: Arc<dyn ReasoningEngine>,
    options: RequestOptions,
}

impl std::fmt::Debug for FocusedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusedResolver")
            .field("engine", &self.engine.name())
            .field("options", &self.options)
            .finish()
    }
}

impl FocusedResolver {
    pub fn new(engine: Arc<dyn ReasoningEngine>) -> Self {
        Self {
            engine,
            options: RequestOptions::new().json(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options.json();
        self
    }

    /// Resolve the utterance to at most one action.
    ///
    /// # Errors
    ///
    /// Only a failed model call is an error. Output that does not decode,
    /// a null id, or an id outside the candidate set all produce a
    /// clarifying reply with no actions.
    pub async fn resolve(
        &self,
        intent: FocusedIntent,
        utterance: &str,
        candidates: &[Candidate],
    ) -> Result<ChatResponse, LlmError> {
        if candidates.is_empty() {
            debug!(?intent, "no candidates, skipping model call");
            return Ok(ChatResponse::reply_only(intent.nothing_found()));
        }

        let prompt = build_focused_prompt(intent, utterance, candidates);
        let raw = self
            .engine
            .generate_json(&[Message::user(prompt)], &self.options)
            .await?;

        let obj = match parse_json_object(&raw) {
            Ok(obj) => obj,
            Err(e) => {
                warn!(?intent, error = %e, "focused resolver output did not decode");
                return Ok(ChatResponse::reply_only(DECODE_FAILURE_REPLY));
            }
        };
        let selected = selected_id(&obj);

        match selected.and_then(|id| candidates.iter().find(|c| c.id == id)) {
            Some(candidate) => {
                debug!(?intent, id = %candidate.id, "focused resolver selected candidate");
                Ok(ChatResponse::new(
                    intent.confirmation(&candidate.title),
                    vec![intent.action(candidate.id.clone())],
                ))
            }
            None => {
                if let Some(id) = selected {
                    warn!(?intent, %id, "focused resolver returned an id outside the candidate set");
                }
                Ok(ChatResponse::reply_only(clarification(
                    intent, utterance, candidates,
                )))
            }
        }
    }
}

/// Render the narrow instruction: the utterance, the candidates, one id field.
pub fn build_focused_prompt(
    intent: FocusedIntent,
    utterance: &str,
    candidates: &[Candidate],
) -> String {
    let noun = intent.noun();
    let list: Vec<String> = candidates
        .iter()
        .map(|c| match &c.detail {
            Some(detail) => format!("- ID: {}, Title: '{}', {detail}", c.id, c.title),
            None => format!("- ID: {}, Title: '{}'", c.id, c.title),
        })
        .collect();
    format!(
        "User wants to {} with this query: \"{utterance}\"\n\n\
         These are the candidate {noun}s:\n{}\n\n\
         Return JSON with the ID of the {noun} the user means:\n\
         {{\"id\": \"the-correct-id\"}}\n\n\
         Only use an ID from the list above. If none match, or more than one matches equally well, return: {{\"id\": null}}",
        intent.verb_phrase(),
        list.join("\n"),
    )
}

fn selected_id(obj: &serde_json::Map<String, Value>) -> Option<&str> {
    ["id", "task_id", "time_block_id"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// The clarifying question for an unresolved reference.
///
/// Names the candidates that share a meaningful word with the utterance
/// when there are at least two of them.
pub fn clarification(intent: FocusedIntent, utterance: &str, candidates: &[Candidate]) -> String {
    let wanted = discriminating_words(utterance);
    let overlapping: Vec<&str> = candidates
        .iter()
        .filter(|c| discriminating_words(&c.title).iter().any(|w| wanted.contains(w)))
        .map(|c| c.title.as_str())
        .collect();

    if overlapping.len() < 2 {
        return format!(
            "I couldn't find a {} matching your request. Could you be more specific?",
            intent.noun()
        );
    }
    format!(
        "I found more than one {} that could match: {}. Which one did you mean?",
        intent.noun(),
        join_titles(&overlapping)
    )
}

fn discriminating_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.is_content_word() && !NON_DISCRIMINATING.contains(&t.lower.as_str()))
        .map(|t| {
            let word = t.lower;
            match word.strip_suffix('s') {
                Some(stem) if stem.len() > 2 && !stem.ends_with('s') => stem.to_owned(),
                _ => word,
            }
        })
        .collect()
}

fn join_titles(titles: &[&str]) -> String {
    let quoted: Vec<String> = titles.iter().map(|t| format!("'{t}'")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {last}", rest.join(", ")),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
