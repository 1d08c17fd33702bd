//! Prompt builder for the general agent.
//!
//! The instruction document has two layers:
//!
//! 1. **State**: every task, every time block (with its task title) and the
//!    retrieved candidates, rendered from the request.
//! 2. **Contract** ([`AGENT_CONTRACT`]): output schema, action shapes,
//!    worked examples and behavioural rules.
//!
//! The chat transcript goes in a separate user message
//! ([`PromptBuilder::build_transcript`]).

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{AssistantError, Result};
use crate::model::{ChatMessage, Task, TimeBlock};

/// Output schema and behavioural rules, compiled in from `Prompts/general_agent.md`.
pub const AGENT_CONTRACT: &str = include_str!("../Prompts/general_agent.md");

/// Default cap on tasks + time blocks rendered into one prompt.
pub const DEFAULT_MAX_ENTITIES: usize = 500;

const PREAMBLE: &str = "\
You are a helpful and efficient task management assistant. Your goal is to help the user manage their to-do list and schedule via conversation.\n\
You are part of a system that is stateless. You will receive the entire list of tasks, time blocks and chat history in every request.\n\
The user's most recent message is the last one in the chat history. You must respond to it.";

/// Everything the instruction document is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub tasks: &'a [Task],
    pub time_blocks: &'a [TimeBlock],
    pub task_candidates: &'a [Task],
    pub time_block_candidates: &'a [TimeBlock],
    /// Reference time for resolving relative dates.
    pub now: DateTime<Utc>,
}

/// Renders the general agent's instruction document.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_entities: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTITIES)
    }
}

impl PromptBuilder {
    pub fn new(max_entities: usize) -> Self {
        Self { max_entities }
    }

    /// Fail if the state is too large to render in full.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::PromptTooLarge`] over the limit.
    pub fn check_capacity(&self, tasks: &[Task], time_blocks: &[TimeBlock]) -> Result<()> {
        let entities = tasks.len() + time_blocks.len();
        if entities > self.max_entities {
            return Err(AssistantError::PromptTooLarge {
                entities,
                limit: self.max_entities,
            });
        }
        Ok(())
    }

    /// Build the system prompt.
    ///
    /// Output depends only on `inputs`.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::PromptTooLarge`] when tasks plus time blocks
    /// exceed the configured limit. Entities are never dropped to fit.
    pub fn build_system_prompt(&self, inputs: &PromptInputs<'_>) -> Result<String> {
        self.check_capacity(inputs.tasks, inputs.time_blocks)?;
        let entities = inputs.tasks.len() + inputs.time_blocks.len();

        let mut out = String::with_capacity(AGENT_CONTRACT.len() + 128 * entities);
        out.push_str(PREAMBLE);
        out.push_str("\n\nCurrent date and time (UTC): ");
        out.push_str(&timestamp(&inputs.now));

        out.push_str("\n\nHere is the current list of all tasks:\n");
        if inputs.tasks.is_empty() {
            out.push_str("(no tasks)\n");
        }
        for task in inputs.tasks {
            out.push_str(&task_line(task));
            out.push('\n');
        }

        out.push_str("\nHere are the currently scheduled time blocks:\n");
        if inputs.time_blocks.is_empty() {
            out.push_str("(no time blocks)\n");
        }
        for block in inputs.time_blocks {
            out.push_str(&time_block_line(block, inputs.tasks));
            out.push('\n');
        }

        out.push('\n');
        if inputs.task_candidates.is_empty() {
            out.push_str(
                "No specific candidates identified. The user might be creating a new task or the query is ambiguous.\n",
            );
        } else {
            out.push_str(
                "Based on a semantic search, these are the most likely tasks the user is referring to:\n",
            );
            for task in inputs.task_candidates {
                out.push_str(&task_line(task));
                out.push('\n');
            }
        }

        if !inputs.time_block_candidates.is_empty() {
            out.push_str(
                "\nBased on a semantic search, these are the most likely time blocks the user is referring to:\n",
            );
            for block in inputs.time_block_candidates {
                out.push_str(&time_block_line(block, inputs.tasks));
                out.push('\n');
            }
        }

        out.push('\n');
        out.push_str(AGENT_CONTRACT);
        Ok(out)
    }

    /// Render the transcript as one user message, ending with the utterance.
    pub fn build_transcript(history: &[ChatMessage]) -> String {
        let lines: Vec<String> = history
            .iter()
            .map(|m| format!("{}: {}", m.sender, m.text))
            .collect();
        let latest = history.last().map_or("", |m| m.text.as_str());
        format!(
            "Chat History:\n{}\n\nUser's latest message: '{latest}'",
            lines.join("\n")
        )
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn or_null<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "null".to_owned(), |v| v.to_string())
}

/// One task with every attribute, for the state listing.
pub fn task_line(task: &Task) -> String {
    format!(
        "- ID: {}, Title: '{}', Description: {}, Completed: {}, Priority: {}, Deadline: {}, Created: {}, Predicted duration (minutes): {}",
        task.id,
        task.title,
        task.description
            .as_deref()
            .map_or_else(|| "null".to_owned(), |d| format!("'{d}'")),
        task.is_completed,
        or_null(task.priority),
        or_null(task.deadline.as_ref().map(timestamp)),
        timestamp(&task.creation_date),
        or_null(task.predicted_duration_in_minutes),
    )
}

/// One time block with its task title resolved.
pub fn time_block_line(block: &TimeBlock, tasks: &[Task]) -> String {
    let title = tasks
        .iter()
        .find(|t| t.id == block.task_id)
        .map_or("unknown task", |t| t.title.as_str());
    format!(
        "- ID: {}, Task: '{}' (task ID: {}), Start: {}, Duration (minutes): {}",
        block.id,
        title,
        block.task_id,
        timestamp(&block.start_time),
        block.duration_in_minutes,
    )
}
