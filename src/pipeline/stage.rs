//! Pipeline stages and the transition table between them.
//!
//! ```text
//! intent_router ──CREATE_TASK──────────────────────────────┐
//!      │ DELETE_TASK / TOGGLE_TASK / DELETE_TIME_BLOCK      │
//!      ├──────────────► candidate_retrieval ─► focused_resolver ─┤
//!      │ anything else          ▲       └──► general_agent ──────┤
//!      └─► prompt_preparation ──┘                                ▼
//!                                                         final_response
//! ```

use crate::intent::IntentTag;

/// One node of the routing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    IntentRouter,
    PromptPreparation,
    CandidateRetrieval,
    FocusedResolver,
    GeneralAgent,
    FinalResponse,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntentRouter => "intent_router",
            Self::PromptPreparation => "prompt_preparation",
            Self::CandidateRetrieval => "candidate_retrieval",
            Self::FocusedResolver => "focused_resolver",
            Self::GeneralAgent => "general_agent",
            Self::FinalResponse => "final_response",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::FinalResponse
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which intents a transition row applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Intent(IntentTag),
    /// DELETE_TASK, TOGGLE_TASK or DELETE_TIME_BLOCK.
    Focused,
    Any,
}

impl When {
    fn matches(self, intent: IntentTag) -> bool {
        match self {
            Self::Intent(tag) => tag == intent,
            Self::Focused => intent.is_focused(),
            Self::Any => true,
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Stage,
    pub when: When,
    pub to: Stage,
}

const fn row(from: Stage, when: When, to: Stage) -> Transition {
    Transition { from, when, to }
}

/// Rows are tried in order; the first one whose `from` and `when` match wins.
pub const TRANSITIONS: &[Transition] = &[
    row(
        Stage::IntentRouter,
        When::Intent(IntentTag::CreateTask),
        Stage::FinalResponse,
    ),
    row(Stage::IntentRouter, When::Focused, Stage::CandidateRetrieval),
    row(Stage::IntentRouter, When::Any, Stage::PromptPreparation),
    row(Stage::PromptPreparation, When::Any, Stage::CandidateRetrieval),
    row(Stage::CandidateRetrieval, When::Focused, Stage::FocusedResolver),
    row(Stage::CandidateRetrieval, When::Any, Stage::GeneralAgent),
    row(Stage::FocusedResolver, When::Any, Stage::FinalResponse),
    row(Stage::GeneralAgent, When::Any, Stage::FinalResponse),
];

/// The stage after `from` for this intent. `None` once the turn is finished.
pub fn next_stage(from: Stage, intent: IntentTag) -> Option<Stage> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.when.matches(intent))
        .map(|t| t.to)
}

/// Every stage visited for an intent, entry to terminal.
pub fn route_for(intent: IntentTag) -> Vec<Stage> {
    let mut stage = Stage::IntentRouter;
    let mut route = vec![stage];
    while let Some(next) = next_stage(stage, intent) {
        route.push(next);
        stage = next;
    }
    route
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_goes_straight_to_final_response() {
        assert_eq!(
            route_for(IntentTag::CreateTask),
            vec![Stage::IntentRouter, Stage::FinalResponse]
        );
    }

    #[test]
    fn focused_intents_skip_prompt_preparation() {
        for intent in [
            IntentTag::DeleteTask,
            IntentTag::ToggleTask,
            IntentTag::DeleteTimeBlock,
        ] {
            assert_eq!(
                route_for(intent),
                vec![
                    Stage::IntentRouter,
                    Stage::CandidateRetrieval,
                    Stage::FocusedResolver,
                    Stage::FinalResponse,
                ],
                "{intent}"
            );
        }
    }

    #[test]
    fn fallback_takes_the_full_path() {
        assert_eq!(
            route_for(IntentTag::AgentFallback),
            vec![
                Stage::IntentRouter,
                Stage::PromptPreparation,
                Stage::CandidateRetrieval,
                Stage::GeneralAgent,
                Stage::FinalResponse,
            ]
        );
    }

    #[test]
    fn final_response_is_terminal() {
        assert!(Stage::FinalResponse.is_terminal());
        for intent in [IntentTag::CreateTask, IntentTag::AgentFallback] {
            assert_eq!(next_stage(Stage::FinalResponse, intent), None);
        }
    }

    #[test]
    fn every_non_terminal_stage_has_an_exit() {
        let stages = [
            Stage::IntentRouter,
            Stage::PromptPreparation,
            Stage::CandidateRetrieval,
            Stage::FocusedResolver,
            Stage::GeneralAgent,
        ];
        for stage in stages {
            assert!(
                TRANSITIONS.iter().any(|t| t.from == stage && t.when == When::Any),
                "{stage} has no catch-all row"
            );
        }
    }
}
