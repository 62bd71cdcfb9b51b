use crate::error::{EngineError, Result};
use serde::Serialize;
use uuid::Uuid;

/// Processing state of one command uuid.
///
/// `Received -> Processing -> Confirmed | Failed`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandState {
    Received,
    Processing,
    Confirmed,
    Failed,
}

impl CommandState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandState::Confirmed | CommandState::Failed)
    }

    pub fn advance(self, id: Uuid, next: CommandState) -> Result<CommandState> {
        let allowed = matches!(
            (self, next),
            (CommandState::Received, CommandState::Processing)
                | (CommandState::Processing, CommandState::Confirmed)
                | (CommandState::Processing, CommandState::Failed)
        );
        if allowed {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                id,
                from: self,
                to: next,
            })
        }
    }
}
