use crate::library::types::CommandKind;

/// What the watch loop should do with a resolved goal.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum Instruction {
    Run { kind: CommandKind },
    /// Block the loop until `text` is visible or the wait times out.
    WaitForText { text: String },
    /// Type each goal into a scratch document, then resolve and run each one.
    Batch { goals: Vec<String> },
    /// Resolved, but there is nothing safe to do.
    Noop { reason: String },
    /// Resolution failed; reported, never executed.
    Failed { message: String },
}

impl Instruction {
    pub fn run(kind: CommandKind) -> Self {
        Instruction::Run { kind }
    }

    pub fn noop(reason: impl Into<String>) -> Self {
        Instruction::Noop { reason: reason.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Instruction::Failed { message: message.into() }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Instruction::Run { kind } => kind.label(),
            Instruction::WaitForText { .. } => "wait_for_text",
            Instruction::Batch { .. } => "batch",
            Instruction::Noop { .. } => "noop",
            Instruction::Failed { .. } => "failed",
        }
    }
}

/// Which layer produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Raw shell verb, spawned without consulting the library.
    Reflex,
    /// An existing library entry picked by keyword filter and selector.
    Library,
    /// Coordinates synthesized from the visible fragments.
    AutoAim,
    /// Nothing usable came out of planning.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanResult {
    pub instruction: Instruction,
    /// True when the instruction came from an existing library entry, so there
    /// is nothing new to learn.
    pub is_cached: bool,
    pub source: PlanSource,
}

impl PlanResult {
    pub fn new(instruction: Instruction, is_cached: bool, source: PlanSource) -> Self {
        Self {
            instruction,
            is_cached,
            source,
        }
    }

    pub fn unresolved(instruction: Instruction) -> Self {
        Self::new(instruction, false, PlanSource::Unresolved)
    }

    /// The command worth persisting as a learned entry, if any. Reflexes are
    /// re-derived from the goal every time and are never stored.
    pub fn learnable(&self) -> Option<&CommandKind> {
        match &self.instruction {
            Instruction::Run { kind } if !self.is_cached && self.source != PlanSource::Reflex => Some(kind),
            _ => None,
        }
    }
}
