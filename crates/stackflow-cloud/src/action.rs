//! Planned actions and apply reports

use crate::state::StackState;
use serde::{Deserialize, Serialize};
use stackflow_core::ResourceKind;

/// Direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Create resources in dependency order
    Create,
    /// Delete resources in reverse dependency order
    Delete,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Create => write!(f, "create"),
            Mode::Delete => write!(f, "delete"),
        }
    }
}

/// Represents a planned action for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Logical resource name
    pub resource: String,

    pub kind: ResourceKind,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Description of the action
    pub description: String,

    /// Resources this one waits for (create) or outlives (delete)
    pub depends_on: Vec<String>,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Ordered actions for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub mode: Mode,

    /// Actions in execution order
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(mode: Mode, actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            mode,
            actions,
            has_changes,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to delete, {} unchanged",
            self.create, self.delete, self.no_change
        )
    }
}

/// Outcome of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    /// Nothing to do (already absent on delete)
    Skipped,
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub resource: String,
    pub kind: ResourceKind,
    pub action: ActionType,
    pub outcome: Outcome,
    pub message: String,
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub mode: Mode,

    /// Results in execution order
    pub results: Vec<ActionResult>,

    /// Resources that exist at the end of the run
    pub state: StackState,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            results: Vec::new(),
            state: StackState::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome != Outcome::Failed)
    }

    pub fn record(
        &mut self,
        resource: impl Into<String>,
        kind: ResourceKind,
        action: ActionType,
        outcome: Outcome,
        message: impl Into<String>,
    ) {
        self.results.push(ActionResult {
            resource: resource.into(),
            kind,
            action,
            outcome,
            message: message.into(),
        });
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(resource: &str, action_type: ActionType) -> Action {
        Action {
            resource: resource.to_string(),
            kind: ResourceKind::Bucket,
            action_type,
            description: String::new(),
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(
            Mode::Delete,
            vec![
                action("a", ActionType::Delete),
                action("b", ActionType::Delete),
                action("c", ActionType::NoOp),
            ],
        );

        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "0 to create, 2 to delete, 1 unchanged"
        );
    }

    #[test]
    fn test_plan_without_changes() {
        let plan = Plan::new(Mode::Create, vec![action("a", ActionType::NoOp)]);
        assert!(!plan.has_changes);
    }

    #[test]
    fn test_report_counts() {
        let mut report = ApplyReport::new(Mode::Delete);
        report.record("a", ResourceKind::Bucket, ActionType::Delete, Outcome::Succeeded, "deleted");
        report.record("b", ResourceKind::Role, ActionType::Delete, Outcome::Skipped, "absent");

        assert!(report.is_success());
        assert_eq!(report.count(Outcome::Skipped), 1);

        report.record("c", ResourceKind::Function, ActionType::Delete, Outcome::Failed, "boom");
        assert!(!report.is_success());
    }
}
