use std::fmt;

use crate::types::{OperationKind, Stage};

// ---------------------------------------------------------------------------
// PlanStep
// ---------------------------------------------------------------------------

/// One git invocation within a plan.
///
/// The argument vector is what the executor runs; [`Display`](fmt::Display)
/// renders the same vector for previews and the audit log, so the two can
/// never drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub stage: Stage,
    pub args: Vec<String>,
}

impl PlanStep {
    fn new(stage: Stage, args: &[&str]) -> Self {
        Self {
            stage,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn args(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("git")?;
        let mut prev: Option<&str> = None;
        for arg in &self.args {
            if prev == Some("-m") || needs_quoting(arg) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
            prev = Some(arg.as_str());
        }
        Ok(())
    }
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\')
}

// ---------------------------------------------------------------------------
// OperationPlan
// ---------------------------------------------------------------------------

/// The full, ordered set of git steps for one operation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub source: String,
    pub target: String,
    pub start: String,
    pub end: String,
    pub message: String,
    pub steps: Vec<PlanStep>,
}

impl OperationPlan {
    /// Rendered command lines, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.to_string()).collect()
    }

    /// Full ref of the branch whose head the operation moves (or creates).
    ///
    /// Always `refs/heads/<target>`, so a tag or remote ref sharing the
    /// branch's short name is never read instead.
    pub fn head_ref(&self) -> String {
        format!("refs/heads/{}", self.target)
    }
}

/// Build the plan for an operation.
///
/// Pure: identical inputs always give identical steps. Inputs are assumed to
/// be validated by the caller. For [`OperationKind::Restore`], `target` is the
/// branch to create and `start` the commit it points at.
pub fn build_plan(
    kind: OperationKind,
    source: &str,
    target: &str,
    start: &str,
    end: &str,
    message: &str,
) -> OperationPlan {
    let range = format!("{}^..{}", start, end);
    let steps = match kind {
        OperationKind::Transfer => vec![
            PlanStep::new(Stage::Checkout, &["checkout", target]),
            PlanStep::new(Stage::ApplyRange, &["cherry-pick", "--no-commit", range.as_str()]),
            PlanStep::new(Stage::Commit, &["commit", "-m", message]),
        ],
        OperationKind::Revert => vec![
            PlanStep::new(Stage::Checkout, &["checkout", target]),
            PlanStep::new(Stage::ApplyRange, &["revert", "--no-commit", range.as_str()]),
            PlanStep::new(Stage::Commit, &["commit", "-m", message]),
        ],
        OperationKind::Restore => vec![PlanStep::new(Stage::ApplyRange, &["branch", target, start])],
    };

    OperationPlan {
        kind,
        source: source.to_string(),
        target: target.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        message: message.to_string(),
        steps,
    }
}
