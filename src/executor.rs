use std::path::PathBuf;

use chrono::Utc;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::plan::{OperationPlan, PlanStep};
use crate::store::{AuditStore, OperationRecord, UndoEntry};
use crate::types::{OperationKind, Stage};

/// Outcome of a successfully executed plan.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Head of the target branch before the first step (`None` for a branch
    /// that did not exist yet).
    pub before_head: Option<String>,
    /// Head of the target branch after the last step.
    pub after_head: String,
    /// Non-empty stdout of each step, in order.
    pub output: Vec<String>,
    /// Audit log file written for this operation.
    pub record_path: PathBuf,
}

/// Runs an [`OperationPlan`] against a [`Gateway`] and records it.
///
/// State machine per attempt:
/// `Idle -> Checkout -> ApplyRange -> Commit -> Success`. A nonzero exit from
/// cherry-pick or revert halts with [`Error::ConflictHalted`]; every other
/// failure is [`Error::Fatal`]. Nothing is retried, and the executor never
/// runs `--continue`/`--abort` itself.
pub struct Executor<'a, G: Gateway + ?Sized> {
    gateway: &'a G,
    store: &'a AuditStore,
    cancel: CancelToken,
}

impl<'a, G: Gateway + ?Sized> Executor<'a, G> {
    pub fn new(gateway: &'a G, store: &'a AuditStore) -> Self {
        Self {
            gateway,
            store,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `token` before the first step.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Execute every step of `plan`, then write the audit record and push an
    /// undo entry.
    ///
    /// # Errors
    /// * [`Error::Cancelled`] if the token fired before anything ran.
    /// * [`Error::ConflictHalted`] if the apply step stopped; the tree is left
    ///   for manual resolution.
    /// * [`Error::Fatal`] for checkout, commit, head lookup, or log-write
    ///   failures.
    /// * Store errors if the undo entry cannot be pushed. The git change has
    ///   already happened at that point.
    pub fn execute(&self, plan: &OperationPlan) -> Result<Execution> {
        self.cancel.check()?;

        let before_head = self.head_before(plan)?;
        let mut stage = Stage::Idle;
        let mut output = Vec::new();

        for step in &plan.steps {
            log::debug!("{} -> {}: {}", stage, step.stage, step);
            stage = step.stage;
            if let Some(out) = self.run_step(plan.kind, step)? {
                output.push(out);
            }
        }

        let head_ref = plan.head_ref();
        let after_head = self
            .gateway
            .rev_parse(&head_ref)
            .map_err(|e| Error::fatal(format!("git rev-parse {}", head_ref), e.to_string()))?;
        log::debug!("{} -> {}", stage, Stage::Success);

        let timestamp = Utc::now();
        let record_path = self
            .store
            .record_operation(&OperationRecord::from_plan(plan, timestamp))?;

        let entry = UndoEntry {
            source: plan.source.clone(),
            target: plan.target.clone(),
            before_head: before_head.clone(),
            after_head: after_head.clone(),
            timestamp,
        };
        if let Err(e) = self.store.push_undo(entry) {
            log::error!(
                "{} on {} applied but missing from undo history: {}",
                plan.kind,
                plan.target,
                e
            );
            return Err(e);
        }

        log::info!(
            "{} on {} applied: {} -> {}",
            plan.kind,
            plan.target,
            before_head.as_deref().unwrap_or("(new branch)"),
            after_head
        );
        Ok(Execution {
            before_head,
            after_head,
            output,
            record_path,
        })
    }

    fn head_before(&self, plan: &OperationPlan) -> Result<Option<String>> {
        let head_ref = plan.head_ref();
        match self.gateway.rev_parse(&head_ref) {
            Ok(id) => Ok(Some(id)),
            Err(_) if plan.kind == OperationKind::Restore => Ok(None),
            Err(e) => Err(Error::fatal(
                format!("git rev-parse {}", head_ref),
                e.to_string(),
            )),
        }
    }

    fn run_step(&self, kind: OperationKind, step: &PlanStep) -> Result<Option<String>> {
        let command = step.to_string();
        let out = self
            .gateway
            .run(&step.args())
            .map_err(|e| Error::fatal(command.as_str(), e.to_string()))?;

        if out.success {
            let stdout = out.stdout.trim();
            return Ok((!stdout.is_empty()).then(|| stdout.to_string()));
        }

        let stderr = out.stderr.trim().to_string();
        log::warn!("{} failed at {}: {}", command, step.stage, stderr);
        Err(match (step.stage, kind) {
            (Stage::ApplyRange, OperationKind::Transfer) => {
                Error::conflict(command, stderr, resolution_hint("cherry-pick"))
            }
            (Stage::ApplyRange, OperationKind::Revert) => {
                Error::conflict(command, stderr, resolution_hint("revert"))
            }
            (Stage::Commit, _) => Error::fatal(
                command,
                format!("{} (working tree left partially applied)", stderr),
            ),
            _ => Error::fatal(command, stderr),
        })
    }
}

fn resolution_hint(verb: &str) -> String {
    format!(
        "Resolve conflicts, then run 'git {verb} --continue' or 'git {verb} --abort'",
        verb = verb
    )
}
