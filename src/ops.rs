//! Ties the engine components together for one caller session.
//!
//! [`Session`] is what the CLI drives: it validates a request, resolves the
//! commit range, checks for duplicates, and builds the plan. Applying is a
//! separate call so a caller can show the plan and ask first. A dry run never
//! reaches [`Session::apply`].

use std::path::Path;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::duplicates::detect_duplicates;
use crate::error::{Error, Result};
use crate::executor::{Execution, Executor};
use crate::gateway::Gateway;
use crate::plan::{build_plan, OperationPlan};
use crate::range::{resolve_range, RangeSpec};
use crate::refname::validate_ref_name;
use crate::store::{AuditStore, OperationRecord, UndoEntry};
use crate::types::{DuplicatePolicy, OperationKind};

/// A planned operation plus what was learned while planning it.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub plan: OperationPlan,
    /// Commits selected by the range, oldest first.
    pub commits: Vec<String>,
    /// Subset of `commits` whose patch is already on the target.
    pub duplicates: Vec<String>,
}

impl Prepared {
    fn without_lookup(plan: OperationPlan) -> Self {
        Self {
            plan,
            commits: Vec::new(),
            duplicates: Vec::new(),
        }
    }
}

/// Decide whether to go ahead given the duplicate `policy`.
///
/// `ask` is only consulted for [`DuplicatePolicy::Ask`] and only when there
/// are duplicates.
pub fn should_proceed<F>(policy: DuplicatePolicy, duplicates: &[String], ask: F) -> Result<bool>
where
    F: FnOnce(&[String]) -> Result<bool>,
{
    if duplicates.is_empty() {
        return Ok(true);
    }
    match policy {
        DuplicatePolicy::Skip => Ok(false),
        DuplicatePolicy::Apply => Ok(true),
        DuplicatePolicy::Ask => ask(duplicates),
    }
}

/// One caller's view of the engine: a gateway, a store, resolved settings,
/// and a cancellation token checked before each request.
pub struct Session<'a, G: Gateway + ?Sized> {
    gateway: &'a G,
    store: AuditStore,
    config: Config,
    cancel: CancelToken,
}

impl<'a, G: Gateway + ?Sized> Session<'a, G> {
    pub fn new(gateway: &'a G, store_root: impl AsRef<Path>, config: Config) -> Self {
        Self {
            gateway,
            store: AuditStore::open(store_root),
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_store(mut self, store: AuditStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &AuditStore {
        &self.store
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Require a clean working tree, then fetch if `refresh` is set.
    pub fn preflight(&self, refresh: bool) -> Result<()> {
        self.cancel.check()?;
        if !self.gateway.is_clean()? {
            return Err(Error::DirtyWorktree);
        }
        if refresh {
            log::info!("fetching with --prune --tags");
            self.gateway.fetch(true, true)?;
        }
        Ok(())
    }

    /// Plan moving `range` from `source` onto `target` as one commit.
    ///
    /// `message` overrides the configured template.
    pub fn transfer(
        &self,
        source: &str,
        target: &str,
        range: &str,
        message: Option<&str>,
    ) -> Result<Prepared> {
        self.cancel.check()?;
        validate_ref_name(source)?;
        validate_ref_name(target)?;
        let range = RangeSpec::parse(range, false)?;

        let commits = resolve_range(self.gateway, &range);
        let duplicates = detect_duplicates(self.gateway, target, &commits)?;
        if !duplicates.is_empty() {
            log::info!(
                "{} of {} commit(s) already on {}",
                duplicates.len(),
                commits.len(),
                target
            );
        }

        let message = match message {
            Some(m) => m.to_string(),
            None => self
                .config
                .transfer_message(source, target, &range.to_string()),
        };
        let plan = build_plan(
            OperationKind::Transfer,
            source,
            target,
            &range.start,
            &range.end,
            &message,
        );
        Ok(Prepared {
            plan,
            commits,
            duplicates,
        })
    }

    /// Plan reverting `range` (a single commit or `a..b`) on `branch`.
    pub fn revert(&self, branch: &str, range: &str, message: Option<&str>) -> Result<Prepared> {
        self.cancel.check()?;
        validate_ref_name(branch)?;
        let spec = RangeSpec::parse(range, true)?;
        let message = match message {
            Some(m) => m.to_string(),
            None => format!("Revert {} on {}", range.trim(), branch),
        };
        let plan = build_plan(
            OperationKind::Revert,
            branch,
            branch,
            &spec.start,
            &spec.end,
            &message,
        );
        Ok(Prepared::without_lookup(plan))
    }

    /// Plan creating `branch` at `commit`.
    pub fn restore(&self, branch: &str, commit: &str) -> Result<Prepared> {
        self.cancel.check()?;
        validate_ref_name(branch)?;
        let commit = commit.trim();
        if commit.is_empty() || commit.starts_with('-') {
            return Err(Error::invalid_range(format!(
                "invalid commit to restore: {:?}",
                commit
            )));
        }
        let message = format!("Restore branch {} at {}", branch, commit);
        let plan = build_plan(OperationKind::Restore, branch, branch, commit, commit, &message);
        Ok(Prepared::without_lookup(plan))
    }

    /// Execute a plan built by this session and record it.
    pub fn apply(&self, plan: &OperationPlan) -> Result<Execution> {
        self.cancel.check()?;
        Executor::new(self.gateway, &self.store)
            .with_cancel(self.cancel.clone())
            .execute(plan)
    }

    /// Step back in the undo history. Never touches the working tree.
    pub fn undo(&self) -> Result<Option<UndoEntry>> {
        self.cancel.check()?;
        self.store.pop_undo()
    }

    /// Step forward in the undo history. Never touches the working tree.
    pub fn redo(&self) -> Result<Option<UndoEntry>> {
        self.cancel.check()?;
        self.store.pop_redo()
    }

    /// Recorded operations, oldest first.
    pub fn history(&self) -> Result<Vec<OperationRecord>> {
        self.store.operations()
    }
}
