//! Plan, preview, and apply commit transfers between git branches.
//!
//! `gitcherry` moves a range of commits from one branch onto another as a
//! single squashed commit, reverts ranges, and recreates branches at a given
//! commit. Every applied operation is written to an audit log and to a linear
//! undo history kept under `.gitcherry/` next to the repository.
//!
//! # Key types
//!
//! - [`Gateway`]: the seam to git. [`GitCli`] runs the `git` binary; tests
//!   substitute their own implementation.
//! - [`Session`]: validates a request, resolves the range, flags duplicate
//!   patches, and builds an [`OperationPlan`].
//! - [`Executor`]: runs a plan step by step and records it.
//! - [`AuditStore`]: append-only operation log plus the undo/redo stack.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use gitcherry::{Config, GitCli, Session};
//!
//! let git = GitCli::in_dir("/tmp/my-repo");
//! let session = Session::new(&git, "/tmp/my-repo", Config::default());
//!
//! session.preflight(false).unwrap();
//! let prepared = session.transfer("main", "release", "a1b2c3..d4e5f6", None).unwrap();
//! for cmd in prepared.plan.commands() {
//!     println!("{}", cmd);
//! }
//! let done = session.apply(&prepared.plan).unwrap();
//! println!("release is now at {}", done.after_head);
//! ```

pub mod cancel;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod lock;
pub mod ops;
pub mod plan;
pub mod range;
pub mod refname;
pub mod store;
pub mod types;

// Re-export primary public types at crate root.
pub use cancel::CancelToken;
pub use config::Config;
pub use duplicates::detect_duplicates;
pub use error::{Error, Result};
pub use executor::{Execution, Executor};
pub use gateway::{Gateway, GitCli, GitOutput};
pub use ops::{should_proceed, Prepared, Session};
pub use plan::{build_plan, OperationPlan, PlanStep};
pub use range::{resolve_range, RangeSpec};
pub use refname::validate_ref_name;
pub use store::{AuditStore, OperationRecord, UndoEntry, UndoStack};
pub use types::*;
