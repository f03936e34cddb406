mod common;

use common::TestRepo;
use gitcherry::*;

/// `main`: initial, a, b; `feature` at initial; `main` checked out.
fn two_ahead() -> (TestRepo, String, String, String) {
    let t = TestRepo::with_initial_commit();
    let base = t.head_of("main");
    t.branch("feature");
    let a = t.commit_file("a.txt", "a\n", "add a");
    let b = t.commit_file("b.txt", "b\n", "add b");
    (t, base, a, b)
}

// ---------------------------------------------------------------------------
// transfer
// ---------------------------------------------------------------------------

#[test]
fn transfer_squashes_range_onto_target() {
    let (t, base, a, b) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Transfer, "main", "feature", &a, &b, "squashed a and b");

    let done = Executor::new(&git, &store).execute(&plan).unwrap();

    assert_eq!(done.before_head.as_deref(), Some(base.as_str()));
    assert_eq!(done.after_head, t.head_of("feature"));
    assert_eq!(t.tip_subject("feature"), "squashed a and b");
    assert_eq!(git.current_branch().unwrap(), "feature");
    assert_eq!(t.read_file("a.txt").as_deref(), Some("a\n"));
    assert_eq!(t.read_file("b.txt").as_deref(), Some("b\n"));

    // one commit on top of the old head
    let added = git.rev_list(&format!("{}..feature", base)).unwrap();
    assert_eq!(added, [done.after_head.clone()]);
    // main untouched
    assert_eq!(t.head_of("main"), b);
}

#[test]
fn heads_come_from_branch_when_tag_shares_its_name() {
    let t = TestRepo::with_initial_commit();
    let root = t.head_of("main");
    t.tag("feature");
    t.branch("feature");
    t.checkout("feature");
    let feature_tip = t.commit_file("f.txt", "feature\n", "feature work");
    t.checkout("main");
    let a = t.commit_file("a.txt", "a\n", "add a");

    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Transfer, "main", "feature", &a, &a, "carry a");

    let done = Executor::new(&git, &store).execute(&plan).unwrap();

    assert_eq!(done.before_head.as_deref(), Some(feature_tip.as_str()));
    assert_eq!(done.after_head, t.head_of("feature"));
    assert_ne!(done.after_head, root);
    assert_eq!(t.tip_subject("feature"), "carry a");

    let entry = store.pop_undo().unwrap().unwrap();
    assert_eq!(entry.before_head.as_deref(), Some(feature_tip.as_str()));
    assert_eq!(entry.after_head, done.after_head);
}

#[test]
fn transfer_records_history_and_undo() {
    let (t, base, a, b) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Transfer, "main", "feature", &a, &b, "msg");

    let done = Executor::new(&git, &store).execute(&plan).unwrap();
    assert!(done.record_path.starts_with(store.logs_dir()));

    let ops = store.operations().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::Transfer);
    assert_eq!(ops[0].commands, plan.commands());

    let entry = store.pop_undo().unwrap().unwrap();
    assert_eq!(entry.source, "main");
    assert_eq!(entry.target, "feature");
    assert_eq!(entry.before_head.as_deref(), Some(base.as_str()));
    assert_eq!(entry.after_head, done.after_head);
}

#[test]
fn conflicting_transfer_halts_for_manual_resolution() {
    let t = TestRepo::new();
    t.commit_file("f.txt", "base\n", "base");
    t.branch("feature");
    let change = t.commit_file("f.txt", "main side\n", "main change");
    t.checkout("feature");
    t.commit_file("f.txt", "feature side\n", "feature change");
    t.checkout("main");

    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Transfer, "main", "feature", &change, &change, "m");

    let err = Executor::new(&git, &store).execute(&plan).unwrap_err();
    match &err {
        Error::ConflictHalted { command, hint, .. } => {
            assert!(command.starts_with("git cherry-pick --no-commit"));
            assert!(hint.contains("git cherry-pick --continue"));
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    assert!(err.is_recoverable());
    assert!(!git.is_clean().unwrap());
    assert!(store.operations().unwrap().is_empty());
    assert!(store.undo_stack().unwrap().is_empty());
}

#[test]
fn missing_target_fails_before_any_step() {
    let (t, _, a, b) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Transfer, "main", "no-such-branch", &a, &b, "m");

    let err = Executor::new(&git, &store).execute(&plan).unwrap_err();
    assert!(matches!(err, Error::Fatal { .. }));
    assert_eq!(git.current_branch().unwrap(), "main");
    assert!(store.operations().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// revert
// ---------------------------------------------------------------------------

#[test]
fn revert_single_commit() {
    let (t, _, _, b) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Revert, "main", "main", &b, &b, "drop b");

    let done = Executor::new(&git, &store).execute(&plan).unwrap();
    assert_eq!(done.before_head.as_deref(), Some(b.as_str()));
    assert_eq!(t.tip_subject("main"), "drop b");
    assert!(t.read_file("b.txt").is_none());
    assert_eq!(t.read_file("a.txt").as_deref(), Some("a\n"));
}

#[test]
fn revert_range() {
    let (t, _, a, b) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Revert, "main", "main", &a, &b, "drop both");

    Executor::new(&git, &store).execute(&plan).unwrap();
    assert!(t.read_file("a.txt").is_none());
    assert!(t.read_file("b.txt").is_none());
    assert_eq!(t.read_file("README").as_deref(), Some("readme\n"));
}

// ---------------------------------------------------------------------------
// restore
// ---------------------------------------------------------------------------

#[test]
fn restore_creates_branch_without_checkout() {
    let (t, _, a, _) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Restore, "backup", "backup", &a, &a, "restore");

    let done = Executor::new(&git, &store).execute(&plan).unwrap();
    assert!(done.before_head.is_none());
    assert_eq!(done.after_head, a);
    assert_eq!(t.head_of("backup"), a);
    assert_eq!(git.current_branch().unwrap(), "main");

    let entry = store.pop_undo().unwrap().unwrap();
    assert!(entry.before_head.is_none());
}

#[test]
fn restore_over_existing_branch_is_fatal() {
    let (t, _, a, _) = two_ahead();
    let git = t.git();
    let store_dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(store_dir.path());
    let plan = build_plan(OperationKind::Restore, "feature", "feature", &a, &a, "restore");

    let err = Executor::new(&git, &store).execute(&plan).unwrap_err();
    assert!(matches!(err, Error::Fatal { .. }));
    assert!(!err.is_recoverable());
    assert_ne!(t.head_of("feature"), a);
}
