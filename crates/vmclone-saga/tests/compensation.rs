//! Integration tests for multi-ledger compensation.
//!
//! Models a run that records two kinds of resources in separate ledgers and
//! unwinds one kind completely before the other.

use std::cell::RefCell;
use std::collections::BTreeSet;

use vmclone_saga::{CompensationLedger, SagaAuditLog, SagaStep, StepStatus};

#[derive(Default)]
struct Pool {
    snapshots: RefCell<BTreeSet<String>>,
    clones: RefCell<BTreeSet<String>>,
    removal_order: RefCell<Vec<String>>,
    stuck: RefCell<BTreeSet<String>>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
struct PoolError(String);

struct TakeSnapshot;

impl SagaStep for TakeSnapshot {
    type Input = &'static str;
    type Output = String;
    type Context = Pool;
    type Error = PoolError;

    fn name(&self) -> &'static str {
        "take_snapshot"
    }

    fn execute(&self, ctx: &Pool, input: &'static str) -> Result<String, PoolError> {
        let id = format!("{input}@copy");
        ctx.snapshots.borrow_mut().insert(id.clone());
        Ok(id)
    }

    fn compensate(&self, ctx: &Pool, output: &String) -> Result<(), PoolError> {
        ctx.removal_order.borrow_mut().push(output.clone());
        ctx.snapshots.borrow_mut().remove(output);
        Ok(())
    }
}

struct MakeClone;

impl SagaStep for MakeClone {
    type Input = String;
    type Output = String;
    type Context = Pool;
    type Error = PoolError;

    fn name(&self) -> &'static str {
        "make_clone"
    }

    fn execute(&self, ctx: &Pool, input: String) -> Result<String, PoolError> {
        if input.starts_with("broken") {
            return Err(PoolError(format!("clone of {input} failed")));
        }
        let target = input.replace("@copy", "_copy");
        ctx.clones.borrow_mut().insert(target.clone());
        Ok(target)
    }

    fn compensate(&self, ctx: &Pool, output: &String) -> Result<(), PoolError> {
        if ctx.stuck.borrow().contains(output) {
            return Err(PoolError(format!("{output} is busy")));
        }
        ctx.removal_order.borrow_mut().push(output.clone());
        ctx.clones.borrow_mut().remove(output);
        Ok(())
    }

    fn compensation_description(&self, output: &String) -> String {
        format!("destroy clone {output}")
    }
}

fn provision(
    pool: &Pool,
    datasets: &[&'static str],
    snapshots: &mut CompensationLedger<String>,
    clones: &mut CompensationLedger<String>,
    audit_log: &mut SagaAuditLog,
) -> Result<(), PoolError> {
    for dataset in datasets {
        let snapshot = snapshots.execute(&TakeSnapshot, pool, *dataset, audit_log)?;
        clones.execute(&MakeClone, pool, snapshot, audit_log)?;
    }
    Ok(())
}

#[test]
fn clones_unwind_before_snapshots() {
    let pool = Pool::default();
    let mut snapshots = CompensationLedger::new();
    let mut clones = CompensationLedger::new();
    let mut audit_log = SagaAuditLog::new();

    let result = provision(
        &pool,
        &["a", "b", "broken"],
        &mut snapshots,
        &mut clones,
        &mut audit_log,
    );
    assert_eq!(result, Err(PoolError("clone of broken@copy failed".to_string())));
    assert_eq!(snapshots.len(), 3);
    assert_eq!(clones.len(), 2);

    let clone_errors = clones.rollback(&MakeClone, &pool, &mut audit_log);
    let snapshot_errors = snapshots.rollback(&TakeSnapshot, &pool, &mut audit_log);

    assert!(clone_errors.is_empty());
    assert!(snapshot_errors.is_empty());
    assert_eq!(
        *pool.removal_order.borrow(),
        vec!["b_copy", "a_copy", "broken@copy", "b@copy", "a@copy"]
    );
    assert!(pool.snapshots.borrow().is_empty());
    assert!(pool.clones.borrow().is_empty());
}

#[test]
fn successful_run_keeps_every_resource() -> anyhow::Result<()> {
    let pool = Pool::default();
    let mut snapshots = CompensationLedger::new();
    let mut clones = CompensationLedger::new();
    let mut audit_log = SagaAuditLog::new();

    provision(
        &pool,
        &["a", "b"],
        &mut snapshots,
        &mut clones,
        &mut audit_log,
    )?;

    assert_eq!(clones.resources().cloned().collect::<Vec<_>>(), vec!["a_copy", "b_copy"]);
    assert_eq!(pool.snapshots.borrow().len(), 2);
    assert!(pool.removal_order.borrow().is_empty());
    assert_eq!(audit_log.count(StepStatus::Executed), 4);
    Ok(())
}

#[test]
fn failed_compensation_is_reported_without_stopping_rollback() {
    let pool = Pool::default();
    pool.stuck.borrow_mut().insert("b_copy".to_string());
    let mut snapshots = CompensationLedger::new();
    let mut clones = CompensationLedger::new();
    let mut audit_log = SagaAuditLog::new();

    let _ = provision(
        &pool,
        &["a", "b", "broken"],
        &mut snapshots,
        &mut clones,
        &mut audit_log,
    );

    let clone_errors = clones.rollback(&MakeClone, &pool, &mut audit_log);
    let snapshot_errors = snapshots.rollback(&TakeSnapshot, &pool, &mut audit_log);

    assert_eq!(clone_errors.len(), 1);
    assert_eq!(clone_errors[0].description, "destroy clone b_copy");
    assert_eq!(clone_errors[0].error, PoolError("b_copy is busy".to_string()));
    assert!(clone_errors[0].to_string().contains("make_clone"));
    assert!(snapshot_errors.is_empty());
    assert_eq!(
        pool.clones.borrow().iter().cloned().collect::<Vec<_>>(),
        vec!["b_copy".to_string()]
    );
    assert!(pool.snapshots.borrow().is_empty());
    assert_eq!(audit_log.count(StepStatus::CompensationFailed), 1);
}

#[test]
fn audit_log_tracks_every_step_run() {
    let pool = Pool::default();
    let mut snapshots = CompensationLedger::new();
    let mut clones = CompensationLedger::new();
    let mut audit_log = SagaAuditLog::new();

    let _ = provision(
        &pool,
        &["a", "broken"],
        &mut snapshots,
        &mut clones,
        &mut audit_log,
    );
    clones.rollback(&MakeClone, &pool, &mut audit_log);
    snapshots.rollback(&TakeSnapshot, &pool, &mut audit_log);

    let statuses: Vec<_> = audit_log
        .records()
        .iter()
        .map(|r| (r.name.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("take_snapshot", StepStatus::Compensated),
            ("make_clone", StepStatus::Compensated),
            ("take_snapshot", StepStatus::Compensated),
            ("make_clone", StepStatus::Failed),
        ]
    );
    assert!(audit_log.summary().contains("✗ make_clone"));
}
