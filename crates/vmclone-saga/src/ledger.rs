use crate::audit::SagaAuditLog;
use crate::error::CompensationError;
use crate::step::SagaStep;

struct LedgerEntry<T> {
    record: usize,
    resource: T,
}

/// Append-only record of resources created by one saga run.
///
/// Entries are only ever appended by [`execute`] after the step succeeded, so
/// the ledger holds exactly the resources this run created. [`rollback`]
/// consumes the entries in reverse creation order.
///
/// [`execute`]: CompensationLedger::execute
/// [`rollback`]: CompensationLedger::rollback
pub struct CompensationLedger<T> {
    entries: Vec<LedgerEntry<T>>,
}

impl<T: Clone> CompensationLedger<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Execute `step` and record its output on success.
    ///
    /// # Errors
    ///
    /// Returns the step's error unchanged. Nothing is recorded on failure.
    pub fn execute<S>(
        &mut self,
        step: &S,
        ctx: &S::Context,
        input: S::Input,
        audit_log: &mut SagaAuditLog,
    ) -> Result<T, S::Error>
    where
        S: SagaStep<Output = T>,
    {
        let record = audit_log.record_start(step.name());

        match step.execute(ctx, input) {
            Ok(resource) => {
                audit_log.record_success(record, Some(step.compensation_description(&resource)));
                self.entries.push(LedgerEntry {
                    record,
                    resource: resource.clone(),
                });
                Ok(resource)
            }
            Err(error) => {
                audit_log.record_failure(record);
                Err(error)
            }
        }
    }

    /// Compensate every recorded resource, newest first, emptying the ledger.
    ///
    /// A failing compensation does not stop the loop; its error is collected
    /// and returned once all entries have been processed.
    pub fn rollback<S>(
        &mut self,
        step: &S,
        ctx: &S::Context,
        audit_log: &mut SagaAuditLog,
    ) -> Vec<CompensationError<S::Error>>
    where
        S: SagaStep<Output = T>,
    {
        let mut compensation_errors = Vec::new();

        while let Some(entry) = self.entries.pop() {
            match step.compensate(ctx, &entry.resource) {
                Ok(()) => audit_log.record_compensated(entry.record),
                Err(error) => {
                    audit_log.record_compensation_failed(entry.record);
                    compensation_errors.push(CompensationError {
                        step: step.name().to_string(),
                        description: step.compensation_description(&entry.resource),
                        error,
                    });
                }
            }
        }

        compensation_errors
    }

    /// Recorded resources in creation order.
    pub fn resources(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|entry| &entry.resource)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for CompensationLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::audit::StepStatus;

    struct TestContext {
        compensation_log: RefCell<Vec<String>>,
        fail_compensation_for: Option<i32>,
    }

    impl TestContext {
        fn new() -> Self {
            Self {
                compensation_log: RefCell::new(Vec::new()),
                fail_compensation_for: None,
            }
        }
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    struct CreateStep;

    impl SagaStep for CreateStep {
        type Input = i32;
        type Output = i32;
        type Context = TestContext;
        type Error = TestError;

        fn name(&self) -> &'static str {
            "create"
        }

        fn execute(
            &self,
            _ctx: &Self::Context,
            input: Self::Input,
        ) -> Result<Self::Output, Self::Error> {
            if input < 0 {
                return Err(TestError(format!("cannot create {input}")));
            }
            Ok(input * 10)
        }

        fn compensate(&self, ctx: &Self::Context, output: &Self::Output) -> Result<(), Self::Error> {
            if ctx.fail_compensation_for == Some(*output) {
                return Err(TestError(format!("cannot remove {output}")));
            }
            ctx.compensation_log
                .borrow_mut()
                .push(format!("remove {output}"));
            Ok(())
        }

        fn compensation_description(&self, output: &Self::Output) -> String {
            format!("remove resource {output}")
        }
    }

    #[test]
    fn successful_execute_records_resource() -> anyhow::Result<()> {
        let ctx = TestContext::new();
        let mut audit_log = SagaAuditLog::new();
        let mut ledger = CompensationLedger::new();

        let created = ledger.execute(&CreateStep, &ctx, 4, &mut audit_log)?;

        assert_eq!(created, 40);
        assert_eq!(ledger.resources().copied().collect::<Vec<_>>(), vec![40]);
        assert_eq!(
            audit_log.records()[0].compensation_description.as_deref(),
            Some("remove resource 40")
        );
        Ok(())
    }

    #[test]
    fn failed_execute_records_nothing() {
        let ctx = TestContext::new();
        let mut audit_log = SagaAuditLog::new();
        let mut ledger = CompensationLedger::new();

        let result = ledger.execute(&CreateStep, &ctx, -1, &mut audit_log);

        assert_eq!(result, Err(TestError("cannot create -1".to_string())));
        assert!(ledger.is_empty());
        assert_eq!(audit_log.records()[0].status, StepStatus::Failed);
    }

    #[test]
    fn rollback_runs_in_reverse_order_and_empties_ledger() -> anyhow::Result<()> {
        let ctx = TestContext::new();
        let mut audit_log = SagaAuditLog::new();
        let mut ledger = CompensationLedger::new();

        for input in 1..=3 {
            ledger.execute(&CreateStep, &ctx, input, &mut audit_log)?;
        }

        let errors = ledger.rollback(&CreateStep, &ctx, &mut audit_log);

        assert!(errors.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(
            *ctx.compensation_log.borrow(),
            vec!["remove 30", "remove 20", "remove 10"]
        );
        assert_eq!(audit_log.count(StepStatus::Compensated), 3);
        Ok(())
    }

    #[test]
    fn rollback_continues_past_failed_compensation() -> anyhow::Result<()> {
        let mut ctx = TestContext::new();
        ctx.fail_compensation_for = Some(20);
        let mut audit_log = SagaAuditLog::new();
        let mut ledger = CompensationLedger::new();

        for input in 1..=3 {
            ledger.execute(&CreateStep, &ctx, input, &mut audit_log)?;
        }

        let errors = ledger.rollback(&CreateStep, &ctx, &mut audit_log);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, "create");
        assert_eq!(errors[0].description, "remove resource 20");
        assert_eq!(*ctx.compensation_log.borrow(), vec!["remove 30", "remove 10"]);
        assert_eq!(audit_log.records()[1].status, StepStatus::CompensationFailed);
        Ok(())
    }

    #[test]
    fn rollback_of_empty_ledger_is_noop() {
        let ctx = TestContext::new();
        let mut audit_log = SagaAuditLog::new();
        let mut ledger: CompensationLedger<i32> = CompensationLedger::new();

        let errors = ledger.rollback(&CreateStep, &ctx, &mut audit_log);

        assert!(errors.is_empty());
        assert!(audit_log.records().is_empty());
    }
}
