/// A step in a saga that creates a resource and can later remove it.
///
/// # Type Parameters
///
/// - `Input`: Data the step needs to create its resource
/// - `Output`: The created resource, recorded in the ledger for compensation
/// - `Context`: Shared dependencies (injected, not passed between steps)
/// - `Error`: The error type for step failures
pub trait SagaStep: Send + Sync {
    /// Data required to execute the step.
    type Input;

    /// Resource produced by the step.
    type Output: Clone;

    /// Shared context providing dependencies.
    type Context;

    /// Error type for step failures.
    type Error;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &'static str;

    /// Execute the step, creating a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource could not be created. A failed step
    /// must not leave anything behind that needs compensation.
    fn execute(&self, ctx: &Self::Context, input: Self::Input)
    -> Result<Self::Output, Self::Error>;

    /// Compensate (undo) the step's effects.
    ///
    /// Called during rollback with the resource returned by `execute()`.
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    fn compensate(&self, ctx: &Self::Context, output: &Self::Output) -> Result<(), Self::Error> {
        let _ = (ctx, output);
        Ok(())
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self, output: &Self::Output) -> String {
        let _ = output;
        format!("undo {}", self.name())
    }
}
