use crate::runner::RunResult;

/// Final status of one process run. `main` is the only place that turns this
/// into an actual process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failure,
    Exception,
}

impl ExitOutcome {
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Failure => 1,
            ExitOutcome::Exception => 2,
        }
    }

    /// Map a finished backup run to an outcome.
    ///
    /// A run that reported failures without recording errors is a business
    /// failure; any recorded error escalates to Exception.
    pub fn from_run(result: &RunResult) -> Self {
        if result.was_successful() {
            ExitOutcome::Success
        } else if result.error_count() > 0 {
            ExitOutcome::Exception
        } else {
            ExitOutcome::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_fixed() {
        assert_eq!(ExitOutcome::Success.code(), 0);
        assert_eq!(ExitOutcome::Failure.code(), 1);
        assert_eq!(ExitOutcome::Exception.code(), 2);
    }

    #[test]
    fn successful_run_exits_zero() {
        let mut result = RunResult::default();
        result.backup_succeeded();
        assert_eq!(ExitOutcome::from_run(&result), ExitOutcome::Success);
    }

    #[test]
    fn failure_without_errors_is_business_failure() {
        let mut result = RunResult::default();
        result.backup_failed();
        assert_eq!(ExitOutcome::from_run(&result), ExitOutcome::Failure);
    }

    #[test]
    fn recorded_errors_escalate_to_exception() {
        let mut result = RunResult::default();
        result.backup_failed();
        result.add_error("db", "could not spawn shell");
        assert_eq!(ExitOutcome::from_run(&result), ExitOutcome::Exception);
    }
}
