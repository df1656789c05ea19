// tests/retry_budget.rs

use proptest::prelude::*;
use parallel_behat::engine::{BehatCore, CoreCommand, RunEvent, RunOptions};
use parallel_behat::feature::CommandTemplate;
use parallel_behat::types::{FeatureId, ProcessError};

/// Drive one feature through the core directly: every submission fails with
/// `code` until `failures` attempts have been made, then passes.
fn drive(num_retries: u32, failures: usize, code: i32) -> (BehatCore, usize) {
    let options = RunOptions {
        num_retries,
        ..RunOptions::default()
    };
    let template = CommandTemplate {
        bin: "behat".to_string(),
        ..CommandTemplate::default()
    };
    let mut core = BehatCore::new(vec!["a.feature".to_string()], template, options);

    let mut pending = count_submits(&core.begin().unwrap().commands);
    let mut submissions = pending;
    let mut runs = 0;

    while pending > 0 {
        pending -= 1;
        core.step(RunEvent::TaskStarted { id: FeatureId(1) }).unwrap();
        let error = (runs < failures).then(|| ProcessError::exit_code(code));
        runs += 1;
        let step = core
            .step(RunEvent::TaskFinished {
                id: FeatureId(1),
                error,
                stdout: String::new(),
                stderr: String::new(),
            })
            .unwrap();
        let resubmitted = count_submits(&step.commands);
        pending += resubmitted;
        submissions += resubmitted;
    }

    let step = core.step(RunEvent::AllFinished).unwrap();
    assert!(!step.keep_running);
    (core, submissions)
}

fn count_submits(commands: &[CoreCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, CoreCommand::Submit(_)))
        .count()
}

proptest! {
    #[test]
    fn standard_retries_never_exceed_the_budget(num_retries in 0u32..6, failures in 0usize..10) {
        let (core, submissions) = drive(num_retries, failures, 1);
        let feature = core.feature(FeatureId(1)).unwrap();

        prop_assert!(feature.retries() <= num_retries);
        prop_assert_eq!(submissions, failures.min(num_retries as usize) + 1);
        prop_assert_eq!(feature.is_ok(), failures <= num_retries as usize);
        prop_assert_eq!(feature.attempts().len(), submissions);
    }

    #[test]
    fn unknown_exit_codes_are_run_exactly_once(num_retries in 0u32..6, code in 2i32..200) {
        prop_assume!(code != 13);
        let (core, submissions) = drive(num_retries, 1, code);
        let feature = core.feature(FeatureId(1)).unwrap();

        prop_assert_eq!(submissions, 1);
        prop_assert_eq!(feature.retries(), 0);
        prop_assert!(feature.has_problems());
    }
}
