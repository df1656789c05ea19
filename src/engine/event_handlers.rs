// src/engine/event_handlers.rs

//! Per-feature event handling: attempt transitions, outcome
//! classification and the retry policies.

use tracing::{debug, info};

use crate::config::ExitCodeSection;
use crate::engine::core::FeatureRegistry;
use crate::engine::{CoreCommand, RunOptions};
use crate::errors::Result;
use crate::feature::{locate_summary, parse_scenarios, FeatureTask, ScenarioResult};
use crate::types::{FeatureId, ProcessError};

/// How a finished attempt is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Exit 0 and no pending scenarios.
    Success,
    /// Exit 0 but the runner reported pending scenarios.
    PendingAsFailure,
    /// The executor killed the process after its timeout.
    ForcedKill,
    /// The runner lost its browser/session (environment timeout exit code).
    EnvironmentTimeout,
    /// The runner hit a transient transport failure.
    TransportError,
    /// Scenario assertions failed.
    TestFailure,
    /// Anything else. Never retried.
    Unknown,
}

/// Classify a finished process.
///
/// Scenario counts only matter when the process exited cleanly; otherwise
/// the process error alone decides.
pub fn classify(
    error: Option<&ProcessError>,
    scenarios: Option<&ScenarioResult>,
    codes: &ExitCodeSection,
) -> Classification {
    let Some(err) = error else {
        return match scenarios {
            Some(s) if s.pending() > 0 => Classification::PendingAsFailure,
            _ => Classification::Success,
        };
    };

    if err.killed {
        return Classification::ForcedKill;
    }

    match err.code {
        Some(code) if code == codes.environment_timeout => Classification::EnvironmentTimeout,
        Some(code) if code == codes.transport_error => Classification::TransportError,
        Some(code) if code == codes.scenario_failure => Classification::TestFailure,
        _ => Classification::Unknown,
    }
}

/// Handle a "started" event: open a new attempt.
pub fn handle_task_started(registry: &mut FeatureRegistry, id: FeatureId) -> Result<Vec<CoreCommand>> {
    let feature = registry.get_mut(id)?;
    feature.start()?;
    debug!(feature = %feature.descriptor(), attempt = feature.attempts().len(), "attempt started");

    Ok(vec![
        CoreCommand::Log(format!("Started: [{}] {}", id, feature.command())),
        CoreCommand::WriteReport,
    ])
}

/// Handle a "finished" event: classify, transition, decide on resubmission.
pub fn handle_task_finished(
    registry: &mut FeatureRegistry,
    options: &RunOptions,
    id: FeatureId,
    error: Option<ProcessError>,
    stdout: &str,
    stderr: &str,
) -> Result<Vec<CoreCommand>> {
    registry.finish_submission(id);

    let summary = locate_summary(stdout);
    let scenarios = summary.and_then(|s| parse_scenarios(s.scenarios));
    let classification = classify(error.as_ref(), scenarios.as_ref(), &options.exit_codes);
    let summary_text = summary.map(|s| s.scenarios).unwrap_or_default();
    let elapsed_text = summary.and_then(|s| s.elapsed).unwrap_or_default();

    let mut commands = Vec::new();
    let feature = registry.get_mut(id)?;
    let descriptor = feature.descriptor().to_string();

    info!(
        feature = %descriptor,
        ?classification,
        exit_code = error.as_ref().and_then(|e| e.code),
        "attempt finished"
    );

    let resubmit = match classification {
        Classification::Success => {
            commands.push(CoreCommand::Log(format!(
                "Completed: {descriptor} - {summary_text} in {elapsed_text}"
            )));
            feature.succeeded(scenarios)?;
            false
        }
        Classification::PendingAsFailure => {
            commands.push(CoreCommand::Log(format!(
                "Completed: {descriptor} - {summary_text} in {elapsed_text}"
            )));
            feature.failed(scenarios)?;
            standard_retry(feature, options, &mut commands)
        }
        Classification::ForcedKill => {
            commands.push(CoreCommand::Log(format!("Killed (timeout): {descriptor}")));
            feature.force_kill_timeout()?;
            standard_retry(feature, options, &mut commands)
        }
        Classification::EnvironmentTimeout => {
            feature.selenium_timeout()?;
            if feature.environment_timeouts() <= options.environment_timeout_resubmits {
                commands.push(CoreCommand::Log(format!(
                    "Selenium timeout: {descriptor} - adding to the back of the queue."
                )));
                true
            } else {
                commands.push(CoreCommand::Log(format!("Selenium timeout: {descriptor}")));
                standard_retry(feature, options, &mut commands)
            }
        }
        Classification::TransportError => {
            feature.transport_error()?;
            let code = options.exit_codes.transport_error;
            if feature.transport_errors() <= options.transport_error_resubmits {
                commands.push(CoreCommand::Log(format!(
                    "Curl Error {code}: {descriptor} - adding to the back of the queue."
                )));
                true
            } else {
                commands.push(CoreCommand::Log(format!(
                    "Curl Error {code}: {descriptor}"
                )));
                standard_retry(feature, options, &mut commands)
            }
        }
        Classification::TestFailure => {
            commands.push(CoreCommand::Log(format!(
                "Failed: {descriptor} - {summary_text} in {elapsed_text}"
            )));
            feature.failed(scenarios)?;
            standard_retry(feature, options, &mut commands)
        }
        Classification::Unknown => {
            let err = error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            let line = format!("Error: {descriptor} - {err} {}", stdout.trim_end());
            commands.push(CoreCommand::Log(line.trim_end().to_string()));
            feature.unknown()?;
            false
        }
    };

    if options.debug {
        commands.extend(diagnostics(feature, error.as_ref(), stdout, stderr));
    }

    if resubmit {
        commands.push(registry.resubmit(id)?);
    }
    commands.push(CoreCommand::WriteReport);

    Ok(commands)
}

/// Resubmit while the retry budget allows it.
///
/// Returns whether the feature should go back on the queue.
fn standard_retry(
    feature: &mut FeatureTask,
    options: &RunOptions,
    commands: &mut Vec<CoreCommand>,
) -> bool {
    if feature.retries() + 1 > options.num_retries {
        return false;
    }

    commands.push(CoreCommand::Log(format!(
        "Retrying: {} {} of {} time(s)",
        feature.descriptor(),
        feature.retries() + 1,
        options.num_retries
    )));
    feature.requeue();
    true
}

fn diagnostics(
    feature: &FeatureTask,
    error: Option<&ProcessError>,
    stdout: &str,
    stderr: &str,
) -> Vec<CoreCommand> {
    let mut lines = vec![format!(
        "\ntask: \n{} status={:?} attempts={} retries={} environment_timeouts={} transport_errors={}",
        feature.descriptor(),
        feature.status(),
        feature.attempts().len(),
        feature.retries(),
        feature.environment_timeouts(),
        feature.transport_errors()
    )];
    if let Some(err) = error {
        lines.push(format!("\nerr: \n{err:?}"));
    }
    if !stderr.is_empty() {
        lines.push(format!("\nstderr: \n{stderr}"));
    }
    if !stdout.is_empty() {
        lines.push(format!("\nstdout: \n{stdout}"));
    }
    lines.into_iter().map(CoreCommand::Log).collect()
}
