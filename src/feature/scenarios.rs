// src/feature/scenarios.rs

//! Parsing the runner's scenario summary.
//!
//! Behat ends its output with a block like:
//!
//! ```text
//! 10 scenarios (6 passed, 1 failed, 1 pending, 2 undefined)
//! 42 steps (38 passed, 4 failed)
//! 0m12.31s
//!
//! ```
//!
//! Only the scenario line is interpreted. Parsed counts enrich the attempt
//! record; they never decide whether an attempt succeeded.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Scenario counts per category, plus the reported total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    #[serde(flatten)]
    pub counts: BTreeMap<String, u32>,
    pub total: u32,
}

impl ScenarioResult {
    pub fn count(&self, category: &str) -> u32 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    pub fn pending(&self) -> u32 {
        self.count("pending")
    }
}

/// The lines of interest found at the tail of a runner's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLines<'a> {
    /// e.g. `3 scenarios (3 passed)`
    pub scenarios: &'a str,
    /// e.g. `0m12.31s`, when present.
    pub elapsed: Option<&'a str>,
}

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+) scenarios? \((.*)\)").expect("scenario summary regex is valid")
    })
}

/// Parse a line such as `"3 scenarios (1 passed, 2 pending)"`.
///
/// Returns `None` if the line does not match or any fragment of the
/// breakdown is malformed. `total` is reserved and never a category.
pub fn parse_scenarios(line: &str) -> Option<ScenarioResult> {
    let caps = summary_regex().captures(line.trim_end())?;
    let total: u32 = caps.get(1)?.as_str().parse().ok()?;
    let breakdown = caps.get(2)?.as_str();
    if breakdown.is_empty() {
        return None;
    }

    let mut counts = BTreeMap::new();
    for fragment in breakdown.split(", ") {
        let (count, category) = fragment.trim().split_once(' ')?;
        let count: u32 = count.parse().ok()?;
        let category = category.trim();
        if category.is_empty() || category == "total" {
            return None;
        }
        counts.insert(category.to_string(), count);
    }

    Some(ScenarioResult { counts, total })
}

/// Find the scenario summary in captured stdout.
///
/// The runner's layout puts the scenario line 4th from the end of
/// `stdout.split('\n')` and the elapsed time 2nd from the end. That position
/// is tried first. If it does not hold a summary, the output is scanned
/// upwards for the last line that does, with the elapsed time taken two
/// lines below it.
pub fn locate_summary(stdout: &str) -> Option<SummaryLines<'_>> {
    let lines: Vec<&str> = stdout.split('\n').collect();
    let n = lines.len();

    if n >= 4 && parse_scenarios(lines[n - 4]).is_some() {
        return Some(SummaryLines {
            scenarios: lines[n - 4],
            elapsed: Some(lines[n - 2]),
        });
    }

    let idx = lines
        .iter()
        .rposition(|line| parse_scenarios(line).is_some())?;
    let elapsed = lines
        .get(idx + 2)
        .copied()
        .filter(|l| !l.trim().is_empty());

    Some(SummaryLines {
        scenarios: lines[idx],
        elapsed,
    })
}
