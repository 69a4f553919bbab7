// src/trigger/matcher.rs

use tracing::debug;

use crate::model::TriggerRule;

/// Select the applicable rule for a commit message (or tag name).
///
/// Enabled rules are checked in priority order, highest first; ties keep
/// their original relative order (stable sort). The first rule whose pattern
/// matches wins. `None` is a "new commit, no build" event, not an error.
pub fn select_trigger<'a>(
    triggers: &'a [TriggerRule],
    commit_message: &str,
) -> Option<&'a TriggerRule> {
    let mut enabled: Vec<&TriggerRule> = triggers.iter().filter(|t| t.enabled).collect();
    enabled.sort_by(|a, b| b.priority.cmp(&a.priority));

    let selected = enabled.into_iter().find(|t| t.matches(commit_message));
    match selected {
        Some(rule) => debug!(trigger = %rule.name, "trigger matched"),
        None => debug!("no trigger matched"),
    }
    selected
}
