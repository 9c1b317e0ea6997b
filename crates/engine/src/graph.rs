//! Derived adjacency of a template graph.
//!
//! Steps only store outgoing branches. Anything that needs "who points to
//! me" computes it here, fresh, from the current template.

use std::collections::{HashMap, HashSet};

use crate::WorkflowTemplate;

/// Map every step id to the set of step ids with a branch into it.
///
/// Every step appears as a key, with an empty set when nothing points to it.
/// Dangling targets (ids with no matching step) are keyed as well.
pub fn incoming_edges(template: &WorkflowTemplate) -> HashMap<String, HashSet<String>> {
    let mut incoming: HashMap<String, HashSet<String>> = template
        .steps
        .iter()
        .map(|s| (s.id.clone(), HashSet::new()))
        .collect();

    for step in &template.steps {
        for branch in &step.branches {
            incoming
                .entry(branch.target_step_id.clone())
                .or_default()
                .insert(step.id.clone());
        }
    }

    incoming
}
