//! Display ordering of template steps.
//!
//! Breadth-first walk from the starting step. Each step gets a 1-based
//! sequence number the first time it is dequeued; its branch targets are
//! enqueued in branch order. Targets with no matching step are never
//! enqueued. Steps the walk never reaches are listed separately so callers
//! can append them instead of dropping them.
//!
//! The ordering is for rendering only and never written back to the template.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::WorkflowTemplate;

/// A step and its display position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedStep {
    pub step_id: String,
    /// 1-based.
    pub sequence: usize,
}

/// Result of ordering a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOrder {
    /// Reachable steps in BFS order.
    pub sequence: Vec<OrderedStep>,
    /// Steps not reachable from the start, in stored order.
    pub unreachable: Vec<String>,
}

impl StepOrder {
    pub fn sequence_of(&self, step_id: &str) -> Option<usize> {
        self.sequence
            .iter()
            .find(|s| s.step_id == step_id)
            .map(|s| s.sequence)
    }

    /// Reachable steps first, then the unreachable ones.
    pub fn display_order(&self) -> Vec<&str> {
        self.sequence
            .iter()
            .map(|s| s.step_id.as_str())
            .chain(self.unreachable.iter().map(String::as_str))
            .collect()
    }
}

/// Order the steps of `template` for display.
///
/// With no (or an unknown) starting step nothing is sequenced and every step
/// is reported as unreachable.
pub fn step_order(template: &WorkflowTemplate) -> StepOrder {
    // First occurrence wins if ids are duplicated.
    let mut by_id = HashMap::new();
    for step in &template.steps {
        by_id.entry(step.id.as_str()).or_insert(step);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut sequence = Vec::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    if let Some(start) = template.starting_step_id.as_deref() {
        if by_id.contains_key(start) {
            queue.push_back(start);
        }
    }

    while let Some(step_id) = queue.pop_front() {
        if !visited.insert(step_id) {
            continue;
        }
        sequence.push(OrderedStep {
            step_id: step_id.to_owned(),
            sequence: sequence.len() + 1,
        });

        if let Some(step) = by_id.get(step_id) {
            for branch in &step.branches {
                let target = branch.target_step_id.as_str();
                if by_id.contains_key(target) {
                    queue.push_back(target);
                }
            }
        }
    }

    let mut unreachable = Vec::new();
    for step in &template.steps {
        let id = step.id.as_str();
        if !visited.contains(id) && !unreachable.iter().any(|u: &String| u == id) {
            unreachable.push(step.id.clone());
        }
    }

    StepOrder { sequence, unreachable }
}
