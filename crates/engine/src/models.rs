//! Core domain models for workflow templates.
//!
//! These types are the source of truth for what a template looks like in
//! memory. They serialise to/from the JSON document exchanged with the
//! persistence collaborator, so field names are camelCase on the wire
//! (`startingStepId`, `branches[].targetStepId`, `branches[].condition.rule`).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use rules::{ParsedRule, RuleError};

// ---------------------------------------------------------------------------
// BranchCondition
// ---------------------------------------------------------------------------

/// Guard on a branch. `rule` holds the serialized rule JSON, e.g.
/// `{"<": [{"var": "patient.age"}, 18], "name": "Minor"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCondition {
    #[serde(default)]
    pub id: Option<String>,
    pub rule: String,
}

impl BranchCondition {
    pub fn new(rule: impl Into<String>) -> Self {
        Self { id: None, rule: rule.into() }
    }

    /// Parse the serialized rule.
    pub fn parsed(&self) -> Result<ParsedRule, RuleError> {
        ParsedRule::parse(&self.rule)
    }

    /// The `name` label stored next to the operator key, if the rule is a JSON
    /// object carrying one.
    pub fn name(&self) -> Option<String> {
        match serde_json::from_str::<Value>(&self.rule) {
            Ok(Value::Object(map)) => map.get("name").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// Directed edge from the owning step to `target_step_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(default)]
    pub id: Option<String>,
    /// Source step, kept for traceability only.
    #[serde(default)]
    pub step_id: Option<String>,
    pub target_step_id: String,
    /// `None` makes this an unconditional (default) edge.
    #[serde(default)]
    pub condition: Option<BranchCondition>,
}

impl Branch {
    pub fn new(step_id: impl Into<String>, target_step_id: impl Into<String>) -> Self {
        Self {
            id: None,
            step_id: Some(step_id.into()),
            target_step_id: target_step_id.into(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, rule: impl Into<String>) -> Self {
        self.condition = Some(BranchCondition::new(rule));
        self
    }

    pub fn is_default(&self) -> bool {
        self.condition.is_none()
    }
}

// ---------------------------------------------------------------------------
// TemplateStep
// ---------------------------------------------------------------------------

/// A node of the template graph. Branch order is evaluation priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStep {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    /// Questionnaire to fill in at this step.
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub expected_completion: Option<String>,
    /// Entry conditions; opaque to the engine.
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub last_edited: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_edited_by: Option<String>,
}

impl TemplateStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: String::new(),
            form_id: None,
            expected_completion: None,
            conditions: None,
            branches: Vec::new(),
            archived: false,
            last_edited: None,
            last_edited_by: None,
        }
    }

    /// Builder used by fixtures: append an unconditioned branch.
    pub fn to(mut self, target_step_id: impl Into<String>) -> Self {
        let branch = Branch::new(self.id.clone(), target_step_id);
        self.branches.push(branch);
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowTemplate
// ---------------------------------------------------------------------------

/// The root aggregate: a directed graph of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Monotonically increasing per classification.
    #[serde(default)]
    pub version: u32,
    /// Groups the revisions of one template.
    #[serde(default)]
    pub classification_id: Option<String>,
    #[serde(default)]
    pub starting_step_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<TemplateStep>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_edited: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_edited_by: Option<String>,
}

impl WorkflowTemplate {
    /// Create an empty first revision with fresh ids.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            version: 1,
            classification_id: Some(Uuid::new_v4().to_string()),
            starting_step_id: None,
            steps: Vec::new(),
            archived: false,
            date_created: Some(now),
            last_edited: Some(now),
            last_edited_by: None,
        }
    }

    /// Builder used by fixtures and the CLI: set steps and the entry step.
    pub fn with_steps(mut self, starting_step_id: impl Into<String>, steps: Vec<TemplateStep>) -> Self {
        self.starting_step_id = Some(starting_step_id.into());
        self.steps = steps;
        self
    }

    pub fn step(&self, id: &str) -> Option<&TemplateStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut TemplateStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn contains_step(&self, id: &str) -> bool {
        self.step(id).is_some()
    }

    pub fn step_ids(&self) -> HashSet<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn is_starting_step(&self, id: &str) -> bool {
        self.starting_step_id.as_deref() == Some(id)
    }

    /// Copy this template into the next revision of the same classification.
    ///
    /// Step ids are kept so branch targets stay valid; the template id, the
    /// version and the timestamps are renewed.
    pub fn new_revision(&self) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            version: self.version.saturating_add(1),
            classification_id: self
                .classification_id
                .clone()
                .or_else(|| Some(self.id.clone())),
            archived: false,
            date_created: Some(now),
            last_edited: Some(now),
            ..self.clone()
        }
    }
}
