//! Linear undo/redo history over template snapshots.
//!
//! The history is a list of snapshots plus a cursor. Capturing after an undo
//! discards everything past the cursor. Undo and redo at the ends are
//! no-ops, never errors.

use tracing::debug;

use crate::WorkflowTemplate;

/// An immutable copy of a template at one point in editing history.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(WorkflowTemplate);

impl Snapshot {
    pub fn capture(template: &WorkflowTemplate) -> Self {
        Self(template.clone())
    }

    pub fn template(&self) -> &WorkflowTemplate {
        &self.0
    }
}

/// Snapshot stack with a cursor.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: usize,
    /// At least 1 when set.
    limit: Option<usize>,
}

impl History {
    /// Seed a one-entry history.
    pub fn new(initial: &WorkflowTemplate) -> Self {
        Self::with_limit(initial, None)
    }

    /// Like [`History::new`], keeping at most `limit` snapshots; the oldest
    /// are dropped first.
    pub fn with_limit(initial: &WorkflowTemplate, limit: Option<usize>) -> Self {
        Self {
            snapshots: vec![Snapshot::capture(initial)],
            cursor: 0,
            limit: limit.map(|l| l.max(1)),
        }
    }

    /// Record `template` as the newest state, dropping any redo entries.
    pub fn capture(&mut self, template: &WorkflowTemplate) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(Snapshot::capture(template));
        self.cursor = self.snapshots.len() - 1;

        if let Some(limit) = self.limit {
            let excess = self.snapshots.len().saturating_sub(limit);
            if excess > 0 {
                self.snapshots.drain(..excess);
                self.cursor -= excess;
            }
        }
        debug!(cursor = self.cursor, len = self.snapshots.len(), "captured snapshot");
    }

    /// Step back; `None` when already at the oldest snapshot.
    pub fn undo(&mut self) -> Option<&WorkflowTemplate> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        debug!(cursor = self.cursor, "undo");
        Some(self.snapshots[self.cursor].template())
    }

    /// Step forward; `None` when already at the newest snapshot.
    pub fn redo(&mut self) -> Option<&WorkflowTemplate> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        debug!(cursor = self.cursor, "redo");
        Some(self.snapshots[self.cursor].template())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Reset to a single snapshot of `current`, e.g. after a successful save,
    /// so undo cannot cross the save.
    pub fn clear(&mut self, current: &WorkflowTemplate) {
        self.snapshots.clear();
        self.snapshots.push(Snapshot::capture(current));
        self.cursor = 0;
    }

    /// Snapshot under the cursor.
    pub fn current(&self) -> &WorkflowTemplate {
        self.snapshots[self.cursor].template()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Never zero: the history always holds the current snapshot.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> WorkflowTemplate {
        let mut t = WorkflowTemplate::new(name);
        t.id = "fixed".into();
        t
    }

    #[test]
    fn starts_with_one_snapshot() {
        let history = History::new(&named("v0"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_and_redo_walk_the_stack() {
        let mut history = History::new(&named("v0"));
        history.capture(&named("v1"));
        history.capture(&named("v2"));

        assert_eq!(history.undo().unwrap().name, "v1");
        assert_eq!(history.undo().unwrap().name, "v0");
        assert!(history.undo().is_none());
        assert_eq!(history.cursor(), 0);

        assert_eq!(history.redo().unwrap().name, "v1");
        assert_eq!(history.redo().unwrap().name, "v2");
        assert!(history.redo().is_none());
        assert_eq!(history.current().name, "v2");
    }

    #[test]
    fn capture_after_undo_discards_future() {
        let mut history = History::new(&named("v0"));
        history.capture(&named("v1"));
        history.capture(&named("v2"));
        history.undo();
        history.undo();

        history.capture(&named("w1"));
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.undo().unwrap().name, "v0");
        assert_eq!(history.redo().unwrap().name, "w1");
    }

    #[test]
    fn clear_blocks_undo_across_save() {
        let mut history = History::new(&named("v0"));
        history.capture(&named("v1"));
        history.clear(&named("v1"));
        assert!(!history.can_undo());
        assert!(history.undo().is_none());
        assert_eq!(history.current().name, "v1");
    }

    #[test]
    fn limit_drops_oldest_snapshots() {
        let mut history = History::with_limit(&named("v0"), Some(3));
        for i in 1..=5 {
            history.capture(&named(&format!("v{i}")));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.undo().unwrap().name, "v4");
        assert_eq!(history.undo().unwrap().name, "v3");
        assert!(history.undo().is_none());
    }

    #[test]
    fn snapshots_are_detached_from_later_edits() {
        let mut live = named("v0");
        let history = History::new(&live);
        live.name = "mutated".into();
        assert_eq!(history.current().name, "v0");
    }
}
