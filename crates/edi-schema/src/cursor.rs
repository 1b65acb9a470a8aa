//! Parse-scoped traversal state over a [`DocumentPlug`]
//!
//! The plug itself is never mutated while parsing. Occurrence counters and the
//! "where are we" stack live here, so any number of parses can share one plug.

use crate::model::{DocumentPlug, SchemaNodeId};
use tracing::trace;

/// Per-parse occurrence counters keyed by schema node id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceTable {
    counts: Vec<u32>,
}

impl OccurrenceTable {
    /// Zeroed counters for every node of the plug
    #[must_use]
    pub fn new(plug: &DocumentPlug) -> Self {
        Self {
            counts: vec![0; plug.len()],
        }
    }

    /// Zero every counter
    pub fn reset_occurrences(&mut self) {
        self.counts.iter_mut().for_each(|count| *count = 0);
    }

    #[must_use]
    pub fn count(&self, id: SchemaNodeId) -> u32 {
        self.counts.get(id.index()).copied().unwrap_or(0)
    }

    /// Record one more occurrence, returning the new count
    pub fn increment(&mut self, id: SchemaNodeId) -> u32 {
        match self.counts.get_mut(id.index()) {
            Some(count) => {
                *count = count.saturating_add(1);
                *count
            }
            None => 0,
        }
    }

    /// Zero the counters below `id`; used when a container starts a new occurrence
    pub fn reset_descendants(&mut self, plug: &DocumentPlug, id: SchemaNodeId) {
        for descendant in plug.descendants(id) {
            if let Some(count) = self.counts.get_mut(descendant.index()) {
                *count = 0;
            }
        }
    }
}

/// A child of the current container that may start next, keyed by its start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCandidate {
    /// Tag of the segment that starts this child
    pub tag: String,
    /// Position of the child within its container
    pub child_index: usize,
    pub node: SchemaNodeId,
}

/// A mandatory node that was passed over without occurring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingNode {
    pub node: SchemaNodeId,
    /// Start tag of the missing node
    pub tag: String,
}

/// How an incoming tag resolved against the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Accepted; the cursor moved.
    ///
    /// `exited` containers were closed and `entered` loops opened (outermost
    /// first) before `node` was positioned.
    Matched {
        node: SchemaNodeId,
        exited: usize,
        entered: Vec<SchemaNodeId>,
    },
    /// Matched a node whose `max_occurs` is 0; the cursor did not move
    Disabled(SchemaNodeId),
    /// Matched a node that already reached `max_occurs`; the cursor did not move
    OverMaximum(SchemaNodeId),
    /// No remaining candidate carries this tag; the cursor did not move
    Unrecognized,
}

/// Result of [`SchemaCursor::resolve_next`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Mandatory nodes skipped to reach the match, in schema order
    pub missing: Vec<MissingNode>,
}

impl Resolution {
    fn without_move(outcome: Outcome) -> Self {
        Self {
            outcome,
            missing: Vec::new(),
        }
    }

    /// The accepted node, if the cursor moved
    #[must_use]
    pub fn matched_node(&self) -> Option<SchemaNodeId> {
        match self.outcome {
            Outcome::Matched { node, .. } => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Level {
    container: SchemaNodeId,
    /// Index of the last accepted child
    position: Option<usize>,
    candidates: Vec<StartCandidate>,
}

impl Level {
    fn new(container: SchemaNodeId, position: Option<usize>) -> Self {
        Self {
            container,
            position,
            candidates: Vec::new(),
        }
    }

    fn search_from(&self) -> usize {
        self.position.unwrap_or(0)
    }
}

/// Forward-only cursor over the segment structure of a plug
#[derive(Debug, Clone)]
pub struct SchemaCursor<'p> {
    plug: &'p DocumentPlug,
    occurrences: OccurrenceTable,
    levels: Vec<Level>,
}

impl<'p> SchemaCursor<'p> {
    /// Cursor positioned before the first child of the plug's root
    #[must_use]
    pub fn new(plug: &'p DocumentPlug) -> Self {
        let mut cursor = Self {
            plug,
            occurrences: OccurrenceTable::new(plug),
            levels: vec![Level::new(plug.root(), None)],
        };
        cursor.initialize_start_candidates();
        cursor
    }

    /// Rewind to the document start with zeroed counters
    pub fn reset(&mut self) {
        self.levels.clear();
        self.levels.push(Level::new(self.plug.root(), None));
        self.reset_occurrences();
        self.initialize_start_candidates();
    }

    /// Zero every occurrence counter
    pub fn reset_occurrences(&mut self) {
        self.occurrences.reset_occurrences();
    }

    /// Seed the start candidates for the current container
    pub fn initialize_start_candidates(&mut self) {
        let plug = self.plug;
        let Some(level) = self.levels.last_mut() else {
            return;
        };

        level.candidates = plug
            .children(level.container)
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, child)| !plug.node(*child).is_leaf())
            .map(|(child_index, node)| StartCandidate {
                tag: plug.start_tag(node).to_string(),
                child_index,
                node,
            })
            .collect();
    }

    /// Candidates of the current container still eligible to start next
    pub fn start_candidates(&self) -> impl Iterator<Item = &StartCandidate> {
        let (from, candidates) = match self.levels.last() {
            Some(level) => (level.search_from(), level.candidates.as_slice()),
            None => (0, &[][..]),
        };
        candidates.iter().filter(move |c| c.child_index >= from)
    }

    #[must_use]
    pub fn plug(&self) -> &'p DocumentPlug {
        self.plug
    }

    /// Innermost open container
    #[must_use]
    pub fn current_container(&self) -> SchemaNodeId {
        self.levels
            .last()
            .map_or_else(|| self.plug.root(), |level| level.container)
    }

    /// Number of open containers, the root included
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn occurrences(&self) -> &OccurrenceTable {
        &self.occurrences
    }

    /// Resolve the next incoming tag.
    ///
    /// Searches forward through the remaining candidates of the current
    /// container; when nothing matches, the container is closed and the
    /// search continues in the enclosing one. Only an accepted match moves
    /// the cursor, so skipped mandatory nodes are reported exactly once.
    pub fn resolve_next(&mut self, tag: &str) -> Resolution {
        let mut closed_missing = Vec::new();
        let mut exhausted = None;

        for depth in (0..self.levels.len()).rev() {
            if let Some((child_index, node)) = self.search_level(depth, tag, &mut exhausted) {
                if self.plug.node(node).is_disabled() {
                    trace!(tag, "matched disabled node");
                    return Resolution::without_move(Outcome::Disabled(node));
                }

                let mut missing = closed_missing;
                missing.extend(self.unvisited_mandatory(depth, child_index));

                let exited = self.levels.len() - depth - 1;
                let (node, entered) = self.commit(depth, child_index, node);
                trace!(tag, exited, entered = entered.len(), "resolved tag");

                return Resolution {
                    outcome: Outcome::Matched {
                        node,
                        exited,
                        entered,
                    },
                    missing,
                };
            }

            if depth > 0 {
                closed_missing.extend(self.unvisited_mandatory(depth, usize::MAX));
            }
        }

        match exhausted {
            Some(node) => Resolution::without_move(Outcome::OverMaximum(node)),
            None => Resolution::without_move(Outcome::Unrecognized),
        }
    }

    /// Mandatory nodes never reached at every open level, innermost first.
    ///
    /// Call once the input is exhausted.
    #[must_use]
    pub fn finish(&self) -> Vec<MissingNode> {
        (0..self.levels.len())
            .rev()
            .flat_map(|depth| self.unvisited_mandatory(depth, usize::MAX))
            .collect()
    }

    fn search_level(
        &self,
        depth: usize,
        tag: &str,
        exhausted: &mut Option<SchemaNodeId>,
    ) -> Option<(usize, SchemaNodeId)> {
        let level = &self.levels[depth];
        let from = level.search_from();

        for candidate in level.candidates.iter().filter(|c| c.child_index >= from) {
            if candidate.tag != tag {
                continue;
            }

            let node = self.plug.node(candidate.node);
            let repeat = level.position == Some(candidate.child_index);
            if !node.is_disabled()
                && repeat
                && !node.allows_another(self.occurrences.count(candidate.node))
            {
                exhausted.get_or_insert(candidate.node);
                continue;
            }

            return Some((candidate.child_index, candidate.node));
        }

        None
    }

    /// Mandatory, enabled children between the level's position and `until` (exclusive)
    /// that never occurred.
    fn unvisited_mandatory(&self, depth: usize, until: usize) -> Vec<MissingNode> {
        let level = &self.levels[depth];
        let children = self.plug.children(level.container);
        let start = level.position.map_or(0, |p| p + 1);
        let end = until.min(children.len());
        if start >= end {
            return Vec::new();
        }

        children[start..end]
            .iter()
            .copied()
            .filter(|id| {
                let node = self.plug.node(*id);
                !node.is_leaf()
                    && node.is_mandatory
                    && !node.is_disabled()
                    && self.occurrences.count(*id) == 0
            })
            .map(|node| MissingNode {
                node,
                tag: self.plug.start_tag(node).to_string(),
            })
            .collect()
    }

    fn commit(
        &mut self,
        depth: usize,
        child_index: usize,
        node: SchemaNodeId,
    ) -> (SchemaNodeId, Vec<SchemaNodeId>) {
        self.levels.truncate(depth + 1);
        self.levels[depth].position = Some(child_index);

        let path = self.plug.start_path(node);
        let last = path.len() - 1;
        let mut entered = Vec::new();

        for (i, id) in path.iter().copied().enumerate() {
            self.occurrences.increment(id);
            if i < last {
                // A new loop iteration starts with fresh counters below it
                self.occurrences.reset_descendants(self.plug, id);
                entered.push(id);
                self.levels.push(Level::new(id, Some(0)));
                self.initialize_start_candidates();
            }
        }

        (path[last], entered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeDef, UNBOUNDED};

    fn abc_plug() -> DocumentPlug {
        DocumentPlug::new(
            "ABC",
            NodeDef::container("ROOT").children([
                NodeDef::segment("A1").mandatory(),
                NodeDef::segment("A2").mandatory(),
                NodeDef::segment("A3"),
            ]),
        )
        .unwrap()
    }

    fn loop_plug() -> DocumentPlug {
        DocumentPlug::new(
            "PO",
            NodeDef::container("850").children([
                NodeDef::segment("BEG").mandatory(),
                NodeDef::container("N1Loop")
                    .max_occurs(2)
                    .children([
                        NodeDef::segment("N1").mandatory(),
                        NodeDef::segment("N3").mandatory(),
                        NodeDef::segment("N4"),
                    ]),
                NodeDef::segment("CTT").mandatory(),
                NodeDef::segment("OFF").max_occurs(0),
                NodeDef::segment("SE").mandatory().max_occurs(UNBOUNDED),
            ]),
        )
        .unwrap()
    }

    fn tags(plug: &DocumentPlug, missing: &[MissingNode]) -> Vec<String> {
        missing
            .iter()
            .map(|m| plug.node(m.node).tag.clone())
            .collect()
    }

    #[test]
    fn test_initial_candidates() {
        let plug = loop_plug();
        let cursor = SchemaCursor::new(&plug);
        let candidates: Vec<_> = cursor.start_candidates().map(|c| c.tag.as_str()).collect();

        assert_eq!(candidates, vec!["BEG", "N1", "CTT", "OFF", "SE"]);
    }

    #[test]
    fn test_in_order_match_has_no_missing() {
        let plug = abc_plug();
        let mut cursor = SchemaCursor::new(&plug);

        let first = cursor.resolve_next("A1");
        let second = cursor.resolve_next("A2");

        assert!(first.missing.is_empty());
        assert!(second.missing.is_empty());
        assert_eq!(plug.node(second.matched_node().unwrap()).tag, "A2");
        assert!(cursor.finish().is_empty());
    }

    #[test]
    fn test_skipped_mandatory_reported() {
        let plug = abc_plug();
        let mut cursor = SchemaCursor::new(&plug);

        let resolution = cursor.resolve_next("A2");

        assert_eq!(tags(&plug, &resolution.missing), vec!["A1"]);
        assert!(cursor.finish().is_empty());
    }

    #[test]
    fn test_unknown_tag_does_not_move() {
        let plug = abc_plug();
        let mut cursor = SchemaCursor::new(&plug);
        cursor.resolve_next("A1");

        let resolution = cursor.resolve_next("ZZ");
        assert_eq!(resolution.outcome, Outcome::Unrecognized);
        assert!(resolution.missing.is_empty());

        // Still positioned after A1
        let next = cursor.resolve_next("A2");
        assert!(next.missing.is_empty());
    }

    #[test]
    fn test_backward_tag_is_unrecognized() {
        let plug = abc_plug();
        let mut cursor = SchemaCursor::new(&plug);
        cursor.resolve_next("A1");
        cursor.resolve_next("A2");

        // A1 lies behind the cursor, so it is no longer a candidate
        assert_eq!(cursor.resolve_next("A1").outcome, Outcome::Unrecognized);
    }

    #[test]
    fn test_repeat_over_maximum() {
        let plug = abc_plug();
        let mut cursor = SchemaCursor::new(&plug);
        cursor.resolve_next("A1");

        let a1 = plug.find_child(plug.root(), "A1").unwrap();
        assert_eq!(cursor.resolve_next("A1").outcome, Outcome::OverMaximum(a1));
        assert_eq!(cursor.occurrences().count(a1), 1);
    }

    #[test]
    fn test_disabled_node() {
        let plug = loop_plug();
        let mut cursor = SchemaCursor::new(&plug);
        cursor.resolve_next("BEG");

        let off = plug.find_child(plug.root(), "OFF").unwrap();
        let resolution = cursor.resolve_next("OFF");

        assert_eq!(resolution.outcome, Outcome::Disabled(off));
        // Nothing was skipped because the cursor did not move
        assert!(resolution.missing.is_empty());
        assert_eq!(cursor.occurrences().count(off), 0);
    }

    #[test]
    fn test_loop_entry_and_exit() {
        let plug = loop_plug();
        let mut cursor = SchemaCursor::new(&plug);
        let n1_loop = plug.find_child(plug.root(), "N1Loop").unwrap();

        cursor.resolve_next("BEG");
        let n1 = cursor.resolve_next("N1");
        match n1.outcome {
            Outcome::Matched {
                exited, ref entered, ..
            } => {
                assert_eq!(exited, 0);
                assert_eq!(entered, &vec![n1_loop]);
            }
            ref other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(cursor.depth(), 2);

        cursor.resolve_next("N3");
        let ctt = cursor.resolve_next("CTT");
        match ctt.outcome {
            Outcome::Matched { exited, .. } => assert_eq!(exited, 1),
            ref other => panic!("expected match, got {other:?}"),
        }
        assert!(ctt.missing.is_empty());
        assert_eq!(cursor.depth(), 1);
    }

    #[test]
    fn test_loop_repetition_resets_counters() {
        let plug = loop_plug();
        let mut cursor = SchemaCursor::new(&plug);
        let n1_loop = plug.find_child(plug.root(), "N1Loop").unwrap();
        let n1 = plug.find_child(n1_loop, "N1").unwrap();

        cursor.resolve_next("BEG");
        cursor.resolve_next("N1");
        cursor.resolve_next("N3");
        let second = cursor.resolve_next("N1");

        match second.outcome {
            Outcome::Matched {
                exited, ref entered, ..
            } => {
                assert_eq!(exited, 1);
                assert_eq!(entered, &vec![n1_loop]);
            }
            ref other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(cursor.occurrences().count(n1_loop), 2);
        assert_eq!(cursor.occurrences().count(n1), 1);

        cursor.resolve_next("N3");
        // Third iteration exceeds max_occurs = 2
        assert_eq!(cursor.resolve_next("N1").outcome, Outcome::OverMaximum(n1_loop));
    }

    #[test]
    fn test_closing_loop_reports_its_missing_members() {
        let plug = loop_plug();
        let mut cursor = SchemaCursor::new(&plug);

        cursor.resolve_next("BEG");
        cursor.resolve_next("N1");
        let ctt = cursor.resolve_next("CTT");

        assert_eq!(tags(&plug, &ctt.missing), vec!["N3"]);
    }

    #[test]
    fn test_finish_reports_unvisited_mandatory() {
        let plug = loop_plug();
        let mut cursor = SchemaCursor::new(&plug);
        cursor.resolve_next("BEG");

        // N1Loop is optional, CTT and SE are mandatory
        assert_eq!(tags(&plug, &cursor.finish()), vec!["CTT", "SE"]);
    }

    #[test]
    fn test_reset_rewinds_cursor() {
        let plug = abc_plug();
        let mut cursor = SchemaCursor::new(&plug);
        cursor.resolve_next("A1");
        cursor.resolve_next("A2");

        cursor.reset();

        let a1 = plug.find_child(plug.root(), "A1").unwrap();
        assert_eq!(cursor.occurrences().count(a1), 0);
        assert!(cursor.resolve_next("A1").missing.is_empty());
    }

    #[test]
    fn test_occurrence_table_reset_descendants() {
        let plug = loop_plug();
        let mut table = OccurrenceTable::new(&plug);
        let n1_loop = plug.find_child(plug.root(), "N1Loop").unwrap();
        let n1 = plug.find_child(n1_loop, "N1").unwrap();

        table.increment(n1_loop);
        table.increment(n1);
        table.reset_descendants(&plug, n1_loop);

        assert_eq!(table.count(n1_loop), 1);
        assert_eq!(table.count(n1), 0);

        table.reset_occurrences();
        assert_eq!(table.count(n1_loop), 0);
    }
}
