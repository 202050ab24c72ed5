//! Graph Builder: flat message list to classified [`Session`].
//!
//! 1. Index messages, resolve parents, break cycles ([`Forest`]).
//! 2. Pick the Main component among genuine roots: longest root-to-leaf path,
//!    then earliest root, then most messages.
//! 3. Main thread = longest path through that component. Branches hanging
//!    off it become side discussions that rejoin at their branch point.
//! 4. Every other component is a side discussion when one of its messages
//!    references a Main-thread message through a rejoin field, else an orphan.
//! 5. Orphan roots are scored.
//!
//! The builder never fails: any input, including an empty one, yields a
//! best-effort session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stitch_core::{Message, MessageId, Session, SessionId, Thread, ThreadId, ThreadKind};
use stitch_settings::StitchSettings;
use tracing::{debug, instrument};

use crate::forest::{Forest, chronological};
use crate::scorer::CorruptionScorer;
use crate::similarity::{LexicalSimilarity, SimilarityStrategy};

/// Builds sessions from raw message sets.
#[derive(Clone, Debug)]
pub struct GraphBuilder {
    rejoin_fields: Vec<String>,
    scorer: CorruptionScorer,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::from_settings(&StitchSettings::default(), Arc::new(LexicalSimilarity))
    }
}

impl GraphBuilder {
    /// Create a builder from settings and a similarity strategy.
    pub fn from_settings(
        settings: &StitchSettings,
        similarity: Arc<dyn SimilarityStrategy>,
    ) -> Self {
        Self {
            rejoin_fields: settings.graph.rejoin_reference_fields.clone(),
            scorer: CorruptionScorer::new(settings.scoring.clone(), similarity),
        }
    }

    /// The scorer used for orphan roots.
    pub fn scorer(&self) -> &CorruptionScorer {
        &self.scorer
    }

    /// Build a session from `messages`.
    #[instrument(skip_all, fields(session_id = %session_id, records = messages.len()))]
    pub fn build(&self, session_id: SessionId, messages: Vec<Message>) -> Session {
        if messages.is_empty() {
            return Session::empty(session_id);
        }

        let forest = Forest::index(messages);
        let roots = forest.roots();

        let mut components: Vec<Component> = roots
            .iter()
            .map(|root| Component::walk(&forest, *root))
            .collect();

        let Some(main_pos) = select_main(&forest, &components) else {
            return Session::empty(session_id);
        };
        let main_component = components.swap_remove(main_pos);

        let path = main_component.longest_path(&forest);
        let on_path: HashSet<usize> = path.iter().copied().collect();
        let main_ids: HashSet<MessageId> = path.iter().map(|p| forest.nodes[*p].id).collect();

        let mut side = Vec::new();
        for pos in &path {
            for child in &forest.children[*pos] {
                if on_path.contains(child) {
                    continue;
                }
                let members = forest.preorder(*child);
                let rejoin = self
                    .find_rejoin(&forest, &members, &main_ids)
                    .unwrap_or(forest.nodes[*pos].id);
                side.push(make_thread(&forest, &members, ThreadKind::SideDiscussion, Some(rejoin)));
            }
        }

        let mut orphans = Vec::new();
        for component in &components {
            match self.find_rejoin(&forest, &component.members, &main_ids) {
                Some(rejoin) => side.push(make_thread(
                    &forest,
                    &component.members,
                    ThreadKind::SideDiscussion,
                    Some(rejoin),
                )),
                None => orphans.push(make_thread(&forest, &component.members, ThreadKind::Orphan, None)),
            }
        }
        side.sort_by(|a, b| root_order(a, b));
        orphans.sort_by(|a, b| root_order(a, b));

        let main = make_thread(&forest, &path, ThreadKind::Main, None);
        let synthetic_roots = forest.synthetic_ids();
        let mut session = Session::assemble(
            session_id,
            Some(main),
            side,
            orphans,
            synthetic_roots,
            forest.report,
        );

        let assessments = self.scorer.assess_orphans(&session);
        for (thread, assessment) in session.orphans.iter_mut().zip(assessments) {
            thread.corruption_score = assessment.score;
            if let Some(root) = thread.messages.first_mut() {
                root.corruption_score = assessment.score;
            }
        }

        debug!(
            messages = session.message_count,
            side = session.side.len(),
            orphans = session.orphans.len(),
            "session built"
        );
        session
    }

    /// Find a Main-thread message referenced by a rejoin field, checking
    /// leaves first, then the rest, newest first.
    fn find_rejoin(
        &self,
        forest: &Forest,
        members: &[usize],
        main_ids: &HashSet<MessageId>,
    ) -> Option<MessageId> {
        if self.rejoin_fields.is_empty() {
            return None;
        }
        let mut ordered: Vec<usize> = members.to_vec();
        ordered.sort_by(|a, b| {
            let leaf_a = forest.children[*a].is_empty();
            let leaf_b = forest.children[*b].is_empty();
            leaf_b
                .cmp(&leaf_a)
                .then_with(|| chronological(&forest.nodes[*b], &forest.nodes[*a]))
        });
        ordered.into_iter().find_map(|pos| {
            let message = &forest.nodes[pos];
            self.rejoin_fields
                .iter()
                .filter_map(|field| message.extra_str(field))
                .filter_map(|raw| MessageId::parse(raw).ok())
                .find(|id| main_ids.contains(id))
        })
    }
}

/// One tree of the forest.
struct Component {
    root: usize,
    members: Vec<usize>,
    heights: HashMap<usize, usize>,
}

impl Component {
    fn walk(forest: &Forest, root: usize) -> Self {
        let members = forest.preorder(root);
        let heights = forest.heights(&members);
        Self {
            root,
            members,
            heights,
        }
    }

    fn height(&self) -> usize {
        self.heights.get(&self.root).copied().unwrap_or(0)
    }

    /// Root-to-leaf path following the tallest child, earliest on ties.
    fn longest_path(&self, forest: &Forest) -> Vec<usize> {
        let mut path = vec![self.root];
        let mut cursor = self.root;
        loop {
            let mut best: Option<(usize, usize)> = None;
            for child in &forest.children[cursor] {
                let h = self.heights.get(child).copied().unwrap_or(0);
                if best.is_none_or(|(_, bh)| h > bh) {
                    best = Some((*child, h));
                }
            }
            match best {
                Some((child, _)) => {
                    path.push(child);
                    cursor = child;
                }
                None => return path,
            }
        }
    }
}

/// Index of the Main component: genuine roots first; a session made only of
/// cycles falls back to its largest synthetic component.
fn select_main(forest: &Forest, components: &[Component]) -> Option<usize> {
    let rank = |c: &Component| {
        let root = &forest.nodes[c.root];
        (c.height(), std::cmp::Reverse(root.timestamp), c.members.len(), std::cmp::Reverse(root.id))
    };
    let genuine = components
        .iter()
        .enumerate()
        .filter(|(_, c)| !forest.synthetic.contains(&c.root))
        .max_by_key(|(_, c)| rank(c))
        .map(|(i, _)| i);
    genuine.or_else(|| {
        components
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| {
                let root = &forest.nodes[c.root];
                (c.members.len(), c.height(), std::cmp::Reverse(root.timestamp), std::cmp::Reverse(root.id))
            })
            .map(|(i, _)| i)
    })
}

fn make_thread(
    forest: &Forest,
    positions: &[usize],
    kind: ThreadKind,
    rejoin_point: Option<MessageId>,
) -> Thread {
    let root = forest.nodes[positions[0]].id;
    let thread_id = ThreadId::for_root(root);
    let messages = positions
        .iter()
        .map(|pos| {
            let mut message = forest.nodes[*pos].clone();
            message.thread_id = Some(thread_id);
            message.corruption_score = 0.0;
            message
        })
        .collect();
    Thread {
        thread_id,
        messages,
        kind,
        corruption_score: 0.0,
        rejoin_point,
    }
}

fn root_order(a: &Thread, b: &Thread) -> std::cmp::Ordering {
    match (a.root(), b.root()) {
        (Some(x), Some(y)) => chronological(x, y),
        _ => std::cmp::Ordering::Equal,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{SessionFixture, scenario_one};
    use proptest::prelude::*;
    use serde_json::Value;

    fn ids(thread: &Thread) -> Vec<MessageId> {
        thread.messages.iter().map(|m| m.id).collect()
    }

    #[test]
    fn empty_input_yields_empty_session() {
        let session = GraphBuilder::default().build(SessionId::new(), Vec::new());
        assert!(session.is_empty());
        assert!(session.main.is_none());
    }

    #[test]
    fn scenario_one_classifies_main_and_orphan() {
        let (fx, [a, b, c]) = scenario_one();
        let session = fx.build();

        let main = session.main.as_ref().unwrap();
        assert_eq!(ids(main), vec![a, b]);
        assert_eq!(main.kind, ThreadKind::Main);
        assert_eq!(session.orphans.len(), 1);
        assert_eq!(ids(&session.orphans[0]), vec![c]);
        assert!(session.orphans[0].rejoin_point.is_none());
        assert!(session.orphans[0].corruption_score >= 0.4);
        assert_eq!(session.message_count, 3);
        assert_eq!(session.thread_count, 2);
        assert_eq!(session.designated_root, Some(a));
    }

    #[test]
    fn thread_ids_are_stable_across_builds() {
        let (fx, _) = scenario_one();
        let first = fx.build();
        let second = fx.build();
        assert_eq!(first, second);
        let main = first.main.as_ref().unwrap();
        assert!(main.messages.iter().all(|m| m.thread_id == Some(main.thread_id)));
    }

    #[test]
    fn longest_path_wins_main_and_branch_becomes_side() {
        let mut fx = SessionFixture::new();
        let a = fx.root("a", 0);
        let b = fx.child(a, "b", 1);
        let c = fx.child(b, "c", 2);
        let d = fx.child(c, "d", 3);
        let x = fx.child(a, "x", 4);
        let y = fx.child(x, "y", 5);
        let session = fx.build();

        assert_eq!(ids(session.main.as_ref().unwrap()), vec![a, b, c, d]);
        assert_eq!(session.side.len(), 1);
        assert_eq!(ids(&session.side[0]), vec![x, y]);
        assert_eq!(session.side[0].rejoin_point, Some(a));
        assert!(session.orphans.is_empty());
    }

    #[test]
    fn equal_branches_prefer_earliest() {
        let mut fx = SessionFixture::new();
        let a = fx.root("a", 0);
        let late = fx.child(a, "late", 5);
        let early = fx.child(a, "early", 1);
        let session = fx.build();
        assert_eq!(ids(session.main.as_ref().unwrap()), vec![a, early]);
        assert_eq!(ids(&session.side[0]), vec![late]);
    }

    #[test]
    fn tie_on_length_prefers_earliest_root() {
        let mut fx = SessionFixture::new();
        let late = fx.root("late root", 10);
        let _ = fx.child(late, "late child", 11);
        let early = fx.root("early root", 0);
        let _ = fx.child(early, "early child", 1);
        let session = fx.build();
        assert_eq!(session.designated_root, Some(early));
        assert_eq!(session.orphans[0].root().unwrap().id, late);
    }

    #[test]
    fn rejoin_field_makes_component_a_side_discussion() {
        let mut fx = SessionFixture::new();
        let a = fx.root("a", 0);
        let b = fx.child(a, "b", 1);
        let s = fx.root("side start", 2);
        let t = fx.child(s, "side end", 3);
        let _ = fx
            .get_mut(t)
            .extra
            .insert("logicalParentUuid".into(), Value::String(b.to_string()));
        let session = fx.build();

        assert!(session.orphans.is_empty());
        assert_eq!(session.side.len(), 1);
        assert_eq!(ids(&session.side[0]), vec![s, t]);
        assert_eq!(session.side[0].rejoin_point, Some(b));
        assert!(session.side[0].corruption_score.abs() < f64::EPSILON);
    }

    #[test]
    fn reference_to_non_main_message_stays_orphan() {
        let mut fx = SessionFixture::new();
        let a = fx.root("a", 0);
        let _ = fx.child(a, "b", 1);
        let s = fx.root("orphan", 2);
        let _ = fx
            .get_mut(s)
            .extra
            .insert("rejoin_id".into(), Value::String(MessageId::new().to_string()));
        let session = fx.build();
        assert_eq!(session.orphans.len(), 1);
    }

    #[test]
    fn all_cycle_session_gets_synthetic_root() {
        let mut fx = SessionFixture::new();
        let a = fx.root("a", 3);
        let b = fx.child(a, "b", 1);
        let c = fx.child(b, "c", 2);
        fx.get_mut(a).parent_id = Some(c);
        let session = fx.build();

        assert_eq!(session.synthetic_roots, vec![b]);
        assert_eq!(session.designated_root, Some(b));
        assert_eq!(ids(session.main.as_ref().unwrap()), vec![b, c, a]);
        assert_eq!(session.integrity.cyclic_components, 1);
        assert!(session.is_detached_root(b));
    }

    #[test]
    fn dangling_parent_counts_as_genuine_root() {
        let mut fx = SessionFixture::new();
        let a = fx.child(MessageId::new(), "a", 0);
        let b = fx.child(a, "b", 1);
        let session = fx.build();
        assert_eq!(ids(session.main.as_ref().unwrap()), vec![a, b]);
        assert_eq!(session.integrity.unresolved_parents, vec![a]);
    }

    #[test]
    fn orphan_root_alone_carries_score() {
        let mut fx = SessionFixture::new();
        let a = fx.root("a", 0);
        let _ = fx.child(a, "b", 1);
        let c = fx.root("c", 2);
        let d = fx.child(c, "d", 3);
        let session = fx.build();
        let orphan = &session.orphans[0];
        assert!(session.message(c).unwrap().corruption_score > 0.0);
        assert!(session.message(d).unwrap().corruption_score.abs() < f64::EPSILON);
        assert!((orphan.corruption_score - session.message(c).unwrap().corruption_score).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn exactly_one_main_and_every_message_placed(
            shape in proptest::collection::vec((0i64..300, proptest::option::of(0usize..30)), 1..30)
        ) {
            let mut fx = SessionFixture::new();
            let mut ids = Vec::new();
            for (secs, _) in &shape {
                ids.push(fx.root("m", *secs));
            }
            for (i, (_, parent)) in shape.iter().enumerate() {
                fx.get_mut(ids[i]).parent_id = parent.map(|p| ids[p % ids.len()]);
            }
            let session = fx.build();

            let mains = session.threads().filter(|t| t.kind == ThreadKind::Main).count();
            prop_assert_eq!(mains, 1);
            prop_assert_eq!(session.message_count, ids.len());
            for id in &ids {
                prop_assert!(session.contains(*id));
            }
        }
    }
}
