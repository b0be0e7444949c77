/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Invalidation sets scheduled on DOM nodes, waiting for the invalidation
//! pass to walk the tree below (or beside) them.

use crate::invalidation_set::{DescendantInvalidationSet, InvalidationSetHandle};
use crate::invalidation_set::SiblingInvalidationSet;
use crate::tree::{StyleChangeType, TNode};
use crate::HashMap;
use servo_arc::Arc;
use smallvec::SmallVec;

/// The sets returned by the `RuleFeatureSet` queries for one mutation.
#[derive(Clone, Debug, Default)]
pub struct InvalidationLists {
    pub descendants: SmallVec<[Arc<DescendantInvalidationSet>; 8]>,
    pub siblings: SmallVec<[Arc<SiblingInvalidationSet>; 8]>,
}

impl InvalidationLists {
    pub fn is_empty(&self) -> bool {
        self.descendants.is_empty() && self.siblings.is_empty()
    }
}

/// What is queued on one node.
///
/// A sibling set rescheduled on a parent is queued as a descendant set, so
/// `descendants` holds handles of either kind.
#[derive(Clone, Debug, Default)]
pub struct NodeInvalidationSets {
    descendants: Vec<InvalidationSetHandle>,
    siblings: Vec<Arc<SiblingInvalidationSet>>,
}

impl NodeInvalidationSets {
    pub fn descendants(&self) -> &[InvalidationSetHandle] {
        &self.descendants
    }

    pub fn siblings(&self) -> &[Arc<SiblingInvalidationSet>] {
        &self.siblings
    }

    fn push_descendants(&mut self, handle: InvalidationSetHandle) {
        if !self.descendants.iter().any(|queued| queued.ptr_eq(&handle)) {
            self.descendants.push(handle)
        }
    }

    fn push_siblings(&mut self, set: &Arc<SiblingInvalidationSet>) {
        if !self.siblings.iter().any(|queued| Arc::ptr_eq(queued, set)) {
            self.siblings.push(set.clone())
        }
    }
}

/// Per-node queues of scheduled invalidation sets.
#[derive(Debug)]
pub struct PendingInvalidations<N: TNode> {
    map: HashMap<N::OpaqueId, NodeInvalidationSets>,
}

impl<N: TNode> Default for PendingInvalidations<N> {
    fn default() -> Self {
        PendingInvalidations { map: HashMap::default() }
    }
}

impl<N: TNode> PendingInvalidations<N> {
    pub fn new() -> Self {
        PendingInvalidations::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn pending_invalidations_for(&self, node: &N) -> Option<&NodeInvalidationSets> {
        self.map.get(&node.opaque())
    }

    /// Drops whatever is queued on `node`, once the invalidation pass has
    /// visited it.
    pub fn clear_invalidation(&mut self, node: &N) {
        self.map.remove(&node.opaque());
    }

    /// Queues the sets found for a mutation on `node`.
    ///
    /// Descendant sets that only ask for the node itself, or for its whole
    /// subtree, are applied right away as a style recalc on the node. The
    /// rest are queued, sibling sets only if there is a sibling to look at.
    pub fn schedule_invalidation_sets_for_node(&mut self, lists: &InvalidationLists, node: &N) {
        let descendants: SmallVec<[InvalidationSetHandle; 8]> = lists.descendants.iter()
            .map(|set| InvalidationSetHandle::Descendants(set.clone()))
            .collect();
        self.schedule(&descendants, &lists.siblings, node)
    }

    /// Queues sibling sets on the parent of the nodes they apply to, as
    /// descendant sets. Used when children are inserted or removed and the
    /// right siblings can no longer be found from the changed node.
    pub fn schedule_sibling_invalidations_as_descendants(&mut self,
                                                         lists: &InvalidationLists,
                                                         scheduling_parent: &N) {
        debug_assert!(lists.descendants.is_empty());
        if lists.siblings.is_empty() {
            return
        }

        scheduling_parent.set_needs_style_invalidation();
        let pending = self.map.entry(scheduling_parent.opaque()).or_default();

        for set in &lists.siblings {
            if set.whole_subtree_invalid() {
                trace!("Whole-subtree sibling set rescheduled on {:?}", scheduling_parent.opaque());
                scheduling_parent.set_needs_style_recalc(StyleChangeType::SubtreeStyleChange);
                return
            }
            if set.invalidates_self() {
                pending.push_descendants(InvalidationSetHandle::Siblings(set.clone()));
            }
            if let Some(sibling_descendants) = set.sibling_descendants() {
                if sibling_descendants.whole_subtree_invalid() {
                    scheduling_parent.set_needs_style_recalc(StyleChangeType::SubtreeStyleChange);
                    return
                }
                pending.push_descendants(InvalidationSetHandle::Descendants(sibling_descendants.clone()));
            }
        }
    }

    /// Moves the sibling sets queued on `node` to its parent, before `node`
    /// is removed from the tree.
    pub fn reschedule_sibling_invalidations_as_descendants(&mut self, node: &N) {
        let mut descendants = SmallVec::<[InvalidationSetHandle; 8]>::new();
        match self.map.get(&node.opaque()) {
            Some(pending) if !pending.siblings.is_empty() => {
                for set in &pending.siblings {
                    descendants.push(InvalidationSetHandle::Siblings(set.clone()));
                    if let Some(sibling_descendants) = set.sibling_descendants() {
                        descendants.push(InvalidationSetHandle::Descendants(sibling_descendants.clone()));
                    }
                }
            }
            _ => return,
        }

        let parent = match node.parent_node() {
            Some(parent) => parent,
            None => return,
        };
        trace!("Rescheduling sibling sets of {:?} on {:?}", node.opaque(), parent.opaque());
        self.schedule(&descendants, &[], &parent)
    }

    fn schedule(&mut self,
                descendants: &[InvalidationSetHandle],
                siblings: &[Arc<SiblingInvalidationSet>],
                node: &N) {
        let mut requires_descendant_invalidation = false;

        if node.style_change_type() < StyleChangeType::SubtreeStyleChange {
            for handle in descendants {
                let set = handle.as_invalidation_set();
                if set.whole_subtree_invalid() {
                    trace!("Whole-subtree invalidation of {:?}", node.opaque());
                    node.set_needs_style_recalc(StyleChangeType::SubtreeStyleChange);
                    // Nothing below can need more than the subtree recalc.
                    requires_descendant_invalidation = false;
                    break
                }
                if set.invalidates_self() {
                    node.set_needs_style_recalc(StyleChangeType::LocalStyleChange);
                }
                if !set.is_empty() {
                    requires_descendant_invalidation = true;
                }
            }
        }

        if !requires_descendant_invalidation && (siblings.is_empty() || !node.has_next_sibling()) {
            return
        }

        node.set_needs_style_invalidation();
        let pending = self.map.entry(node.opaque()).or_default();

        if node.has_next_sibling() {
            for set in siblings {
                pending.push_siblings(set);
            }
        }

        if !requires_descendant_invalidation {
            return
        }

        for handle in descendants {
            if !handle.as_invalidation_set().is_empty() {
                pending.push_descendants(handle.clone());
            }
        }
        trace!("Scheduled {} descendant and {} sibling sets on {:?}",
               pending.descendants.len(), pending.siblings.len(), node.opaque());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::MockNode;
    use crate::Atom;

    fn descendant_set(class: Option<&str>, invalidates_self: bool) -> Arc<DescendantInvalidationSet> {
        let mut set = DescendantInvalidationSet::new();
        if let Some(class) = class {
            set.add_class(Atom::from(class));
        }
        if invalidates_self {
            set.set_invalidates_self();
        }
        Arc::new(set)
    }

    fn sibling_set(class: &str) -> Arc<SiblingInvalidationSet> {
        let mut set = SiblingInvalidationSet::new(None);
        set.add_class(Atom::from(class));
        Arc::new(set)
    }

    #[test]
    fn test_self_invalidation_is_applied_directly() {
        let node = MockNode::new(1, None, false);
        let mut pending = PendingInvalidations::new();
        let mut lists = InvalidationLists::default();
        lists.descendants.push(descendant_set(None, true));

        pending.schedule_invalidation_sets_for_node(&lists, &node);
        assert_eq!(node.style_change_type(), StyleChangeType::LocalStyleChange);
        assert!(pending.is_empty());
        assert!(!node.needs_style_invalidation());
    }

    #[test]
    fn test_descendant_sets_are_queued_once() {
        let node = MockNode::new(1, None, false);
        let mut pending = PendingInvalidations::new();
        let set = descendant_set(Some("b"), false);
        let mut lists = InvalidationLists::default();
        lists.descendants.push(set.clone());
        lists.descendants.push(descendant_set(None, false));

        pending.schedule_invalidation_sets_for_node(&lists, &node);
        pending.schedule_invalidation_sets_for_node(&lists, &node);
        assert!(node.needs_style_invalidation());
        assert_eq!(node.style_change_type(), StyleChangeType::NoStyleChange);
        let queued = pending.pending_invalidations_for(&node).unwrap();
        assert_eq!(queued.descendants().len(), 1);
        assert!(queued.descendants()[0].ptr_eq(&InvalidationSetHandle::Descendants(set)));

        pending.clear_invalidation(&node);
        assert!(pending.pending_invalidations_for(&node).is_none());
    }

    #[test]
    fn test_whole_subtree_invalid_skips_queueing() {
        let node = MockNode::new(1, None, false);
        let mut subtree = DescendantInvalidationSet::new();
        subtree.set_whole_subtree_invalid();
        let mut lists = InvalidationLists::default();
        lists.descendants.push(descendant_set(Some("b"), false));
        lists.descendants.push(Arc::new(subtree));

        let mut pending = PendingInvalidations::new();
        pending.schedule_invalidation_sets_for_node(&lists, &node);
        assert_eq!(node.style_change_type(), StyleChangeType::SubtreeStyleChange);
        assert!(pending.is_empty());

        // Already restyling the subtree: nothing more to do.
        let mut lists = InvalidationLists::default();
        lists.descendants.push(descendant_set(Some("c"), false));
        pending.schedule_invalidation_sets_for_node(&lists, &node);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_sibling_sets_need_a_next_sibling() {
        let last = MockNode::new(1, None, false);
        let middle = MockNode::new(2, None, true);
        let mut lists = InvalidationLists::default();
        lists.siblings.push(sibling_set("b"));

        let mut pending = PendingInvalidations::new();
        pending.schedule_invalidation_sets_for_node(&lists, &last);
        assert!(pending.pending_invalidations_for(&last).is_none());

        pending.schedule_invalidation_sets_for_node(&lists, &middle);
        pending.schedule_invalidation_sets_for_node(&lists, &middle);
        let queued = pending.pending_invalidations_for(&middle).unwrap();
        assert_eq!(queued.siblings().len(), 1);
        assert!(queued.descendants().is_empty());
    }

    #[test]
    fn test_sibling_invalidations_as_descendants() {
        let parent = MockNode::new(0, None, false);
        let mut with_self = SiblingInvalidationSet::new(None);
        with_self.add_class(Atom::from("b"));
        with_self.set_invalidates_self();
        with_self.ensure_sibling_descendants().add_class(Atom::from("c"));
        let with_self = Arc::new(with_self);
        let mut lists = InvalidationLists::default();
        lists.siblings.push(with_self.clone());
        lists.siblings.push(sibling_set("d"));

        let mut pending = PendingInvalidations::new();
        pending.schedule_sibling_invalidations_as_descendants(&lists, &parent);
        assert!(parent.needs_style_invalidation());
        let queued = pending.pending_invalidations_for(&parent).unwrap();
        assert!(queued.siblings().is_empty());
        assert_eq!(queued.descendants().len(), 2);
        assert!(queued.descendants()[0].ptr_eq(&InvalidationSetHandle::Siblings(with_self)));
        assert_eq!(queued.descendants()[1].invalidation_type(),
                   crate::InvalidationType::InvalidateDescendants);
    }

    #[test]
    fn test_whole_subtree_sibling_set_as_descendants() {
        let parent = MockNode::new(0, None, false);
        let mut subtree = SiblingInvalidationSet::new(None);
        subtree.set_whole_subtree_invalid();
        let mut lists = InvalidationLists::default();
        lists.siblings.push(Arc::new(subtree));

        let mut pending = PendingInvalidations::new();
        pending.schedule_sibling_invalidations_as_descendants(&lists, &parent);
        assert_eq!(parent.style_change_type(), StyleChangeType::SubtreeStyleChange);
    }

    #[test]
    fn test_reschedule_on_removal() {
        let parent = MockNode::new(0, None, false);
        let child = MockNode::new(1, Some(&parent), true);
        let mut set = SiblingInvalidationSet::new(None);
        set.add_class(Atom::from("b"));
        set.ensure_sibling_descendants().add_class(Atom::from("c"));
        let mut lists = InvalidationLists::default();
        lists.siblings.push(Arc::new(set));

        let mut pending = PendingInvalidations::new();
        pending.schedule_invalidation_sets_for_node(&lists, &child);
        pending.reschedule_sibling_invalidations_as_descendants(&child);

        let queued = pending.pending_invalidations_for(&parent).unwrap();
        assert_eq!(queued.descendants().len(), 2);
        assert!(queued.siblings().is_empty());
        assert!(parent.needs_style_invalidation());

        // Nothing queued: nothing moves.
        let orphan = MockNode::new(2, Some(&parent), false);
        pending.reschedule_sibling_invalidations_as_descendants(&orphan);
        assert_eq!(pending.pending_invalidations_for(&parent).unwrap().descendants().len(), 2);
    }
}
