/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Invalidation sets: the names to look for, and where to look for them,
//! when some feature of an element changes.
//!
//! Sets are shared through `servo_arc::Arc`. While a `RuleFeatureSet` is
//! being built they are mutated through `Arc::make_mut`, so a handle that was
//! already given out (to a pending invalidation queue, say) keeps seeing the
//! data it was given.

use crate::tree::TElement;
use crate::{Atom, HashSet};
use derive_more::{Deref, DerefMut};
use servo_arc::Arc;

bitflags! {
    /// Boolean state of an invalidation set.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct InvalidationFlags: u8 {
        /// The element the feature changed on must be restyled itself.
        const INVALIDATES_SELF = 1 << 0;
        /// Every element in scope must be restyled; the name sets are
        /// meaningless once this is set.
        const WHOLE_SUBTREE_INVALID = 1 << 1;
        /// Elements with `::-webkit-*` custom pseudo-elements must be checked.
        const CUSTOM_PSEUDO_INVALID = 1 << 2;
        /// Matching must continue into shadow trees.
        const TREE_BOUNDARY_CROSSING = 1 << 3;
        /// Matching must continue into elements distributed into slots.
        const INSERTION_POINT_CROSSING = 1 << 4;
        /// Elements assigned to slots in scope must be checked.
        const INVALIDATES_SLOTTED = 1 << 5;
    }
}

/// The flags that are discarded by `set_whole_subtree_invalid`.
const NARROWING_FLAGS: InvalidationFlags = InvalidationFlags::CUSTOM_PSEUDO_INVALID
    .union(InvalidationFlags::TREE_BOUNDARY_CROSSING)
    .union(InvalidationFlags::INSERTION_POINT_CROSSING)
    .union(InvalidationFlags::INVALIDATES_SLOTTED);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InvalidationType {
    InvalidateDescendants,
    InvalidateSiblings,
}

/// The data shared by descendant and sibling invalidation sets.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InvalidationSet {
    classes: HashSet<Atom>,
    ids: HashSet<Atom>,
    tag_names: HashSet<Atom>,
    attributes: HashSet<Atom>,
    flags: InvalidationFlags,
}

impl InvalidationSet {
    pub fn flags(&self) -> InvalidationFlags {
        self.flags
    }

    /// Whether `element` has any of the names in this set.
    pub fn invalidates_element<E: TElement>(&self, element: &E) -> bool {
        if self.whole_subtree_invalid() {
            return true
        }
        if self.tag_names.contains(element.local_name()) {
            return true
        }
        if let Some(id) = element.id() {
            if self.ids.contains(id) {
                return true
            }
        }
        let mut found = false;
        if !self.classes.is_empty() {
            element.each_class(|class| found |= self.classes.contains(class));
            if found {
                return true
            }
        }
        if !self.attributes.is_empty() {
            element.each_attr_name(|name| found |= self.attributes.contains(name));
        }
        found
    }

    pub fn add_class(&mut self, class: Atom) {
        if !self.whole_subtree_invalid() {
            self.classes.insert(class);
        }
    }

    pub fn add_id(&mut self, id: Atom) {
        if !self.whole_subtree_invalid() {
            self.ids.insert(id);
        }
    }

    pub fn add_tag_name(&mut self, tag_name: Atom) {
        if !self.whole_subtree_invalid() {
            self.tag_names.insert(tag_name);
        }
    }

    pub fn add_attribute(&mut self, attribute_local_name: Atom) {
        if !self.whole_subtree_invalid() {
            self.attributes.insert(attribute_local_name);
        }
    }

    /// Gives up on narrowing: drops every name and narrowing flag. This
    /// cannot be undone.
    pub fn set_whole_subtree_invalid(&mut self) {
        if self.whole_subtree_invalid() {
            return
        }
        self.flags.remove(NARROWING_FLAGS);
        self.flags.insert(InvalidationFlags::WHOLE_SUBTREE_INVALID);
        self.classes = HashSet::default();
        self.ids = HashSet::default();
        self.tag_names = HashSet::default();
        self.attributes = HashSet::default();
    }

    pub fn whole_subtree_invalid(&self) -> bool {
        self.flags.contains(InvalidationFlags::WHOLE_SUBTREE_INVALID)
    }

    pub fn set_invalidates_self(&mut self) {
        self.flags.insert(InvalidationFlags::INVALIDATES_SELF)
    }

    pub fn invalidates_self(&self) -> bool {
        self.flags.contains(InvalidationFlags::INVALIDATES_SELF)
    }

    pub fn set_custom_pseudo_invalid(&mut self) {
        self.set_narrowing_flag(InvalidationFlags::CUSTOM_PSEUDO_INVALID)
    }

    pub fn custom_pseudo_invalid(&self) -> bool {
        self.flags.contains(InvalidationFlags::CUSTOM_PSEUDO_INVALID)
    }

    pub fn set_tree_boundary_crossing(&mut self) {
        self.set_narrowing_flag(InvalidationFlags::TREE_BOUNDARY_CROSSING)
    }

    pub fn tree_boundary_crossing(&self) -> bool {
        self.flags.contains(InvalidationFlags::TREE_BOUNDARY_CROSSING)
    }

    pub fn set_insertion_point_crossing(&mut self) {
        self.set_narrowing_flag(InvalidationFlags::INSERTION_POINT_CROSSING)
    }

    pub fn insertion_point_crossing(&self) -> bool {
        self.flags.contains(InvalidationFlags::INSERTION_POINT_CROSSING)
    }

    pub fn set_invalidates_slotted(&mut self) {
        self.set_narrowing_flag(InvalidationFlags::INVALIDATES_SLOTTED)
    }

    pub fn invalidates_slotted(&self) -> bool {
        self.flags.contains(InvalidationFlags::INVALIDATES_SLOTTED)
    }

    fn set_narrowing_flag(&mut self, flag: InvalidationFlags) {
        if !self.whole_subtree_invalid() {
            self.flags.insert(flag)
        }
    }

    /// No names, and nothing special to look for. Neither
    /// `WHOLE_SUBTREE_INVALID` nor `INVALIDATES_SELF` count.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() &&
        self.ids.is_empty() &&
        self.tag_names.is_empty() &&
        self.attributes.is_empty() &&
        !self.custom_pseudo_invalid() &&
        !self.insertion_point_crossing() &&
        !self.invalidates_slotted()
    }

    pub fn classes(&self) -> impl Iterator<Item = &Atom> {
        self.classes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Atom> {
        self.ids.iter()
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &Atom> {
        self.tag_names.iter()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Atom> {
        self.attributes.iter()
    }

    fn combine_base(&mut self, other: &InvalidationSet) {
        if other.invalidates_self() {
            self.set_invalidates_self();
        }

        // Once either side gives up on narrowing, so does the result.
        if self.whole_subtree_invalid() {
            return
        }
        if other.whole_subtree_invalid() {
            self.set_whole_subtree_invalid();
            return
        }

        self.flags.insert(other.flags & NARROWING_FLAGS);
        self.classes.extend(other.classes.iter().cloned());
        self.ids.extend(other.ids.iter().cloned());
        self.tag_names.extend(other.tag_names.iter().cloned());
        self.attributes.extend(other.attributes.iter().cloned());
    }
}

/// Scheduled on an element to find the descendants that must be restyled.
#[derive(Clone, Debug, Default, Deref, DerefMut, Eq, PartialEq)]
pub struct DescendantInvalidationSet {
    base: InvalidationSet,
}

impl DescendantInvalidationSet {
    pub fn new() -> Self {
        DescendantInvalidationSet::default()
    }

    pub fn combine(&mut self, other: &DescendantInvalidationSet) {
        self.base.combine_base(&other.base)
    }
}

/// Scheduled on an element to find the later siblings that must be restyled.
#[derive(Clone, Debug, Deref, DerefMut, Eq, PartialEq)]
pub struct SiblingInvalidationSet {
    #[deref]
    #[deref_mut]
    base: InvalidationSet,
    /// How many siblings after the changed element can be affected.
    /// `DIRECT_ADJACENT_MAX` means any number.
    max_direct_adjacent_selectors: u32,
    /// What to look for below a sibling matching this set.
    sibling_descendant_invalidation_set: Option<Arc<DescendantInvalidationSet>>,
    /// The same key used as a plain descendant feature.
    descendant_invalidation_set: Option<Arc<DescendantInvalidationSet>>,
}

impl SiblingInvalidationSet {
    /// Stands for `~`: no bound on the sibling distance.
    pub const DIRECT_ADJACENT_MAX: u32 = u32::MAX;

    pub fn new(descendants: Option<Arc<DescendantInvalidationSet>>) -> Self {
        SiblingInvalidationSet {
            base: InvalidationSet::default(),
            max_direct_adjacent_selectors: 1,
            sibling_descendant_invalidation_set: None,
            descendant_invalidation_set: descendants,
        }
    }

    pub fn max_direct_adjacent_selectors(&self) -> u32 {
        self.max_direct_adjacent_selectors
    }

    pub fn update_max_direct_adjacent_selectors(&mut self, value: u32) {
        self.max_direct_adjacent_selectors = self.max_direct_adjacent_selectors.max(value);
    }

    pub fn sibling_descendants(&self) -> Option<&Arc<DescendantInvalidationSet>> {
        self.sibling_descendant_invalidation_set.as_ref()
    }

    pub fn ensure_sibling_descendants(&mut self) -> &mut DescendantInvalidationSet {
        let set = self.sibling_descendant_invalidation_set
            .get_or_insert_with(|| Arc::new(DescendantInvalidationSet::new()));
        Arc::make_mut(set)
    }

    pub fn descendants(&self) -> Option<&Arc<DescendantInvalidationSet>> {
        self.descendant_invalidation_set.as_ref()
    }

    pub fn ensure_descendants(&mut self) -> &mut DescendantInvalidationSet {
        let set = self.descendant_invalidation_set
            .get_or_insert_with(|| Arc::new(DescendantInvalidationSet::new()));
        Arc::make_mut(set)
    }

    pub fn combine(&mut self, other: &SiblingInvalidationSet) {
        self.update_max_direct_adjacent_selectors(other.max_direct_adjacent_selectors);
        if let Some(ref sibling_descendants) = other.sibling_descendant_invalidation_set {
            self.ensure_sibling_descendants().combine(sibling_descendants);
        }
        if let Some(ref descendants) = other.descendant_invalidation_set {
            self.ensure_descendants().combine(descendants);
        }
        self.base.combine_base(&other.base);
    }
}

/// The value stored for a feature key in a `RuleFeatureSet`.
///
/// A key first used as a descendant feature and later as a sibling feature
/// is promoted in place: the descendant set it had becomes the `descendants`
/// of the new sibling set, keeping its identity.
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidationSetHandle {
    Descendants(Arc<DescendantInvalidationSet>),
    Siblings(Arc<SiblingInvalidationSet>),
}

impl InvalidationSetHandle {
    pub fn new(invalidation_type: InvalidationType) -> Self {
        match invalidation_type {
            InvalidationType::InvalidateDescendants => {
                InvalidationSetHandle::Descendants(Arc::new(DescendantInvalidationSet::new()))
            }
            InvalidationType::InvalidateSiblings => {
                InvalidationSetHandle::Siblings(Arc::new(SiblingInvalidationSet::new(None)))
            }
        }
    }

    pub fn invalidation_type(&self) -> InvalidationType {
        match *self {
            InvalidationSetHandle::Descendants(..) => InvalidationType::InvalidateDescendants,
            InvalidationSetHandle::Siblings(..) => InvalidationType::InvalidateSiblings,
        }
    }

    pub fn as_invalidation_set(&self) -> &InvalidationSet {
        match *self {
            InvalidationSetHandle::Descendants(ref set) => set,
            InvalidationSetHandle::Siblings(ref set) => set,
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &InvalidationSetHandle) -> bool {
        match (self, other) {
            (&InvalidationSetHandle::Descendants(ref a),
             &InvalidationSetHandle::Descendants(ref b)) => Arc::ptr_eq(a, b),
            (&InvalidationSetHandle::Siblings(ref a),
             &InvalidationSetHandle::Siblings(ref b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The descendant part of this entry, creating it on a sibling entry if
    /// needed.
    pub fn ensure_descendants(&mut self) -> &mut DescendantInvalidationSet {
        match *self {
            InvalidationSetHandle::Descendants(ref mut set) => Arc::make_mut(set),
            InvalidationSetHandle::Siblings(ref mut set) => Arc::make_mut(set).ensure_descendants(),
        }
    }

    /// The sibling part of this entry, promoting a descendant entry if
    /// needed.
    pub fn ensure_siblings(&mut self) -> &mut SiblingInvalidationSet {
        match *self {
            InvalidationSetHandle::Siblings(ref mut set) => Arc::make_mut(set),
            InvalidationSetHandle::Descendants(ref descendants) => {
                let promoted = SiblingInvalidationSet::new(Some(descendants.clone()));
                *self = InvalidationSetHandle::Siblings(Arc::new(promoted));
                self.ensure_siblings()
            }
        }
    }

    /// The descendant and sibling sets to hand out for this entry.
    pub fn extract(&self) -> (Option<&Arc<DescendantInvalidationSet>>,
                              Option<&Arc<SiblingInvalidationSet>>) {
        match *self {
            InvalidationSetHandle::Descendants(ref descendants) => (Some(descendants), None),
            InvalidationSetHandle::Siblings(ref siblings) => (siblings.descendants(), Some(siblings)),
        }
    }

    /// Merges another entry for the same key into this one.
    pub fn combine(&mut self, other: &InvalidationSetHandle) {
        match *other {
            InvalidationSetHandle::Descendants(ref descendants) => {
                self.ensure_descendants().combine(descendants)
            }
            InvalidationSetHandle::Siblings(ref siblings) => {
                self.ensure_siblings().combine(siblings)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::MockElement;

    fn sorted<'a>(names: impl Iterator<Item = &'a Atom>) -> Vec<&'a str> {
        let mut names: Vec<&str> = names.map(|name| &**name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_whole_subtree_invalid_absorbs_names() {
        let mut set = DescendantInvalidationSet::new();
        set.add_class(Atom::from("a"));
        set.set_tree_boundary_crossing();
        set.set_whole_subtree_invalid();
        set.add_class(Atom::from("x"));
        set.set_invalidates_slotted();
        assert!(set.whole_subtree_invalid());
        assert_eq!(set.classes().count(), 0);
        assert!(!set.tree_boundary_crossing());
        assert!(!set.invalidates_slotted());
        assert!(set.is_empty());
        assert!(set.invalidates_element(&MockElement::new("span")));
    }

    #[test]
    fn test_invalidates_element() {
        let mut set = DescendantInvalidationSet::new();
        set.add_class(Atom::from("a"));
        set.add_id(Atom::from("main"));
        set.add_tag_name(Atom::from("p"));
        set.add_attribute(Atom::from("data-x"));
        assert!(set.invalidates_element(&MockElement::new("div").with_class("b").with_class("a")));
        assert!(set.invalidates_element(&MockElement::new("div").with_id("main")));
        assert!(set.invalidates_element(&MockElement::new("p")));
        assert!(set.invalidates_element(&MockElement::new("div").with_attr("data-x")));
        assert!(!set.invalidates_element(&MockElement::new("div").with_class("b").with_attr("title")));
    }

    #[test]
    fn test_is_empty_ignores_self_invalidation() {
        let mut set = DescendantInvalidationSet::new();
        set.set_invalidates_self();
        set.set_tree_boundary_crossing();
        assert!(set.is_empty());
        set.set_insertion_point_crossing();
        assert!(!set.is_empty());
    }

    #[test]
    fn test_combine_unions_names_and_flags() {
        let mut a = DescendantInvalidationSet::new();
        a.add_class(Atom::from("a"));
        let mut b = DescendantInvalidationSet::new();
        b.add_class(Atom::from("b"));
        b.add_id(Atom::from("c"));
        b.set_invalidates_self();
        b.set_custom_pseudo_invalid();

        let mut ab = a.clone();
        ab.combine(&b);
        let mut ba = b.clone();
        ba.combine(&a);
        assert_eq!(ab, ba);
        assert_eq!(sorted(ab.classes()), vec!["a", "b"]);
        assert_eq!(sorted(ab.ids()), vec!["c"]);
        assert!(ab.invalidates_self());
        assert!(ab.custom_pseudo_invalid());
    }

    #[test]
    fn test_combine_with_whole_subtree_invalid() {
        let mut a = DescendantInvalidationSet::new();
        a.add_class(Atom::from("a"));
        let mut subtree = DescendantInvalidationSet::new();
        subtree.set_whole_subtree_invalid();

        let mut left = a.clone();
        left.combine(&subtree);
        let mut right = subtree.clone();
        right.combine(&a);
        assert!(left.whole_subtree_invalid());
        assert!(right.whole_subtree_invalid());
        assert_eq!(left, right);
        assert_eq!(left.classes().count(), 0);
    }

    #[test]
    fn test_sibling_combine() {
        let mut a = SiblingInvalidationSet::new(None);
        a.update_max_direct_adjacent_selectors(2);
        a.ensure_sibling_descendants().add_class(Atom::from("x"));

        let mut b = SiblingInvalidationSet::new(None);
        b.update_max_direct_adjacent_selectors(SiblingInvalidationSet::DIRECT_ADJACENT_MAX);
        b.ensure_descendants().add_class(Atom::from("y"));
        b.add_class(Atom::from("z"));

        a.combine(&b);
        assert_eq!(a.max_direct_adjacent_selectors(), SiblingInvalidationSet::DIRECT_ADJACENT_MAX);
        assert_eq!(sorted(a.sibling_descendants().unwrap().classes()), vec!["x"]);
        assert_eq!(sorted(a.descendants().unwrap().classes()), vec!["y"]);
        assert_eq!(sorted(a.classes()), vec!["z"]);

        // max never decreases.
        a.update_max_direct_adjacent_selectors(1);
        assert_eq!(a.max_direct_adjacent_selectors(), SiblingInvalidationSet::DIRECT_ADJACENT_MAX);
    }

    #[test]
    fn test_promotion_keeps_descendant_identity() {
        let mut handle = InvalidationSetHandle::new(InvalidationType::InvalidateDescendants);
        handle.ensure_descendants().add_class(Atom::from("b"));
        let before = match handle {
            InvalidationSetHandle::Descendants(ref set) => set.clone(),
            _ => panic!("expected descendants"),
        };

        handle.ensure_siblings().add_class(Atom::from("c"));
        assert_eq!(handle.invalidation_type(), InvalidationType::InvalidateSiblings);
        let (descendants, siblings) = handle.extract();
        assert!(Arc::ptr_eq(descendants.unwrap(), &before));
        assert_eq!(sorted(siblings.unwrap().classes()), vec!["c"]);
        assert_eq!(siblings.unwrap().max_direct_adjacent_selectors(), 1);
    }

    #[test]
    fn test_ensure_siblings_promotes_once() {
        let mut handle = InvalidationSetHandle::new(InvalidationType::InvalidateDescendants);
        handle.ensure_siblings().update_max_direct_adjacent_selectors(3);
        handle.ensure_siblings().add_class(Atom::from("a"));
        let (descendants, siblings) = handle.extract();
        assert!(descendants.is_some());
        let siblings = siblings.unwrap();
        assert_eq!(siblings.max_direct_adjacent_selectors(), 3);
        assert_eq!(sorted(siblings.classes()), vec!["a"]);
    }

    #[test]
    fn test_handed_out_sets_do_not_change() {
        let mut handle = InvalidationSetHandle::new(InvalidationType::InvalidateDescendants);
        handle.ensure_descendants().add_class(Atom::from("a"));
        let handed_out = handle.clone();
        handle.ensure_descendants().add_class(Atom::from("b"));
        assert_eq!(sorted(handed_out.as_invalidation_set().classes()), vec!["a"]);
        assert_eq!(sorted(handle.as_invalidation_set().classes()), vec!["a", "b"]);
        assert!(!handle.ptr_eq(&handed_out));
    }

    #[test]
    fn test_handle_combine_mixed_kinds() {
        let mut descendants = InvalidationSetHandle::new(InvalidationType::InvalidateDescendants);
        descendants.ensure_descendants().add_class(Atom::from("a"));
        let mut siblings = InvalidationSetHandle::new(InvalidationType::InvalidateSiblings);
        siblings.ensure_siblings().add_class(Atom::from("b"));

        descendants.combine(&siblings);
        let (d, s) = descendants.extract();
        assert_eq!(sorted(d.unwrap().classes()), vec!["a"]);
        assert_eq!(sorted(s.unwrap().classes()), vec!["b"]);
    }
}
