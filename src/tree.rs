/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Traits that DOM nodes must implement so that invalidation sets can be
//! tested against them and scheduled on them.

use crate::Atom;
use std::fmt::Debug;
use std::hash::Hash;

/// How much of a node's style needs to be recomputed. Ordered from least to
/// most work.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StyleChangeType {
    NoStyleChange,
    /// Only the node itself.
    LocalStyleChange,
    /// The node and every node below it.
    SubtreeStyleChange,
}

/// The names an element exposes to invalidation set matching.
pub trait TElement {
    /// The local name, lowercased for HTML elements.
    fn local_name(&self) -> &Atom;
    fn id(&self) -> Option<&Atom>;

    // Callbacks rather than iterators, so that implementations can walk
    // attribute storage without allocating.
    fn each_class<F>(&self, callback: F) where F: FnMut(&Atom);
    fn each_attr_name<F>(&self, callback: F) where F: FnMut(&Atom);

    fn has_class(&self, name: &Atom) -> bool {
        let mut found = false;
        self.each_class(|class| found |= class == name);
        found
    }
}

/// A node on which invalidations can be scheduled.
pub trait TNode: Clone {
    /// Identifies the node in the pending invalidation map.
    type OpaqueId: Clone + Debug + Eq + Hash;

    fn opaque(&self) -> Self::OpaqueId;
    fn parent_node(&self) -> Option<Self>;
    fn has_next_sibling(&self) -> bool;

    fn style_change_type(&self) -> StyleChangeType;
    /// Raises the pending style change of this node to at least `change`.
    fn set_needs_style_recalc(&self, change: StyleChangeType);
    /// Marks the node as having invalidation sets queued for it.
    fn set_needs_style_invalidation(&self);
}
