/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Invalidation sets for style recalc.
//!
//! A [`RuleFeatureSet`] is built once per stylesheet from its selectors. For
//! every class, id, attribute and pseudo-class that appears in some selector
//! it records which elements may need their style recomputed when that
//! feature changes on an element: the element itself, some of its
//! descendants, or some of its later siblings. The DOM-walking invalidator
//! asks the feature set for the sets that apply to a mutation and then tests
//! each candidate element with [`InvalidationSet::invalidates_element`].

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate cssparser;
#[macro_use]
extern crate log;

#[macro_use]
pub mod states;
pub mod invalidation_set;
pub mod parser;
pub mod pending_invalidations;
pub mod rule;
pub mod rule_feature;
pub mod tree;

pub use crate::invalidation_set::{DescendantInvalidationSet, InvalidationSet};
pub use crate::invalidation_set::{InvalidationSetHandle, InvalidationType, SiblingInvalidationSet};
pub use crate::pending_invalidations::{InvalidationLists, PendingInvalidations};
pub use crate::rule::{RuleData, StyleRule};
pub use crate::rule_feature::{RuleFeatureSet, SelectorPreMatch};
pub use crate::tree::{TElement, TNode};

/// Interned names: tag names, ids, classes and attribute local names.
pub type Atom = string_cache::DefaultAtom;

/// Namespaces are interned like every other name.
pub type Namespace = Atom;

/// Hash map used for every name-keyed table in this crate.
pub type HashMap<K, V> = fxhash::FxHashMap<K, V>;

/// Hash set used for the name sets of an invalidation set.
pub type HashSet<K> = fxhash::FxHashSet<K>;
