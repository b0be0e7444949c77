/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Collects the features of every style rule's selector into invalidation
//! sets, and answers which sets apply when a feature changes on an element.
//!
//! For a selector `A op B op ... Z`, the features of the subject compound `Z`
//! are what needs restyling. They are added to the invalidation sets keyed by
//! the classes, ids, attributes and pseudo-classes of every compound to the
//! left of `Z`, walking leftwards. While the walk is inside a chain of `+` and
//! `~` combinators the sets are sibling sets; past a descendant or child
//! combinator they are descendant sets.

use crate::invalidation_set::{DescendantInvalidationSet, InvalidationSet, InvalidationSetHandle};
use crate::invalidation_set::{InvalidationType, SiblingInvalidationSet};
use crate::parser::{Combinator, CompoundSelector, PseudoElement, PseudoType, Selector};
use crate::parser::SimpleSelector;
use crate::pending_invalidations::InvalidationLists;
use crate::rule::{ContentItem, ContentValue, RuleData, StyleRule};
use crate::states::{ElementState, NonTSPseudoClass};
use crate::tree::TElement;
use crate::{Atom, HashMap};
use servo_arc::Arc;
use smallvec::SmallVec;

/// Whether a selector can match at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectorPreMatch {
    SelectorNeverMatches,
    SelectorMayMatch,
}

/// A rule kept on one of the coarse side lists.
#[derive(Clone, Debug)]
pub struct RuleFeature {
    pub rule: Arc<StyleRule>,
    pub selector_index: usize,
    pub has_document_security_origin: bool,
}

impl RuleFeature {
    fn new(rule_data: &RuleData) -> Self {
        RuleFeature {
            rule: rule_data.rule().clone(),
            selector_index: rule_data.selector_index(),
            has_document_security_origin: rule_data.has_document_security_origin(),
        }
    }
}

/// Facts about the selectors of a rule set that let the invalidator pick
/// fast paths.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FeatureMetadata {
    pub uses_first_line_rules: bool,
    pub uses_window_inactive_selector: bool,
    /// Some rule has no feature that rule set invalidation could key on.
    pub needs_full_recalc_for_rule_set_invalidation: bool,
    /// The longest run of `+` combinators in any selector.
    pub max_direct_adjacent_selectors: u32,
    // Per selector only; not merged by `add`.
    pub found_sibling_selector: bool,
    pub found_insertion_point_crossing: bool,
}

impl FeatureMetadata {
    pub fn add(&mut self, other: &FeatureMetadata) {
        self.uses_first_line_rules |= other.uses_first_line_rules;
        self.uses_window_inactive_selector |= other.uses_window_inactive_selector;
        self.needs_full_recalc_for_rule_set_invalidation |=
            other.needs_full_recalc_for_rule_set_invalidation;
        self.max_direct_adjacent_selectors =
            self.max_direct_adjacent_selectors.max(other.max_direct_adjacent_selectors);
    }

    pub fn clear(&mut self) {
        *self = FeatureMetadata::default();
    }
}

/// Features seen while walking one compound (or a chain of compounds) of a
/// selector. Lives only for the duration of one rule's collection.
#[derive(Clone, Debug, Default)]
struct InvalidationSetFeatures {
    classes: SmallVec<[Atom; 4]>,
    attributes: SmallVec<[Atom; 4]>,
    ids: SmallVec<[Atom; 4]>,
    tag_names: SmallVec<[Atom; 4]>,
    max_direct_adjacent_selectors: u32,
    custom_pseudo_element: bool,
    has_before_or_after: bool,
    tree_boundary_crossing: bool,
    insertion_point_crossing: bool,
    force_subtree: bool,
    invalidates_slotted: bool,
    has_nth_pseudo: bool,
    has_features_for_rule_set_invalidation: bool,
}

impl InvalidationSetFeatures {
    fn add(&mut self, other: &InvalidationSetFeatures) {
        self.classes.extend(other.classes.iter().cloned());
        self.attributes.extend(other.attributes.iter().cloned());
        self.ids.extend(other.ids.iter().cloned());
        self.tag_names.extend(other.tag_names.iter().cloned());
        self.max_direct_adjacent_selectors =
            self.max_direct_adjacent_selectors.max(other.max_direct_adjacent_selectors);
        self.custom_pseudo_element |= other.custom_pseudo_element;
        self.has_before_or_after |= other.has_before_or_after;
        self.tree_boundary_crossing |= other.tree_boundary_crossing;
        self.insertion_point_crossing |= other.insertion_point_crossing;
        self.force_subtree |= other.force_subtree;
        self.invalidates_slotted |= other.invalidates_slotted;
        self.has_nth_pseudo |= other.has_nth_pseudo;
    }

    fn has_features(&self) -> bool {
        !self.classes.is_empty() ||
        !self.attributes.is_empty() ||
        !self.ids.is_empty() ||
        !self.tag_names.is_empty() ||
        self.custom_pseudo_element
    }

    fn has_tag_id_class_or_attribute(&self) -> bool {
        !self.classes.is_empty() ||
        !self.attributes.is_empty() ||
        !self.ids.is_empty() ||
        !self.tag_names.is_empty()
    }

    /// Accounts for one more `+` or `~` in a sibling chain.
    fn add_sibling_combinator(&mut self, combinator: Combinator) {
        if self.max_direct_adjacent_selectors == SiblingInvalidationSet::DIRECT_ADJACENT_MAX {
            return
        }
        if combinator == Combinator::NextSibling {
            self.max_direct_adjacent_selectors += 1;
        } else {
            self.max_direct_adjacent_selectors = SiblingInvalidationSet::DIRECT_ADJACENT_MAX;
        }
    }

    /// Accounts for a descendant-type combinator the walk has just crossed.
    fn add_descendant_combinator(&mut self, combinator: Combinator) {
        match combinator {
            Combinator::ShadowPiercingDescendant => self.tree_boundary_crossing = true,
            Combinator::SlotAssignment => self.insertion_point_crossing = true,
            _ => {}
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PositionType {
    Subject,
    Ancestor,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FeatureInvalidationType {
    NormalInvalidation,
    RequiresSubtreeInvalidation,
}

/// Which features a sibling set found during the leftward walk receives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SiblingFeatures {
    /// Not inside a sibling chain.
    None,
    /// The chain starts at the subject: the subject's features are both the
    /// sibling and the descendant features, and the sets invalidate self.
    Subject,
    /// The chain starts further left; its features were extracted from the
    /// compound to the right of its first combinator.
    Chain,
}

/// A key of one of the four invalidation set maps.
#[derive(Clone, Debug, Eq, PartialEq)]
enum InvalidationSetKey {
    Class(Atom),
    Attribute(Atom),
    Id(Atom),
    Pseudo(PseudoType),
}

/// The invalidation set a simple selector is keyed under, if any.
enum SimpleSelectorInvalidation {
    Keyed(InvalidationSetKey),
    /// The `:nth-*` family and friends share one descendant set.
    Nth,
}

fn invalidation_set_for_simple_selector(simple: &SimpleSelector)
                                        -> Option<SimpleSelectorInvalidation> {
    let key = match *simple {
        SimpleSelector::Class(ref class) => InvalidationSetKey::Class(class.clone()),
        SimpleSelector::ID(ref id) => InvalidationSetKey::Id(id.clone()),
        SimpleSelector::Empty |
        SimpleSelector::FirstChild |
        SimpleSelector::LastChild |
        SimpleSelector::OnlyChild => {
            InvalidationSetKey::Pseudo(simple.pseudo_type()?)
        }
        SimpleSelector::NonTSPseudoClass(ref pseudo_class) => {
            // Window activation is tracked per document, not per element.
            if *pseudo_class == NonTSPseudoClass::WindowInactive {
                return None
            }
            InvalidationSetKey::Pseudo(PseudoType::for_state(pseudo_class))
        }
        SimpleSelector::FirstOfType |
        SimpleSelector::LastOfType |
        SimpleSelector::OnlyOfType |
        SimpleSelector::NthChild(..) |
        SimpleSelector::NthLastChild(..) |
        SimpleSelector::NthOfType(..) |
        SimpleSelector::NthLastOfType(..) => return Some(SimpleSelectorInvalidation::Nth),
        _ => InvalidationSetKey::Attribute(simple.attribute()?.lower_name.clone()),
    };
    Some(SimpleSelectorInvalidation::Keyed(key))
}

/// Selectors whose invalidation can't be narrowed below a whole subtree.
fn requires_subtree_invalidation(simple: &SimpleSelector) -> bool {
    match *simple {
        SimpleSelector::PseudoElement(PseudoElement::FirstLine) |
        SimpleSelector::PseudoElement(PseudoElement::FirstLetter) |
        SimpleSelector::HostContext(..) => true,
        _ => false,
    }
}

fn extract_invalidation_set_features_from_simple_selector(simple: &SimpleSelector,
                                                          features: &mut InvalidationSetFeatures) {
    match *simple {
        SimpleSelector::LocalName(ref local_name) => {
            features.tag_names.push(local_name.lower_name.clone())
        }
        SimpleSelector::ID(ref id) => features.ids.push(id.clone()),
        SimpleSelector::Class(ref class) => features.classes.push(class.clone()),
        SimpleSelector::PseudoElement(ref pseudo_element) => match *pseudo_element {
            PseudoElement::WebKitCustom(..) |
            PseudoElement::BlinkInternal(..) => features.custom_pseudo_element = true,
            PseudoElement::Before |
            PseudoElement::After => features.has_before_or_after = true,
            PseudoElement::Slotted(..) => features.invalidates_slotted = true,
            _ => {}
        },
        _ => {
            if let Some(attr) = simple.attribute() {
                features.attributes.push(attr.lower_name.clone())
            }
        }
    }
}

fn add_features_to_invalidation_set(invalidation_set: &mut InvalidationSet,
                                    features: &InvalidationSetFeatures) {
    if features.tree_boundary_crossing {
        invalidation_set.set_tree_boundary_crossing();
    }
    if features.insertion_point_crossing {
        invalidation_set.set_insertion_point_crossing();
    }
    if features.invalidates_slotted {
        invalidation_set.set_invalidates_slotted();
    }
    if features.force_subtree {
        invalidation_set.set_whole_subtree_invalid();
        return
    }
    for id in &features.ids {
        invalidation_set.add_id(id.clone());
    }
    for tag_name in &features.tag_names {
        invalidation_set.add_tag_name(tag_name.clone());
    }
    for class in &features.classes {
        invalidation_set.add_class(class.clone());
    }
    for attribute in &features.attributes {
        invalidation_set.add_attribute(attribute.clone());
    }
    if features.custom_pseudo_element {
        invalidation_set.set_custom_pseudo_invalid();
    }
}

/// Appends the parts of a map entry to `lists`.
fn extract_invalidation_sets(handle: &InvalidationSetHandle, lists: &mut InvalidationLists) {
    let (descendants, siblings) = handle.extract();
    if let Some(descendants) = descendants {
        lists.descendants.push(descendants.clone());
    }
    if let Some(siblings) = siblings {
        lists.siblings.push(siblings.clone());
    }
}

fn sibling_set_for_distance(handle: &InvalidationSetHandle, min_direct_adjacent: u32)
                            -> Option<&Arc<SiblingInvalidationSet>> {
    match *handle {
        InvalidationSetHandle::Siblings(ref siblings)
            if siblings.max_direct_adjacent_selectors() >= min_direct_adjacent => Some(siblings),
        _ => None,
    }
}

fn merge_invalidation_set_maps<K>(into: &mut HashMap<K, InvalidationSetHandle>,
                                  from: &HashMap<K, InvalidationSetHandle>)
where K: Clone + Eq + std::hash::Hash {
    for (key, handle) in from {
        match into.get_mut(key) {
            Some(existing) => existing.combine(handle),
            None => {
                into.insert(key.clone(), handle.clone());
            }
        }
    }
}

/// The invalidation sets and metadata of one or more style sheets.
#[derive(Clone, Debug, Default)]
pub struct RuleFeatureSet {
    class_invalidation_sets: HashMap<Atom, InvalidationSetHandle>,
    attribute_invalidation_sets: HashMap<Atom, InvalidationSetHandle>,
    id_invalidation_sets: HashMap<Atom, InvalidationSetHandle>,
    pseudo_invalidation_sets: HashMap<PseudoType, InvalidationSetHandle>,
    universal_sibling_invalidation_set: Option<Arc<SiblingInvalidationSet>>,
    nth_invalidation_set: Option<Arc<DescendantInvalidationSet>>,
    metadata: FeatureMetadata,
    sibling_rules: Vec<RuleFeature>,
    uncommon_attribute_rules: Vec<RuleFeature>,
}

impl RuleFeatureSet {
    pub fn new() -> Self {
        RuleFeatureSet::default()
    }

    /// Registers one selector of a style rule.
    pub fn collect_features_from_rule_data(&mut self, rule_data: &RuleData) -> SelectorPreMatch {
        let mut metadata = FeatureMetadata::default();
        if collect_features_from_selector(rule_data.selector(), &mut metadata) ==
           SelectorPreMatch::SelectorNeverMatches {
            debug!("Selector {:?} never matches", rule_data.selector());
            return SelectorPreMatch::SelectorNeverMatches
        }

        self.metadata.add(&metadata);

        if metadata.found_sibling_selector {
            self.sibling_rules.push(RuleFeature::new(rule_data));
        }
        if rule_data.contains_uncommon_attribute_selector() {
            self.uncommon_attribute_rules.push(RuleFeature::new(rule_data));
        }

        self.update_invalidation_sets(rule_data);
        SelectorPreMatch::SelectorMayMatch
    }

    /// Merges the sets and side lists of another feature set into this one.
    pub fn add(&mut self, other: &RuleFeatureSet) {
        merge_invalidation_set_maps(&mut self.class_invalidation_sets,
                                    &other.class_invalidation_sets);
        merge_invalidation_set_maps(&mut self.attribute_invalidation_sets,
                                    &other.attribute_invalidation_sets);
        merge_invalidation_set_maps(&mut self.id_invalidation_sets,
                                    &other.id_invalidation_sets);
        merge_invalidation_set_maps(&mut self.pseudo_invalidation_sets,
                                    &other.pseudo_invalidation_sets);
        if let Some(ref universal) = other.universal_sibling_invalidation_set {
            self.ensure_universal_sibling_invalidation_set().combine(universal);
        }
        if let Some(ref nth) = other.nth_invalidation_set {
            self.ensure_nth_invalidation_set().combine(nth);
        }

        self.metadata.add(&other.metadata);

        self.sibling_rules.extend(other.sibling_rules.iter().cloned());
        self.uncommon_attribute_rules.extend(other.uncommon_attribute_rules.iter().cloned());
    }

    /// Forgets everything. Sets handed out by earlier queries stay valid.
    pub fn clear(&mut self) {
        *self = RuleFeatureSet::default();
    }

    pub fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    pub fn uses_sibling_rules(&self) -> bool {
        !self.sibling_rules.is_empty()
    }

    pub fn uses_first_line_rules(&self) -> bool {
        self.metadata.uses_first_line_rules
    }

    pub fn uses_window_inactive_selector(&self) -> bool {
        self.metadata.uses_window_inactive_selector
    }

    pub fn needs_full_recalc_for_rule_set_invalidation(&self) -> bool {
        self.metadata.needs_full_recalc_for_rule_set_invalidation
    }

    pub fn max_direct_adjacent_selectors(&self) -> u32 {
        self.metadata.max_direct_adjacent_selectors
    }

    pub fn has_selector_for_id(&self, id_value: &Atom) -> bool {
        self.id_invalidation_sets.contains_key(id_value)
    }

    pub fn has_selector_for_class(&self, class_value: &Atom) -> bool {
        self.class_invalidation_sets.contains_key(class_value)
    }

    pub fn has_selector_for_attribute(&self, attribute_local_name: &Atom) -> bool {
        self.attribute_invalidation_sets.contains_key(attribute_local_name)
    }

    pub fn sibling_rules(&self) -> &[RuleFeature] {
        &self.sibling_rules
    }

    pub fn uncommon_attribute_rules(&self) -> &[RuleFeature] {
        &self.uncommon_attribute_rules
    }

    pub fn collect_invalidation_sets_for_class<E: TElement>(&self,
                                                            lists: &mut InvalidationLists,
                                                            element: &E,
                                                            class_name: &Atom) {
        if let Some(handle) = self.class_invalidation_sets.get(class_name) {
            trace!("Class .{} changed on <{}>", class_name, element.local_name());
            extract_invalidation_sets(handle, lists);
        }
    }

    pub fn collect_sibling_invalidation_set_for_class<E: TElement>(&self,
                                                                   lists: &mut InvalidationLists,
                                                                   element: &E,
                                                                   class_name: &Atom,
                                                                   min_direct_adjacent: u32) {
        let handle = match self.class_invalidation_sets.get(class_name) {
            Some(handle) => handle,
            None => return,
        };
        if let Some(siblings) = sibling_set_for_distance(handle, min_direct_adjacent) {
            trace!("Class .{} changed on <{}>, siblings only", class_name, element.local_name());
            lists.siblings.push(siblings.clone());
        }
    }

    pub fn collect_invalidation_sets_for_id<E: TElement>(&self,
                                                         lists: &mut InvalidationLists,
                                                         element: &E,
                                                         id: &Atom) {
        if let Some(handle) = self.id_invalidation_sets.get(id) {
            trace!("Id #{} changed on <{}>", id, element.local_name());
            extract_invalidation_sets(handle, lists);
        }
    }

    pub fn collect_sibling_invalidation_set_for_id<E: TElement>(&self,
                                                                lists: &mut InvalidationLists,
                                                                element: &E,
                                                                id: &Atom,
                                                                min_direct_adjacent: u32) {
        let handle = match self.id_invalidation_sets.get(id) {
            Some(handle) => handle,
            None => return,
        };
        if let Some(siblings) = sibling_set_for_distance(handle, min_direct_adjacent) {
            trace!("Id #{} changed on <{}>, siblings only", id, element.local_name());
            lists.siblings.push(siblings.clone());
        }
    }

    pub fn collect_invalidation_sets_for_attribute<E: TElement>(&self,
                                                                lists: &mut InvalidationLists,
                                                                element: &E,
                                                                attribute_local_name: &Atom) {
        if let Some(handle) = self.attribute_invalidation_sets.get(attribute_local_name) {
            trace!("Attribute [{}] changed on <{}>", attribute_local_name, element.local_name());
            extract_invalidation_sets(handle, lists);
        }
    }

    pub fn collect_sibling_invalidation_set_for_attribute<E>(&self,
                                                             lists: &mut InvalidationLists,
                                                             element: &E,
                                                             attribute_local_name: &Atom,
                                                             min_direct_adjacent: u32)
    where E: TElement {
        let handle = match self.attribute_invalidation_sets.get(attribute_local_name) {
            Some(handle) => handle,
            None => return,
        };
        if let Some(siblings) = sibling_set_for_distance(handle, min_direct_adjacent) {
            trace!("Attribute [{}] changed on <{}>, siblings only",
                   attribute_local_name, element.local_name());
            lists.siblings.push(siblings.clone());
        }
    }

    pub fn collect_invalidation_sets_for_pseudo_class<E: TElement>(&self,
                                                                   lists: &mut InvalidationLists,
                                                                   element: &E,
                                                                   pseudo: PseudoType) {
        if let Some(handle) = self.pseudo_invalidation_sets.get(&pseudo) {
            trace!("Pseudo-class {:?} changed on <{}>", pseudo, element.local_name());
            extract_invalidation_sets(handle, lists);
        }
    }

    /// Runs the pseudo-class query for every state pseudo-class that depends
    /// on one of the `changed` state bits.
    pub fn collect_invalidation_sets_for_state_change<E: TElement>(&self,
                                                                   lists: &mut InvalidationLists,
                                                                   element: &E,
                                                                   changed: ElementState) {
        NonTSPseudoClass::each_state_pseudo_class(|pseudo_class| {
            if changed.intersects(pseudo_class.state_flag()) {
                let pseudo = PseudoType::for_state(&pseudo_class);
                self.collect_invalidation_sets_for_pseudo_class(lists, element, pseudo);
            }
        })
    }

    /// The set to check on later siblings for any change to an element that
    /// affects selectors like `* + .a`.
    pub fn collect_universal_sibling_invalidation_set(&self,
                                                      lists: &mut InvalidationLists,
                                                      min_direct_adjacent: u32) {
        if let Some(ref universal) = self.universal_sibling_invalidation_set {
            if universal.max_direct_adjacent_selectors() >= min_direct_adjacent {
                lists.siblings.push(universal.clone());
            }
        }
    }

    /// The set to check below a parent whose children were inserted, removed
    /// or reordered.
    pub fn collect_nth_invalidation_set(&self, lists: &mut InvalidationLists) {
        if let Some(ref nth) = self.nth_invalidation_set {
            lists.descendants.push(nth.clone());
        }
    }

    fn ensure_universal_sibling_invalidation_set(&mut self) -> &mut SiblingInvalidationSet {
        let set = self.universal_sibling_invalidation_set
            .get_or_insert_with(|| Arc::new(SiblingInvalidationSet::new(None)));
        Arc::make_mut(set)
    }

    fn ensure_nth_invalidation_set(&mut self) -> &mut DescendantInvalidationSet {
        let set = self.nth_invalidation_set
            .get_or_insert_with(|| Arc::new(DescendantInvalidationSet::new()));
        Arc::make_mut(set)
    }

    /// The map entry for `key`, created with `invalidation_type` if missing.
    fn ensure_invalidation_set(&mut self,
                               key: InvalidationSetKey,
                               invalidation_type: InvalidationType)
                               -> &mut InvalidationSetHandle {
        let new_handle = || InvalidationSetHandle::new(invalidation_type);
        match key {
            InvalidationSetKey::Class(class) => {
                self.class_invalidation_sets.entry(class).or_insert_with(new_handle)
            }
            InvalidationSetKey::Attribute(attribute) => {
                self.attribute_invalidation_sets.entry(attribute).or_insert_with(new_handle)
            }
            InvalidationSetKey::Id(id) => {
                self.id_invalidation_sets.entry(id).or_insert_with(new_handle)
            }
            InvalidationSetKey::Pseudo(pseudo) => {
                self.pseudo_invalidation_sets.entry(pseudo).or_insert_with(new_handle)
            }
        }
    }

    fn ensure_descendant_invalidation_set(&mut self, key: InvalidationSetKey)
                                          -> &mut DescendantInvalidationSet {
        self.ensure_invalidation_set(key, InvalidationType::InvalidateDescendants)
            .ensure_descendants()
    }

    fn ensure_sibling_invalidation_set(&mut self, key: InvalidationSetKey)
                                       -> &mut SiblingInvalidationSet {
        self.ensure_invalidation_set(key, InvalidationType::InvalidateSiblings)
            .ensure_siblings()
    }

    fn update_invalidation_sets(&mut self, rule_data: &RuleData) {
        let selector = rule_data.selector();
        let subject = selector.subject();

        let mut features = InvalidationSetFeatures::default();
        let invalidation_type = self.extract_invalidation_set_features_from_compound(
            &subject.simple_selectors, &mut features, PositionType::Subject, false);

        if features.has_before_or_after {
            self.update_invalidation_sets_for_content_attribute(rule_data);
        }

        if features.has_nth_pseudo {
            let nth = self.ensure_nth_invalidation_set();
            if features.has_features() {
                add_features_to_invalidation_set(nth, &features);
            } else {
                nth.set_whole_subtree_invalid();
            }
        }

        // Nothing to look for in the subject, e.g. `.a *`: every element in
        // scope may match.
        if !features.has_features() {
            features.force_subtree = true;
        }

        let (next_compound, sibling_features) = match invalidation_type {
            FeatureInvalidationType::RequiresSubtreeInvalidation => {
                // The subject's own features are marked subtree-invalid too.
                debug!("Selector {:?} requires subtree invalidation", selector);
                (Some(subject), SiblingFeatures::None)
            }
            FeatureInvalidationType::NormalInvalidation => {
                let sibling_features = match subject.combinator() {
                    Some(combinator) if combinator.is_sibling() => {
                        features.add_sibling_combinator(combinator);
                        SiblingFeatures::Subject
                    }
                    Some(combinator) => {
                        features.add_descendant_combinator(combinator);
                        SiblingFeatures::None
                    }
                    None => SiblingFeatures::None,
                };
                (subject.next_compound(), sibling_features)
            }
        };

        if let Some(compound) = next_compound {
            self.add_features_to_invalidation_sets(compound, sibling_features, &mut features);
        }

        if !features.has_features_for_rule_set_invalidation {
            debug!("Selector {:?} has no features for rule set invalidation", selector);
            self.metadata.needs_full_recalc_for_rule_set_invalidation = true;
        }
    }

    /// `attr()` in generated content makes the attribute a self-invalidation
    /// feature, whether or not any selector mentions it.
    fn update_invalidation_sets_for_content_attribute(&mut self, rule_data: &RuleData) {
        let items = match rule_data.rule().block.content() {
            Some(&ContentValue::Items(ref items)) => items,
            _ => return,
        };
        for item in items {
            if let ContentItem::Attr(ref attribute) = *item {
                self.ensure_descendant_invalidation_set(InvalidationSetKey::Attribute(attribute.clone()))
                    .set_invalidates_self();
            }
        }
    }

    /// Collects the features of one compound into `features`. With
    /// `in_negation`, only the invalidation sets are registered: an element
    /// matching `:not(.b)` doesn't have `.b`, so `.b` is no feature of it.
    fn extract_invalidation_set_features_from_compound(&mut self,
                                                       simple_selectors: &[SimpleSelector],
                                                       features: &mut InvalidationSetFeatures,
                                                       position: PositionType,
                                                       in_negation: bool)
                                                       -> FeatureInvalidationType {
        for simple in simple_selectors {
            if requires_subtree_invalidation(simple) {
                features.force_subtree = true;
                return FeatureInvalidationType::RequiresSubtreeInvalidation
            }

            if !in_negation {
                extract_invalidation_set_features_from_simple_selector(simple, features);
            }

            match invalidation_set_for_simple_selector(simple) {
                Some(SimpleSelectorInvalidation::Nth) => features.has_nth_pseudo = true,
                Some(SimpleSelectorInvalidation::Keyed(key)) => {
                    if position == PositionType::Subject {
                        self.ensure_descendant_invalidation_set(key).set_invalidates_self();
                    }
                }
                None => {}
            }

            if self.extract_invalidation_set_features_from_selector_list(simple,
                                                                         features,
                                                                         position,
                                                                         in_negation) ==
               FeatureInvalidationType::RequiresSubtreeInvalidation {
                return FeatureInvalidationType::RequiresSubtreeInvalidation
            }
        }

        features.has_features_for_rule_set_invalidation = features.has_tag_id_class_or_attribute();
        FeatureInvalidationType::NormalInvalidation
    }

    /// Features of `:not()`, `:-webkit-any()`, `:host()`, `::slotted()` and
    /// friends. Only if every branch has features can the union of them
    /// stand for the list.
    fn extract_invalidation_set_features_from_selector_list(&mut self,
                                                            simple: &SimpleSelector,
                                                            features: &mut InvalidationSetFeatures,
                                                            position: PositionType,
                                                            in_negation: bool)
                                                            -> FeatureInvalidationType {
        let selector_list = match simple.selector_list() {
            Some(selector_list) => selector_list,
            None => return FeatureInvalidationType::NormalInvalidation,
        };
        // Stays set through nested lists, as in :not(:-webkit-any(.b)).
        let in_negation = in_negation || matches!(*simple, SimpleSelector::Negation(..));

        let mut all_sub_selectors_have_features = true;
        let mut any_features = InvalidationSetFeatures::default();
        for compound in selector_list.iter() {
            let mut compound_features = InvalidationSetFeatures::default();
            if self.extract_invalidation_set_features_from_compound(compound,
                                                                    &mut compound_features,
                                                                    position,
                                                                    in_negation) ==
               FeatureInvalidationType::RequiresSubtreeInvalidation {
                features.force_subtree = true;
                return FeatureInvalidationType::RequiresSubtreeInvalidation
            }
            if compound_features.has_nth_pseudo {
                features.has_nth_pseudo = true;
            }
            if !all_sub_selectors_have_features {
                continue
            }
            if compound_features.has_features() {
                any_features.add(&compound_features);
            } else {
                // E.g. :-webkit-any(*, span)
                all_sub_selectors_have_features = false;
            }
        }

        if all_sub_selectors_have_features {
            features.add(&any_features);
        }
        FeatureInvalidationType::NormalInvalidation
    }

    /// Walks leftwards from `compound`, adding the subject's features to the
    /// invalidation sets of every compound on the way.
    fn add_features_to_invalidation_sets(&mut self,
                                         compound: &CompoundSelector,
                                         mut sibling_features: SiblingFeatures,
                                         descendant_features: &mut InvalidationSetFeatures) {
        let mut chain_features = InvalidationSetFeatures::default();
        let mut current = Some(compound);
        while let Some(compound) = current {
            self.add_features_to_invalidation_sets_for_compound_selector(&compound.simple_selectors,
                                                                         sibling_features,
                                                                         &chain_features,
                                                                         descendant_features);
            self.update_features_from_combinator(compound,
                                                 &mut chain_features,
                                                 &mut sibling_features,
                                                 descendant_features);
            current = compound.next_compound();
        }
    }

    fn update_features_from_combinator(&mut self,
                                       compound: &CompoundSelector,
                                       chain_features: &mut InvalidationSetFeatures,
                                       sibling_features: &mut SiblingFeatures,
                                       descendant_features: &mut InvalidationSetFeatures) {
        let combinator = match compound.combinator() {
            Some(combinator) => combinator,
            None => return,
        };

        if combinator.is_sibling() {
            let features = match *sibling_features {
                SiblingFeatures::Subject => descendant_features,
                SiblingFeatures::Chain => chain_features,
                SiblingFeatures::None => {
                    *sibling_features = SiblingFeatures::Chain;
                    self.extract_invalidation_set_features_from_compound(&compound.simple_selectors,
                                                                         chain_features,
                                                                         PositionType::Ancestor,
                                                                         false);
                    if !chain_features.has_features() {
                        chain_features.force_subtree = true;
                    }
                    chain_features
                }
            };
            features.add_sibling_combinator(combinator);
            return
        }

        if *sibling_features != SiblingFeatures::None &&
           chain_features.max_direct_adjacent_selectors != 0 {
            *chain_features = InvalidationSetFeatures::default();
        }
        *sibling_features = SiblingFeatures::None;
        descendant_features.add_descendant_combinator(combinator);
    }

    fn add_features_to_invalidation_sets_for_compound_selector(
        &mut self,
        simple_selectors: &[SimpleSelector],
        sibling_features: SiblingFeatures,
        chain_features: &InvalidationSetFeatures,
        descendant_features: &mut InvalidationSetFeatures,
    ) {
        let mut compound_has_id_class_or_attribute = false;
        for simple in simple_selectors {
            self.add_features_to_invalidation_sets_for_simple_selector(simple,
                                                                       sibling_features,
                                                                       chain_features,
                                                                       descendant_features);
            if simple.is_id_class_or_attribute_selector() {
                compound_has_id_class_or_attribute = true;
            }
        }

        if compound_has_id_class_or_attribute {
            descendant_features.has_features_for_rule_set_invalidation = true;
        } else if sibling_features != SiblingFeatures::None {
            self.add_features_to_universal_sibling_invalidation_set(sibling_features,
                                                                    chain_features,
                                                                    descendant_features);
        }
    }

    fn add_features_to_invalidation_sets_for_simple_selector(
        &mut self,
        simple: &SimpleSelector,
        sibling_features: SiblingFeatures,
        chain_features: &InvalidationSetFeatures,
        descendant_features: &mut InvalidationSetFeatures,
    ) {
        if simple.is_id_class_or_attribute_selector() {
            descendant_features.has_features_for_rule_set_invalidation = true;
        }

        match invalidation_set_for_simple_selector(simple) {
            Some(SimpleSelectorInvalidation::Nth) => {
                add_features_to_invalidation_set(self.ensure_nth_invalidation_set(),
                                                 descendant_features);
                return
            }
            Some(SimpleSelectorInvalidation::Keyed(key)) => {
                match sibling_features {
                    SiblingFeatures::None => {
                        add_features_to_invalidation_set(self.ensure_descendant_invalidation_set(key),
                                                         descendant_features);
                    }
                    SiblingFeatures::Subject => {
                        let siblings = self.ensure_sibling_invalidation_set(key);
                        siblings.update_max_direct_adjacent_selectors(
                            descendant_features.max_direct_adjacent_selectors);
                        add_features_to_invalidation_set(siblings, descendant_features);
                        siblings.set_invalidates_self();
                    }
                    SiblingFeatures::Chain => {
                        let siblings = self.ensure_sibling_invalidation_set(key);
                        siblings.update_max_direct_adjacent_selectors(
                            chain_features.max_direct_adjacent_selectors);
                        add_features_to_invalidation_set(siblings, chain_features);
                        add_features_to_invalidation_set(siblings.ensure_sibling_descendants(),
                                                         descendant_features);
                    }
                }
                return
            }
            None => {}
        }

        if simple.is_host_pseudo_class() {
            descendant_features.tree_boundary_crossing = true;
        }
        if let SimpleSelector::HostContext(..) = *simple {
            descendant_features.insertion_point_crossing = true;
        }

        self.add_features_to_invalidation_sets_for_selector_list(simple,
                                                                 sibling_features,
                                                                 chain_features,
                                                                 descendant_features);
    }

    fn add_features_to_invalidation_sets_for_selector_list(
        &mut self,
        simple: &SimpleSelector,
        sibling_features: SiblingFeatures,
        chain_features: &InvalidationSetFeatures,
        descendant_features: &mut InvalidationSetFeatures,
    ) {
        let selector_list = match simple.selector_list() {
            Some(selector_list) => selector_list,
            None => return,
        };

        let had_features_for_rule_set_invalidation =
            descendant_features.has_features_for_rule_set_invalidation;
        // An element matching :not(...) can have any feature at all, and the
        // argument of :host-context() is matched outside the rule's scope.
        let mut selector_list_contains_universal =
            matches!(*simple, SimpleSelector::Negation(..) | SimpleSelector::HostContext(..));

        for compound in selector_list.iter() {
            descendant_features.has_features_for_rule_set_invalidation = false;
            self.add_features_to_invalidation_sets_for_compound_selector(compound,
                                                                         sibling_features,
                                                                         chain_features,
                                                                         descendant_features);
            if !descendant_features.has_features_for_rule_set_invalidation {
                selector_list_contains_universal = true;
            }
        }

        descendant_features.has_features_for_rule_set_invalidation =
            had_features_for_rule_set_invalidation || !selector_list_contains_universal;
    }

    fn add_features_to_universal_sibling_invalidation_set(
        &mut self,
        sibling_features: SiblingFeatures,
        chain_features: &InvalidationSetFeatures,
        descendant_features: &InvalidationSetFeatures,
    ) {
        let universal = self.ensure_universal_sibling_invalidation_set();
        match sibling_features {
            SiblingFeatures::Subject => {
                add_features_to_invalidation_set(universal, descendant_features);
                universal.update_max_direct_adjacent_selectors(
                    descendant_features.max_direct_adjacent_selectors);
                universal.set_invalidates_self();
            }
            SiblingFeatures::Chain => {
                add_features_to_invalidation_set(universal, chain_features);
                universal.update_max_direct_adjacent_selectors(
                    chain_features.max_direct_adjacent_selectors);
                add_features_to_invalidation_set(universal.ensure_sibling_descendants(),
                                                 descendant_features);
            }
            SiblingFeatures::None => {}
        }
    }
}

/// Scans a selector for the metadata of its rule, and rejects selectors
/// that can never match.
fn collect_features_from_selector(selector: &Selector, metadata: &mut FeatureMetadata)
                                  -> SelectorPreMatch {
    let mut direct_adjacent_run = 0;
    for compound in selector.iter_compounds() {
        let is_leftmost = compound.next.is_none();
        if collect_features_from_compound(&compound.simple_selectors, is_leftmost, metadata) ==
           SelectorPreMatch::SelectorNeverMatches {
            return SelectorPreMatch::SelectorNeverMatches
        }

        let combinator = compound.combinator();
        if combinator == Some(Combinator::NextSibling) {
            direct_adjacent_run += 1;
        } else {
            metadata.max_direct_adjacent_selectors =
                metadata.max_direct_adjacent_selectors.max(direct_adjacent_run);
            direct_adjacent_run = 0;
        }

        if let Some(combinator) = combinator {
            if combinator == Combinator::SlotAssignment {
                metadata.found_insertion_point_crossing = true;
            }
            if combinator.is_sibling() && !metadata.found_insertion_point_crossing {
                metadata.found_sibling_selector = true;
            }
        }
    }
    SelectorPreMatch::SelectorMayMatch
}

fn collect_features_from_compound(simple_selectors: &[SimpleSelector],
                                  is_leftmost: bool,
                                  metadata: &mut FeatureMetadata)
                                  -> SelectorPreMatch {
    // :host and :host-context() match the shadow host, which has nothing to
    // its left in the shadow tree. Only other host pseudo-classes may share
    // its compound, and only pseudo-elements may follow them.
    if let Some(host_index) = simple_selectors.iter().position(|s| s.is_host_pseudo_class()) {
        let before_host_ok = simple_selectors[..host_index].iter()
            .all(|s| matches!(*s, SimpleSelector::Namespace(..)));
        let after_host_ok = simple_selectors[host_index + 1..].iter()
            .all(|s| s.is_host_pseudo_class() || s.is_pseudo_element());
        if !is_leftmost || !before_host_ok || !after_host_ok {
            return SelectorPreMatch::SelectorNeverMatches
        }
    }

    for simple in simple_selectors.iter().rev() {
        match *simple {
            SimpleSelector::PseudoElement(PseudoElement::FirstLine) => {
                metadata.uses_first_line_rules = true
            }
            SimpleSelector::NonTSPseudoClass(NonTSPseudoClass::WindowInactive) => {
                metadata.uses_window_inactive_selector = true
            }
            _ => {}
        }

        if let Some(selector_list) = simple.selector_list() {
            for compound in selector_list.iter() {
                collect_features_from_compound(compound, true, metadata);
            }
        }

        if let SimpleSelector::PseudoElement(PseudoElement::Slotted(..)) = *simple {
            metadata.found_insertion_point_crossing = true;
        }
        if simple.is_sibling_pseudo_class() && !metadata.found_insertion_point_crossing {
            metadata.found_sibling_selector = true;
        }
    }
    SelectorPreMatch::SelectorMayMatch
}
