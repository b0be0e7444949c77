/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Selector AST consumed by the invalidation-set builder, and the parser
//! that produces it.

use crate::states::{ElementState, NonTSPseudoClass};
use crate::{Atom, HashMap, Namespace};
use cssparser::{parse_nth, CowRcStr, ParseError, Parser, ParserInput, Token};
use servo_arc::Arc;

/// Parse-time configuration.
#[derive(Clone, Debug, Default)]
pub struct ParserContext {
    /// User-agent stylesheets may use `::-internal-*` pseudo-elements.
    pub in_user_agent_stylesheet: bool,
    pub default_namespace: Option<Namespace>,
    pub namespace_prefixes: HashMap<Atom, Namespace>,
}

impl ParserContext {
    pub fn new() -> Self {
        ParserContext::default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectorParseErrorKind<'i> {
    EmptySelector,
    ClassNeedsIdent(Token<'i>),
    PseudoElementExpectedIdent(Token<'i>),
    UnsupportedPseudoClassOrElement(CowRcStr<'i>),
    UnexpectedTokenInAttributeSelector(Token<'i>),
    NoQualifiedNameInAttributeSelector,
    ExpectedNamespace(CowRcStr<'i>),
    NestedNegation,
    PseudoElementInSelectorList,
}

pub type SelectorParseError<'i> = ParseError<'i, SelectorParseErrorKind<'i>>;

/// A complex selector: compounds joined by combinators.
#[derive(PartialEq, Clone, Debug)]
pub struct Selector {
    /// The rightmost (subject) compound.
    pub compound_selectors: Arc<CompoundSelector>,
}

impl Selector {
    /// The compound matched against the element receiving the style.
    pub fn subject(&self) -> &CompoundSelector {
        &self.compound_selectors
    }

    /// Iterates compounds from right to left, starting at the subject.
    pub fn iter_compounds(&self) -> CompoundIter {
        CompoundIter { next: Some(&self.compound_selectors) }
    }
}

pub struct CompoundIter<'a> {
    next: Option<&'a CompoundSelector>,
}

impl<'a> Iterator for CompoundIter<'a> {
    type Item = &'a CompoundSelector;

    fn next(&mut self) -> Option<&'a CompoundSelector> {
        let current = self.next?;
        self.next = current.next_compound();
        Some(current)
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct CompoundSelector {
    /// Simple selectors in source order. Empty means universal.
    pub simple_selectors: Vec<SimpleSelector>,
    pub next: Option<(Arc<CompoundSelector>, Combinator)>,  // c.next is left of c
}

impl CompoundSelector {
    /// The compound to the left of this one.
    pub fn next_compound(&self) -> Option<&CompoundSelector> {
        self.next.as_ref().map(|&(ref compound, _)| &**compound)
    }

    /// The combinator between this compound and the one to its left.
    pub fn combinator(&self) -> Option<Combinator> {
        self.next.as_ref().map(|&(_, combinator)| combinator)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug)]
pub enum Combinator {
    Child,  //  >
    Descendant,  // space
    NextSibling,  // +
    LaterSibling,  // ~
    ShadowPiercingDescendant,  // >>>
    /// Implied before `::slotted(...)`: the right side is distributed into a
    /// slot of the left side's shadow tree.
    SlotAssignment,
}

impl Combinator {
    /// `+` or `~`.
    pub fn is_sibling(self) -> bool {
        matches!(self, Combinator::NextSibling | Combinator::LaterSibling)
    }
}

/// A comma-separated argument list of compound selectors, as taken by
/// `:not()`, `:-webkit-any()`, `:host()`, `:host-context()`, `::slotted()`
/// and `::cue()`.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct SelectorList(pub Vec<Vec<SimpleSelector>>);

impl SelectorList {
    pub fn iter(&self) -> impl Iterator<Item = &[SimpleSelector]> {
        self.0.iter().map(|compound| &**compound)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Eq, PartialEq, Clone, Debug)]
pub enum SimpleSelector {
    ID(Atom),
    Class(Atom),
    LocalName(LocalName),
    Namespace(Namespace),

    // Attribute selectors
    AttrExists(AttrSelector),  // [foo]
    AttrEqual(AttrSelector, Atom, CaseSensitivity),  // [foo=bar]
    AttrIncludes(AttrSelector, Atom),  // [foo~=bar]
    AttrDashMatch(AttrSelector, Atom), // [foo|=bar]
    AttrPrefixMatch(AttrSelector, Atom),  // [foo^=bar]
    AttrSubstringMatch(AttrSelector, Atom),  // [foo*=bar]
    AttrSuffixMatch(AttrSelector, Atom),  // [foo$=bar]

    // Pseudo-classes
    Negation(SelectorList),
    Any(SelectorList),
    /// `:host` or `:host(<compound>)`.
    Host(Option<SelectorList>),
    HostContext(SelectorList),
    FirstChild, LastChild, OnlyChild,
    Root,
    Empty,
    Scope,
    NthChild(i32, i32),
    NthLastChild(i32, i32),
    NthOfType(i32, i32),
    NthLastOfType(i32, i32),
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NonTSPseudoClass(NonTSPseudoClass),

    PseudoElement(PseudoElement),
}

#[derive(Eq, PartialEq, Clone, Debug)]
pub enum PseudoElement {
    Before,
    After,
    FirstLine,
    FirstLetter,
    Selection,
    Backdrop,
    Placeholder,
    Cue(SelectorList),
    Slotted(SelectorList),
    /// `::-webkit-*`, exposed by user-agent shadow trees.
    WebKitCustom(Atom),
    /// `::-internal-*`, user-agent stylesheets only.
    BlinkInternal(Atom),
}

/// The kind of a pseudo-class or pseudo-element, without its arguments.
///
/// State pseudo-classes are identified by their state bits, so `:hover` and
/// `:focus` are distinct keys while `:lang(en)` and `:lang(fr)` share one.
#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug)]
pub enum PseudoType {
    Not,
    Any,
    Host,
    HostContext,
    FirstChild,
    LastChild,
    OnlyChild,
    Root,
    Empty,
    Scope,
    NthChild,
    NthLastChild,
    NthOfType,
    NthLastOfType,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    State(ElementState),
    Lang,
    Before,
    After,
    FirstLine,
    FirstLetter,
    Selection,
    Backdrop,
    Placeholder,
    Cue,
    Slotted,
    WebKitCustomElement,
    BlinkInternalElement,
}

impl PseudoType {
    /// The key under which a state pseudo-class is stored.
    pub fn for_state(pseudo_class: &NonTSPseudoClass) -> PseudoType {
        match *pseudo_class {
            NonTSPseudoClass::Lang(..) => PseudoType::Lang,
            ref state => PseudoType::State(state.state_flag()),
        }
    }
}

impl SimpleSelector {
    pub fn pseudo_type(&self) -> Option<PseudoType> {
        Some(match *self {
            SimpleSelector::Negation(..) => PseudoType::Not,
            SimpleSelector::Any(..) => PseudoType::Any,
            SimpleSelector::Host(..) => PseudoType::Host,
            SimpleSelector::HostContext(..) => PseudoType::HostContext,
            SimpleSelector::FirstChild => PseudoType::FirstChild,
            SimpleSelector::LastChild => PseudoType::LastChild,
            SimpleSelector::OnlyChild => PseudoType::OnlyChild,
            SimpleSelector::Root => PseudoType::Root,
            SimpleSelector::Empty => PseudoType::Empty,
            SimpleSelector::Scope => PseudoType::Scope,
            SimpleSelector::NthChild(..) => PseudoType::NthChild,
            SimpleSelector::NthLastChild(..) => PseudoType::NthLastChild,
            SimpleSelector::NthOfType(..) => PseudoType::NthOfType,
            SimpleSelector::NthLastOfType(..) => PseudoType::NthLastOfType,
            SimpleSelector::FirstOfType => PseudoType::FirstOfType,
            SimpleSelector::LastOfType => PseudoType::LastOfType,
            SimpleSelector::OnlyOfType => PseudoType::OnlyOfType,
            SimpleSelector::NonTSPseudoClass(ref pc) => PseudoType::for_state(pc),
            SimpleSelector::PseudoElement(ref pseudo) => match *pseudo {
                PseudoElement::Before => PseudoType::Before,
                PseudoElement::After => PseudoType::After,
                PseudoElement::FirstLine => PseudoType::FirstLine,
                PseudoElement::FirstLetter => PseudoType::FirstLetter,
                PseudoElement::Selection => PseudoType::Selection,
                PseudoElement::Backdrop => PseudoType::Backdrop,
                PseudoElement::Placeholder => PseudoType::Placeholder,
                PseudoElement::Cue(..) => PseudoType::Cue,
                PseudoElement::Slotted(..) => PseudoType::Slotted,
                PseudoElement::WebKitCustom(..) => PseudoType::WebKitCustomElement,
                PseudoElement::BlinkInternal(..) => PseudoType::BlinkInternalElement,
            },
            _ => return None,
        })
    }

    /// The nested argument list of a functional pseudo-class or
    /// pseudo-element, if any.
    pub fn selector_list(&self) -> Option<&SelectorList> {
        match *self {
            SimpleSelector::Negation(ref list) |
            SimpleSelector::Any(ref list) |
            SimpleSelector::HostContext(ref list) |
            SimpleSelector::PseudoElement(PseudoElement::Cue(ref list)) |
            SimpleSelector::PseudoElement(PseudoElement::Slotted(ref list)) => Some(list),
            SimpleSelector::Host(ref list) => list.as_ref(),
            _ => None,
        }
    }

    pub fn attribute(&self) -> Option<&AttrSelector> {
        match *self {
            SimpleSelector::AttrExists(ref attr) |
            SimpleSelector::AttrEqual(ref attr, ..) |
            SimpleSelector::AttrIncludes(ref attr, _) |
            SimpleSelector::AttrDashMatch(ref attr, _) |
            SimpleSelector::AttrPrefixMatch(ref attr, _) |
            SimpleSelector::AttrSubstringMatch(ref attr, _) |
            SimpleSelector::AttrSuffixMatch(ref attr, _) => Some(attr),
            _ => None,
        }
    }

    pub fn is_attribute_selector(&self) -> bool {
        self.attribute().is_some()
    }

    pub fn is_id_class_or_attribute_selector(&self) -> bool {
        match *self {
            SimpleSelector::ID(..) | SimpleSelector::Class(..) => true,
            _ => self.is_attribute_selector(),
        }
    }

    pub fn is_host_pseudo_class(&self) -> bool {
        matches!(*self, SimpleSelector::Host(..) | SimpleSelector::HostContext(..))
    }

    pub fn is_pseudo_element(&self) -> bool {
        matches!(*self, SimpleSelector::PseudoElement(..))
    }

    /// Whether matching this pseudo-class depends on the element's siblings.
    pub fn is_sibling_pseudo_class(&self) -> bool {
        match *self {
            SimpleSelector::FirstChild |
            SimpleSelector::LastChild |
            SimpleSelector::OnlyChild |
            SimpleSelector::NthChild(..) |
            SimpleSelector::NthLastChild(..) |
            SimpleSelector::NthOfType(..) |
            SimpleSelector::NthLastOfType(..) |
            SimpleSelector::FirstOfType |
            SimpleSelector::LastOfType |
            SimpleSelector::OnlyOfType => true,
            _ => false,
        }
    }
}


#[derive(Eq, PartialEq, Clone, Hash, Copy, Debug)]
pub enum CaseSensitivity {
    CaseSensitive,  // Selectors spec says language-defined, but HTML says sensitive.
    CaseInsensitive,
}


#[derive(Eq, PartialEq, Clone, Hash, Debug)]
pub struct LocalName {
    pub name: Atom,
    pub lower_name: Atom,
}

#[derive(Eq, PartialEq, Clone, Hash, Debug)]
pub struct AttrSelector {
    pub name: Atom,
    pub lower_name: Atom,
    pub namespace: NamespaceConstraint,
}

#[derive(Eq, PartialEq, Clone, Hash, Debug)]
pub enum NamespaceConstraint {
    Any,
    Specific(Namespace),
}


pub fn parse_author_origin_selector_list_from_str(input: &str)
                                                  -> Result<Vec<Selector>, SelectorParseError> {
    let context = ParserContext::new();
    let mut input = ParserInput::new(input);
    parse_selector_list(&context, &mut Parser::new(&mut input))
}

/// Parse a comma-separated list of Selectors.
/// aka Selector Group in http://www.w3.org/TR/css3-selectors/#grouping
///
/// Return the Selectors or an error if there is an invalid selector.
pub fn parse_selector_list<'i, 't>(context: &ParserContext, input: &mut Parser<'i, 't>)
                                   -> Result<Vec<Selector>, SelectorParseError<'i>> {
    input.parse_comma_separated(|input| parse_selector(context, input))
}


/// Build up a Selector.
/// selector : simple_selector_sequence [ combinator simple_selector_sequence ]* ;
///
/// `Err` means invalid selector.
fn parse_selector<'i, 't>(context: &ParserContext, input: &mut Parser<'i, 't>)
                          -> Result<Selector, SelectorParseError<'i>> {
    let (first, mut pseudo_element) = parse_simple_selectors(context, input, false)?;
    let mut compound = CompoundSelector { simple_selectors: first, next: None };

    'outer_loop: while pseudo_element.is_none() {
        let combinator;
        let mut any_whitespace = false;
        loop {
            let before = input.state();
            let token = match input.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => break 'outer_loop,
            };
            match token {
                Token::WhiteSpace(_) => any_whitespace = true,
                Token::Delim('>') => {
                    combinator = parse_child_or_shadow_piercing(input);
                    break
                }
                Token::Delim('+') => {
                    combinator = Combinator::NextSibling;
                    break
                }
                Token::Delim('~') => {
                    combinator = Combinator::LaterSibling;
                    break
                }
                _ => {
                    input.reset(&before);
                    if any_whitespace {
                        combinator = Combinator::Descendant;
                        break
                    } else {
                        break 'outer_loop
                    }
                }
            }
        }
        let (simple_selectors, pseudo) = parse_simple_selectors(context, input, false)?;
        compound = CompoundSelector {
            simple_selectors,
            next: Some((Arc::new(compound), combinator)),
        };
        pseudo_element = pseudo;
    }

    if let Some(pseudo_element) = pseudo_element {
        compound = attach_pseudo_element(compound, pseudo_element);
    }

    Ok(Selector { compound_selectors: Arc::new(compound) })
}

/// Appends a pseudo-element to the compound it was written in. `::slotted()`
/// starts its own compound, since it matches an element distributed into a
/// slot rather than the element matched by the compound before it.
fn attach_pseudo_element(mut compound: CompoundSelector, pseudo_element: PseudoElement)
                         -> CompoundSelector {
    if let PseudoElement::Slotted(..) = pseudo_element {
        return CompoundSelector {
            simple_selectors: vec![SimpleSelector::PseudoElement(pseudo_element)],
            next: Some((Arc::new(compound), Combinator::SlotAssignment)),
        }
    }
    compound.simple_selectors.push(SimpleSelector::PseudoElement(pseudo_element));
    compound
}

/// Called after a `>`: `>>>` is the shadow-piercing descendant combinator.
fn parse_child_or_shadow_piercing<'i, 't>(input: &mut Parser<'i, 't>) -> Combinator {
    let before = input.state();
    for _ in 0..2 {
        if !matches!(input.next_including_whitespace(), Ok(&Token::Delim('>'))) {
            input.reset(&before);
            return Combinator::Child
        }
    }
    Combinator::ShadowPiercingDescendant
}


/// * `Err(())`: Invalid selector, abort
/// * `Ok(None)`: Not a type selector, could be something else. `input` was not consumed.
/// * `Ok(Some(vec))`: Length 0 (`*|*`), 1 (`*|E` or `ns|*`) or 2 (`|E` or `ns|E`)
fn parse_type_selector<'i, 't>(context: &ParserContext, input: &mut Parser<'i, 't>)
                               -> Result<Option<Vec<SimpleSelector>>, SelectorParseError<'i>> {
    match parse_qualified_name(context, input, /* in_attr_selector = */ false)? {
        None => Ok(None),
        Some((namespace, local_name)) => {
            let mut simple_selectors = vec!();
            if let NamespaceConstraint::Specific(ns) = namespace {
                simple_selectors.push(SimpleSelector::Namespace(ns))
            }
            if let Some(name) = local_name {
                simple_selectors.push(SimpleSelector::LocalName(LocalName {
                    lower_name: Atom::from(&*name.to_ascii_lowercase()),
                    name: Atom::from(&*name),
                }))
            }
            Ok(Some(simple_selectors))
        }
    }
}


#[derive(Debug)]
enum SimpleSelectorParseResult {
    SimpleSelector(SimpleSelector),
    PseudoElement(PseudoElement),
}

type QualifiedName<'i> = (NamespaceConstraint, Option<CowRcStr<'i>>);

fn with_default_namespace<'i>(context: &ParserContext, local_name: Option<CowRcStr<'i>>)
                              -> QualifiedName<'i> {
    let namespace = match context.default_namespace {
        Some(ref ns) => NamespaceConstraint::Specific(ns.clone()),
        None => NamespaceConstraint::Any,
    };
    (namespace, local_name)
}

/// Parses the local name after `ns|`.
fn parse_explicit_local_name<'i, 't>(input: &mut Parser<'i, 't>,
                                     namespace: NamespaceConstraint,
                                     in_attr_selector: bool)
                                     -> Result<Option<QualifiedName<'i>>, SelectorParseError<'i>> {
    match input.next_including_whitespace()?.clone() {
        Token::Delim('*') if !in_attr_selector => Ok(Some((namespace, None))),
        Token::Ident(local_name) => Ok(Some((namespace, Some(local_name)))),
        token => Err(input.new_unexpected_token_error(token)),
    }
}

/// * `Err(_)`: Invalid selector, abort
/// * `Ok(None)`: Not a simple selector, could be something else. `input` was not consumed.
/// * `Ok(Some((namespace, local_name)))`: `None` for the local name means a `*` universal selector
fn parse_qualified_name<'i, 't>(context: &ParserContext,
                                input: &mut Parser<'i, 't>,
                                in_attr_selector: bool)
                                -> Result<Option<QualifiedName<'i>>, SelectorParseError<'i>> {
    let start = input.state();
    let token = match input.next_including_whitespace() {
        Ok(token) => token.clone(),
        Err(_) => {
            input.reset(&start);
            return Ok(None)
        }
    };
    match token {
        Token::Ident(value) => {
            let after_ident = input.state();
            match input.next_including_whitespace() {
                Ok(&Token::Delim('|')) => {
                    let namespace = match context.namespace_prefixes.get(&Atom::from(&*value)) {
                        Some(namespace) => namespace.clone(),
                        None => {
                            return Err(input.new_custom_error(
                                SelectorParseErrorKind::ExpectedNamespace(value)))
                        }
                    };
                    parse_explicit_local_name(input,
                                              NamespaceConstraint::Specific(namespace),
                                              in_attr_selector)
                },
                _ => {
                    input.reset(&after_ident);
                    if in_attr_selector {
                        Ok(Some((NamespaceConstraint::Specific(Namespace::from("")), Some(value))))
                    } else {
                        Ok(Some(with_default_namespace(context, Some(value))))
                    }
                }
            }
        },
        Token::Delim('*') => {
            let after_star = input.state();
            match input.next_including_whitespace() {
                Ok(&Token::Delim('|')) => {
                    parse_explicit_local_name(input, NamespaceConstraint::Any, in_attr_selector)
                },
                _ => {
                    input.reset(&after_star);
                    if in_attr_selector {
                        Err(input.new_custom_error(
                            SelectorParseErrorKind::NoQualifiedNameInAttributeSelector))
                    } else {
                        Ok(Some(with_default_namespace(context, None)))
                    }
                },
            }
        },
        Token::Delim('|') => {
            parse_explicit_local_name(input,
                                      NamespaceConstraint::Specific(Namespace::from("")),
                                      in_attr_selector)
        }
        _ => {
            input.reset(&start);
            Ok(None)
        }
    }
}


fn parse_attribute_selector<'i, 't>(context: &ParserContext, input: &mut Parser<'i, 't>)
                                    -> Result<SimpleSelector, SelectorParseError<'i>> {
    let attr = match parse_qualified_name(context, input, /* in_attr_selector = */ true)? {
        Some((namespace, Some(local_name))) => AttrSelector {
            namespace,
            lower_name: Atom::from(&*local_name.to_ascii_lowercase()),
            name: Atom::from(&*local_name),
        },
        _ => {
            return Err(input.new_custom_error(
                SelectorParseErrorKind::NoQualifiedNameInAttributeSelector))
        }
    };

    fn parse_value<'i, 't>(input: &mut Parser<'i, 't>) -> Result<Atom, SelectorParseError<'i>> {
        Ok(Atom::from(&**input.expect_ident_or_string()?))
    }

    let operator = match input.next() {
        // [foo]
        Err(_) => return Ok(SimpleSelector::AttrExists(attr)),
        Ok(token) => token.clone(),
    };
    match operator {
        // [foo=bar]
        Token::Delim('=') => {
            let value = parse_value(input)?;
            Ok(SimpleSelector::AttrEqual(attr, value, parse_attribute_flags(input)?))
        }
        // [foo~=bar]
        Token::IncludeMatch => Ok(SimpleSelector::AttrIncludes(attr, parse_value(input)?)),
        // [foo|=bar]
        Token::DashMatch => Ok(SimpleSelector::AttrDashMatch(attr, parse_value(input)?)),
        // [foo^=bar]
        Token::PrefixMatch => Ok(SimpleSelector::AttrPrefixMatch(attr, parse_value(input)?)),
        // [foo*=bar]
        Token::SubstringMatch => {
            Ok(SimpleSelector::AttrSubstringMatch(attr, parse_value(input)?))
        }
        // [foo$=bar]
        Token::SuffixMatch => Ok(SimpleSelector::AttrSuffixMatch(attr, parse_value(input)?)),
        token => Err(input.new_custom_error(
            SelectorParseErrorKind::UnexpectedTokenInAttributeSelector(token))),
    }
}


fn parse_attribute_flags<'i, 't>(input: &mut Parser<'i, 't>)
                                 -> Result<CaseSensitivity, SelectorParseError<'i>> {
    let token = match input.next() {
        Err(_) => return Ok(CaseSensitivity::CaseSensitive),
        Ok(token) => token.clone(),
    };
    match token {
        Token::Ident(ref value) if value.eq_ignore_ascii_case("i") => {
            Ok(CaseSensitivity::CaseInsensitive)
        }
        token => Err(input.new_custom_error(
            SelectorParseErrorKind::UnexpectedTokenInAttributeSelector(token))),
    }
}


/// Parses the comma-separated compound selectors inside a functional
/// pseudo-class or pseudo-element.
fn parse_compound_selector_list<'i, 't>(context: &ParserContext,
                                        input: &mut Parser<'i, 't>,
                                        inside_negation: bool)
                                        -> Result<SelectorList, SelectorParseError<'i>> {
    let compounds = input.parse_comma_separated(|input| {
        parse_compound_selector(context, input, inside_negation)
    })?;
    Ok(SelectorList(compounds))
}

/// Like `parse_compound_selector_list`, for arguments that take exactly one
/// compound (`:host()`, `:host-context()`, `::slotted()`).
fn parse_single_compound<'i, 't>(context: &ParserContext, input: &mut Parser<'i, 't>)
                                 -> Result<SelectorList, SelectorParseError<'i>> {
    let compound = parse_compound_selector(context, input, false)?;
    Ok(SelectorList(vec![compound]))
}

fn parse_compound_selector<'i, 't>(context: &ParserContext,
                                   input: &mut Parser<'i, 't>,
                                   inside_negation: bool)
                                   -> Result<Vec<SimpleSelector>, SelectorParseError<'i>> {
    let (simple_selectors, pseudo_element) =
        parse_simple_selectors(context, input, inside_negation)?;
    if pseudo_element.is_some() {
        return Err(input.new_custom_error(SelectorParseErrorKind::PseudoElementInSelectorList))
    }
    Ok(simple_selectors)
}

/// simple_selector_sequence
/// : [ type_selector | universal ] [ HASH | class | attrib | pseudo | negation ]*
/// | [ HASH | class | attrib | pseudo | negation ]+
///
/// `Err(())` means invalid selector
fn parse_simple_selectors<'i, 't>(context: &ParserContext,
                                  input: &mut Parser<'i, 't>,
                                  inside_negation: bool)
                                  -> Result<(Vec<SimpleSelector>, Option<PseudoElement>),
                                            SelectorParseError<'i>> {
    // Consume any leading whitespace.
    loop {
        let before = input.state();
        if !matches!(input.next_including_whitespace(), Ok(&Token::WhiteSpace(_))) {
            input.reset(&before);
            break
        }
    }
    let mut empty = true;
    let mut simple_selectors = match parse_type_selector(context, input)? {
        None => {
            match context.default_namespace {
                // If there was no explicit type selector, but there is a
                // default namespace, there is an implicit "<defaultns>|*" type
                // selector.
                Some(ref ns) => vec![SimpleSelector::Namespace(ns.clone())],
                None => vec![],
            }
        }
        Some(s) => { empty = false; s }
    };

    let mut pseudo_element = None;
    loop {
        match parse_one_simple_selector(context, input, inside_negation)? {
            None => break,
            Some(SimpleSelectorParseResult::SimpleSelector(s)) => {
                simple_selectors.push(s);
                empty = false
            }
            Some(SimpleSelectorParseResult::PseudoElement(p)) => {
                pseudo_element = Some(p);
                empty = false;
                break
            }
        }
    }
    if empty {
        // An empty selector is invalid.
        Err(input.new_custom_error(SelectorParseErrorKind::EmptySelector))
    } else {
        Ok((simple_selectors, pseudo_element))
    }
}

fn parse_functional_pseudo_class<'i, 't>(context: &ParserContext,
                                         input: &mut Parser<'i, 't>,
                                         name: CowRcStr<'i>,
                                         inside_negation: bool)
                                         -> Result<SimpleSelector, SelectorParseError<'i>> {
    match_ignore_ascii_case! { &*name,
        "nth-child" => parse_nth_pseudo_class(input, SimpleSelector::NthChild),
        "nth-of-type" => parse_nth_pseudo_class(input, SimpleSelector::NthOfType),
        "nth-last-child" => parse_nth_pseudo_class(input, SimpleSelector::NthLastChild),
        "nth-last-of-type" => parse_nth_pseudo_class(input, SimpleSelector::NthLastOfType),
        "not" => {
            if inside_negation {
                Err(input.new_custom_error(SelectorParseErrorKind::NestedNegation))
            } else {
                Ok(SimpleSelector::Negation(parse_compound_selector_list(context, input, true)?))
            }
        },
        "-webkit-any" | "is" => {
            Ok(SimpleSelector::Any(parse_compound_selector_list(context, input, inside_negation)?))
        },
        "host" => Ok(SimpleSelector::Host(Some(parse_single_compound(context, input)?))),
        "host-context" => Ok(SimpleSelector::HostContext(parse_single_compound(context, input)?)),
        "lang" => {
            let lang = Atom::from(&**input.expect_ident_or_string()?);
            Ok(SimpleSelector::NonTSPseudoClass(NonTSPseudoClass::Lang(lang)))
        },
        _ => Err(input.new_custom_error(
            SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name.clone()))),
    }
}


fn parse_nth_pseudo_class<'i, 't, F>(input: &mut Parser<'i, 't>, selector: F)
                                     -> Result<SimpleSelector, SelectorParseError<'i>>
where F: FnOnce(i32, i32) -> SimpleSelector {
    let (a, b) = parse_nth(input)?;
    Ok(selector(a, b))
}


/// Parse a simple selector other than a type selector.
///
/// * `Err(_)`: Invalid selector, abort
/// * `Ok(None)`: Not a simple selector, could be something else. `input` was not consumed.
/// * `Ok(Some(_))`: Parsed a simple selector or pseudo-element
fn parse_one_simple_selector<'i, 't>(context: &ParserContext,
                                     input: &mut Parser<'i, 't>,
                                     inside_negation: bool)
                                     -> Result<Option<SimpleSelectorParseResult>,
                                               SelectorParseError<'i>> {
    let start = input.state();
    let token = match input.next_including_whitespace() {
        Ok(token) => token.clone(),
        Err(_) => {
            input.reset(&start);
            return Ok(None)
        }
    };
    match token {
        Token::IDHash(id) => {
            let id = SimpleSelector::ID(Atom::from(&*id));
            Ok(Some(SimpleSelectorParseResult::SimpleSelector(id)))
        }
        Token::Delim('.') => {
            match input.next_including_whitespace()?.clone() {
                Token::Ident(class) => {
                    let class = SimpleSelector::Class(Atom::from(&*class));
                    Ok(Some(SimpleSelectorParseResult::SimpleSelector(class)))
                }
                token => Err(input.new_custom_error(SelectorParseErrorKind::ClassNeedsIdent(token))),
            }
        }
        Token::SquareBracketBlock => {
            let attr = input.parse_nested_block(|input| {
                parse_attribute_selector(context, input)
            })?;
            Ok(Some(SimpleSelectorParseResult::SimpleSelector(attr)))
        }
        Token::Colon => {
            match input.next_including_whitespace()?.clone() {
                Token::Ident(name) => {
                    // Supported CSS 2.1 pseudo-elements only.
                    // ** Do not add to this list! **
                    if name.eq_ignore_ascii_case("before") ||
                       name.eq_ignore_ascii_case("after") ||
                       name.eq_ignore_ascii_case("first-line") ||
                       name.eq_ignore_ascii_case("first-letter") {
                        let pseudo_element = parse_pseudo_element(context, input, name)?;
                        Ok(Some(SimpleSelectorParseResult::PseudoElement(pseudo_element)))
                    } else {
                        let pseudo_class = parse_simple_pseudo_class(input, name)?;
                        Ok(Some(SimpleSelectorParseResult::SimpleSelector(pseudo_class)))
                    }
                }
                Token::Function(name) => {
                    let pseudo = input.parse_nested_block(|input| {
                        parse_functional_pseudo_class(context, input, name, inside_negation)
                    })?;
                    Ok(Some(SimpleSelectorParseResult::SimpleSelector(pseudo)))
                }
                Token::Colon => {
                    match input.next_including_whitespace()?.clone() {
                        Token::Ident(name) => {
                            let pseudo = parse_pseudo_element(context, input, name)?;
                            Ok(Some(SimpleSelectorParseResult::PseudoElement(pseudo)))
                        }
                        Token::Function(name) => {
                            let pseudo = input.parse_nested_block(|input| {
                                parse_functional_pseudo_element(context, input, name)
                            })?;
                            Ok(Some(SimpleSelectorParseResult::PseudoElement(pseudo)))
                        }
                        token => Err(input.new_custom_error(
                            SelectorParseErrorKind::PseudoElementExpectedIdent(token))),
                    }
                }
                token => Err(input.new_unexpected_token_error(token)),
            }
        }
        _ => {
            input.reset(&start);
            Ok(None)
        }
    }
}

fn parse_simple_pseudo_class<'i, 't>(input: &Parser<'i, 't>, name: CowRcStr<'i>)
                                     -> Result<SimpleSelector, SelectorParseError<'i>> {
    match_ignore_ascii_case! { &*name,
        "first-child" => return Ok(SimpleSelector::FirstChild),
        "last-child"  => return Ok(SimpleSelector::LastChild),
        "only-child"  => return Ok(SimpleSelector::OnlyChild),
        "root" => return Ok(SimpleSelector::Root),
        "empty" => return Ok(SimpleSelector::Empty),
        "scope" => return Ok(SimpleSelector::Scope),
        "first-of-type" => return Ok(SimpleSelector::FirstOfType),
        "last-of-type"  => return Ok(SimpleSelector::LastOfType),
        "only-of-type"  => return Ok(SimpleSelector::OnlyOfType),
        "host" => return Ok(SimpleSelector::Host(None)),
        _ => {},
    }
    match NonTSPseudoClass::from_state_ident(&name) {
        Some(pseudo_class) => Ok(SimpleSelector::NonTSPseudoClass(pseudo_class)),
        None => Err(input.new_custom_error(
            SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name))),
    }
}

fn parse_pseudo_element<'i, 't>(context: &ParserContext,
                                input: &Parser<'i, 't>,
                                name: CowRcStr<'i>)
                                -> Result<PseudoElement, SelectorParseError<'i>> {
    match_ignore_ascii_case! { &*name,
        "before" => return Ok(PseudoElement::Before),
        "after" => return Ok(PseudoElement::After),
        "first-line" => return Ok(PseudoElement::FirstLine),
        "first-letter" => return Ok(PseudoElement::FirstLetter),
        "selection" => return Ok(PseudoElement::Selection),
        "backdrop" => return Ok(PseudoElement::Backdrop),
        "placeholder" => return Ok(PseudoElement::Placeholder),
        _ => {},
    }
    let lower_name = name.to_ascii_lowercase();
    if lower_name.starts_with("-webkit-") {
        return Ok(PseudoElement::WebKitCustom(Atom::from(lower_name)))
    }
    if lower_name.starts_with("-internal-") && context.in_user_agent_stylesheet {
        return Ok(PseudoElement::BlinkInternal(Atom::from(lower_name)))
    }
    Err(input.new_custom_error(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name)))
}

fn parse_functional_pseudo_element<'i, 't>(context: &ParserContext,
                                           input: &mut Parser<'i, 't>,
                                           name: CowRcStr<'i>)
                                           -> Result<PseudoElement, SelectorParseError<'i>> {
    match_ignore_ascii_case! { &*name,
        "cue" => Ok(PseudoElement::Cue(parse_compound_selector_list(context, input, false)?)),
        "slotted" => Ok(PseudoElement::Slotted(parse_single_compound(context, input)?)),
        _ => Err(input.new_custom_error(
            SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name.clone()))),
    }
}

#[cfg(test)]
pub mod tests {
    use cssparser::{Parser, ParserInput};
    use servo_arc::Arc;
    use super::*;

    pub fn parse(input: &str) -> Result<Vec<Selector>, SelectorParseError> {
        parse_ns(input, &ParserContext::new())
    }

    pub fn parse_ns<'i>(input: &'i str, context: &ParserContext)
                        -> Result<Vec<Selector>, SelectorParseError<'i>> {
        let mut input = ParserInput::new(input);
        parse_selector_list(context, &mut Parser::new(&mut input))
    }

    /// Parses a single selector, panicking on invalid input.
    pub fn selector(input: &str) -> Selector {
        let mut list = parse(input).expect("valid selector");
        assert_eq!(list.len(), 1);
        list.pop().unwrap()
    }

    fn compound(simple_selectors: Vec<SimpleSelector>) -> CompoundSelector {
        CompoundSelector { simple_selectors, next: None }
    }

    fn single<'i>(compound: CompoundSelector) -> Result<Vec<Selector>, SelectorParseError<'i>> {
        Ok(vec![Selector { compound_selectors: Arc::new(compound) }])
    }

    fn local_name(name: &str) -> SimpleSelector {
        SimpleSelector::LocalName(LocalName {
            name: Atom::from(name),
            lower_name: Atom::from(&*name.to_ascii_lowercase()),
        })
    }

    fn class(name: &str) -> SimpleSelector {
        SimpleSelector::Class(Atom::from(name))
    }

    #[test]
    fn test_empty() {
        let list = parse_author_origin_selector_list_from_str(":empty");
        assert!(list.is_ok());
    }

    const MATHML: &'static str = "http://www.w3.org/1998/Math/MathML";

    #[test]
    fn test_parsing() {
        assert!(parse("").is_err());
        assert!(parse(":lang(4)").is_err());
        assert!(parse(":lang(en US)").is_err());
        assert_eq!(parse("EeÉ"), single(compound(vec![local_name("EeÉ")])));
        assert_eq!(parse(".foo:lang(en-US)"), single(compound(vec![
            class("foo"),
            SimpleSelector::NonTSPseudoClass(NonTSPseudoClass::Lang(Atom::from("en-US"))),
        ])));
        assert_eq!(parse("#bar"), single(compound(vec![SimpleSelector::ID(Atom::from("bar"))])));
        assert_eq!(parse("e.foo#bar"), single(compound(vec![
            local_name("e"),
            class("foo"),
            SimpleSelector::ID(Atom::from("bar")),
        ])));
        assert_eq!(parse("e.foo #bar"), single(CompoundSelector {
            simple_selectors: vec![SimpleSelector::ID(Atom::from("bar"))],
            next: Some((Arc::new(compound(vec![local_name("e"), class("foo")])),
                        Combinator::Descendant)),
        }));
        // Default namespace does not apply to attribute selectors
        // https://github.com/mozilla/servo/pull/1652
        let mut context = ParserContext::new();
        let foo_attr = AttrSelector {
            name: Atom::from("Foo"),
            lower_name: Atom::from("foo"),
            namespace: NamespaceConstraint::Specific(Namespace::from("")),
        };
        assert_eq!(parse_ns("[Foo]", &context),
                   single(compound(vec![SimpleSelector::AttrExists(foo_attr.clone())])));
        // but it does apply to implicit type selectors
        // https://github.com/servo/rust-selectors/pull/82
        context.default_namespace = Some(Namespace::from(MATHML));
        assert_eq!(parse_ns("[Foo]", &context), single(compound(vec![
            SimpleSelector::Namespace(Namespace::from(MATHML)),
            SimpleSelector::AttrExists(foo_attr),
        ])));
        // Default namespace does apply to type selectors
        assert_eq!(parse_ns("e", &context), single(compound(vec![
            SimpleSelector::Namespace(Namespace::from(MATHML)),
            local_name("e"),
        ])));
        assert_eq!(parse("[attr|=\"foo\"]"), single(compound(vec![
            SimpleSelector::AttrDashMatch(AttrSelector {
                name: Atom::from("attr"),
                lower_name: Atom::from("attr"),
                namespace: NamespaceConstraint::Specific(Namespace::from("")),
            }, Atom::from("foo")),
        ])));
        // https://github.com/mozilla/servo/issues/1723
        assert_eq!(parse("::before"), single(compound(vec![
            SimpleSelector::PseudoElement(PseudoElement::Before),
        ])));
        assert_eq!(parse("div :after"), single(CompoundSelector {
            simple_selectors: vec![SimpleSelector::PseudoElement(PseudoElement::After)],
            next: Some((Arc::new(compound(vec![local_name("div")])), Combinator::Descendant)),
        }));
        assert_eq!(parse("#d1 > .ok"), single(CompoundSelector {
            simple_selectors: vec![class("ok")],
            next: Some((Arc::new(compound(vec![SimpleSelector::ID(Atom::from("d1"))])),
                        Combinator::Child)),
        }));
    }

    #[test]
    fn test_combinators() {
        let selector = selector(".a + .b ~ .c >>> .d");
        let combinators: Vec<_> = selector.iter_compounds().filter_map(|c| c.combinator()).collect();
        assert_eq!(combinators, vec![Combinator::ShadowPiercingDescendant,
                                     Combinator::LaterSibling,
                                     Combinator::NextSibling]);
        let classes: Vec<_> = selector.iter_compounds()
            .map(|c| c.simple_selectors.clone())
            .collect();
        assert_eq!(classes, vec![vec![class("d")], vec![class("c")], vec![class("b")], vec![class("a")]]);
        assert!(parse(".a >").is_err());
        assert!(parse("+ .a").is_err());
    }

    #[test]
    fn test_slotted_starts_a_compound() {
        assert_eq!(parse(".x::slotted(.y)"), single(CompoundSelector {
            simple_selectors: vec![SimpleSelector::PseudoElement(PseudoElement::Slotted(
                SelectorList(vec![vec![class("y")]])))],
            next: Some((Arc::new(compound(vec![class("x")])), Combinator::SlotAssignment)),
        }));
        assert_eq!(selector("::slotted(span)").subject().combinator(),
                   Some(Combinator::SlotAssignment));
    }

    #[test]
    fn test_selector_lists() {
        assert_eq!(parse(":not(.a, span.b)"), single(compound(vec![
            SimpleSelector::Negation(SelectorList(vec![
                vec![class("a")],
                vec![local_name("span"), class("b")],
            ])),
        ])));
        assert_eq!(parse(":-webkit-any(*, .a)"), single(compound(vec![
            SimpleSelector::Any(SelectorList(vec![vec![], vec![class("a")]])),
        ])));
        assert_eq!(parse(":host(.a)"), single(compound(vec![
            SimpleSelector::Host(Some(SelectorList(vec![vec![class("a")]]))),
        ])));
        assert!(parse(":not(:not(.a))").is_err());
        assert!(parse(":not(::before)").is_err());
        assert!(parse(":host(.a, .b)").is_err());
    }

    #[test]
    fn test_pseudo_elements() {
        assert!(parse("::-webkit-scrollbar").is_ok());
        assert!(parse("::-internal-media-controls").is_err());
        let context = ParserContext { in_user_agent_stylesheet: true, ..ParserContext::new() };
        assert_eq!(parse_ns("::-internal-media-controls", &context), single(compound(vec![
            SimpleSelector::PseudoElement(PseudoElement::BlinkInternal(
                Atom::from("-internal-media-controls"))),
        ])));
        // Nothing may follow a pseudo-element.
        assert!(parse("::before .a").is_err());
    }

    #[test]
    fn test_pseudo_types() {
        let hover = selector(":hover");
        assert_eq!(hover.subject().simple_selectors[0].pseudo_type(),
                   Some(PseudoType::State(ElementState::IN_HOVER_STATE)));
        let nth = selector(":nth-child(2n+1)");
        assert_eq!(nth.subject().simple_selectors[0], SimpleSelector::NthChild(2, 1));
        assert_eq!(nth.subject().simple_selectors[0].pseudo_type(), Some(PseudoType::NthChild));
        assert_eq!(class("a").pseudo_type(), None);
    }
}
