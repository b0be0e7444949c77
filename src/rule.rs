/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Style rules as seen by the feature collector: a selector list and the
//! declarations it applies. Only `content` is parsed, since generated content
//! can depend on attribute values through `attr()`.

use crate::parser::{parse_selector_list, ParserContext, Selector, SelectorParseErrorKind};
use crate::parser::{SelectorList, SimpleSelector, PseudoElement};
use crate::Atom;
use cssparser::{CowRcStr, Delimiter, ParseError, Parser, ParserInput, Token};
use servo_arc::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum StyleParseErrorKind<'i> {
    Selector(SelectorParseErrorKind<'i>),
    UnknownContentFunction(CowRcStr<'i>),
    UnexpectedContentKeyword(CowRcStr<'i>),
    EmptyContent,
}

impl<'i> From<SelectorParseErrorKind<'i>> for StyleParseErrorKind<'i> {
    fn from(kind: SelectorParseErrorKind<'i>) -> Self {
        StyleParseErrorKind::Selector(kind)
    }
}

pub type StyleParseError<'i> = ParseError<'i, StyleParseErrorKind<'i>>;

#[derive(Clone, Debug, PartialEq)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub block: DeclarationBlock,
}

impl StyleRule {
    /// Parses a rule from its prelude and the text between its braces.
    pub fn parse<'i>(context: &ParserContext, selectors: &'i str, declarations: &'i str)
                     -> Result<StyleRule, StyleParseError<'i>> {
        let mut input = ParserInput::new(selectors);
        let selectors = parse_selector_list(context, &mut Parser::new(&mut input))
            .map_err(|error| error.into::<StyleParseErrorKind>())?;
        let mut input = ParserInput::new(declarations);
        let block = DeclarationBlock::parse(&mut Parser::new(&mut input))?;
        Ok(StyleRule { selectors, block })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeclarationBlock {
    pub declarations: Vec<PropertyDeclaration>,
}

impl DeclarationBlock {
    /// Parses `name: value;` pairs. Properties other than `content` are kept
    /// by name only.
    pub fn parse<'i, 't>(input: &mut Parser<'i, 't>)
                         -> Result<DeclarationBlock, StyleParseError<'i>> {
        let mut declarations = vec![];
        while !input.is_exhausted() {
            let name = input.expect_ident()?.clone();
            input.expect_colon()?;
            let declaration = input.parse_until_after(Delimiter::Semicolon, |input| {
                parse_property_declaration(name, input)
            })?;
            declarations.push(declaration);
        }
        Ok(DeclarationBlock { declarations })
    }

    /// The last `content` declaration, if any.
    pub fn content(&self) -> Option<&ContentValue> {
        self.declarations.iter().rev().find_map(|declaration| match *declaration {
            PropertyDeclaration::Content(ref value) => Some(value),
            PropertyDeclaration::Other(..) => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyDeclaration {
    Content(ContentValue),
    Other(Atom),
}

/// https://drafts.csswg.org/css-content/#content-property
#[derive(Clone, Debug, PartialEq)]
pub enum ContentValue {
    Normal,
    None,
    Items(Vec<ContentItem>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContentItem {
    String(String),
    /// `attr(name)`, with the name lowercased.
    Attr(Atom),
    Counter(Atom),
    Counters(Atom, String),
    OpenQuote,
    CloseQuote,
    NoOpenQuote,
    NoCloseQuote,
}

fn parse_property_declaration<'i, 't>(name: CowRcStr<'i>, input: &mut Parser<'i, 't>)
                                      -> Result<PropertyDeclaration, StyleParseError<'i>> {
    if name.eq_ignore_ascii_case("content") {
        return Ok(PropertyDeclaration::Content(parse_content(input)?))
    }
    while input.next().is_ok() {}
    Ok(PropertyDeclaration::Other(Atom::from(&*name.to_ascii_lowercase())))
}

pub fn parse_content<'i, 't>(input: &mut Parser<'i, 't>)
                             -> Result<ContentValue, StyleParseError<'i>> {
    if input.try_parse(|input| input.expect_ident_matching("normal")).is_ok() {
        return Ok(ContentValue::Normal)
    }
    if input.try_parse(|input| input.expect_ident_matching("none")).is_ok() {
        return Ok(ContentValue::None)
    }

    let mut items = vec![];
    loop {
        let token = match input.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let item = match token {
            Token::QuotedString(value) => ContentItem::String(String::from(&*value)),
            Token::Function(name) => {
                input.parse_nested_block(|input| parse_content_function(input, name))?
            }
            Token::Ident(ident) => {
                match_ignore_ascii_case! { &*ident,
                    "open-quote" => ContentItem::OpenQuote,
                    "close-quote" => ContentItem::CloseQuote,
                    "no-open-quote" => ContentItem::NoOpenQuote,
                    "no-close-quote" => ContentItem::NoCloseQuote,
                    _ => return Err(input.new_custom_error(
                        StyleParseErrorKind::UnexpectedContentKeyword(ident.clone()))),
                }
            }
            token => return Err(input.new_unexpected_token_error(token)),
        };
        items.push(item);
    }

    if items.is_empty() {
        return Err(input.new_custom_error(StyleParseErrorKind::EmptyContent))
    }
    Ok(ContentValue::Items(items))
}

fn parse_content_function<'i, 't>(input: &mut Parser<'i, 't>, name: CowRcStr<'i>)
                                  -> Result<ContentItem, StyleParseError<'i>> {
    match_ignore_ascii_case! { &*name,
        "attr" => {
            let attr = Atom::from(&*input.expect_ident()?.to_ascii_lowercase());
            Ok(ContentItem::Attr(attr))
        },
        "counter" => {
            let counter_name = Atom::from(&**input.expect_ident()?);
            parse_counter_style(input)?;
            Ok(ContentItem::Counter(counter_name))
        },
        "counters" => {
            let counter_name = Atom::from(&**input.expect_ident()?);
            input.expect_comma()?;
            let separator = String::from(&**input.expect_string()?);
            parse_counter_style(input)?;
            Ok(ContentItem::Counters(counter_name, separator))
        },
        _ => Err(input.new_custom_error(
            StyleParseErrorKind::UnknownContentFunction(name.clone()))),
    }
}

/// The optional `, <counter-style>` tail of `counter()` and `counters()`.
fn parse_counter_style<'i, 't>(input: &mut Parser<'i, 't>) -> Result<(), StyleParseError<'i>> {
    if input.try_parse(|input| input.expect_comma()).is_ok() {
        input.expect_ident()?;
    }
    Ok(())
}

/// One selector of a style rule, as registered with a rule set.
#[derive(Clone, Debug)]
pub struct RuleData {
    rule: Arc<StyleRule>,
    selector_index: usize,
    has_document_security_origin: bool,
}

impl RuleData {
    pub fn new(rule: Arc<StyleRule>, selector_index: usize, has_document_security_origin: bool)
               -> Self {
        debug_assert!(selector_index < rule.selectors.len());
        RuleData { rule, selector_index, has_document_security_origin }
    }

    pub fn rule(&self) -> &Arc<StyleRule> {
        &self.rule
    }

    pub fn selector_index(&self) -> usize {
        self.selector_index
    }

    pub fn selector(&self) -> &Selector {
        &self.rule.selectors[self.selector_index]
    }

    pub fn has_document_security_origin(&self) -> bool {
        self.has_document_security_origin
    }

    /// Whether the selector tests an attribute that elements sharing a style
    /// are not already known to agree on. Only `type` and `readonly` on the
    /// subject are common; any attribute test further left is uncommon.
    pub fn contains_uncommon_attribute_selector(&self) -> bool {
        let mut compounds = self.selector().iter_compounds();
        let subject = match compounds.next() {
            Some(subject) => subject,
            None => return false,
        };
        for simple in subject.simple_selectors.iter().rev() {
            if let Some(attr) = simple.attribute() {
                if !is_common_attribute(&attr.lower_name) {
                    return true
                }
            }
            if simple.selector_list().map_or(false, selector_list_contains_attribute_selector) {
                return true
            }
            if let SimpleSelector::PseudoElement(PseudoElement::Slotted(..)) = *simple {
                return false
            }
        }
        compounds.any(|compound| {
            compound.simple_selectors.iter().any(|simple| {
                simple.is_attribute_selector() ||
                simple.selector_list().map_or(false, selector_list_contains_attribute_selector)
            })
        })
    }
}

fn is_common_attribute(lower_name: &Atom) -> bool {
    &**lower_name == "type" || &**lower_name == "readonly"
}

fn selector_list_contains_attribute_selector(list: &SelectorList) -> bool {
    list.iter().any(|compound| {
        compound.iter().any(|simple| {
            simple.is_attribute_selector() ||
            simple.selector_list().map_or(false, selector_list_contains_attribute_selector)
        })
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Parses an author rule, panicking on invalid input.
    pub fn rule(selectors: &str, declarations: &str) -> Arc<StyleRule> {
        Arc::new(StyleRule::parse(&ParserContext::new(), selectors, declarations)
            .expect("valid rule"))
    }

    fn uncommon(selector: &str) -> bool {
        RuleData::new(rule(selector, ""), 0, true).contains_uncommon_attribute_selector()
    }

    #[test]
    fn test_parse_content() {
        let rule = rule("::before",
                        "color: red; content: \"(\" attr(Data-X) counter(c, decimal) open-quote");
        assert_eq!(rule.block.declarations[0], PropertyDeclaration::Other(Atom::from("color")));
        assert_eq!(rule.block.content(), Some(&ContentValue::Items(vec![
            ContentItem::String("(".to_owned()),
            ContentItem::Attr(Atom::from("data-x")),
            ContentItem::Counter(Atom::from("c")),
            ContentItem::OpenQuote,
        ])));
    }

    #[test]
    fn test_parse_content_keywords() {
        assert_eq!(rule("p", "content: normal").block.content(), Some(&ContentValue::Normal));
        assert_eq!(rule("p", "content: none;").block.content(), Some(&ContentValue::None));
        assert_eq!(rule("p", "margin: 0").block.content(), None);
        assert_eq!(rule("p", "content: counters(item, \".\")").block.content(),
                   Some(&ContentValue::Items(vec![
                       ContentItem::Counters(Atom::from("item"), ".".to_owned()),
                   ])));
        let context = ParserContext::new();
        assert!(StyleRule::parse(&context, "p", "content: url(a.png)").is_err());
        assert!(StyleRule::parse(&context, "p", "content: bogus").is_err());
        assert!(StyleRule::parse(&context, "p", "content: ;").is_err());
        assert!(StyleRule::parse(&context, "p:bogus", "").is_err());
    }

    #[test]
    fn test_rule_data_selector() {
        let rule = rule(".a, .b", "");
        let data = RuleData::new(rule.clone(), 1, false);
        assert_eq!(data.selector(), &rule.selectors[1]);
        assert!(!data.has_document_security_origin());
    }

    #[test]
    fn test_uncommon_attribute_selectors() {
        assert!(!uncommon("input[type=text]"));
        assert!(!uncommon("[readonly]"));
        assert!(uncommon("[data-x]"));
        assert!(uncommon("[type] span"));
        assert!(uncommon(":not([title])"));
        assert!(uncommon("div :-webkit-any(.a, [title]) span"));
        assert!(!uncommon(".a span"));
        assert!(!uncommon("[title]::slotted(span)"));
    }
}
