//! CSS selector subset used by click policies.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`),
//! descendant and child combinators, and comma separated selector lists.

use std::fmt;
use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, multispace0, multispace1, satisfy};
use nom::combinator::{all_consuming, map, opt, recognize, value};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::dom::{Document, NodeId};

/// Raised when a selector string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector {input:?} (offset {offset})")]
pub struct SelectorError {
    pub input: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
    Includes(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    op: AttributeOp,
}

impl AttributeSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match &self.op {
            AttributeOp::Exists => true,
            AttributeOp::Equals(expected) => actual == expected,
            AttributeOp::Prefix(expected) => !expected.is_empty() && actual.starts_with(expected),
            AttributeOp::Suffix(expected) => !expected.is_empty() && actual.ends_with(expected),
            AttributeOp::Substring(expected) => !expected.is_empty() && actual.contains(expected),
            AttributeOp::Includes(expected) => {
                !expected.is_empty()
                    && !expected.contains(char::is_whitespace)
                    && actual.split_whitespace().any(|word| word == expected)
            }
        }
    }
}

/// One compound selector such as `button.primary[type=submit]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

impl Compound {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !element.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.ids.iter().all(|id| element.id() == Some(id.as_str())) {
            return false;
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.attributes
            .iter()
            .all(|attr| attr.matches(element.attribute(&attr.name)))
    }
}

/// Compounds joined by combinators, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.matches_at(document, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, document: &Document, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(document, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => document
                .parent(node)
                .is_some_and(|parent| self.matches_at(document, parent, index - 1)),
            Combinator::Descendant => document
                .ancestors(node)
                .any(|ancestor| self.matches_at(document, ancestor, index - 1)),
        }
    }
}

/// A parsed selector list. Keeps its source text for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        match all_consuming(selector_list)(source) {
            Ok((_, alternatives)) => Ok(Self {
                source: source.trim().to_string(),
                alternatives,
            }),
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(SelectorError {
                input: source.to_string(),
                offset: source.len() - err.input.len(),
            }),
            Err(nom::Err::Incomplete(_)) => Err(SelectorError {
                input: source.to_string(),
                offset: source.len(),
            }),
        }
    }

    /// Parses every selector, failing on the first invalid one.
    pub fn parse_all<I, S>(sources: I) -> Result<Vec<Self>, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        sources
            .into_iter()
            .map(|source| Self::parse(source.as_ref()))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Equivalent of `Element.matches(selector)`.
    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches(document, node))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Selector::parse(&raw).map_err(serde::de::Error::custom)
    }
}

enum Simple {
    Id(String),
    Class(String),
    Attribute(AttributeSelector),
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == '-'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    ))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
    ))(input)
}

fn attribute_value(input: &str) -> IResult<&str, &str> {
    alt((
        quoted,
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    ))(input)
}

fn attribute_operator(input: &str) -> IResult<&str, &str> {
    alt((tag("^="), tag("$="), tag("*="), tag("~="), tag("=")))(input)
}

fn attribute(input: &str) -> IResult<&str, AttributeSelector> {
    let (input, _) = pair(char('['), multispace0)(input)?;
    let (input, name) = ident(input)?;
    let (input, _) = multispace0(input)?;
    let (input, comparison) = opt(pair(
        attribute_operator,
        preceded(multispace0, attribute_value),
    ))(input)?;
    let (input, _) = pair(multispace0, char(']'))(input)?;

    let op = match comparison {
        None => AttributeOp::Exists,
        Some((op, raw)) => {
            let raw = raw.to_string();
            match op {
                "^=" => AttributeOp::Prefix(raw),
                "$=" => AttributeOp::Suffix(raw),
                "*=" => AttributeOp::Substring(raw),
                "~=" => AttributeOp::Includes(raw),
                _ => AttributeOp::Equals(raw),
            }
        }
    };
    Ok((
        input,
        AttributeSelector {
            name: name.to_ascii_lowercase(),
            op,
        },
    ))
}

fn simple(input: &str) -> IResult<&str, Simple> {
    alt((
        map(preceded(char('#'), ident), |id| Simple::Id(id.to_string())),
        map(preceded(char('.'), ident), |class| {
            Simple::Class(class.to_string())
        }),
        map(attribute, Simple::Attribute),
    ))(input)
}

fn type_selector(input: &str) -> IResult<&str, Option<String>> {
    alt((
        value(None, char('*')),
        map(ident, |name| Some(name.to_ascii_lowercase())),
    ))(input)
}

fn compound(input: &str) -> IResult<&str, Compound> {
    let (rest, (head, parts)) = pair(opt(type_selector), many0(simple))(input)?;
    if head.is_none() && parts.is_empty() {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify)));
    }

    let mut compound = Compound {
        tag: head.flatten(),
        ..Compound::default()
    };
    for part in parts {
        match part {
            Simple::Id(id) => compound.ids.push(id),
            Simple::Class(class) => compound.classes.push(class),
            Simple::Attribute(attr) => compound.attributes.push(attr),
        }
    }
    Ok((rest, compound))
}

fn combinator(input: &str) -> IResult<&str, Combinator> {
    alt((
        value(
            Combinator::Child,
            delimited(multispace0, char('>'), multispace0),
        ),
        value(Combinator::Descendant, multispace1),
    ))(input)
}

fn complex(input: &str) -> IResult<&str, Complex> {
    let (input, first) = compound(input)?;
    let (input, rest) = many0(pair(combinator, compound))(input)?;

    let mut compounds = vec![first];
    let mut combinators = Vec::with_capacity(rest.len());
    for (combinator, compound) in rest {
        combinators.push(combinator);
        compounds.push(compound);
    }
    Ok((
        input,
        Complex {
            compounds,
            combinators,
        },
    ))
}

fn selector_list(input: &str) -> IResult<&str, Vec<Complex>> {
    delimited(
        multispace0,
        separated_list1(delimited(multispace0, char(','), multispace0), complex),
        multispace0,
    )(input)
}
