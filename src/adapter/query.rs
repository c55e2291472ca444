//! Typed selector pipelines. A [Query] is an ordered list of [Step]s evaluated from the document
//! root; each step takes a single node, a node list, or text and hands its result to the next.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Descendants matching a CSS selector (node or node list -> node list).
    Css(&'static str),
    /// Parent element (node -> node, node list -> node list).
    Parent,
    /// Child elements (node -> node list).
    Children,
    /// First of a node list (node list -> node). Fails on an empty list.
    First,
    /// Last of a node list (node list -> node). Fails on an empty list.
    Last,
    /// Whitespace-collapsed text content (node -> text).
    Text,
    /// Attribute value (node -> text). Fails when the attribute is absent.
    Attr(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query(pub &'static [Step]);

#[derive(Debug, Clone)]
pub enum Matched<'a> {
    Node(ElementRef<'a>),
    Nodes(Vec<ElementRef<'a>>),
    Text(String),
}

impl Matched<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Matched::Node(_) => "node",
            Matched::Nodes(_) => "node list",
            Matched::Text(_) => "text",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("no match at step {index} ({step:?})")]
    NoMatch { index: usize, step: Step },

    #[error("step {index} ({step:?}) cannot take a {found}")]
    StepType {
        index: usize,
        step: Step,
        found: &'static str,
    },
}

pub(crate) fn parse_selector(sel: &str) -> Result<Selector, QueryError> {
    Selector::parse(sel).map_err(|e| QueryError::InvalidSelector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

/// Text content of `el` with runs of whitespace collapsed to single spaces.
pub fn node_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Query {
    /// Run every step against `doc`, starting from its root element.
    pub fn eval<'a>(&self, doc: &'a Html) -> Result<Matched<'a>, QueryError> {
        let mut current = Matched::Node(doc.root_element());
        for (index, step) in self.0.iter().copied().enumerate() {
            current = apply(index, step, current)?;
        }
        Ok(current)
    }

    /// Evaluate to a node list. A single node becomes a one-element list; an empty list is fine.
    pub fn nodes<'a>(&self, doc: &'a Html) -> Result<Vec<ElementRef<'a>>, QueryError> {
        match self.eval(doc)? {
            Matched::Nodes(nodes) => Ok(nodes),
            Matched::Node(node) => Ok(vec![node]),
            found @ Matched::Text(_) => Err(self.type_error(&found)),
        }
    }

    /// Evaluate to exactly one node; a list yields its first element and fails when empty.
    pub fn node<'a>(&self, doc: &'a Html) -> Result<ElementRef<'a>, QueryError> {
        match self.eval(doc)? {
            Matched::Node(node) => Ok(node),
            Matched::Nodes(nodes) => nodes.into_iter().next().ok_or(self.no_match()),
            found @ Matched::Text(_) => Err(self.type_error(&found)),
        }
    }

    /// Evaluate to text; a node is reduced to its text content.
    pub fn text(&self, doc: &Html) -> Result<String, QueryError> {
        match self.eval(doc)? {
            Matched::Text(text) => Ok(text),
            Matched::Node(node) => Ok(node_text(node)),
            Matched::Nodes(nodes) => nodes
                .into_iter()
                .next()
                .map(node_text)
                .ok_or(self.no_match()),
        }
    }

    /// Text of every matched node.
    pub fn texts(&self, doc: &Html) -> Result<Vec<String>, QueryError> {
        match self.eval(doc)? {
            Matched::Text(text) => Ok(vec![text]),
            Matched::Node(node) => Ok(vec![node_text(node)]),
            Matched::Nodes(nodes) => Ok(nodes.into_iter().map(node_text).collect()),
        }
    }

    fn last_step(&self) -> (usize, Step) {
        let index = self.0.len().saturating_sub(1);
        (index, self.0.get(index).copied().unwrap_or(Step::Css("*")))
    }

    fn no_match(&self) -> QueryError {
        let (index, step) = self.last_step();
        QueryError::NoMatch { index, step }
    }

    fn type_error(&self, found: &Matched<'_>) -> QueryError {
        let (index, step) = self.last_step();
        QueryError::StepType {
            index,
            step,
            found: found.kind(),
        }
    }
}

fn apply<'a>(index: usize, step: Step, input: Matched<'a>) -> Result<Matched<'a>, QueryError> {
    let type_error = |found: &Matched<'_>| QueryError::StepType {
        index,
        step,
        found: found.kind(),
    };
    let no_match = QueryError::NoMatch { index, step };
    match (step, input) {
        (Step::Css(sel), Matched::Node(node)) => {
            let selector = parse_selector(sel)?;
            Ok(Matched::Nodes(node.select(&selector).collect()))
        }
        (Step::Css(sel), Matched::Nodes(nodes)) => {
            let selector = parse_selector(sel)?;
            let mut out: Vec<ElementRef<'a>> = Vec::new();
            for node in nodes {
                for found in node.select(&selector) {
                    if !out.iter().any(|seen| seen.id() == found.id()) {
                        out.push(found);
                    }
                }
            }
            Ok(Matched::Nodes(out))
        }
        (Step::Parent, Matched::Node(node)) => node
            .parent()
            .and_then(ElementRef::wrap)
            .map(Matched::Node)
            .ok_or(no_match),
        (Step::Parent, Matched::Nodes(nodes)) => Ok(Matched::Nodes(
            nodes
                .into_iter()
                .filter_map(|n| n.parent().and_then(ElementRef::wrap))
                .collect(),
        )),
        (Step::Children, Matched::Node(node)) => Ok(Matched::Nodes(
            node.children().filter_map(ElementRef::wrap).collect(),
        )),
        (Step::First, Matched::Nodes(nodes)) => {
            nodes.into_iter().next().map(Matched::Node).ok_or(no_match)
        }
        (Step::Last, Matched::Nodes(nodes)) => {
            nodes.into_iter().last().map(Matched::Node).ok_or(no_match)
        }
        (Step::First | Step::Last, node @ Matched::Node(_)) => Ok(node),
        (Step::Text, Matched::Node(node)) => Ok(Matched::Text(node_text(node))),
        (Step::Attr(name), Matched::Node(node)) => node
            .value()
            .attr(name)
            .map(|v| Matched::Text(v.trim().to_string()))
            .ok_or(no_match),
        (_, found) => Err(type_error(&found)),
    }
}

/// Treat a [QueryError::NoMatch] as an absent optional value.
pub trait OptionalMatch<T> {
    fn optional(self) -> Result<Option<T>, QueryError>;
}

impl<T> OptionalMatch<T> for Result<T, QueryError> {
    fn optional(self) -> Result<Option<T>, QueryError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(QueryError::NoMatch { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
