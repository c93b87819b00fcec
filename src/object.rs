//! Object addressing types shared by the resolver, dispatcher and IPC layer.
//!
//! This module defines the vocabulary that all components agree on:
//! [`ObjectKind`] names the addressable object types, [`Selector`] narrows a
//! segment to one instance, [`PathSegment`] is the wire form of one path
//! step, and [`Target`] pins the concrete object a resolved path refers to.
//!
//! Selectors accept both JSON numbers and strings on the wire; the resolver
//! decides how a string selector is interpreted (id first, then name).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The addressable object types of the command graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Root,
    Window,
    Group,
    Screen,
    Bar,
    Layout,
    Widget,
}

impl ObjectKind {
    /// All kinds, in path-segment order.
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Root,
        ObjectKind::Window,
        ObjectKind::Group,
        ObjectKind::Screen,
        ObjectKind::Bar,
        ObjectKind::Layout,
        ObjectKind::Widget,
    ];

    /// Parse an object-type token (case-insensitive).
    pub fn parse(s: &str) -> Option<ObjectKind> {
        match s.trim().to_lowercase().as_str() {
            "root" => Some(ObjectKind::Root),
            "window" => Some(ObjectKind::Window),
            "group" => Some(ObjectKind::Group),
            "screen" => Some(ObjectKind::Screen),
            "bar" => Some(ObjectKind::Bar),
            "layout" => Some(ObjectKind::Layout),
            "widget" => Some(ObjectKind::Widget),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Root => write!(f, "root"),
            ObjectKind::Window => write!(f, "window"),
            ObjectKind::Group => write!(f, "group"),
            ObjectKind::Screen => write!(f, "screen"),
            ObjectKind::Bar => write!(f, "bar"),
            ObjectKind::Layout => write!(f, "layout"),
            ObjectKind::Widget => write!(f, "widget"),
        }
    }
}

/// A screen edge a bar can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    /// Parse an edge name (case-insensitive).
    pub fn parse(s: &str) -> Option<Edge> {
        match s.trim().to_lowercase().as_str() {
            "top" => Some(Edge::Top),
            "bottom" => Some(Edge::Bottom),
            "left" => Some(Edge::Left),
            "right" => Some(Edge::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Top => write!(f, "top"),
            Edge::Bottom => write!(f, "bottom"),
            Edge::Left => write!(f, "left"),
            Edge::Right => write!(f, "right"),
        }
    }
}

/// Wire format for a path selector: accepts a JSON number or string.
///
/// A string selector keeps its text form even when it looks numeric, so the
/// resolver can try it as an id or index first and fall back to a name
/// lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selector {
    Index(u64),
    Name(String),
}

impl Selector {
    /// Interpret the selector as a non-negative index if possible.
    ///
    /// Numeric-looking strings parse; everything else is `None`.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Selector::Index(n) => Some(*n as usize),
            Selector::Name(s) => s.trim().parse().ok(),
        }
    }

    /// Interpret the selector as a name.
    pub fn as_name(&self) -> String {
        match self {
            Selector::Index(n) => n.to_string(),
            Selector::Name(s) => s.clone(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(n) => write!(f, "{}", n),
            Selector::Name(s) => write!(f, "{}", s),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = Selector;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "non-negative integer or string")
            }
            fn visit_u64<E>(self, n: u64) -> Result<Selector, E> {
                Ok(Selector::Index(n))
            }
            fn visit_i64<E>(self, n: i64) -> Result<Selector, E>
            where
                E: DeError,
            {
                u64::try_from(n)
                    .map(Selector::Index)
                    .map_err(|_| DeError::custom("selector: expected a non-negative integer"))
            }
            fn visit_str<E>(self, s: &str) -> Result<Selector, E> {
                Ok(Selector::Name(s.to_string()))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// One step of an object path as it travels on the wire.
///
/// The kind is kept as a raw token so an unknown object type surfaces as a
/// resolution error instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
}

impl PathSegment {
    /// A segment addressing a kind with no selector.
    pub fn of(kind: ObjectKind) -> Self {
        Self {
            kind: kind.to_string(),
            selector: None,
        }
    }

    /// A segment addressing a kind with the given selector.
    pub fn with(kind: ObjectKind, selector: Selector) -> Self {
        Self {
            kind: kind.to_string(),
            selector: Some(selector),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Some(sel) => write!(f, "{} {}", self.kind, sel),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A resolved object path.
///
/// Pins the concrete instance a request addresses.  Targets are produced
/// fresh per request from live focus state and are only meaningful for the
/// request that resolved them.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Root,
    Window(u64),
    Group(String),
    Screen(usize),
    Bar { screen: usize, edge: Edge },
    Layout { group: String, index: usize },
    Widget { screen: usize, edge: Edge, index: usize },
}

impl Target {
    /// The object type this target addresses.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Target::Root => ObjectKind::Root,
            Target::Window(_) => ObjectKind::Window,
            Target::Group(_) => ObjectKind::Group,
            Target::Screen(_) => ObjectKind::Screen,
            Target::Bar { .. } => ObjectKind::Bar,
            Target::Layout { .. } => ObjectKind::Layout,
            Target::Widget { .. } => ObjectKind::Widget,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Root => write!(f, "root"),
            Target::Window(id) => write!(f, "window {}", id),
            Target::Group(name) => write!(f, "group {}", name),
            Target::Screen(index) => write!(f, "screen {}", index),
            Target::Bar { screen, edge } => write!(f, "bar {} on screen {}", edge, screen),
            Target::Layout { group, index } => write!(f, "layout {} of group {}", index, group),
            Target::Widget { screen, edge, index } => {
                write!(f, "widget {} in bar {} on screen {}", index, edge, screen)
            }
        }
    }
}
