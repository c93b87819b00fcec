//! The command registry: which commands each object type exposes.
//!
//! Object types do not scan anything at runtime; the whole surface is
//! declared up front by registration calls (see [`crate::commands`]) into a
//! [`Registry`] that is read-only once built.  Each entry couples a
//! [`CommandSpec`] (name, parameters, docstring) with the handler function
//! that implements it.
//!
//! Handlers are plain `fn` pointers written against [`CallContext`] and
//! [`BoundArgs`]: the dispatcher binds and coerces the incoming arguments
//! first, so a handler can rely on every declared parameter being present
//! and carrying its declared type.

use crate::object::{ObjectKind, Target};
use crate::state::ManagerState;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Coercion hint for one parameter.
///
/// Deliberately closed: these four tags are the whole vocabulary, and a
/// parameter without a tag passes its value through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Str,
    Bool,
    Float,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Int => write!(f, "int"),
            ParamType::Str => write!(f, "str"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::Float => write!(f, "float"),
        }
    }
}

/// One declared parameter of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub ty: Option<ParamType>,
    pub default: Option<Value>,
}

impl Param {
    /// A parameter the caller must supply.
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            ty: None,
            default: None,
        }
    }

    /// A parameter with a default used when the caller omits it.
    pub fn optional(name: &'static str, default: Value) -> Self {
        Self {
            name,
            ty: None,
            default: Some(default),
        }
    }

    /// Attach a coercion hint.
    pub fn typed(mut self, ty: ParamType) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// Immutable description of one registered command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub params: Vec<Param>,
    pub doc: &'static str,
}

impl CommandSpec {
    pub fn new(name: &'static str, params: Vec<Param>, doc: &'static str) -> Self {
        Self { name, params, doc }
    }

    /// Render the call signature, e.g. `resize(width: int, height: int)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = p.name.to_string();
                if let Some(ty) = p.ty {
                    s.push_str(&format!(": {}", ty));
                }
                if let Some(default) = &p.default {
                    s.push_str(&format!(" = {}", default));
                }
                s
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Signature plus docstring, the text the `doc` command returns.
    pub fn help(&self) -> String {
        if self.doc.is_empty() {
            self.signature()
        } else {
            format!("{}\n    {}", self.signature(), self.doc)
        }
    }
}

/// Failure raised by a command body.
///
/// The dispatcher reports it to the caller as an execution error; it never
/// escapes the connection boundary.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExecError(pub String);

impl ExecError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Arguments after binding and coercion, keyed by parameter name.
///
/// Every declared parameter is present: required ones were supplied by the
/// caller, optional ones fall back to their default.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    values: HashMap<String, Value>,
}

impl BoundArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The string value of `name`.
    pub fn str_arg(&self, name: &str) -> Result<&str, ExecError> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s),
            other => Err(ExecError::new(format!(
                "argument {:?} is not a string: {:?}",
                name, other
            ))),
        }
    }

    /// The integer value of `name`.
    pub fn int_arg(&self, name: &str) -> Result<i64, ExecError> {
        match self.values.get(name).and_then(Value::as_i64) {
            Some(n) => Ok(n),
            None => Err(ExecError::new(format!(
                "argument {:?} is not an integer",
                name
            ))),
        }
    }

    /// The float value of `name`.
    pub fn float_arg(&self, name: &str) -> Result<f64, ExecError> {
        match self.values.get(name).and_then(Value::as_f64) {
            Some(n) => Ok(n),
            None => Err(ExecError::new(format!("argument {:?} is not a number", name))),
        }
    }

    /// The boolean value of `name`.
    pub fn bool_arg(&self, name: &str) -> Result<bool, ExecError> {
        match self.values.get(name).and_then(Value::as_bool) {
            Some(b) => Ok(b),
            None => Err(ExecError::new(format!(
                "argument {:?} is not a boolean",
                name
            ))),
        }
    }

    /// The integer value of `name`, with JSON `null` (or absence) as `None`.
    pub fn opt_int_arg(&self, name: &str) -> Result<Option<i64>, ExecError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                ExecError::new(format!("argument {:?} is not an integer", name))
            }),
        }
    }
}

/// Everything a handler may touch: the live state, the registry it was
/// looked up in (for introspection commands), and the resolved target.
pub struct CallContext<'a> {
    pub state: &'a mut ManagerState,
    pub registry: &'a Registry,
    pub target: &'a Target,
}

/// A command implementation.
pub type Handler = fn(&mut CallContext<'_>, &BoundArgs) -> Result<Value, ExecError>;

/// One registered command: its spec plus its implementation.
pub struct CommandEntry {
    pub spec: CommandSpec,
    pub handler: Handler,
}

/// Error raised while building the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate command {command:?} on object type {kind}")]
    Duplicate {
        kind: ObjectKind,
        command: &'static str,
    },
}

/// The process-wide command table: {object type → {name → entry}}.
///
/// Built once at startup and never mutated afterwards.
#[derive(Default)]
pub struct Registry {
    table: HashMap<ObjectKind, BTreeMap<&'static str, CommandEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `spec` with its `handler` on `kind`.
    ///
    /// Two commands with the same name on one type is a configuration
    /// mistake and fails here, at build time, not at call time.
    pub fn register(
        &mut self,
        kind: ObjectKind,
        spec: CommandSpec,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let commands = self.table.entry(kind).or_default();
        if commands.contains_key(spec.name) {
            return Err(RegistryError::Duplicate {
                kind,
                command: spec.name,
            });
        }
        commands.insert(spec.name, CommandEntry { spec, handler });
        Ok(())
    }

    /// Look up a command on an object type.
    pub fn lookup(&self, kind: ObjectKind, name: &str) -> Option<&CommandEntry> {
        self.table.get(&kind)?.get(name)
    }

    /// Sorted command names exposed by an object type.
    pub fn names(&self, kind: ObjectKind) -> Vec<String> {
        self.table
            .get(&kind)
            .map(|commands| commands.keys().map(|n| n.to_string()).collect())
            .unwrap_or_default()
    }

    /// Documentation text for one command, if registered.
    pub fn doc(&self, kind: ObjectKind, name: &str) -> Option<String> {
        self.lookup(kind, name).map(|entry| entry.spec.help())
    }
}
