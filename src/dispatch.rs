//! Request dispatch: path resolution, argument binding and handler calls.
//!
//! A call travels resolve -> bind -> handler.  Everything that can go
//! wrong on the way is folded into [`CallError`] so the connection
//! boundary can answer with a structured error instead of dropping the
//! client.

use crate::ipc::{ErrorKind, Request, Response};
use crate::object::{ObjectKind, PathSegment, Target};
use crate::registry::{BoundArgs, CallContext, CommandSpec, Param, ParamType, Registry};
use crate::resolve::{resolve, ResolutionError};
use crate::state::ManagerState;
use log::{debug, warn};
use serde_json::{json, Map, Value};

/// Why a call failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("no command {command:?} on {kind}")]
    UnknownCommand { kind: ObjectKind, command: String },
    #[error("{0}")]
    BadArgument(String),
    #[error("{0}")]
    Execution(String),
    #[error("{0}")]
    Serialization(String),
}

impl CallError {
    /// The wire-level error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Resolution(_) => ErrorKind::Resolution,
            CallError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            CallError::BadArgument(_) => ErrorKind::BadArgument,
            CallError::Execution(_) => ErrorKind::Execution,
            CallError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Bind positional and keyword arguments against a command's parameters.
///
/// Typed parameters coerce compatible values (`"2"` binds to an int
/// parameter as `2`); anything incompatible is a [`CallError::BadArgument`].
/// Defaults of absent optional parameters are taken over untouched.
pub fn bind_args(
    spec: &CommandSpec,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<BoundArgs, CallError> {
    if args.len() > spec.params.len() {
        return Err(CallError::BadArgument(format!(
            "{} takes at most {} arguments, got {}",
            spec.name,
            spec.params.len(),
            args.len()
        )));
    }

    let mut bound = BoundArgs::new();
    for (param, value) in spec.params.iter().zip(args) {
        bound.set(param.name, coerce(spec, param, value)?);
    }

    for (key, value) in kwargs {
        let param = spec
            .params
            .iter()
            .find(|p| p.name == key)
            .ok_or_else(|| {
                CallError::BadArgument(format!("unknown argument {:?} for {}", key, spec.name))
            })?;
        if bound.contains(key) {
            return Err(CallError::BadArgument(format!(
                "argument {:?} of {} given both positionally and by keyword",
                key, spec.name
            )));
        }
        bound.set(param.name, coerce(spec, param, value)?);
    }

    for param in &spec.params {
        if !bound.contains(param.name) {
            match &param.default {
                Some(default) => bound.set(param.name, default.clone()),
                None => {
                    return Err(CallError::BadArgument(format!(
                        "missing required argument {:?} for {}",
                        param.name, spec.name
                    )))
                }
            }
        }
    }
    Ok(bound)
}

fn coerce(spec: &CommandSpec, param: &Param, value: &Value) -> Result<Value, CallError> {
    let Some(ty) = param.ty else {
        return Ok(value.clone());
    };
    match ty {
        ParamType::Int => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(json!(f as i64)),
                _ => Err(mismatch(spec, param, ty, value)),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| mismatch(spec, param, ty, value)),
            _ => Err(mismatch(spec, param, ty, value)),
        },
        ParamType::Float => {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            // NaN and infinities have no JSON representation and are
            // rejected along with everything non-numeric.
            match parsed.and_then(serde_json::Number::from_f64) {
                Some(n) => Ok(Value::Number(n)),
                None => Err(mismatch(spec, param, ty, value)),
            }
        }
        ParamType::Str => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(json!(n.to_string())),
            Value::Bool(b) => Ok(json!(b.to_string())),
            _ => Err(mismatch(spec, param, ty, value)),
        },
        ParamType::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(json!(false)),
                Some(1) => Ok(json!(true)),
                _ => Err(mismatch(spec, param, ty, value)),
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(json!(true)),
                "false" | "0" => Ok(json!(false)),
                _ => Err(mismatch(spec, param, ty, value)),
            },
            _ => Err(mismatch(spec, param, ty, value)),
        },
    }
}

fn mismatch(spec: &CommandSpec, param: &Param, ty: ParamType, value: &Value) -> CallError {
    CallError::BadArgument(format!(
        "argument {:?} of {} expects {}, got {}",
        param.name, spec.name, ty, value
    ))
}

/// Look up and run `command` on an already resolved target.
pub fn invoke(
    state: &mut ManagerState,
    registry: &Registry,
    target: &Target,
    command: &str,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<Value, CallError> {
    let entry = registry
        .lookup(target.kind(), command)
        .ok_or_else(|| CallError::UnknownCommand {
            kind: target.kind(),
            command: command.to_string(),
        })?;
    let bound = bind_args(&entry.spec, args, kwargs)?;
    let mut ctx = CallContext {
        state,
        registry,
        target,
    };
    (entry.handler)(&mut ctx, &bound).map_err(|e| CallError::Execution(e.0))
}

/// The manager: the object graph plus the command registry over it.
///
/// Requests are handled strictly one at a time; the listener forwards
/// them over a channel and every mutation happens on the manager's
/// thread.
pub struct Manager {
    state: ManagerState,
    registry: Registry,
}

impl Manager {
    /// Wrap `state` with the built-in command set.
    pub fn new(state: ManagerState) -> Result<Self, crate::registry::RegistryError> {
        Ok(Self {
            state,
            registry: crate::commands::builtin_registry()?,
        })
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ManagerState {
        &mut self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve `path` and run `command` on the result.
    pub fn call(
        &mut self,
        path: &[PathSegment],
        command: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, CallError> {
        let target = resolve(&self.state, path)?;
        invoke(&mut self.state, &self.registry, &target, command, args, kwargs)
    }

    /// Handle one wire request, turning any failure into an error response.
    pub fn handle_request(&mut self, request: &Request) -> Response {
        debug!("dispatching {:?} on path {:?}", request.command, request.path);
        match self.call(
            &request.path,
            &request.command,
            &request.args,
            &request.kwargs,
        ) {
            Ok(payload) => Response::ok(payload),
            Err(e) => {
                warn!("request {:?} failed: {}", request.command, e);
                Response::error(e.kind(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::ExecError;

    fn resize_spec() -> CommandSpec {
        CommandSpec::new(
            "resize",
            vec![
                Param::required("width").typed(ParamType::Int),
                Param::optional("height", json!(600)).typed(ParamType::Int),
            ],
            "Resize something.",
        )
    }

    fn spec_with(ty: ParamType) -> CommandSpec {
        CommandSpec::new("probe", vec![Param::required("value").typed(ty)], "")
    }

    fn bind_one(ty: ParamType, value: Value) -> Result<Value, CallError> {
        let spec = spec_with(ty);
        let bound = bind_args(&spec, &[value], &Map::new())?;
        Ok(bound.get("value").cloned().unwrap_or(Value::Null))
    }

    #[test]
    fn positional_args_bind_in_order_and_defaults_fill_in() {
        let bound = bind_args(&resize_spec(), &[json!(800)], &Map::new()).unwrap();
        assert_eq!(bound.get("width"), Some(&json!(800)));
        assert_eq!(bound.get("height"), Some(&json!(600)));
    }

    #[test]
    fn keyword_strings_coerce_to_declared_types() {
        let mut kwargs = Map::new();
        kwargs.insert("width".to_string(), json!("2"));
        kwargs.insert("height".to_string(), json!("480"));
        let bound = bind_args(&resize_spec(), &[], &kwargs).unwrap();
        assert_eq!(bound.get("width"), Some(&json!(2)));
        assert_eq!(bound.get("height"), Some(&json!(480)));
    }

    #[test]
    fn int_coercion_accepts_integral_floats_only() {
        assert_eq!(bind_one(ParamType::Int, json!(3.0)).unwrap(), json!(3));
        assert!(matches!(
            bind_one(ParamType::Int, json!(2.5)),
            Err(CallError::BadArgument(_))
        ));
        assert!(matches!(
            bind_one(ParamType::Int, json!("abc")),
            Err(CallError::BadArgument(_))
        ));
    }

    #[test]
    fn float_coercion_parses_strings() {
        assert_eq!(bind_one(ParamType::Float, json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(bind_one(ParamType::Float, json!(4)).unwrap(), json!(4.0));
        assert!(matches!(
            bind_one(ParamType::Float, json!("NaN")),
            Err(CallError::BadArgument(_))
        ));
    }

    #[test]
    fn str_coercion_stringifies_scalars() {
        assert_eq!(bind_one(ParamType::Str, json!(7)).unwrap(), json!("7"));
        assert_eq!(
            bind_one(ParamType::Str, json!(true)).unwrap(),
            json!("true")
        );
        assert!(matches!(
            bind_one(ParamType::Str, json!([1])),
            Err(CallError::BadArgument(_))
        ));
    }

    #[test]
    fn bool_coercion_is_strict() {
        assert_eq!(bind_one(ParamType::Bool, json!(1)).unwrap(), json!(true));
        assert_eq!(bind_one(ParamType::Bool, json!(0)).unwrap(), json!(false));
        assert_eq!(
            bind_one(ParamType::Bool, json!("TRUE")).unwrap(),
            json!(true)
        );
        assert_eq!(
            bind_one(ParamType::Bool, json!("false")).unwrap(),
            json!(false)
        );
        assert!(matches!(
            bind_one(ParamType::Bool, json!("yes")),
            Err(CallError::BadArgument(_))
        ));
        assert!(matches!(
            bind_one(ParamType::Bool, json!(2)),
            Err(CallError::BadArgument(_))
        ));
    }

    #[test]
    fn binding_rejects_unknown_excess_and_duplicate_arguments() {
        let spec = resize_spec();

        let mut unknown = Map::new();
        unknown.insert("depth".to_string(), json!(1));
        assert!(matches!(
            bind_args(&spec, &[], &unknown),
            Err(CallError::BadArgument(_))
        ));

        assert!(matches!(
            bind_args(&spec, &[json!(1), json!(2), json!(3)], &Map::new()),
            Err(CallError::BadArgument(_))
        ));

        let mut duplicate = Map::new();
        duplicate.insert("width".to_string(), json!(2));
        assert!(matches!(
            bind_args(&spec, &[json!(1)], &duplicate),
            Err(CallError::BadArgument(_))
        ));

        assert!(matches!(
            bind_args(&spec, &[], &Map::new()),
            Err(CallError::BadArgument(_))
        ));
    }

    fn whoami(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
        Ok(json!(ctx.target.kind().to_string()))
    }

    fn boom(_: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
        Err(ExecError::new("boom"))
    }

    fn test_state() -> ManagerState {
        let config: Config = serde_json::from_str(r#"{"groups": ["a", "b"]}"#).unwrap();
        ManagerState::from_config(&config)
    }

    #[test]
    fn invoke_runs_the_handler_for_the_target_kind() {
        let mut registry = Registry::new();
        registry
            .register(
                ObjectKind::Root,
                CommandSpec::new("whoami", Vec::new(), ""),
                whoami,
            )
            .unwrap();
        let mut state = test_state();
        let result = invoke(
            &mut state,
            &registry,
            &Target::Root,
            "whoami",
            &[],
            &Map::new(),
        )
        .unwrap();
        assert_eq!(result, json!("root"));
    }

    #[test]
    fn handler_failures_surface_as_execution_errors() {
        let mut registry = Registry::new();
        registry
            .register(ObjectKind::Root, CommandSpec::new("boom", Vec::new(), ""), boom)
            .unwrap();
        let mut state = test_state();
        let err = invoke(
            &mut state,
            &registry,
            &Target::Root,
            "boom",
            &[],
            &Map::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CallError::Execution(ref msg) if msg == "boom"));
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn unknown_commands_name_the_object_type() {
        let registry = Registry::new();
        let mut state = test_state();
        let err = invoke(
            &mut state,
            &registry,
            &Target::Root,
            "nope",
            &[],
            &Map::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
        assert_eq!(err.to_string(), "no command \"nope\" on root");
    }

    #[test]
    fn manager_maps_failures_to_wire_error_kinds() {
        let mut manager = Manager::new(test_state()).unwrap();

        let ok = manager.handle_request(&Request::new(Vec::new(), "status"));
        assert!(ok.success);
        assert_eq!(ok.payload, json!("OK"));

        let unknown = manager.handle_request(&Request::new(Vec::new(), "frobnicate"));
        assert!(!unknown.success);
        assert_eq!(
            unknown.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::UnknownCommand)
        );

        let mut bad_path = Request::new(Vec::new(), "status");
        bad_path.path = vec![PathSegment {
            kind: "sandwich".to_string(),
            selector: None,
        }];
        let resolution = manager.handle_request(&bad_path);
        assert_eq!(
            resolution.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Resolution)
        );
    }
}
