//! The built-in command set.
//!
//! Everything callable over the socket is registered here.  Every object
//! type carries the introspection trio `commands`, `doc` and `info`; the
//! rest of the surface is per type.  Handlers receive an already resolved
//! target plus bound arguments and answer with a JSON payload.

use crate::keys::display_keys;
use crate::object::{Edge, ObjectKind, Target};
use crate::registry::{
    BoundArgs, CallContext, CommandSpec, ExecError, Param, ParamType, Registry, RegistryError,
};
use crate::state::{ManagerState, StateError};
use serde_json::{json, Map, Value};

impl From<StateError> for ExecError {
    fn from(e: StateError) -> Self {
        ExecError::new(e.to_string())
    }
}

/// Build the registry with every built-in command.
pub fn builtin_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    register_common(&mut registry)?;
    register_root(&mut registry)?;
    register_window(&mut registry)?;
    register_group(&mut registry)?;
    register_screen(&mut registry)?;
    register_widget(&mut registry)?;
    Ok(registry)
}

fn register_common(registry: &mut Registry) -> Result<(), RegistryError> {
    for kind in ObjectKind::ALL {
        registry.register(
            kind,
            CommandSpec::new(
                "commands",
                Vec::new(),
                "List the commands available on this object.",
            ),
            commands_cmd,
        )?;
        registry.register(
            kind,
            CommandSpec::new(
                "doc",
                vec![Param::required("name").typed(ParamType::Str)],
                "Show the signature and documentation of one command.",
            ),
            doc_cmd,
        )?;
        registry.register(
            kind,
            CommandSpec::new("info", Vec::new(), "Describe this object."),
            info_cmd,
        )?;
    }
    Ok(())
}

fn register_root(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ObjectKind::Root,
        CommandSpec::new("status", Vec::new(), "Answer \"OK\" when the manager is alive."),
        root_status,
    )?;
    registry.register(
        ObjectKind::Root,
        CommandSpec::new(
            "spawn",
            vec![Param::required("cmd").typed(ParamType::Str)],
            "Start an external command line; returns the child's pid.",
        ),
        root_spawn,
    )?;
    registry.register(
        ObjectKind::Root,
        CommandSpec::new(
            "display_kb",
            Vec::new(),
            "Render the configured key bindings as a table.",
        ),
        root_display_kb,
    )?;
    registry.register(
        ObjectKind::Root,
        CommandSpec::new("windows", Vec::new(), "Describe every managed window."),
        root_windows,
    )?;
    registry.register(
        ObjectKind::Root,
        CommandSpec::new("groups", Vec::new(), "Describe every group, keyed by name."),
        root_groups,
    )?;
    registry.register(
        ObjectKind::Root,
        CommandSpec::new(
            "focus_window",
            vec![Param::required("id").typed(ParamType::Int)],
            "Focus the window with the given id.",
        ),
        root_focus_window,
    )?;
    registry.register(
        ObjectKind::Root,
        CommandSpec::new(
            "simulate_window",
            vec![Param::required("name").typed(ParamType::Str)],
            "Manage a synthetic window with the given name and focus it.",
        ),
        root_simulate_window,
    )?;
    Ok(())
}

fn register_window(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ObjectKind::Window,
        CommandSpec::new("focus", Vec::new(), "Focus this window."),
        window_focus,
    )?;
    registry.register(
        ObjectKind::Window,
        CommandSpec::new("kill", Vec::new(), "Stop managing this window."),
        window_kill,
    )?;
    registry.register(
        ObjectKind::Window,
        CommandSpec::new(
            "togroup",
            vec![Param::required("group").typed(ParamType::Str)],
            "Move this window to another group.",
        ),
        window_togroup,
    )?;
    registry.register(
        ObjectKind::Window,
        CommandSpec::new(
            "resize",
            vec![
                Param::required("width").typed(ParamType::Int),
                Param::required("height").typed(ParamType::Int),
            ],
            "Resize this window.",
        ),
        window_resize,
    )?;
    registry.register(
        ObjectKind::Window,
        CommandSpec::new(
            "set_name",
            vec![Param::required("name").typed(ParamType::Str)],
            "Rename this window.",
        ),
        window_set_name,
    )?;
    Ok(())
}

fn register_group(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ObjectKind::Group,
        CommandSpec::new(
            "toscreen",
            vec![Param::optional("screen", Value::Null).typed(ParamType::Int)],
            "Show this group on a screen (default: the current one).",
        ),
        group_toscreen,
    )?;
    registry.register(
        ObjectKind::Group,
        CommandSpec::new(
            "next_layout",
            Vec::new(),
            "Switch this group to its next layout; returns the new layout's name.",
        ),
        group_next_layout,
    )?;
    Ok(())
}

fn register_screen(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ObjectKind::Screen,
        CommandSpec::new(
            "next_group",
            Vec::new(),
            "Show the next group on this screen; returns the group's name.",
        ),
        screen_next_group,
    )?;
    registry.register(
        ObjectKind::Screen,
        CommandSpec::new(
            "prev_group",
            Vec::new(),
            "Show the previous group on this screen; returns the group's name.",
        ),
        screen_prev_group,
    )?;
    Ok(())
}

fn register_widget(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ObjectKind::Widget,
        CommandSpec::new(
            "set_text",
            vec![Param::required("text").typed(ParamType::Str)],
            "Replace the text shown by this widget.",
        ),
        widget_set_text,
    )?;
    Ok(())
}

//  Target extraction

fn foreign_target(target: &Target, wanted: ObjectKind) -> ExecError {
    ExecError::new(format!("command expects a {wanted} target, got {target}"))
}

fn window_target(ctx: &CallContext<'_>) -> Result<u64, ExecError> {
    match ctx.target {
        Target::Window(id) => Ok(*id),
        other => Err(foreign_target(other, ObjectKind::Window)),
    }
}

fn group_target(ctx: &CallContext<'_>) -> Result<String, ExecError> {
    match ctx.target {
        Target::Group(name) => Ok(name.clone()),
        other => Err(foreign_target(other, ObjectKind::Group)),
    }
}

fn screen_target(ctx: &CallContext<'_>) -> Result<usize, ExecError> {
    match ctx.target {
        Target::Screen(index) => Ok(*index),
        other => Err(foreign_target(other, ObjectKind::Screen)),
    }
}

fn widget_target(ctx: &CallContext<'_>) -> Result<(usize, Edge, usize), ExecError> {
    match ctx.target {
        Target::Widget {
            screen,
            edge,
            index,
        } => Ok((*screen, *edge, *index)),
        other => Err(foreign_target(other, ObjectKind::Widget)),
    }
}

fn missing_window(id: u64) -> ExecError {
    ExecError::new(format!("window {id} is gone"))
}

//  Introspection

fn commands_cmd(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    Ok(json!(ctx.registry.names(ctx.target.kind())))
}

fn doc_cmd(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let name = args.str_arg("name")?;
    let kind = ctx.target.kind();
    ctx.registry
        .doc(kind, name)
        .map(|help| json!(help))
        .ok_or_else(|| ExecError::new(format!("no command {name:?} on {kind}")))
}

fn info_cmd(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let state = &*ctx.state;
    match ctx.target {
        Target::Root => Ok(root_info(state)),
        Target::Window(id) => window_info(state, *id),
        Target::Group(name) => group_info(state, name),
        Target::Screen(index) => screen_info(state, *index),
        Target::Bar { screen, edge } => bar_info(state, *screen, *edge),
        Target::Layout { group, index } => layout_info(state, group, *index),
        Target::Widget {
            screen,
            edge,
            index,
        } => widget_info(state, *screen, *edge, *index),
    }
}

fn root_info(state: &ManagerState) -> Value {
    json!({
        "groups": state.groups().iter().map(|g| &g.name).collect::<Vec<_>>(),
        "screens": state.screens().len(),
        "windows": state.window_count(),
        "focused": state.focused_window().map(|w| w.name.clone()),
    })
}

fn window_info(state: &ManagerState, id: u64) -> Result<Value, ExecError> {
    let window = state.window(id).ok_or_else(|| missing_window(id))?;
    Ok(json!({
        "id": window.id,
        "name": window.name,
        "group": window.group,
        "x": window.x,
        "y": window.y,
        "width": window.width,
        "height": window.height,
    }))
}

fn group_info(state: &ManagerState, name: &str) -> Result<Value, ExecError> {
    let group = state
        .group(name)
        .ok_or_else(|| ExecError::new(format!("group {name:?} is gone")))?;
    let windows: Vec<&str> = group
        .windows
        .iter()
        .filter_map(|id| state.window(*id))
        .map(|w| w.name.as_str())
        .collect();
    let focus = group
        .focus
        .and_then(|id| state.window(id))
        .map(|w| w.name.clone());
    let layout = group.layouts.get(group.current_layout).map(|l| &l.name);
    Ok(json!({
        "name": group.name,
        "screen": group.screen,
        "layout": layout,
        "layouts": group.layouts.iter().map(|l| &l.name).collect::<Vec<_>>(),
        "focus": focus,
        "windows": windows,
    }))
}

fn screen_info(state: &ManagerState, index: usize) -> Result<Value, ExecError> {
    let screen = state
        .screen(index)
        .ok_or_else(|| ExecError::new(format!("screen {index} is gone")))?;
    Ok(json!({
        "index": screen.index,
        "x": screen.x,
        "y": screen.y,
        "width": screen.width,
        "height": screen.height,
    }))
}

fn bar_info(state: &ManagerState, screen: usize, edge: Edge) -> Result<Value, ExecError> {
    let screen = state
        .screen(screen)
        .ok_or_else(|| ExecError::new(format!("screen {screen} is gone")))?;
    let bar = screen
        .bars
        .get(&edge)
        .ok_or_else(|| ExecError::new(format!("no {edge} bar on screen {}", screen.index)))?;
    let (width, height) = bar.geometry(screen.width, screen.height);
    Ok(json!({
        "position": edge.to_string(),
        "size": bar.size,
        "width": width,
        "height": height,
        "widgets": bar.widgets.iter().map(|w| &w.name).collect::<Vec<_>>(),
    }))
}

fn layout_info(state: &ManagerState, group_name: &str, index: usize) -> Result<Value, ExecError> {
    let group = state
        .group(group_name)
        .ok_or_else(|| ExecError::new(format!("group {group_name:?} is gone")))?;
    let layout = group
        .layouts
        .get(index)
        .ok_or_else(|| ExecError::new(format!("group {group_name:?} has no layout {index}")))?;
    Ok(json!({
        "name": layout.name,
        "group": group.name,
        "index": index,
    }))
}

fn widget_info(
    state: &ManagerState,
    screen: usize,
    edge: Edge,
    index: usize,
) -> Result<Value, ExecError> {
    let widget = state
        .widget(screen, edge, index)
        .ok_or_else(|| ExecError::new("widget is gone"))?;
    Ok(json!({
        "name": widget.name,
        "bar": edge.to_string(),
        "screen": screen,
        "text": widget.text,
    }))
}

//  Root commands

fn root_status(_: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    Ok(json!("OK"))
}

fn root_spawn(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let cmd = args.str_arg("cmd")?;
    let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
    let pid = ctx
        .state
        .launch(&argv)
        .map_err(|e| ExecError::new(format!("spawn {cmd:?}: {e}")))?;
    Ok(json!(pid))
}

fn root_display_kb(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    Ok(json!(display_keys(ctx.state.keys())))
}

fn root_windows(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let state = &*ctx.state;
    let infos: Result<Vec<Value>, ExecError> = state
        .windows()
        .map(|w| window_info(state, w.id))
        .collect();
    Ok(Value::Array(infos?))
}

fn root_groups(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let state = &*ctx.state;
    let mut groups = Map::new();
    for group in state.groups() {
        groups.insert(group.name.clone(), group_info(state, &group.name)?);
    }
    Ok(Value::Object(groups))
}

fn root_focus_window(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let id = args.int_arg("id")?;
    let id =
        u64::try_from(id).map_err(|_| ExecError::new(format!("invalid window id: {id}")))?;
    ctx.state.focus_window(id)?;
    Ok(Value::Null)
}

fn root_simulate_window(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let name = args.str_arg("name")?.to_string();
    let id = ctx.state.manage(&name)?;
    Ok(json!(id))
}

//  Window commands

fn window_focus(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let id = window_target(ctx)?;
    ctx.state.focus_window(id)?;
    Ok(Value::Null)
}

fn window_kill(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let id = window_target(ctx)?;
    ctx.state.kill_window(id)?;
    Ok(Value::Null)
}

fn window_togroup(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let id = window_target(ctx)?;
    let group = args.str_arg("group")?.to_string();
    ctx.state.move_window_to_group(id, &group)?;
    Ok(Value::Null)
}

fn window_resize(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let id = window_target(ctx)?;
    let width = positive(args.int_arg("width")?, "width")?;
    let height = positive(args.int_arg("height")?, "height")?;
    let window = ctx.state.window_mut(id).ok_or_else(|| missing_window(id))?;
    window.width = width;
    window.height = height;
    Ok(Value::Null)
}

fn positive(value: i64, name: &str) -> Result<u32, ExecError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ExecError::new(format!("{name} must be a positive integer, got {value}")))
}

fn window_set_name(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let id = window_target(ctx)?;
    let name = args.str_arg("name")?.to_string();
    let window = ctx.state.window_mut(id).ok_or_else(|| missing_window(id))?;
    window.name = name;
    Ok(Value::Null)
}

//  Group commands

fn group_toscreen(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let name = group_target(ctx)?;
    let screen = match args.opt_int_arg("screen")? {
        Some(index) => usize::try_from(index)
            .map_err(|_| ExecError::new(format!("invalid screen index: {index}")))?,
        None => ctx.state.current_screen_index(),
    };
    ctx.state.show_group_on_screen(&name, screen)?;
    Ok(Value::Null)
}

fn group_next_layout(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let name = group_target(ctx)?;
    let group = ctx
        .state
        .group_mut(&name)
        .ok_or_else(|| ExecError::new(format!("group {name:?} is gone")))?;
    if group.layouts.is_empty() {
        return Err(ExecError::new(format!("group {name:?} has no layouts")));
    }
    let next = (group.current_layout + 1) % group.layouts.len();
    group.current_layout = next;
    Ok(json!(group.layouts[next].name))
}

//  Screen commands

fn screen_next_group(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let screen = screen_target(ctx)?;
    cycle_group(ctx.state, screen, 1)
}

fn screen_prev_group(ctx: &mut CallContext<'_>, _: &BoundArgs) -> Result<Value, ExecError> {
    let screen = screen_target(ctx)?;
    cycle_group(ctx.state, screen, -1)
}

/// Step through the configured group order relative to the group shown on
/// `screen` and show the neighbour there.
fn cycle_group(state: &mut ManagerState, screen: usize, step: i64) -> Result<Value, ExecError> {
    let count = state.groups().len();
    if count == 0 {
        return Err(ExecError::new("no groups configured"));
    }
    let position = state
        .screen(screen)
        .and_then(|s| s.group.as_deref())
        .and_then(|name| state.group_position(name))
        .unwrap_or(0);
    let next = (position as i64 + step).rem_euclid(count as i64) as usize;
    let name = state.groups()[next].name.clone();
    state.show_group_on_screen(&name, screen)?;
    Ok(json!(name))
}

//  Widget commands

fn widget_set_text(ctx: &mut CallContext<'_>, args: &BoundArgs) -> Result<Value, ExecError> {
    let (screen, edge, index) = widget_target(ctx)?;
    let text = args.str_arg("text")?.to_string();
    let widget = ctx
        .state
        .widget_mut(screen, edge, index)
        .ok_or_else(|| ExecError::new("widget is gone"))?;
    widget.text = text;
    Ok(Value::Null)
}
