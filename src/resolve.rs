//! Resolution of object paths to concrete targets.
//!
//! A request addresses an object by walking kind/selector segments from the
//! root, e.g. `group a` or `screen 1 bar bottom widget one`.  Each resolved
//! segment narrows a scope (which screen, which group) that later
//! selector-less segments fall back onto, so `layout` on its own means "the
//! active layout of the group holding focus" while `group b layout` means
//! b's.  An unscoped path starts from the live focus state.

use crate::object::{Edge, ObjectKind, PathSegment, Selector, Target};
use crate::state::ManagerState;

/// Why a path failed to resolve to an object.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("unknown object type: {0:?}")]
    UnknownKind(String),
    #[error("\"root\" is only valid at the start of a path")]
    MisplacedRoot,
    #[error("\"root\" takes no selector")]
    RootSelector,
    #[error("{0} requires a selector")]
    MissingSelector(ObjectKind),
    #[error("no {kind} matching {selector:?}")]
    UnknownSelector { kind: ObjectKind, selector: String },
    #[error("no current {0}")]
    NoCurrent(ObjectKind),
}

/// What the already-walked part of a path has narrowed resolution down to.
///
/// `narrowed` distinguishes "nothing walked yet, fall back to focus state"
/// from "walked into a context that genuinely has no screen or group".
#[derive(Debug, Default)]
struct Scope {
    narrowed: bool,
    screen: Option<usize>,
    group: Option<String>,
}

impl Scope {
    fn screen(&self, state: &ManagerState) -> Option<usize> {
        if self.narrowed {
            self.screen
        } else {
            Some(state.current_screen_index())
        }
    }

    fn group(&self, state: &ManagerState) -> Option<String> {
        if self.narrowed {
            self.group.clone()
        } else {
            state.current_group().map(|g| g.name.clone())
        }
    }
}

/// Resolve an object path against the current state.
///
/// The empty path addresses the root, as does an explicit leading `root`
/// segment.
pub fn resolve(state: &ManagerState, path: &[PathSegment]) -> Result<Target, ResolutionError> {
    let mut scope = Scope::default();
    let mut target = Target::Root;
    for (position, segment) in path.iter().enumerate() {
        let kind = ObjectKind::parse(&segment.kind)
            .ok_or_else(|| ResolutionError::UnknownKind(segment.kind.clone()))?;
        target = resolve_segment(state, &mut scope, kind, segment.selector.as_ref(), position)?;
    }
    Ok(target)
}

fn resolve_segment(
    state: &ManagerState,
    scope: &mut Scope,
    kind: ObjectKind,
    selector: Option<&Selector>,
    position: usize,
) -> Result<Target, ResolutionError> {
    // Materialized before any narrowing so the fallbacks below see the
    // pre-segment context.
    let effective_screen = scope.screen(state);
    let effective_group = scope.group(state);

    match kind {
        ObjectKind::Root => {
            if position != 0 {
                return Err(ResolutionError::MisplacedRoot);
            }
            if selector.is_some() {
                return Err(ResolutionError::RootSelector);
            }
            *scope = Scope::default();
            Ok(Target::Root)
        }

        ObjectKind::Window => {
            let id = match selector {
                Some(sel) => {
                    let name = sel.as_name();
                    let by_id = name
                        .trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|id| state.window(*id).is_some());
                    match by_id {
                        Some(id) => id,
                        None => state
                            .window_by_name(&name)
                            .map(|w| w.id)
                            .ok_or(ResolutionError::UnknownSelector { kind, selector: name })?,
                    }
                }
                None => {
                    let id = if scope.narrowed {
                        effective_group
                            .as_deref()
                            .and_then(|name| state.group(name))
                            .and_then(|g| g.focus)
                    } else {
                        state.focused_window().map(|w| w.id)
                    };
                    id.ok_or(ResolutionError::NoCurrent(ObjectKind::Window))?
                }
            };
            let group = state.window(id).map(|w| w.group.clone());
            scope.narrowed = true;
            scope.screen = group
                .as_deref()
                .and_then(|name| state.group(name))
                .and_then(|g| g.screen);
            scope.group = group;
            Ok(Target::Window(id))
        }

        ObjectKind::Group => {
            let name = match selector {
                Some(sel) => {
                    let name = sel.as_name();
                    if state.group(&name).is_none() {
                        return Err(ResolutionError::UnknownSelector { kind, selector: name });
                    }
                    name
                }
                None => effective_group.ok_or(ResolutionError::NoCurrent(ObjectKind::Group))?,
            };
            scope.narrowed = true;
            scope.screen = state.group(&name).and_then(|g| g.screen);
            scope.group = Some(name.clone());
            Ok(Target::Group(name))
        }

        ObjectKind::Screen => {
            let index = match selector {
                Some(sel) => {
                    let index = sel.as_index().filter(|i| state.screen(*i).is_some());
                    index.ok_or_else(|| ResolutionError::UnknownSelector {
                        kind,
                        selector: sel.as_name(),
                    })?
                }
                None => {
                    effective_screen.ok_or(ResolutionError::NoCurrent(ObjectKind::Screen))?
                }
            };
            scope.narrowed = true;
            scope.screen = Some(index);
            scope.group = state.screen(index).and_then(|s| s.group.clone());
            Ok(Target::Screen(index))
        }

        ObjectKind::Bar => {
            let sel = selector.ok_or(ResolutionError::MissingSelector(ObjectKind::Bar))?;
            let name = sel.as_name();
            let edge = Edge::parse(&name).ok_or_else(|| ResolutionError::UnknownSelector {
                kind,
                selector: name.clone(),
            })?;
            let screen =
                effective_screen.ok_or(ResolutionError::NoCurrent(ObjectKind::Screen))?;
            let present = state
                .screen(screen)
                .map(|s| s.bars.contains_key(&edge))
                .unwrap_or(false);
            if !present {
                return Err(ResolutionError::UnknownSelector { kind, selector: name });
            }
            scope.narrowed = true;
            scope.screen = Some(screen);
            scope.group = effective_group;
            Ok(Target::Bar { screen, edge })
        }

        ObjectKind::Layout => {
            let group_name =
                effective_group.ok_or(ResolutionError::NoCurrent(ObjectKind::Group))?;
            let group = state
                .group(&group_name)
                .ok_or(ResolutionError::NoCurrent(ObjectKind::Group))?;
            let index = match selector {
                Some(sel) => {
                    let index = sel.as_index().filter(|i| *i < group.layouts.len());
                    index.ok_or_else(|| ResolutionError::UnknownSelector {
                        kind,
                        selector: sel.as_name(),
                    })?
                }
                None => group.current_layout,
            };
            scope.narrowed = true;
            scope.screen = group.screen.or(effective_screen);
            scope.group = Some(group_name.clone());
            Ok(Target::Layout {
                group: group_name,
                index,
            })
        }

        ObjectKind::Widget => {
            let sel = selector.ok_or(ResolutionError::MissingSelector(ObjectKind::Widget))?;
            let name = sel.as_name();
            // Scoped lookups search one screen; an unscoped `widget x` is a
            // global lookup across all bars.
            let screens: Vec<&crate::state::Screen> = if scope.narrowed {
                scope
                    .screen
                    .and_then(|i| state.screen(i))
                    .into_iter()
                    .collect()
            } else {
                state.screens().iter().collect()
            };
            for screen in screens {
                for (edge, bar) in &screen.bars {
                    if let Some(index) = bar.widgets.iter().position(|w| w.name == name) {
                        scope.narrowed = true;
                        scope.screen = Some(screen.index);
                        scope.group = screen.group.clone();
                        return Ok(Target::Widget {
                            screen: screen.index,
                            edge: *edge,
                            index,
                        });
                    }
                }
            }
            Err(ResolutionError::UnknownSelector { kind, selector: name })
        }
    }
}
