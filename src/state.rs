//! The live object graph the command interface operates on.
//!
//! [`ManagerState`] owns everything a request can address: screens with
//! their bars and widgets, groups with their layouts, and the windows
//! currently managed, together with the focus bookkeeping that "current
//! window/group/screen" resolution depends on.
//!
//! The display-server integration is out of scope here; it drives this
//! state through the same mutation methods the built-in commands use
//! ([`manage`](ManagerState::manage), [`focus_window`](ManagerState::focus_window),
//! [`kill_window`](ManagerState::kill_window), ...).  Process launching goes
//! through the [`Launcher`] trait so tests can substitute a recorder.

use crate::config::Config;
use crate::keys::KeyEntry;
use crate::object::Edge;
use log::debug;
use std::collections::BTreeMap;

/// A managed window.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: u64,
    pub name: String,
    /// Name of the group the window belongs to.
    pub group: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A named widget hosted by a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub name: String,
    pub text: String,
}

/// A bar attached to one screen edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub position: Edge,
    /// Thickness in pixels.
    pub size: u32,
    pub widgets: Vec<Widget>,
}

impl Bar {
    /// Rendered size as `(width, height)` for a screen of the given
    /// dimensions: horizontal bars span the screen width, vertical bars the
    /// screen height.
    pub fn geometry(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        match self.position {
            Edge::Top | Edge::Bottom => (screen_width, self.size),
            Edge::Left | Edge::Right => (self.size, screen_height),
        }
    }
}

/// One screen of the virtual desktop.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Name of the group currently shown, if any.
    pub group: Option<String>,
    /// Bars keyed by edge; iteration order is top, bottom, left, right.
    pub bars: BTreeMap<Edge, Bar>,
}

/// A layout instance owned by a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub name: String,
}

/// A workspace group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub layouts: Vec<Layout>,
    /// Index into `layouts` of the active layout.
    pub current_layout: usize,
    /// Index of the screen the group is shown on, if visible.
    pub screen: Option<usize>,
    /// Window ids in stacking order, oldest first.
    pub windows: Vec<u64>,
    /// Id of the window holding focus within this group.
    pub focus: Option<u64>,
}

/// Errors from state mutations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no such window: {0}")]
    UnknownWindow(u64),
    #[error("no such group: {0:?}")]
    UnknownGroup(String),
    #[error("no such screen: {0}")]
    UnknownScreen(usize),
    #[error("no group on the current screen")]
    NoCurrentGroup,
}

/// Starts external processes on behalf of commands.
///
/// The daemon uses [`ShellLauncher`]; tests substitute a recorder so no
/// real process is ever spawned.
pub trait Launcher: Send {
    /// Start `argv` without waiting for it; returns the child's pid.
    fn launch(&mut self, argv: &[String]) -> std::io::Result<u32>;
}

/// Launches real processes via [`std::process::Command`].
///
/// The child is deliberately not waited on; commands must never block on
/// the processes they start.
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn launch(&mut self, argv: &[String]) -> std::io::Result<u32> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;
        let child = std::process::Command::new(program).args(args).spawn()?;
        Ok(child.id())
    }
}

/// The complete mutable state of the manager.
///
/// Invariants kept by the mutation methods: every window id in a group's
/// `windows` exists in the window map and names that group as its owner; a
/// group's `screen` and the screen's `group` always agree; there is always
/// at least one screen and `current_screen` indexes it.
pub struct ManagerState {
    screens: Vec<Screen>,
    groups: Vec<Group>,
    windows: BTreeMap<u64, Window>,
    /// Id of the globally focused window.
    focused: Option<u64>,
    current_screen: usize,
    keys: Vec<KeyEntry>,
    next_window_id: u64,
    launcher: Box<dyn Launcher>,
}

impl ManagerState {
    /// Build the initial state from `config`, launching real processes.
    pub fn from_config(config: &Config) -> Self {
        Self::with_launcher(config, Box::new(ShellLauncher))
    }

    /// Build the initial state from `config` with a custom [`Launcher`].
    ///
    /// Each group receives one layout instance per configured layout name;
    /// the first groups are attached to the configured screens in order.
    pub fn with_launcher(config: &Config, launcher: Box<dyn Launcher>) -> Self {
        let mut screens: Vec<Screen> = config
            .screens
            .iter()
            .enumerate()
            .map(|(index, sc)| Screen {
                index,
                x: sc.x,
                y: sc.y,
                width: sc.width,
                height: sc.height,
                group: None,
                bars: sc
                    .bars
                    .iter()
                    .map(|(edge, bc)| {
                        (
                            *edge,
                            Bar {
                                position: *edge,
                                size: bc.size,
                                widgets: bc
                                    .widgets
                                    .iter()
                                    .map(|w| Widget {
                                        name: w.name.clone(),
                                        text: w.text.clone(),
                                    })
                                    .collect(),
                            },
                        )
                    })
                    .collect(),
            })
            .collect();
        // There is always at least one screen to resolve against.
        if screens.is_empty() {
            screens.push(Screen {
                index: 0,
                x: 0,
                y: 0,
                width: 800,
                height: 600,
                group: None,
                bars: BTreeMap::new(),
            });
        }

        let mut groups: Vec<Group> = config
            .groups
            .iter()
            .map(|name| Group {
                name: name.clone(),
                layouts: config
                    .layouts
                    .iter()
                    .map(|l| Layout { name: l.clone() })
                    .collect(),
                current_layout: 0,
                screen: None,
                windows: Vec::new(),
                focus: None,
            })
            .collect();

        for i in 0..groups.len().min(screens.len()) {
            groups[i].screen = Some(i);
            screens[i].group = Some(groups[i].name.clone());
        }

        Self {
            screens,
            groups,
            windows: BTreeMap::new(),
            focused: None,
            current_screen: 0,
            keys: config.keys.clone(),
            next_window_id: 1,
            launcher,
        }
    }

    //  Accessors

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn screen(&self, index: usize) -> Option<&Screen> {
        self.screens.get(index)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Position of a group in the configured group order.
    pub fn group_position(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// All managed windows in id order.
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    pub fn window(&self, id: u64) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn window_mut(&mut self, id: u64) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    /// First window (in id order) with the given name.
    pub fn window_by_name(&self, name: &str) -> Option<&Window> {
        self.windows.values().find(|w| w.name == name)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn widget(&self, screen: usize, edge: Edge, index: usize) -> Option<&Widget> {
        self.screens.get(screen)?.bars.get(&edge)?.widgets.get(index)
    }

    pub fn widget_mut(&mut self, screen: usize, edge: Edge, index: usize) -> Option<&mut Widget> {
        self.screens
            .get_mut(screen)?
            .bars
            .get_mut(&edge)?
            .widgets
            .get_mut(index)
    }

    /// The configured key-binding tree.
    pub fn keys(&self) -> &[KeyEntry] {
        &self.keys
    }

    //  Focus state

    /// The globally focused window, if any.
    pub fn focused_window(&self) -> Option<&Window> {
        self.focused.and_then(|id| self.windows.get(&id))
    }

    pub fn current_screen_index(&self) -> usize {
        self.current_screen
    }

    /// The screen holding focus.  Screens are never empty, see the type
    /// invariants.
    pub fn current_screen(&self) -> &Screen {
        &self.screens[self.current_screen]
    }

    /// The group shown on the current screen, if any.
    pub fn current_group(&self) -> Option<&Group> {
        self.current_screen()
            .group
            .as_deref()
            .and_then(|name| self.group(name))
    }

    //  Mutations

    /// Start managing a window named `name` on the current group and focus
    /// it.  Returns the new window's id.
    pub fn manage(&mut self, name: &str) -> Result<u64, StateError> {
        let (group_name, x, y, width, height) = {
            let screen = self.current_screen();
            let group = screen.group.clone().ok_or(StateError::NoCurrentGroup)?;
            (group, screen.x, screen.y, screen.width, screen.height)
        };
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.windows.insert(
            id,
            Window {
                id,
                name: name.to_string(),
                group: group_name.clone(),
                x,
                y,
                width,
                height,
            },
        );
        if let Some(group) = self.group_mut(&group_name) {
            group.windows.push(id);
            group.focus = Some(id);
        }
        self.focused = Some(id);
        debug!("managing window {} ({:?}) on group {}", id, name, group_name);
        Ok(id)
    }

    /// Focus a window, following it to its group's screen when visible.
    pub fn focus_window(&mut self, id: u64) -> Result<(), StateError> {
        let group_name = self
            .windows
            .get(&id)
            .ok_or(StateError::UnknownWindow(id))?
            .group
            .clone();
        self.focused = Some(id);
        let screen = self.group(&group_name).and_then(|g| g.screen);
        if let Some(group) = self.group_mut(&group_name) {
            group.focus = Some(id);
        }
        if let Some(screen) = screen {
            self.current_screen = screen;
        }
        Ok(())
    }

    /// Stop managing a window.  Focus falls back to the youngest remaining
    /// window of its group.
    pub fn kill_window(&mut self, id: u64) -> Result<(), StateError> {
        let window = self
            .windows
            .remove(&id)
            .ok_or(StateError::UnknownWindow(id))?;
        if let Some(group) = self.group_mut(&window.group) {
            group.windows.retain(|w| *w != id);
            if group.focus == Some(id) {
                group.focus = group.windows.last().copied();
            }
        }
        if self.focused == Some(id) {
            self.focused = self.group(&window.group).and_then(|g| g.focus);
        }
        debug!("window {} ({:?}) unmanaged", id, window.name);
        Ok(())
    }

    /// Move a window to another group and focus it there.
    pub fn move_window_to_group(&mut self, id: u64, dest: &str) -> Result<(), StateError> {
        if self.group(dest).is_none() {
            return Err(StateError::UnknownGroup(dest.to_string()));
        }
        let old = self
            .windows
            .get(&id)
            .ok_or(StateError::UnknownWindow(id))?
            .group
            .clone();
        if old == dest {
            return Ok(());
        }
        if let Some(group) = self.group_mut(&old) {
            group.windows.retain(|w| *w != id);
            if group.focus == Some(id) {
                group.focus = group.windows.last().copied();
            }
        }
        if let Some(window) = self.windows.get_mut(&id) {
            window.group = dest.to_string();
        }
        if let Some(group) = self.group_mut(dest) {
            group.windows.push(id);
            group.focus = Some(id);
        }
        Ok(())
    }

    /// Show a group on a screen.
    ///
    /// The group previously shown there takes the vacated screen when the
    /// moved group was visible elsewhere, and is hidden otherwise.
    pub fn show_group_on_screen(&mut self, name: &str, screen: usize) -> Result<(), StateError> {
        if screen >= self.screens.len() {
            return Err(StateError::UnknownScreen(screen));
        }
        let moved_from = self
            .group(name)
            .ok_or_else(|| StateError::UnknownGroup(name.to_string()))?
            .screen;
        if moved_from == Some(screen) {
            return Ok(());
        }
        let displaced = self.screens[screen].group.clone();

        self.screens[screen].group = Some(name.to_string());
        if let Some(group) = self.group_mut(name) {
            group.screen = Some(screen);
        }

        match (moved_from, displaced) {
            (Some(vacated), Some(displaced)) => {
                self.screens[vacated].group = Some(displaced.clone());
                if let Some(group) = self.group_mut(&displaced) {
                    group.screen = Some(vacated);
                }
            }
            (Some(vacated), None) => {
                self.screens[vacated].group = None;
            }
            (None, Some(displaced)) => {
                if let Some(group) = self.group_mut(&displaced) {
                    group.screen = None;
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Start an external process through the configured launcher.
    pub fn launch(&mut self, argv: &[String]) -> std::io::Result<u32> {
        self.launcher.launch(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn test_config() -> Config {
        serde_json::from_str(
            r#"{
            "groups": ["a", "b", "c"],
            "layouts": ["stack", "stack", "stack"],
            "screens": [
                {"x": 0, "y": 0, "width": 800, "height": 600,
                 "bars": {"bottom": {"size": 20, "widgets": [{"name": "one"}]}}},
                {"x": 800, "y": 0, "width": 640, "height": 480,
                 "bars": {"bottom": {"size": 20, "widgets": [{"name": "two"}]}}}
            ]
        }"#,
        )
        .unwrap()
    }

    fn test_state() -> ManagerState {
        ManagerState::from_config(&test_config())
    }

    /// A [`Launcher`] that records what it was asked to start.
    struct RecordingLauncher {
        log: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl Launcher for RecordingLauncher {
        fn launch(&mut self, argv: &[String]) -> std::io::Result<u32> {
            self.log.lock().unwrap().push(argv.to_vec());
            Ok(4242)
        }
    }

    #[test]
    fn groups_attach_to_screens_in_order() {
        let state = test_state();
        assert_eq!(state.screens().len(), 2);
        assert_eq!(state.screen(0).unwrap().group.as_deref(), Some("a"));
        assert_eq!(state.screen(1).unwrap().group.as_deref(), Some("b"));
        assert_eq!(state.group("a").unwrap().screen, Some(0));
        assert_eq!(state.group("b").unwrap().screen, Some(1));
        assert_eq!(state.group("c").unwrap().screen, None);
        assert_eq!(state.current_screen_index(), 0);
        assert_eq!(state.current_group().unwrap().name, "a");
    }

    #[test]
    fn each_group_gets_its_own_layout_instances() {
        let state = test_state();
        for group in state.groups() {
            assert_eq!(group.layouts.len(), 3);
            assert!(group.layouts.iter().all(|l| l.name == "stack"));
            assert_eq!(group.current_layout, 0);
        }
    }

    #[test]
    fn empty_screen_config_still_yields_one_screen() {
        let config: Config = serde_json::from_str(r#"{"screens": []}"#).unwrap();
        let state = ManagerState::from_config(&config);
        assert_eq!(state.screens().len(), 1);
        assert_eq!(state.current_screen().width, 800);
    }

    #[test]
    fn manage_focuses_the_new_window() {
        let mut state = test_state();
        let id = state.manage("foo").unwrap();
        assert_eq!(id, 1);

        let window = state.window(id).unwrap();
        assert_eq!(window.name, "foo");
        assert_eq!(window.group, "a");
        assert_eq!((window.width, window.height), (800, 600));

        assert_eq!(state.focused_window().unwrap().id, id);
        assert_eq!(state.group("a").unwrap().focus, Some(id));
        assert_eq!(state.group("a").unwrap().windows, vec![id]);
    }

    #[test]
    fn focus_follows_window_to_its_screen() {
        let mut state = test_state();
        let foo = state.manage("foo").unwrap();

        // Put a second window on group b by focusing screen 1's group.
        state.show_group_on_screen("b", 0).unwrap();
        let bar = state.manage("bar").unwrap();
        assert_eq!(state.window(bar).unwrap().group, "b");

        state.focus_window(foo).unwrap();
        assert_eq!(state.focused_window().unwrap().name, "foo");
        // Group a was displaced to screen 1 by the swap above.
        assert_eq!(state.current_screen_index(), 1);
    }

    #[test]
    fn kill_window_falls_back_to_previous_focus() {
        let mut state = test_state();
        let first = state.manage("first").unwrap();
        let second = state.manage("second").unwrap();
        assert_eq!(state.focused_window().unwrap().id, second);

        state.kill_window(second).unwrap();
        assert_eq!(state.focused_window().unwrap().id, first);
        assert_eq!(state.group("a").unwrap().windows, vec![first]);

        state.kill_window(first).unwrap();
        assert!(state.focused_window().is_none());
        assert!(matches!(
            state.kill_window(first),
            Err(StateError::UnknownWindow(_))
        ));
    }

    #[test]
    fn move_window_to_group_updates_both_groups() {
        let mut state = test_state();
        let id = state.manage("foo").unwrap();
        state.move_window_to_group(id, "c").unwrap();

        assert_eq!(state.window(id).unwrap().group, "c");
        assert!(state.group("a").unwrap().windows.is_empty());
        assert_eq!(state.group("a").unwrap().focus, None);
        assert_eq!(state.group("c").unwrap().windows, vec![id]);
        assert_eq!(state.group("c").unwrap().focus, Some(id));

        assert!(matches!(
            state.move_window_to_group(id, "nope"),
            Err(StateError::UnknownGroup(_))
        ));
    }

    #[test]
    fn show_hidden_group_hides_the_displaced_one() {
        let mut state = test_state();
        state.show_group_on_screen("c", 0).unwrap();
        assert_eq!(state.screen(0).unwrap().group.as_deref(), Some("c"));
        assert_eq!(state.group("c").unwrap().screen, Some(0));
        assert_eq!(state.group("a").unwrap().screen, None);
    }

    #[test]
    fn show_visible_group_swaps_screens() {
        let mut state = test_state();
        state.show_group_on_screen("b", 0).unwrap();
        assert_eq!(state.screen(0).unwrap().group.as_deref(), Some("b"));
        assert_eq!(state.screen(1).unwrap().group.as_deref(), Some("a"));
        assert_eq!(state.group("a").unwrap().screen, Some(1));
        assert_eq!(state.group("b").unwrap().screen, Some(0));
    }

    #[test]
    fn launcher_is_used_for_spawning() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = ManagerState::with_launcher(
            &test_config(),
            Box::new(RecordingLauncher { log: log.clone() }),
        );
        let pid = state
            .launch(&["xterm".to_string(), "-e".to_string(), "top".to_string()])
            .unwrap();
        assert_eq!(pid, 4242);
        assert_eq!(log.lock().unwrap()[0], vec!["xterm", "-e", "top"]);
    }

    #[test]
    fn bar_geometry_follows_orientation() {
        let state = test_state();
        let bar = &state.screen(0).unwrap().bars[&Edge::Bottom];
        assert_eq!(bar.geometry(800, 600), (800, 20));

        let vertical = Bar {
            position: Edge::Left,
            size: 30,
            widgets: Vec::new(),
        };
        assert_eq!(vertical.geometry(800, 600), (30, 600));
    }
}
