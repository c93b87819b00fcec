//! Key-binding and chord tree, plus the `display_kb` table renderer.
//!
//! The tree is declarative data from the config file.  A [`KeyBinding`]
//! carries the command calls a key fires; a [`KeyChord`] opens a mode whose
//! children are themselves bindings or chords.  Input handling lives with
//! the display-server integration; this module only stores the tree and
//! renders it as an aligned text table:
//!
//! ```text
//! Mode      KeySym   Mod    Command          Desc
//! <root>    Return   mod4   spawn('xterm')
//! <root>    q        mod4                    Enter named mode
//! named     b               togroup('b')
//! ```
//!
//! Cells are left-justified to the widest value in their column and joined
//! by three spaces, so columns stay aligned however wide the content gets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mode label for rows bound outside any chord.
const ROOT_MODE: &str = "<root>";

/// Placeholder label for a chord configured without a mode name.
const UNNAMED: &str = "<unnamed>";

const HEADER: [&str; 5] = ["Mode", "KeySym", "Mod", "Command", "Desc"];

/// One stored command call: name plus the arguments it was configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
}

/// A key bound to zero or more command calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBinding {
    #[serde(default)]
    pub mods: Vec<String>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// A key that opens a mode containing nested bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyChord {
    #[serde(default)]
    pub mods: Vec<String>,
    pub key: String,
    /// Mode name shown in key tables; `None` renders as `<unnamed>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Whether the mode stays active after one of its bindings fires.
    #[serde(default)]
    pub persistent: bool,
    pub children: Vec<KeyEntry>,
}

/// One node of the key tree.
///
/// On the wire a chord is recognised by its `children` field, so the chord
/// variant must be tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyEntry {
    Chord(KeyChord),
    Binding(KeyBinding),
}

/// Render the key table for `keys`.
///
/// One row per binding, one entry row per chord, children right below
/// their chord, all in config order under a fixed header.
pub fn display_keys(keys: &[KeyEntry]) -> String {
    let mut rows: Vec<[String; 5]> = Vec::new();
    for entry in keys {
        collect_rows(entry, ROOT_MODE, &mut rows);
    }

    let mut widths: [usize; 5] = [0; 5];
    for (width, header) in widths.iter_mut().zip(HEADER) {
        *width = header.len();
    }
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &widths, HEADER);
    for row in &rows {
        push_row(&mut out, &widths, row.each_ref().map(String::as_str));
    }
    out
}

/// Walk one entry, carrying the accumulated mode label of the level above.
fn collect_rows(entry: &KeyEntry, mode: &str, rows: &mut Vec<[String; 5]>) {
    match entry {
        KeyEntry::Binding(binding) => {
            let labels: Vec<String> = binding.commands.iter().map(call_label).collect();
            rows.push([
                mode.to_string(),
                binding.key.clone(),
                binding.mods.join(", "),
                labels.join(", "),
                binding.desc.clone().unwrap_or_default(),
            ]);
        }
        KeyEntry::Chord(chord) => {
            let name = chord.mode.as_deref().filter(|m| !m.is_empty());
            rows.push([
                mode.to_string(),
                chord.key.clone(),
                chord.mods.join(", "),
                String::new(),
                format!("Enter {} mode", name.unwrap_or(UNNAMED)),
            ]);
            // A top-level chord names its children's mode directly; deeper
            // chords chain onto the label of the mode that contains them.
            let child_mode = if mode == ROOT_MODE {
                name.unwrap_or("").to_string()
            } else {
                format!("{}>{}", mode, name.unwrap_or("_"))
            };
            for child in &chord.children {
                collect_rows(child, &child_mode, rows);
            }
        }
    }
}

fn push_row(out: &mut String, widths: &[usize; 5], cells: [&str; 5]) {
    let mut line = String::new();
    for (cell, width) in cells.iter().zip(widths) {
        line.push_str(&format!("{:<1$}", cell, width + 3));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Reconstruct call notation for one stored command call.
///
/// `spawn('xterm')`, `resize(800, 600)`, `test(a = 2)` and so on; strings
/// are single-quoted, other values keep their JSON form.
fn call_label(call: &CommandCall) -> String {
    let mut parts: Vec<String> = call.args.iter().map(format_value).collect();
    for (name, value) in &call.kwargs {
        parts.push(format!("{} = {}", name, format_value(value)));
    }
    format!("{}({})", call.name, parts.join(", "))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        other => other.to_string(),
    }
}
