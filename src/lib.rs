//! **mullion**, a window manager driven through a command-object graph.
//!
//! Every part of a running session (the root, windows, groups, screens,
//! bars, layouts, widgets) is addressable by a path of object types and
//! selectors, and exposes commands that can be listed, documented and
//! called over a Unix socket.
//!
//! # Architecture
//!
//! * [`state`] holds the live object graph.  Every mutation happens on the
//!   manager thread; the socket side only ever hands over requests.
//! * [`resolve`] walks a request's path to a concrete [`object::Target`].
//! * [`registry`] and [`commands`] declare what each object type can do;
//!   [`dispatch`] binds and coerces arguments and runs the handlers.
//! * [`ipc`] is the wire: one JSON request and one JSON response per
//!   connection.
//! * [`keys`] models the key-binding tree and renders it as a table.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod ipc;
pub mod keys;
pub mod object;
pub mod registry;
pub mod resolve;
pub mod state;
