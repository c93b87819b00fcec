//! Entry point for the **mullion** daemon and its command-line client.
//!
//! `mullion start` runs the manager: the socket server accepts one
//! request per connection on a background thread and forwards each to the
//! manager loop on the main thread, which owns all mutable state.
//!
//! `mullion cmd-obj` is the client: it builds a single request from the
//! command line, sends it and prints the payload.  Everything it sends is
//! a JSON string; the server coerces values against the declared
//! parameter types.

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use mullion::config::{Config, ConfigError};
use mullion::dispatch::Manager;
use mullion::ipc::client;
use mullion::ipc::server::{CommandServer, Incoming};
use mullion::ipc::Request;
use mullion::object::{ObjectKind, PathSegment, Selector};
use mullion::state::ManagerState;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

#[derive(Parser)]
#[command(name = "mullion", version, about = "A command-object window manager")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the window manager daemon.
    Start(StartArgs),
    /// Call a command on one of the daemon's objects.
    CmdObj(CmdObjArgs),
}

#[derive(Args)]
struct StartArgs {
    /// Config file (default: $XDG_CONFIG_HOME/mullion/config.json).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Path of the command socket.
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

#[derive(Args)]
struct CmdObjArgs {
    /// Path of the command socket.
    #[arg(short, long)]
    socket: Option<PathBuf>,
    /// Object path: object types each optionally followed by a selector,
    /// e.g. `-o group a` or `-o screen 1 bar bottom widget one`.
    #[arg(short = 'o', long = "object", num_args = 1..)]
    object: Vec<String>,
    /// Command to call; without it the object's commands are listed.
    #[arg(short = 'f', long = "function")]
    function: Option<String>,
    /// Positional arguments for the command.
    #[arg(short = 'a', long = "args", num_args = 1..)]
    args: Vec<String>,
    /// Keyword arguments as key=value pairs.
    #[arg(short = 'k', long = "kwargs", num_args = 1..)]
    kwargs: Vec<String>,
    /// Show the command's documentation instead of calling it.
    #[arg(short = 'i', long = "info")]
    info: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Cmd::Start(args) => run_start(args),
        Cmd::CmdObj(args) => run_cmd_obj(args),
    };
    std::process::exit(code);
}

//  Daemon

fn run_start(args: StartArgs) -> i32 {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };
    let socket = args.socket.unwrap_or_else(default_socket_path);

    let manager = match Manager::new(ManagerState::from_config(&config)) {
        Ok(manager) => manager,
        Err(e) => {
            error!("broken command registry: {}", e);
            return 1;
        }
    };

    let (tx, rx) = mpsc::channel();
    {
        let socket = socket.clone();
        std::thread::spawn(move || {
            let mut server = CommandServer::new(&socket);
            if let Err(e) = server.run(tx) {
                error!("command server error: {}", e);
            }
        });
    }

    info!("mullion running, socket at {}", socket.display());
    run_manager_loop(manager, rx);
    info!("command server closed, exiting");
    0
}

/// Process requests one at a time until the server side hangs up.
fn run_manager_loop(mut manager: Manager, rx: mpsc::Receiver<Incoming>) {
    for incoming in rx {
        let response = manager.handle_request(&incoming.request);
        if incoming.reply.send(response).is_err() {
            warn!("client went away before the response was ready");
        }
    }
}

/// Load an explicitly named config strictly; fall back to defaults only
/// when relying on the default location.
fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)?;
            info!("loaded config from {}", path.display());
            Ok(config)
        }
        None => {
            let path = config_dir().join("config.json");
            match Config::load(&path) {
                Ok(config) => {
                    info!("loaded config from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    info!("no config file ({}), using defaults", e);
                    Ok(Config::default())
                }
            }
        }
    }
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/mullion`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("mullion")
}

/// Default socket path for the command server.
fn default_socket_path() -> PathBuf {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(format!("{}/mullion.sock", runtime))
}

//  Client

fn run_cmd_obj(args: CmdObjArgs) -> i32 {
    let socket = args.socket.clone().unwrap_or_else(default_socket_path);
    let request = match build_request(&args) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("error: {}", e);
            return 2;
        }
    };

    match client::call(&socket, &request) {
        Ok(Some(response)) if response.success => {
            print_payload(&response.payload);
            0
        }
        Ok(Some(response)) => {
            let (kind, message) = response
                .error
                .map(|e| (e.kind.to_string(), e.message))
                .unwrap_or_else(|| ("unknown".to_string(), "unspecified failure".to_string()));
            eprintln!("error ({}): {}", kind, message);
            1
        }
        // The server hung up without a response; nothing to show.
        Ok(None) => 1,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}

/// Turn the parsed flags into one wire request.
fn build_request(args: &CmdObjArgs) -> Result<Request, String> {
    let path = parse_object_path(&args.object)?;
    Ok(match &args.function {
        None => Request::new(path, "commands"),
        Some(f) if args.info => {
            let mut request = Request::new(path, "doc");
            request.args.push(Value::String(f.clone()));
            request
        }
        Some(f) => {
            let mut request = Request::new(path, f.clone());
            request.args = args
                .args
                .iter()
                .map(|a| Value::String(a.clone()))
                .collect();
            request.kwargs = parse_kwargs(&args.kwargs)?;
            request
        }
    })
}

/// Parse `-o` tokens: an object type opens a segment, anything else is the
/// selector of the segment before it.  A token naming an object type is
/// always read as one.
fn parse_object_path(tokens: &[String]) -> Result<Vec<PathSegment>, String> {
    let mut path: Vec<PathSegment> = Vec::new();
    for token in tokens {
        if let Some(kind) = ObjectKind::parse(token) {
            path.push(PathSegment::of(kind));
        } else if let Some(last) = path.last_mut() {
            if last.selector.is_some() {
                return Err(format!(
                    "unexpected token {:?}: {} already has a selector",
                    token, last.kind
                ));
            }
            last.selector = Some(Selector::Name(token.clone()));
        } else {
            return Err(format!("{:?} is not an object type", token));
        }
    }
    Ok(path)
}

fn parse_kwargs(pairs: &[String]) -> Result<Map<String, Value>, String> {
    let mut kwargs = Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("kwarg {:?} is not of the form key=value", pair))?;
        kwargs.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(kwargs)
}

fn print_payload(payload: &Value) {
    match payload {
        Value::Null => {}
        Value::String(s) => println!("{}", s),
        other => println!("{}", other),
    }
}
