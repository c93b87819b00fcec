//! Unix-socket server side of the command protocol.
//!
//! Binds a stream socket and accepts one connection at a time.  Each
//! connection carries exactly one JSON [`Request`]; the parsed request is
//! forwarded to the manager thread together with a reply channel, and the
//! [`Response`] coming back is written before the connection closes.
//! Malformed requests are answered directly without bothering the manager.

use crate::ipc::{ErrorKind, Request, Response};
use log::{debug, error, info};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// A request forwarded to the manager thread, with the channel its
/// response travels back on.
pub struct Incoming {
    pub request: Request,
    pub reply: mpsc::Sender<Response>,
}

/// Errors produced by the command server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts command connections on a Unix stream socket.
pub struct CommandServer {
    path: PathBuf,
}

impl CommandServer {
    /// Create a server that will bind `path`.
    ///
    /// The socket file is created when [`run`](CommandServer::run) is
    /// called; a stale file from a previous run is removed first.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind the socket and serve connections until `sink` closes.
    ///
    /// This method **blocks** indefinitely.  Run it on a dedicated thread.
    pub fn run(&mut self, sink: mpsc::Sender<Incoming>) -> Result<(), ServerError> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    debug!("client connected");
                    match serve(stream, &sink) {
                        Ok(true) => debug!("client disconnected"),
                        Ok(false) => {
                            info!("sink closed, shutting down");
                            return Ok(());
                        }
                        Err(e) => error!("connection error: {}", e),
                    }
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
        Ok(())
    }
}

/// Handle one connection.  Returns `Ok(false)` once the manager side is
/// gone and the server should stop.
fn serve(mut stream: UnixStream, sink: &mpsc::Sender<Incoming>) -> std::io::Result<bool> {
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw)?;

    // A connection closed without any bytes is a probe, not a request.
    if raw.is_empty() {
        return Ok(true);
    }

    let request: Request = match serde_json::from_slice(&raw) {
        Ok(request) => request,
        Err(e) => {
            error!("bad request: {}", e);
            let response =
                Response::error(ErrorKind::BadArgument, format!("invalid request: {e}"));
            stream.write_all(&response.to_bytes())?;
            return Ok(true);
        }
    };
    debug!("received {:?}", request.command);

    let (reply_tx, reply_rx) = mpsc::channel();
    if sink
        .send(Incoming {
            request,
            reply: reply_tx,
        })
        .is_err()
    {
        return Ok(false);
    }
    let response = reply_rx
        .recv()
        .unwrap_or_else(|_| Response::error(ErrorKind::Execution, "manager loop unavailable"));
    stream.write_all(&response.to_bytes())?;
    Ok(true)
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// Helper: create a unique temporary socket path for each test.
    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir();
        dir.join(format!("mullion-server-test-{}-{}.sock", std::process::id(), id))
    }

    fn spawn_server(path: PathBuf) -> mpsc::Receiver<Incoming> {
        let (tx, rx) = mpsc::channel();
        let _handle = std::thread::spawn(move || {
            let mut server = CommandServer::new(&path);
            let _ = server.run(tx);
        });
        // Give the server a moment to bind.
        std::thread::sleep(std::time::Duration::from_millis(150));
        rx
    }

    fn send_raw(path: &Path, bytes: &[u8]) -> Vec<u8> {
        let mut stream = UnixStream::connect(path).expect("connect");
        stream.write_all(bytes).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        reply
    }

    #[test]
    fn one_request_round_trips_through_the_manager_channel() {
        let path = tmp_socket_path();
        let rx = spawn_server(path.clone());

        // Stand-in for the manager loop.
        let _manager = std::thread::spawn(move || {
            for incoming in rx {
                assert_eq!(incoming.request.command, "status");
                let _ = incoming.reply.send(Response::ok(json!("OK")));
            }
        });

        let reply = send_raw(&path, br#"{"command": "status"}"#);
        let response: Response = serde_json::from_slice(&reply).unwrap();
        assert!(response.success);
        assert_eq!(response.payload, json!("OK"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_requests_are_answered_without_the_manager() {
        let path = tmp_socket_path();
        let rx = spawn_server(path.clone());

        let reply = send_raw(&path, b"not json at all");
        let response: Response = serde_json::from_slice(&reply).unwrap();
        assert!(!response.success);
        assert_eq!(
            response.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::BadArgument)
        );
        // The manager never saw the connection.
        assert!(rx.try_recv().is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_connections_are_ignored() {
        let path = tmp_socket_path();
        let rx = spawn_server(path.clone());

        let reply = send_raw(&path, b"");
        assert!(reply.is_empty());
        assert!(rx.try_recv().is_err());

        // The server keeps accepting afterwards.
        let _manager = std::thread::spawn(move || {
            for incoming in rx {
                let _ = incoming.reply.send(Response::ok(json!(1)));
            }
        });
        let reply = send_raw(&path, br#"{"command": "status"}"#);
        let response: Response = serde_json::from_slice(&reply).unwrap();
        assert!(response.success);

        let _ = std::fs::remove_file(&path);
    }
}
