//! Client side of the command protocol.
//!
//! Used by the `cmd-obj` subcommand: connect, write one request, shut
//! down the write side and read the response until the server hangs up.

use crate::ipc::{Request, Response};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Errors talking to the command socket.
#[derive(Debug, thiserror::Error)]
#[error("command socket error: {0}")]
pub struct ClientError(pub String);

/// Send one request to the socket at `path` and wait for the answer.
///
/// `Ok(None)` means the server closed the connection without writing
/// anything, i.e. there is no response to show.
pub fn call(path: impl AsRef<Path>, request: &Request) -> Result<Option<Response>, ClientError> {
    let path = path.as_ref();
    let mut stream = UnixStream::connect(path)
        .map_err(|e| ClientError(format!("connect to {}: {}", path.display(), e)))?;

    let raw =
        serde_json::to_vec(request).map_err(|e| ClientError(format!("encode request: {}", e)))?;
    stream
        .write_all(&raw)
        .map_err(|e| ClientError(format!("write: {}", e)))?;
    // Signals end-of-request; the server reads until EOF.
    stream
        .shutdown(std::net::Shutdown::Write)
        .map_err(|e| ClientError(format!("shutdown: {}", e)))?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|e| ClientError(format!("read: {}", e)))?;
    if response.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&response)
        .map(Some)
        .map_err(|e| ClientError(format!("parse: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::net::UnixListener;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir();
        dir.join(format!("mullion-client-test-{}-{}.sock", std::process::id(), id))
    }

    /// Accept one connection, check the request bytes parse, reply with
    /// `reply` and hang up.
    fn one_shot_server(path: PathBuf, reply: Vec<u8>) {
        let _handle = std::thread::spawn(move || {
            let listener = UnixListener::bind(&path).expect("bind");
            if let Ok((mut stream, _)) = listener.accept() {
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).unwrap();
                let _request: Request = serde_json::from_slice(&raw).expect("request parses");
                stream.write_all(&reply).unwrap();
            }
        });
        // Give the server a moment to bind.
        std::thread::sleep(std::time::Duration::from_millis(150));
    }

    #[test]
    fn call_returns_the_servers_response() {
        let path = tmp_socket_path();
        one_shot_server(path.clone(), br#"{"success":true,"payload":42}"#.to_vec());

        let response = call(&path, &Request::new(Vec::new(), "status"))
            .unwrap()
            .unwrap();
        assert!(response.success);
        assert_eq!(response.payload, json!(42));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn a_silent_server_yields_no_response() {
        let path = tmp_socket_path();
        one_shot_server(path.clone(), Vec::new());

        let response = call(&path, &Request::new(Vec::new(), "status")).unwrap();
        assert!(response.is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn connecting_to_a_missing_socket_fails() {
        let path = tmp_socket_path();
        let err = call(&path, &Request::new(Vec::new(), "status")).unwrap_err();
        assert!(err.to_string().contains("connect"));
    }
}
