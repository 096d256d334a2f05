//! The `wdb_update` socket collaborator (`spec.md` §4.3, §6): a
//! length-framed request/reply exchange over a Unix domain stream socket.
//!
//! Queries run from a router worker thread and block it for the call's
//! duration (`spec.md` §5), so this client uses blocking `std` I/O with an
//! explicit read/write timeout rather than an async socket — there is no
//! executor to yield to mid-evaluation.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use super::codec::{self, MAX_FRAME_LEN};

#[derive(Debug, Error, Diagnostic)]
pub enum WdbError {
    #[error("could not connect to wdb socket {0}: {1}")]
    #[diagnostic(code(eventcascade::wdb::connect))]
    Connect(PathBuf, String),
    #[error("wdb request timed out after {0:?}")]
    #[diagnostic(
        code(eventcascade::wdb::timeout),
        help("the wdb daemon may be unreachable or overloaded")
    )]
    Timeout(Duration),
    #[error("wdb I/O error: {0}")]
    #[diagnostic(code(eventcascade::wdb::io))]
    Io(String),
    #[error("wdb reply was not valid UTF-8")]
    #[diagnostic(code(eventcascade::wdb::invalid_utf8))]
    InvalidUtf8,
    #[error("wdb reply frame of {0} bytes exceeds the maximum of {MAX_FRAME_LEN}")]
    #[diagnostic(code(eventcascade::wdb::frame_too_large))]
    FrameTooLarge(u32),
}

pub trait WdbClient: Send + Sync {
    /// Send `request`, block for the reply, and return it as text.
    fn query(&self, request: &str) -> Result<String, WdbError>;
}

/// The fixed local path `wdb_update` connects to (`spec.md` §4.3: "opens a
/// stream socket to a fixed local path" — unlike the event/API endpoints,
/// this is not part of the CLI configuration table).
pub const FIXED_SOCKET_PATH: &str = "/var/run/eventcascade/wdb.sock";

/// Default per-call timeout, per `spec.md` §5 ("bounded by a per-call
/// timeout (default 1000 ms)").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct UnixSocketWdbClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl UnixSocketWdbClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(socket_path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeout,
        }
    }

    fn to_timeout_error(&self, err: io::Error) -> WdbError {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => WdbError::Timeout(self.timeout),
            _ => WdbError::Io(err.to_string()),
        }
    }
}

impl WdbClient for UnixSocketWdbClient {
    fn query(&self, request: &str) -> Result<String, WdbError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| WdbError::Connect(self.socket_path.clone(), e.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| WdbError::Io(e.to_string()))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| WdbError::Io(e.to_string()))?;

        let frame = codec::encode(request.as_bytes());
        stream.write_all(&frame).map_err(|e| self.to_timeout_error(e))?;

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).map_err(|e| self.to_timeout_error(e))?;
        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(WdbError::FrameTooLarge(len));
        }
        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload).map_err(|e| self.to_timeout_error(e))?;
        String::from_utf8(payload).map_err(|_| WdbError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn spawn_echo_server(reply: &'static str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("wdb.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut len_buf = [0u8; 4];
                if stream.read_exact(&mut len_buf).is_err() {
                    return;
                }
                let len = u32::from_le_bytes(len_buf) as usize;
                let mut payload = vec![0u8; len];
                let _ = stream.read_exact(&mut payload);
                let _ = stream.write_all(&codec::encode(reply.as_bytes()));
            }
        });
        (dir, socket_path)
    }

    #[test]
    fn round_trips_a_request_and_reply() {
        let (_dir, socket_path) = spawn_echo_server("ok 200");
        let client = UnixSocketWdbClient::new(&socket_path);
        let reply = client.query("query parameters").unwrap();
        assert_eq!(reply, "ok 200");
    }

    #[test]
    fn connect_failure_surfaces_as_an_error() {
        let client = UnixSocketWdbClient::new("/nonexistent/path/to.sock");
        assert!(client.query("x").is_err());
    }
}
