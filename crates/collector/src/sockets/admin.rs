//! Ceph admin socket client.
//!
//! A request is a JSON command terminated by a NUL byte. The reply is a
//! big-endian `u32` payload length followed by the payload.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::instrument;

use crate::domain::SocketError;
use crate::domain::StatValue;
use crate::domain::StatsSocketClient;

/// Command dumping every perf counter of the client.
pub const PERF_DUMP_COMMAND: &str = r#"{"prefix": "perf dump"}"#;

/// Replies larger than this are treated as corrupt.
pub const MAX_REPLY_BYTES: usize = 64 * 1024 * 1024;

/// Queries `perf dump` over a Unix admin socket.
pub struct AdminSocketClient {
    timeout: Duration,
}

impl AdminSocketClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(path: &Path, command: &str) -> Result<Vec<u8>, Report<SocketError>> {
        let io_error = || SocketError::Io {
            message: format!("admin socket {}", path.display()),
        };

        let mut stream = UnixStream::connect(path).await.change_context_lazy(io_error)?;

        let mut request = Vec::with_capacity(command.len() + 1);
        request.extend_from_slice(command.as_bytes());
        request.push(0);
        stream
            .write_all(&request)
            .await
            .change_context_lazy(io_error)?;

        let len = stream.read_u32().await.change_context_lazy(io_error)? as usize;
        if len > MAX_REPLY_BYTES {
            return Err(Report::new(SocketError::Decode {
                message: format!("reply of {len} bytes exceeds {MAX_REPLY_BYTES}"),
            }));
        }

        let mut payload = vec![0; len];
        stream
            .read_exact(&mut payload)
            .await
            .change_context_lazy(io_error)?;
        Ok(payload)
    }
}

#[async_trait]
impl StatsSocketClient for AdminSocketClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_stats(&self, path: &Path) -> Result<StatValue, Report<SocketError>> {
        let payload = tokio::time::timeout(self.timeout, Self::exchange(path, PERF_DUMP_COMMAND))
            .await
            .map_err(|_| {
                Report::new(SocketError::Timeout {
                    seconds: self.timeout.as_secs(),
                })
                .attach_printable(format!("admin socket {}", path.display()))
            })??;

        decode_stats(&payload)
    }
}

/// Decodes a `perf dump` reply, which must be a JSON object.
pub fn decode_stats(payload: &[u8]) -> Result<StatValue, Report<SocketError>> {
    let json: serde_json::Value =
        serde_json::from_slice(payload).change_context(SocketError::Decode {
            message: "reply is not valid JSON".to_string(),
        })?;

    if !json.is_object() {
        return Err(Report::new(SocketError::Decode {
            message: "reply is not a JSON object".to_string(),
        }));
    }

    StatValue::from_json(&json).ok_or_else(|| {
        Report::new(SocketError::Decode {
            message: "reply holds no stats".to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;
    use similar_asserts::assert_eq;
    use tempfile::TempDir;
    use test_log::test;
    use tokio::net::UnixListener;

    use super::*;

    /// Serves one connection: checks the request and answers with `reply`.
    fn serve_once(dir: &TempDir, reply: Vec<u8>) -> PathBuf {
        let path = dir.path().join("ceph-100.1.asok");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            loop {
                let byte = stream.read_u8().await.unwrap();
                if byte == 0 {
                    break;
                }
                request.push(byte);
            }
            assert_eq!(String::from_utf8(request).unwrap(), PERF_DUMP_COMMAND);
            stream.write_all(&reply).await.unwrap();
        });
        path
    }

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut reply = (body.len() as u32).to_be_bytes().to_vec();
        reply.extend_from_slice(body);
        reply
    }

    #[test(tokio::test)]
    async fn fetches_perf_dump() {
        let dir = TempDir::new().unwrap();
        let body = json!({"librbd-one-7-0-1": {"rd": 12, "wr": {"bytes": 99}}}).to_string();
        let path = serve_once(&dir, framed(body.as_bytes()));

        let stats = AdminSocketClient::new(Duration::from_secs(5))
            .fetch_stats(&path)
            .await
            .unwrap();

        let leaves = stats.flatten("p");
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].name, "p.librbd-one-7-0-1.rd");
        assert_eq!(leaves[1].value, 99.0);
    }

    #[test(tokio::test)]
    async fn invalid_json_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = serve_once(&dir, framed(b"not json"));

        let err = AdminSocketClient::new(Duration::from_secs(5))
            .fetch_stats(&path)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), SocketError::Decode { .. }));
    }

    #[test(tokio::test)]
    async fn truncated_reply_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut reply = 100u32.to_be_bytes().to_vec();
        reply.extend_from_slice(b"{}");
        let path = serve_once(&dir, reply);

        let err = AdminSocketClient::new(Duration::from_secs(5))
            .fetch_stats(&path)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), SocketError::Io { .. }));
    }

    #[test(tokio::test)]
    async fn oversized_reply_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = serve_once(&dir, (u32::MAX).to_be_bytes().to_vec());

        let err = AdminSocketClient::new(Duration::from_secs(5))
            .fetch_stats(&path)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), SocketError::Decode { .. }));
    }

    #[test(tokio::test)]
    async fn missing_socket_is_io_error() {
        let dir = TempDir::new().unwrap();

        let err = AdminSocketClient::new(Duration::from_secs(5))
            .fetch_stats(&dir.path().join("ceph-1.0.asok"))
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), SocketError::Io { .. }));
    }

    #[test(tokio::test)]
    async fn silent_peer_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ceph-2.0.asok");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let err = AdminSocketClient::new(Duration::from_millis(100))
            .fetch_stats(&path)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), SocketError::Timeout { .. }));
    }

    #[test]
    fn decode_rejects_non_object() {
        let err = decode_stats(b"[1, 2]").unwrap_err();
        assert!(matches!(err.current_context(), SocketError::Decode { .. }));
    }

    #[test]
    fn decode_keeps_nested_numbers() {
        let stats = decode_stats(br#"{"g": {"a": 1, "s": "x"}}"#).unwrap();
        assert_eq!(stats.flatten("p").len(), 1);
    }
}
