use std::path::PathBuf;

use glob::glob;
use glob::Pattern;
use regex::Regex;
use tracing::debug;
use tracing::warn;

use crate::config::CollectorConfig;
use crate::domain::SocketRecord;

/// Finds admin sockets on disk and reads pid and client id off their names.
pub struct SocketLocator {
    socket_dir: PathBuf,
    socket_prefix: String,
    socket_ext: String,
    pid_cctid_regex: Regex,
}

impl SocketLocator {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            socket_dir: config.socket_dir.clone(),
            socket_prefix: config.socket_prefix.clone(),
            socket_ext: config.socket_ext.clone(),
            pid_cctid_regex: config.pid_cctid_regex.clone(),
        }
    }

    /// Glob pattern of candidate socket paths.
    pub fn pattern(&self) -> String {
        format!(
            "{}/{}*.{}",
            Pattern::escape(&self.socket_dir.to_string_lossy()),
            Pattern::escape(&self.socket_prefix),
            Pattern::escape(&self.socket_ext)
        )
    }

    /// Lists the sockets present right now.
    ///
    /// Never fails: unreadable entries and names not matching the pid/client
    /// id pattern are skipped since sockets come and go with their VMs.
    pub fn locate_sockets(&self) -> Vec<SocketRecord> {
        let pattern = self.pattern();
        let paths = match glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(%pattern, error = %e, "Invalid socket glob pattern");
                return Vec::new();
            }
        };

        let mut sockets = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable socket path");
                    continue;
                }
            };
            if let Some(socket) = self.parse(path) {
                sockets.push(socket);
            }
        }
        sockets
    }

    /// Matches the socket's file name; group 1 is the pid, group 2 the client id.
    fn parse(&self, path: PathBuf) -> Option<SocketRecord> {
        let file_name = path.file_name().and_then(|name| name.to_str())?;
        let Some(captures) = self.pid_cctid_regex.captures(file_name) else {
            debug!(path = %path.display(), "Socket name does not match pid pattern");
            return None;
        };
        let process_id = captures.get(1)?.as_str().to_string();
        let client_id = captures.get(2)?.as_str().to_string();

        Some(SocketRecord {
            path,
            process_id,
            client_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use similar_asserts::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::config::PID_CCTID_REGEX;

    fn locator(dir: &Path, pattern: &str) -> SocketLocator {
        SocketLocator {
            socket_dir: dir.to_path_buf(),
            socket_prefix: "ceph-".to_string(),
            socket_ext: "asok".to_string(),
            pid_cctid_regex: Regex::new(&format!("^(?:{pattern})$")).unwrap(),
        }
    }

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, "").unwrap();
        path
    }

    fn sorted(mut sockets: Vec<SocketRecord>) -> Vec<SocketRecord> {
        sockets.sort_by(|a, b| a.path.cmp(&b.path));
        sockets
    }

    #[test]
    fn parses_pid_and_client_id() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "ceph-1234.0.asok");

        let sockets = locator(dir.path(), PID_CCTID_REGEX).locate_sockets();

        assert_eq!(
            sockets,
            vec![SocketRecord {
                path,
                process_id: "1234".to_string(),
                client_id: "0".to_string(),
            }]
        );
    }

    #[test]
    fn skips_non_matching_names() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "garbage.asok");
        touch(&dir, "ceph-client.admin.asok");
        touch(&dir, "ceph-1234.0.log");
        let keep = touch(&dir, "ceph-99.140234.asok");

        let sockets = locator(dir.path(), PID_CCTID_REGEX).locate_sockets();

        assert_eq!(sockets.len(), 1);
        assert_eq!(sockets[0].path, keep);
        assert_eq!(sockets[0].process_id, "99");
        assert_eq!(sockets[0].client_id, "140234");
    }

    #[test]
    fn several_sockets_per_process() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "ceph-10.1.asok");
        touch(&dir, "ceph-10.2.asok");
        touch(&dir, "ceph-11.1.asok");

        let sockets = sorted(locator(dir.path(), PID_CCTID_REGEX).locate_sockets());

        let ids: Vec<(&str, &str)> = sockets
            .iter()
            .map(|s| (s.process_id.as_str(), s.client_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("10", "1"), ("10", "2"), ("11", "1")]);
    }

    #[test]
    fn custom_pattern_group_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "ceph-client.42-7.asok");

        let sockets =
            locator(dir.path(), r"ceph-client\.([0-9]+)-([0-9]+)\.asok").locate_sockets();

        assert_eq!(sockets.len(), 1);
        assert_eq!(sockets[0].process_id, "42");
        assert_eq!(sockets[0].client_id, "7");
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let sockets = locator(Path::new("/nonexistent/ceph"), PID_CCTID_REGEX).locate_sockets();

        assert!(sockets.is_empty());
    }

    #[test]
    fn glob_metacharacters_in_dir_are_literal() {
        let dir = TempDir::new().unwrap();
        let odd = dir.path().join("run[1]");
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("ceph-5.0.asok"), "").unwrap();

        let sockets = locator(&odd, PID_CCTID_REGEX).locate_sockets();

        assert_eq!(sockets.len(), 1);
    }
}
