use std::path::{Path, PathBuf};

use rollout_core::store::rollout_root_at;

pub const DAEMON_SOCKET: &str = "daemon.sock";
pub const DAEMON_CONFIG: &str = "daemon.yaml";

pub fn socket_path(home: &Path) -> PathBuf {
    rollout_root_at(home).join(DAEMON_SOCKET)
}

pub fn config_path(home: &Path) -> PathBuf {
    rollout_root_at(home).join(DAEMON_CONFIG)
}
