use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Kernel configuration, passed explicitly into [`crate::FsManager`].
///
/// Loadable from TOML; every field has a default so an empty document is a
/// valid configuration. There is no global or thread-local configuration
/// state anywhere in the kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Directory for multiplexing temp files. Platform default if unset.
    pub temp_dir: Option<PathBuf>,

    /// Poll interval of the cancellable WAIT_CLOSE_* loop, milliseconds.
    pub wait_poll_ms: u64,

    /// Keep controllers strongly referenced even while untouched.
    ///
    /// By default an idle, unmodified filesystem is only weakly referenced
    /// so it can be dropped and rebuilt lazily; a dirty one is always
    /// pinned until synchronized.
    pub retain_untouched: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            wait_poll_ms: 50,
            retain_untouched: false,
        }
    }
}

impl KernelConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The wait poll interval as a duration.
    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms)
    }
}
