//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Storage namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "pRegistry";

/// Broadcast channel name used when none is configured.
pub const DEFAULT_CHANNEL_NAME: &str = "pRegistry-sync";

/// Names shared by every tab of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Storage namespace; also the store's file stem
    pub namespace: String,
    /// Name of the cross-tab broadcast channel
    pub channel_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
        }
    }
}

impl RegistryConfig {
    /// File name of the store inside a profile directory.
    pub fn store_file_name(&self) -> String {
        format!("{}.sqlite3", self.namespace)
    }
}
