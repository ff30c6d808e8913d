//! Local rendezvous identity.
//!
//! The overlay daemon writes the published address of our hidden service to a
//! `hostname` file. We only read it for display; session logic never uses it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::chat::error::ChatError;

/// Bundle layout relative to the executable directory.
const HOSTNAME_RELATIVE_PATH: [&str; 5] =
    ["tor-expert-bundle", "Data", "Tor", "hidden_service", "hostname"];

/// Our own rendezvous address, as published by the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    address: String,
}

impl LocalIdentity {
    /// Read the address from a `hostname` file.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ChatError::Precondition(format!(
                "Cannot read hostname file {} ({}). Start the overlay daemon first so it generates an address.",
                path.display(),
                e
            ))
        })?;

        let address = content.trim();
        if address.is_empty() {
            return Err(ChatError::Precondition(format!(
                "Hostname file {} is empty",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), "loaded local rendezvous address");
        Ok(Self {
            address: address.to_string(),
        })
    }

    /// Default `hostname` location next to the running executable.
    pub fn default_path() -> Result<PathBuf, ChatError> {
        let exe = std::env::current_exe()
            .map_err(|e| ChatError::Precondition(format!("Cannot locate executable: {}", e)))?;
        let base = exe
            .parent()
            .ok_or_else(|| ChatError::Precondition("Executable has no parent directory".into()))?;
        Ok(HOSTNAME_RELATIVE_PATH
            .iter()
            .fold(base.to_path_buf(), |path, part| path.join(part)))
    }

    /// The rendezvous address string.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_trims_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostname");
        fs::write(&path, "abcdefghijklmnop.onion\n").unwrap();

        let identity = LocalIdentity::load(&path).unwrap();
        assert_eq!(identity.address(), "abcdefghijklmnop.onion");
    }

    #[test]
    fn test_missing_file_is_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalIdentity::load(&dir.path().join("hostname")).unwrap_err();
        assert!(matches!(err, ChatError::Precondition(_)));
    }

    #[test]
    fn test_empty_file_is_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostname");
        fs::write(&path, "   \n").unwrap();

        let err = LocalIdentity::load(&path).unwrap_err();
        assert!(matches!(err, ChatError::Precondition(_)));
    }

    #[test]
    fn test_default_path_layout() {
        let path = LocalIdentity::default_path().unwrap();
        assert!(path.ends_with("tor-expert-bundle/Data/Tor/hidden_service/hostname"));
    }
}
