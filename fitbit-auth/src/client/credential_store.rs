use crate::error::AuthError;
use crate::models::Credential;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const APP_DIR: &str = "fitbit-recorder";
const CREDENTIAL_FILE: &str = "fitbit.yaml";

/// YAML-backed credential file.
///
/// Every mutation goes through [`CredentialStore::save`], which replaces the
/// file atomically so readers see either the previous or the new credential.
pub struct CredentialStore {
    path: PathBuf,
}

/// Exclusive lock on the credential file, released on drop.
#[derive(Debug)]
pub struct CredentialLock {
    _file: File,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/fitbit-recorder/fitbit.yaml`
    pub fn default_path() -> Result<PathBuf, AuthError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AuthError::Configuration("Could not find config directory".to_string()))?;
        Ok(config_dir.join(APP_DIR).join(CREDENTIAL_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Credential, AuthError> {
        if !self.path.exists() {
            return Err(AuthError::Configuration(format!(
                "credential file {} not found",
                self.path.display()
            )));
        }

        let yaml = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::Configuration(format!(
                "Failed to read credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let credential: Credential = serde_yaml::from_str(&yaml).map_err(|e| {
            AuthError::Configuration(format!(
                "Malformed credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        credential.validate()?;

        Ok(credential)
    }

    pub fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let yaml = serde_yaml::to_string(credential)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize credential: {}", e)))?;

        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| {
            AuthError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        // Temp file in the same directory so the rename stays on one filesystem
        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| AuthError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(yaml.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| AuthError::Storage(format!("Failed to write credential: {}", e)))?;

        restrict_permissions(temp.as_file())?;

        temp.persist(&self.path).map_err(|e| {
            AuthError::Storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Block until no other process holds the credential lock.
    pub fn lock(&self) -> Result<CredentialLock, AuthError> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| {
            AuthError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                AuthError::Storage(format!("Failed to open {}: {}", lock_path.display(), e))
            })?;
        restrict_permissions(&file)?;

        file.lock().map_err(|e| {
            AuthError::Storage(format!("Failed to lock {}: {}", lock_path.display(), e))
        })?;

        Ok(CredentialLock { _file: file })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from(CREDENTIAL_FILE));
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Owner read/write only (0600).
fn restrict_permissions(file: &File) -> Result<(), AuthError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| AuthError::Storage(format!("Failed to set file permissions: {}", e)))?;
    }
    #[cfg(not(unix))]
    let _ = file;
    Ok(())
}
