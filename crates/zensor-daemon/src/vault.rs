//! Identity persistence: one serialized identity per tag under
//! `<data_dir>/identities/<tag>.json`.

use std::path::{Path, PathBuf};
use tracing::info;
use zensor_crypto::Identity;
use zensor_types::{ZensorError, ZensorResult};
use zeroize::Zeroize;

pub struct IdentityVault {
    dir: PathBuf,
}

impl IdentityVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, tag: &str) -> ZensorResult<PathBuf> {
        validate_tag(tag)?;
        Ok(self.dir.join(format!("{}.json", tag)))
    }

    pub fn exists(&self, tag: &str) -> ZensorResult<bool> {
        Ok(self.path_for(tag)?.exists())
    }

    /// `None` when nothing is stored under `tag`.
    pub fn load(&self, tag: &str) -> ZensorResult<Option<Identity>> {
        let path = self.path_for(tag)?;
        if !path.exists() {
            return Ok(None);
        }

        let mut contents = std::fs::read_to_string(&path)
            .map_err(|e| ZensorError::Storage(format!("Failed to read identity: {}", e)))?;
        let identity = Identity::deserialize(contents.trim());
        contents.zeroize();
        identity.map(Some)
    }

    /// Writes `identity` under `tag`, replacing any previous one. The file is
    /// readable by the owner only.
    pub fn store(&self, tag: &str, identity: &Identity) -> ZensorResult<PathBuf> {
        let path = self.path_for(tag)?;
        create_private_dir(&self.dir)?;

        let mut contents = identity.serialize();
        let written = std::fs::write(&path, contents.as_bytes());
        contents.zeroize();
        written.map_err(|e| ZensorError::Storage(format!("Failed to write identity: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| ZensorError::Storage(format!("Failed to set permissions: {}", e)))?;
        }

        info!("Stored identity {} ({})", tag, identity.commitment().short());
        Ok(path)
    }

    /// Loads `tag`, creating and storing a new identity from `seed` when absent.
    pub fn load_or_create(&self, tag: &str, seed: Option<&[u8]>) -> ZensorResult<Identity> {
        if let Some(identity) = self.load(tag)? {
            return Ok(identity);
        }
        let identity = Identity::create(seed)?;
        self.store(tag, &identity)?;
        Ok(identity)
    }

    pub fn remove(&self, tag: &str) -> ZensorResult<bool> {
        let path = self.path_for(tag)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .map_err(|e| ZensorError::Storage(format!("Failed to remove identity: {}", e)))?;
        Ok(true)
    }

    pub fn tags(&self) -> ZensorResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| ZensorError::Storage(format!("Failed to list identities: {}", e)))?;

        let mut tags: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        tags.sort();
        Ok(tags)
    }
}

fn validate_tag(tag: &str) -> ZensorResult<()> {
    let valid = !tag.is_empty()
        && tag.len() <= 64
        && !tag.starts_with('.')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ZensorError::Config(format!("Invalid identity tag: {:?}", tag)))
    }
}

fn create_private_dir(dir: &Path) -> ZensorResult<()> {
    if dir.exists() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|e| ZensorError::Storage(format!("Failed to create directory: {}", e)))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
            .map_err(|e| ZensorError::Storage(format!("Failed to create directory: {}", e)))?;
    }

    Ok(())
}
