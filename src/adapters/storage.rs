//! On-board storage: the FAT partition holding the config file and the
//! durable log.
//!
//! - **`target_os = "espidf"`**: wear-levelled FAT on the `storage` flash
//!   partition, mounted at [`ROOT`].
//! - **host**: a plain directory under the working directory.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::StorageError;

#[cfg(target_os = "espidf")]
pub const ROOT: &str = "/storage";
#[cfg(not(target_os = "espidf"))]
pub const ROOT: &str = "hivemon-data";

pub const CONFIG_FILE: &str = "config.json";

#[cfg(target_os = "espidf")]
const PARTITION_LABEL: &core::ffi::CStr = c"storage";
#[cfg(target_os = "espidf")]
const MOUNT_POINT: &core::ffi::CStr = c"/storage";

/// Mounted storage root.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    #[cfg(target_os = "espidf")]
    pub fn mount() -> Result<Self, StorageError> {
        use esp_idf_svc::sys::*;

        let cfg = esp_vfs_fat_mount_config_t {
            format_if_mount_failed: true,
            max_files: 4,
            allocation_unit_size: 4096,
            ..Default::default()
        };
        let mut handle: wl_handle_t = -1;
        // SAFETY: both paths are NUL-terminated statics; `cfg` and `handle`
        // outlive the call.  Called once per boot from main.
        esp!(unsafe {
            esp_vfs_fat_spiflash_mount_rw_wl(MOUNT_POINT.as_ptr(), PARTITION_LABEL.as_ptr(), &cfg, &mut handle)
        })
        .map_err(|e| StorageError::Mount(e.code()))?;
        info!("Storage: FAT mounted at {}", ROOT);
        Ok(Self { root: PathBuf::from(ROOT) })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn mount() -> Result<Self, StorageError> {
        Self::at(ROOT)
    }

    /// Use an existing directory as the storage root (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::CreateDir(format!("{}: {}", root.display(), e)))?;
        info!("Storage(sim): using {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Resolve a path from the config relative to the root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }
}
