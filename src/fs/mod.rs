// src/fs/mod.rs

//! Filesystem access used by the report writer.

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace the contents of `path`. Readers never observe a partial file.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
            }
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = Path::new(&temp_name);

        let mut file =
            fs::File::create(temp_path).with_context(|| format!("creating file {:?}", temp_path))?;
        file.write_all(contents)
            .with_context(|| format!("writing to file {:?}", temp_path))?;
        file.sync_all()
            .with_context(|| format!("syncing file {:?}", temp_path))?;
        fs::rename(temp_path, path)
            .with_context(|| format!("renaming {:?} to {:?}", temp_path, path))?;
        Ok(())
    }
}
