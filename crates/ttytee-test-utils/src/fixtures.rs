use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory for published PTY links
pub struct TestFixtures {
    temp_dir: TempDir,
}

impl TestFixtures {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Path for a PTY link named `name`; nothing is created
    pub fn pty_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// `count` distinct PTY link paths: pty0, pty1, ...
    pub fn pty_paths(&self, count: usize) -> Vec<PathBuf> {
        (0..count).map(|i| self.pty_path(&format!("pty{i}"))).collect()
    }

    pub fn create_test_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let file_path = self.temp_dir.path().join(name);
        std::fs::write(&file_path, content)?;
        Ok(file_path)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}
