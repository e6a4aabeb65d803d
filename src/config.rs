use std::path::PathBuf;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_DIR: &str = ".";
pub const DEFAULT_DBFILENAME: &str = "dump.rdb";

/// Server settings, fixed at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the snapshot file.
    pub dir: String,
    /// Name of the snapshot file inside `dir`.
    pub dbfilename: String,
    pub max_frame_size: usize,
}

impl Config {
    pub fn new(dir: impl Into<String>, dbfilename: impl Into<String>) -> Config {
        Config {
            dir: dir.into(),
            dbfilename: dbfilename.into(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Full path of the snapshot file, or `None` when either part is unset.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        if self.dir.is_empty() || self.dbfilename.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.dir).join(&self.dbfilename))
    }

    /// Looks up a parameter by its `CONFIG GET` name.
    pub fn get(&self, param: &str) -> Option<&str> {
        match param {
            "dir" => Some(self.dir.as_str()),
            "dbfilename" => Some(self.dbfilename.as_str()),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(DEFAULT_DIR, DEFAULT_DBFILENAME)
    }
}
