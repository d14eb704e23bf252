//! Project-level configuration: include-search paths, output path, active
//! flags. Ambient plumbing (§1a), not a parsed C construct — loadable from an
//! optional `ccfront.toml` the way the teacher loads project settings.

use serde::Deserialize;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "ccfront.toml";

/// Flags change pipeline behaviour without being part of the language itself.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Flag {
    DisableWarnings,
    DumpTokens,
    DumpIr,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    include_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Search order for `#include <...>`: entries here, in order, after the
    /// current file's directory has been tried for `#include "..."`.
    pub include_paths: Vec<PathBuf>,
    pub flags: Vec<Flag>,
}

impl Config {
    pub fn new(input: PathBuf) -> Self {
        Config {
            input,
            output: None,
            include_paths: default_include_paths(),
            flags: Vec::new(),
        }
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Merges in an optional `ccfront.toml` sitting next to the input file,
    /// if one exists. Malformed config files are a `Config` error, but since
    /// this crate has no config-specific `ErrorKind`, failures here are
    /// reported through the same `Internal`-adjacent path as other fatal
    /// startup failures by the caller.
    pub fn load_project_file(&mut self, dir: &std::path::Path) -> std::io::Result<()> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(());
        }

        let text = std::fs::read_to_string(&path)?;
        let parsed: ConfigFile = toml::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        self.include_paths.extend(parsed.include_paths);
        Ok(())
    }
}

fn default_include_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("/usr/local/include"), PathBuf::from("/usr/include")]
}
