use anyhow::{Context, Result};
use passbook_ingest::ParserConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::{ensure_passbook_home, passbook_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repair: RepairSection,
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSection {
    pub max_attempts: u32,
    /// Holds `<bank>/<bank>_sample.pdf` and `<bank>/<bank>_sample.csv`.
    pub data_dir: PathBuf,
    /// Accepted parser configurations are written here as `<bank>.toml`.
    pub out_dir: PathBuf,
}

impl Default for RepairSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            data_dir: PathBuf::from("data"),
            out_dir: PathBuf::from("custom_parsers"),
        }
    }
}

const CONFIG_FILE: &str = "config.toml";

pub fn config_path() -> Result<PathBuf> {
    Ok(passbook_home()?.join(CONFIG_FILE))
}

/// Load `path`, or `~/.passbook/config.toml` when no path is given.
/// A missing default file yields the defaults; a missing explicit file is an error.
/// Nothing is created on disk.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => read_config(p),
        None => load_from_home(&passbook_home()?),
    }
}

fn load_from_home(home: &Path) -> Result<Config> {
    let p = home.join(CONFIG_FILE);
    if !p.exists() {
        return Ok(Config::default());
    }
    read_config(&p)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => {
            ensure_passbook_home()?;
            config_path()?
        }
    };
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}

/// A single parser configuration, as written by `passbook repair`.
pub fn read_parser_config(path: &Path) -> Result<ParserConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_parser_config(cfg: &ParserConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize parser config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
