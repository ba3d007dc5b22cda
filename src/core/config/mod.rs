use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/*
  Host configuration, stored as YAML. Everything has a default so a
  missing or partial file still produces a usable setup.
*/
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial log filter, e.g. "info" or "r_dcpu16=debug".
    pub log_level: String,
    /// Stop headless runs after this many steps.
    pub max_steps: Option<u64>,
    /// Attach the console output device at bus index 0.
    pub console_device: bool,
    /// Execute breakpoints, applied when the monitor enters break mode.
    pub break_on_execute: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: String::from("info"),
            max_steps: None,
            console_device: true,
            break_on_execute: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_yaml::from_str(&text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid config: {e}")))
    }

    pub fn save_to_file(&self, path: &str) -> io::Result<()> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("config: {e}")))?;
        fs::write(path, text)
    }
}
