use std::path::{Path, PathBuf};

use tracing::warn;

pub const CONFIG_FILE: &str = ".chartly.toml";

#[derive(Clone, Debug)]
pub struct Config {
    pub max_depth: usize,
    pub width: f64,
    pub height: f64,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 512,
            width: 800.0,
            height: 600.0,
            log_level: None,
        }
    }
}

fn parse_usize_env(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse::<usize>().ok()
}

fn parse_f64_env(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.parse::<f64>().ok()
}

/// Where a config file is looked up: next to the program, then the user's
/// config directory.
fn candidates(root: Option<&Path>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(root) = root {
        out.push(root.join(CONFIG_FILE));
    }
    if let Some(dir) = dirs::config_dir() {
        out.push(dir.join("chartly").join("config.toml"));
    }
    out
}

pub fn load(root: Option<&Path>) -> Config {
    let mut cfg = Config::default();

    // first readable file wins
    for path in candidates(root) {
        let Ok(s) = std::fs::read_to_string(&path) else {
            continue;
        };
        match s.parse::<toml::Value>() {
            Ok(val) => {
                apply_toml(&mut cfg, &val);
                break;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
        }
    }

    // Env overrides
    if let Some(n) = parse_usize_env("CHARTLY_MAX_DEPTH")
        && n > 0
    {
        cfg.max_depth = n;
    }
    if let Some(w) = parse_f64_env("CHARTLY_WIDTH")
        && w > 0.0
    {
        cfg.width = w;
    }
    if let Some(h) = parse_f64_env("CHARTLY_HEIGHT")
        && h > 0.0
    {
        cfg.height = h;
    }
    if let Ok(level) = std::env::var("CHARTLY_LOG") {
        cfg.log_level = Some(level);
    }

    cfg
}

fn apply_toml(cfg: &mut Config, val: &toml::Value) {
    // run.max_depth (usize)
    if let Some(n) = val
        .get("run")
        .and_then(|t| t.get("max_depth"))
        .and_then(|v| v.as_integer())
        && n > 0
    {
        cfg.max_depth = n as usize;
    }
    // render.width / render.height (int or float)
    if let Some(w) = val.get("render").and_then(|t| t.get("width")).and_then(as_number)
        && w > 0.0
    {
        cfg.width = w;
    }
    if let Some(h) = val.get("render").and_then(|t| t.get("height")).and_then(as_number)
        && h > 0.0
    {
        cfg.height = h;
    }
    // log.level (string)
    if let Some(level) = val
        .get("log")
        .and_then(|t| t.get("level"))
        .and_then(|v| v.as_str())
    {
        cfg.log_level = Some(level.to_string());
    }
}

fn as_number(v: &toml::Value) -> Option<f64> {
    v.as_float().or_else(|| v.as_integer().map(|i| i as f64))
}
