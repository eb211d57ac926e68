use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use log::error;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub source: Vec<PatternConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    pub read_size: usize,
    pub total_bytes: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 4096, read_size: 512, total_bytes: 1 << 20 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatternConfig {
    pub id: String,
    pub pattern: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub enabled: bool,
}

fn default_chunk_size() -> usize { 256 }

#[derive(Debug, Clone)]
pub struct FlattenedConfig {
    pub capacity: usize,
    pub read_size: usize,
    pub total_bytes: u64,
    pub sources: Vec<PatternConfig>,
}

pub fn load_config(path: &str) -> Result<FlattenedConfig, Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Err(format!("Config file not found: {}", path).into());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

    let cfg: Config = toml::from_str(&content)
        .map_err(|e| format!("Failed to parse TOML config {}: {}", path, e))?;

    log::info!("Config loaded from: {}", path);

    flatten(cfg)
}

/// Validate buffer settings and keep enabled sources with unique, well-formed ids.
pub fn flatten(cfg: Config) -> Result<FlattenedConfig, Box<dyn std::error::Error>> {
    let buffer = cfg.buffer;
    if buffer.capacity == 0 || buffer.read_size == 0 {
        return Err("buffer.capacity and buffer.read_size must be greater than zero".into());
    }

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut sources = Vec::new();
    for s in cfg.source.into_iter().filter(|s| s.enabled) {
        if !is_valid_id(&s.id) {
            error!("Invalid source id '{}'. Use [a-z0-9][a-z0-9_-]*", s.id);
        } else if !seen_ids.insert(s.id.clone()) {
            error!("Duplicate source id '{}' - skipping", s.id);
        } else if s.pattern.is_empty() || s.chunk_size == 0 {
            error!("Source '{}' has an empty pattern or zero chunk_size - skipping", s.id);
        } else {
            sources.push(s);
        }
    }

    if sources.is_empty() {
        log::warn!("No enabled byte sources found in config - pump will produce nothing");
    } else {
        log::info!("Enabled sources: {}", sources.len());
    }

    Ok(FlattenedConfig {
        capacity: buffer.capacity,
        read_size: buffer.read_size,
        total_bytes: buffer.total_bytes,
        sources,
    })
}

/// Source ids end up in log lines and stats keys, so keep them to a
/// lowercase slug.
fn is_valid_id(id: &str) -> bool {
    let slug = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match id.as_bytes().split_first() {
        Some((first, rest)) => slug(first) && rest.iter().all(|b| slug(b) || *b == b'-' || *b == b'_'),
        None => false,
    }
}
