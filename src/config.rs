use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::ModelArch;

const DEFAULT_STREAM_URL: &str = "http://127.0.0.1:5000/stream";
const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_COUNT: u64 = 20;
const DEFAULT_WINDOW_TITLE: &str = "maskwatch";

#[derive(Debug, Deserialize, Default)]
struct MaskwatchConfigFile {
    stream: Option<StreamConfigFile>,
    model: Option<ModelConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    interval_ms: Option<u64>,
    count: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    arch: Option<String>,
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    window_title: Option<String>,
    enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct MaskwatchConfig {
    pub stream: StreamSettings,
    pub model: ModelSettings,
    /// Bounded queue depth between reader and inference; 0 runs synchronously.
    pub queue_capacity: usize,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub url: String,
    pub interval_ms: u64,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub arch: ModelArch,
    /// `None` means the architecture's default model path.
    pub path: Option<PathBuf>,
}

impl ModelSettings {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| self.arch.default_model_path())
    }
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub window_title: String,
    pub enabled: bool,
}

impl Default for MaskwatchConfig {
    fn default() -> Self {
        Self::from_defaults()
    }
}

impl MaskwatchConfig {
    /// Defaults, then the file named by `MASKWATCH_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = non_empty_env("MASKWATCH_CONFIG").map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file instead of `MASKWATCH_CONFIG`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_defaults() -> Self {
        Self {
            stream: StreamSettings {
                url: DEFAULT_STREAM_URL.to_string(),
                interval_ms: DEFAULT_INTERVAL_MS,
                count: DEFAULT_COUNT,
            },
            model: ModelSettings {
                arch: ModelArch::default(),
                path: None,
            },
            queue_capacity: 0,
            display: DisplaySettings {
                window_title: DEFAULT_WINDOW_TITLE.to_string(),
                enabled: true,
            },
        }
    }

    fn from_file(file: MaskwatchConfigFile) -> Result<Self> {
        let mut cfg = Self::from_defaults();
        if let Some(stream) = file.stream {
            if let Some(url) = stream.url {
                cfg.stream.url = url;
            }
            if let Some(interval_ms) = stream.interval_ms {
                cfg.stream.interval_ms = interval_ms;
            }
            if let Some(count) = stream.count {
                cfg.stream.count = count;
            }
        }
        if let Some(model) = file.model {
            if let Some(arch) = model.arch {
                cfg.model.arch = arch.parse()?;
            }
            cfg.model.path = model.path;
        }
        if let Some(capacity) = file.pipeline.and_then(|p| p.queue_capacity) {
            cfg.queue_capacity = capacity;
        }
        if let Some(display) = file.display {
            if let Some(title) = display.window_title {
                cfg.display.window_title = title;
            }
            if let Some(enabled) = display.enabled {
                cfg.display.enabled = enabled;
            }
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("MASKWATCH_STREAM_URL") {
            self.stream.url = url;
        }
        if let Some(raw) = non_empty_env("MASKWATCH_INTERVAL_MS") {
            self.stream.interval_ms = raw.trim().parse().map_err(|_| {
                anyhow!("MASKWATCH_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        if let Some(raw) = non_empty_env("MASKWATCH_COUNT") {
            self.stream.count = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("MASKWATCH_COUNT must be an integer"))?;
        }
        if let Some(arch) = non_empty_env("MASKWATCH_MODEL_ARCH") {
            self.model.arch = arch.parse()?;
        }
        if let Some(path) = non_empty_env("MASKWATCH_MODEL_PATH") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(raw) = non_empty_env("MASKWATCH_QUEUE_CAPACITY") {
            self.queue_capacity = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("MASKWATCH_QUEUE_CAPACITY must be an integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.stream.url)
            .map_err(|e| anyhow!("invalid stream url '{}': {}", self.stream.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "stream url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.stream.interval_ms == 0 {
            return Err(anyhow!("stream interval must be greater than zero"));
        }
        if self.stream.count == 0 {
            return Err(anyhow!("stream count must be greater than zero"));
        }
        if self.display.window_title.trim().is_empty() {
            return Err(anyhow!("display window title must not be empty"));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MaskwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = MaskwatchConfig::from_file(MaskwatchConfigFile::default()).unwrap();
        assert_eq!(cfg.stream.url, DEFAULT_STREAM_URL);
        assert_eq!(cfg.stream.interval_ms, 1000);
        assert_eq!(cfg.stream.count, 20);
        assert_eq!(cfg.model.arch, ModelArch::MobilenetV3Small);
        assert_eq!(
            cfg.model.resolved_path(),
            ModelArch::MobilenetV3Small.default_model_path()
        );
        assert_eq!(cfg.queue_capacity, 0);
        assert!(cfg.display.enabled);
        cfg.validate().unwrap();
    }

    #[test]
    fn unknown_arch_in_file_is_rejected() {
        let file: MaskwatchConfigFile =
            serde_json::from_str(r#"{"model": {"arch": "vgg16"}}"#).unwrap();
        assert!(MaskwatchConfig::from_file(file).is_err());
    }

    #[test]
    fn validation_rejects_bad_stream_settings() {
        let mut cfg = MaskwatchConfig::default();
        cfg.stream.url = "ftp://camera/stream".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = MaskwatchConfig::default();
        cfg.stream.interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MaskwatchConfig::default();
        cfg.stream.count = 0;
        assert!(cfg.validate().is_err());
    }
}
