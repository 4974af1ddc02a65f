use crate::core::gfx::CompositeMode;
use log::{LevelFilter, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

const CONFIG_PATH: &str = "spritegl.ini";

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.parse(&content);
        Ok(())
    }

    /// Replaces the current contents with the sections found in `content`.
    pub fn parse(&mut self, content: &str) {
        self.sections.clear();
        let mut current_section = String::new();

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // [SectionName]
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = name.trim().to_string();
                self.sections.entry(current_section.clone()).or_default();
                continue;
            }

            // key=value
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                self.sections
                    .entry(current_section.clone())
                    .or_default()
                    .insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub vsync: bool,
    pub gfx_debug: bool,
    pub display_width: u32,
    pub display_height: u32,
    pub log_level: LogLevel,
    /// Blend mode the demo draws with.
    pub composite_mode: CompositeMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vsync: true,
            gfx_debug: false,
            display_width: 1280,
            display_height: 720,
            log_level: LogLevel::Info,
            composite_mode: CompositeMode::SourceOver,
        }
    }
}

impl Config {
    /// Reads `[Options]`, falling back to defaults key by key.
    pub fn from_ini(conf: &SimpleIni) -> Self {
        let default = Self::default();
        let flag = |key: &str, fallback: bool| {
            conf.get("Options", key)
                .and_then(|v| v.parse::<u8>().ok())
                .map_or(fallback, |v| v != 0)
        };
        let dimension = |key: &str, fallback: u32| {
            conf.get("Options", key)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|&v| v > 0)
                .unwrap_or(fallback)
        };

        let composite_mode = match conf.get("Options", "CompositeMode") {
            Some(v) => v.parse::<CompositeMode>().unwrap_or_else(|e| {
                warn!("{e}; using {}.", default.composite_mode);
                default.composite_mode
            }),
            None => default.composite_mode,
        };

        Self {
            vsync: flag("Vsync", default.vsync),
            gfx_debug: flag("GfxDebug", default.gfx_debug),
            display_width: dimension("DisplayWidth", default.display_width),
            display_height: dimension("DisplayHeight", default.display_height),
            log_level: conf
                .get("Options", "LogLevel")
                .and_then(|v| LogLevel::from_str(&v).ok())
                .unwrap_or(default.log_level),
            composite_mode,
        }
    }

    fn to_ini_string(&self) -> String {
        // [Options] keys in alphabetical order
        let mut content = String::new();
        content.push_str("[Options]\n");
        content.push_str(&format!("CompositeMode={}\n", self.composite_mode));
        content.push_str(&format!("DisplayHeight={}\n", self.display_height));
        content.push_str(&format!("DisplayWidth={}\n", self.display_width));
        content.push_str(&format!("GfxDebug={}\n", u8::from(self.gfx_debug)));
        content.push_str(&format!("LogLevel={}\n", self.log_level.as_str()));
        content.push_str(&format!("Vsync={}\n", u8::from(self.vsync)));
        content
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    std::fs::write(CONFIG_PATH, Config::default().to_ini_string())
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(CONFIG_PATH) {
        Ok(()) => {
            let cfg = Config::from_ini(&conf);
            *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = cfg;
            info!("Configuration loaded from '{CONFIG_PATH}'.");
        }
        Err(e) => warn!("Failed to load '{CONFIG_PATH}': {e}. Using defaults."),
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}
