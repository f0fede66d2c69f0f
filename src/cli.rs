use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use config::Source;

use crate::config::{get_config_dir, get_data_dir};

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Tick rate, i.e. number of ticks per second
    #[arg(short, long, value_name = "FLOAT", default_value_t = 4.0)]
    pub tick_rate: f64,

    /// Frame rate, i.e. number of frames per second
    #[arg(short, long, value_name = "FLOAT", default_value_t = 60.0)]
    pub frame_rate: f64,

    /// Path to the data directory
    #[arg(short, long, value_name = "PATH")]
    pub data_dir: Option<String>,

    /// Milliseconds of typing pause before a search starts
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Characters needed before searching
    #[arg(long, value_name = "N")]
    pub min_length: Option<usize>,

    /// Maximum number of suggestions shown
    #[arg(long, value_name = "N")]
    pub max_suggestions: Option<usize>,

    /// Simulated latency of the demo catalogues
    #[arg(long, value_name = "MS")]
    pub search_delay_ms: Option<u64>,

    /// JSON file with the countries to search
    #[arg(long, value_name = "PATH")]
    pub catalogue: Option<PathBuf>,
}

const VERSION_MESSAGE: &str = concat!(env!("CARGO_PKG_VERSION"));

pub fn version() -> String {
    let author = clap::crate_authors!();

    let data_dir_path = get_data_dir().display().to_string();
    let config_dir_path = get_config_dir().display().to_string();

    format!(
        "\
{VERSION_MESSAGE}

Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}

/// Command line flags as the highest priority config source.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClapSource {
    pub data_dir: Option<String>,
    pub debounce_ms: Option<u64>,
    pub min_length: Option<usize>,
    pub max_suggestions: Option<usize>,
    pub search_delay_ms: Option<u64>,
    pub catalogue: Option<PathBuf>,
}

impl ClapSource {
    pub fn new(cli: &Cli) -> Self {
        Self {
            data_dir: cli.data_dir.clone(),
            debounce_ms: cli.debounce_ms,
            min_length: cli.min_length,
            max_suggestions: cli.max_suggestions,
            search_delay_ms: cli.search_delay_ms,
            catalogue: cli.catalogue.clone(),
        }
    }
}

impl Source for ClapSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        let mut map = config::Map::new();
        let mut insert = |key: &str, value: Option<config::ValueKind>| {
            if let Some(value) = value {
                map.insert(key.to_string(), config::Value::new(None, value));
            }
        };
        insert("data_dir", self.data_dir.clone().map(Into::into));
        insert("widget.debounce_ms", self.debounce_ms.map(|v| (v as i64).into()));
        insert("widget.minimum_length", self.min_length.map(|v| (v as i64).into()));
        insert(
            "widget.maximum_suggestions",
            self.max_suggestions.map(|v| (v as i64).into()),
        );
        insert(
            "demo.search_delay_ms",
            self.search_delay_ms.map(|v| (v as i64).into()),
        );
        insert(
            "demo.catalogue",
            self.catalogue
                .as_ref()
                .map(|path| path.to_string_lossy().to_string().into()),
        );
        Ok(map)
    }
}
