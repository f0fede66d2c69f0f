use std::{env, path::PathBuf};

use color_eyre::{Result, eyre::Context};
use directories::ProjectDirs;
use lazy_static::lazy_static;
use serde::Deserialize;
use tracing::debug;

use crate::component::typeahead::TypeaheadOptions;

/// Settings of the demo form.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Simulated latency of every catalogue search
    pub search_delay_ms: u64,
    /// JSON file with `{ "name", "code" }` objects replacing the built-in
    /// country list
    pub catalogue: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: 150,
            catalogue: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub widget: TypeaheadOptions,
    #[serde(default)]
    pub demo: DemoConfig,
}

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
}

impl Config {
    /// Layered from lowest to highest priority: built-in defaults,
    /// `config.toml` in the config directory, `TYPEAHEAD_*` environment
    /// variables, then command line flags.
    pub fn new(cli_source: Option<crate::cli::ClapSource>) -> Result<Self> {
        let data_dir = get_data_dir();
        let config_file = get_config_dir().join("config.toml");
        debug!(config_file = %config_file.display(), "loading config");

        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .add_source(
                config::File::from(config_file)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(&PROJECT_NAME)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(cli_source) = cli_source {
            builder = builder.add_source(cli_source);
        }

        let cfg: Self = builder
            .build()
            .context("Error building config")?
            .try_deserialize()
            .context("Error deserialize config")?;

        Ok(cfg)
    }
}

pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env::var(format!("{}_DATA", PROJECT_NAME.clone()))
        .ok()
        .map(PathBuf::from)
    {
        dir
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(dir) = env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
        .ok()
        .map(PathBuf::from)
    {
        dir
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "typeahead", env!("CARGO_PKG_NAME"))
}
