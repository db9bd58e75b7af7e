//! Service configuration.
//!
//! Configuration is layered: values from a YAML file (`-f`/`--config`,
//! default `config.yaml`) are overridden by `MESHD_`-prefixed environment
//! variables, with `__` separating nested keys (e.g. `MESHD_PORT=8080`).

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::Error;

/// Command line arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Point cloud to mesh reconstruction service")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short = 'f', long, env = "MESHD_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Validate the configuration and exit without starting the server
    #[arg(long)]
    pub validate: bool,
}

/// Which reconstruction engine the `/mesh` endpoint runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Ball pivoting: general surfaces, requires oriented normals.
    #[default]
    BallPivoting,
    /// Alpha shape: planar projection triangulation, no normals needed.
    AlphaShape,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address to bind the HTTP listener to.
    pub host: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Reconstruction engine used by `/mesh`.
    pub engine: Engine,
    /// Directory where incoming clouds are persisted before processing.
    pub uploads_dir: PathBuf,
    /// Directory where reconstructed meshes are written.
    pub outputs_dir: PathBuf,
    /// Maximum accepted request body size in bytes.
    pub max_body_size_bytes: usize,
    /// CORS allowed origins. `"*"` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    /// Neighborhood size for PCA normal estimation.
    pub normal_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            engine: Engine::default(),
            uploads_dir: PathBuf::from("uploads"),
            outputs_dir: PathBuf::from("outputs"),
            max_body_size_bytes: 50 * 1024 * 1024,
            cors_allowed_origins: vec!["*".to_string()],
            normal_k: 30,
        }
    }
}

impl Config {
    /// Load configuration from the YAML file and environment, then validate.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Config = figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), Error> {
        if self.port == 0 {
            return Err(Error::Internal(anyhow::anyhow!("Config validation: port must be non-zero")));
        }
        if self.max_body_size_bytes == 0 {
            return Err(Error::Internal(anyhow::anyhow!(
                "Config validation: max_body_size_bytes must be non-zero"
            )));
        }
        if self.normal_k == 0 {
            return Err(Error::Internal(anyhow::anyhow!("Config validation: normal_k must be non-zero")));
        }
        Ok(())
    }

    /// The socket address string the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the figment that backs [`Config::load`]. Exposed separately so tests
/// can extract without touching the real environment.
pub fn figment(args: &Args) -> Figment {
    Figment::new()
        .merge(Yaml::file(&args.config))
        .merge(Env::prefixed("MESHD_").split("__"))
}
