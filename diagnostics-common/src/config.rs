use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Locations of the simulation run's input files
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InputConfig {
    pub directory: PathBuf,
    #[serde(default = "default_radial_edges_file")]
    pub radial_edges_file: String,
    #[serde(default = "default_dimensions_file")]
    pub dimensions_file: String,
}

// Resource control for the batch loop
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig { size: default_batch_size() }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravitational constant times central mass.
    #[serde(default = "default_gm")]
    pub gm: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig { gm: default_gm() }
    }
}

// Companion trajectory log and how its columns map to (t, x, y)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TrajectoryConfig {
    #[serde(default = "default_trajectory_file")]
    pub file: String,
    /// Raw sub-steps per snapshot.
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default = "default_x_column")]
    pub x_column: i64,
    #[serde(default = "default_y_column")]
    pub y_column: i64,
    /// Negative values count from the end of the row.
    #[serde(default = "default_time_column")]
    pub time_column: i64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        TrajectoryConfig {
            file: default_trajectory_file(),
            stride: default_stride(),
            x_column: default_x_column(),
            y_column: default_y_column(),
            time_column: default_time_column(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bincode,
    Json,
    MessagePack,
}

impl OutputFormat {
    /// File extension used for arrays persisted in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bincode => "bin",
            OutputFormat::Json => "json",
            OutputFormat::MessagePack => "msgpack",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bincode" | "bin" => Some(OutputFormat::Bincode),
            "json" => Some(OutputFormat::Json),
            "messagepack" | "msgpack" => Some(OutputFormat::MessagePack),
            _ => None,
        }
    }
}

// Where and how diagnostics are written
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_export_csv")]
    pub export_csv: bool,
}

// Main configuration structure, loaded from a TOML file.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DiagnosticsConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub trajectory: Option<TrajectoryConfig>,
    pub output: OutputConfig,
}

impl DiagnosticsConfig {
    /// Configuration with every optional setting at its default.
    pub fn with_directories(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        DiagnosticsConfig {
            input: InputConfig {
                directory: input_dir.into(),
                radial_edges_file: default_radial_edges_file(),
                dimensions_file: default_dimensions_file(),
            },
            batch: BatchConfig::default(),
            physics: PhysicsConfig::default(),
            trajectory: None,
            output: OutputConfig {
                directory: output_dir.into(),
                format: OutputFormat::default(),
                export_csv: default_export_csv(),
            },
        }
    }

    /// Loads the diagnostics configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: DiagnosticsConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Checks the values the engine relies on being pre-validated.
    pub fn validate(&self) -> Result<()> {
        if self.batch.size == 0 {
            anyhow::bail!("batch.size must be greater than 0.");
        }
        if !(self.physics.gm.is_finite() && self.physics.gm > 0.0) {
            anyhow::bail!("physics.gm must be positive and finite.");
        }
        if let Some(trajectory) = &self.trajectory {
            if trajectory.stride == 0 {
                anyhow::bail!("trajectory.stride must be greater than 0.");
            }
        }
        Ok(())
    }

    pub fn radial_edges_path(&self) -> PathBuf {
        self.input.directory.join(&self.input.radial_edges_file)
    }

    pub fn dimensions_path(&self) -> PathBuf {
        self.input.directory.join(&self.input.dimensions_file)
    }

    pub fn trajectory_path(&self) -> Option<PathBuf> {
        self.trajectory.as_ref().map(|t| self.input.directory.join(&t.file))
    }
}

fn default_radial_edges_file() -> String {
    "used_rad.dat".to_string()
}

fn default_dimensions_file() -> String {
    "dims.dat".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_gm() -> f64 {
    1.0
}

fn default_trajectory_file() -> String {
    "bigplanet0.dat".to_string()
}

fn default_stride() -> usize {
    20 // raw sub-steps written between two gas outputs
}

fn default_x_column() -> i64 {
    1
}

fn default_y_column() -> i64 {
    2
}

fn default_time_column() -> i64 {
    -2
}

fn default_export_csv() -> bool {
    true
}
