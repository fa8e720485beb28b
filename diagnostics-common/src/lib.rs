pub mod config;
pub mod error;
pub mod geometry;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{BatchConfig, DiagnosticsConfig, InputConfig, OutputConfig, OutputFormat, PhysicsConfig, TrajectoryConfig};
pub use error::{DiagnosticsError, DiagnosticsResult};
pub use geometry::GridGeometry;
pub use snapshot::Batch;
pub use vecmath::{vec_to_angle, Vec2};
