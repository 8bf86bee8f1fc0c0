pub mod config;
pub mod encoder;
pub mod ipc;
pub mod logging;
pub mod loop_points;
pub mod session;

pub use config::{ConfigError, GeneratorConfig};
pub use encoder::{EncoderError, SystemRunner, ToolRunner};
pub use loop_points::{compute_loop_bounds, LabelResolution, LoopBounds, LoopError};
pub use session::{open_and_run, run_session, SessionError, SessionReport};
