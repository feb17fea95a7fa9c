pub mod app;
pub mod audio;
pub mod config;
pub mod display;
pub mod error;
mod lock;
pub mod permission;
pub mod session;
pub mod telemetry;
pub mod ui;

pub(crate) use lock::lock_or_recover;
pub use app::logging::{init_logging, log_debug, log_file_path, log_panic};
pub use error::MeterError;
pub use session::{MeterSession, SessionStats};
