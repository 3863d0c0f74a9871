pub mod ops;

mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod types;
mod workflow;

// Re-export App and Config from modules
pub use app::App;
pub use app::with_deadline;
pub use config::Config;
pub use error::ErrorKind;
pub use error::WorkflowError;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
