//! One module per subcommand. Most add a `cmd_*` method to [`crate::App`]
//! that writes its user-facing result to the supplied `stdout`.

pub mod app_token;
pub mod benchtable;
pub mod comment;
pub mod label;
pub mod pull_request;
pub mod push;
pub mod sync_releases;
