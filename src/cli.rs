//! CLI domain: parse, route, and output only.
//! Editing behavior lives in the session; the route table only drives it.

mod output;
mod parse;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, EditStep};
pub use route::RunContext;
