pub mod approot;
pub mod input_parse;
pub mod outfmt;

pub use approot::{run_acb_app_to_console, Options};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
