//! Commands Layer
//!
//! Command handlers that bridge the CLI (or any other front end) to the
//! synchronizer. Errors cross this boundary as display strings.

mod button_cmd;

pub use button_cmd::*;
