//! CLI command implementations
//!
//! `load` drives the handshake and upload against any transport; `list`
//! enumerates connected cables.

mod list;
mod load;

pub use list::list_cables;
pub use load::run_load;
