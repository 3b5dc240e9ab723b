//! Argument surface and global configuration for labrec
//!
//! This crate handles:
//! - The engine-owned option group (`--experiments-directory`,
//!   `--experiment-id`, `--description`) bolted onto the host's parser
//! - Splitting a parse into host args, engine options, and default args
//! - Global configuration (`~/.config/labrec/config.toml`)

mod error;
mod global;
mod surface;
mod value;

pub use error::*;
pub use global::*;
pub use surface::*;
pub use value::*;
