#![allow(clippy::new_without_default)]

mod channel;
mod handle;
mod workspace;


pub mod command;
pub mod compiler;
pub mod config;
pub mod error;
pub mod logger;
pub mod request;

pub use crate::compiler::Compiler;
pub use crate::config::{Config, Output};
pub use crate::error::Error;
pub use crate::handle::{Outcome, Status};
pub use crate::logger::{LogLogger, Logger};
pub use crate::request::CompileRequest;
pub use crate::workspace::{clear_directory, Cleanup, Failure};
