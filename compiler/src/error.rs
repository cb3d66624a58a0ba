//! Errors produced when launching or observing the toolchain.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The channel used for reading the output of the toolchain couldn't be
    /// created, usually because we ran out of file descriptors.
    #[error("cannot create the output channel: {0}")]
    Channel(#[source] io::Error),

    /// The toolchain process couldn't be started.
    #[error("the compiler could not be started ({program:?}): {source}")]
    Spawn { program: PathBuf, source: io::Error },

    /// The compile or link options of a request contain unbalanced quotes.
    #[error("the options {options:?} are invalid: {source}")]
    Options { options: String, source: shell_words::ParseError },

    /// A compile was requested while another one is still running.
    #[error("a compile is already running (process {pid})")]
    AlreadyRunning { pid: u32 },

    /// Checking if the toolchain process terminated failed.
    #[error("cannot check the status of the compiler process: {0}")]
    Poll(#[source] io::Error),
}

impl Error {
    /// Returns `true` if the error is the result of the system running out of
    /// resources, such as file descriptors or memory.
    pub fn is_resource_exhaustion(&self) -> bool {
        let err = match self {
            Error::Channel(_) => return true,
            Error::Spawn { source, .. } => source,
            _ => return false,
        };

        matches!(err.kind(), io::ErrorKind::OutOfMemory)
            || matches!(
                err.raw_os_error().map(rustix::io::Errno::from_raw_os_error),
                Some(
                    rustix::io::Errno::AGAIN
                        | rustix::io::Errno::NOMEM
                        | rustix::io::Errno::MFILE
                        | rustix::io::Errno::NFILE
                )
            )
    }
}
