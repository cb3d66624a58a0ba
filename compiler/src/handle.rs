//! Tracking the toolchain process of a single compile.
//!
//! A `CompileHandle` moves through the following states:
//!
//!     Idle -> Running -> Complete
//!        \-> Failed
//!
//! Launching a compile re-arms the handle from any state except `Running`.
//! The transition from `Running` to `Complete` only happens when polling
//! observes that the toolchain process terminated.
use crate::channel::{Channels, Writers};
use crate::command::CommandLine;
use crate::config::{Config, Output};
use crate::error::Error;
use crate::logger::Logger;
use crate::request::CompileRequest;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus, Stdio};
use std::time::Duration;

/// The result of a toolchain process that terminated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    status: ExitStatus,
}

impl Outcome {
    /// Returns `true` if the toolchain exited with a zero exit code.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Returns the exit code, if the toolchain exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Returns the signal that terminated the toolchain, if any.
    pub fn signal(&self) -> Option<i32> {
        self.status.signal()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.code(), self.signal()) {
            (Some(code), _) => write!(f, "exited with code {}", code),
            (None, Some(sig)) => write!(f, "terminated by signal {}", sig),
            _ => write!(f, "terminated"),
        }
    }
}

/// The state of a compile as observed by its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// No compile has been launched yet.
    Idle,

    /// The toolchain is running as the process with the given ID.
    Running(u32),

    /// The toolchain terminated.
    Complete(Outcome),

    /// The toolchain couldn't be started, or we lost track of it.
    Failed,
}

/// A toolchain process and the channels connected to its output.
struct Running {
    child: Child,
    channels: Channels,
}

impl Running {
    fn drain<L: Logger>(
        &mut self,
        buffer: &mut [u8],
        logger: &L,
    ) -> io::Result<()> {
        self.channels.stdout.drain(buffer, |text| logger.log_info(text))?;

        if let Some(stderr) = self.channels.stderr.as_mut() {
            stderr.drain(buffer, |text| logger.log_error(text))?;
        }

        Ok(())
    }

    fn flush<L: Logger>(&mut self, logger: &L) {
        self.channels.stdout.flush(|text| logger.log_info(text));

        if let Some(stderr) = self.channels.stderr.as_mut() {
            stderr.flush(|text| logger.log_error(text));
        }
    }
}

enum Stage {
    Idle,
    Running(Running),
    Complete(Outcome),
    Failed,
}

/// The state of a (possibly finished) toolchain process.
///
/// The read ends of the output channels are owned by the handle while the
/// toolchain runs, and are closed as soon as the handle observes that the
/// toolchain terminated.
pub struct CompileHandle {
    stage: Stage,

    /// The buffer to read output into.
    buffer: Vec<u8>,
}

impl CompileHandle {
    pub(crate) fn new(read_size: usize) -> CompileHandle {
        CompileHandle { stage: Stage::Idle, buffer: vec![0; read_size] }
    }

    pub fn status(&self) -> Status {
        match &self.stage {
            Stage::Idle => Status::Idle,
            Stage::Running(run) => Status::Running(run.child.id()),
            Stage::Complete(outcome) => Status::Complete(*outcome),
            Stage::Failed => Status::Failed,
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Complete(_))
    }

    /// Starts the toolchain for the given request, returning the ID of the
    /// process.
    ///
    /// This method returns as soon as the process is started.
    pub(crate) fn launch<L: Logger>(
        &mut self,
        config: &Config,
        request: &CompileRequest,
        logger: &L,
    ) -> Result<u32, Error> {
        self.launch_with(config, request, logger, Channels::open)
    }

    fn launch_with<L: Logger, F>(
        &mut self,
        config: &Config,
        request: &CompileRequest,
        logger: &L,
        open: F,
    ) -> Result<u32, Error>
    where
        F: FnOnce(Output) -> io::Result<(Channels, Writers)>,
    {
        if let Stage::Running(run) = &self.stage {
            let error = Error::AlreadyRunning { pid: run.child.id() };

            logger.log_error(&error.to_string());
            return Err(error);
        }

        self.stage = Stage::Idle;

        let line = match CommandLine::new(config, request) {
            Ok(line) => line,
            Err(err) => return Err(self.fail(logger, err)),
        };

        let (channels, writers) = match open(config.output) {
            Ok(res) => res,
            Err(err) => return Err(self.fail(logger, Error::Channel(err))),
        };

        let (stdout, stderr) = writers.into_stdio();
        let mut cmd = line.command();

        logger.log_info(&format!("{}\n\n", line));
        cmd.stdin(Stdio::null()).stdout(stdout).stderr(stderr);

        let spawned = cmd.spawn();

        // The command holds on to our copies of the write ends. These must be
        // closed, otherwise we never observe the end of the output.
        drop(cmd);

        match spawned {
            Ok(child) => {
                let pid = child.id();

                log::debug!("started {} as process {}", line, pid);
                self.stage = Stage::Running(Running { child, channels });
                Ok(pid)
            }
            Err(source) => {
                let program = line.program().to_path_buf();

                Err(self.fail(logger, Error::Spawn { program, source }))
            }
        }
    }

    /// Forwards any available output to the logger, then checks if the
    /// toolchain terminated.
    ///
    /// This method never blocks. If no compile is running, the current status
    /// is returned without any side effects.
    pub(crate) fn poll<L: Logger>(
        &mut self,
        logger: &L,
    ) -> Result<Status, Error> {
        let Stage::Running(run) = &mut self.stage else {
            return Ok(self.status());
        };

        if let Err(err) = run.drain(&mut self.buffer, logger) {
            return Err(self.fail(logger, Error::Poll(err)));
        }

        let status = match run.child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return Ok(Status::Running(run.child.id())),
            Err(err) => return Err(self.fail(logger, Error::Poll(err))),
        };

        // The toolchain may have written more output between draining the
        // channels and terminating.
        if let Err(err) = run.drain(&mut self.buffer, logger) {
            return Err(self.fail(logger, Error::Poll(err)));
        }

        run.flush(logger);

        let outcome = Outcome { status };

        log::debug!("process {} {}", run.child.id(), outcome);

        // This drops the channels, closing their read ends.
        self.stage = Stage::Complete(outcome);
        Ok(Status::Complete(outcome))
    }

    /// Blocks until the toolchain terminates, forwarding its output to the
    /// logger as it arrives.
    pub(crate) fn wait<L: Logger>(
        &mut self,
        logger: &L,
        interval: Duration,
    ) -> Result<Status, Error> {
        loop {
            let status = self.poll(logger)?;
            let Stage::Running(run) = &self.stage else {
                return Ok(status);
            };

            if let Err(err) = run.channels.wait(interval) {
                return Err(self.fail(logger, Error::Poll(err)));
            }
        }
    }

    /// Reports the error and moves the handle to the `Failed` state.
    ///
    /// If the toolchain is still running, it's killed and reaped, as we can
    /// no longer observe it.
    fn fail<L: Logger>(&mut self, logger: &L, error: Error) -> Error {
        log::debug!("compile failed: {}", error);
        logger.log_error(&error.to_string());

        if let Stage::Running(run) = &mut self.stage {
            let pid = run.child.id();

            // kill() fails if the process already terminated, in which case
            // we still need to reap it.
            if let Err(err) = run.child.kill() {
                log::debug!("failed to kill process {}: {}", pid, err);
            }

            if let Err(err) = run.child.wait() {
                log::warn!("failed to reap process {}: {}", pid, err);
            }
        }

        self.stage = Stage::Failed;
        error
    }
}
