//! Compiling source files into dynamic libraries in the background.
use crate::config::Config;
use crate::error::Error;
use crate::handle::{CompileHandle, Outcome, Status};
use crate::logger::Logger;
use crate::request::CompileRequest;
use crate::workspace::{clear_directory, Cleanup};
use std::path::Path;

/// A type for running the toolchain in the background.
///
/// Compiling is driven by the user: `run_compile()` starts the toolchain and
/// returns immediately, after which `is_complete()` is to be called (e.g.
/// once per frame) until it returns `true`. The output of the toolchain is
/// passed to the logger as part of these calls.
///
/// Only a single compile can run at a time.
pub struct Compiler<L: Logger> {
    config: Config,
    logger: L,
    handle: CompileHandle,

    /// The result of clearing the intermediate directory.
    cleanup: Cleanup,
}

impl<L: Logger> Compiler<L> {
    /// Returns a new compiler, after removing any existing intermediate
    /// directory.
    ///
    /// Failing to remove parts of the intermediate directory isn't fatal, and
    /// the failures are available through `Compiler::cleanup()`.
    pub fn initialise(mut config: Config, logger: L) -> Compiler<L> {
        config.verify();

        let cleanup = clear_directory(&config.intermediate_directory);
        let handle = CompileHandle::new(config.read_size);

        Compiler { config, logger, handle, cleanup }
    }

    /// Starts compiling the request in the background, returning the ID of
    /// the toolchain process.
    ///
    /// If a compile is already running, an error is returned and the running
    /// compile is left as-is. All errors are also reported to the logger.
    pub fn run_compile(
        &mut self,
        request: &CompileRequest,
    ) -> Result<u32, Error> {
        self.handle.launch(&self.config, request, &self.logger)
    }

    /// Returns `true` if the last compile finished.
    ///
    /// This method forwards any pending output to the logger and never
    /// blocks. If the compile failed to start, `false` is returned; use
    /// `Compiler::status()` to tell this apart from a compile that's still
    /// running.
    pub fn is_complete(&mut self) -> bool {
        // Errors are already reported to the logger.
        let _ = self.poll();

        self.handle.is_complete()
    }

    /// Forwards any pending output to the logger and returns the status of
    /// the last compile, without blocking.
    pub fn poll(&mut self) -> Result<Status, Error> {
        self.handle.poll(&self.logger)
    }

    /// Blocks until the running compile (if any) finishes.
    pub fn wait(&mut self) -> Result<Status, Error> {
        self.handle.wait(&self.logger, self.config.wait_interval)
    }

    /// Returns the status of the last compile as of the last poll.
    pub fn status(&self) -> Status {
        self.handle.status()
    }

    /// Returns the outcome of the last compile, if it finished.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.handle.status() {
            Status::Complete(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn object_file_extension(&self) -> &'static str {
        self.config.object_file_extension()
    }

    pub fn intermediate_directory(&self) -> &Path {
        &self.config.intermediate_directory
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn cleanup(&self) -> &Cleanup {
        &self.cleanup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Output;
    use crate::test::{shell, Recorder};
    use similar_asserts::assert_eq;
    use std::fs::{create_dir, write};
    use std::path::PathBuf;
    use std::thread::sleep;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn request() -> CompileRequest {
        CompileRequest::new("out.so").source("a.cpp").include_directory("inc")
    }

    fn wait_until_complete<L: Logger>(compiler: &mut Compiler<L>) {
        let start = Instant::now();

        while !compiler.is_complete() {
            assert!(start.elapsed() < Duration::from_secs(30));
            sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_initialise_clears_intermediate_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("Runtime");

        create_dir(&dir).unwrap();
        write(dir.join("a.o"), b"a").unwrap();
        write(dir.join("b.o"), b"b").unwrap();

        let compiler =
            Compiler::initialise(shell("true", &dir), Recorder::new());

        assert!(!dir.exists());
        assert_eq!(compiler.cleanup().removed, 2);
        assert!(compiler.cleanup().is_complete());
        assert_eq!(compiler.intermediate_directory(), dir.as_path());
    }

    #[test]
    fn test_is_complete_before_compiling() {
        let temp = tempdir().unwrap();
        let mut compiler = Compiler::initialise(
            shell("true", &temp.path().join("Runtime")),
            Recorder::new(),
        );

        assert!(!compiler.is_complete());
        assert!(!compiler.is_complete());
        assert_eq!(compiler.status(), Status::Idle);
        assert_eq!(compiler.outcome(), None);
        assert!(compiler.logger().messages().is_empty());
    }

    #[test]
    fn test_run_compile() {
        let temp = tempdir().unwrap();
        let mut compiler = Compiler::initialise(
            shell(
                "echo compiling; echo 'warning: x' >&2",
                &temp.path().join("Runtime"),
            ),
            Recorder::new(),
        );
        let pid = compiler.run_compile(&request()).unwrap();

        assert_eq!(compiler.status(), Status::Running(pid));
        wait_until_complete(&mut compiler);

        assert!(compiler.is_complete());
        assert!(compiler.outcome().unwrap().success());
        assert_eq!(
            compiler.logger().output(),
            "compiling\nwarning: x\n".to_string()
        );
    }

    #[test]
    fn test_run_compile_produces_output_file() {
        let temp = tempdir().unwrap();
        let output = temp.path().join("out.so");
        let mut compiler = Compiler::initialise(
            // The script receives "-o PATH SOURCE" as its arguments.
            shell("echo library > \"$2\"", &temp.path().join("Runtime")),
            Recorder::new(),
        );
        let req = CompileRequest::new(&output).source("a.cpp");

        compiler.run_compile(&req).unwrap();

        let status = compiler.wait().unwrap();

        assert!(matches!(status, Status::Complete(o) if o.success()));
        assert!(output.is_file());
    }

    #[test]
    fn test_run_compile_while_running() {
        let temp = tempdir().unwrap();
        let mut compiler = Compiler::initialise(
            shell("sleep 1", &temp.path().join("Runtime")),
            Recorder::new(),
        );
        let pid = compiler.run_compile(&request()).unwrap();

        assert!(matches!(
            compiler.run_compile(&request()),
            Err(Error::AlreadyRunning { pid: p }) if p == pid
        ));
        assert_eq!(compiler.status(), Status::Running(pid));
        assert!(matches!(compiler.wait(), Ok(Status::Complete(_))));
        assert_eq!(compiler.logger().errors().len(), 1);
    }

    #[test]
    fn test_run_compile_with_missing_toolchain() {
        let temp = tempdir().unwrap();
        let mut config = shell("true", &temp.path().join("Runtime"));

        config.toolchain = PathBuf::from("/this/toolchain/does/not/exist");

        let mut compiler = Compiler::initialise(config, Recorder::new());

        assert!(matches!(
            compiler.run_compile(&request()),
            Err(Error::Spawn { .. })
        ));
        assert!(!compiler.is_complete());
        assert_eq!(compiler.status(), Status::Failed);
        assert_eq!(compiler.wait().unwrap(), Status::Failed);
        assert_eq!(compiler.logger().errors().len(), 1);
    }

    #[test]
    fn test_run_compile_with_split_output() {
        let temp = tempdir().unwrap();
        let mut config = shell(
            "echo out; echo err >&2; exit 1",
            &temp.path().join("Runtime"),
        );

        config.output = Output::Split;

        let mut compiler = Compiler::initialise(config, Recorder::new());

        compiler.run_compile(&request()).unwrap();
        wait_until_complete(&mut compiler);

        assert_eq!(compiler.outcome().unwrap().code(), Some(1));
        assert_eq!(compiler.logger().output(), "out\n".to_string());
        assert_eq!(compiler.logger().errors(), vec!["err\n".to_string()]);
    }

    #[test]
    fn test_object_file_extension() {
        let temp = tempdir().unwrap();
        let compiler = Compiler::initialise(
            shell("true", &temp.path().join("Runtime")),
            Recorder::new(),
        );

        assert_eq!(compiler.object_file_extension(), ".o");
    }

    #[test]
    fn test_config_is_verified() {
        let temp = tempdir().unwrap();
        let mut config = shell("true", &temp.path().join("Runtime"));

        config.read_size = 0;

        let compiler = Compiler::initialise(config, Recorder::new());

        assert!(compiler.config().read_size > 0);
    }
}
