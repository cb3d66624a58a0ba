//! The sink that receives the output of the toolchain.

/// A type that receives compiler output and errors.
///
/// Loggers are supplied by the user of a `Compiler`, and are never created by
/// the compiler itself.
pub trait Logger {
    /// Logs regular output of the toolchain.
    fn log_info(&self, text: &str);

    /// Logs an error, either produced by the toolchain or by the compiler
    /// when it fails to start or observe the toolchain.
    fn log_error(&self, text: &str);
}

impl<T: Logger + ?Sized> Logger for &T {
    fn log_info(&self, text: &str) {
        (**self).log_info(text);
    }

    fn log_error(&self, text: &str) {
        (**self).log_error(text);
    }
}

impl<T: Logger + ?Sized> Logger for Box<T> {
    fn log_info(&self, text: &str) {
        (**self).log_info(text);
    }

    fn log_error(&self, text: &str) {
        (**self).log_error(text);
    }
}

/// A `Logger` that forwards everything to the `log` crate.
pub struct LogLogger;

impl Logger for LogLogger {
    fn log_info(&self, text: &str) {
        log::info!(target: "runtime_compiler::toolchain", "{}", text);
    }

    fn log_error(&self, text: &str) {
        log::error!(target: "runtime_compiler::toolchain", "{}", text);
    }
}
