//! Configuration of the toolchain invocation.
use std::env::var;
use std::path::PathBuf;
use std::time::Duration;

/// Sets a numeric configuration field based on an environment variable.
macro_rules! set_from_env {
    ($config:expr, $field:ident, $key:expr, $value_type:ty) => {{
        if let Ok(raw_value) = var(concat!("RUNTIME_COMPILER_", $key)) {
            if let Ok(value) = raw_value.parse::<$value_type>() {
                if value > 0 {
                    $config.$field = value;
                }
            }
        };
    }};
}

/// Sets a path or name configuration field based on an environment variable.
macro_rules! set_string_from_env {
    ($config:expr, $field:ident, $key:expr) => {{
        if let Ok(value) = var(concat!("RUNTIME_COMPILER_", $key)) {
            if !value.is_empty() {
                $config.$field = value.into();
            }
        };
    }};
}

/// The program to use when none is specified.
const DEFAULT_TOOLCHAIN: &str = "clang++";

/// Flags that produce an unoptimized dynamic library with debug symbols, and
/// with all symbols hidden unless exported explicitly.
const DEFAULT_FLAGS: [&str; 5] =
    ["-g", "-O0", "-fvisibility=hidden", "-Xlinker", "-dylib"];

/// The directory (relative to the working directory) that holds intermediate
/// build artifacts.
const DEFAULT_INTERMEDIATE_DIRECTORY: &str = "Runtime";

/// The number of bytes to read from a channel in a single read.
const DEFAULT_READ_SIZE: usize = 512;

/// The smallest and largest read sizes we allow.
const MIN_READ_SIZE: usize = 64;
const MAX_READ_SIZE: usize = 64 * 1024;

/// How long `wait()` sleeps on a channel before checking the process again.
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// How the output streams of the toolchain are routed to the logger.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// STDOUT and STDERR share a single channel, and all output is logged as
    /// informational.
    Merged,

    /// STDOUT and STDERR use separate channels. STDOUT is logged as
    /// informational, STDERR is logged as errors.
    Split,
}

pub struct Config {
    /// The toolchain executable to run.
    pub toolchain: PathBuf,

    /// The flags passed to the toolchain before any request specific
    /// arguments.
    pub flags: Vec<String>,

    /// The directory to store intermediate files in. This directory is
    /// cleared when a compiler is initialised.
    pub intermediate_directory: PathBuf,

    /// The way STDOUT and STDERR are routed.
    pub output: Output,

    /// The amount of bytes to read per read from a channel.
    pub read_size: usize,

    /// The maximum time `wait()` sleeps before checking if the process
    /// terminated, even if no output is produced.
    pub wait_interval: Duration,
}

impl Config {
    pub fn new() -> Config {
        Config {
            toolchain: PathBuf::from(DEFAULT_TOOLCHAIN),
            flags: DEFAULT_FLAGS.iter().map(|v| v.to_string()).collect(),
            intermediate_directory: PathBuf::from(
                DEFAULT_INTERMEDIATE_DIRECTORY,
            ),
            output: Output::Merged,
            read_size: DEFAULT_READ_SIZE,
            wait_interval: DEFAULT_WAIT_INTERVAL,
        }
    }

    pub fn from_env() -> Config {
        let mut config = Config::new();

        set_string_from_env!(config, toolchain, "TOOLCHAIN");
        set_string_from_env!(
            config,
            intermediate_directory,
            "INTERMEDIATE_DIRECTORY"
        );
        set_from_env!(config, read_size, "READ_SIZE", usize);

        config.verify();
        config
    }

    /// Returns the file extension of object files produced by the toolchain.
    pub fn object_file_extension(&self) -> &'static str {
        ".o"
    }

    pub(crate) fn verify(&mut self) {
        self.read_size = self.read_size.clamp(MIN_READ_SIZE, MAX_READ_SIZE);
    }
}
