//! Turning compile requests into toolchain invocations.
use crate::config::Config;
use crate::error::Error;
use crate::request::CompileRequest;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A single argument passed to the toolchain.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Argument {
    /// An argument such as a flag, rendered as-is unless it contains
    /// whitespace.
    Plain(OsString),

    /// A path, optionally preceded by a flag (e.g. `-I`), that's rendered in
    /// double quotes so paths containing spaces survive a shell.
    Quoted { flag: &'static str, path: PathBuf },
}

impl Argument {
    fn plain(value: impl AsRef<OsStr>) -> Argument {
        Argument::Plain(value.as_ref().to_os_string())
    }

    fn quoted(flag: &'static str, path: &Path) -> Argument {
        Argument::Quoted { flag, path: path.to_path_buf() }
    }

    fn to_os_string(&self) -> OsString {
        match self {
            Argument::Plain(value) => value.clone(),
            Argument::Quoted { flag, path } => {
                let mut value = OsString::from(flag);

                value.push(path);
                value
            }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Argument::Plain(value) => {
                let value = value.to_string_lossy();

                if value.contains(char::is_whitespace) {
                    write!(f, "\"{}\"", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            Argument::Quoted { flag, path } => {
                write!(f, "{}\"{}\"", flag, path.display())
            }
        }
    }
}

fn split_options(options: &str) -> Result<Vec<Argument>, Error> {
    match shell_words::split(options) {
        Ok(words) => Ok(words.iter().map(Argument::plain).collect()),
        Err(source) => {
            Err(Error::Options { options: options.to_string(), source })
        }
    }
}

/// The full command used to invoke the toolchain for a single request.
///
/// The command is executed as a program and a list of arguments, meaning the
/// arguments are never parsed by a shell. The `Display` implementation
/// produces a shell-like rendering, which is only used for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    arguments: Vec<Argument>,
}

impl CommandLine {
    /// Returns the command for the given request.
    ///
    /// The compile and link options are split into arguments the same way a
    /// POSIX shell splits words, so quoted values containing spaces are passed
    /// as a single argument. An error is returned if the quotes aren't
    /// balanced.
    pub fn new(
        config: &Config,
        request: &CompileRequest,
    ) -> Result<CommandLine, Error> {
        let mut arguments = Vec::new();

        arguments.extend(config.flags.iter().map(Argument::plain));
        arguments.extend(split_options(&request.compile_options)?);

        for dir in &request.include_directories {
            arguments.push(Argument::quoted("-I", dir));
        }

        for dir in &request.library_directories {
            arguments.push(Argument::quoted("-L", dir));
        }

        arguments.extend(split_options(&request.link_options)?);

        // Unlike the input paths, the output path is only quoted when it
        // contains whitespace.
        arguments.push(Argument::plain("-o"));
        arguments.push(Argument::plain(&request.output));

        for file in &request.sources {
            arguments.push(Argument::quoted("", file));
        }

        Ok(CommandLine { program: config.toolchain.clone(), arguments })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the arguments as they are passed to the toolchain.
    pub fn arguments(&self) -> Vec<OsString> {
        self.arguments.iter().map(Argument::to_os_string).collect()
    }

    /// Returns a `Command` that runs the toolchain, without any of its IO
    /// configured.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);

        cmd.args(self.arguments());
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program.display())?;

        for arg in &self.arguments {
            write!(f, " {}", arg)?;
        }

        Ok(())
    }
}
