//! Descriptions of what to compile.
use std::path::PathBuf;

/// A request to compile a set of source files into a single dynamic library.
///
/// A request is only borrowed when launching a compile, so the caller is free
/// to reuse or discard it afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileRequest {
    /// The source files to compile, in the order they are to be passed to
    /// the toolchain.
    pub sources: Vec<PathBuf>,

    /// The directories to search for headers.
    pub include_directories: Vec<PathBuf>,

    /// The directories to search for libraries.
    pub library_directories: Vec<PathBuf>,

    /// Extra compiler options, separated by whitespace.
    pub compile_options: String,

    /// Extra linker options, separated by whitespace.
    pub link_options: String,

    /// The path of the library to produce.
    pub output: PathBuf,
}

impl CompileRequest {
    pub fn new(output: impl Into<PathBuf>) -> CompileRequest {
        CompileRequest { output: output.into(), ..Default::default() }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn include_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_directories.push(path.into());
        self
    }

    pub fn library_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_directories.push(path.into());
        self
    }

    pub fn compile_options(mut self, options: impl Into<String>) -> Self {
        self.compile_options = options.into();
        self
    }

    pub fn link_options(mut self, options: impl Into<String>) -> Self {
        self.link_options = options.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_builder_preserves_order() {
        let req = CompileRequest::new("out.so")
            .source("b.cpp")
            .source("a.cpp")
            .include_directory("inc2")
            .include_directory("inc1")
            .library_directory("lib")
            .compile_options("-Wall")
            .link_options("-lm");

        assert_eq!(
            req.sources,
            vec![PathBuf::from("b.cpp"), PathBuf::from("a.cpp")]
        );
        assert_eq!(
            req.include_directories,
            vec![PathBuf::from("inc2"), PathBuf::from("inc1")]
        );
        assert_eq!(req.library_directories, vec![PathBuf::from("lib")]);
        assert_eq!(req.compile_options, "-Wall".to_string());
        assert_eq!(req.link_options, "-lm".to_string());
        assert_eq!(req.output, PathBuf::from("out.so"));
    }
}
