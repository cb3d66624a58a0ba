//! Non-blocking channels for reading the output of the toolchain.
use crate::config::Output;
use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::OwnedFd;
use rustix::io::{ioctl_fionbio, read, Errno};
use std::char::REPLACEMENT_CHARACTER;
use std::io;
use std::process::Stdio;
use std::str::from_utf8;
use std::thread::sleep;
use std::time::Duration;

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    use rustix::pipe::{pipe_with, PipeFlags};

    Ok(pipe_with(PipeFlags::CLOEXEC)?)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd"
)))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    use rustix::io::{fcntl_setfd, FdFlags};
    use rustix::pipe::pipe;

    let (reader, writer) = pipe()?;

    fcntl_setfd(&reader, FdFlags::CLOEXEC)?;
    fcntl_setfd(&writer, FdFlags::CLOEXEC)?;
    Ok((reader, writer))
}

/// Creates a pipe of which both ends are closed upon `exec()`, and of which
/// the read end is non-blocking.
///
/// The toolchain receives its copies of the write end through `dup2()`, which
/// clears the close-on-exec flag for the new descriptor.
fn nonblocking_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (reader, writer) = cloexec_pipe()?;

    ioctl_fionbio(&reader, true)?;
    Ok((reader, writer))
}

/// The read end of a channel.
pub(crate) struct Reader {
    fd: OwnedFd,

    /// The trailing bytes of an incomplete UTF-8 sequence, completed by the
    /// next read.
    carry: Vec<u8>,

    /// A flag indicating all writers closed their end of the channel.
    eof: bool,
}

impl Reader {
    fn new(fd: OwnedFd) -> Reader {
        Reader { fd, carry: Vec::new(), eof: false }
    }

    /// Reads all data that's currently available, passing it as text to the
    /// `emit` closure.
    ///
    /// This method never blocks: it returns as soon as reading would block,
    /// or when the end of the channel is reached.
    pub(crate) fn drain<F: FnMut(&str)>(
        &mut self,
        buffer: &mut [u8],
        mut emit: F,
    ) -> io::Result<()> {
        while !self.eof {
            match read(&self.fd, buffer) {
                Ok(0) => self.eof = true,
                Ok(size) => self.decode(&buffer[..size], &mut emit),
                Err(Errno::AGAIN) => break,
                Err(Errno::INTR) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    /// Passes any bytes of an incomplete UTF-8 sequence to `emit`.
    ///
    /// This is used when no more data will arrive, at which point the bytes
    /// are never going to form a valid sequence.
    pub(crate) fn flush<F: FnMut(&str)>(&mut self, mut emit: F) {
        if self.carry.is_empty() {
            return;
        }

        emit(&String::from_utf8_lossy(&self.carry));
        self.carry.clear();
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    fn decode<F: FnMut(&str)>(&mut self, bytes: &[u8], emit: &mut F) {
        self.carry.extend_from_slice(bytes);

        let mut text = String::new();
        let mut start = 0;

        loop {
            match from_utf8(&self.carry[start..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    start = self.carry.len();
                    break;
                }
                Err(err) => {
                    let end = start + err.valid_up_to();

                    text.push_str(
                        from_utf8(&self.carry[start..end]).unwrap_or_default(),
                    );

                    match err.error_len() {
                        Some(len) => {
                            text.push(REPLACEMENT_CHARACTER);
                            start = end + len;
                        }
                        None => {
                            start = end;
                            break;
                        }
                    }
                }
            }
        }

        self.carry.drain(..start);

        if !text.is_empty() {
            emit(&text);
        }
    }
}

/// The write ends of the channels, handed over to the toolchain.
pub(crate) struct Writers {
    pub(crate) stdout: OwnedFd,
    pub(crate) stderr: OwnedFd,
}

impl Writers {
    pub(crate) fn into_stdio(self) -> (Stdio, Stdio) {
        (Stdio::from(self.stdout), Stdio::from(self.stderr))
    }
}

/// The read ends of the channels connected to the toolchain's STDOUT and
/// STDERR.
pub(crate) struct Channels {
    /// The channel for STDOUT, or for both STDOUT and STDERR when the output
    /// is merged.
    pub(crate) stdout: Reader,

    /// The channel for STDERR, if it's not merged into STDOUT.
    pub(crate) stderr: Option<Reader>,
}

impl Channels {
    pub(crate) fn open(output: Output) -> io::Result<(Channels, Writers)> {
        let (stdout, stdout_writer) = nonblocking_pipe()?;

        match output {
            Output::Merged => {
                let stderr_writer = stdout_writer.try_clone()?;
                let chans =
                    Channels { stdout: Reader::new(stdout), stderr: None };
                let writers =
                    Writers { stdout: stdout_writer, stderr: stderr_writer };

                Ok((chans, writers))
            }
            Output::Split => {
                let (stderr, stderr_writer) = nonblocking_pipe()?;
                let chans = Channels {
                    stdout: Reader::new(stdout),
                    stderr: Some(Reader::new(stderr)),
                };
                let writers =
                    Writers { stdout: stdout_writer, stderr: stderr_writer };

                Ok((chans, writers))
            }
        }
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.stdout.is_eof()
            && self.stderr.as_ref().map_or(true, |r| r.is_eof())
    }

    /// Blocks until data is available on any of the channels, or until the
    /// timeout expires.
    ///
    /// If all channels reached their end there's nothing to wait for, in
    /// which case we just sleep for the timeout.
    pub(crate) fn wait(&self, timeout: Duration) -> io::Result<()> {
        if self.is_eof() {
            sleep(timeout);
            return Ok(());
        }

        let mut fds = Vec::with_capacity(2);

        for reader in [Some(&self.stdout), self.stderr.as_ref()]
            .into_iter()
            .flatten()
            .filter(|r| !r.is_eof())
        {
            fds.push(PollFd::new(&reader.fd, PollFlags::IN));
        }

        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;

        match poll(&mut fds, millis) {
            Ok(_) | Err(Errno::INTR) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustix::io::write;
    use similar_asserts::assert_eq;

    fn collect(reader: &mut Reader) -> String {
        let mut buf = [0_u8; 4];
        let mut out = String::new();

        reader.drain(&mut buf, |s| out.push_str(s)).unwrap();
        out
    }

    #[test]
    fn test_drain_does_not_block_without_data() {
        let (chans, _writers) = Channels::open(Output::Merged).unwrap();
        let mut reader = chans.stdout;

        assert_eq!(collect(&mut reader), String::new());
        assert!(!reader.is_eof());
    }

    #[test]
    fn test_drain_in_order() {
        let (chans, writers) = Channels::open(Output::Merged).unwrap();
        let mut reader = chans.stdout;

        write(&writers.stdout, b"hello ").unwrap();
        write(&writers.stderr, b"world").unwrap();

        assert_eq!(collect(&mut reader), "hello world".to_string());

        write(&writers.stdout, b"!").unwrap();
        assert_eq!(collect(&mut reader), "!".to_string());
    }

    #[test]
    fn test_drain_eof() {
        let (chans, writers) = Channels::open(Output::Merged).unwrap();
        let mut reader = chans.stdout;

        write(&writers.stdout, b"bye").unwrap();
        drop(writers);

        assert_eq!(collect(&mut reader), "bye".to_string());
        assert!(reader.is_eof());
    }

    #[test]
    fn test_split_channels() {
        let (chans, writers) = Channels::open(Output::Split).unwrap();
        let mut out = chans.stdout;
        let mut err = chans.stderr.unwrap();

        write(&writers.stdout, b"out").unwrap();
        write(&writers.stderr, b"err").unwrap();

        assert_eq!(collect(&mut out), "out".to_string());
        assert_eq!(collect(&mut err), "err".to_string());
    }

    #[test]
    fn test_decode_split_utf8_sequence() {
        let (chans, writers) = Channels::open(Output::Merged).unwrap();
        let mut reader = chans.stdout;
        let bytes = "aé".as_bytes();

        write(&writers.stdout, &bytes[..2]).unwrap();
        assert_eq!(collect(&mut reader), "a".to_string());

        write(&writers.stdout, &bytes[2..]).unwrap();
        assert_eq!(collect(&mut reader), "é".to_string());
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let (chans, writers) = Channels::open(Output::Merged).unwrap();
        let mut reader = chans.stdout;

        write(&writers.stdout, b"a\xFFb").unwrap();
        assert_eq!(collect(&mut reader), "a\u{FFFD}b".to_string());
    }

    #[test]
    fn test_flush_incomplete_sequence() {
        let (chans, writers) = Channels::open(Output::Merged).unwrap();
        let mut reader = chans.stdout;
        let mut out = String::new();

        write(&writers.stdout, &"é".as_bytes()[..1]).unwrap();
        assert_eq!(collect(&mut reader), String::new());

        reader.flush(|s| out.push_str(s));
        assert_eq!(out, "\u{FFFD}".to_string());

        out.clear();
        reader.flush(|s| out.push_str(s));
        assert_eq!(out, String::new());
    }

    #[test]
    fn test_wait_times_out_without_data() {
        let (chans, _writers) = Channels::open(Output::Split).unwrap();

        chans.wait(Duration::from_millis(1)).unwrap();
    }
}
