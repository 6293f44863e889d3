use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// A connected, bidirectional byte stream an RPC codec can run over.
///
/// One handle is used for writing and a clone for reading, so the type must
/// be able to duplicate itself.
pub trait Connection: Read + Write + Sized {
    /// Duplicate the handle (creates a new file descriptor).
    fn try_clone(&self) -> io::Result<Self>;

    /// Shut down both directions. In-flight I/O on every clone fails.
    fn shutdown(&self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> io::Result<Self> {
        std::os::unix::net::UnixStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }
}
