use std::io::{Read, Result, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Where the data connection for the next transfer comes from.
#[derive(Debug)]
pub enum DataChannel {
    /// Connect to the address handed out by `PASV`.
    Passive(SocketAddr),
    /// Accept the server's connection on a listener announced with `PORT`.
    Active(TcpListener),
}

impl DataChannel {
    /// Opens the connection. For an active channel this blocks until the
    /// server connects, so the data command must already have been sent.
    pub fn open(self) -> Result<DataStream> {
        let stream = match self {
            DataChannel::Passive(addr) => TcpStream::connect(addr)?,
            DataChannel::Active(listener) => listener.accept()?.0,
        };
        Ok(DataStream {
            stream,
            transferred: 0,
        })
    }
}

/// Data Stream used for transfers, counting the bytes that cross it.
#[derive(Debug)]
pub struct DataStream {
    stream: TcpStream,
    transferred: u64,
}

impl DataStream {
    /// Number of bytes read or written so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.stream.read(buf)?;
        self.transferred += n as u64;
        Ok(n)
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.stream.write(buf)?;
        self.transferred += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }
}

impl Drop for DataStream {
    fn drop(&mut self) {
        log::trace!("data connection closed after {} bytes", self.transferred);
    }
}
