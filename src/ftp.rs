//! FTP module.

use std::borrow::Cow;
use std::io::{self, copy, BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::str::FromStr;

use chrono::offset::TimeZone;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, trace};
use regex::{Captures, Regex};

use super::data_stream::{DataChannel, DataStream};
use super::status;
use super::types::{FileType, FtpError, Line, Mode, Result};

lazy_static! {
    // This regex extracts IP and Port details from PASV command response.
    // The regex looks for the pattern (h1,h2,h3,h4,p1,p2).
    static ref PORT_RE: Regex = Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").unwrap();

    // This regex extracts modification time from MDTM command response.
    static ref MDTM_RE: Regex = Regex::new(r"\b(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})\b").unwrap();

    // This regex extracts file size from SIZE command response.
    static ref SIZE_RE: Regex = Regex::new(r"\s+(\d+)\s*$").unwrap();
}

/// Stream to interface with the FTP server. This interface is only for the command stream.
#[derive(Debug)]
pub struct FtpStream {
    reader: BufReader<TcpStream>,
    mode: Mode,
}

impl FtpStream {
    /// Creates an FTP Stream and waits for the server greeting.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<FtpStream> {
        let stream = TcpStream::connect(addr)?;
        let mut ftp_stream = FtpStream {
            reader: BufReader::new(stream),
            mode: Mode::default(),
        };
        ftp_stream.read_response(status::READY)?;
        Ok(ftp_stream)
    }

    /// Selects how data connections are opened for subsequent transfers.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns a reference to the underlying TcpStream.
    ///
    /// Example:
    /// ```no_run
    /// use std::time::Duration;
    /// use ftp_harness::FtpStream;
    ///
    /// let stream = FtpStream::connect("127.0.0.1:21")
    ///                        .expect("Couldn't connect to the server...");
    /// stream.get_ref().set_read_timeout(Some(Duration::from_secs(10)))
    ///                 .expect("set_read_timeout call failed");
    /// ```
    pub fn get_ref(&self) -> &TcpStream {
        self.reader.get_ref()
    }

    /// Execute command which sends data back in a separate stream, and wait
    /// for the server to acknowledge it with one of `open_codes`.
    fn data_command(&mut self, cmd: &str, open_codes: &[u32]) -> Result<DataStream> {
        let channel = match self.mode {
            Mode::Passive => DataChannel::Passive(self.pasv()?),
            Mode::Active => DataChannel::Active(self.port()?),
        };
        self.write_str(cmd)?;
        match channel {
            // Some servers only answer once the passive connection is made.
            DataChannel::Passive(_) => {
                let stream = channel.open()?;
                self.read_response_in(open_codes)?;
                Ok(stream)
            }
            // A rejected command never gets a connection, so accept only after the reply.
            DataChannel::Active(_) => {
                self.read_response_in(open_codes)?;
                Ok(channel.open()?)
            }
        }
    }

    /// Log in to the FTP server.
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.write_str(format!("USER {}\r\n", user))?;
        let Line(code, _) = self.read_response_in(&[status::LOGGED_IN, status::NEED_PASSWORD])?;
        if code == status::NEED_PASSWORD {
            self.write_str(format!("PASS {}\r\n", password))?;
            self.read_response(status::LOGGED_IN)?;
        }
        Ok(())
    }

    /// Change the current directory to the path specified.
    pub fn cwd(&mut self, path: &str) -> Result<()> {
        self.write_str(format!("CWD {}\r\n", path))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK).map(|_| ())
    }

    /// Move the current directory to the parent directory.
    pub fn cdup(&mut self) -> Result<()> {
        self.write_str("CDUP\r\n")?;
        self.read_response_in(&[status::COMMAND_OK, status::REQUESTED_FILE_ACTION_OK])
            .map(|_| ())
    }

    /// Gets the current directory
    pub fn pwd(&mut self) -> Result<String> {
        self.write_str("PWD\r\n")?;
        let Line(_, content) = self.read_response(status::PATH_CREATED)?;
        match (content.find('"'), content.rfind('"')) {
            (Some(begin), Some(end)) if begin < end => Ok(content[begin + 1..end].to_string()),
            _ => Err(FtpError::InvalidResponse(format!("Invalid PWD Response: {}", content))),
        }
    }

    /// This does nothing. This is usually just used to keep the connection open.
    pub fn noop(&mut self) -> Result<()> {
        self.write_str("NOOP\r\n")?;
        self.read_response(status::COMMAND_OK).map(|_| ())
    }

    /// Returns the system type the server reports, e.g. `UNIX type: L8`.
    pub fn syst(&mut self) -> Result<String> {
        self.write_str("SYST\r\n")?;
        let Line(_, content) = self.read_response(status::NAME)?;
        Ok(content.get(4..).unwrap_or("").to_string())
    }

    /// This creates a new directory on the server.
    ///
    /// Servers answer with either 257 or 250; both count as success.
    pub fn mkdir(&mut self, pathname: &str) -> Result<()> {
        self.write_str(format!("MKD {}\r\n", pathname))?;
        self.read_response_in(&[status::PATH_CREATED, status::REQUESTED_FILE_ACTION_OK])
            .map(|_| ())
    }

    /// Runs the PASV command.
    ///
    /// Only the port of the reply is used. The host is taken from the control
    /// connection, since a server behind NAT advertises an address the client
    /// cannot reach.
    fn pasv(&mut self) -> Result<SocketAddr> {
        self.write_str("PASV\r\n")?;
        // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
        let Line(_, line) = self.read_response(status::PASSIVE_MODE)?;
        let invalid = || FtpError::InvalidResponse(format!("Invalid PASV response: {}", line));
        let caps = PORT_RE.captures(&line).ok_or_else(invalid)?;
        let mut fields = [0u8; 6];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = caps[i + 1].parse().map_err(|_| invalid())?;
        }
        let port = (u16::from(fields[4]) << 8) | u16::from(fields[5]);
        let peer = self.get_ref().peer_addr()?;
        Ok(SocketAddr::new(peer.ip(), port))
    }

    /// Runs the PORT command for a fresh listener on the control connection's local address.
    fn port(&mut self) -> Result<TcpListener> {
        let ip = self.get_ref().local_addr()?.ip();
        let listener = TcpListener::bind((ip, 0))?;
        let addr = listener.local_addr()?;
        let octets = match addr.ip() {
            IpAddr::V4(v4) => v4.octets(),
            IpAddr::V6(v6) => {
                return Err(FtpError::ConnectionError(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("PORT needs an IPv4 control connection, got {}", v6),
                )))
            }
        };
        let port = addr.port();
        self.write_str(format!(
            "PORT {},{},{},{},{},{}\r\n",
            octets[0],
            octets[1],
            octets[2],
            octets[3],
            port >> 8,
            port & 0xff
        ))?;
        self.read_response(status::COMMAND_OK)?;
        Ok(listener)
    }

    /// Sets the type of file to be transferred. That is the implementation
    /// of `TYPE` command.
    pub fn transfer_type(&mut self, file_type: FileType) -> Result<()> {
        self.write_str(format!("TYPE {}\r\n", file_type))?;
        self.read_response(status::COMMAND_OK).map(|_| ())
    }

    /// Quits the current FTP session.
    pub fn quit(&mut self) -> Result<()> {
        self.write_str("QUIT\r\n")?;
        self.read_response(status::CLOSING).map(|_| ())
    }

    /// Renames the file from_name to to_name
    pub fn rename(&mut self, from_name: &str, to_name: &str) -> Result<()> {
        self.write_str(format!("RNFR {}\r\n", from_name))?;
        self.read_response(status::REQUEST_FILE_PENDING)?;
        self.write_str(format!("RNTO {}\r\n", to_name))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK).map(|_| ())
    }

    /// The implementation of `RETR` command where `filename` is the name of the file
    /// to download from FTP and `reader` is the function which operates with the
    /// data stream opened.
    ///
    /// ```no_run
    /// # use ftp_harness::{FtpStream, FtpError};
    /// # use std::io::Read;
    /// # let mut conn = FtpStream::connect("127.0.0.1:21").unwrap();
    /// assert!(conn.retr("retr.txt", |stream| {
    ///     let mut buf = Vec::new();
    ///     stream.read_to_end(&mut buf).map(|_|
    ///         assert_eq!(buf, "hello, world!".as_bytes())
    ///     ).map_err(FtpError::ConnectionError)
    /// }).is_ok());
    /// ```
    pub fn retr<F, T>(&mut self, filename: &str, reader: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>,
    {
        let retr_command = format!("RETR {}\r\n", filename);
        let res = {
            let data_stream = self.data_command(&retr_command, &[status::ABOUT_TO_SEND, status::ALREADY_OPEN])?;
            reader(&mut BufReader::new(data_stream))?
        };
        self.read_response_in(&[status::CLOSING_DATA_CONNECTION, status::REQUESTED_FILE_ACTION_OK])?;
        Ok(res)
    }

    /// Simple way to retr a file from the server. This stores the file in memory.
    pub fn simple_retr(&mut self, file_name: &str) -> Result<Cursor<Vec<u8>>> {
        self.retr(file_name, |reader| {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
        .map(Cursor::new)
    }

    /// Removes the remote pathname from the server.
    pub fn rmdir(&mut self, pathname: &str) -> Result<()> {
        self.write_str(format!("RMD {}\r\n", pathname))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK).map(|_| ())
    }

    /// Remove the remote file from the server.
    pub fn rm(&mut self, filename: &str) -> Result<()> {
        self.write_str(format!("DELE {}\r\n", filename))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK).map(|_| ())
    }

    /// This stores a file on the server.
    /// r argument must be any struct which implemenents the Read trait
    pub fn put<R: Read>(&mut self, filename: &str, r: &mut R) -> Result<()> {
        let stor_command = format!("STOR {}\r\n", filename);
        {
            let data_stream = self.data_command(&stor_command, &[status::ALREADY_OPEN, status::ABOUT_TO_SEND])?;
            let mut writer = BufWriter::new(data_stream);
            copy(r, &mut writer)?;
            writer.flush()?;
            debug!("stored {} bytes to {}", writer.get_ref().transferred(), filename);
        }
        self.read_response_in(&[status::CLOSING_DATA_CONNECTION, status::REQUESTED_FILE_ACTION_OK])
            .map(|_| ())
    }

    /// Execute a command which returns list of strings in a separate stream
    fn list_command(&mut self, cmd: Cow<'static, str>, open_code: u32, close_code: &[u32]) -> Result<Vec<String>> {
        let mut text = String::new();
        {
            let mut data_stream = self.data_command(&cmd, &[open_code, status::ALREADY_OPEN])?;
            data_stream.read_to_string(&mut text)?;
        }
        self.read_response_in(close_code)?;
        Ok(text.lines().filter(|s| !s.is_empty()).map(String::from).collect())
    }

    /// Execute `LIST` command which returns the detailed file listing in human readable format.
    /// If `pathname` is omited then the list of files in the current directory will be
    /// returned otherwise it will the list of files on `pathname`.
    pub fn list(&mut self, pathname: Option<&str>) -> Result<Vec<String>> {
        let command = pathname.map_or("LIST\r\n".into(), |path| format!("LIST {}\r\n", path).into());

        self.list_command(
            command,
            status::ABOUT_TO_SEND,
            &[status::CLOSING_DATA_CONNECTION, status::REQUESTED_FILE_ACTION_OK],
        )
    }

    /// Execute `NLST` command which returns the list of file names only.
    /// If `pathname` is omited then the list of files in the current directory will be
    /// returned otherwise it will the list of files on `pathname`.
    pub fn nlst(&mut self, pathname: Option<&str>) -> Result<Vec<String>> {
        let command = pathname.map_or("NLST\r\n".into(), |path| format!("NLST {}\r\n", path).into());

        self.list_command(
            command,
            status::ABOUT_TO_SEND,
            &[status::CLOSING_DATA_CONNECTION, status::REQUESTED_FILE_ACTION_OK],
        )
    }

    /// Retrieves the modification time of the file at `pathname` if it exists.
    /// In case the reply carries no timestamp `None` is returned.
    pub fn mdtm(&mut self, pathname: &str) -> Result<Option<DateTime<Utc>>> {
        self.write_str(format!("MDTM {}\r\n", pathname))?;
        let Line(_, content) = self.read_response(status::FILE)?;

        let caps = match MDTM_RE.captures(&content) {
            Some(caps) => caps,
            None => return Ok(None),
        };
        let year = capture(&caps, 1, &content)?;
        let (month, day) = (capture(&caps, 2, &content)?, capture(&caps, 3, &content)?);
        let (hour, minute, second) = (
            capture(&caps, 4, &content)?,
            capture(&caps, 5, &content)?,
            capture(&caps, 6, &content)?,
        );
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .map(Some)
            .ok_or_else(|| FtpError::InvalidResponse(format!("Invalid MDTM response: {}", content)))
    }

    /// Retrieves the size of the file in bytes at `pathname` if it exists.
    /// In case the reply carries no size `None` is returned.
    pub fn size(&mut self, pathname: &str) -> Result<Option<usize>> {
        self.write_str(format!("SIZE {}\r\n", pathname))?;
        let Line(_, content) = self.read_response(status::FILE)?;

        match SIZE_RE.captures(&content) {
            Some(caps) => capture(&caps, 1, &content).map(Some),
            None => Ok(None),
        }
    }

    fn write_str<S: AsRef<str>>(&mut self, command: S) -> Result<()> {
        let command = command.as_ref();
        if command.starts_with("PASS ") {
            debug!("CMD PASS ****");
        } else {
            debug!("CMD {}", command.trim_end());
        }

        let stream = self.reader.get_mut();
        stream.write_all(command.as_bytes())?;
        Ok(())
    }

    pub fn read_response(&mut self, expected_code: u32) -> Result<Line> {
        self.read_response_in(&[expected_code])
    }

    /// Retrieve a reply, skipping over the intermediate lines of a multi-line reply.
    pub fn read_response_in(&mut self, expected_code: &[u32]) -> Result<Line> {
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        trace!("FTP {}", line.trim_end());

        if line.len() < 5 {
            return Err(FtpError::InvalidResponse("error: could not read reply code".to_owned()));
        }

        let prefix = line
            .get(0..3)
            .ok_or_else(|| FtpError::InvalidResponse(format!("error: could not read reply code: {:?}", line)))?
            .to_owned();
        let code: u32 = prefix
            .parse()
            .map_err(|err| FtpError::InvalidResponse(format!("error: could not parse reply code: {}", err)))?;

        // multiple line reply
        // loop while the line does not begin with the code and a space
        let terminator = format!("{} ", prefix);
        while !line.starts_with(&terminator) {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(FtpError::InvalidResponse(format!(
                    "error: connection closed inside {} reply",
                    code
                )));
            }
            trace!("FTP {}", line.trim_end());
        }

        let reply = Line(code, line.trim_end().to_owned());
        if expected_code.contains(&code) {
            Ok(reply)
        } else {
            debug!(
                "unexpected reply {} (wanted {:?}, transient: {})",
                code,
                expected_code,
                status::is_transient(code)
            );
            Err(FtpError::UnexpectedCode {
                expected: expected_code.to_vec(),
                line: reply,
            })
        }
    }
}

fn capture<T: FromStr>(caps: &Captures<'_>, index: usize, content: &str) -> Result<T> {
    caps[index]
        .parse()
        .map_err(|_| FtpError::InvalidResponse(format!("Invalid numeric field in response: {}", content)))
}
