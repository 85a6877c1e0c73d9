//! End-to-end harness around a console running the FTP server.
//!
//! Booting the emulator and producing disk images are someone else's job.
//! They are reached through [`HddTemplate`], [`AppRunner`] and [`ConsoleApp`].
//! What lives here is the glue. It launches a fresh console, connects an
//! [`FtpStream`] to it and checks what the server reports.

use std::fmt::Debug;
use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::ConfigError;
use log::{debug, info};
use rand::Rng;
use thiserror::Error;

use super::config::HarnessConfig;
use super::ftp::FtpStream;
use super::listing::ListingFormat;
use super::remove::{read_dir, remove_tree_with};
use super::status;
use super::types::{FileType, FtpError};

/// Characters random payloads are drawn from: ASCII letters and punctuation.
const PAYLOAD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Ftp(#[from] FtpError),
    #[error("I/O: {0}")]
    Io(#[from] io::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("{what}: expected {expected}, got {actual}")]
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },
}

/// Source of pristine disk images.
pub trait HddTemplate {
    /// Returns the path of a new copy of the blank image.
    fn create_fresh_hdd(&self) -> io::Result<PathBuf>;
}

/// Boots the console with a disk and a disc.
pub trait AppRunner {
    type App: ConsoleApp;

    fn start(&self, hdd: &Path, dvd: &Path) -> io::Result<Self::App>;
}

/// A running console. Dropping it shuts the console down.
pub trait ConsoleApp {
    /// Where the console's FTP server can be reached from this host.
    fn ftp_address(&self) -> SocketAddr;
}

pub struct Harness<T, R> {
    config: HarnessConfig,
    template: T,
    runner: R,
}

impl<T, R> Harness<T, R>
where
    T: HddTemplate,
    R: AppRunner,
{
    pub fn new(config: HarnessConfig, template: T, runner: R) -> Self {
        Harness {
            config,
            template,
            runner,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Boots a console on a fresh disk and logs in to its FTP server.
    pub fn launch(&self) -> Result<Session<R::App>, HarnessError> {
        let hdd = self.template.create_fresh_hdd()?;
        info!(
            "booting {} with disk {}",
            self.config.dvd_image.display(),
            hdd.display()
        );
        let app = self.runner.start(&hdd, &self.config.dvd_image)?;
        let client = connect(app.ftp_address(), &self.config)?;
        Ok(Session {
            client,
            app,
            format: self.config.listing_format(),
        })
    }
}

/// Connects and logs in with the timeouts, mode and credentials of `config`.
pub fn connect(addr: SocketAddr, config: &HarnessConfig) -> Result<FtpStream, HarnessError> {
    info!("connecting to FTP server at {}", addr);
    let mut client = FtpStream::connect(addr)?;
    client.get_ref().set_read_timeout(Some(config.timeout()))?;
    client.get_ref().set_write_timeout(Some(config.timeout()))?;
    client.set_mode(config.mode);
    client.login(&config.username, &config.password)?;
    Ok(client)
}

/// A logged in client together with the console it talks to.
pub struct Session<A> {
    // Declared first so the connection closes before the console goes away.
    client: FtpStream,
    app: A,
    format: ListingFormat,
}

impl<A: ConsoleApp> Session<A> {
    pub fn client(&mut self) -> &mut FtpStream {
        &mut self.client
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn listing_format(&self) -> ListingFormat {
        self.format
    }

    /// Removes a remote tree using the configured listing format.
    pub fn remove_tree(&mut self, path: &str) -> Result<(), HarnessError> {
        remove_tree_with(&mut self.client, path, self.format)?;
        Ok(())
    }

    /// Says goodbye to the server, then shuts the console down.
    ///
    /// The console server answers QUIT with 502, which counts as a clean close.
    pub fn close(mut self) -> Result<(), HarnessError> {
        match self.client.quit() {
            Ok(()) => Ok(()),
            Err(err) if err.reply_code() == Some(status::NOT_IMPLEMENTED) => {
                debug!("server does not implement QUIT, dropping the connection");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn expect_eq<T>(what: &str, expected: T, actual: T) -> Result<(), HarnessError>
where
    T: PartialEq + Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::Mismatch {
            what: what.to_owned(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        })
    }
}

/// A freshly booted server sits in `/` and lists exactly the mounted drives.
pub fn expect_root_listing(client: &mut FtpStream, drives: &[String]) -> Result<(), HarnessError> {
    expect_eq("initial working directory", "/".to_owned(), client.pwd()?)?;
    expect_eq("root listing", drives.to_vec(), client.nlst(None)?)
}

/// Changing into a blank drive lands in `/<drive>/`, which is empty.
pub fn expect_empty_drive(client: &mut FtpStream, drive: &str) -> Result<(), HarnessError> {
    client.cwd(&format!("/{}", drive))?;
    expect_eq("working directory", format!("/{}/", drive), client.pwd()?)?;
    expect_eq(&format!("listing of drive {}", drive), Vec::<String>::new(), client.nlst(None)?)
}

/// Uploads `payload` to `remote` in binary mode and downloads it again.
pub fn expect_roundtrip(client: &mut FtpStream, remote: &str, payload: &[u8]) -> Result<(), HarnessError> {
    client.transfer_type(FileType::Binary)?;
    client.put(remote, &mut Cursor::new(payload))?;
    let downloaded = client.simple_retr(remote)?.into_inner();
    expect_same_bytes(&format!("content of {}", remote), payload, &downloaded)
}

fn expect_same_bytes(what: &str, expected: &[u8], actual: &[u8]) -> Result<(), HarnessError> {
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::Mismatch {
            what: what.to_owned(),
            expected: format!("\"{}\"", expected.escape_ascii()),
            actual: format!("\"{}\"", actual.escape_ascii()),
        })
    }
}

/// `name` does not appear in the listing of `parent`.
pub fn expect_absent(
    client: &mut FtpStream,
    parent: &str,
    name: &str,
    format: ListingFormat,
) -> Result<(), HarnessError> {
    let entries = read_dir(client, parent.trim_end_matches('/'), format)?;
    match entries.iter().find(|entry| entry.name == name) {
        Some(entry) => Err(HarnessError::Mismatch {
            what: format!("listing of {}", parent),
            expected: format!("no entry named {:?}", name),
            actual: entry.to_string(),
        }),
        None => Ok(()),
    }
}

/// Between 1 and `max_len` characters of ASCII letters and punctuation.
pub fn random_payload<G: Rng>(rng: &mut G, max_len: usize) -> String {
    let len = rng.gen_range(1..=max_len.max(1));
    (0..len)
        .map(|_| PAYLOAD_CHARS[rng.gen_range(0..PAYLOAD_CHARS.len())] as char)
        .collect()
}
