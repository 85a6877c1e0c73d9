//! ftp_harness is an FTP client plus the helpers an end-to-end suite needs to
//! drive an FTP server running inside an emulated console.
//!
//! ### Usage
//!
//! Connect, log in and clear out a directory tree:
//!
//! ```rust,no_run
//! use ftp_harness::{remove_tree, FtpStream};
//!
//! let mut ftp_stream = FtpStream::connect("127.0.0.1:21").unwrap_or_else(|err|
//!     panic!("{}", err)
//! );
//! ftp_stream.login("xbox", "xbox").unwrap();
//! remove_tree(&mut ftp_stream, "/E/dir").unwrap();
//! let _ = ftp_stream.quit();
//! ```
//!
//! The `harness` module ties a [`HarnessConfig`] to the collaborators that
//! boot the console and runs the checks the suite is made of.

mod data_stream;
mod ftp;
pub mod config;
pub mod harness;
pub mod listing;
pub mod remove;
pub mod status;
pub mod types;

pub use self::config::HarnessConfig;
pub use self::ftp::FtpStream;
pub use self::harness::{Harness, HarnessError, Session};
pub use self::listing::{EntryKind, ListEntry, ListingFormat};
pub use self::remove::{read_dir, remove_tree, remove_tree_with, RemoteFs};
pub use self::types::{ErrorKind, FileType, FtpError, Mode, Result};
