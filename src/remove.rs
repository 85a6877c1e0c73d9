//! Recursive removal of remote directory trees.

use log::{debug, info};

use super::ftp::FtpStream;
use super::listing::{ListEntry, ListingFormat};
use super::types::{FtpError, Result};

/// The calls tree removal needs from a remote filesystem.
pub trait RemoteFs {
    /// Detailed listing of the directory at `path`, one line per entry.
    fn list_lines(&mut self, path: &str) -> Result<Vec<String>>;

    fn delete_file(&mut self, path: &str) -> Result<()>;

    /// Removes the directory at `path`, which must be empty.
    fn remove_dir(&mut self, path: &str) -> Result<()>;
}

impl RemoteFs for FtpStream {
    fn list_lines(&mut self, path: &str) -> Result<Vec<String>> {
        // Some servers glob `<argument>*`; the trailing slash makes that the directory's contents.
        self.list(Some(&format!("{}/", path)))
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        self.rm(path)
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        self.rmdir(path)
    }
}

/// Lists `path` and parses every line, leaving out `.` and `..`.
///
/// The whole listing is parsed before anything is returned, so a malformed
/// line fails the call instead of being skipped.
pub fn read_dir<C>(client: &mut C, path: &str, format: ListingFormat) -> Result<Vec<ListEntry>>
where
    C: RemoteFs + ?Sized,
{
    let mut entries = Vec::new();
    for line in client.list_lines(path)? {
        let entry = format.parse(&line)?;
        if !entry.is_pseudo() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Deletes everything below `path` depth first, then `path` itself.
///
/// `path` must name an existing directory. A trailing slash is ignored. The
/// first rejected call aborts the walk and is returned as is; whatever was
/// removed before it stays removed.
///
/// ```no_run
/// use ftp_harness::{remove_tree, FtpStream};
///
/// let mut ftp_stream = FtpStream::connect("127.0.0.1:21").unwrap();
/// ftp_stream.login("xbox", "xbox").unwrap();
/// remove_tree(&mut ftp_stream, "/E/dir").unwrap();
/// ```
pub fn remove_tree<C>(client: &mut C, path: &str) -> Result<()>
where
    C: RemoteFs + ?Sized,
{
    remove_tree_with(client, path, ListingFormat::default())
}

/// [`remove_tree`] for servers whose listings use another [`ListingFormat`].
pub fn remove_tree_with<C>(client: &mut C, path: &str, format: ListingFormat) -> Result<()>
where
    C: RemoteFs + ?Sized,
{
    let root = path.trim_end_matches('/');
    if root.is_empty() {
        return Err(FtpError::InvalidPath(format!("refusing to remove {:?}", path)));
    }

    info!("removing remote tree {}", root);
    remove_dir_all(client, root, format)
}

fn remove_dir_all<C>(client: &mut C, path: &str, format: ListingFormat) -> Result<()>
where
    C: RemoteFs + ?Sized,
{
    for entry in read_dir(client, path, format)? {
        let child = format!("{}/{}", path, entry.name);
        if entry.is_dir() {
            remove_dir_all(client, &child, format)?;
        } else {
            debug!("deleting {}", child);
            client.delete_file(&child)?;
        }
    }

    debug!("removing directory {}", path);
    client.remove_dir(path)
}
