//! A scripted FTP server on loopback that answers like the console's
//! server: 553 for refused file actions, 250 for MKD, listings with seven
//! metadata columns, and 502 for PASV, SIZE, MDTM, NOOP and QUIT.
//!
//! [`FakeServer::enable_extensions`] turns on PASV, SIZE, MDTM and NOOP so
//! the client paths the console lacks can still be exercised.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub const DRIVES: [&str; 6] = ["C", "E", "F", "X", "Y", "Z"];

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = Arc<Mutex<BTreeMap<String, Node>>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct FakeServer {
    addr: SocketAddr,
    tree: Tree,
    commands: Arc<Mutex<Vec<String>>>,
    dot_entries: Arc<AtomicBool>,
    extensions: Arc<AtomicBool>,
}

impl FakeServer {
    /// Starts a server whose root holds each of `drives` as an empty directory.
    pub fn start(drives: &[&str]) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = FakeServer {
            addr,
            tree: Arc::new(Mutex::new(BTreeMap::new())),
            commands: Arc::new(Mutex::new(Vec::new())),
            dot_entries: Arc::new(AtomicBool::new(false)),
            extensions: Arc::new(AtomicBool::new(false)),
        };
        for drive in drives {
            server.mkdir(&format!("/{}", drive));
        }

        let (tree, commands, dots, extensions) = (
            server.tree.clone(),
            server.commands.clone(),
            server.dot_entries.clone(),
            server.extensions.clone(),
        );
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };
                let connection = Connection {
                    reader: BufReader::new(stream.try_clone().unwrap()),
                    writer: stream,
                    tree: tree.clone(),
                    commands: commands.clone(),
                    dot_entries: dots.clone(),
                    extensions: extensions.clone(),
                    cwd: "/".to_owned(),
                    data: None,
                    rename_from: None,
                };
                thread::spawn(move || {
                    let _ = connection.serve();
                });
            }
        });
        server
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn mkdir(&self, path: &str) {
        self.tree.lock().unwrap().insert(path.to_owned(), Node::Dir);
    }

    pub fn write(&self, path: &str, content: &[u8]) {
        self.tree
            .lock()
            .unwrap()
            .insert(path.to_owned(), Node::File(content.to_vec()));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.tree.lock().unwrap().contains_key(path)
    }

    /// Makes directory listings start with `.` and `..`.
    pub fn list_dot_entries(&self, enabled: bool) {
        self.dot_entries.store(enabled, Ordering::SeqCst);
    }

    /// Answers PASV, SIZE, MDTM and NOOP instead of refusing them with 502.
    pub fn enable_extensions(&self) {
        self.extensions.store(true, Ordering::SeqCst);
    }

    /// Every command line received so far, across all connections.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

enum DataSource {
    Passive(TcpListener),
    Active(SocketAddr),
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    tree: Tree,
    commands: Arc<Mutex<Vec<String>>>,
    dot_entries: Arc<AtomicBool>,
    extensions: Arc<AtomicBool>,
    cwd: String,
    data: Option<DataSource>,
    rename_from: Option<String>,
}

fn listing_line(name: &str, node: &Node) -> String {
    match node {
        Node::Dir => format!("drwxr-xr-x 1 XBOX XBOX 0 2020-03-02 10:41 {}", name),
        Node::File(content) => format!("-rwxr-xr-x 1 XBOX XBOX {} 2021-6-9 8:5 {}", content.len(), name),
    }
}

impl Connection {
    fn reply(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(format!("{}\r\n", text).as_bytes())
    }

    fn serve(mut self) -> io::Result<()> {
        self.reply("220-Console FTP")?;
        self.reply("220 Please enter your login name now.")?;
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end().to_owned();
            self.commands.lock().unwrap().push(line.clone());
            let (cmd, arg) = match line.find(' ') {
                Some(i) => (line[..i].to_owned(), line[i + 1..].to_owned()),
                None => (line.clone(), String::new()),
            };

            let extended = matches!(cmd.as_str(), "PASV" | "SIZE" | "MDTM" | "NOOP");
            if extended && !self.extensions.load(Ordering::SeqCst) {
                let text = format!("502 {} not implemented.", cmd);
                self.reply(&text)?;
                continue;
            }

            match cmd.as_str() {
                "USER" => self.reply("331 Password required.")?,
                "PASS" if arg == "xbox" => self.reply("230 User logged in, proceed.")?,
                "PASS" => self.reply("530 login authentication failed.")?,
                "PWD" => {
                    let text = format!("257 \"{}\" is current directory", self.cwd);
                    self.reply(&text)?
                }
                "CWD" => self.change_dir(&arg)?,
                "CDUP" => self.change_dir("..")?,
                "TYPE" => self.reply("200 Type set to IMAGE")?,
                "SYST" => self.reply("215 UNIX type: L8")?,
                "NOOP" => self.reply("200 NOOP ok.")?,
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0")?;
                    let port = listener.local_addr()?.port();
                    self.data = Some(DataSource::Passive(listener));
                    // Advertise an address nobody can reach, like a console behind NAT.
                    let text = format!("227 Entering Passive Mode (10,0,2,15,{},{}).", port >> 8, port & 0xff);
                    self.reply(&text)?
                }
                "PORT" => {
                    let fields: Vec<u16> = arg.split(',').filter_map(|f| f.trim().parse().ok()).collect();
                    if fields.len() == 6 {
                        let ip = [fields[0] as u8, fields[1] as u8, fields[2] as u8, fields[3] as u8];
                        let addr = SocketAddr::from((ip, fields[4] * 256 + fields[5]));
                        self.data = Some(DataSource::Active(addr));
                        self.reply("200 Port command ok.")?
                    } else {
                        self.reply("501 Syntax error in parameters.")?
                    }
                }
                "LIST" => self.send_listing(&arg, false)?,
                "NLST" => self.send_listing(&arg, true)?,
                "RETR" => self.send_file(&arg)?,
                "STOR" => self.receive_file(&arg)?,
                "DELE" => self.delete(&arg)?,
                "RMD" => self.remove_dir(&arg)?,
                "MKD" => self.make_dir(&arg)?,
                "RNFR" => {
                    self.rename_from = Some(self.resolve(&arg));
                    self.reply("350 File action pending further information.")?
                }
                "RNTO" => self.rename_to(&arg)?,
                "SIZE" => match self.file(&arg) {
                    Some(content) => {
                        let text = format!("213 {}", content.len());
                        self.reply(&text)?
                    }
                    None => self.reply("550 Could not get file size.")?,
                },
                "MDTM" => match self.file(&arg) {
                    Some(_) => self.reply("213 20200302104100")?,
                    None => self.reply("550 Could not get file modification time.")?,
                },
                _ => {
                    let text = format!("502 {} not implemented.", cmd);
                    self.reply(&text)?
                }
            }
        }
    }

    fn resolve(&self, arg: &str) -> String {
        let joined = if arg.starts_with('/') {
            arg.to_owned()
        } else {
            format!("{}{}", self.cwd, arg)
        };
        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                part => parts.push(part),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || matches!(self.tree.lock().unwrap().get(path), Some(Node::Dir))
    }

    fn file(&self, arg: &str) -> Option<Vec<u8>> {
        match self.tree.lock().unwrap().get(&self.resolve(arg)) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    fn children(&self, path: &str) -> Vec<(String, Node)> {
        let prefix = if path == "/" { "/".to_owned() } else { format!("{}/", path) };
        self.tree
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(p, node)| {
                let rest = p.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some((rest.to_owned(), node.clone()))
                }
            })
            .collect()
    }

    fn parent_is_dir(&self, path: &str) -> bool {
        match path.rfind('/') {
            Some(0) | None => false,
            Some(i) => self.is_dir(&path[..i]),
        }
    }

    fn open_data(&mut self) -> io::Result<TcpStream> {
        match self.data.take() {
            Some(DataSource::Passive(listener)) => Ok(listener.accept()?.0),
            Some(DataSource::Active(addr)) => TcpStream::connect(addr),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no data connection")),
        }
    }

    fn send_listing(&mut self, arg: &str, names_only: bool) -> io::Result<()> {
        let path = self.resolve(arg);
        let mut lines = Vec::new();
        // A missing directory lists as empty, the way the console does it.
        if self.is_dir(&path) {
            if !names_only && path != "/" && self.dot_entries.load(Ordering::SeqCst) {
                lines.push(listing_line(".", &Node::Dir));
                lines.push(listing_line("..", &Node::Dir));
            }
            for (name, node) in self.children(&path) {
                lines.push(if names_only { name } else { listing_line(&name, &node) });
            }
        }

        self.reply("150 Opening ASCII data connection for ls")?;
        let mut data = self.open_data()?;
        for line in &lines {
            data.write_all(format!("{}\r\n", line).as_bytes())?;
        }
        drop(data);
        self.reply("226 Data transfer finished successfully. Data connection closed.")
    }

    fn send_file(&mut self, arg: &str) -> io::Result<()> {
        match self.file(arg) {
            Some(content) => {
                let text = format!("150 Sending file {}", arg);
                self.reply(&text)?;
                let mut data = self.open_data()?;
                data.write_all(&content)?;
                drop(data);
                self.reply("226 Data transfer finished successfully. Data connection closed.")
            }
            None => {
                self.data = None;
                self.reply("553 Requested action not taken.")
            }
        }
    }

    fn receive_file(&mut self, arg: &str) -> io::Result<()> {
        let path = self.resolve(arg);
        if !self.parent_is_dir(&path) || self.is_dir(&path) {
            self.data = None;
            return self.reply("553 Requested action not taken.");
        }
        let text = format!("150 Receiving file {}", arg);
        self.reply(&text)?;
        let mut data = self.open_data()?;
        let mut content = Vec::new();
        data.read_to_end(&mut content)?;
        self.tree.lock().unwrap().insert(path, Node::File(content));
        self.reply("226 Data transfer finished successfully. Data connection closed.")
    }

    fn change_dir(&mut self, arg: &str) -> io::Result<()> {
        let path = self.resolve(arg);
        if self.is_dir(&path) {
            self.cwd = if path == "/" { path } else { format!("{}/", path) };
            let text = format!("250 \"{}\" is current directory.", self.cwd);
            self.reply(&text)
        } else {
            self.reply("550 No such directory.")
        }
    }

    fn delete(&mut self, arg: &str) -> io::Result<()> {
        let path = self.resolve(arg);
        let removed = {
            let mut tree = self.tree.lock().unwrap();
            let is_file = matches!(tree.get(&path), Some(Node::File(_)));
            if is_file {
                tree.remove(&path);
            }
            is_file
        };
        if removed {
            self.reply("250 Requested file action ok.")
        } else {
            self.reply("553 Requested action not taken.")
        }
    }

    fn remove_dir(&mut self, arg: &str) -> io::Result<()> {
        let path = self.resolve(arg);
        let removable = path != "/" && self.is_dir(&path) && self.children(&path).is_empty();
        if removable {
            self.tree.lock().unwrap().remove(&path);
            self.reply("250 Requested file action ok.")
        } else {
            self.reply("553 Requested action not taken.")
        }
    }

    fn make_dir(&mut self, arg: &str) -> io::Result<()> {
        let path = self.resolve(arg);
        let exists = self.tree.lock().unwrap().contains_key(&path);
        if !exists && self.parent_is_dir(&path) {
            self.tree.lock().unwrap().insert(path, Node::Dir);
            self.reply("250 Requested file action ok.")
        } else {
            self.reply("553 Requested action not taken.")
        }
    }

    fn rename_to(&mut self, arg: &str) -> io::Result<()> {
        let to = self.resolve(arg);
        let from = match self.rename_from.take() {
            Some(from) => from,
            None => return self.reply("553 Requested action not taken."),
        };
        let moved = {
            let mut tree = self.tree.lock().unwrap();
            let inner = format!("{}/", from);
            let keys: Vec<String> = tree
                .keys()
                .filter(|k| **k == from || k.starts_with(&inner))
                .cloned()
                .collect();
            for key in &keys {
                if let Some(node) = tree.remove(key) {
                    tree.insert(format!("{}{}", to, &key[from.len()..]), node);
                }
            }
            !keys.is_empty()
        };
        if moved {
            self.reply("250 Requested file action ok.")
        } else {
            self.reply("553 Requested action not taken.")
        }
    }
}
