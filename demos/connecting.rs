use std::env;
use std::io;
use std::net::ToSocketAddrs;
use std::path::Path;

use ftp_harness::harness::{self, HarnessError};
use ftp_harness::{read_dir, remove_tree_with, HarnessConfig};

fn test_ftp(config: &HarnessConfig, addr: &str, target: &str) -> Result<(), HarnessError> {
    let addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "address did not resolve"))?;
    let mut ftp_stream = harness::connect(addr, config)?;
    println!("current dir: {}", ftp_stream.pwd()?);

    for entry in read_dir(&mut ftp_stream, "", config.listing_format())? {
        println!("  {}", entry);
    }

    let cursor = ftp_stream.simple_retr("/E/test.txt")?;
    let vec = cursor.into_inner();
    println!("got data: {}", String::from_utf8_lossy(&vec));

    ftp_stream.put("/E/my_random_file.txt", &mut "Some awesome file data man!!".as_bytes())?;

    remove_tree_with(&mut ftp_stream, target, config.listing_format())?;
    println!("removed {}", target);

    let _ = ftp_stream.quit();
    Ok(())
}

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "harness.toml".to_owned());
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:21".to_owned());
    let target = args.next().unwrap_or_else(|| "/E/dir".to_owned());

    let config = HarnessConfig::load(Path::new(&config_path)).unwrap_or_else(|err| panic!("{}", err));
    test_ftp(&config, &addr, &target).unwrap_or_else(|err| panic!("{}", err));
    println!("test successful")
}
