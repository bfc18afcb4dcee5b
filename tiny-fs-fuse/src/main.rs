mod block_file;
mod bridge;
mod cli;

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tiny_fs::{BlockDevice, TinyFileSystem, BLOCK_SIZE};

use self::block_file::BlockFile;
use self::bridge::TinyFuse;
use self::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let fd = if cli.no_init {
        OpenOptions::new().read(true).write(true).open(&cli.image)?
    } else {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&cli.image)?;
        fd.set_len((cli.blocks * BLOCK_SIZE) as u64)?;
        fd
    };
    let device: Arc<dyn BlockDevice> = Arc::new(BlockFile(Mutex::new(fd)));

    let fs = if cli.no_init {
        TinyFileSystem::open(device)
    } else {
        TinyFileSystem::format(device, cli.blocks)
    }
    .map_err(|e| io::Error::from_raw_os_error(e.errno()))?;

    let mut options = vec![String::from("-o"), String::from("fsname=tiny-fs")];
    for option in &cli.options {
        options.push(String::from("-o"));
        options.push(option.clone());
    }
    let options: Vec<&OsStr> = options.iter().map(|o| o.as_ref()).collect();

    log::info!("mounting {:?} at {:?}", cli.image, cli.mountpoint);
    fuse::mount(TinyFuse::new(fs), &cli.mountpoint, &options)
}
