mod block_file;
mod cli;

use std::error::Error;
use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use enumflags2::BitFlags;
use tarfs::{ListFlag, ObjectTable, TarFileSystem};

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Command},
};

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // `--help` is not a failure
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tarfs-fuse: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let fd = File::open(&cli.image).map_err(|err| format!("{}: {err}", cli.image.display()))?;
    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd)?);
    let fs = TarFileSystem::mount(&block_dev)?;
    if let Some(warning) = fs.warning() {
        log::warn!("archive is damaged, {warning}");
    }

    let mut stdout = io::stdout().lock();
    match cli.command {
        Command::Ls {
            long,
            all,
            unsorted,
            buffer,
            path,
        } => {
            let mut flags = BitFlags::empty();
            if long {
                flags |= ListFlag::Long;
            }
            if all {
                flags |= ListFlag::All;
            }
            if unsorted {
                flags |= ListFlag::Unsorted;
            }

            let mut listing = fs
                .list_dir(&path, flags)
                .map_err(|err| format!("{path}: {err}"))?;
            let mut buf = vec![0u8; buffer];
            let n = listing.render(&mut buf);
            if n < listing.required_len() {
                log::warn!(
                    "listing truncated to {n} of {} bytes",
                    listing.required_len()
                );
            }
            // drop the trailing NUL
            stdout.write_all(&buf[..n.saturating_sub(1)])?;
        }
        Command::Cat { path } => {
            let table = ObjectTable::new();
            let handle = table
                .open(&fs, &path)
                .map_err(|err| format!("{path}: {err}"))?;

            let mut buf = [0u8; 4096];
            loop {
                let n = table.read(handle, &mut buf)?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&buf[..n])?;
            }
            table.close(handle)?;
        }
    }

    stdout.flush()?;
    Ok(())
}
