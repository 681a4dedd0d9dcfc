//! Entry point for the `drtp` binary.
//!
//! Parses the command line and dispatches into server mode (receive one
//! file) or client mode (send one file).  All protocol work is delegated to
//! the library; this file owns process setup: logging, argument validation
//! and the exit path.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use drtp::files::base_name;
use drtp::packet::MAX_PAYLOAD;
use drtp::{Config, Receiver, Sender, MAX_FILE_SIZE};

/// Reliable one-file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive one file and store it in the output directory.
    Server {
        /// IP address to bind.
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: IpAddr,
        /// Port to bind, in [1024, 65535].
        #[arg(short, long, default_value_t = 8080,
              value_parser = clap::value_parser!(u16).range(1024..))]
        port: u16,
        /// Testing: discard the packet with this sequence number once.
        #[arg(short, long)]
        discard: Option<u16>,
        /// Directory to store the received file in.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Send one file to a waiting server.
    Client {
        /// Server IP address.
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: IpAddr,
        /// Server port, in [1024, 65535].
        #[arg(short, long, default_value_t = 8080,
              value_parser = clap::value_parser!(u16).range(1024..))]
        port: u16,
        /// File to send.
        #[arg(short, long)]
        file: PathBuf,
        /// Sliding window size.
        #[arg(short, long, default_value_t = 3,
              value_parser = clap::value_parser!(u16).range(1..))]
        window: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info-level protocol trace by default; RUST_LOG overrides.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.mode {
        Mode::Server { ip, port, discard, output } => {
            let mut cfg = Config::new(SocketAddr::new(ip, port)).with_output_dir(output);
            if let Some(seq) = discard {
                cfg = cfg.with_discard(seq);
            }
            let mut receiver = Receiver::bind(cfg).await?;
            let report = receiver.serve().await.context("transfer failed")?;
            log::info!("The throughput is {:.2} Mbps", report.mbps());
        }
        Mode::Client { ip, port, file, window } => {
            validate_source(&file)?;
            let cfg = Config::new(SocketAddr::new(ip, port)).with_window(window as usize);
            Sender::run(&cfg, &file).await.context("transfer failed")?;
        }
    }
    Ok(())
}

/// Client-side checks the protocol core relies on having been done.
fn validate_source(file: &Path) -> Result<()> {
    let meta = std::fs::metadata(file).with_context(|| format!("cannot read {}", file.display()))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", file.display());
    }
    if meta.len() > MAX_FILE_SIZE {
        bail!(
            "{} is {} bytes, over the {} byte limit",
            file.display(),
            meta.len(),
            MAX_FILE_SIZE
        );
    }
    match base_name(file) {
        Some(name) if name.len() <= MAX_PAYLOAD => Ok(()),
        Some(name) => bail!("file base name of {} bytes does not fit one segment", name.len()),
        None => bail!("{} has no usable base name", file.display()),
    }
}
