/// Logger setup for the command-line client.
///
/// `env_logger` with the configured default filter (RUST_LOG still wins).
/// Lines go to stderr, or are appended to `log_file` when one is set.
use env_logger::{Env, Target};
use log::SetLoggerError;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::config::ClientConfig;

fn open(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn init(config: &ClientConfig) -> Result<(), SetLoggerError> {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(&config.log_filter));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            buf.timestamp_millis(),
            record.level(),
            record.target(),
            record.args().to_string().replace('\n', "\\n")
        )
    });

    match config.log_file.as_deref().map(open) {
        Some(Ok(file)) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Some(Err(e)) => {
            eprintln!("taskboard: cannot open log file, logging to stderr: {}", e);
            builder.target(Target::Stderr);
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    builder.try_init()
}
