use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::path::Path;

/// `RUST_LOG` wins; otherwise `info`. With a log file, everything goes
/// there instead of stderr so `--frames` output on stdout stays clean.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("logger already initialised")?;
    Ok(())
}
