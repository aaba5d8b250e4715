use crate::error::Fault;
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::File;
use std::path::Path;

/// send everything to a file; stdout/stderr belong to the terminal surface
pub fn init(path: &Path, level: LevelFilter) -> Result<(), Fault> {
    let file = File::create(path)?;
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Off)
        .build();
    WriteLogger::init(level, config, file)?;
    Ok(())
}
