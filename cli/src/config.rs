use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub data_dir: PathBuf,
    pub main_db_path: PathBuf,
    pub archive_db_path: PathBuf,
    /// Latest progress snapshot, read by the widget.
    pub progress_path: PathBuf,
}

impl Config {
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "dcalt")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            main_db_path: data_dir.join("main.db"),
            archive_db_path: data_dir.join("archive.db"),
            progress_path: data_dir.join("progress.json"),
            data_dir,
        })
    }
}
