use crate::error::Result;
use chrono::prelude::*;
use serde::Serialize;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// `<root>/<tag>/<local timestamp>`, created on disk.
pub fn train_dir<P: AsRef<Path>>(root: P, tag: &str) -> Result<PathBuf> {
    let time = Local::now().format("%m-%d-%YT%H-%M-%SZ").to_string();
    let path = root.as_ref().join(tag).join(time);
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn save<T: Serialize>(path: &Path, filename: &str, value: &T) -> Result<()> {
    save_str(path, filename, &serde_json::to_string_pretty(value)?)
}

pub fn save_str(path: &Path, filename: &str, value: &str) -> Result<()> {
    let mut f = std::fs::File::create(path.join(filename))?;
    f.write_all(value.as_bytes())?;
    Ok(())
}

pub fn git_hash() -> Result<String> {
    git_hash_at(Path::new("."))
}

/// Commit checked out in the repository containing `dir`.
pub fn git_hash_at(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .arg("rev-parse")
        .arg("HEAD")
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("git rev-parse HEAD failed: {}", stderr.trim()),
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
