use std::path::PathBuf;

use crate::util::basic::SError;

pub fn home_dir_path() -> Result<PathBuf, SError> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    match std::env::var(var) {
        Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
        _ => Err(format!("{} is not set", var)),
    }
}
