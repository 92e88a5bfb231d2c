use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

const APPLICATION_DIR: &str = "punchclock";

/// Resolves the state directory, preferring an explicit override.
pub fn resolve_application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    let path = match dir {
        Some(v) => v,
        None => default_application_path()?,
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Couldn't create state directory {path:?}")),
    }
}

fn default_application_path() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").context("APPDATA should be present on Windows")?;
        let mut path = PathBuf::from(appdata);
        path.push(APPLICATION_DIR);
        Ok(path)
    }
    #[cfg(not(windows))]
    {
        let mut path = env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|_| {
                env::var("HOME").map(|home| {
                    let mut path = PathBuf::from(home);
                    path.push(".local/state");
                    path
                })
            })
            .context("Couldn't find neither XDG_STATE_HOME nor HOME")?;
        path.push(APPLICATION_DIR);
        Ok(path)
    }
}
