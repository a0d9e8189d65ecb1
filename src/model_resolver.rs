//! Locating the detector model on disk, downloading it on first use.

use crate::error::ModelResolveError;
use log::info;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "face-overlay";

/// Return a local path for the model `name`, downloading it from `url` into
/// the cache directory when it is not there yet.
pub fn resolve(name: &str, url: &str) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, name, url)
}

pub fn resolve_in(cache_dir: &Path, name: &str, url: &str) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    info!("Downloading {} from {}", name, url);
    download(url, &cached_path)?;
    info!("Saved model to {}", cached_path.display());
    Ok(cached_path)
}

/// `$XDG_CACHE_HOME/face-overlay/models` or the platform equivalent.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let download_error = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let bytes = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(download_error)?;

    // write next to the destination and rename so a crash never leaves a truncated model
    let temp_path = dest.with_extension("part");
    let write_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };
    let mut file = fs::File::create(&temp_path).map_err(write_error(&temp_path))?;
    file.write_all(&bytes).map_err(write_error(&temp_path))?;
    file.flush().map_err(write_error(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(write_error(dest))?;
    Ok(())
}
