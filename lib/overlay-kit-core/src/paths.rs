use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "OverlayKit";

/// Config file read when no path is given on the command line
pub fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join(APP_DIR).join("config.yaml"))
}

/// Log file under the local data directory, which is created if missing
pub fn log_file_path() -> Option<PathBuf> {
    let data_dir = dirs::data_local_dir()?.join(APP_DIR);
    fs::create_dir_all(&data_dir).ok()?;
    Some(data_dir.join("overlay-kit.log"))
}
