use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvLoadOutcome {
    Loaded(PathBuf),
    Missing,
}

/// `.env` next to the data directory. Hooks run with the host project as
/// working directory, so a project's own `.env` is never read.
fn dotenv_path(data_dir: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    let base = data_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .or_else(|| home_dir.map(|home| home.join(".seamless")))?;
    Some(base.join(".env"))
}

pub fn load_dotenv() -> DotenvLoadOutcome {
    let Some(path) = dotenv_path(
        env::var_os("SEAMLESS_DATA_DIR").map(PathBuf::from),
        dirs::home_dir(),
    ) else {
        return DotenvLoadOutcome::Missing;
    };
    if path.is_file() && dotenvy::from_path(&path).is_ok() {
        return DotenvLoadOutcome::Loaded(path);
    }
    DotenvLoadOutcome::Missing
}
