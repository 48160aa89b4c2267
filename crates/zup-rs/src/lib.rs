use once_cell::sync::Lazy;

use std::{
    env,
    ffi::OsString,
    fs,
    io::Read,
    path::{PathBuf, MAIN_SEPARATOR_STR},
};

mod error;
pub use error::{ErrorKind, ZupError, FAILURE_EXIT_CODE};

mod launcher;
pub use launcher::{Launch, LaunchState};

mod logging;
pub use logging::init_tracing;

/// Environment variable naming the zupgrade install root.
pub const INSTALL_ROOT_ENV: &str = "ZUPGRADE_PATH";

/// Directory under the install root holding one subdirectory per zig version.
pub const TOOL_DIR: &str = "zig";

/// Name of the file recording the selected version, inside [`TOOL_DIR`].
pub const SELECTED_FILE: &str = "selected";

/// Install root used when `ZUPGRADE_PATH` is not set at runtime. A value baked in at build time
/// takes precedence over the platform data directory.
pub static DEFAULT_INSTALL_ROOT: Lazy<Option<PathBuf>> = Lazy::new(|| {
    if let Some(root) = option_env!("ZUPGRADE_PATH").filter(|root| !root.is_empty()) {
        return Some(PathBuf::from(root));
    }
    dirs::data_dir()
        .map(|data_dir| data_dir.join("zupgrade"))
        .or_else(|| dirs::home_dir().map(|home| home.join(".zupgrade")))
});

fn resolve_install_root(runtime: Option<OsString>) -> Option<PathBuf> {
    runtime
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
        .or_else(|| DEFAULT_INSTALL_ROOT.clone())
}

/// Where zupgrade keeps its zig installations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub install_root: PathBuf,
}

impl Config {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
        }
    }

    /// Resolves the install root once for this process: `ZUPGRADE_PATH` from the environment,
    /// then the build-time value, then the platform data directory.
    pub fn from_env() -> Result<Self, ZupError> {
        let install_root =
            resolve_install_root(env::var_os(INSTALL_ROOT_ENV)).ok_or(ZupError::InstallRootUnknown)?;
        tracing::debug!(install_root = %install_root.display(), "resolved install root");
        Ok(Self { install_root })
    }

    /// Derive path to the directory holding every installed zig version.
    pub fn tool_dir(&self) -> PathBuf {
        self.install_root.join(TOOL_DIR)
    }

    /// Derive path to the selected-version file.
    pub fn selected_version_path(&self) -> PathBuf {
        self.tool_dir().join(SELECTED_FILE)
    }

    /// Derive path to a specific zig version's directory.
    pub fn version_path(&self, version: &str) -> PathBuf {
        // Plain concatenation: an absolute `version` must not replace the root.
        let mut path = self.tool_dir().into_os_string();
        path.push(MAIN_SEPARATOR_STR);
        path.push(version);
        PathBuf::from(path)
    }

    /// Derive path to a specific zig version's executable.
    pub fn executable_path(&self, version: &str) -> PathBuf {
        self.version_path(version)
            .join(format!("zig{}", env::consts::EXE_SUFFIX))
    }
}

/// Reads the currently selected zig version. The file is re-read on every call.
///
/// Any trailing run of `\r`/`\n` is stripped; any other content is returned untouched.
pub fn current_version(config: &Config) -> Result<String, ZupError> {
    let path = config.selected_version_path();
    let mut file = fs::File::open(&path).map_err(|source| ZupError::SelectionUnreadable {
        path: path.clone(),
        source,
    })?;

    let mut content = String::new();
    if let Err(source) = file.read_to_string(&mut content) {
        return Err(ZupError::SelectionRead { path, source });
    }

    let version = content.trim_end_matches(['\r', '\n']);
    if version.is_empty() {
        return Err(ZupError::NoVersionSelected { path });
    }
    tracing::debug!(%version, selection = %path.display(), "resolved selected version");
    Ok(version.to_string())
}

/// Runs the selected zig with `args` and returns the exit code to report as our own.
pub fn dispatch<I, S>(config: &Config, args: I) -> Result<i32, ZupError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let version = current_version(config)?;
    let mut launch = Launch::new(config, &version, args)?;
    launch.run()
}
