use std::{
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

use crate::{Config, ZupError};

/// Progress of a [`Launch`]. `Done` and `SpawnFailed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    PathComposed,
    Spawning,
    Spawned,
    SpawnFailed,
    Waiting,
    Collected,
    Done,
}

/// A single run of the selected zig executable with the caller's arguments.
#[derive(Debug)]
pub struct Launch {
    executable: PathBuf,
    args: Vec<OsString>,
    state: LaunchState,
}

impl Launch {
    pub fn new<I, S>(config: &Config, version: &str, args: I) -> Result<Self, ZupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut forwarded: Vec<OsString> = Vec::new();
        for arg in args {
            forwarded
                .try_reserve(1)
                .map_err(|source| ZupError::ResourceExhausted {
                    what: "argument list",
                    source,
                })?;
            forwarded.push(arg.into());
        }

        let mut launch = Self {
            executable: config.executable_path(version),
            args: forwarded,
            state: LaunchState::Idle,
        };
        launch.transition(LaunchState::PathComposed);
        Ok(launch)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// Renders the executable and its arguments joined by single spaces. Only used for
    /// diagnostics; the child receives the arguments as a vector.
    pub fn command_line(&self) -> Result<String, ZupError> {
        let parts = std::iter::once(self.executable.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str));

        let mut line = String::new();
        for (i, part) in parts.enumerate() {
            let part = OsStr::to_string_lossy(part);
            line.try_reserve(part.len() + 1)
                .map_err(|source| ZupError::ResourceExhausted {
                    what: "command line",
                    source,
                })?;
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&part);
        }
        Ok(line)
    }

    /// Spawns the executable with inherited stdio, blocks until it exits and returns its exit
    /// code.
    pub fn run(&mut self) -> Result<i32, ZupError> {
        let command_line = self.command_line()?;

        self.transition(LaunchState::Spawning);
        let child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();
        let mut child = match child {
            Ok(child) => ChildGuard::new(child),
            Err(source) => {
                self.transition(LaunchState::SpawnFailed);
                return Err(ZupError::Launch {
                    command_line,
                    source,
                });
            }
        };
        self.transition(LaunchState::Spawned);

        self.transition(LaunchState::Waiting);
        let status = child
            .wait()
            .map_err(|err| ZupError::StatusUnavailable {
                command_line: command_line.clone(),
                reason: err.to_string(),
            })?;
        self.transition(LaunchState::Collected);

        let code = status.code().ok_or_else(|| ZupError::StatusUnavailable {
            command_line,
            reason: status.to_string(),
        })?;
        self.transition(LaunchState::Done);
        Ok(code)
    }

    fn transition(&mut self, next: LaunchState) {
        tracing::debug!(
            from = ?self.state,
            to = ?next,
            executable = %self.executable.display(),
            "launch state"
        );
        self.state = next;
    }
}

/// Owns a spawned child. A child that was never successfully waited on is killed and reaped on
/// drop.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        tracing::debug!(pid = child.id(), "spawned zig");
        Self {
            child,
            reaped: false,
        }
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        tracing::debug!(pid = self.child.id(), %status, "zig exited");
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    use serial_test::serial;
    #[cfg(unix)]
    use std::{fs, fs::Permissions, os::unix::fs::PermissionsExt};

    /// Installs a shell script as the zig executable of `version`.
    #[cfg(unix)]
    fn install_fake_zig(config: &Config, version: &str, script: &str) -> PathBuf {
        install_fake_zig_with_mode(config, version, script, 0o755)
    }

    #[cfg(unix)]
    fn install_fake_zig_with_mode(
        config: &Config,
        version: &str,
        script: &str,
        mode: u32,
    ) -> PathBuf {
        fs::create_dir_all(config.version_path(version)).unwrap();
        let exe = config.executable_path(version);
        fs::write(&exe, script).unwrap();
        fs::set_permissions(&exe, Permissions::from_mode(mode)).unwrap();
        exe
    }

    #[test]
    fn test_command_line() {
        let config = Config::new("/opt/zupgrade");
        let launch = Launch::new(&config, "0.13.0", ["build", "-O", "release"]).unwrap();
        assert_eq!(launch.state(), LaunchState::PathComposed);
        assert_eq!(launch.executable(), config.executable_path("0.13.0"));
        assert_eq!(
            launch.command_line().unwrap(),
            format!("{} build -O release", config.executable_path("0.13.0").display())
        );
    }

    #[test]
    fn command_line_without_args_is_the_executable() {
        let config = Config::new("/opt/zupgrade");
        let launch = Launch::new(&config, "0.13.0", Vec::<OsString>::new()).unwrap();
        assert!(launch.args().is_empty());
        assert_eq!(
            launch.command_line().unwrap(),
            config.executable_path("0.13.0").display().to_string()
        );
    }

    #[test]
    #[serial]
    fn missing_executable_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        let mut launch = Launch::new(&config, "0.0.0-missing", ["build"]).unwrap();
        let err = launch.run().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Launch);
        assert_eq!(err.exit_code(), 255);
        assert_eq!(launch.state(), LaunchState::SpawnFailed);
        match err {
            ZupError::Launch { command_line, .. } => {
                assert_eq!(command_line, launch.command_line().unwrap())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn propagates_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        install_fake_zig(&config, "1.2.3", "#!/bin/sh\nexit 7\n");

        let mut launch = Launch::new(&config, "1.2.3", Vec::<OsString>::new()).unwrap();
        assert_eq!(launch.run().unwrap(), 7);
        assert_eq!(launch.state(), LaunchState::Done);
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn forwards_arguments_as_a_vector() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        let out = dir.path().join("args.txt");
        install_fake_zig(
            &config,
            "0.13.0",
            &format!(
                "#!/bin/sh\nprintf '%s\\n' \"$#\" \"$@\" > '{}'\n",
                out.display()
            ),
        );

        let mut launch =
            Launch::new(&config, "0.13.0", ["build", "-O", "release", "two words"]).unwrap();
        assert_eq!(launch.run().unwrap(), 0);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "4\nbuild\n-O\nrelease\ntwo words\n"
        );
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn signal_death_has_no_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        install_fake_zig(&config, "0.13.0", "#!/bin/sh\nkill -9 $$\n");

        let mut launch = Launch::new(&config, "0.13.0", Vec::<OsString>::new()).unwrap();
        let err = launch.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StatusQuery);
        assert_eq!(err.exit_code(), 255);
        assert_eq!(launch.state(), LaunchState::Collected);
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn non_executable_target_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        install_fake_zig_with_mode(&config, "1.0.0", "#!/bin/sh\nexit 0\n", 0o644);

        let mut launch = Launch::new(&config, "1.0.0", ["x"]).unwrap();
        let err = launch.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Launch);
        assert_eq!(err.exit_code(), 255);
        assert_eq!(launch.state(), LaunchState::SpawnFailed);
        let expected = format!(
            "failed to launch {} x",
            config.executable_path("1.0.0").display()
        );
        assert!(err.to_string().contains(&expected));
    }
}
