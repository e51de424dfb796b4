use crate::ExitCode;
use crate::env::Environment;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Command that is not a builtin, resolved to an executable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub name: String,
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(name: String, path: PathBuf, args: Vec<String>) -> Self {
        Self { name, path, args }
    }

    /// Resolve `name` through the environment's search path.
    pub fn resolve(env: &Environment, name: &str, args: Vec<String>) -> Option<Self> {
        let path = find_command_path(&env.search_path(), &env.current_dir, name)?;
        Some(Self::new(name.to_string(), path, args))
    }

    /// Start the process with the given standard streams.
    ///
    /// Standard error is always piped so the caller can collect it. The `Command`
    /// holding the parent's copies of `stdin`/`stdout` is dropped before returning.
    pub fn spawn(&self, stdin: Stdio, stdout: Stdio, env: &Environment) -> io::Result<Child> {
        log::debug!("spawning {} {:?}", self.path.display(), self.args);
        let mut command = Command::new(&self.path);
        // The child sees the name as typed, e.g. `cat` rather than `/usr/bin/cat`.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::arg0(&mut command, &self.name);
        command
            .args(&self.args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir)
            .spawn()
    }
}

/// Shell-style status code for a finished process.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}

/// Resolve a command name the way a typical shell would.
///
/// Behavior:
/// - Empty name: returns `None`.
/// - Name containing a `/`: resolved against `current_dir` (absolute paths stay as they are)
///   and returned if it is an executable file.
/// - Otherwise: each non-empty directory in `search_paths` is tried in order and the
///   first executable regular file called `name` wins.
pub fn find_command_path(search_paths: &OsStr, current_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') {
        let path = current_dir.join(name);
        return is_executable(&path).then_some(path);
    }

    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| current_dir.join(dir).join(name))
        .find(|path| is_executable(path))
}

/// Names of every executable regular file found in `search_paths`.
///
/// Relative directories are taken from `current_dir`, as in [`find_command_path`].
/// Unreadable or missing directories are skipped. The result may contain duplicates.
pub fn list_executables(search_paths: &OsStr, current_dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    for dir in std::env::split_paths(search_paths) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let dir = current_dir.join(dir);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::trace!("skipping {}: {err}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            if is_executable(&entry.path()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    names
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    /// Creates `dir/name` with the given permission bits.
    #[cfg(unix)]
    pub(crate) fn touch(dir: &Path, name: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").expect("write file");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
        path
    }

    fn search_path(dirs: &[&Path]) -> std::ffi::OsString {
        std::env::join_paths(dirs).expect("join paths")
    }

    #[test]
    #[cfg(unix)]
    fn first_executable_in_order_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "tool", 0o644);
        let expected = touch(second.path(), "tool", 0o755);
        touch(first.path(), "other", 0o755);

        let paths = search_path(&[first.path(), second.path()]);
        let found = find_command_path(&paths, Path::new("/"), "tool");
        assert_eq!(found, Some(expected));
    }

    #[test]
    #[cfg(unix)]
    fn directories_are_not_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        let paths = search_path(&[dir.path()]);
        assert_eq!(find_command_path(&paths, Path::new("/"), "subdir"), None);
    }

    #[test]
    #[cfg(unix)]
    fn name_with_slash_is_resolved_against_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        let expected = touch(&dir.path().join("bin"), "run", 0o755);

        let found = find_command_path(OsStr::new(""), dir.path(), "bin/run");
        assert_eq!(found, Some(expected.clone()));

        let absolute = expected.to_string_lossy().into_owned();
        let found = find_command_path(OsStr::new(""), Path::new("/"), &absolute);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn empty_name_is_none() {
        assert_eq!(find_command_path(OsStr::new("/bin"), Path::new("/"), ""), None);
    }

    #[test]
    #[cfg(unix)]
    fn missing_command_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let paths = search_path(&[dir.path()]);
        assert_eq!(find_command_path(&paths, Path::new("/"), "nonexisting"), None);
    }

    #[test]
    #[cfg(unix)]
    fn listing_skips_plain_files_and_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "runnable", 0o700);
        touch(dir.path(), "data", 0o600);

        let missing = dir.path().join("missing");
        let paths = search_path(&[dir.path(), missing.as_path()]);
        assert_eq!(
            list_executables(&paths, Path::new("/")),
            vec!["runnable".to_string()]
        );
    }

    #[test]
    #[cfg(unix)]
    fn relative_entries_follow_the_shell_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tools")).unwrap();
        let expected = touch(&dir.path().join("tools"), "local_tool", 0o755);

        let paths = OsStr::new("tools");
        assert_eq!(
            list_executables(paths, dir.path()),
            vec!["local_tool".to_string()]
        );
        assert_eq!(
            find_command_path(paths, dir.path(), "local_tool"),
            Some(expected)
        );
        assert!(list_executables(paths, Path::new("/")).is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn child_sees_the_typed_name() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::isolated(dir.path(), "/usr/bin:/bin");
        let cat = ExternalCommand::resolve(&env, "cat", vec!["nope".to_string()])
            .expect("cat on PATH");
        assert!(cat.path.is_absolute());

        let output = cat
            .spawn(Stdio::null(), Stdio::null(), &env)
            .unwrap()
            .wait_with_output()
            .unwrap();
        assert_ne!(exit_code(output.status), 0);

        let stderr = String::from_utf8(output.stderr).unwrap();
        assert!(stderr.starts_with("cat: "), "{stderr}");
    }

    #[test]
    #[cfg(unix)]
    fn spawn_uses_shell_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::isolated(dir.path(), "/usr/bin:/bin");
        let pwd = ExternalCommand::resolve(&env, "pwd", Vec::new()).expect("pwd on PATH");

        let child = pwd.spawn(Stdio::null(), Stdio::piped(), &env).unwrap();
        let output = child.wait_with_output().unwrap();
        assert_eq!(exit_code(output.status), 0);

        let printed = String::from_utf8(output.stdout).unwrap();
        assert_eq!(
            fs::canonicalize(printed.trim_end()).unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
    }
}
