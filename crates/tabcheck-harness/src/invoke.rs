//! Launching the program under test.
//!
//! Every call blocks until the child exits. A spawn failure or an
//! unsuccessful exit status is harness-fatal; what the program printed is
//! left for the caller to judge.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};

use tracing::{debug, trace};

use tabcheck_error::{OracleError, Result};

/// Executable plus switches passed verbatim before the harness's own.
///
/// Parsed from a single argument such as `"./mtproc -x"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCommand {
    pub program: PathBuf,
    pub extra_args: Vec<String>,
}

impl TargetCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Split a command string on whitespace into program and switches.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidArgument` for a blank string.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut tokens = raw.split_whitespace();
        let program = tokens
            .next()
            .ok_or_else(|| OracleError::argument("executable", "empty command"))?;
        Ok(Self {
            program: PathBuf::from(program),
            extra_args: tokens.map(str::to_owned).collect(),
        })
    }

    /// Whether `program` names an existing executable file.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        is_executable_file(&self.program)
    }

    /// Arguments for one call: extra switches first, then `tail`.
    #[must_use]
    pub fn args_with<I, S>(&self, tail: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args
            .iter()
            .map(OsString::from)
            .chain(tail.into_iter().map(Into::into))
            .collect()
    }

    /// Program and switches joined back into one display string.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.extra_args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

/// Runs external programs on behalf of the drivers.
pub trait TargetRunner {
    /// Run `program args...` with stdout redirected into `stdout_path`.
    ///
    /// # Errors
    ///
    /// `Launch` if the program cannot be started, `ExitStatus` if it exits
    /// unsuccessfully, `Io` if the output file cannot be created.
    fn run_to_file(&self, program: &Path, args: &[OsString], stdout_path: &Path) -> Result<()>;

    /// Run `program args...` and capture stdout.
    ///
    /// # Errors
    ///
    /// Same as [`TargetRunner::run_to_file`].
    fn run_capture(&self, program: &Path, args: &[OsString]) -> Result<Vec<u8>>;

    /// Run `program args...` with `stdin` on its standard input and capture
    /// stdout. A program that exits without reading all of `stdin` is not
    /// an error by itself.
    ///
    /// # Errors
    ///
    /// Same as [`TargetRunner::run_to_file`].
    fn run_with_stdin(&self, program: &Path, args: &[OsString], stdin: &[u8]) -> Result<Vec<u8>>;
}

/// Default process-backed runner. The child inherits stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(program: &Path, args: &[OsString]) -> Command {
        trace!(program = %program.display(), ?args, "launching target");
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).stderr(Stdio::inherit());
        command
    }
}

fn launch_error(program: &Path, source: std::io::Error) -> OracleError {
    OracleError::Launch {
        program: program.to_path_buf(),
        source,
    }
}

fn feed_stdin(pipe: Option<ChildStdin>, bytes: &[u8]) -> io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    match pipe.write_all(bytes) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn check_status(program: &Path, status: std::process::ExitStatus) -> Result<()> {
    debug!(program = %program.display(), %status, "target exited");
    if status.success() {
        Ok(())
    } else {
        Err(OracleError::ExitStatus {
            program: program.to_path_buf(),
            status: status.to_string(),
        })
    }
}

impl TargetRunner for ProcessRunner {
    fn run_to_file(&self, program: &Path, args: &[OsString], stdout_path: &Path) -> Result<()> {
        let out = File::create(stdout_path)?;
        let status = Self::command(program, args)
            .stdout(Stdio::from(out))
            .status()
            .map_err(|e| launch_error(program, e))?;
        check_status(program, status)
    }

    fn run_capture(&self, program: &Path, args: &[OsString]) -> Result<Vec<u8>> {
        let output = Self::command(program, args)
            .stdout(Stdio::piped())
            .output()
            .map_err(|e| launch_error(program, e))?;
        check_status(program, output.status)?;
        Ok(output.stdout)
    }

    fn run_with_stdin(&self, program: &Path, args: &[OsString], stdin: &[u8]) -> Result<Vec<u8>> {
        let mut child = Self::command(program, args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| launch_error(program, e))?;
        let pipe = child.stdin.take();
        // stdin is written while stdout is drained.
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || feed_stdin(pipe, stdin));
            let output = child.wait_with_output();
            let written = writer.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
            (written, output)
        });
        let output = output?;
        check_status(program, output.status)?;
        written?;
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_switches() {
        let cmd = TargetCommand::parse("  ./mtproc -x  --fast ").unwrap();
        assert_eq!(cmd.program, PathBuf::from("./mtproc"));
        assert_eq!(cmd.extra_args, vec!["-x".to_owned(), "--fast".to_owned()]);
        assert_eq!(cmd.display(), "./mtproc -x --fast");
        assert!(TargetCommand::parse("   ").is_err());
    }

    #[test]
    fn extra_switches_precede_tail() {
        let cmd = TargetCommand::parse("prog -x").unwrap();
        let args = cmd.args_with(["-h", "input.tsv"]);
        assert_eq!(args, vec![OsString::from("-x"), "-h".into(), "input.tsv".into()]);
    }

    #[test]
    fn missing_program_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessRunner
            .run_capture(&dir.path().join("no-such-program"), &[])
            .unwrap_err();
        assert!(matches!(err, OracleError::Launch { .. }));
        assert!(err.is_target_failure());
    }

    #[test]
    fn directories_are_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!TargetCommand::new(dir.path()).is_executable());
        assert!(!TargetCommand::new(dir.path().join("absent")).is_executable());
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_and_capture() {
        let sh = Path::new("/bin/sh");
        let out = ProcessRunner
            .run_capture(sh, &["-c".into(), "printf 'a\\tb\\n'".into()])
            .unwrap();
        assert_eq!(out, b"a\tb\n");

        let err = ProcessRunner
            .run_capture(sh, &["-c".into(), "exit 3".into()])
            .unwrap_err();
        assert!(matches!(err, OracleError::ExitStatus { .. }));
        assert_eq!(err.exit_code(), 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observed.tsv");
        ProcessRunner
            .run_to_file(sh, &["-c".into(), "echo hello".into()], &path)
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn stdin_is_fed_to_the_child() {
        let sh = Path::new("/bin/sh");
        let out = ProcessRunner
            .run_with_stdin(sh, &["-c".into(), "tr a-z A-Z".into()], b"abc\tdef\n")
            .unwrap();
        assert_eq!(out, b"ABC\tDEF\n");

        // Large input the child never reads.
        let big = vec![b'x'; 1 << 20];
        let out = ProcessRunner
            .run_with_stdin(sh, &["-c".into(), "echo done".into()], &big)
            .unwrap();
        assert_eq!(out, b"done\n");

        let err = ProcessRunner
            .run_with_stdin(sh, &["-c".into(), "cat >/dev/null; exit 4".into()], b"x\n")
            .unwrap_err();
        assert!(matches!(err, OracleError::ExitStatus { .. }));
    }
}
