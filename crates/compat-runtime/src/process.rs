//! Subprocess execution with an instance-local environment.
//!
//! Every command runs with exactly the environment held by its
//! [`ProcessRunner`] (or an explicit override), never the parent process
//! environment. Failed commands are returned as a [`ProcessOutput`] with a
//! non-zero code; only failing to start a command is an error here.

use crate::constants::{CHILD_ENV, WARNING_PREFIX};
use crate::error::{Error, Result};
use crate::options::RuntimeOptions;
use crate::sink::WarningSink;
use backoff::backoff::Constant;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

/// Environment variables owned by one runtime instance.
pub type Environ = BTreeMap<String, String>;

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub args: Vec<String>,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }

    /// Warning lines the runtime printed on stderr, prefix stripped.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.stderr
            .lines()
            .filter_map(|line| line.trim_start().strip_prefix(WARNING_PREFIX))
            .map(str::trim)
    }
}

impl fmt::Display for ProcessOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' returned {} code:\n{}\n{}",
            self.command_line(),
            self.returncode,
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }
}

/// Per-call knobs for [`ProcessRunner::run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Retry failures up to the runner's `max_retries`.
    pub retry: bool,
    /// Echo output live while still capturing it.
    pub tee: bool,
    /// Replace the runner's environment for this call.
    pub env: Option<Environ>,
    pub cwd: Option<PathBuf>,
}

impl RunOptions {
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn tee(mut self, tee: bool) -> Self {
        self.tee = tee;
        self
    }

    pub fn env(mut self, env: Environ) -> Self {
        self.env = Some(env);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Runs runtime commands on behalf of one [`crate::Runtime`].
pub struct ProcessRunner {
    environ: Environ,
    bin_dir: Option<PathBuf>,
    max_retries: u32,
    retry_delay: Duration,
    sink: Arc<dyn WarningSink>,
}

impl ProcessRunner {
    pub fn new(environ: Environ, options: &RuntimeOptions, sink: Arc<dyn WarningSink>) -> Self {
        Self {
            environ,
            bin_dir: options.bin_dir.clone(),
            max_retries: options.max_retries,
            retry_delay: options.retry_delay(),
            sink,
        }
    }

    pub fn environ(&self) -> &Environ {
        &self.environ
    }

    pub fn environ_mut(&mut self) -> &mut Environ {
        &mut self.environ
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn sink(&self) -> &dyn WarningSink {
        self.sink.as_ref()
    }

    /// Run `args`, retrying non-zero exits when `opts.retry` is set.
    ///
    /// With retry enabled the command runs at most `max_retries + 1` times
    /// and the output of the last attempt is returned. Lines starting with
    /// `[WARNING]:` on stderr are forwarded to the warning sink.
    pub fn run<S: AsRef<str>>(&self, args: &[S], opts: &RunOptions) -> Result<ProcessOutput> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        if args.is_empty() {
            return Err(Error::runtime("Refusing to run an empty command"));
        }
        let env = opts.env.as_ref().unwrap_or(&self.environ);
        let attempts = if opts.retry { self.max_retries + 1 } else { 1 };

        let mut attempt = 0;
        let outcome = backoff::retry(Constant::new(self.retry_delay), || {
            attempt += 1;
            tracing::debug!(attempt, command = %args.join(" "), "Running command");
            let output = self
                .run_once(&args, env, opts)
                .map_err(backoff::Error::permanent)?;
            if output.success() || attempt >= attempts {
                return Ok(output);
            }
            tracing::warn!(
                "Retrying execution failure {} of: {}",
                output.returncode,
                output.command_line()
            );
            Err(backoff::Error::transient(Error::Command { output }))
        });

        let output = match outcome {
            Ok(output) => output,
            Err(backoff::Error::Permanent(e)) | Err(backoff::Error::Transient { err: e, .. }) => {
                return Err(e);
            }
        };
        for warning in output.warnings() {
            self.sink.warn(warning);
        }
        Ok(output)
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) if !name.contains(std::path::MAIN_SEPARATOR) => dir.join(name),
            _ => PathBuf::from(name),
        }
    }

    fn run_once(&self, args: &[String], env: &Environ, opts: &RunOptions) -> Result<ProcessOutput> {
        let program = self.program(&args[0]);
        let mut cmd = Command::new(&program);
        cmd.args(&args[1..])
            .env_clear()
            .envs(env)
            .envs(CHILD_ENV.iter().copied())
            .stdin(Stdio::null());
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }

        let spawn_error = |e: std::io::Error| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Error::MissingRuntime {
                    message: format!("Unable to execute {}: {}", program.display(), e),
                    output: None,
                }
            }
            _ => Error::io(&program, e),
        };

        let (status, stdout, stderr) = if opts.tee {
            let mut child = cmd
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(spawn_error)?;
            let out_pipe = child.stdout.take();
            let err_pipe = child.stderr.take();
            let (stdout, stderr) = std::thread::scope(|s| {
                let out = s.spawn(move || pump(out_pipe, std::io::stdout()));
                let err = s.spawn(move || pump(err_pipe, std::io::stderr()));
                (out.join().unwrap_or_default(), err.join().unwrap_or_default())
            });
            let status = child.wait().map_err(|e| Error::io(&program, e))?;
            (status, stdout, stderr)
        } else {
            let output = cmd.output().map_err(spawn_error)?;
            (
                output.status,
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )
        };

        Ok(ProcessOutput {
            args: args.to_vec(),
            returncode: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

/// Copy `source` line by line into `echo`, returning everything read.
///
/// Lines are raw bytes so invalid UTF-8 never stops the copy early.
fn pump<R: Read, W: Write>(source: Option<R>, mut echo: W) -> String {
    let mut captured = Vec::new();
    let Some(source) = source else {
        return String::new();
    };
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let _ = echo.write_all(&line);
                captured.extend_from_slice(&line);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    let _ = echo.flush();
    String::from_utf8_lossy(&captured).into_owned()
}
