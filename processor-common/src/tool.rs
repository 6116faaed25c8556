// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Invocation of external programs.
//!
//! Every invocation blocks until the program exits. Output is captured so
//! that failures can surface the program's standard error.

use {
    crate::ProcessorError,
    log::{debug, warn},
    std::{
        ffi::{OsStr, OsString},
        path::{Path, PathBuf},
        time::{Duration, Instant},
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolOutput {
    /// Exit code, or -1 if terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    fn from_output(output: &std::process::Output) -> Self {
        Self {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// An external program invocation bound to a processing step.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    step: &'static str,
    operation: Option<String>,
    /// Bare names are looked up on `PATH`.
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(step: &'static str, program: impl AsRef<OsStr>) -> Self {
        Self {
            step,
            operation: None,
            program: program.as_ref().to_os_string(),
            args: vec![],
            dir: None,
            stdin: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Describe what this invocation attempts, for error messages.
    pub fn operation(mut self, operation: impl ToString) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Feed fixed data to the program's standard input.
    pub fn stdin_bytes(mut self, data: Vec<u8>) -> Self {
        self.stdin = Some(data);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn describe(&self) -> String {
        match &self.operation {
            Some(operation) => operation.clone(),
            None => format!("running {}", self.program.to_string_lossy()),
        }
    }

    fn expression(&self) -> duct::Expression {
        let mut expr = duct::cmd(self.program.as_os_str(), &self.args)
            .stdout_capture()
            .stderr_capture()
            .unchecked();

        if let Some(dir) = &self.dir {
            expr = expr.dir(dir);
        }

        if let Some(data) = &self.stdin {
            expr = expr.stdin_bytes(data.clone());
        }

        expr
    }

    fn spawn_failure(&self, err: std::io::Error) -> ProcessorError {
        ProcessorError::ExternalToolFailure {
            step: self.step,
            operation: self.describe(),
            code: -1,
            stderr: format!("unable to execute {}: {}", self.program.to_string_lossy(), err),
        }
    }

    /// Run the program and return its output regardless of exit code.
    ///
    /// Only spawn failures and timeouts are errors.
    pub fn output_unchecked(&self) -> Result<ToolOutput, ProcessorError> {
        debug!(
            "{}: invoking {} with args: {:?}",
            self.step,
            self.program.to_string_lossy(),
            self.args
        );

        let expr = self.expression();

        let timeout = match self.timeout {
            None => {
                let output = expr.run().map_err(|e| self.spawn_failure(e))?;
                return Ok(ToolOutput::from_output(&output));
            }
            Some(timeout) => timeout,
        };

        let handle = expr.start().map_err(|e| self.spawn_failure(e))?;
        let started = Instant::now();

        loop {
            if let Some(output) = handle.try_wait().map_err(|e| self.spawn_failure(e))? {
                return Ok(ToolOutput::from_output(output));
            }

            if started.elapsed() >= timeout {
                warn!(
                    "{}: {} exceeded {:?}; killing it",
                    self.step,
                    self.program.to_string_lossy(),
                    timeout
                );
                handle.kill().map_err(|e| self.spawn_failure(e))?;

                return Err(ProcessorError::ToolTimeout {
                    step: self.step,
                    operation: self.describe(),
                    seconds: timeout.as_secs(),
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Run the program, treating a nonzero exit as an error.
    pub fn run(&self) -> Result<ToolOutput, ProcessorError> {
        let output = self.output_unchecked()?;

        if output.success() {
            Ok(output)
        } else {
            Err(ProcessorError::ExternalToolFailure {
                step: self.step,
                operation: self.describe(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
