use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Conditions that abort the whole run.
#[derive(Error, Debug)]
pub enum Error {
    /// A pod pattern is not a valid regular expression.
    #[error("invalid pod pattern '{pattern}'")]
    PatternCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The cluster tool could not be started.
    #[error("failed to run {program}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Pod discovery ran but did not succeed.
    #[error("pod discovery in namespace {namespace} failed ({status}){}", stderr_detail(.stderr))]
    ToolFailed {
        namespace: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn stderr_detail(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}
