use std::process::Stdio;

use tokio::process::Command;

/// Projection returning `<pod> <container>...|` for every pod, regular and
/// init containers included.
const POD_CONTAINERS_JSONPATH: &str = "jsonpath={range .items[*]}{.metadata.name} {.spec['containers', 'initContainers'][*].name}|{end}";

/// `kubectl logs` options given explicitly on the command line. Anything
/// left unset is not forwarded, so kubectl's own defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFlags {
    pub follow: bool,
    pub timestamps: bool,
    pub limit_bytes: Option<i64>,
    pub previous: bool,
    pub tail: Option<i64>,
    pub since_time: Option<String>,
    pub since: Option<String>,
}

impl LogFlags {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.follow {
            args.push("--follow".to_string());
        }
        if let Some(bytes) = self.limit_bytes {
            args.push(format!("--limit-bytes={}", bytes));
        }
        if self.previous {
            args.push("--previous".to_string());
        }
        if let Some(since) = &self.since {
            args.push(format!("--since={}", since));
        }
        if let Some(since_time) = &self.since_time {
            args.push(format!("--since-time={}", since_time));
        }
        if let Some(tail) = self.tail {
            args.push(format!("--tail={}", tail));
        }
        if self.timestamps {
            args.push("--timestamps".to_string());
        }
        args
    }
}

/// The external cluster tool. Commands are returned unstarted so callers
/// decide how to wire their output.
pub trait ClusterTool: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn program(&self) -> &str;

    /// Lists every pod in `namespace` with its container names.
    fn list_pods(&self, namespace: &str) -> Command;

    /// Fetches the logs of one container.
    fn logs(&self, namespace: &str, pod: &str, container: &str) -> Command;
}

/// Drives a `kubectl` binary through argument vectors, never a shell.
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
    context: Option<String>,
    flags: LogFlags,
}

impl Kubectl {
    pub fn new(program: impl Into<String>, context: Option<String>, flags: LogFlags) -> Self {
        Self {
            program: program.into(),
            context,
            flags,
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(ctx) = &self.context {
            cmd.arg("--context").arg(ctx);
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl ClusterTool for Kubectl {
    fn program(&self) -> &str {
        &self.program
    }

    fn list_pods(&self, namespace: &str) -> Command {
        let mut cmd = self.base_command();
        cmd.args(["get", "pod", "--namespace", namespace])
            .arg(format!("--output={}", POD_CONTAINERS_JSONPATH));
        cmd
    }

    fn logs(&self, namespace: &str, pod: &str, container: &str) -> Command {
        let mut cmd = self.base_command();
        cmd.args(["logs", pod, "--namespace", namespace, "--container", container])
            .args(self.flags.to_args());
        cmd
    }
}

/// Render a command the way it would be typed, for debug logging.
/// Arguments a shell would split or interpret are single-quoted.
pub fn command_line(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    std::iter::once(std_cmd.get_program())
        .chain(std_cmd.get_args())
        .map(|s| shell_quote(&s.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
