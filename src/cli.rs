use clap::Parser;

use crate::kubectl::LogFlags;
use crate::utils::{duration_arg, rfc3339_arg};

#[derive(Parser, Debug)]
#[command(name = "kubelogs")]
#[command(override_usage = "kubelogs [-f] [-p] (PATTERN | TYPE/NAME)... [-c CONTAINER] [flags]")]
#[command(about = "Print the logs for the containers of every pod matching a pattern")]
#[command(after_help = "Examples:
  kubelogs my-pod-v1
  kubelogs my-pod-v1 -c my-container
  kubelogs 'api-.*' -f
  kubelogs my-pod-v1 --since 10m
  kubelogs pod/my-pod-v1 --tail 1")]
pub struct Cli {
    /// Regular expressions matched against pod names (or pod/NAME)
    #[arg(required = true, value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Specify if the logs should be streamed
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// Include timestamps on each line in the log output
    #[arg(long)]
    pub timestamps: bool,

    /// Maximum bytes of logs to return. Defaults to no limit
    #[arg(long, value_name = "BYTES")]
    pub limit_bytes: Option<i64>,

    /// Print the logs for the previous instance of the container if it exists
    #[arg(short = 'p', long)]
    pub previous: bool,

    /// Lines of recent log file to display. Defaults to all lines
    #[arg(long, allow_negative_numbers = true, value_name = "LINES")]
    pub tail: Option<i64>,

    /// Only return logs after a specific date (RFC3339)
    #[arg(long, value_parser = rfc3339_arg, conflicts_with = "since")]
    pub since_time: Option<String>,

    /// Only return logs newer than a relative duration like 5s, 2m, or 3h
    #[arg(long, value_parser = duration_arg, value_name = "DURATION")]
    pub since: Option<String>,

    /// Only print the logs of this container
    #[arg(short = 'c', long, default_value = "")]
    pub container: String,

    /// Namespace where the pods are located
    #[arg(short = 'n', long, default_value = "default")]
    pub namespace: String,

    /// Kubeconfig context
    #[arg(long)]
    pub context: Option<String>,

    /// kubectl executable
    #[arg(long, env = "KUBELOGS_KUBECTL", default_value = "kubectl")]
    pub kubectl: String,

    /// Maximum number of log fetches running at once (unbounded if unset)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrent: Option<u32>,

    /// Capacity of the output line buffer
    #[arg(long, default_value = "1000")]
    pub buffer_size: usize,

    /// Do not color line prefixes
    #[arg(long)]
    pub no_color: bool,

    /// Verbose logging, including every kubectl command line
    #[arg(short = 'v', long)]
    pub debug: bool,
}

impl Cli {
    /// The container filter, if one was given.
    pub fn container_filter(&self) -> Option<&str> {
        Some(self.container.as_str()).filter(|c| !c.is_empty())
    }

    pub fn log_flags(&self) -> LogFlags {
        LogFlags {
            follow: self.follow,
            timestamps: self.timestamps,
            limit_bytes: self.limit_bytes,
            previous: self.previous,
            tail: self.tail,
            since_time: self.since_time.clone(),
            since: self.since.clone(),
        }
    }
}
