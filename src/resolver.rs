use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kubectl::{ClusterTool, command_line};
use crate::types::{Container, Pod, PodSet};
use crate::utils::parse_pattern_arg;

/// Compile every pattern argument up front so a bad one fails the run
/// before anything is launched.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|arg| {
            let pattern = parse_pattern_arg(arg);
            Regex::new(pattern).map_err(|source| Error::PatternCompile {
                pattern: pattern.to_string(),
                source,
            })
        })
        .collect()
}

/// Parse `<pod> <container>...|` records and keep the pods whose name the
/// regex finds a match in. Containers are kept when `container_filter` is
/// unset or equals their name exactly.
pub fn parse_pod_records(output: &str, pattern: &Regex, container_filter: Option<&str>) -> Vec<Pod> {
    output
        .split('|')
        .filter_map(|record| {
            let mut fields = record.split_whitespace();
            let name = fields.next()?;
            if !pattern.is_match(name) {
                return None;
            }
            let containers = fields
                .filter(|c| container_filter.is_none_or(|f| f == *c))
                .map(|c| Container {
                    name: c.to_string(),
                })
                .collect();
            Some(Pod::new(name, containers))
        })
        .collect()
}

/// Run discovery once per pattern and concatenate the matches in argument
/// order.
pub async fn resolve<T: ClusterTool + ?Sized>(
    tool: &T,
    patterns: &[String],
    container_filter: Option<&str>,
    namespace: &str,
) -> Result<PodSet> {
    let compiled = compile_patterns(patterns)?;

    let mut pods = PodSet::new();
    for pattern in &compiled {
        let output = list_pods(tool, namespace).await?;
        let matched = parse_pod_records(&output, pattern, container_filter);
        debug!(
            "Pattern '{}' matched {} pod(s) in namespace {}",
            pattern.as_str(),
            matched.len(),
            namespace
        );
        for pod in &matched {
            debug!("{}: {:?}", pod.name, pod.container_names());
        }
        pods.extend(matched);
    }
    Ok(pods)
}

async fn list_pods<T: ClusterTool + ?Sized>(tool: &T, namespace: &str) -> Result<String> {
    let mut cmd = tool.list_pods(namespace);
    debug!("{}", command_line(&cmd));

    let output = cmd.output().await.map_err(|source| Error::ToolLaunch {
        program: tool.program().to_string(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(Error::ToolFailed {
            namespace: namespace.to_string(),
            status: output.status,
            stderr,
        });
    }
    if !stderr.is_empty() {
        debug!("{} stderr: {}", tool.program(), stderr);
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
