use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
}

/// A pod as reported by discovery, with the containers that survived the
/// container filter in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub name: String,
    pub containers: Vec<Container>,
}

impl Pod {
    pub fn new(name: impl Into<String>, containers: Vec<Container>) -> Self {
        Self {
            name: name.into(),
            containers,
        }
    }

    pub fn container_names(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Pods resolved for every pattern argument, concatenated in argument order.
/// Duplicates are kept.
pub type PodSet = Vec<Pod>;

/// One log fetch: a pod/container pair and the command that tails it.
#[derive(Debug)]
pub struct StreamTask {
    pub pod_name: String,
    pub container_name: String,
    pub prefix: String,
    pub command: Command,
}

impl StreamTask {
    pub fn prefix_for(pod_name: &str, container_name: &str) -> String {
        format!("[{} {}]", pod_name, container_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Output(String),
    Exit,
}

#[derive(Debug, Clone)]
pub struct LogMessage {
    pub pod_name: String,
    pub container_name: String,
    pub line: LogLine,
}
