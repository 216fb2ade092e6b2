use std::process::Stdio;
use std::sync::Arc;

use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Semaphore;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::SplitStream;
use tracing::{debug, error, info};

use crate::console::Console;
use crate::kubectl::{ClusterTool, command_line};
use crate::types::{Pod, StreamTask};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Exited,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub pod_name: String,
    pub container_name: String,
    pub outcome: TaskOutcome,
}

/// One report per launched task, in launch order.
#[derive(Debug, Default)]
pub struct StreamSummary {
    pub reports: Vec<TaskReport>,
}

impl StreamSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn exited(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == TaskOutcome::Exited)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Failed(_)))
    }
}

/// Fans out one log fetch per pod/container and waits for all of them.
pub struct Streamer<'a, T: ClusterTool + ?Sized> {
    tool: &'a T,
    namespace: String,
    console: Console,
    limit: Option<Arc<Semaphore>>,
}

impl<'a, T: ClusterTool + ?Sized> Streamer<'a, T> {
    pub fn new(tool: &'a T, namespace: impl Into<String>, console: Console) -> Self {
        Self {
            tool,
            namespace: namespace.into(),
            console,
            limit: None,
        }
    }

    /// Cap the number of subprocesses alive at once.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn tasks(&self, pods: &[Pod]) -> Vec<StreamTask> {
        pods.iter()
            .flat_map(|pod| {
                pod.containers.iter().map(move |container| StreamTask {
                    pod_name: pod.name.clone(),
                    container_name: container.name.clone(),
                    prefix: StreamTask::prefix_for(&pod.name, &container.name),
                    command: self.tool.logs(&self.namespace, &pod.name, &container.name),
                })
            })
            .collect()
    }

    /// Returns once every task's subprocess has exited and its output has
    /// been drained. Task failures are logged and reported, never returned.
    pub async fn stream(&self, pods: &[Pod]) -> StreamSummary {
        let mut names = Vec::new();
        let mut handles = Vec::new();

        for task in self.tasks(pods) {
            info!("{} {}", task.pod_name, task.container_name);
            debug!("{}", command_line(&task.command));

            names.push((task.pod_name.clone(), task.container_name.clone()));
            handles.push(tokio::spawn(run_task(
                task,
                self.console.clone(),
                self.limit.clone(),
            )));
        }

        let reports = join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(result, (pod_name, container_name))| {
                let outcome = result.unwrap_or_else(|e| {
                    error!("[{} {}] task aborted: {}", pod_name, container_name, e);
                    TaskOutcome::Failed(e.to_string())
                });
                TaskReport {
                    pod_name,
                    container_name,
                    outcome,
                }
            })
            .collect();

        StreamSummary { reports }
    }
}

async fn run_task(task: StreamTask, console: Console, limit: Option<Arc<Semaphore>>) -> TaskOutcome {
    // Held until the child has exited and both readers are done.
    let _permit = match limit {
        Some(sem) => match sem.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => return fail(&task.prefix, format!("concurrency limiter closed: {}", e)),
        },
        None => None,
    };

    let StreamTask {
        pod_name,
        container_name,
        prefix,
        mut command,
    } = task;

    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return fail(&prefix, format!("failed to start log fetch: {}", e)),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.start_kill();
        let _ = child.wait().await;
        return fail(&prefix, "failed to capture output pipes".to_string());
    };

    let stdout_reader = tokio::spawn(forward_lines(
        stdout,
        pod_name.clone(),
        container_name.clone(),
        console.clone(),
    ));
    let stderr_reader = tokio::spawn(forward_lines(
        stderr,
        pod_name.clone(),
        container_name.clone(),
        console.clone(),
    ));

    let (status, _, _) = tokio::join!(child.wait(), stdout_reader, stderr_reader);

    match status {
        Ok(status) if status.success() => {
            console.exit(&pod_name, &container_name).await;
            TaskOutcome::Exited
        }
        Ok(status) => fail(&prefix, status.to_string()),
        Err(e) => fail(&prefix, format!("failed to wait for log fetch: {}", e)),
    }
}

fn fail(prefix: &str, reason: String) -> TaskOutcome {
    error!("{} {}", prefix, reason);
    TaskOutcome::Failed(reason)
}

/// Forward newline-delimited lines until end of stream. A read error ends
/// the reader quietly.
async fn forward_lines<R>(
    reader: R,
    pod_name: String,
    container_name: String,
    console: Console,
) where
    R: AsyncRead + Unpin,
{
    let mut segments = SplitStream::new(BufReader::new(reader).split(b'\n'));
    while let Some(Ok(mut segment)) = segments.next().await {
        if segment.last() == Some(&b'\r') {
            segment.pop();
        }
        let line = String::from_utf8_lossy(&segment).into_owned();
        if !console.line(&pod_name, &container_name, line).await {
            break;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::types::{Container, LogLine, LogMessage};
    use tokio::process::Command;
    use tokio::sync::mpsc;

    /// Log fetches run a shell script with pod and container as `$1` and `$2`.
    struct ScriptTool {
        script: &'static str,
    }

    impl ClusterTool for ScriptTool {
        fn program(&self) -> &str {
            "sh"
        }

        fn list_pods(&self, _namespace: &str) -> Command {
            Command::new("true")
        }

        fn logs(&self, _namespace: &str, pod: &str, container: &str) -> Command {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", self.script, "sh", pod, container]);
            cmd
        }
    }

    fn pod(name: &str, containers: &[&str]) -> Pod {
        Pod::new(
            name,
            containers
                .iter()
                .map(|c| Container {
                    name: c.to_string(),
                })
                .collect(),
        )
    }

    fn collect(mut rx: mpsc::Receiver<LogMessage>) -> tokio::task::JoinHandle<Vec<LogMessage>> {
        tokio::spawn(async move {
            let mut messages = Vec::new();
            while let Some(msg) = rx.recv().await {
                messages.push(msg);
            }
            messages
        })
    }

    async fn run(tool: &ScriptTool, pods: &[Pod], max: Option<usize>) -> (StreamSummary, Vec<LogMessage>) {
        let (console, rx) = Console::channel(8);
        let collector = collect(rx);
        let summary = {
            let mut streamer = Streamer::new(tool, "default", console);
            if let Some(max) = max {
                streamer = streamer.with_max_concurrent(max);
            }
            streamer.stream(pods).await
        };
        (summary, collector.await.unwrap())
    }

    fn lines_of<'m>(messages: &'m [LogMessage], pod: &str) -> Vec<&'m str> {
        messages
            .iter()
            .filter(|m| m.pod_name == pod)
            .filter_map(|m| match &m.line {
                LogLine::Output(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stream_runs_one_task_per_container() {
        let tool = ScriptTool {
            script: "echo \"out $1 $2\"; echo \"err $1 $2\" >&2",
        };
        let pods = vec![
            pod("pod-a", &["web", "sidecar"]),
            pod("pod-b", &["web", "sidecar"]),
            pod("pod-c", &[]),
        ];

        let (summary, messages) = run(&tool, &pods, None).await;

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.exited(), 4);
        let exits = messages.iter().filter(|m| m.line == LogLine::Exit).count();
        assert_eq!(exits, 4);
        assert_eq!(lines_of(&messages, "pod-a").len(), 4);
        assert!(
            lines_of(&messages, "pod-b").contains(&"err pod-b sidecar")
        );
    }

    #[tokio::test]
    async fn test_exit_marker_follows_all_output() {
        let tool = ScriptTool {
            script: "i=0; while [ $i -lt 200 ]; do echo \"line $i\"; i=$((i+1)); done",
        };
        let pods = vec![pod("pod-a", &["web"])];

        let (_, messages) = run(&tool, &pods, None).await;

        let stdout = lines_of(&messages, "pod-a");
        let expected: Vec<String> = (0..200).map(|i| format!("line {}", i)).collect();
        assert_eq!(stdout, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(messages.last().map(|m| &m.line), Some(&LogLine::Exit));
    }

    #[tokio::test]
    async fn test_failed_task_does_not_affect_others() {
        let tool = ScriptTool {
            script: "if [ \"$1\" = bad ]; then echo broken >&2; exit 2; fi; echo ok",
        };
        let pods = vec![pod("good", &["web"]), pod("bad", &["web"]), pod("fine", &["web"])];

        let (summary, messages) = run(&tool, &pods, None).await;

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.exited(), 2);
        let failed: Vec<&str> = summary.failed().map(|r| r.pod_name.as_str()).collect();
        assert_eq!(failed, vec!["bad"]);
        assert_eq!(lines_of(&messages, "bad"), vec!["broken"]);
        assert!(
            !messages
                .iter()
                .any(|m| m.pod_name == "bad" && m.line == LogLine::Exit)
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_isolated() {
        struct HalfMissing;
        impl ClusterTool for HalfMissing {
            fn program(&self) -> &str {
                "sh"
            }
            fn list_pods(&self, _namespace: &str) -> Command {
                Command::new("true")
            }
            fn logs(&self, _namespace: &str, pod: &str, _container: &str) -> Command {
                if pod == "missing" {
                    Command::new("/nonexistent/kubectl")
                } else {
                    Command::new("true")
                }
            }
        }

        let (console, rx) = Console::channel(8);
        let collector = collect(rx);
        let pods = vec![pod("missing", &["web"]), pod("present", &["web"])];
        let summary = Streamer::new(&HalfMissing, "default", console)
            .stream(&pods)
            .await;
        let messages = collector.await.unwrap();

        assert_eq!(summary.total(), 2);
        assert!(matches!(summary.reports[0].outcome, TaskOutcome::Failed(_)));
        assert_eq!(summary.reports[1].outcome, TaskOutcome::Exited);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].pod_name, "present");
    }

    #[tokio::test]
    async fn test_max_concurrent_still_completes_every_task() {
        let tool = ScriptTool {
            script: "echo \"$1\"",
        };
        let pods: Vec<Pod> = (0..6).map(|i| pod(&format!("pod-{}", i), &["web"])).collect();

        let (summary, messages) = run(&tool, &pods, Some(2)).await;

        assert_eq!(summary.exited(), 6);
        assert_eq!(messages.iter().filter(|m| m.line == LogLine::Exit).count(), 6);
    }

    #[test]
    fn test_tasks_carry_prefix_and_command() {
        let tool = ScriptTool { script: "true" };
        let (console, _rx) = Console::channel(1);
        let streamer = Streamer::new(&tool, "default", console);

        let tasks = streamer.tasks(&[pod("pod-a", &["web", "sidecar"])]);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].prefix, "[pod-a web]");
        assert_eq!(tasks[1].prefix, "[pod-a sidecar]");
        assert_eq!(
            command_line(&tasks[1].command),
            "sh -c true sh pod-a sidecar"
        );
    }
}
