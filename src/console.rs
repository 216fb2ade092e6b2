use std::io::Write;

use crossterm::style::Stylize;
use tokio::sync::mpsc;

use crate::types::{LogLine, LogMessage, StreamTask};
use crate::utils::get_color;

/// Handle through which log streams emit lines. Every line funnels into one
/// printer, so concurrent streams never split each other's lines.
#[derive(Clone)]
pub struct Console {
    tx: mpsc::Sender<LogMessage>,
}

impl Console {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<LogMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Returns false once the printer has gone away.
    pub async fn line(&self, pod: &str, container: &str, line: String) -> bool {
        self.send(pod, container, LogLine::Output(line)).await
    }

    pub async fn exit(&self, pod: &str, container: &str) -> bool {
        self.send(pod, container, LogLine::Exit).await
    }

    async fn send(&self, pod: &str, container: &str, line: LogLine) -> bool {
        let msg = LogMessage {
            pod_name: pod.to_string(),
            container_name: container.to_string(),
            line,
        };
        self.tx.send(msg).await.is_ok()
    }
}

pub fn format_message(msg: &LogMessage, color: bool) -> String {
    let prefix = StreamTask::prefix_for(&msg.pod_name, &msg.container_name);
    let prefix = if color {
        let key = format!("{}/{}", msg.pod_name, msg.container_name);
        prefix.with(get_color(&key)).to_string()
    } else {
        prefix
    };

    match &msg.line {
        LogLine::Output(line) => format!("{} {}", prefix, line),
        LogLine::Exit => format!("{} exit", prefix),
    }
}

/// Write messages until every `Console` handle is dropped.
pub async fn print_messages<W: Write>(
    mut rx: mpsc::Receiver<LogMessage>,
    mut out: W,
    color: bool,
) -> std::io::Result<W> {
    while let Some(msg) = rx.recv().await {
        writeln!(out, "{}", format_message(&msg, color))?;
    }
    out.flush()?;
    Ok(out)
}
