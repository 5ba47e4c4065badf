//! Terminal input and the interactive prompts built on it

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use callbox_core::{
    CallConfirmer, ConfirmationPrompt, PermissionGate, PermissionPrompt, PermissionStatus,
};
use colored::Colorize;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Lines typed on stdin, read on a dedicated thread
pub struct LineReader {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl LineReader {
    /// Start reading stdin
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        });
        Self {
            lines: Mutex::new(rx),
        }
    }

    /// Next trimmed line, `None` once stdin is closed
    pub async fn next_line(&self) -> Option<String> {
        self.lines
            .lock()
            .await
            .recv()
            .await
            .map(|line| line.trim().to_string())
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Confirmation dialog on the terminal
pub struct TerminalConfirmer {
    lines: Arc<LineReader>,
}

impl TerminalConfirmer {
    pub fn new(lines: Arc<LineReader>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl CallConfirmer for TerminalConfirmer {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> bool {
        println!();
        println!("{}", prompt.title.bold());
        println!("{}", prompt.message);
        println!(
            "  [y] {}    [n] {}",
            prompt.accept_label.green(),
            prompt.decline_label.yellow()
        );
        match self.lines.next_line().await {
            Some(answer) => is_yes(&answer),
            None => false,
        }
    }
}

/// Microphone permission dialog on the terminal
///
/// The grant lives for the process only.
pub struct TerminalPermissionGate {
    lines: Arc<LineReader>,
    granted: AtomicBool,
}

impl TerminalPermissionGate {
    pub fn new(lines: Arc<LineReader>) -> Self {
        Self {
            lines,
            granted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PermissionGate for TerminalPermissionGate {
    async fn check(&self) -> PermissionStatus {
        if self.granted.load(Ordering::SeqCst) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn request(&self, prompt: &PermissionPrompt) -> PermissionStatus {
        println!();
        println!("{}", prompt.title.bold());
        println!("{}", prompt.message);
        println!(
            "  [y] {}    [n] {}",
            prompt.button_positive.green(),
            prompt.button_negative.yellow()
        );
        let status = match self.lines.next_line().await {
            Some(answer) if is_yes(&answer) => PermissionStatus::Granted,
            _ => PermissionStatus::Denied,
        };
        self.granted.store(status.is_granted(), Ordering::SeqCst);
        status
    }
}
