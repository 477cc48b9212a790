//! Interactive line console, the event pump, and the placeholder work loop.
//!
//! # Commands
//!
//! | Input            | Effect                                                  |
//! |------------------|---------------------------------------------------------|
//! | `r`              | announce a random file and start working on it          |
//! | `s`              | stop working and end the session                        |
//! | `status`         | print the active session                                |
//! | `q` / empty line | quit                                                    |
//!
//! The work loop stands in for real editing: while a session is active it
//! logs `working on <file>` once per period.  It is started when this node
//! announces a file (`r`) or accepts someone else's announcement, and
//! cancelled on `s` or when the owner tells this node to stop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use collab_core::CollaborationEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::coordinate_collaboration::{
    CollaborationCoordinator, CoordinatorError, StopOutcome,
};

/// How often the work loop reports progress.
pub const WORK_PERIOD: Duration = Duration::from_secs(2);

// ── Commands ──────────────────────────────────────────────────────────────────

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Announce,
    Stop,
    Status,
    Quit,
    Unknown(String),
}

impl ConsoleCommand {
    /// Parses one line.  Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "q" | "quit" => ConsoleCommand::Quit,
            "r" => ConsoleCommand::Announce,
            "s" => ConsoleCommand::Stop,
            "status" => ConsoleCommand::Status,
            _ => ConsoleCommand::Unknown(trimmed.to_string()),
        }
    }
}

/// A fresh resource name: twelve hex characters plus `.ext`.
pub fn random_filename() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}.ext", &id[id.len() - 12..])
}

// ── Work loop ─────────────────────────────────────────────────────────────────

struct ActiveWork {
    filename: String,
    task: JoinHandle<()>,
}

/// At most one placeholder task working on one file.
pub struct WorkLoop {
    period: Duration,
    active: Mutex<Option<ActiveWork>>,
}

impl WorkLoop {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveWork>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts working on `filename`, replacing any previous task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, filename: &str) {
        let period = self.period;
        let name = filename.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                info!("working on {name}");
            }
        });

        let previous = self.lock().replace(ActiveWork {
            filename: filename.to_string(),
            task,
        });
        if let Some(previous) = previous {
            previous.task.abort();
        }
    }

    /// Cancels the running task, returning the file it was working on.
    pub fn cancel(&self) -> Option<String> {
        let previous = self.lock().take()?;
        previous.task.abort();
        info!("stopped working on {}", previous.filename);
        Some(previous.filename)
    }

    /// File currently being worked on.
    pub fn current(&self) -> Option<String> {
        self.lock().as_ref().map(|work| work.filename.clone())
    }
}

impl Drop for WorkLoop {
    fn drop(&mut self) {
        if let Some(work) = self.lock().take() {
            work.task.abort();
        }
    }
}

// ── Event pump ────────────────────────────────────────────────────────────────

/// Logs coordinator events and drives the work loop until the channel closes.
pub async fn run_event_pump(
    mut events: mpsc::UnboundedReceiver<CollaborationEvent>,
    work: Arc<WorkLoop>,
) {
    while let Some(event) = events.recv().await {
        match event {
            CollaborationEvent::Accepted(request) => {
                info!("collaborating on {request}");
                work.start(&request.filename);
            }
            CollaborationEvent::Declined(request) => {
                info!("declined {request}: already busy");
            }
            CollaborationEvent::StopRequested(request) => {
                info!("{} stopped by its owner", request.filename);
                work.cancel();
            }
            CollaborationEvent::SubscriptionRegistered(subscriber) => {
                info!("{subscriber} joined");
            }
            CollaborationEvent::SubscriberNotified(subscriber) => {
                info!("{subscriber} told to stop");
            }
            CollaborationEvent::SubscriberNotifyFailed { subscriber, reason } => {
                warn!("{subscriber} could not be told to stop: {reason}");
            }
        }
    }
}

// ── Console ───────────────────────────────────────────────────────────────────

/// Forwards stdin lines from a dedicated OS thread.
///
/// Reading stdin blocks, and a blocked read on a runtime worker would keep
/// the runtime from shutting down after Ctrl-C.  A plain thread does not
/// hold the process open.  The channel closes at end of input.
pub fn spawn_stdin_reader() -> std::io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("collab-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Line-oriented front-end over a coordinator.
pub struct Console {
    coordinator: Arc<CollaborationCoordinator>,
    work: Arc<WorkLoop>,
}

impl Console {
    pub fn new(coordinator: Arc<CollaborationCoordinator>, work: Arc<WorkLoop>) -> Self {
        Self { coordinator, work }
    }

    /// Reads commands from `lines` until quit or until the sender is gone,
    /// writing one response line per command to `output`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from writing `output`.
    pub async fn run<W>(
        &self,
        mut lines: mpsc::UnboundedReceiver<String>,
        output: &mut W,
    ) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        output
            .write_all(b"commands: r = announce, s = stop, status, q or empty line = quit\n")
            .await?;
        output.flush().await?;

        while let Some(line) = lines.recv().await {
            let command = ConsoleCommand::parse(&line);
            if command == ConsoleCommand::Quit {
                break;
            }
            let response = self.execute(command).await;
            output.write_all(response.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok(())
    }

    /// Performs one command and returns the line to show the user.
    pub async fn execute(&self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::Announce => match self.coordinator.initiate(random_filename()).await {
                Ok(request) => {
                    self.work.start(&request.filename);
                    format!("announced {}", request.filename)
                }
                Err(CoordinatorError::SessionBusy { filename }) => {
                    format!("busy with {filename}; stop it first")
                }
                Err(e) => {
                    warn!("announce failed: {e}");
                    format!("announce failed: {e}")
                }
            },
            ConsoleCommand::Stop => {
                self.work.cancel();
                match self.coordinator.stop().await {
                    StopOutcome::Idle => "nothing to stop".to_string(),
                    StopOutcome::Released(request) => format!("left {}", request.filename),
                    StopOutcome::TornDown {
                        request,
                        notified,
                        failed,
                    } => format!(
                        "stopped {} ({notified} notified, {failed} unreachable)",
                        request.filename
                    ),
                }
            }
            ConsoleCommand::Status => match self.coordinator.current_session() {
                Some(request) => format!("active: {request}"),
                None => "idle".to_string(),
            },
            ConsoleCommand::Quit => "bye".to_string(),
            ConsoleCommand::Unknown(text) => format!("unknown command {text:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::coordinate_collaboration::{
        DiscoveryTransport, NodeIdentity, TransportError,
    };
    use async_trait::async_trait;
    use collab_core::{CollabMessage, CollaborationRequest};
    use std::net::SocketAddr;

    struct SilentTransport;

    #[async_trait]
    impl DiscoveryTransport for SilentTransport {
        async fn broadcast(&self, _: SocketAddr, _: &CollabMessage) -> Result<(), TransportError> {
            Ok(())
        }

        async fn unicast_call(
            &self,
            _: SocketAddr,
            _: &CollabMessage,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn make_console() -> (
        Console,
        Arc<CollaborationCoordinator>,
        Arc<WorkLoop>,
        mpsc::UnboundedReceiver<CollaborationEvent>,
    ) {
        let identity = NodeIdentity {
            name: "alpha".to_string(),
            local_address: "192.168.1.10".parse().unwrap(),
            network: "192.168.1.0/24".parse().unwrap(),
            broadcast_port: 24810,
            unicast_port: 24811,
        };
        let (coordinator, rx) = CollaborationCoordinator::new(identity, Arc::new(SilentTransport));
        let coordinator = Arc::new(coordinator);
        let work = Arc::new(WorkLoop::new(Duration::from_millis(10)));
        let console = Console::new(Arc::clone(&coordinator), Arc::clone(&work));
        (console, coordinator, work, rx)
    }

    // ── parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_recognises_commands() {
        assert_eq!(ConsoleCommand::parse("r"), ConsoleCommand::Announce);
        assert_eq!(ConsoleCommand::parse(" S \n"), ConsoleCommand::Stop);
        assert_eq!(ConsoleCommand::parse("status"), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse(""), ConsoleCommand::Quit);
        assert_eq!(ConsoleCommand::parse("q"), ConsoleCommand::Quit);
        assert_eq!(
            ConsoleCommand::parse("dance"),
            ConsoleCommand::Unknown("dance".to_string())
        );
    }

    #[test]
    fn test_random_filename_shape() {
        let name = random_filename();
        let (stem, ext) = name.split_once('.').unwrap();
        assert_eq!(ext, "ext");
        assert_eq!(stem.len(), 12);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, random_filename());
    }

    // ── work loop ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_work_loop_start_replaces_and_cancel_clears() {
        // Arrange
        let work = WorkLoop::new(Duration::from_millis(10));

        // Act
        work.start("a.ext");
        work.start("b.ext");

        // Assert
        assert_eq!(work.current().as_deref(), Some("b.ext"));
        assert_eq!(work.cancel().as_deref(), Some("b.ext"));
        assert_eq!(work.cancel(), None);
    }

    // ── console ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_announce_then_stop_through_console() {
        // Arrange
        let (console, coordinator, work, _rx) = make_console();

        // Act
        let announced = console.execute(ConsoleCommand::Announce).await;
        let busy = console.execute(ConsoleCommand::Announce).await;
        let status = console.execute(ConsoleCommand::Status).await;
        let stopped = console.execute(ConsoleCommand::Stop).await;

        // Assert
        assert!(announced.starts_with("announced "), "{announced}");
        assert!(busy.starts_with("busy with "), "{busy}");
        assert!(status.starts_with("active: "), "{status}");
        assert!(stopped.contains("0 notified"), "{stopped}");
        assert!(coordinator.current_session().is_none());
        assert!(work.current().is_none());
    }

    #[tokio::test]
    async fn test_run_stops_at_empty_line() {
        // Arrange
        let (console, coordinator, _work, _rx) = make_console();
        let (tx, input) = mpsc::unbounded_channel();
        for line in ["status", "", "r"] {
            tx.send(line.to_string()).unwrap();
        }
        let mut output = Vec::new();

        // Act
        console.run(input, &mut output).await.unwrap();

        // Assert: the `r` after the empty line was never executed
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("idle"));
        assert!(coordinator.current_session().is_none());
    }

    // ── event pump ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_event_pump_drives_work_loop() {
        // Arrange
        let (tx, rx) = mpsc::unbounded_channel();
        let work = Arc::new(WorkLoop::new(Duration::from_millis(10)));
        let request = CollaborationRequest::new("a.ext", "beta", "192.168.1.20".parse().unwrap());
        tx.send(CollaborationEvent::Accepted(request.clone())).unwrap();

        // Act / Assert: Accepted starts work
        let pump = tokio::spawn(run_event_pump(rx, Arc::clone(&work)));
        tokio::time::timeout(Duration::from_secs(1), async {
            while work.current().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(work.current().as_deref(), Some("a.ext"));

        // StopRequested cancels it, and closing the channel ends the pump
        tx.send(CollaborationEvent::StopRequested(request)).unwrap();
        drop(tx);
        pump.await.unwrap();
        assert!(work.current().is_none());
    }
}
