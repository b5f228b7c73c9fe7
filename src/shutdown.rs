//! Graceful Shutdown Handling
//!
//! Process-level termination comes from two places: SIGTERM/SIGINT and a
//! `stop` command typed on the operator console. Either one fires the
//! coordinator exactly once; the main task waits for it, closes the
//! listener and lets the credential guard persist the token on the way out.

use std::fmt;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Result;

/// What asked the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(&'static str),
    StopCommand,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "{} received", name),
            ShutdownReason::StopCommand => f.write_str("stop command"),
        }
    }
}

/// Shutdown coordinator that fires once and can be awaited from anywhere
pub struct ShutdownCoordinator {
    reason: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        Self { reason }
    }

    /// Request shutdown. Returns false if shutdown was already requested.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let fired = self.reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if fired {
            info!("Shutdown requested: {}", reason);
        } else {
            debug!("Ignoring repeated shutdown request: {}", reason);
        }
        fired
    }

    /// Reason shutdown was requested, if it has been
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.reason.borrow()
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.reason.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender
                return ShutdownReason::Signal("channel closed");
            }
        }
    }

    /// Start listening for shutdown signals (SIGTERM, SIGINT)
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    self.trigger(ShutdownReason::Signal("SIGTERM"));
                }
                _ = sigint.recv() => {
                    self.trigger(ShutdownReason::Signal("SIGINT"));
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            self.trigger(ShutdownReason::Signal("Ctrl+C"));
        }

        Ok(())
    }

    /// Run `listen_for_signals` in a background task
    pub fn spawn_signal_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = coordinator.listen_for_signals().await {
                error!("Error setting up signal handlers: {}", e);
            }
        })
    }

    /// Read operator commands line by line; `stop` requests shutdown.
    /// End of input stops listening without shutting down.
    ///
    /// Runs on its own thread: a console read blocks until a line arrives
    /// and must not keep the runtime alive once shutdown has begun.
    pub fn spawn_command_listener<R>(
        self: &Arc<Self>,
        input: R,
    ) -> io::Result<thread::JoinHandle<()>>
    where
        R: BufRead + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        thread::Builder::new()
            .name("console-commands".to_string())
            .spawn(move || {
                for line in input.lines() {
                    match line {
                        Ok(line) => match line.trim() {
                            "stop" => {
                                coordinator.trigger(ShutdownReason::StopCommand);
                                return;
                            }
                            "" => {}
                            other => warn!("Unknown command: {} (type 'stop' to exit)", other),
                        },
                        Err(e) => {
                            warn!("Failed to read console command: {}", e);
                            return;
                        }
                    }
                }
                debug!("Console input closed, no longer reading commands");
            })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
