use fx_paper_core::{EngineError, Result};
use tokio::sync::{mpsc, oneshot};

use crate::commands::{LoopCommand, LoopStatus};

/// Cloneable handle to a running loop actor.
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::Sender<LoopCommand>,
}

impl LoopHandle {
    #[must_use]
    pub const fn new(tx: mpsc::Sender<LoopCommand>) -> Self {
        Self { tx }
    }

    /// Starts the loop.
    ///
    /// # Errors
    /// Returns an error if the actor is gone.
    pub async fn start(&self) -> Result<()> {
        self.send(LoopCommand::Start).await
    }

    /// Stops the loop; the actor stays alive for a later start.
    ///
    /// # Errors
    /// Returns an error if the actor is gone.
    pub async fn stop(&self) -> Result<()> {
        self.send(LoopCommand::Stop).await
    }

    /// Reads a status snapshot without blocking the worker.
    ///
    /// # Errors
    /// Returns an error if the actor is gone.
    pub async fn status(&self) -> Result<LoopStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(LoopCommand::GetStatus(reply)).await?;
        rx.await
            .map_err(|_| EngineError::StoreUnavailable("loop actor dropped reply".to_string()))
    }

    /// Shuts the actor down permanently.
    ///
    /// # Errors
    /// Returns an error if the actor is gone.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(LoopCommand::Shutdown).await
    }

    async fn send(&self, command: LoopCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EngineError::StoreUnavailable("loop actor unavailable".to_string()))
    }
}
