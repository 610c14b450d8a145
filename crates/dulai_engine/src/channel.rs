use dulai_core::{ProgressMessage, TaskId};
use engine_logging::{engine_debug, engine_warn};
use tokio::sync::{mpsc, Mutex};

use crate::EngineError;

struct Outbox {
    tx: mpsc::Sender<ProgressMessage>,
    sent: u64,
    terminal_sent: bool,
}

/// Ordered, single-task message channel towards one client connection.
///
/// Sends are serialized, so concurrent producers never interleave and the
/// receiver sees messages in the order `send` completed. After a terminal
/// message (`Success` or `Error`) every further send fails with
/// [`EngineError::ChannelClosed`].
pub struct ProgressChannel {
    task_id: TaskId,
    outbox: Mutex<Outbox>,
}

impl ProgressChannel {
    pub fn new(task_id: TaskId, capacity: usize) -> (Self, mpsc::Receiver<ProgressMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let channel = Self {
            task_id,
            outbox: Mutex::new(Outbox {
                tx,
                sent: 0,
                terminal_sent: false,
            }),
        };
        (channel, rx)
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub async fn send(&self, message: ProgressMessage) -> Result<(), EngineError> {
        let mut outbox = self.outbox.lock().await;
        if outbox.terminal_sent {
            engine_warn!(
                "channel_send_after_terminal task={} sent={}",
                self.task_id,
                outbox.sent
            );
            return Err(EngineError::ChannelClosed {
                task_id: self.task_id,
            });
        }
        let terminal = message.is_terminal();
        if outbox.tx.send(message).await.is_err() {
            engine_debug!("channel_receiver_gone task={}", self.task_id);
            return Err(EngineError::ClientDisconnected);
        }
        outbox.sent += 1;
        if terminal {
            outbox.terminal_sent = true;
            engine_debug!("channel_terminal task={} sent={}", self.task_id, outbox.sent);
        }
        Ok(())
    }

    /// Number of messages delivered so far.
    pub async fn sent(&self) -> u64 {
        self.outbox.lock().await.sent
    }

    pub async fn is_finished(&self) -> bool {
        self.outbox.lock().await.terminal_sent
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn disconnected(&self) {
        let tx = self.outbox.lock().await.tx.clone();
        tx.closed().await;
    }

    pub async fn is_disconnected(&self) -> bool {
        self.outbox.lock().await.tx.is_closed()
    }
}
