//! Duplex event channel to the shape-recognition service.
//!
//! Wire format: one JSON object per line, tagged by `event`.

use crate::error::ChannelError;
use futures::{SinkExt, StreamExt};
use lobe_games::tracing_session::ShapeStatus;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, warn};

/// Bounded queue between the daemon and the socket writer.
const OUTBOUND_CAPACITY: usize = 16;
const INBOUND_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A camera frame; the server answers with `ack` carrying the same id.
    ProcessFrame {
        id: u64,
        image: String,
        user_id: String,
    },
    /// Ask for a new target shape.
    ResetGame { user_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Ack {
        id: u64,
    },
    FrameResult {
        #[serde(default)]
        image: String,
        shape_name: String,
        status: ShapeStatus,
    },
    StatusUpdate {
        #[serde(default)]
        message: String,
    },
}

/// Client half of a connected recognition channel.
///
/// Dropping the link stops both socket tasks.
#[derive(Debug)]
pub struct RecognitionLink {
    outbound: mpsc::Sender<ClientEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl RecognitionLink {
    /// Connect and start the socket tasks. Inbound events arrive on the
    /// returned receiver, which closes when the server hangs up.
    ///
    /// Gives up with [`ChannelError::Timeout`] if the connection is not
    /// established within `within`.
    pub async fn connect(
        addr: &str,
        within: Duration,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>), ChannelError> {
        let stream = connect_within(addr, within, TcpStream::connect(addr)).await?;
        Ok(Self::start(stream))
    }

    fn start(stream: TcpStream) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (reader, writer) = stream.into_split();

        let (out_tx, mut out_rx) = mpsc::channel::<ClientEvent>(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<ServerEvent>(INBOUND_CAPACITY);

        let write_task = tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, LinesCodec::new());
            while let Some(event) = out_rx.recv().await {
                let line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Dropping unencodable recognition event: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(line).await {
                    warn!("Recognition channel write failed: {}", e);
                    break;
                }
            }
        });

        let read_task = tokio::spawn(async move {
            let mut lines = FramedRead::new(reader, LinesCodec::new());
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Recognition channel read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ServerEvent>(&line) {
                    Ok(event) => {
                        if in_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("Ignoring unrecognized recognition event: {}", e),
                }
            }
        });

        (
            Self {
                outbound: out_tx,
                tasks: vec![write_task, read_task],
            },
            in_rx,
        )
    }

    /// Queue an event without waiting.
    pub fn send(&self, event: ClientEvent) -> Result<(), ChannelError> {
        self.outbound.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

async fn connect_within<F>(addr: &str, within: Duration, connecting: F) -> Result<TcpStream, ChannelError>
where
    F: Future<Output = std::io::Result<TcpStream>>,
{
    match tokio::time::timeout(within, connecting).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ChannelError::Connect {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(ChannelError::Timeout {
            addr: addr.to_string(),
            after: within,
        }),
    }
}

impl Drop for RecognitionLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Admits at most one unacknowledged frame.
///
/// The single semaphore permit is held together with the id of the frame in
/// flight and released only by the matching acknowledgment.
#[derive(Debug)]
pub struct FrameGate {
    permits: Arc<Semaphore>,
    in_flight: Option<(u64, OwnedSemaphorePermit)>,
    next_id: u64,
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            in_flight: None,
            next_id: 1,
        }
    }

    /// Reserve the slot for a new frame and return its id, or `None` while a
    /// frame is still unacknowledged.
    pub fn try_begin(&mut self) -> Option<u64> {
        let permit = Arc::clone(&self.permits).try_acquire_owned().ok()?;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.in_flight = Some((id, permit));
        Some(id)
    }

    /// Release the slot if `id` is the frame in flight.
    pub fn acknowledge(&mut self, id: u64) -> bool {
        match self.in_flight {
            Some((pending, _)) if pending == id => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// Give the slot back for a frame that was never delivered.
    pub fn abandon(&mut self) {
        self.in_flight = None;
    }

    pub fn in_flight(&self) -> usize {
        1 - self.permits.available_permits()
    }
}
