use crate::error::LinkError;
use futures_util::{SinkExt, StreamExt};
use rv_core::channel::{decode_frame, encode_frame, MAX_SUBMISSION_BYTES};
use rv_core::{ClientFrame, ServerFrame};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};
use url::Url;

const OUTBOUND_QUEUE: usize = 64;
const INBOUND_QUEUE: usize = 256;

/// One open websocket to the command-link store.
///
/// Writes go through a queue drained by a writer task, so `send` never waits
/// on the socket. Inbound text frames are handed over in arrival order.
pub struct ChannelHandle {
    outbound: Option<mpsc::Sender<String>>,
    inbound: mpsc::Receiver<String>,
    max_frame_bytes: usize,
    reader: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub async fn open(endpoint: &Url, max_frame_bytes: usize) -> Result<Self, LinkError> {
        let (ws, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|err| LinkError::Connection(err.to_string()))?;
        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let (in_tx, in_rx) = mpsc::channel::<String>(INBOUND_QUEUE);

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(err) = sink.send(WsMessage::Text(text)).await {
                    warn!(event = "link_write_error", error = %err);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                let text = match result {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!(event = "link_binary_not_utf8");
                            continue;
                        }
                    },
                    Ok(WsMessage::Close(frame)) => {
                        debug!(event = "link_close_frame", frame = ?frame);
                        break;
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(event = "link_read_error", error = %err);
                        break;
                    }
                };
                if in_tx.send(text).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            outbound: Some(out_tx),
            inbound: in_rx,
            max_frame_bytes,
            reader: Some(reader),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_channels(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<String>,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound,
            max_frame_bytes,
            reader: None,
        }
    }

    /// Queues a frame for the writer. Fails once the handle is closed or the
    /// connection's writer has gone away.
    pub async fn send(&self, frame: &ClientFrame) -> Result<(), LinkError> {
        let sender = self.outbound.as_ref().ok_or(LinkError::ChannelClosed)?;
        let text = encode_frame(frame, MAX_SUBMISSION_BYTES)?;
        sender
            .send(text)
            .await
            .map_err(|_| LinkError::ChannelClosed)
    }

    /// Next inbound frame. `None` means the connection ended or the handle
    /// was closed; a frame that fails to parse comes back as an error and
    /// the stream carries on.
    pub async fn next_frame(&mut self) -> Option<Result<ServerFrame, LinkError>> {
        if self.outbound.is_none() {
            return None;
        }
        let text = self.inbound.recv().await?;
        Some(decode_frame(&text, self.max_frame_bytes).map_err(LinkError::from))
    }

    pub fn close(&mut self) {
        if self.outbound.take().is_none() {
            return;
        }
        self.inbound.close();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_none()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}
