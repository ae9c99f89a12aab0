//! Typed message channels for one SWAP peer connection.

use asynchronous_codec::Framed;
use futures::{AsyncRead, AsyncWrite, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use vertex_swarm_primitives::OverlayAddress;

use crate::{SwapCodec, SwapMessage};

/// The remote end of a connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// One SWAP connection to a remote peer.
///
/// The transport delivers decoded messages on `inbound` and drains `outbound`.
/// Sending never blocks, so messages can be queued while holding locks.
#[derive(Debug)]
pub struct SwapConnection {
    /// Remote peer identity.
    pub peer: OverlayAddress,
    /// Messages received from the peer; `None` once the connection closed.
    pub inbound: mpsc::UnboundedReceiver<SwapMessage>,
    /// Messages to send to the peer.
    pub outbound: mpsc::UnboundedSender<SwapMessage>,
}

impl SwapConnection {
    pub fn new(
        peer: OverlayAddress,
        inbound: mpsc::UnboundedReceiver<SwapMessage>,
        outbound: mpsc::UnboundedSender<SwapMessage>,
    ) -> Self {
        Self {
            peer,
            inbound,
            outbound,
        }
    }

    /// Two in-memory connections wired to each other.
    ///
    /// The first is `a`'s connection to `b`, the second is `b`'s connection to `a`.
    pub fn pair(a: OverlayAddress, b: OverlayAddress) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(b, a_rx, a_tx), Self::new(a, b_rx, b_tx))
    }

    /// Run the connection over a byte stream framed with [`SwapCodec`].
    ///
    /// Spawns a reader and a writer task on the current tokio runtime. The
    /// inbound channel closes on EOF or on the first undecodable frame; the
    /// writer stops once every outbound sender is dropped.
    pub fn framed<T>(peer: OverlayAddress, io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut sink, mut stream) = Framed::new(io, SwapCodec::default()).split::<SwapMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<SwapMessage>();

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(msg) => {
                        if in_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(%peer, error = %e, "Dropping undecodable SWAP stream");
                        break;
                    }
                }
            }
            debug!(%peer, "SWAP reader finished");
        });

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!(%peer, error = %e, "Failed to write SWAP message");
                    return;
                }
            }
            let _ = sink.close().await;
            debug!(%peer, "SWAP writer finished");
        });

        Self::new(peer, in_rx, out_tx)
    }

    /// Queue a message for the peer.
    pub fn send(&self, msg: impl Into<SwapMessage>) -> Result<(), ConnectionClosed> {
        self.outbound.send(msg.into()).map_err(|_| ConnectionClosed)
    }

    /// A handle for sending to the peer from elsewhere.
    pub fn sender(&self) -> mpsc::UnboundedSender<SwapMessage> {
        self.outbound.clone()
    }

    /// Next message from the peer.
    pub async fn recv(&mut self) -> Option<SwapMessage> {
        self.inbound.recv().await
    }
}
