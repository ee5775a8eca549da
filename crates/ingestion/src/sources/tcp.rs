//! TCP packet server
//!
//! Producers connect and write a stream of concatenated packets. Every
//! connection is read by its own task; frames funnel into one bounded queue
//! consumed through [`TcpPacketSource`]. Packets published on the
//! [`BroadcastSink`] are written back to every connected peer.
//!
//! The receive half is a separate value so the pipeline can consume and drop
//! it while connections stay open for outbound packets. Connections close
//! only when the [`TcpPacketServer`] itself shuts down or is dropped.

use std::net::SocketAddr;

use codec::PacketCodec;
use contracts::{ContractError, PacketSink, PacketSource, RawPacket};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Outbound fan-out buffer per peer
const OUTBOUND_CAPACITY: usize = 256;

/// Packet server bound to a local address
pub struct TcpPacketServer {
    name: String,
    local_addr: SocketAddr,
    rx: Option<mpsc::Receiver<RawPacket>>,
    outbound: broadcast::Sender<RawPacket>,
    shutdown: CancellationToken,
}

impl TcpPacketServer {
    /// Bind `addr` and start accepting producers
    #[instrument(name = "tcp_packet_server_bind", skip(capacity))]
    pub async fn bind(addr: &str, capacity: usize) -> Result<Self, ContractError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ContractError::source_error("tcp", format!("bind {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        let shutdown = CancellationToken::new();

        tokio::spawn(accept_loop(
            listener,
            tx,
            outbound.clone(),
            shutdown.clone(),
        ));

        info!(%local_addr, "packet server listening");

        Ok(Self {
            name: format!("tcp://{local_addr}"),
            local_addr,
            rx: Some(rx),
            outbound,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive half of the server. Returns `None` once taken.
    pub fn take_source(&mut self) -> Option<TcpPacketSource> {
        self.rx.take().map(|rx| TcpPacketSource {
            name: self.name.clone(),
            rx,
            shutdown: self.shutdown.clone(),
        })
    }

    /// Sink writing packets to every connected peer
    pub fn sink(&self) -> BroadcastSink {
        BroadcastSink {
            name: self.name.clone(),
            tx: self.outbound.clone(),
        }
    }

    /// Stop accepting and close every connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TcpPacketServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Packets read from every producer connection, in arrival order.
///
/// Dropping the source stops intake but leaves connections open.
pub struct TcpPacketSource {
    name: String,
    rx: mpsc::Receiver<RawPacket>,
    shutdown: CancellationToken,
}

impl PacketSource for TcpPacketSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_packet(&mut self) -> Option<RawPacket> {
        tokio::select! {
            packet = self.rx.recv() => packet,
            _ = self.shutdown.cancelled() => None,
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<RawPacket>,
    outbound: broadcast::Sender<RawPacket>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(%peer, "producer connected");
                    tokio::spawn(connection(
                        stream,
                        peer,
                        tx.clone(),
                        outbound.subscribe(),
                        shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            },
            _ = shutdown.cancelled() => break,
        }
    }
    debug!("accept loop stopped");
}

async fn connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<RawPacket>,
    mut outbound: broadcast::Receiver<RawPacket>,
    shutdown: CancellationToken,
) {
    let mut framed = Framed::new(stream, PacketCodec::default());
    // Cleared once the source is gone; the peer still receives outbound packets
    let mut reading = true;

    loop {
        tokio::select! {
            frame = framed.next(), if reading => match frame {
                Some(Ok(packet)) => {
                    if tx.send(packet).await.is_err() {
                        debug!(%peer, "source dropped, no longer reading from peer");
                        reading = false;
                    }
                }
                Some(Err(e)) => {
                    // Framing cannot resync after a bad header
                    warn!(%peer, error = %e, "closing connection on framing error");
                    break;
                }
                None => break,
            },
            packet = outbound.recv() => match packet {
                Ok(packet) => {
                    if let Err(e) = framed.send(packet).await {
                        warn!(%peer, error = %e, "failed to write to peer");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%peer, skipped, "peer lagging, outbound packets skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    debug!(%peer, "producer disconnected");
}

/// Writes published packets to every connected peer
#[derive(Clone)]
pub struct BroadcastSink {
    name: String,
    tx: broadcast::Sender<RawPacket>,
}

impl PacketSink for BroadcastSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&mut self, packet: RawPacket) -> Result<(), ContractError> {
        match self.tx.send(packet) {
            Ok(peers) => {
                debug!(sink = %self.name, peers, "outbound packet queued");
                Ok(())
            }
            Err(_) => Err(ContractError::sink_write(
                &self.name,
                "no peers connected, outbound packet not delivered",
            )),
        }
    }
}
