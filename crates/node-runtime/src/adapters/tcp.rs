//! # Clear-Net TCP Transport
//!
//! Length-prefixed frames over TCP. Each socket is split into a reader and
//! a writer task that bridge it to the channel pair of a [`Link`], so the
//! connection table treats TCP and in-memory links alike.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use shared_types::{Address, TransportError, TransportType};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use super::network::{Dialer, Link, NodeNetwork};

fn codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

/// Bridge a socket to a [`Link`].
fn link_stream(stream: TcpStream, max_frame_bytes: usize) -> Link {
    let peer = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let (outgoing, mut to_socket) = mpsc::unbounded_channel::<Vec<u8>>();
    let (from_socket, incoming) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut frames = FramedWrite::new(write_half, codec(max_frame_bytes));
        while let Some(frame) = to_socket.recv().await {
            if let Err(e) = frames.send(Bytes::from(frame)).await {
                debug!(?peer, error = %e, "TCP write failed");
                break;
            }
        }
        let _ = SinkExt::<Bytes>::close(&mut frames).await;
    });

    tokio::spawn(async move {
        let mut frames = FramedRead::new(read_half, codec(max_frame_bytes));
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) => {
                    if from_socket.send(frame.to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(?peer, error = %e, "TCP read failed");
                    break;
                }
            }
        }
    });

    Link { outgoing, incoming }
}

pub struct TcpDialer {
    connect_timeout: Duration,
    max_frame_bytes: usize,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration, max_frame_bytes: usize) -> Self {
        Self {
            connect_timeout,
            max_frame_bytes,
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, address: &Address) -> Result<Link, TransportError> {
        if address.transport_type() != TransportType::Clear {
            return Err(TransportError::UnsupportedTransport(address.clone()));
        }
        let failed = |reason: String| TransportError::ConnectionFailed {
            address: address.clone(),
            reason,
        };
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((address.host(), address.port())),
        )
        .await
        .map_err(|_| failed("connect timed out".to_string()))?
        .map_err(|e| failed(e.to_string()))?;
        let _ = stream.set_nodelay(true);
        Ok(link_stream(stream, self.max_frame_bytes))
    }
}

/// Accepts TCP connections and hands them to the connection table.
pub struct TcpServer {
    listener: TcpListener,
    max_frame_bytes: usize,
}

impl TcpServer {
    pub async fn bind(address: &Address, max_frame_bytes: usize) -> std::io::Result<Self> {
        let listener = TcpListener::bind((address.host(), address.port())).await?;
        Ok(Self {
            listener,
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn spawn(self, network: Arc<NodeNetwork>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Ok(local) = self.listener.local_addr() {
                info!(%local, "Listening for TCP connections");
            }
            loop {
                tokio::select! {
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, remote)) => {
                            debug!(%remote, "Accepted TCP connection");
                            let _ = stream.set_nodelay(true);
                            network.accept(link_stream(stream, self.max_frame_bytes));
                        }
                        Err(e) => warn!(error = %e, "Accepting TCP connection failed"),
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("TCP listener stopped");
        })
    }
}
