//! TCP gateway that chat bridges connect to

use super::protocol::{decode, read_frame, write_frame, ClientMessage, ServerMessage};
use crate::engine::notify::{BroadcastNotifier, Notice};
use crate::engine::Engine;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default gateway port
pub const DEFAULT_PORT: u16 = 55333;

/// Maximum port to try when auto-incrementing
const MAX_PORT: u16 = 55433;

/// A bound gateway, ready to serve.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Server {
    /// Bind to `listen` ("host:port").
    ///
    /// If the port is taken, the next ones are tried up to `MAX_PORT`.
    /// Port 0 asks the OS for any free port.
    pub async fn bind(listen: &str) -> io::Result<Self> {
        let requested: SocketAddr = listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{}: {}", listen, e)))?;

        let mut addr = requested;
        let listener = loop {
            match TcpListener::bind(addr).await {
                Ok(l) => break l,
                Err(e)
                    if e.kind() == io::ErrorKind::AddrInUse
                        && addr.port() != 0
                        && addr.port() < MAX_PORT =>
                {
                    debug!(port = addr.port(), "port in use, trying next");
                    addr.set_port(addr.port() + 1);
                }
                Err(e) => return Err(e),
            }
        };

        let addr = listener.local_addr()?;
        info!(%addr, "gateway listening");
        Ok(Server { listener, addr })
    }

    /// Address the gateway is bound to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept bridges forever.
    ///
    /// Every bridge receives every notice published on `notices`.
    pub async fn run(self, engine: Arc<Engine>, notices: BroadcastNotifier) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "bridge connected");
                    let engine = engine.clone();
                    let rx = notices.subscribe();
                    tokio::spawn(async move {
                        serve_bridge(stream, peer, engine, rx).await;
                        info!(%peer, "bridge disconnected");
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

/// Handle one bridge until it disconnects.
async fn serve_bridge(
    stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<Engine>,
    notices: broadcast::Receiver<Notice>,
) {
    let (mut reader, writer) = stream.into_split();
    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, replies_rx, notices));

    loop {
        let body = match read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "dropping bridge");
                break;
            }
        };

        match decode::<ClientMessage>(&body) {
            Ok(ClientMessage::Trial(trial)) => {
                // Own task, so a reveal delay never holds up this reader
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine.process_trial(trial).await;
                });
            }
            Ok(ClientMessage::Command(request)) => {
                engine.dispatch(request);
            }
            Ok(ClientMessage::Ping { nonce }) => {
                let _ = replies_tx.send(ServerMessage::Pong { nonce });
            }
            Err(e) => {
                debug!(%peer, error = %e, "malformed frame");
                let _ = replies_tx.send(ServerMessage::Error {
                    message: format!("malformed message: {}", e),
                });
            }
        }
    }

    writer_task.abort();
}

/// Forward direct replies and broadcast notices to the bridge.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut replies: mpsc::UnboundedReceiver<ServerMessage>,
    mut notices: broadcast::Receiver<Notice>,
) {
    loop {
        let msg = tokio::select! {
            Some(reply) = replies.recv() => reply,
            notice = notices.recv() => match notice {
                Ok(notice) => ServerMessage::from(notice),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "bridge too slow, notices dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "write failed");
            break;
        }
    }
}
