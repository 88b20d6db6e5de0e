// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The TCP connection server: one accept loop, one task per connection,
//! request/response order preserved within a connection but not across
//! connections.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use crate::codec::tcp::ServerCodec;
use crate::datastore::Datastore;
use crate::error::Error;
use crate::frame::tcp::{RequestAdu, ResponseAdu};

use super::transaction;

/// Graceful shutdown's join timeout, matching the Python source's
/// `server_thread.join(timeout=2)`.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running Modbus TCP server. Dropping this without calling [`Server::stop`]
/// leaves the accept loop and any open connections running in the
/// background; `stop` is the orderly way to bring them down.
pub struct Server {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    /// Bind a listener and start accepting connections against `datastore`.
    pub async fn bind(addr: SocketAddr, datastore: Arc<dyn Datastore>) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await.map_err(Error::Bind)?;
        let local_addr = listener.local_addr().map_err(Error::Bind)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(listener, datastore, shutdown_rx));
        info!("modbus server listening on {local_addr}");
        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            accept_task: Some(accept_task),
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections and wait (bounded) for the accept
    /// loop to exit.
    ///
    /// Mirrors the Python source's `Server.stop()`: signal shutdown, then
    /// connect to our own listener to unblock a pending `accept()` the same
    /// way the Python version's `stop()` opens a throwaway connection to
    /// itself, then join with a timeout rather than waiting forever.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if TcpStream::connect(self.local_addr).await.is_err() {
            debug!("self-connect to unblock accept() failed; accept loop may already be exiting");
        }
        if let Some(task) = self.accept_task.take() {
            if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, task)
                .await
                .is_err()
            {
                error!("accept loop did not exit within {SHUTDOWN_JOIN_TIMEOUT:?}");
            }
        }
        info!("modbus server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    datastore: Arc<dyn Datastore>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let datastore = Arc::clone(&datastore);
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, datastore.as_ref()).await {
                                error!("connection from {peer_addr} closed: {err}");
                            }
                        });
                    }
                    Err(err) => error!("accept failed: {err}"),
                }
            }
        }
    }
}

/// The request-response loop for a single connection: strictly ordered
/// within this connection, independent of every other connection.
async fn serve_connection(stream: TcpStream, datastore: &dyn Datastore) -> io::Result<()> {
    let mut framed = Framed::new(stream, ServerCodec::default());

    while let Some(request_adu) = framed.next().await.transpose()? {
        let RequestAdu {
            hdr,
            function,
            outcome,
        } = request_adu;
        let result = match outcome {
            Ok(request) => transaction::handle(request, datastore).await,
            Err(exception) => Err(exception),
        };
        framed
            .send(ResponseAdu {
                hdr,
                function,
                result,
            })
            .await?;
    }
    Ok(())
}
