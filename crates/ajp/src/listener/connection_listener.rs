use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::ListenerConfig;
use crate::handler::Dispatcher;
use crate::listener::Protocol;
use crate::pool::ObjectPool;

/// Owns the server socket and its accept loop.
///
/// Accepted sockets are handed to the [`ObjectPool`] and never served on the
/// accept task, so a slow exchange can't hold up new connections. The loop
/// wakes up at least once per `accept_timeout` and stops after
/// [`ConnectionListener::destroy`].
#[derive(Debug)]
pub struct ConnectionListener<P, D> {
    config: ListenerConfig,
    pool: Arc<ObjectPool>,
    protocol: Arc<P>,
    dispatcher: Arc<D>,
    cancel: CancellationToken,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

impl<P, D> ConnectionListener<P, D>
where
    P: Protocol + 'static,
    D: Dispatcher + 'static,
{
    pub fn new(config: ListenerConfig, pool: Arc<ObjectPool>, protocol: Arc<P>, dispatcher: Arc<D>) -> Self {
        Self { config, pool, protocol, dispatcher, cancel: CancellationToken::new(), local_addr: None, accept_task: None }
    }

    /// Binds the server socket and spawns the accept loop.
    ///
    /// Returns `Ok(false)` without binding when no port is configured, and an
    /// `InvalidInput` error when the config fails [`ListenerConfig::validate`].
    pub fn start(&mut self) -> io::Result<bool> {
        if let Err(e) = self.config.validate() {
            error!(cause = %e, "AJP13 listener config invalid");
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e));
        }

        let Some(addr) = self.config.bind_addr() else {
            info!("AJP13 listener disabled, no port configured");
            return Ok(false);
        };

        let listener = match bind(addr, self.config.backlog) {
            Ok(listener) => listener,
            Err(e) => {
                error!(%addr, cause = %e, "AJP13 listener bind failed");
                return Err(e);
            }
        };

        let local_addr = listener.local_addr()?;
        info!(%local_addr, backlog = self.config.backlog, "AJP13 listener started");

        let accept_loop = AcceptLoop {
            listener,
            pool: Arc::clone(&self.pool),
            protocol: Arc::clone(&self.protocol),
            dispatcher: Arc::clone(&self.dispatcher),
            cancel: self.cancel.clone(),
            accept_timeout: self.config.accept_timeout_duration(),
        };
        self.local_addr = Some(local_addr);
        self.accept_task = Some(tokio::spawn(accept_loop.run()));
        Ok(true)
    }

    /// The bound address, available once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Asks the accept loop to stop, connections in flight are left to finish
    pub fn destroy(&self) {
        debug!("AJP13 listener destroy requested");
        self.cancel.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits until the accept loop has exited and the server socket is closed
    pub async fn join(&mut self) {
        if let Some(task) = self.accept_task.take()
            && let Err(e) = task.await
        {
            error!(cause = %e, "AJP13 accept task failed");
        }
    }
}

fn bind(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

struct AcceptLoop<P, D> {
    listener: TcpListener,
    pool: Arc<ObjectPool>,
    protocol: Arc<P>,
    dispatcher: Arc<D>,
    cancel: CancellationToken,
    accept_timeout: Duration,
}

impl<P, D> AcceptLoop<P, D>
where
    P: Protocol + 'static,
    D: Dispatcher + 'static,
{
    async fn run(self) {
        loop {
            let accepted = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                accepted = tokio::time::timeout(self.accept_timeout, self.listener.accept()) => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(Ok(accepted)) => accepted,
                Ok(Err(e)) => {
                    error!(cause = %e, "AJP13 accept failed, listener shutdown");
                    break;
                }
                Err(_elapsed) => {
                    trace!("accept timeout tick");
                    continue;
                }
            };

            debug!(%peer, "accepted connection");
            if let Err(e) =
                self.pool.handle_request(stream, Arc::clone(&self.protocol), Arc::clone(&self.dispatcher)).await
            {
                warn!(%peer, cause = %e, "connection rejected");
            }
        }

        drop(self.listener);
        info!("AJP13 listener shutdown successfully");
    }
}
