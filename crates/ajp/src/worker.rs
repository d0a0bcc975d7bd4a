//! The per-connection task.
//!
//! A worker loops over the exchanges of one connection: allocate, dispatch,
//! finish, deallocate, then asks the protocol whether to try another one.
//! Exchanges never overlap, the next allocate starts only after the previous
//! deallocate returned.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::handler::{Dispatcher, ResponseWriter};
use crate::listener::{Allocation, Protocol};
use crate::protocol::{Request, Response};

#[derive(Debug)]
pub struct Worker<P, D> {
    protocol: Arc<P>,
    dispatcher: Arc<D>,
}

impl<P, D> Worker<P, D>
where
    P: Protocol,
    D: Dispatcher,
{
    pub fn new(protocol: Arc<P>, dispatcher: Arc<D>) -> Self {
        Self { protocol, dispatcher }
    }

    pub async fn run(self, mut conn: Connection) {
        let peer = conn.peer_addr();
        let mut first = true;
        let mut exchanges = 0usize;

        loop {
            match self.protocol.allocate(&mut conn, first).await {
                Ok(Allocation::Exchange { mut request, mut response }) => {
                    exchanges += 1;
                    let reuse = self.exchange(&mut conn, &mut request, &mut response).await;
                    self.protocol.deallocate(Some(request), Some(response));
                    if !reuse {
                        break;
                    }
                }
                Ok(Allocation::Skip) => {}
                Ok(Allocation::NoRequest) => break,
                Err(e) if e.is_timeout() => {
                    info!(?peer, cause = %e, "no request before the connection timeout");
                    break;
                }
                Err(e) => {
                    warn!(?peer, cause = %e, "can't read request, close connection");
                    break;
                }
            }

            first = false;
            if !self.protocol.await_next_request(&mut conn).await {
                break;
            }
        }

        debug!(?peer, exchanges, "connection finished");
        self.protocol.release(conn).await;
    }

    /// Runs one exchange, returns whether the connection can carry another one
    async fn exchange(&self, conn: &mut Connection, request: &mut Request, response: &mut Response) -> bool {
        let target = self.protocol.resolve_request_target(request).unwrap_or_else(|| request.uri().to_string());

        let result = {
            let mut writer = ResponseWriter::new(response, conn.output());
            self.dispatcher.dispatch(&target, request, &mut writer).await
        };

        let reuse = match result {
            Ok(()) => true,
            Err(e) if response.is_committed() => {
                error!(uri = %target, cause = %e, "dispatch failed after the response was committed");
                false
            }
            Err(e) => {
                error!(uri = %target, cause = %e, "dispatch failed");
                response.reset_head(StatusCode::INTERNAL_SERVER_ERROR);
                true
            }
        };

        match self.protocol.finish(conn, response, reuse).await {
            Ok(()) => reuse,
            Err(e) => {
                error!(uri = %target, cause = %e, "can't finish response");
                false
            }
        }
    }
}
