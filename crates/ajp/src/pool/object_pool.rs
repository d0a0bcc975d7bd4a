use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ListenerConfig;
use crate::connection::Connection;
use crate::handler::Dispatcher;
use crate::listener::Protocol;
use crate::pool::{Pooled, Slab};
use crate::protocol::{PoolError, Request, Response};
use crate::worker::Worker;

/// Pooled requests, responses and worker slots shared by every listener.
///
/// Requests and responses are lent per exchange, a worker slot is held for
/// the whole life of a connection.
#[derive(Debug)]
pub struct ObjectPool {
    requests: Slab<Request>,
    responses: Slab<Response>,
    workers: Arc<Semaphore>,
    max_workers: usize,
    acquire_timeout: Duration,
    max_packet_size: usize,
}

impl ObjectPool {
    pub fn new(config: &ListenerConfig) -> Self {
        let acquire_timeout = config.acquire_timeout_duration();
        Self {
            requests: Slab::new("request", config.pool_capacity, acquire_timeout),
            responses: Slab::new("response", config.pool_capacity, acquire_timeout),
            workers: Arc::new(Semaphore::new(config.max_workers)),
            max_workers: config.max_workers,
            acquire_timeout,
            max_packet_size: config.max_packet_size,
        }
    }

    pub async fn acquire_request(&self) -> Result<Pooled<Request>, PoolError> {
        self.requests.acquire().await
    }

    pub async fn acquire_response(&self) -> Result<Pooled<Response>, PoolError> {
        self.responses.acquire().await
    }

    pub fn release_request(&self, request: Pooled<Request>) {
        self.requests.release(request);
    }

    pub fn release_response(&self, response: Pooled<Response>) {
        self.responses.release(response);
    }

    pub fn requests(&self) -> &Slab<Request> {
        &self.requests
    }

    pub fn responses(&self) -> &Slab<Response> {
        &self.responses
    }

    pub fn active_workers(&self) -> usize {
        self.max_workers - self.workers.available_permits()
    }

    /// Serves an accepted socket on its own worker task.
    ///
    /// When no worker slot frees up in time the socket is closed and
    /// `PoolError::Exhausted` is returned.
    pub async fn handle_request<P, D>(&self, stream: TcpStream, protocol: Arc<P>, dispatcher: Arc<D>) -> Result<JoinHandle<()>, PoolError>
    where
        P: Protocol + 'static,
        D: Dispatcher + 'static,
    {
        let permit = match self.acquire_worker().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(peer = ?stream.peer_addr().ok(), cause = %e, "no worker available, close connection");
                return Err(e);
            }
        };

        let conn = Connection::from_tcp(stream, self.max_packet_size);
        Ok(Self::spawn(permit, conn, protocol, dispatcher))
    }

    /// Serves an already wrapped connection, used for in-memory transports
    pub async fn handle_connection<P, D>(&self, conn: Connection, protocol: Arc<P>, dispatcher: Arc<D>) -> Result<JoinHandle<()>, PoolError>
    where
        P: Protocol + 'static,
        D: Dispatcher + 'static,
    {
        let permit = self.acquire_worker().await?;
        Ok(Self::spawn(permit, conn, protocol, dispatcher))
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    async fn acquire_worker(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        if self.acquire_timeout.is_zero() {
            return Arc::clone(&self.workers).try_acquire_owned().map_err(|e| match e {
                TryAcquireError::NoPermits => PoolError::exhausted(self.max_workers),
                TryAcquireError::Closed => PoolError::Closed,
            });
        }

        tokio::time::timeout(self.acquire_timeout, Arc::clone(&self.workers).acquire_owned())
            .await
            .map_err(|_elapsed| PoolError::exhausted(self.max_workers))?
            .map_err(|_closed| PoolError::Closed)
    }

    fn spawn<P, D>(permit: OwnedSemaphorePermit, conn: Connection, protocol: Arc<P>, dispatcher: Arc<D>) -> JoinHandle<()>
    where
        P: Protocol + 'static,
        D: Dispatcher + 'static,
    {
        debug!(peer = ?conn.peer_addr(), "spawn worker");
        tokio::spawn(async move {
            Worker::new(protocol, dispatcher).run(conn).await;
            drop(permit);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::Barrier;

    use super::*;

    fn pool(capacity: usize) -> ObjectPool {
        ObjectPool::new(&ListenerConfig::new().pool_capacity(capacity).max_workers(1).acquire_timeout(Duration::ZERO))
    }

    #[tokio::test]
    async fn exhausted_request_pool() {
        let pool = pool(2);

        let first = pool.acquire_request().await.unwrap();
        let second = pool.acquire_request().await.unwrap();
        assert_ne!(first.slot(), second.slot());
        assert_eq!(pool.acquire_request().await.unwrap_err(), PoolError::exhausted(2));

        pool.release_request(first);
        assert!(pool.acquire_request().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_acquires_get_distinct_requests() {
        const CAPACITY: usize = 16;
        let pool = Arc::new(pool(CAPACITY));
        let start = Arc::new(Barrier::new(CAPACITY + 1));
        let done = Arc::new(Barrier::new(CAPACITY + 1));

        let tasks: Vec<_> = (0..=CAPACITY)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let start = Arc::clone(&start);
                let done = Arc::clone(&done);
                tokio::spawn(async move {
                    start.wait().await;
                    let acquired = pool.acquire_request().await;
                    // hold the request until every task has tried
                    done.wait().await;
                    acquired.map(|request| request.slot())
                })
            })
            .collect();

        let mut slots = HashSet::new();
        let mut exhausted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(slot) => assert!(slots.insert(slot), "slot {slot} lent twice"),
                Err(e) => {
                    assert_eq!(e, PoolError::exhausted(CAPACITY));
                    exhausted += 1;
                }
            }
        }

        assert_eq!(slots.len(), CAPACITY);
        assert_eq!(exhausted, 1);
        assert_eq!(pool.requests().in_use(), 0);
    }

    #[tokio::test]
    async fn requests_and_responses_are_separate() {
        let pool = pool(1);

        let _request = pool.acquire_request().await.unwrap();
        let response = pool.acquire_response().await.unwrap();
        assert_eq!(response.slot(), 0);
        assert_eq!(pool.requests().in_use(), 1);
        assert_eq!(pool.responses().in_use(), 1);
    }

    #[tokio::test]
    async fn released_request_comes_back_clean() {
        let pool = pool(1);

        let mut request = pool.acquire_request().await.unwrap();
        request.set_uri("/secret");
        request.set_attribute("route", "node1");
        pool.release_request(request);

        let request = pool.acquire_request().await.unwrap();
        assert_eq!(request.uri(), "");
        assert!(request.attributes().is_empty());
    }

    #[tokio::test]
    async fn worker_slots_are_bounded() {
        let pool = pool(1);

        let held = pool.acquire_worker().await.unwrap();
        assert_eq!(pool.active_workers(), 1);
        assert_eq!(pool.acquire_worker().await.unwrap_err(), PoolError::exhausted(1));

        drop(held);
        assert_eq!(pool.active_workers(), 0);
    }
}
