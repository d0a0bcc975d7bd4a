use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderValue;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use micro_ajp::config::ListenerConfig;
use micro_ajp::handler::{BoxError, Dispatcher, ResponseWriter};
use micro_ajp::listener::{Ajp13Protocol, ConnectionListener};
use micro_ajp::pool::ObjectPool;
use micro_ajp::protocol::Request;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ListenerConfig::new().listen_port(Some(8009));
    config.validate()?;

    let pool = Arc::new(ObjectPool::new(&config));
    let protocol = Arc::new(Ajp13Protocol::new(&config, Arc::clone(&pool)));
    let mut listener = ConnectionListener::new(config, pool, protocol, Arc::new(SimpleDispatcher));

    if let Err(e) = listener.start() {
        error!(cause = %e, "bind listener error");
        return Err(e.into());
    }
    info!(addr = ?listener.local_addr(), "ajp13 listener started");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    listener.destroy();
    listener.join().await;
    Ok(())
}

#[derive(Debug)]
struct SimpleDispatcher;

#[async_trait]
impl Dispatcher for SimpleDispatcher {
    async fn dispatch(&self, target: &str, request: &mut Request, response: &mut ResponseWriter<'_>) -> Result<(), BoxError> {
        info!(method = %request.method(), uri = target, remote = request.remote_addr(), "dispatch");

        let body = format!("Hello from {target}!");
        response.insert_header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response.insert_header(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        response.write(body.as_bytes()).await?;
        Ok(())
    }
}
