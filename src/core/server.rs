use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::core::session::{Session, SessionLimits};
use crate::database::registry::UserRegistry;
use crate::utils::config::Config;
use crate::utils::errors::{RelayError, Result};
use crate::utils::types::ConnIdAllocator;

//Pause after a failed accept so fd exhaustion doesn't spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    registry: Arc<UserRegistry>,
    limits: SessionLimits,
    ids: ConnIdAllocator,
}

impl Server {
    pub async fn bind(config: &Config) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen_addr()?).await?;
        Ok(Self::from_listener(listener, config))
    }

    pub fn from_listener(listener: TcpListener, config: &Config) -> Self {
        Self {
            listener,
            registry: Arc::new(UserRegistry::from_config(config)),
            limits: SessionLimits::from(config),
            ids: ConnIdAllocator::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<UserRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves. Sessions already running are left to finish
    /// on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            registry,
            limits,
            ids,
        } = self;
        info!("Server is running on {}", listener.local_addr()?);

        let mut incoming = TcpListenerStream::new(listener);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down...");
                    break;
                }
                next = incoming.next() => match next {
                    Some(Ok(stream)) => {
                        let conn = ids.allocate();
                        match stream.peer_addr() {
                            Ok(peer) => debug!("Accepted {} from {}", conn, peer),
                            Err(_) => debug!("Accepted {}", conn),
                        }
                        let _ = stream.set_nodelay(true);
                        let session = Session::new(stream, conn, Arc::clone(&registry), limits);
                        tokio::spawn(async move {
                            match session.run().await {
                                Ok(()) => debug!("{} closed", conn),
                                Err(RelayError::Frame(e)) if e.is_disconnect() => {
                                    debug!("{} hung up: {}", conn, e)
                                }
                                Err(e) => warn!("{} closed: {}", conn, e),
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!("Error on accept call: {}", e);
                        sleep(ACCEPT_BACKOFF).await;
                    }
                    None => break,
                },
            }
        }
        Ok(())
    }
}
