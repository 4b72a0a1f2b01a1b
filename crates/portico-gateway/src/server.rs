//! HTTP/1.1 server.
//!
//! One task per connection, each serving requests through the shared
//! [`RequestDispatcher`]. On shutdown the listener stops accepting, readiness
//! turns false, and open connections get `server.shutdown_timeout_secs` to
//! finish.

use crate::dispatcher::RequestDispatcher;
use crate::error::{ServerError, ServerResult};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Notify};

/// A cloneable stop signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Creates a signal triggered by Ctrl-C or SIGTERM.
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });
        signal
    }

    /// Triggers shutdown. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once triggered.
    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes once triggered.
    pub async fn recv(&self) {
        let mut receiver = self.sender.subscribe();
        // Only fails if the sender is dropped, and `self` holds it.
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

async fn wait_for_os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

/// Counts open connections.
#[derive(Debug, Default)]
struct ConnectionTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl ConnectionTracker {
    fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            tracker: Arc::clone(self),
        }
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.tracker.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

/// The gateway's HTTP server.
#[derive(Debug)]
pub struct GatewayServer {
    listener: TcpListener,
    dispatcher: Arc<RequestDispatcher>,
    shutdown_timeout: Duration,
}

impl GatewayServer {
    /// Binds `addr`.
    pub async fn bind(
        addr: &str,
        dispatcher: RequestDispatcher,
        shutdown_timeout: Duration,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            shutdown_timeout,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|source| ServerError::Bind {
                addr: "listener".to_string(),
                source,
            })
    }

    /// Serves until `shutdown` fires, then drains open connections.
    pub async fn run(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let addr = self.local_addr()?;
        let tracker = Arc::new(ConnectionTracker::default());
        self.dispatcher.health().mark_serving();
        tracing::info!(%addr, "portico listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let guard = tracker.acquire();
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, peer, dispatcher, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        self.dispatcher.health().begin_drain();
        tracing::info!(
            connections = tracker.active(),
            timeout_secs = self.shutdown_timeout.as_secs(),
            "draining connections"
        );
        if tokio::time::timeout(self.shutdown_timeout, tracker.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(connections = tracker.active(), "shutdown timeout reached");
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<RequestDispatcher>,
    shutdown: ShutdownSignal,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(dispatcher.handle(request, peer).await) }
    });

    let connection = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(%peer, error = %e, "connection error");
            }
        }
        () = shutdown.recv() => {
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.await {
                tracing::debug!(%peer, error = %e, "connection error during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.recv().await });
        signal.trigger();
        signal.trigger();
        handle.await.unwrap();
        assert!(signal.is_shutdown());
        // Already triggered: completes immediately.
        signal.recv().await;
    }

    #[test]
    fn test_recv_pends_until_triggered() {
        let signal = ShutdownSignal::new();
        let mut recv = tokio_test::task::spawn(signal.recv());
        tokio_test::assert_pending!(recv.poll());

        signal.trigger();
        assert!(recv.is_woken());
        tokio_test::assert_ready!(recv.poll());
    }

    #[tokio::test]
    async fn test_tracker_waits_for_guards() {
        let tracker = Arc::new(ConnectionTracker::default());
        let guard = tracker.acquire();
        assert_eq!(tracker.active(), 1);

        let waiting = Arc::clone(&tracker);
        let handle = tokio::spawn(async move { waiting.wait_idle().await });
        drop(guard);
        handle.await.unwrap();
        assert_eq!(tracker.active(), 0);
    }
}
