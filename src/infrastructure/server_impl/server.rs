use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tracing::{error, info, trace, warn};

use crate::infrastructure::config::ServerConfig;
use crate::infrastructure::server_impl::connection::{Connection, ConnectionContext};
use crate::infrastructure::server_impl::error::ServerError;
use crate::infrastructure::server_impl::event_loop::{EventLoopGroup, LoopSelector};
use crate::infrastructure::server_impl::request::Method;
use crate::infrastructure::server_impl::router::{Handler, Router};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// The HTTP/1.1 transport: a listener, a group of event loops the
/// connections are pinned to, and a separate pool the handlers run on.
#[derive(Debug)]
pub struct Transport {
    config: ServerConfig,
    router: Arc<Router>,
    loops: Option<EventLoopGroup>,
    handlers: Option<Runtime>,
    local_addr: Option<SocketAddr>,
}

impl Transport {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_router(config, Router::new())
    }

    pub fn with_router(config: ServerConfig, router: impl Into<Arc<Router>>) -> Self {
        Self {
            config,
            router: router.into(),
            loops: None,
            handlers: None,
            local_addr: None,
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Routes may be added before or after [`Transport::start`].
    pub fn register(&self, method: Method, pattern: &str, handler: impl Handler) {
        self.router.register(method, pattern, handler)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The bound address, once started. Useful when the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.loops.is_some()
    }

    /// Binds the configured `host:port` and starts accepting.
    pub fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyStarted);
        }

        let addr = self.config.bind_address();
        let listener = std::net::TcpListener::bind(&addr)
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.start_with_listener(listener)
    }

    /// Starts accepting on a listener that is already bound, e.g. one handed
    /// over through socket activation.
    pub fn start_with_listener(
        &mut self,
        listener: std::net::TcpListener,
    ) -> Result<SocketAddr, ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyStarted);
        }

        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (loops, handlers) = spawn_runtimes(&self.config)?;

        let context = ConnectionContext {
            router: Arc::clone(&self.router),
            handlers: handlers.handle().clone(),
            idle_timeout: self.config.idle_timeout,
            limits: self.config.limits(),
        };
        let selector = loops.selector();
        let acceptor = selector.next().clone();
        if !acceptor.execute(accept_loop(listener, selector, context)) {
            handlers.shutdown_background();
            return Err(io::Error::other("event loop stopped before accepting").into());
        }

        info!(
            address = %local_addr,
            event_loops = loops.len(),
            handler_threads = self.config.handler_threads,
            "transport listening"
        );

        self.loops = Some(loops);
        self.handlers = Some(handlers);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Stops accepting, drops every open connection and cancels in-flight
    /// handlers. Does nothing if the transport is not running.
    pub fn close(&mut self) {
        let Some(mut loops) = self.loops.take() else {
            return;
        };

        loops.shutdown_gracefully();
        if let Some(handlers) = self.handlers.take() {
            handlers.shutdown_background();
        }

        if let Some(addr) = self.local_addr.take() {
            info!(address = %addr, "transport closed");
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Starts the event loops, then the handler pool. Nothing after the pool
/// may fail: dropping a multi-thread runtime inside another runtime panics.
fn spawn_runtimes(config: &ServerConfig) -> io::Result<(EventLoopGroup, Runtime)> {
    let loops = EventLoopGroup::new(config.event_loops)?;
    if config.handler_threads == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "at least one handler thread is required",
        ));
    }

    let handlers = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.handler_threads)
        .thread_name("layoutkit-handler")
        .enable_all()
        .build()?;

    Ok((loops, handlers))
}

async fn accept_loop(
    listener: std::net::TcpListener,
    selector: LoopSelector,
    context: ConnectionContext,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "failed to register listener");
            return;
        }
    };

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            trace!(client = %addr, error = %e, "could not set TCP_NODELAY");
        }

        // Detach from this loop's reactor so the target loop can adopt it.
        let stream = match stream.into_std() {
            Ok(stream) => stream,
            Err(e) => {
                warn!(client = %addr, error = %e, "failed to hand over connection");
                continue;
            }
        };

        let context = context.clone();
        let target = selector.next();
        trace!(client = %addr, loop_index = target.index(), "connection pinned");

        let accepted = target.execute(async move {
            match TcpStream::from_std(stream) {
                Ok(stream) => Connection::new(stream, addr, context).run().await,
                Err(e) => warn!(client = %addr, error = %e, "failed to register connection"),
            }
        });
        if !accepted {
            break;
        }
    }
}
