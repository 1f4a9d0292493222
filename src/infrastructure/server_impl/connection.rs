//! One task per connection: read, frame, dispatch, write, repeat.
//!
//! The task lives on the event loop the connection was pinned to, so the
//! read buffer, the framing state and the socket are only ever touched from
//! that loop. Handlers run on the separate handler pool; their result comes
//! back through the task's join handle and is written from here.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use compact_str::CompactString;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::infrastructure::server_impl::codec::{FramingLimits, HttpCodec};
use crate::infrastructure::server_impl::error::ConnectionError;
use crate::infrastructure::server_impl::request::{Method, Request, RequestMetadata};
use crate::infrastructure::server_impl::response::{Response, StatusCode};
use crate::infrastructure::server_impl::router::Router;

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Everything a connection needs from the transport.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub router: Arc<Router>,
    pub handlers: Handle,
    pub idle_timeout: Option<Duration>,
    pub limits: FramingLimits,
}

#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    codec: HttpCodec,
    context: ConnectionContext,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, context: ConnectionContext) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            codec: HttpCodec::new(context.limits),
            context,
        }
    }

    pub async fn run(mut self) {
        debug!(client = %self.addr, "client connected");

        match self.serve().await {
            Ok(()) => debug!(client = %self.addr, "client disconnected"),
            Err(ConnectionError::Framing(e)) => {
                debug!(client = %self.addr, error = %e, "closing connection on framing error")
            }
            Err(ConnectionError::IdleTimeout) => {
                debug!(client = %self.addr, "closing idle connection")
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                trace!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
        }

        let _ = self.stream.shutdown().await;
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(request) = self.codec.next_request(&mut self.buffer)? {
                let head_only = request.method == Method::HEAD;
                let client_close = request.headers.wants_close();

                let response = dispatch(&self.context, request, self.addr).await;
                let close = client_close || response.headers.wants_close();

                self.write_response(response, head_only).await?;
                self.codec.response_written();

                if close {
                    return Ok(());
                }
            }

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Returns `false` when the peer closed the stream between messages.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let n = match self.context.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout)??,
            None => read.await?,
        };

        if n == 0 {
            if self.codec.is_between_messages(&self.buffer) {
                return Ok(false);
            }
            return Err(ConnectionError::UnexpectedEof);
        }

        trace!(client = %self.addr, bytes = n, "read data");
        Ok(true)
    }

    async fn write_response(
        &mut self,
        response: Response,
        head_only: bool,
    ) -> Result<(), ConnectionError> {
        let status = response.status_code;
        let bytes = response.into_http(head_only);

        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;

        trace!(
            client = %self.addr,
            status = status.as_u16(),
            bytes = bytes.len(),
            "sent response"
        );
        Ok(())
    }
}

/// Resolves and runs the handler for `request`.
///
/// Never fails: a missing route is a 404 and a failed or panicked handler is
/// a 500, both without a body.
pub async fn dispatch(
    context: &ConnectionContext,
    request: Request,
    remote_addr: SocketAddr,
) -> Response {
    let method = request.method;
    let path = CompactString::from(request.path());

    let Some((handler, params)) = context.router.resolve(method, &path) else {
        debug!(%method, %path, "no route matched");
        return Response::empty(StatusCode::NotFound);
    };

    let metadata = RequestMetadata {
        params,
        remote_addr,
    };
    let task = context
        .handlers
        .spawn(async move { handler.call(request, metadata).await });

    match task.await {
        Ok(Ok(response)) => {
            debug!(%method, %path, status = response.status_code.as_u16(), "request handled");
            response
        }
        Ok(Err(e)) => {
            warn!(%method, %path, error = ?e, "handler failed");
            Response::empty(StatusCode::InternalServerError)
        }
        Err(e) => {
            error!(%method, %path, error = %e, "handler task did not complete");
            Response::empty(StatusCode::InternalServerError)
        }
    }
}
