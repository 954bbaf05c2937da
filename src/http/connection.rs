use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::http::parser::{parse_http_request, ParseError, MAX_HEAD_SIZE};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::relay::RelayHandler;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    handler: Arc<RelayHandler>,
    idle_timeout: Duration,
    /// Client shut down its write side; answer the pending request, then close
    read_closed: bool,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

/// Outcome of reading from the client.
enum Inbound {
    Request(Request),
    Malformed(ParseError),
    Eof,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        handler: Arc<RelayHandler>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(4096),
            handler,
            idle_timeout,
            read_closed: false,
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::Reading => {
                    let inbound = tokio::time::timeout(self.idle_timeout, self.read_request()).await;

                    match inbound {
                        Ok(Ok(Inbound::Request(req))) => ConnectionState::Processing(req),
                        Ok(Ok(Inbound::Malformed(e))) => {
                            tracing::warn!(peer = %self.peer, error = %e, "Malformed request");
                            let response = Response::json_error(StatusCode::BadRequest, &e.to_string());
                            self.writing(response, false)
                        }
                        Ok(Ok(Inbound::Eof)) => ConnectionState::Closed,
                        Ok(Err(e)) => return Err(e),
                        Err(_) => {
                            tracing::debug!(peer = %self.peer, "Idle timeout, closing connection");
                            let _ = self.stream.shutdown().await;
                            ConnectionState::Closed
                        }
                    }
                }

                ConnectionState::Processing(req) => {
                    match self.process(&req).await {
                        Some(response) => {
                            let drained = self.read_closed && self.buffer.is_empty();
                            let keep_alive = req.keep_alive() && !drained;
                            self.writing(response, keep_alive)
                        }
                        None => {
                            tracing::debug!(
                                peer = %self.peer,
                                path = %req.path,
                                "Client disconnected, abandoning upstream request"
                            );
                            ConnectionState::Closed
                        }
                    }
                }

                ConnectionState::Writing(writer, keep_alive) => {
                    writer.write_to(&mut self.stream).await?;

                    if keep_alive {
                        ConnectionState::Reading
                    } else {
                        let _ = self.stream.shutdown().await;
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    /// Every response leaves through here, so CORS decoration cannot be skipped.
    fn writing(&self, response: Response, keep_alive: bool) -> ConnectionState {
        let response = self.handler.cors().decorate(response);
        ConnectionState::Writing(ResponseWriter::new(&response, keep_alive), keep_alive)
    }

    async fn read_request(&mut self) -> anyhow::Result<Inbound> {
        loop {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Inbound::Request(request));
                }

                Err(ParseError::Incomplete) => {}

                Err(e) => return Ok(Inbound::Malformed(e)),
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                self.read_closed = true;
                return Ok(Inbound::Eof);
            }
        }
    }

    /// Runs the handler, giving up if the connection is reset first.
    ///
    /// Dropping the handler future aborts any in-flight upstream request.
    async fn process(&mut self, req: &Request) -> Option<Response> {
        let handler = Arc::clone(&self.handler);

        tokio::select! {
            response = handler.handle(req) => Some(response),
            _ = wait_for_reset(&mut self.stream, &mut self.buffer, &mut self.read_closed) => None,
        }
    }
}

/// Resolves once reading from the client fails.
///
/// A clean EOF is a half-close: the client still expects its response, so
/// `read_closed` is set and watching stops. Pipelined bytes are kept in
/// `buffer` for the next request.
async fn wait_for_reset(stream: &mut TcpStream, buffer: &mut BytesMut, read_closed: &mut bool) {
    loop {
        if *read_closed || buffer.len() > MAX_HEAD_SIZE {
            std::future::pending::<()>().await;
        }

        match stream.read_buf(buffer).await {
            Ok(0) => *read_closed = true,
            Ok(_) => {}
            Err(_) => return,
        }
    }
}
