//! HTTP/1.1 request framing.
//!
//! Bytes arrive in arbitrary pieces. [`RequestDecoder`] turns whatever is
//! buffered into framing events ([`RequestPart`]), and [`MessageAssembler`]
//! folds those events into a complete [`Request`]:
//!
//! ```text
//!   Idle ──head──▶ HeadReceived ──body──▶ Accumulating ──end──▶ Complete
//!    ▲                  │                                          │
//!    │                  └──────────────────end─────────────────────┤
//!    └──────────────────────── response written ──────────────────┘
//! ```
//!
//! Only one request is in flight per connection: while the assembler sits in
//! `Complete`, pipelined bytes stay buffered until the response is written.

use std::str::FromStr;

use bytes::{Buf, Bytes, BytesMut};
use httparse::{ParserConfig, Status};
use memchr::memchr;
use tracing::trace;

use crate::infrastructure::server_impl::error::FramingError;
use crate::infrastructure::server_impl::request::{
    Header, HeaderFields, Method, Request, RequestHead,
};

/// Upper bound on header lines in one request head.
const MAX_HEADERS: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FramingLimits {
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for FramingLimits {
    fn default() -> Self {
        Self {
            max_head_bytes: 16 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Head(RequestHead),
    Body(Bytes),
    End,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DecodeState {
    Head,
    Empty,
    Length(u64),
    Chunked { state: ChunkState, received: u64 },
}

#[derive(Debug, Copy, Clone)]
pub struct RequestDecoder {
    state: DecodeState,
    limits: FramingLimits,
}

impl RequestDecoder {
    pub fn new(limits: FramingLimits) -> Self {
        Self {
            state: DecodeState::Head,
            limits,
        }
    }

    /// Consumes buffered bytes and yields the next framing event, or `None`
    /// when more bytes are needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestPart>, FramingError> {
        let state = std::mem::replace(&mut self.state, DecodeState::Head);

        let (next, part) = match state {
            DecodeState::Head => match self.decode_head(buf)? {
                Some((head, next)) => (next, Some(RequestPart::Head(head))),
                None => (DecodeState::Head, None),
            },
            DecodeState::Empty | DecodeState::Length(0) => (DecodeState::Head, Some(RequestPart::End)),
            DecodeState::Length(remaining) => {
                if buf.is_empty() {
                    (DecodeState::Length(remaining), None)
                } else {
                    let chunk = take_at_most(buf, remaining);
                    let remaining = remaining - chunk.len() as u64;
                    (DecodeState::Length(remaining), Some(RequestPart::Body(chunk)))
                }
            }
            DecodeState::Chunked { state, received } => {
                self.decode_chunked(buf, state, received)?
            }
        };

        self.state = next;
        Ok(part)
    }

    fn decode_head(
        &self,
        buf: &mut BytesMut,
    ) -> Result<Option<(RequestHead, DecodeState)>, FramingError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let limit = self.limits.max_head_bytes;
        let (head, head_len) = {
            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut req = httparse::Request::new(&mut headers);

            let head_len = match ParserConfig::default().parse_request(&mut req, &buf[..])? {
                Status::Complete(head_len) => head_len,
                Status::Partial if buf.len() > limit => {
                    return Err(FramingError::HeadTooLarge { limit })
                }
                Status::Partial => return Ok(None),
            };
            if head_len > limit {
                return Err(FramingError::HeadTooLarge { limit });
            }

            let (Some(method), Some(resource)) = (req.method, req.path) else {
                return Err(FramingError::IncompleteRequestLine);
            };
            let method = Method::from_str(method)
                .map_err(|_| FramingError::UnsupportedMethod(method.into()))?;

            let mut fields = HeaderFields::new();
            // obs-text bytes are legal on the wire; keep them as U+FFFD.
            for header in req.headers.iter() {
                fields.append(header.name, String::from_utf8_lossy(header.value).as_ref());
            }

            let head = RequestHead {
                method,
                resource: resource.into(),
                headers: fields,
            };
            (head, head_len)
        };

        let next = self.body_framing(&head.headers)?;
        buf.advance(head_len);
        trace!(method = %head.method, resource = %head.resource, head_len, "decoded request head");

        Ok(Some((head, next)))
    }

    fn body_framing(&self, headers: &HeaderFields) -> Result<DecodeState, FramingError> {
        if let Some(coding) = headers
            .get_all(Header::TRANSFER_ENCODING)
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|coding| !coding.is_empty())
            .last()
        {
            if !unicase::eq(coding, "chunked") {
                return Err(FramingError::UnsupportedTransferEncoding(coding.into()));
            }
            return Ok(DecodeState::Chunked {
                state: ChunkState::Size,
                received: 0,
            });
        }

        let mut length: Option<u64> = None;
        for value in headers.get_all(Header::CONTENT_LENGTH) {
            let parsed = value
                .trim()
                .parse::<u64>()
                .map_err(|_| FramingError::InvalidContentLength)?;
            if length.is_some_and(|previous| previous != parsed) {
                return Err(FramingError::InvalidContentLength);
            }
            length = Some(parsed);
        }

        match length {
            None | Some(0) => Ok(DecodeState::Empty),
            Some(length) if length > self.limits.max_body_bytes as u64 => {
                Err(FramingError::BodyTooLarge {
                    limit: self.limits.max_body_bytes,
                })
            }
            Some(length) => Ok(DecodeState::Length(length)),
        }
    }

    fn decode_chunked(
        &self,
        buf: &mut BytesMut,
        mut state: ChunkState,
        mut received: u64,
    ) -> Result<(DecodeState, Option<RequestPart>), FramingError> {
        loop {
            let pending = DecodeState::Chunked { state, received };

            match state {
                ChunkState::Size => match httparse::parse_chunk_size(&buf[..])
                    .map_err(|_| FramingError::InvalidChunk)?
                {
                    Status::Partial if buf.len() > self.limits.max_head_bytes => {
                        return Err(FramingError::InvalidChunk)
                    }
                    Status::Partial => return Ok((pending, None)),
                    Status::Complete((consumed, 0)) => {
                        buf.advance(consumed);
                        state = ChunkState::Trailer;
                    }
                    Status::Complete((consumed, size)) => {
                        received = received.saturating_add(size);
                        if received > self.limits.max_body_bytes as u64 {
                            return Err(FramingError::BodyTooLarge {
                                limit: self.limits.max_body_bytes,
                            });
                        }
                        buf.advance(consumed);
                        state = ChunkState::Data(size);
                    }
                },
                ChunkState::Data(remaining) => {
                    if buf.is_empty() {
                        return Ok((pending, None));
                    }
                    let chunk = take_at_most(buf, remaining);
                    let remaining = remaining - chunk.len() as u64;
                    let state = if remaining == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining)
                    };
                    return Ok((
                        DecodeState::Chunked { state, received },
                        Some(RequestPart::Body(chunk)),
                    ));
                }
                ChunkState::DataEnd => {
                    if buf.len() < 2 {
                        return Ok((pending, None));
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(FramingError::InvalidChunk);
                    }
                    buf.advance(2);
                    state = ChunkState::Size;
                }
                // Trailer fields are read and dropped.
                ChunkState::Trailer => {
                    let Some(newline) = memchr(b'\n', &buf[..]) else {
                        if buf.len() > self.limits.max_head_bytes {
                            return Err(FramingError::HeadTooLarge {
                                limit: self.limits.max_head_bytes,
                            });
                        }
                        return Ok((pending, None));
                    };
                    let blank = newline == 0 || (newline == 1 && buf[0] == b'\r');
                    buf.advance(newline + 1);
                    if blank {
                        return Ok((DecodeState::Head, Some(RequestPart::End)));
                    }
                }
            }
        }
    }
}

fn take_at_most(buf: &mut BytesMut, remaining: u64) -> Bytes {
    let take = usize::try_from(remaining).map_or(buf.len(), |remaining| remaining.min(buf.len()));
    buf.split_to(take).freeze()
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FramingState {
    #[default]
    Idle,
    HeadReceived,
    Accumulating,
    Complete,
}

/// Folds framing events into a [`Request`].
#[derive(Debug, Default)]
pub struct MessageAssembler {
    state: FramingState,
    head: Option<RequestHead>,
    body: BytesMut,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FramingState {
        self.state
    }

    pub fn push(&mut self, part: RequestPart) -> Result<Option<Request>, FramingError> {
        match part {
            RequestPart::Head(head) => {
                self.head = Some(head);
                self.body.clear();
                self.state = FramingState::HeadReceived;
                Ok(None)
            }
            RequestPart::Body(chunk) => {
                if self.head.is_none() {
                    return Err(FramingError::UnexpectedPart("body chunk"));
                }
                self.body.extend_from_slice(&chunk);
                self.state = FramingState::Accumulating;
                Ok(None)
            }
            RequestPart::End => {
                let Some(head) = self.head.take() else {
                    return Err(FramingError::UnexpectedPart("end of message"));
                };
                let body = (!self.body.is_empty()).then(|| self.body.split().freeze());
                self.state = FramingState::Complete;

                Ok(Some(Request {
                    method: head.method,
                    resource: head.resource,
                    headers: head.headers,
                    body,
                }))
            }
        }
    }

    /// Marks the end of the request/response cycle.
    pub fn reset(&mut self) {
        self.state = FramingState::Idle;
        self.head = None;
        self.body.clear();
    }
}

/// Per-connection decoder and assembler.
#[derive(Debug)]
pub struct HttpCodec {
    decoder: RequestDecoder,
    assembler: MessageAssembler,
}

impl HttpCodec {
    pub fn new(limits: FramingLimits) -> Self {
        Self {
            decoder: RequestDecoder::new(limits),
            assembler: MessageAssembler::new(),
        }
    }

    pub fn state(&self) -> FramingState {
        self.assembler.state()
    }

    /// Returns the next complete request, or `None` if more bytes are needed
    /// or the previous request has not been answered yet.
    pub fn next_request(&mut self, buf: &mut BytesMut) -> Result<Option<Request>, FramingError> {
        if self.assembler.state() == FramingState::Complete {
            return Ok(None);
        }

        while let Some(part) = self.decoder.decode(buf)? {
            if let Some(request) = self.assembler.push(part)? {
                return Ok(Some(request));
            }
        }

        Ok(None)
    }

    pub fn response_written(&mut self) {
        self.assembler.reset();
    }

    /// A closed stream is clean only between messages.
    pub fn is_between_messages(&self, buf: &BytesMut) -> bool {
        buf.is_empty() && self.assembler.state() == FramingState::Idle
    }
}
