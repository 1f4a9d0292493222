use bytes::{Bytes, BytesMut};
use compact_str::{CompactString, ToCompactString};
use derive_more::Deref;
use serde::Serialize;
use strum::{EnumIter, EnumMessage, IntoEnumIterator, IntoStaticStr};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::infrastructure::server_impl::request::{Header, HeaderFields};
use crate::AnyResult;

const SERVER_NAME: &str = concat!("layoutkit/", env!("CARGO_PKG_VERSION"));

#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoStaticStr, EnumMessage, EnumIter)]
pub enum StatusCode {
    #[strum(serialize = "200", message = "OK")]
    Ok = 200,
    #[strum(serialize = "201", message = "Created")]
    Created = 201,
    #[strum(serialize = "202", message = "Accepted")]
    Accepted = 202,
    #[strum(serialize = "204", message = "No Content")]
    NoContent = 204,
    #[strum(serialize = "301", message = "Moved Permanently")]
    MovedPermanently = 301,
    #[strum(serialize = "302", message = "Found")]
    Found = 302,
    #[strum(serialize = "304", message = "Not Modified")]
    NotModified = 304,
    #[strum(serialize = "400", message = "Bad Request")]
    BadRequest = 400,
    #[strum(serialize = "401", message = "Unauthorized")]
    Unauthorized = 401,
    #[strum(serialize = "403", message = "Forbidden")]
    Forbidden = 403,
    #[strum(serialize = "404", message = "Not Found")]
    NotFound = 404,
    #[strum(serialize = "405", message = "Method Not Allowed")]
    MethodNotAllowed = 405,
    #[strum(serialize = "408", message = "Request Timeout")]
    RequestTimeout = 408,
    #[strum(serialize = "409", message = "Conflict")]
    Conflict = 409,
    #[strum(serialize = "413", message = "Payload Too Large")]
    PayloadTooLarge = 413,
    #[strum(serialize = "415", message = "Unsupported Media Type")]
    UnsupportedMediaType = 415,
    #[strum(serialize = "422", message = "Unprocessable Entity")]
    UnprocessableEntity = 422,
    #[strum(serialize = "429", message = "Too Many Requests")]
    TooManyRequests = 429,
    #[strum(serialize = "500", message = "Internal Server Error")]
    InternalServerError = 500,
    #[strum(serialize = "501", message = "Not Implemented")]
    NotImplemented = 501,
    #[strum(serialize = "502", message = "Bad Gateway")]
    BadGateway = 502,
    #[strum(serialize = "503", message = "Service Unavailable")]
    ServiceUnavailable = 503,
    #[strum(serialize = "504", message = "Gateway Timeout")]
    GatewayTimeout = 504,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        Self::iter().find(|status| status.as_u16() == code)
    }

    pub fn reason(self) -> &'static str {
        self.get_message().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub headers: HeaderFields,
    pub status_code: StatusCode,
    pub body: Option<Bytes>,
}

impl Response {
    pub fn from_status_code(value: StatusCode, body: impl Into<Option<Bytes>>) -> Self {
        Self {
            headers: Default::default(),
            status_code: value,
            body: body.into(),
        }
    }

    /// A response with no body, as used for 404 and 500.
    pub fn empty(value: StatusCode) -> Self {
        Self::from_status_code(value, None)
    }

    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl Into<CompactString>,
    ) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Frames the response for the wire.
    ///
    /// `content-length` is derived from the body unless the handler set it,
    /// and forced to `0` when there is no body. `head_only` drops the body
    /// bytes but keeps the headers, for answering `HEAD`.
    pub fn into_http(self, head_only: bool) -> Bytes {
        let Response {
            mut headers,
            status_code,
            body,
        } = self;

        match &body {
            Some(body) if !headers.contains(Header::CONTENT_LENGTH) => {
                headers.set(Header::CONTENT_LENGTH, body.len().to_compact_string())
            }
            Some(_) => {}
            None => headers.set(Header::CONTENT_LENGTH, "0"),
        }
        if !headers.contains(Header::CONNECTION) {
            headers.set(Header::CONNECTION, "keep-alive");
        }
        if !headers.contains(Header::DATE) {
            headers.set(Header::DATE, http_date(OffsetDateTime::now_utc()));
        }
        if !headers.contains(Header::SERVER) {
            headers.set(Header::SERVER, SERVER_NAME);
        }

        let body = body.filter(|_| !head_only);
        let mut buf = BytesMut::with_capacity(128 + body.as_ref().map_or(0, Bytes::len));

        let status_code_str: &str = status_code.into();
        buf.extend_from_slice(b"HTTP/1.1 ");
        buf.extend_from_slice(status_code_str.as_bytes());
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(status_code.reason().as_bytes());
        buf.extend_from_slice(b"\r\n");

        for (name, value) in headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");

        if let Some(body) = body {
            buf.extend_from_slice(&body);
        }

        buf.freeze()
    }
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(now: OffsetDateTime) -> CompactString {
    now.format(format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    ))
    .map(CompactString::from)
    .unwrap_or_default()
}

#[derive(Debug, Deref)]
pub struct JsonResponse(pub Response);

impl JsonResponse {
    pub fn new<T>(status: StatusCode, body: &T) -> AnyResult<Self>
    where
        T: Serialize,
    {
        let body = simd_json::to_string(body)?;
        let response = Response::from_status_code(status, Bytes::from(body))
            .with_header(Header::CONTENT_TYPE, "application/json; charset=utf-8");
        Ok(Self(response))
    }

    pub fn into_inner(self) -> Response {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn split_wire(wire: &[u8]) -> (String, &[u8]) {
        let end = wire
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("head terminator");
        (
            String::from_utf8(wire[..end].to_vec()).unwrap(),
            &wire[end + 4..],
        )
    }

    fn header<'a>(head: &'a str, name: &str) -> Vec<&'a str> {
        head.lines()
            .skip(1)
            .filter_map(|line| line.split_once(": "))
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
            .collect()
    }

    #[test]
    fn content_length_matches_body() {
        for len in [0usize, 1, 17, 4096] {
            let body = Bytes::from(vec![b'x'; len]);
            let wire = Response::from_status_code(StatusCode::Ok, body).into_http(false);
            let (head, body) = split_wire(&wire);

            assert!(head.starts_with("HTTP/1.1 200 OK"));
            assert_eq!(header(&head, "content-length"), vec![len.to_string()]);
            assert_eq!(body.len(), len);
        }
    }

    #[test]
    fn handler_content_length_is_kept_when_body_present() {
        let wire = Response::from_status_code(StatusCode::Ok, Bytes::from_static(b"abc"))
            .with_header("Content-Length", "3")
            .into_http(false);
        let (head, _) = split_wire(&wire);
        assert_eq!(header(&head, "content-length"), vec!["3"]);
    }

    #[test]
    fn missing_body_forces_zero_length() {
        let wire = Response::empty(StatusCode::NotFound)
            .with_header("content-length", "12")
            .into_http(false);
        let (head, body) = split_wire(&wire);

        assert!(head.starts_with("HTTP/1.1 404 Not Found"));
        assert_eq!(header(&head, "content-length"), vec!["0"]);
        assert!(body.is_empty());
    }

    #[test]
    fn connection_defaults_to_keep_alive() {
        let wire = Response::empty(StatusCode::NoContent).into_http(false);
        let (head, _) = split_wire(&wire);
        assert_eq!(header(&head, "connection"), vec!["keep-alive"]);

        let wire = Response::empty(StatusCode::NoContent)
            .with_header(Header::CONNECTION, "close")
            .into_http(false);
        let (head, _) = split_wire(&wire);
        assert_eq!(header(&head, "connection"), vec!["close"]);
    }

    #[test]
    fn head_only_keeps_length_but_drops_body() {
        let wire = Response::from_status_code(StatusCode::Ok, Bytes::from_static(b"hello"))
            .into_http(true);
        let (head, body) = split_wire(&wire);
        assert_eq!(header(&head, "content-length"), vec!["5"]);
        assert!(body.is_empty());
    }

    #[test]
    fn status_code_lookup() {
        assert_eq!(StatusCode::from_u16(422), Some(StatusCode::UnprocessableEntity));
        assert_eq!(StatusCode::from_u16(299), None);
        assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    }

    #[test]
    fn formats_http_date() {
        assert_eq!(
            http_date(datetime!(1994-11-06 08:49:37 UTC)),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[test]
    fn json_response_sets_content_type() {
        let response = JsonResponse::new(StatusCode::Ok, &serde_json::json!({"api": "x"}))
            .unwrap()
            .into_inner();
        assert_eq!(response.body.as_deref(), Some(&br#"{"api":"x"}"#[..]));
        assert_eq!(
            response.headers.get(Header::CONTENT_TYPE),
            Some("application/json; charset=utf-8")
        );
    }
}
