use std::net::SocketAddr;
use std::str::FromStr;

use bytes::Bytes;
use compact_str::CompactString;
use derive_more::Deref;
use memchr::{memchr, memchr2};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::infrastructure::server_impl::template::PathParams;

#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum Method {
    CONNECT,
    DELETE,
    GET,
    HEAD,
    OPTIONS,
    PATCH,
    POST,
    PUT,
    TRACE,
}

impl TryFrom<&[u8]> for Method {
    type Error = ();

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let method = std::str::from_utf8(value).map_err(|_| ())?;
        Method::from_str(method).map_err(|_| ())
    }
}

/// Header names the transport itself reads or writes.
#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
#[non_exhaustive]
pub enum Header {
    #[strum(serialize = "connection")]
    CONNECTION,
    #[strum(serialize = "content-length")]
    CONTENT_LENGTH,
    #[strum(serialize = "content-type")]
    CONTENT_TYPE,
    #[strum(serialize = "date")]
    DATE,
    #[strum(serialize = "host")]
    HOST,
    #[strum(serialize = "server")]
    SERVER,
    #[strum(serialize = "transfer-encoding")]
    TRANSFER_ENCODING,
}

impl Header {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl AsRef<str> for Header {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for Header {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter().find(|c| unicase::eq(c.as_str(), s)).ok_or(())
    }
}

/// Ordered header fields. Duplicates are preserved and names compare
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct HeaderFields(Vec<(CompactString, CompactString)>);

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.get_all(name).next()
    }

    pub fn get_all(&self, name: impl AsRef<str>) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(move |(key, _)| unicase::eq(key.as_str(), name.as_ref()))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    pub fn append(&mut self, name: impl Into<CompactString>, value: impl Into<CompactString>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single one.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<CompactString>) {
        self.remove(name.as_ref());
        self.0.push((name.as_ref().into(), value.into()));
    }

    pub fn remove(&mut self, name: impl AsRef<str>) {
        self.0
            .retain(|(key, _)| !unicase::eq(key.as_str(), name.as_ref()));
    }

    /// True when a `connection` header carries the `close` token.
    pub fn wants_close(&self) -> bool {
        self.get_all(Header::CONNECTION)
            .flat_map(|value| value.split(','))
            .any(|token| unicase::eq(token.trim(), "close"))
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderFields
where
    N: Into<CompactString>,
    V: Into<CompactString>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Request line and headers, before any body has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub resource: CompactString,
    pub headers: HeaderFields,
}

/// A fully received request. The body is `None` when no body bytes arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub resource: CompactString,
    pub headers: HeaderFields,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, resource: impl Into<CompactString>) -> Self {
        Self {
            method,
            resource: resource.into(),
            headers: HeaderFields::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The request-target without query string or fragment.
    pub fn path(&self) -> &str {
        path_only(&self.resource)
    }

    pub fn query(&self) -> Option<&str> {
        let resource = self.resource.as_str();
        let resource = memchr(b'#', resource.as_bytes()).map_or(resource, |end| &resource[..end]);
        let start = memchr(b'?', resource.as_bytes())?;
        Some(&resource[start + 1..])
    }
}

/// Truncates `resource` at the first `?` or `#`.
pub fn path_only(resource: &str) -> &str {
    memchr2(b'?', b'#', resource.as_bytes()).map_or(resource, |idx| &resource[..idx])
}

/// What a handler learns about its request beyond the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub params: PathParams,
    pub remote_addr: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_from_bytes() {
        assert_eq!(Method::try_from(&b"GET"[..]), Ok(Method::GET));
        assert_eq!(Method::try_from(&b"get"[..]), Err(()));
        assert_eq!(Method::POST.to_string(), "POST");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers: HeaderFields = [("Content-Type", "text/plain"), ("X-Tag", "a"), ("x-tag", "b")]
            .into_iter()
            .collect();

        assert_eq!(headers.get(Header::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(headers.get_all("X-TAG").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!("Content-Length".parse::<Header>(), Ok(Header::CONTENT_LENGTH));
    }

    #[test]
    fn set_replaces_all_duplicates() {
        let mut headers: HeaderFields = [("x-tag", "a"), ("host", "h"), ("X-Tag", "b")]
            .into_iter()
            .collect();
        headers.set("x-tag", "c");

        assert_eq!(headers.get_all("x-tag").collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn connection_close_token() {
        let headers: HeaderFields = [("Connection", "Upgrade, Close")].into_iter().collect();
        assert!(headers.wants_close());

        let headers: HeaderFields = [("connection", "keep-alive")].into_iter().collect();
        assert!(!headers.wants_close());
    }

    #[test]
    fn path_and_query() {
        let request = Request::new(Method::GET, "/layout/page?debug=1#top");
        assert_eq!(request.path(), "/layout/page");
        assert_eq!(request.query(), Some("debug=1"));

        let request = Request::new(Method::GET, "/health#frag?not-a-query");
        assert_eq!(request.path(), "/health");
        assert_eq!(request.query(), None);
        assert_eq!(path_only("/plain"), "/plain");
    }
}
