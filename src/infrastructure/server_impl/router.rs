use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::infrastructure::server_impl::request::{Method, Request, RequestMetadata};
use crate::infrastructure::server_impl::response::Response;
use crate::infrastructure::server_impl::template::{PathParams, PathTemplate};
use crate::AnyResult;

/// Turns a request into a response. Any error becomes a bare 500.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request, metadata: RequestMetadata)
        -> BoxFuture<'static, AnyResult<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, RequestMetadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AnyResult<Response>> + Send + 'static,
{
    fn call(
        &self,
        request: Request,
        metadata: RequestMetadata,
    ) -> BoxFuture<'static, AnyResult<Response>> {
        (self)(request, metadata).boxed()
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

struct Route {
    method: Method,
    template: PathTemplate,
    handler: BoxedHandler,
}

/// Routes in registration order. The first route whose method and template
/// both match wins; there is no specificity ranking.
#[derive(Default)]
pub struct Router {
    routes: Mutex<Vec<Route>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.routes();
        f.debug_list()
            .entries(
                routes
                    .iter()
                    .map(|route| format!("{} {}", route.method, route.template.as_str())),
            )
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, Vec<Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, method: Method, pattern: &str, handler: impl Handler) {
        let template = PathTemplate::parse(pattern);
        if template.is_malformed() {
            warn!(
                %method,
                pattern,
                "route pattern has an unterminated `{{` and will only match literally"
            );
        }

        let route = Route {
            method,
            template,
            handler: Arc::new(handler),
        };
        self.routes().push(route);
        debug!(%method, pattern, "route registered");
    }

    pub fn get(&self, pattern: &str, handler: impl Handler) {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post(&self, pattern: &str, handler: impl Handler) {
        self.register(Method::POST, pattern, handler)
    }

    pub fn resolve(&self, method: Method, path: &str) -> Option<(BoxedHandler, PathParams)> {
        self.routes()
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .template
                    .matches(path)
                    .map(|params| (Arc::clone(&route.handler), params))
            })
    }

    pub fn len(&self) -> usize {
        self.routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::server_impl::response::StatusCode;
    use bytes::Bytes;
    use std::net::{Ipv4Addr, SocketAddr};

    fn labelled(label: &'static str) -> impl Handler {
        move |_: Request, _: RequestMetadata| async move {
            Ok::<_, eyre::Report>(Response::from_status_code(
                StatusCode::Ok,
                Bytes::from_static(label.as_bytes()),
            ))
        }
    }

    async fn label_of(router: &Router, method: Method, path: &str) -> Option<String> {
        let (handler, params) = router.resolve(method, path)?;
        let metadata = RequestMetadata {
            params,
            remote_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        };
        let response = handler
            .call(Request::new(method, path), metadata)
            .await
            .unwrap();
        Some(String::from_utf8(response.body.unwrap().to_vec()).unwrap())
    }

    #[tokio::test]
    async fn registration_order_beats_specificity() {
        let router = Router::new();
        router.get("/items/{id}", labelled("R1"));
        router.get("/items/special", labelled("R2"));

        assert_eq!(
            label_of(&router, Method::GET, "/items/special").await.as_deref(),
            Some("R1")
        );
        let (_, params) = router.resolve(Method::GET, "/items/special").unwrap();
        assert_eq!(params.get("id"), Some("special"));
    }

    #[tokio::test]
    async fn method_must_match() {
        let router = Router::new();
        router.post("/echo", labelled("post"));
        router.get("/echo", labelled("get"));

        assert_eq!(label_of(&router, Method::GET, "/echo").await.as_deref(), Some("get"));
        assert_eq!(label_of(&router, Method::POST, "/echo").await.as_deref(), Some("post"));
        assert!(router.resolve(Method::PUT, "/echo").is_none());
    }

    #[test]
    fn unknown_path_resolves_to_none() {
        let router = Router::new();
        assert!(router.is_empty());
        assert!(router.resolve(Method::GET, "/anything").is_none());
    }

    #[test]
    fn resolution_is_idempotent() {
        let router = Router::new();
        router.get("/a/{x}/{y}", labelled("xy"));

        let first = router.resolve(Method::GET, "/a/1/2").unwrap();
        let second = router.resolve(Method::GET, "/a/1/2").unwrap();
        assert!(Arc::ptr_eq(&first.0, &second.0));
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn malformed_pattern_still_registers() {
        let router = Router::new();
        router.get("/files/{name", labelled("broken"));

        assert_eq!(router.len(), 1);
        assert!(router.resolve(Method::GET, "/files/report").is_none());
        assert!(router.resolve(Method::GET, "/files/{name").is_some());
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let router = Arc::new(Router::new());
        router.get("/health", labelled("health"));

        let writers = (0..4)
            .map(|n| {
                let router = Arc::clone(&router);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        router.get(&format!("/w{n}/{i}/{{id}}"), labelled("dynamic"));
                    }
                })
            })
            .collect::<Vec<_>>();
        let readers = (0..4)
            .map(|_| {
                let router = Arc::clone(&router);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        assert!(router.resolve(Method::GET, "/health").is_some());
                    }
                })
            })
            .collect::<Vec<_>>();

        for thread in writers.into_iter().chain(readers) {
            thread.join().unwrap();
        }
        assert_eq!(router.len(), 201);
        assert!(router.resolve(Method::GET, "/w3/49/abc").is_some());
    }
}
