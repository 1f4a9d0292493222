use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::application::adapters::{ErrorDTO, PageSpecDTO, SceneDTO};
use crate::application::ServerData;
use crate::domain::scene::Scene;
use crate::infrastructure::server_impl::request::{Request, RequestMetadata};
use crate::infrastructure::server_impl::response::{JsonResponse, Response, StatusCode};
use crate::infrastructure::server_impl::router::Router;
use crate::AnyResult;

#[derive(Debug, Serialize)]
struct HealthDTO {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionDTO<'a> {
    api: &'a str,
    service: &'a str,
}

/// Registers the layout API on `router`.
pub fn register_routes(router: &Router, server_data: ServerData) {
    router.get("/health", |_: Request, _: RequestMetadata| health_route());

    let data = server_data.clone();
    router.get("/version", move |_: Request, _: RequestMetadata| {
        version_route(data.clone())
    });

    let data = server_data.clone();
    router.post("/layout/page", move |req: Request, _: RequestMetadata| {
        layout_page_route(data.clone(), req)
    });

    let data = server_data;
    router.post("/scene/normalize", move |req: Request, _: RequestMetadata| {
        normalize_scene_route(data.clone(), req)
    });
}

pub async fn health_route() -> AnyResult<Response> {
    json(StatusCode::Ok, &HealthDTO { status: "ok" })
}

pub async fn version_route(server_data: ServerData) -> AnyResult<Response> {
    json(
        StatusCode::Ok,
        &VersionDTO {
            api: &server_data.api_version,
            service: &server_data.service,
        },
    )
}

pub async fn layout_page_route(server_data: ServerData, req: Request) -> AnyResult<Response> {
    let page = match parse_body::<PageSpecDTO>(&req) {
        Ok(dto) => dto.into(),
        Err(response) => return response,
    };

    match server_data.layout.layout_page(page) {
        Ok(scene) => json(StatusCode::Ok, &SceneDTO::from(&scene)),
        Err(e) => error(StatusCode::UnprocessableEntity, e),
    }
}

pub async fn normalize_scene_route(server_data: ServerData, req: Request) -> AnyResult<Response> {
    let scene: Scene = match parse_body::<SceneDTO>(&req) {
        Ok(dto) => dto.into(),
        Err(response) => return response,
    };

    match server_data.layout.normalize(scene) {
        Ok(scene) => json(StatusCode::Ok, &SceneDTO::from(&scene)),
        Err(e) => error(StatusCode::UnprocessableEntity, e),
    }
}

/// Deserializes the JSON body, or hands back the 400 to answer with.
fn parse_body<T>(req: &Request) -> Result<T, AnyResult<Response>>
where
    T: DeserializeOwned,
{
    let body = req.body.as_deref().unwrap_or_default();
    serde_json::from_slice::<T>(body).map_err(|e| {
        debug!(resource = %req.resource, error = %e, "rejecting request body");
        error(StatusCode::BadRequest, e)
    })
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> AnyResult<Response> {
    Ok(JsonResponse::new(status, body)?.into_inner())
}

fn error(status: StatusCode, e: impl ToString) -> AnyResult<Response> {
    json(
        status,
        &ErrorDTO {
            error: e.to_string().into(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::server_impl::request::Method;
    use std::net::{Ipv4Addr, SocketAddr};

    async fn call(router: &Router, request: Request) -> Response {
        let (handler, params) = router
            .resolve(request.method, request.path())
            .expect("route should be registered");
        let metadata = RequestMetadata {
            params,
            remote_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        };
        handler.call(request, metadata).await.unwrap()
    }

    fn api() -> Router {
        let router = Router::new();
        register_routes(&router, ServerData::new());
        router
    }

    fn body_json(response: &Response) -> serde_json::Value {
        serde_json::from_slice(response.body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = call(&api(), Request::new(Method::GET, "/health")).await;
        assert_eq!(response.status_code, StatusCode::Ok);
        assert_eq!(response.body.as_deref(), Some(&br#"{"status":"ok"}"#[..]));
        assert_eq!(
            response.headers.get("content-type"),
            Some("application/json; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn version_names_the_service() {
        let response = call(&api(), Request::new(Method::GET, "/version")).await;
        assert_eq!(response.status_code, StatusCode::Ok);
        assert_eq!(
            body_json(&response),
            serde_json::json!({"api": "1", "service": "layoutkit"})
        );
    }

    #[tokio::test]
    async fn layout_page_returns_scene() {
        let request = Request::new(Method::POST, "/layout/page")
            .with_body(r#"{"widthPt":612,"heightPt":792}"#);
        let response = call(&api(), request).await;

        assert_eq!(response.status_code, StatusCode::Ok);
        let scene = body_json(&response);
        assert_eq!(scene["version"], "scene-v1");
        assert_eq!(scene["page"]["margins"]["top"], 48.0);
        assert_eq!(scene["commands"].as_array().unwrap().len(), 2);
        assert_eq!(scene["commands"][1]["style"]["stroke"], "#888");
    }

    #[tokio::test]
    async fn layout_page_rejects_bad_input() {
        let router = api();

        let response = call(&router, Request::new(Method::POST, "/layout/page")).await;
        assert_eq!(response.status_code, StatusCode::BadRequest);

        let request = Request::new(Method::POST, "/layout/page").with_body("{not json");
        let response = call(&router, request).await;
        assert_eq!(response.status_code, StatusCode::BadRequest);
        assert!(body_json(&response)["error"].is_string());

        let request = Request::new(Method::POST, "/layout/page")
            .with_body(r#"{"widthPt":-1,"heightPt":792}"#);
        let response = call(&router, request).await;
        assert_eq!(response.status_code, StatusCode::UnprocessableEntity);
    }

    #[tokio::test]
    async fn normalize_fills_defaults() {
        let request = Request::new(Method::POST, "/scene/normalize").with_body(
            r#"{"page":{"widthPt":200,"heightPt":100},"commands":[{"op":"text","run":{"glyphs":[]}}]}"#,
        );
        let response = call(&api(), request).await;

        assert_eq!(response.status_code, StatusCode::Ok);
        let scene = body_json(&response);
        assert_eq!(scene["page"]["margins"]["left"], 0.0);
        assert_eq!(scene["yUp"], true);
        assert_eq!(scene["commands"][0]["run"]["fontFamily"], "System");
    }
}
