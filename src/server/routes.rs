use axum::{
    http::{header::HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, map_response},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::debug;

use crate::config::CorsConfig;
use crate::errors::{PizzeriaError, PizzeriaResult};
use crate::server::account::{login, register};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::require_auth;
use crate::server::categories::{
    create_category, delete_category, get_category, list_categories, update_category,
};
use crate::server::handlers::AppState;
use crate::server::logging::request_logging_middleware;
use crate::server::products::{
    create_product, delete_product, get_product, list_products, update_product,
};
use crate::server::users::{get_profile, update_profile};

/// Prefix shared by every API route.
pub const API_BASE: &str = "/api/";

/// Whether a route needs a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
}

/// Every route the API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ListProducts,
    GetProduct,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    ListCategories,
    GetCategory,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    Login,
    Register,
    GetProfile,
    UpdateProfile,
}

impl Endpoint {
    pub const ALL: [Endpoint; 14] = [
        Endpoint::ListProducts,
        Endpoint::GetProduct,
        Endpoint::CreateProduct,
        Endpoint::UpdateProduct,
        Endpoint::DeleteProduct,
        Endpoint::ListCategories,
        Endpoint::GetCategory,
        Endpoint::CreateCategory,
        Endpoint::UpdateCategory,
        Endpoint::DeleteCategory,
        Endpoint::Login,
        Endpoint::Register,
        Endpoint::GetProfile,
        Endpoint::UpdateProfile,
    ];

    pub fn method(&self) -> Method {
        match self {
            Endpoint::ListProducts
            | Endpoint::GetProduct
            | Endpoint::ListCategories
            | Endpoint::GetCategory
            | Endpoint::GetProfile => Method::GET,
            Endpoint::CreateProduct
            | Endpoint::CreateCategory
            | Endpoint::Login
            | Endpoint::Register => Method::POST,
            Endpoint::UpdateProduct | Endpoint::UpdateCategory | Endpoint::UpdateProfile => {
                Method::PUT
            }
            Endpoint::DeleteProduct | Endpoint::DeleteCategory => Method::DELETE,
        }
    }

    /// Path below [`API_BASE`], with `{name}` marking a captured segment.
    pub fn pattern(&self) -> &'static str {
        match self {
            Endpoint::ListProducts | Endpoint::CreateProduct => "products",
            Endpoint::GetProduct | Endpoint::UpdateProduct | Endpoint::DeleteProduct => {
                "products/{id}"
            }
            Endpoint::ListCategories | Endpoint::CreateCategory => "categories",
            Endpoint::GetCategory | Endpoint::UpdateCategory | Endpoint::DeleteCategory => {
                "categories/{id}"
            }
            Endpoint::Login => "auth/login",
            Endpoint::Register => "auth/register",
            Endpoint::GetProfile | Endpoint::UpdateProfile => "user/profile",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Endpoint::ListProducts
            | Endpoint::GetProduct
            | Endpoint::ListCategories
            | Endpoint::GetCategory
            | Endpoint::Login
            | Endpoint::Register => Access::Public,
            Endpoint::CreateProduct
            | Endpoint::UpdateProduct
            | Endpoint::DeleteProduct
            | Endpoint::CreateCategory
            | Endpoint::UpdateCategory
            | Endpoint::DeleteCategory
            | Endpoint::GetProfile
            | Endpoint::UpdateProfile => Access::Authenticated,
        }
    }

    /// Full axum route path, e.g. `/api/products/:id`.
    pub fn axum_path(&self) -> String {
        let segments: Vec<String> = self
            .pattern()
            .split('/')
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => format!(":{name}"),
                None => segment.to_string(),
            })
            .collect();

        format!("{API_BASE}{}", segments.join("/"))
    }

    fn method_router(&self) -> MethodRouter<AppState> {
        match self {
            Endpoint::ListProducts => get(list_products),
            Endpoint::GetProduct => get(get_product),
            Endpoint::CreateProduct => post(create_product),
            Endpoint::UpdateProduct => put(update_product),
            Endpoint::DeleteProduct => delete(delete_product),
            Endpoint::ListCategories => get(list_categories),
            Endpoint::GetCategory => get(get_category),
            Endpoint::CreateCategory => post(create_category),
            Endpoint::UpdateCategory => put(update_category),
            Endpoint::DeleteCategory => delete(delete_category),
            Endpoint::Login => post(login),
            Endpoint::Register => post(register),
            Endpoint::GetProfile => get(get_profile),
            Endpoint::UpdateProfile => put(update_profile),
        }
    }
}

/// Build the main application router for the pizzeria server.
///
/// Routes come from [`Endpoint::ALL`]; authenticated ones run
/// [`require_auth`] before their handler. Unknown paths answer 404 and known
/// paths with an unsupported method answer 405, both with the JSON error
/// body. CORS headers follow `cors`, and `OPTIONS` on any path is answered
/// directly with 200.
pub fn build_router(state: AppState, cors: &CorsConfig) -> PizzeriaResult<Router> {
    let mut router = Router::new();

    for endpoint in Endpoint::ALL {
        let mut method_router = endpoint.method_router();
        if endpoint.access() == Access::Authenticated {
            method_router = method_router.route_layer(middleware::from_fn_with_state(
                state.tokens.clone(),
                require_auth,
            ));
        }

        let path = endpoint.axum_path();
        debug!(
            method = %endpoint.method(),
            path = %path,
            access = ?endpoint.access(),
            "Registering route"
        );
        router = router.route(&path, method_router);
    }

    let router = router
        .fallback(route_not_found)
        .layer(map_response(method_not_allowed_as_json))
        .layer(cors_layer(cors)?)
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state);

    Ok(router)
}

async fn route_not_found() -> ApiError {
    ApiError::new(ErrorCode::RouteNotFound)
}

/// Replace axum's empty 405 with the JSON error body, keeping `Allow`.
async fn method_not_allowed_as_json(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(axum::http::header::ALLOW).cloned();
    let mut json = ApiError::new(ErrorCode::MethodNotAllowed).into_response();
    if let Some(allow) = allow {
        json.headers_mut().insert(axum::http::header::ALLOW, allow);
    }
    json
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Build the CORS layer from comma-separated configuration values.
pub fn cors_layer(config: &CorsConfig) -> PizzeriaResult<CorsLayer> {
    let origin = if config.allow_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let origins = split_list(&config.allow_origin)
            .map(|o| {
                HeaderValue::from_str(o).map_err(|e| {
                    PizzeriaError::ConfigError(format!("invalid CORS origin '{o}': {e}"))
                })
            })
            .collect::<PizzeriaResult<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    let methods = split_list(&config.allow_methods)
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|e| {
                PizzeriaError::ConfigError(format!("invalid CORS method '{m}': {e}"))
            })
        })
        .collect::<PizzeriaResult<Vec<_>>>()?;

    let layer = CorsLayer::new().allow_origin(origin).allow_methods(methods);

    if config.allow_headers.trim() == "*" {
        return Ok(layer.allow_headers(Any));
    }

    let headers = split_list(&config.allow_headers)
        .map(|h| {
            HeaderName::from_bytes(h.as_bytes()).map_err(|e| {
                PizzeriaError::ConfigError(format!("invalid CORS header '{h}': {e}"))
            })
        })
        .collect::<PizzeriaResult<Vec<_>>>()?;

    Ok(layer.allow_headers(headers))
}
