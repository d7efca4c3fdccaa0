//! REST API for the shipping service.
//!
//! Exposes the allocator over HTTP. Uses Axum as the web framework, answers
//! every request with a JSON body and supports CORS.

use std::any::Any;
use std::sync::OnceLock;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Json, Query, State};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
#[allow(unused_imports)]
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::allocator::compute_shipment_with_config;
use crate::config::{ApiConfig, ShippingConfig};
use crate::model::{InputError, OrderQuantity, PackSizes, ShipmentPlan};
use crate::model::{parse_order_quantity, parse_pack_sizes};

pub const ORDER_QTY_PARAM: &str = "order_qty";
pub const PACK_SIZES_PARAM: &str = "pack_sizes";

const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

#[derive(Clone)]
struct ApiState {
    shipping: ShippingConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>packship API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Query parameters of the shipping endpoint.
///
/// Both values are kept as raw text; validation happens in the handler so
/// each problem can be reported with its own message. When a parameter is
/// repeated, the first occurrence is used.
#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipQuery {
    /// Number of ordered items, a strictly positive integer.
    #[param(example = "12001")]
    pub order_qty: Option<String>,
    /// Comma-separated list of available pack sizes.
    #[param(example = "250,500,1000,2000,5000")]
    pub pack_sizes: Option<String>,
}

#[derive(Debug)]
struct ValidatedShipQuery {
    order: OrderQuantity,
    pack_sizes: PackSizes,
}

impl ShipQuery {
    /// Collects the known parameters from decoded query pairs.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                ORDER_QTY_PARAM => &mut query.order_qty,
                PACK_SIZES_PARAM => &mut query.pack_sizes,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }

    /// Validates the order quantity first, then the pack sizes.
    fn into_validated(
        self,
        default_pack_sizes: Option<&PackSizes>,
    ) -> Result<ValidatedShipQuery, InputError> {
        let order = parse_order_quantity(self.order_qty.as_deref().unwrap_or_default())?;
        let pack_sizes = match (self.pack_sizes, default_pack_sizes) {
            (Some(raw), _) => parse_pack_sizes(&raw)?,
            (None, Some(defaults)) => defaults.clone(),
            (None, None) => parse_pack_sizes("")?,
        };
        Ok(ValidatedShipQuery { order, pack_sizes })
    }
}

/// Response body of the shipping endpoint.
///
/// Exactly one of `data` and `error` is present.
#[derive(Debug, Default, Serialize, ToSchema)]
#[schema(example = json!({ "data": { "250": 1, "2000": 1, "5000": 2 } }))]
pub struct ShipResponse {
    /// Pack size mapped to the number of packs to ship.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<std::collections::BTreeMap<String, u64>>)]
    pub data: Option<ShipmentPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShipResponse {
    pub fn plan(plan: ShipmentPlan) -> Self {
        Self {
            data: Some(plan),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("invalid query string: {0}")]
    Query(#[from] QueryRejection),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Input(_) | ApiError::Query(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Input(err) => {
                tracing::info!(code = err.code(), "rejected ship request: {}", err)
            }
            ApiError::Query(err) => tracing::info!("rejected ship request: {}", err),
            ApiError::Internal(details) => {
                tracing::error!(details = %details, "ship request failed")
            }
        }
        let message = match self {
            ApiError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        };
        (status, Json(ShipResponse::error(message))).into_response()
    }
}

/// Turns a handler panic into a JSON 500 response.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(msg) = err.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = err.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(details).into_response()
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_ship),
    components(schemas(ShipResponse)),
    tags((name = "shipping", description = "Endpoints for pack allocation"))
)]
struct ApiDoc;

/// Builds the router with all endpoints and middleware.
pub fn router(shipping: ShippingConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let state = ApiState { shipping };

    Router::new()
        .route("/ship", get(handle_ship))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the API until `shutdown` resolves.
///
/// In-flight requests are allowed to finish once `shutdown` fires.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    shipping: ShippingConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(shipping))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Logs the endpoints the server answers on.
pub fn log_endpoints(config: &ApiConfig) {
    let display_host = config.display_host();
    tracing::info!("Server running on http://{}:{}", display_host, config.port());
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        tracing::info!("Local access: http://localhost:{}", config.port());
    }
    tracing::info!("API endpoint: GET /ship?{ORDER_QTY_PARAM}=...&{PACK_SIZES_PARAM}=...");
    tracing::info!("Documentation: GET /docs, GET /docs/openapi.json");
}

/// Handler for GET /ship endpoint.
///
/// Computes how many packs of each size to ship for an order.
///
/// # Parameters
/// * `order_qty` - number of ordered items
/// * `pack_sizes` - comma-separated pack sizes (optional if defaults are configured)
///
/// # Returns
/// JSON response with the shipment plan, or an error message
#[utoipa::path(
    get,
    path = "/ship",
    params(ShipQuery),
    responses(
        (status = 200, description = "Packs to ship", body = ShipResponse),
        (status = BAD_REQUEST, description = "Invalid order quantity or pack sizes", body = ShipResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Unexpected failure", body = ShipResponse)
    ),
    tag = "shipping"
)]
async fn handle_ship(
    State(state): State<ApiState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ShipResponse>, ApiError> {
    let Query(pairs) = query?;
    let request =
        ShipQuery::from_pairs(pairs).into_validated(state.shipping.default_pack_sizes())?;

    tracing::info!(
        order = request.order.get(),
        pack_sizes = request.pack_sizes.len(),
        "new ship request"
    );
    let plan = compute_shipment_with_config(
        request.order,
        &request.pack_sizes,
        state.shipping.allocator_config(),
    );
    tracing::info!(
        shipped = plan.total_quantity(),
        packs = plan.total_packs(),
        "shipment computed"
    );

    Ok(Json(ShipResponse::plan(plan)))
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::allocator::{AllocatorConfig, Consolidation};

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .expect("router should answer");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).expect("body should be JSON");
        (status, value)
    }

    fn default_router() -> Router {
        router(ShippingConfig::default())
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        assert!(
            doc.paths.paths.contains_key("/ship"),
            "OpenAPI documentation is missing the /ship path"
        );
    }

    #[test]
    fn openapi_doc_contains_response_schema() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        assert!(
            components.schemas.contains_key("ShipResponse"),
            "Expected schema 'ShipResponse' is missing from OpenAPI spec"
        );
    }

    #[test]
    fn response_omits_absent_fields() {
        let body = serde_json::to_value(ShipResponse::error("boom")).unwrap();
        assert_eq!(body, json!({ "error": "boom" }));

        let plan: ShipmentPlan = [(250, 1)].into_iter().collect();
        let body = serde_json::to_value(ShipResponse::plan(plan)).unwrap();
        assert_eq!(body, json!({ "data": { "250": 1 } }));
    }

    #[tokio::test]
    async fn ship_returns_plan() {
        let (status, body) = get_json(
            default_router(),
            "/ship?order_qty=12001&pack_sizes=250,500,1000,2000,5000",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "data": { "250": 1, "2000": 1, "5000": 2 } })
        );
    }

    #[tokio::test]
    async fn ship_accepts_encoded_spaces_in_pack_sizes() {
        let (status, body) =
            get_json(default_router(), "/ship?order_qty=251&pack_sizes=250,%20500").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "500": 1 } }));
    }

    #[tokio::test]
    async fn ship_rejects_malformed_order_quantity() {
        let (status, body) =
            get_json(default_router(), "/ship?order_qty=XXX&pack_sizes=250").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": "invalid format for ordered items input (should be an integer value)" })
        );
    }

    #[tokio::test]
    async fn ship_rejects_non_positive_order_quantity() {
        let (status, body) =
            get_json(default_router(), "/ship?order_qty=-5&pack_sizes=250").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": "invalid value for ordered items input (should be a strictly positive integer)" })
        );
    }

    #[tokio::test]
    async fn ship_checks_order_quantity_before_pack_sizes() {
        let (status, body) = get_json(default_router(), "/ship?order_qty=0&pack_sizes=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "invalid value for ordered items input (should be a strictly positive integer)"
        );
    }

    #[tokio::test]
    async fn ship_rejects_malformed_pack_sizes() {
        let (status, body) =
            get_json(default_router(), "/ship?order_qty=10&pack_sizes=250,abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": "invalid format for pack sizes input (should be a list of integer values)" })
        );
    }

    #[tokio::test]
    async fn ship_rejects_non_positive_pack_size() {
        let (status, body) =
            get_json(default_router(), "/ship?order_qty=10&pack_sizes=1,2,3,-4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": "invalid value for pack size (every value should be strictly positive)" })
        );
    }

    #[tokio::test]
    async fn ship_treats_missing_parameters_as_malformed() {
        let (status, body) = get_json(default_router(), "/ship").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "invalid format for ordered items input (should be an integer value)"
        );

        let (status, body) = get_json(default_router(), "/ship?order_qty=10").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "invalid format for pack sizes input (should be a list of integer values)"
        );
    }

    #[tokio::test]
    async fn ship_uses_configured_default_pack_sizes() {
        let defaults = PackSizes::new([250, 500, 1000, 2000, 5000]);
        let app = router(ShippingConfig::new(defaults, AllocatorConfig::default()));

        let (status, body) = get_json(app.clone(), "/ship?order_qty=501").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "250": 1, "500": 1 } }));

        // An explicit parameter always wins over the defaults.
        let (status, body) = get_json(app, "/ship?order_qty=600&pack_sizes=250").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "250": 3 } }));
    }

    #[tokio::test]
    async fn ship_uses_configured_consolidation_mode() {
        let config = AllocatorConfig::builder()
            .consolidation(Consolidation::Cascading)
            .build();
        let app = router(ShippingConfig::new(None, config));

        let (status, body) = get_json(app, "/ship?order_qty=30&pack_sizes=3,6,12,20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "12": 1, "20": 1 } }));
    }

    #[tokio::test]
    async fn openapi_json_is_served() {
        let (status, body) = get_json(default_router(), "/docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/ship"].is_object());
    }

    async fn explode() -> &'static str {
        panic!("allocator exploded")
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let response = handle_panic(Box::new("allocator exploded"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "internal server error" }));
    }

    #[tokio::test]
    async fn router_catches_handler_panics() {
        let app = Router::new()
            .route("/explode", get(explode))
            .layer(CatchPanicLayer::custom(handle_panic));

        let (status, body) = get_json(app, "/explode").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "internal server error" }));
    }

    #[tokio::test]
    async fn ship_uses_first_value_of_repeated_parameters() {
        let (status, body) = get_json(
            default_router(),
            "/ship?order_qty=1&order_qty=2&pack_sizes=250&pack_sizes=abc",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "250": 1 } }));
    }

    #[test]
    fn query_pairs_ignore_unknown_keys_and_keep_first_value() {
        let query = ShipQuery::from_pairs(vec![
            ("debug".to_string(), "1".to_string()),
            ("pack_sizes".to_string(), "250,500".to_string()),
            ("order_qty".to_string(), "42".to_string()),
            ("pack_sizes".to_string(), "7".to_string()),
        ]);
        assert_eq!(query.order_qty.as_deref(), Some("42"));
        assert_eq!(query.pack_sizes.as_deref(), Some("250,500"));
    }

    #[test]
    fn validated_query_prefers_explicit_pack_sizes() {
        let defaults = PackSizes::new([7]).unwrap();
        let query = ShipQuery {
            order_qty: Some("10".to_string()),
            pack_sizes: Some("3".to_string()),
        };
        let validated = query.into_validated(Some(&defaults)).unwrap();
        assert_eq!(validated.order.get(), 10);
        assert_eq!(validated.pack_sizes.ascending().collect::<Vec<_>>(), vec![3]);
    }
}
