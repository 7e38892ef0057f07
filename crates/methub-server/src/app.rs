use axum::middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;
use crate::{api, auth, logging};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "methub API",
        description = "Meta integration hub: webhook ingestion, routing and delivery",
    ),
    tags(
        (name = "System", description = "Health"),
        (name = "Webhook", description = "Meta webhook intake"),
        (name = "Delivery", description = "Delivery pipeline and event inspection"),
        (name = "Transform", description = "Mapping preview"),
        (name = "Alerts", description = "Alert rules and history"),
        (name = "Destinations", description = "Destination management"),
        (name = "Routes", description = "Route management"),
        (name = "Mappings", description = "Mapping management"),
        (name = "Logs", description = "Structured event log"),
        (name = "OAuth", description = "Meta OAuth flow")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (protected_router, protected_spec) = api::protected_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(protected_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public_router
        .merge(protected_router.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth_middleware,
        )))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", merged_spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
