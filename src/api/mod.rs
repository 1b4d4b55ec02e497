// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{http::HeaderName, middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{claims::PrincipalType, pipeline::enforce},
    models::{AccountView, CallerView, WhoAmIResponse},
    state::AppState,
};

pub mod health;
pub mod identity;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    // Every route in here runs the auth pipeline first.
    let protected = Router::new()
        .route("/test", get(identity::test))
        .route("/v1/whoami", get(identity::whoami))
        .route_layer(middleware::from_fn_with_state(
            state.pipeline.clone(),
            enforce,
        ))
        .with_state(state);

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/healthz", get(health::healthz))
        .merge(protected)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    request_id_header.clone(),
                    MakeRequestUuid,
                ))
                .layer(PropagateRequestIdLayer::new(request_id_header))
                .layer(TraceLayer::new_for_http()),
        )
}

#[derive(OpenApi)]
#[openapi(
    paths(health::healthz, identity::test, identity::whoami),
    components(schemas(WhoAmIResponse, CallerView, AccountView, PrincipalType)),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness probe"),
        (name = "Identity", description = "Endpoints behind bearer token authentication")
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme the protected paths refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi
            .components
            .get_or_insert_with(Default::default)
            .add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
    }
}
