use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models::drink;
use crate::routes::{drinks, health};

#[derive(OpenApi)]
#[openapi(
	paths(
		drinks::list_drinks,
		drinks::list_drinks_detail,
		drinks::create_drink,
		drinks::update_drink,
		drinks::delete_drink,
		health::health
	),
	components(
		schemas(
			drink::RecipePart,
			drink::ShortRecipePart,
			drink::Drink,
			drink::DrinkShort,
			drink::DrinkCreateRequest,
			drink::DrinkUpdateRequest,
			drink::DrinkResponse,
			drink::DeleteResponse,
			health::HealthResponse
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Drinks", description = "Menu management, guarded by bearer tokens"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

/// The API document with a `servers` entry for the local listener.
pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	let server_url = format!("http://localhost:{port}");

	let servers = doc.servers.get_or_insert_with(Vec::new);
	if !servers.iter().any(|server| server.url == server_url) {
		servers.push(Server::new(server_url));
	}

	doc
}

/// Serves the document at `/api-docs/openapi.json` and Swagger UI at `/docs`.
pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}
