use anyhow::Result;
use utoipa::openapi::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

/// Swagger UI mounted at `/swagger-ui`, serving the merged OpenAPI document.
/// Registers the bearer scheme that protected routes reference by name.
pub fn create_swagger_ui(mut openapi: OpenApi) -> Result<SwaggerUi> {
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
    Ok(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
}
