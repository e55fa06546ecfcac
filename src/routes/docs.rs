use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Swagger UI at `/docs`, raw document at `/api-doc/openapi.json`.
pub fn router() -> Router<SharedState> {
    SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::routes::test_support::{call, memory_state};

    #[tokio::test]
    async fn serves_openapi_document() {
        let (status, body) = call(&memory_state(), Method::GET, "/api-doc/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/games"].is_object());
    }
}
