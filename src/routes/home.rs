use axum::response::Json;
use serde::Serialize;

#[derive(Serialize, utoipa::ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
    pub docs: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner", body = RootResponse)
    ),
    tag = "General"
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Excel Analytics Platform API".to_string(),
        status: "running".to_string(),
        docs: "/swagger-ui/".to_string(),
    })
}
