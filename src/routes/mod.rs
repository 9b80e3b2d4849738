mod admin;
mod auth;
mod home;
mod uploads;

pub use auth::normalize_email;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::auth_middleware;
use crate::middleware::role::require_admin;
use crate::state::AppState;

/// Headroom over the file cap for multipart framing, so an oversized file
/// reaches the size check instead of failing inside the body reader.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        auth::register,
        auth::login,
        auth::me,
        uploads::upload_file,
        uploads::list_uploads,
        uploads::get_upload,
        uploads::save_chart_config,
        uploads::download_pdf,
        admin::stats,
        admin::list_users,
        admin::block_user,
        admin::unblock_user,
        admin::delete_user,
    ),
    components(
        schemas(
            home::RootResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::UserResponse,
            uploads::UploadResponse,
            uploads::UploadForm,
            uploads::SaveChartConfigRequest,
            uploads::SaveChartConfigResponse,
            uploads::DownloadPdfRequest,
            admin::StatsResponse,
            admin::MessageResponse,
            crate::error::ErrorResponse,
            crate::entities::user::Role,
            crate::models::upload::ColumnData,
            crate::models::upload::CellValue,
            crate::models::upload::ChartConfig,
            crate::models::upload::ChartType,
        )
    ),
    tags(
        (name = "General", description = "General API information"),
        (name = "Authentication", description = "Registration, login and the current account"),
        (name = "Uploads", description = "Spreadsheet uploads, chart configurations and PDF export"),
        (name = "Admin", description = "User management (admin access required)")
    ),
    info(
        title = "Excel Insight API",
        version = "0.1.0",
        description = "Upload Excel spreadsheets, save chart configurations, generate summaries and export charts as PDF",
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

/// Path ids that are not UUIDs cannot name an existing record.
pub(crate) fn parse_path_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found.to_string()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn create_routes(state: AppState) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    // Any authenticated, unblocked account
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/uploads",
            post(uploads::upload_file)
                .layer(DefaultBodyLimit::max(body_limit))
                .get(uploads::list_uploads),
        )
        .route("/uploads/{id}", get(uploads::get_upload))
        .route("/uploads/{id}/config", post(uploads::save_chart_config))
        .route("/uploads/{id}/download/pdf", post(uploads::download_pdf))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin-only routes
    let admin_routes = Router::new()
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}/block", patch(admin::block_user))
        .route("/admin/users/{id}/unblock", patch(admin::unblock_user))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = Router::new()
        .route("/", get(home::root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(protected_routes)
        .merge(admin_routes);

    let app_routes = Router::new()
        .route("/", get(home::root))
        .nest("/api", api_routes)
        .with_state(state.clone());

    Router::new()
        .merge(swagger_router)
        .merge(app_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
}
