use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;

use cities_core::CityDraft;
use cities_engine::{Catalog, CatalogError};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub struct CitiesServer;

#[derive(Clone)]
struct AppState {
    catalog: Arc<Catalog>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(rename = "searchText", default)]
    search_text: Option<String>,
}

impl CitiesServer {
    pub async fn serve(
        catalog: Arc<Catalog>,
        host: &str,
        port: u16,
        max_upload_bytes: usize,
    ) -> anyhow::Result<()> {
        let app = router(catalog, max_upload_bytes);

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;

        info!("cities server listening on {}", addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// HTTP routes over the catalog. Request bodies, uploads included, are
/// capped at `max_upload_bytes`.
pub fn router(catalog: Arc<Catalog>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/init", get(api_init))
        .route("/city/titles", get(api_titles))
        .route("/city/search", get(api_search))
        .route("/city/update", put(api_update))
        .route("/city/:id", get(api_get_city))
        .route("/city/:id/image", get(api_get_image))
        .route("/city/:id/uploadFile", post(api_upload_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(AppState { catalog })
}

fn catalog_error(e: CatalogError) -> Response {
    match e {
        CatalogError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        other => {
            error!(error = %other, "catalog operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

fn not_found(what: String) -> Response {
    (StatusCode::NOT_FOUND, what).into_response()
}

/// GET /init - Bulk load cities from the CSV source
async fn api_init(State(state): State<AppState>) -> Response {
    match state.catalog.bulk_load().await {
        Ok(loaded) => Json(loaded).into_response(),
        Err(e) => catalog_error(e),
    }
}

/// GET /city/titles - All city titles
async fn api_titles(State(state): State<AppState>) -> Response {
    match state.catalog.titles().await {
        Ok(titles) => Json(titles).into_response(),
        Err(e) => catalog_error(e),
    }
}

/// GET /city/search?searchText= - The single city matching the text
async fn api_search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let text = params.search_text.unwrap_or_default();
    match state.catalog.search_by_title(&text).await {
        Ok(Some(city)) => Json(city).into_response(),
        Ok(None) => not_found(format!("No single city matches '{}'", text)),
        Err(e) => catalog_error(e),
    }
}

/// GET /city/:id - City record
async fn api_get_city(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.catalog.find_by_id(id).await {
        Ok(Some(city)) => Json(city).into_response(),
        Ok(None) => not_found(format!("City {} not found", id)),
        Err(e) => catalog_error(e),
    }
}

/// GET /city/:id/image - Image bytes, materializing the remote image on first access
async fn api_get_image(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.catalog.image_for_city(id).await {
        Ok(Some(bytes)) => {
            ([(header::CONTENT_TYPE, sniff_content_type(&bytes))], bytes).into_response()
        }
        Ok(None) => not_found(format!("No image available for city {}", id)),
        Err(e) => catalog_error(e),
    }
}

/// PUT /city/update - Overwrite a city with a validated client record
async fn api_update(State(state): State<AppState>, body: Bytes) -> Response {
    let draft = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Option<CityDraft>>(&body) {
            Ok(draft) => draft,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid city payload: {}", e))
                    .into_response();
            }
        }
    };

    match state.catalog.update_city(draft).await {
        Ok(city) => Json(city).into_response(),
        Err(e) => catalog_error(e),
    }
}

/// POST /city/:id/uploadFile - Replace the image with the multipart field `image`
async fn api_upload_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    let mut image = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("image") => match field.bytes().await {
                Ok(bytes) => {
                    image = Some(bytes);
                    break;
                }
                Err(e) => return (e.status(), e.body_text()).into_response(),
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        }
    }

    match state.catalog.upload_image(image.as_deref(), id).await {
        Ok(uploaded) => Json(uploaded).into_response(),
        Err(e) => catalog_error(e),
    }
}

fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}
