//! UI string catalog routes

use axum::{extract::Path, routing::get, Json, Router};
use crm_core::i18n::catalog;
use crm_core::Locale;
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/i18n/{locale} - Every UI string of one locale
///
/// Keys missing from a locale fall back to the English text.
#[utoipa::path(
    get,
    path = "/api/v1/i18n/{locale}",
    tag = "I18n",
    params(("locale" = String, Path, description = "Language tag such as `de` or `es-MX`")),
    responses(
        (status = 200, description = "Key to text map", body = BTreeMap<String, String>),
        (status = 404, description = "Unsupported locale", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_catalog(
    Path(tag): Path<String>,
) -> ApiResult<Json<BTreeMap<&'static str, &'static str>>> {
    let locale = Locale::from_tag(&tag).ok_or_else(|| ApiError::entity_not_found("Locale", &tag))?;
    Ok(Json(catalog(locale)))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/:locale", get(get_catalog))
}
