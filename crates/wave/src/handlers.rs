//! HTTP surface
//!
//! Thin actix-web handlers over `RecommendationEngine`. The caller's identity arrives
//! in the `X-User-Id` header, set by the platform gateway after authentication.

use crate::error::{RecommendationError, Result};
use crate::playlists::PlaylistKind;
use crate::types::{TrackId, UserId};
use crate::wave::{parse_exclusions, FeedbackEvent, WaveRequest};
use crate::RecommendationEngine;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Timelike;
use music_platform_core::HealthChecker;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Application state shared across all handlers
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub health: Arc<HealthChecker>,
}

fn parse_user_id(raw: &str) -> Result<UserId> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| RecommendationError::InvalidRequest(format!("invalid user id: {}", raw)))
}

/// Caller identity, if the request carries one
fn optional_user(req: &HttpRequest) -> Result<Option<UserId>> {
    match req.headers().get(USER_ID_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                RecommendationError::InvalidRequest(format!("{} is not valid text", USER_ID_HEADER))
            })?;
            parse_user_id(raw).map(Some)
        }
    }
}

fn required_user(req: &HttpRequest) -> Result<UserId> {
    optional_user(req)?.ok_or_else(|| {
        RecommendationError::InvalidRequest(format!("missing {} header", USER_ID_HEADER))
    })
}

#[derive(Debug, Deserialize)]
pub struct WaveQuery {
    pub size: Option<usize>,
    /// Comma-separated track ids already served in this session
    pub exclude: Option<String>,
}

/// GET /recommendations/wave
pub async fn get_wave(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<WaveQuery>,
) -> Result<HttpResponse> {
    let user_id = required_user(&req)?;
    let query = query.into_inner();

    let mut request = WaveRequest::new(user_id);
    if let Some(size) = query.size {
        request = request.with_size(size);
    }
    if let Some(raw) = query.exclude.as_deref() {
        request = request.excluding(parse_exclusions(raw)?);
    }

    let page = state.engine.next_wave_page(request).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DislikeRequest {
    pub track_id: TrackId,
}

/// POST /recommendations/wave/dislike
pub async fn post_dislike(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DislikeRequest>,
) -> Result<HttpResponse> {
    let user_id = required_user(&req)?;
    state.engine.record_dislike(user_id, body.track_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub track_id: TrackId,
    pub event: FeedbackEvent,
}

/// POST /recommendations/wave/feedback
pub async fn post_feedback(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<FeedbackRequest>,
) -> Result<HttpResponse> {
    let user_id = required_user(&req)?;
    state.engine.record_feedback(user_id, body.track_id, body.event);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridQuery {
    /// Overrides the header identity
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /recommendations/hybrid
pub async fn get_hybrid(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<HybridQuery>,
) -> Result<HttpResponse> {
    let user_id = match query.user_id.as_deref() {
        Some(raw) => parse_user_id(raw)?,
        None => required_user(&req)?,
    };
    let result = state.engine.hybrid(user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// GET /recommendations/smart
pub async fn get_smart(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let user_id = required_user(&req)?;
    let result = state.engine.smart(user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /recommendations/similar/{trackId}
pub async fn get_similar(
    state: web::Data<AppState>,
    path: web::Path<TrackId>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let tracks = state
        .engine
        .similar_to_track(path.into_inner(), query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total": tracks.len(),
        "tracks": tracks,
    })))
}

/// GET /recommendations/mood/{mood}
pub async fn get_mood(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let result = state.engine.tracks_by_mood(&path, query.limit).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /recommendations/stats
pub async fn get_stats(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let user_id = required_user(&req)?;
    let stats = state.engine.stats(user_id).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /recommendations/mixes
pub async fn list_mixes(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "mixes": state.engine.mixes() }))
}

#[derive(Debug, Deserialize)]
pub struct AutoMixQuery {
    /// Hour of day in [0, 23]; the server's local hour when absent
    pub hour: Option<u32>,
    pub limit: Option<usize>,
}

/// GET /recommendations/mixes/auto
pub async fn get_auto_mix(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AutoMixQuery>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req)?;
    let hour = query.hour.unwrap_or_else(|| chrono::Local::now().hour());
    let mix = state.engine.auto_mix(hour, user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(mix))
}

/// GET /recommendations/mixes/{type}
pub async fn get_mix(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req)?;
    let mix = state.engine.mix(&path, user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(mix))
}

/// GET /recommendations/radio/track/{trackId}
pub async fn get_track_radio(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<TrackId>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req)?;
    let station = state
        .engine
        .track_radio(path.into_inner(), user_id, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(station))
}

/// GET /recommendations/radio/genre/{genre}
pub async fn get_genre_radio(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req)?;
    let station = state.engine.genre_radio(&path, user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(station))
}

/// GET /recommendations/radio/artist/{artist}
pub async fn get_artist_radio(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req)?;
    let station = state.engine.artist_radio(&path, user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(station))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixRadioRequest {
    pub track_ids: Vec<TrackId>,
    pub limit: Option<usize>,
}

/// POST /recommendations/radio/mix
pub async fn post_mix_radio(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<MixRadioRequest>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req)?;
    let station = state
        .engine
        .mix_radio(&body.track_ids, user_id, body.limit)
        .await?;
    Ok(HttpResponse::Ok().json(station))
}

/// GET /recommendations/playlists
pub async fn list_playlists(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let user_id = required_user(&req)?;
    let playlists = state.engine.playlists(user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "playlists": playlists })))
}

#[derive(Debug, Deserialize)]
pub struct PlaylistQuery {
    pub size: Option<usize>,
}

/// GET /recommendations/playlists/{type}
pub async fn get_playlist(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<PlaylistQuery>,
) -> Result<HttpResponse> {
    let kind = PlaylistKind::parse(&path)?;
    let user_id = optional_user(&req)?;
    let playlist = state.engine.playlist(kind, user_id, query.size).await?;
    Ok(HttpResponse::Ok().json(playlist))
}

/// GET /health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let report = state.health.check_all().await;
    if report.is_ready() {
        HttpResponse::Ok().json(report)
    } else {
        HttpResponse::ServiceUnavailable().json(report)
    }
}

/// Configure application routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/recommendations")
            // Wave
            .route("/wave", web::get().to(get_wave))
            .route("/wave/dislike", web::post().to(post_dislike))
            .route("/wave/feedback", web::post().to(post_feedback))
            // Ranked surfaces
            .route("/hybrid", web::get().to(get_hybrid))
            .route("/smart", web::get().to(get_smart))
            .route("/similar/{track_id}", web::get().to(get_similar))
            .route("/mood/{mood}", web::get().to(get_mood))
            .route("/stats", web::get().to(get_stats))
            // Mixes; `auto` must precede the `{type}` catch-all
            .route("/mixes", web::get().to(list_mixes))
            .route("/mixes/auto", web::get().to(get_auto_mix))
            .route("/mixes/{mix_type}", web::get().to(get_mix))
            // Radio
            .route("/radio/track/{track_id}", web::get().to(get_track_radio))
            .route("/radio/genre/{genre}", web::get().to(get_genre_radio))
            .route("/radio/artist/{artist}", web::get().to(get_artist_radio))
            .route("/radio/mix", web::post().to(post_mix_radio))
            // Personal playlists
            .route("/playlists", web::get().to(list_playlists))
            .route("/playlists/{playlist_type}", web::get().to(get_playlist)),
    );
}
