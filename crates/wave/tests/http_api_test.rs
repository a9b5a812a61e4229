//! HTTP surface over an in-memory catalog

use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use music_platform_core::HealthChecker;
use music_platform_wave::handlers::{self, AppState, USER_ID_HEADER};
use music_platform_wave::{
    IdentityShuffler, InMemoryStore, RecommendationEngine, Stores, Track,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

fn catalog() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..30 {
        store.insert_track(Track {
            id: Uuid::new_v4(),
            title: format!("Song {}", i),
            artist: format!("Artist {}", i % 10),
            genre: Some(if i % 2 == 0 { "Rock" } else { "Electronic" }.to_string()),
            year: Some(1990 + i as i32),
            play_count: 1000 - i as i64 * 10,
            likes_count: 5,
            created_at: Utc::now(),
            mood: None,
            is_instrumental: false,
            audio_features: None,
        });
    }
    store
}

fn state(store: Arc<InMemoryStore>) -> web::Data<AppState> {
    let engine = RecommendationEngine::new(Stores::shared(store))
        .with_shuffler(Arc::new(IdentityShuffler));
    web::Data::new(AppState {
        engine: Arc::new(engine),
        health: Arc::new(HealthChecker::new("wave-service")),
    })
}

macro_rules! service {
    ($store:expr) => {
        test::init_service(
            App::new()
                .app_data(state($store))
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_wave_page_for_new_listener() {
    let app = service!(catalog());
    let user = Uuid::new_v4();

    let req = test::TestRequest::get()
        .uri("/recommendations/wave?size=5")
        .insert_header((USER_ID_HEADER, user.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["tracks"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["excludeIds"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["metadata"]["fallback"], true);
    assert_eq!(body["metadata"]["state"], "insufficient_data");
    assert_eq!(body["tracks"][0]["sources"][0], "trending");
}

#[actix_web::test]
async fn test_exclude_cursor_is_honoured() {
    let app = service!(catalog());
    let user = Uuid::new_v4();

    let first = test::TestRequest::get()
        .uri("/recommendations/wave?size=3")
        .insert_header((USER_ID_HEADER, user.to_string()))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, first).await;
    let cursor: Vec<String> = first["excludeIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().to_string())
        .collect();

    let second = test::TestRequest::get()
        .uri(&format!("/recommendations/wave?size=3&exclude={}", cursor.join(",")))
        .insert_header((USER_ID_HEADER, user.to_string()))
        .to_request();
    let second: Value = test::call_and_read_body_json(&app, second).await;

    for t in second["tracks"].as_array().unwrap() {
        let id = t["trackId"].as_str().unwrap().to_string();
        assert!(!cursor.contains(&id));
    }
    assert_eq!(second["excludeIds"].as_array().map(Vec::len), Some(6));
}

#[actix_web::test]
async fn test_wave_requires_identity() {
    let app = service!(catalog());

    let req = test::TestRequest::get().uri("/recommendations/wave").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/recommendations/wave")
        .insert_header((USER_ID_HEADER, "not-a-uuid"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_malformed_exclude_is_rejected() {
    let app = service!(catalog());

    let req = test::TestRequest::get()
        .uri("/recommendations/wave?exclude=abc,def")
        .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_dislike_then_page_skips_track() {
    let store = catalog();
    let app = service!(store.clone());
    let user = Uuid::new_v4();

    let first = test::TestRequest::get()
        .uri("/recommendations/wave?size=1")
        .insert_header((USER_ID_HEADER, user.to_string()))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, first).await;
    let top = first["tracks"][0]["trackId"].as_str().unwrap().to_string();

    let dislike = test::TestRequest::post()
        .uri("/recommendations/wave/dislike")
        .insert_header((USER_ID_HEADER, user.to_string()))
        .set_json(serde_json::json!({ "trackId": top }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, dislike).await;
    assert_eq!(resp["success"], true);

    let again = test::TestRequest::get()
        .uri("/recommendations/wave?size=1")
        .insert_header((USER_ID_HEADER, user.to_string()))
        .to_request();
    let again: Value = test::call_and_read_body_json(&app, again).await;
    assert_ne!(again["tracks"][0]["trackId"].as_str(), Some(top.as_str()));
}

#[actix_web::test]
async fn test_feedback_is_accepted() {
    let app = service!(catalog());

    let req = test::TestRequest::post()
        .uri("/recommendations/wave/feedback")
        .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
        .set_json(serde_json::json!({ "trackId": Uuid::new_v4(), "event": "skip" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_mix_catalogue_and_unknown_mix() {
    let app = service!(catalog());

    let req = test::TestRequest::get().uri("/recommendations/mixes").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let mixes = body["mixes"].as_array().unwrap();
    assert_eq!(mixes.len(), 5);
    assert!(mixes.iter().any(|m| m["type"] == "focus_flow"));

    let req = test::TestRequest::get()
        .uri("/recommendations/mixes/polka_party")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/recommendations/mixes/auto?hour=30")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_unknown_track_is_not_found() {
    let app = service!(catalog());

    let req = test::TestRequest::get()
        .uri(&format!("/recommendations/similar/{}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_catalog_outage_is_service_unavailable() {
    let store = catalog();
    store.set_catalog_unavailable(true);
    let app = service!(store);

    let req = test::TestRequest::get()
        .uri("/recommendations/wave")
        .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_playlists_by_kind() {
    let app = service!(catalog());

    let req = test::TestRequest::get()
        .uri("/recommendations/playlists/charts?size=10")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["type"], "charts");
    assert_eq!(body["tracks"].as_array().map(Vec::len), Some(10));
    assert_eq!(body["total"], 10);

    let req = test::TestRequest::get()
        .uri("/recommendations/playlists/weekly")
        .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // personal kinds need a listener
    let req = test::TestRequest::get()
        .uri("/recommendations/playlists/daily")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_all_playlists_for_listener() {
    let app = service!(catalog());

    let req = test::TestRequest::get()
        .uri("/recommendations/playlists")
        .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let kinds: Vec<&str> = body["playlists"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["daily", "premiere", "stash", "charts"]);

    let req = test::TestRequest::get()
        .uri("/recommendations/playlists")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_mix_radio_from_posted_seeds() {
    let store = catalog();
    let seed = Uuid::new_v4();
    store.insert_track(Track {
        id: seed,
        title: "Seed".to_string(),
        artist: "Seed Band".to_string(),
        genre: Some("Rock".to_string()),
        year: Some(1995),
        play_count: 10,
        likes_count: 0,
        created_at: Utc::now(),
        mood: None,
        is_instrumental: false,
        audio_features: None,
    });
    let app = service!(store);

    let req = test::TestRequest::post()
        .uri("/recommendations/radio/mix")
        .set_json(serde_json::json!({ "trackIds": [seed], "limit": 5 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["fallback"], false);
    assert_eq!(body["characteristics"]["genres"][0], "Rock");
    let tracks = body["tracks"].as_array().unwrap();
    assert!(!tracks.is_empty() && tracks.len() <= 5);
    assert!(tracks.iter().all(|t| t["genre"] == "Rock"));

    let req = test::TestRequest::post()
        .uri("/recommendations/radio/mix")
        .set_json(serde_json::json!({ "trackIds": [] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/recommendations/radio/mix")
        .set_json(serde_json::json!({ "trackIds": [Uuid::new_v4()] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_artist_radio_and_mood_routes() {
    let app = service!(catalog());

    let req = test::TestRequest::get()
        .uri("/recommendations/radio/artist/Artist%203?limit=5")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let tracks = body["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 3);
    assert!(tracks.iter().all(|t| t["artist"] == "Artist 3"));

    let req = test::TestRequest::get()
        .uri("/recommendations/mood/calm")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["mood"], "calm");
    assert_eq!(body["total"], 0);
}

#[actix_web::test]
async fn test_health_without_backends_is_ready() {
    let app = service!(catalog());

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
