//! Integration tests for the web API.
//!
//! These tests verify the HTTP API endpoints work correctly.

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use rs_metro::services::{
    build_router, ApiResponse, CommandResponse, EndResponse, FieldResponse, MapResponse,
    SharedSimulation, WebServerConfig,
};
use rs_metro::{
    Coordinates, FieldType, LayoutConfig, Phase, SimulationConfig, SimulationController,
    TrainConfig, TrainId, TrainState, TrainStatus,
};

fn create_test_app() -> (axum::Router, Arc<SharedSimulation>) {
    let config = SimulationConfig::empty()
        .with_layout(LayoutConfig::rows(&["........", "...S....", "........"]))
        .with_train_length(2)
        .with_step_delay_ms(30)
        .with_train(
            TrainConfig::new(TrainId(1), "top")
                .with_endpoints(Coordinates::new(0, 0), Coordinates::new(0, 7)),
        );
    let controller = SimulationController::new(config).unwrap();
    let state = Arc::new(SharedSimulation::new(controller));
    let router = build_router(Arc::clone(&state), &WebServerConfig::default());
    (router, state)
}

async fn get<T: serde::de::DeserializeOwned>(app: &axum::Router, uri: &str) -> (StatusCode, ApiResponse<T>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post<T: serde::de::DeserializeOwned>(app: &axum::Router, uri: &str) -> (StatusCode, ApiResponse<T>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_get_map() {
    let (app, _state) = create_test_app();

    let (status, json) = get::<MapResponse>(&app, "/api/map").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.success);

    let map = json.data.unwrap();
    assert_eq!(map.width, 8);
    assert_eq!(map.height, 3);
    assert_eq!(map.rows[0], "11111111");
    assert_eq!(map.rows[1], "...S....");
    assert_eq!(map.entrances.len(), 8);
    assert_eq!(map.occupied.len(), 1);
    assert_eq!(
        map.occupied[0].cells,
        vec![Coordinates::new(0, 0), Coordinates::new(0, 1)]
    );
}

#[tokio::test]
async fn test_get_field() {
    let (app, _state) = create_test_app();

    let (status, json) = get::<FieldResponse>(&app, "/api/field/0/1").await;
    assert_eq!(status, StatusCode::OK);
    let field = json.data.unwrap();
    assert_eq!(field.label, FieldType::TrainPath(TrainId(1)));
    assert_eq!(field.occupant, Some(TrainId(1)));
    assert_eq!(field.courses, vec![TrainId(1)]);
    assert!(!field.entrance);

    let (_, json) = get::<FieldResponse>(&app, "/api/field/1/3").await;
    let station = json.data.unwrap();
    assert_eq!(station.label, FieldType::Station);
    assert_eq!(station.occupant, None);

    let (_, json) = get::<FieldResponse>(&app, "/api/field/0/2").await;
    assert!(json.data.unwrap().entrance);
}

#[tokio::test]
async fn test_get_field_off_map() {
    let (app, _state) = create_test_app();

    let (status, json) = get::<FieldResponse>(&app, "/api/field/9/0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!json.success);
    assert!(json.error.is_some());
}

#[tokio::test]
async fn test_get_trains() {
    let (app, _state) = create_test_app();

    let (_, json) = get::<Vec<TrainState>>(&app, "/api/trains").await;
    let trains = json.data.unwrap();
    assert_eq!(trains.len(), 1);
    assert_eq!(trains[0].train, TrainId(1));
    assert_eq!(trains[0].status, TrainStatus::Created);
    assert_eq!(trains[0].name.as_str(), "top");
}

#[tokio::test]
async fn test_lifecycle() {
    let (app, state) = create_test_app();

    let (_, json) = post::<CommandResponse>(&app, "/api/start").await;
    assert!(json.success);
    let started = json.data.unwrap();
    assert_eq!(started.phase, Phase::Running);
    assert_eq!(started.affected, 1);

    let (_, json) = post::<CommandResponse>(&app, "/api/start").await;
    assert!(!json.success);

    let (_, json) = post::<CommandResponse>(&app, "/api/pause").await;
    assert_eq!(json.data.unwrap().affected, 1);
    let (_, json) = post::<CommandResponse>(&app, "/api/pause").await;
    assert_eq!(json.data.unwrap().affected, 0);

    let (_, json) = post::<CommandResponse>(&app, "/api/restart").await;
    assert_eq!(json.data.unwrap().affected, 1);

    let (_, json) = post::<EndResponse>(&app, "/api/end").await;
    assert!(json.success);
    let ended = json.data.unwrap();
    assert_eq!(ended.joined, 1);
    assert!(ended.faulted.is_empty());
    assert!(ended.panicked.is_empty());
    assert!(ended.elapsed_ms.is_some());

    assert_eq!(state.phase(), Phase::Ended);
    assert!(state.monitor().occupied_cells().is_empty());

    let (_, json) = post::<EndResponse>(&app, "/api/end").await;
    assert!(!json.success);
}

#[tokio::test]
async fn test_not_found() {
    let (app, _state) = create_test_app();

    let (status, json) = get::<()>(&app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!json.success);
    assert_eq!(json.error.as_deref(), Some("Not found"));
}
