//! `HttpClient` against a local axum stand-in for the services.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use lastmile::protocol::{IntentCreate, SessionState, Side};
use lastmile::{ClientConfig, Credentials, Error, HttpClient, IntentService, SessionAction, SessionService};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Seen {
	auth: Arc<Mutex<Vec<Option<String>>>>,
	bodies: Arc<Mutex<Vec<Value>>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
	headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn sessions_me(State(seen): State<Seen>, headers: HeaderMap) -> impl IntoResponse {
	let auth = bearer(&headers);
	seen.auth.lock().push(auth.clone());
	if auth.as_deref() != Some("Bearer good") {
		return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Could not validate credentials"})));
	}
	(
		StatusCode::OK,
		Json(json!([{
			"id": 3, "state": "ACTIVE", "my_side": "b", "my_token": "tok-b",
			"route_a": {"origin": {"lat": 1.0, "lng": 2.0}, "destination": {"lat": 3.0, "lng": 4.0}},
			"route_b": {"origin": {"lat": 5.0, "lng": 6.0}, "destination": {"lat": 7.0, "lng": 8.0}}
		}])),
	)
}

async fn transition(Path((id, action)): Path<(i64, String)>) -> impl IntoResponse {
	if action == "accept" {
		return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Only side b can accept"})));
	}
	(StatusCode::OK, Json(json!({"id": id, "state": "ABORTED", "my_side": "a"})))
}

async fn create_intent(State(seen): State<Seen>, Json(body): Json<Value>) -> impl IntoResponse {
	seen.bodies.lock().push(body.clone());
	(StatusCode::CREATED, Json(json!({"id": 12, "origin_lat": body["origin_lat"], "origin_lng": body["origin_lng"], "dest_lat": body["dest_lat"], "dest_lng": body["dest_lng"]})))
}

async fn delete_intent(Path(id): Path<i64>) -> StatusCode {
	if id == 12 { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND }
}

async fn matches(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
	let id: i64 = query.get("intent_id").and_then(|v| v.parse().ok()).unwrap_or(-1);
	Json(json!([{"intent_id": id + 1, "name": "Sam", "has_vehicle": false, "same_bus_stop": true,
		"buddy_score": 88.0, "route_overlap_score": 75.5, "past_rating_avg": 4.5,
		"origin_lat": 1.0, "origin_lng": 2.0, "dest_lat": 3.0, "dest_lng": 4.0}]))
}

async fn locations() -> Json<Value> {
	Json(json!({"a": {"lat": 1.5, "lng": 2.5}}))
}

async fn stops() -> Json<Value> {
	Json(json!([{"id": "tennessee-dewey", "name": "Tennessee St @ Dewey St", "lat": 30.4437, "lng": -84.2925}]))
}

async fn serve() -> (String, Seen) {
	let seen = Seen::default();
	let app = Router::new()
		.route("/api/sessions/me", get(sessions_me))
		.route("/api/sessions/{id}/locations", get(locations))
		.route("/api/sessions/{id}/{action}", post(transition))
		.route("/api/intents", post(create_intent))
		.route("/api/intents/matches", get(matches))
		.route("/api/intents/{id}", delete(delete_intent))
		.route("/api/stops", get(stops))
		.with_state(seen.clone());

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(format!("http://{addr}/api"), seen)
}

fn client(api_url: &str, token: Option<&str>) -> (HttpClient, Credentials) {
	let config = ClientConfig {
		api_url: api_url.to_string(),
		..ClientConfig::default()
	};
	let credentials = Credentials::new(token.map(str::to_string));
	(HttpClient::new(&config, credentials.clone()).unwrap(), credentials)
}

#[tokio::test]
async fn sessions_carry_bearer_and_parse() {
	let (url, seen) = serve().await;
	let (client, _) = client(&url, Some("good"));

	let sessions = client.list_sessions().await.unwrap();
	assert_eq!(sessions.len(), 1);
	assert_eq!(sessions[0].state, SessionState::Active);
	assert_eq!(sessions[0].my_side, Some(Side::B));
	assert!(sessions[0].has_both_routes());
	assert_eq!(seen.auth.lock().as_slice(), &[Some("Bearer good".to_string())]);
}

#[tokio::test]
async fn rejected_credential_maps_to_unauthorized() {
	let (url, _) = serve().await;
	let (client, credentials) = client(&url, Some("stale"));
	assert!(matches!(client.list_sessions().await, Err(Error::Unauthorized)));

	credentials.clear();
	assert!(client.list_sessions().await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn transition_errors_carry_server_detail() {
	let (url, _) = serve().await;
	let (client, _) = client(&url, Some("good"));

	match client.transition(3, SessionAction::Accept).await {
		Err(Error::Request { status, detail }) => {
			assert_eq!(status, 400);
			assert_eq!(detail, "Only side b can accept");
		}
		other => panic!("unexpected: {other:?}"),
	}

	let ack = client.transition(3, SessionAction::Abort).await.unwrap();
	assert_eq!(ack.state, SessionState::Aborted);
	assert!(ack.route_a.is_none());

	let snapshot = client.locations(3).await.unwrap();
	assert_eq!(snapshot.a.map(|p| p.lat), Some(1.5));
	assert!(snapshot.b.is_none());
}

#[tokio::test]
async fn intent_endpoints() {
	let (url, seen) = serve().await;
	let (client, _) = client(&url, Some("good"));

	let request = IntentCreate {
		origin_lat: 30.44,
		origin_lng: -84.29,
		dest_lat: 30.45,
		dest_lng: -84.28,
		expires_in_minutes: 60,
	};
	let intent = client.create_intent(&request).await.unwrap();
	assert_eq!(intent.id, 12);
	assert_eq!(seen.bodies.lock()[0]["expires_in_minutes"], 60);

	client.delete_intent(12).await.unwrap();
	assert_eq!(client.delete_intent(13).await.unwrap_err().status(), Some(404));

	let cards = client.matches(12).await.unwrap();
	assert_eq!(cards[0].intent_id, 13);
	assert_eq!(cards[0].display_name(), "Sam");

	let stops = client.stops().await.unwrap();
	assert_eq!(stops[0].id, "tennessee-dewey");
}
