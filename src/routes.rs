use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState,
    error::AppResult,
    models::{ListKind, UserId},
    monitor::CycleOutcome,
};

const SEARCH_LIMIT: usize = 25;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/check", post(check))
        .route("/movies", get(search_movies))
        .route("/movies/{title}/showtimes", get(showtimes))
        .route("/users/{user_id}/{list}", get(list_entries).post(add_entry).delete(remove_entry))
        .with_state(state)
}

/// Runs the cycle on its own task. Dropping the request does not cancel it.
pub async fn check(State(state): State<Arc<AppState>>) -> Response {
    let monitor = state.monitor.clone();
    let outcome = match tokio::spawn(async move { monitor.run_check_cycle().await }).await {
        Ok(outcome) => outcome,
        Err(err) => CycleOutcome::Failed(err.to_string()),
    };

    match outcome {
        CycleOutcome::AlreadyRunning => {
            (StatusCode::CONFLICT, Json(json!({ "started": false }))).into_response()
        },
        CycleOutcome::Completed(report) => {
            Json(json!({ "started": true, "success": true, "report": report })).into_response()
        },
        CycleOutcome::Failed(error) => {
            Json(json!({ "started": true, "success": false, "error": error })).into_response()
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let titles = state.catalog.search_titles(&query.q, SEARCH_LIMIT).await?;
    Ok(Json(json!({ "titles": titles })))
}

pub async fn showtimes(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let (movie, showtimes) = state.monitor.showtimes_for(&title).await?;
    Ok(Json(json!({ "movie": movie, "showtimes": showtimes })))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Added,
    AlreadyExists,
    Removed,
    NotFound,
}

#[derive(Debug, Deserialize)]
pub struct AddEntry {
    pattern: String,
    #[serde(default)]
    regex: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoveEntry {
    pattern: String,
}

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Path((user_id, list)): Path<(UserId, ListKind)>,
) -> AppResult<Json<serde_json::Value>> {
    let entries = state.subscriptions.list_for_user(list, user_id).await?;
    Ok(Json(json!({ "entries": entries })))
}

pub async fn add_entry(
    State(state): State<Arc<AppState>>,
    Path((user_id, list)): Path<(UserId, ListKind)>,
    Json(req): Json<AddEntry>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = if state.subscriptions.add(list, user_id, &req.pattern, req.regex).await? {
        Outcome::Added
    } else {
        Outcome::AlreadyExists
    };
    Ok(Json(json!({ "outcome": outcome })))
}

pub async fn remove_entry(
    State(state): State<Arc<AppState>>,
    Path((user_id, list)): Path<(UserId, ListKind)>,
    Json(req): Json<RemoveEntry>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = if state.subscriptions.remove(list, user_id, &req.pattern).await? {
        Outcome::Removed
    } else {
        Outcome::NotFound
    };
    Ok(Json(json!({ "outcome": outcome })))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, header::CONTENT_TYPE},
    };
    use serde_json::Value;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        catalog::CatalogStore,
        db,
        models::ShowtimeDates,
        monitor::{
            Monitor,
            testing::{FakeCinema, FakeMetadata, listing},
        },
        notify::{Audience, Dispatcher, testing::RecordingSink},
        subscriptions::SubscriptionStore,
    };

    async fn app(cinema: FakeCinema) -> (Router, Arc<AppState>) {
        app_with_sink(cinema, Arc::new(RecordingSink::default())).await
    }

    async fn app_with_sink(
        cinema: FakeCinema,
        sink: Arc<RecordingSink>,
    ) -> (Router, Arc<AppState>) {
        let db = db::memory().await;
        let catalog = CatalogStore::new(db.clone());
        let subscriptions = SubscriptionStore::new(db);
        let monitor = Monitor::new(
            catalog.clone(),
            subscriptions.clone(),
            Arc::new(cinema),
            Arc::new(FakeMetadata::default()),
            Dispatcher::new(sink),
            Duration::ZERO,
        );
        let state = Arc::new(AppState { monitor: Arc::new(monitor), catalog, subscriptions });
        (router(state.clone()), state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            },
            None => Body::empty(),
        };

        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value =
            if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn watchlist_lifecycle() {
        let (app, _) = app(FakeCinema::default()).await;
        let add = Some(json!({ "pattern": "Flow", "regex": false }));

        let (status, body) = send(&app, Method::POST, "/users/7/watchlist", add.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "added");

        let (_, body) = send(&app, Method::POST, "/users/7/watchlist", add).await;
        assert_eq!(body["outcome"], "already_exists");

        let (_, body) = send(&app, Method::GET, "/users/7/watchlist", None).await;
        assert_eq!(body["entries"], json!([{ "pattern": "Flow", "is_regex": false }]));

        let (_, body) = send(&app, Method::GET, "/users/7/ignore", None).await;
        assert_eq!(body["entries"], json!([]));

        let remove = Some(json!({ "pattern": "Flow" }));
        let (_, body) = send(&app, Method::DELETE, "/users/7/watchlist", remove.clone()).await;
        assert_eq!(body["outcome"], "removed");

        let (_, body) = send(&app, Method::DELETE, "/users/7/watchlist", remove).await;
        assert_eq!(body["outcome"], "not_found");
    }

    #[tokio::test]
    async fn patterns_with_spaces_round_trip() {
        let (app, _) = app(FakeCinema::default()).await;
        let entry = Some(json!({ "pattern": " 2", "regex": true }));

        let (_, body) = send(&app, Method::POST, "/users/3/watchlist", entry).await;
        assert_eq!(body["outcome"], "added");

        let entry = Some(json!({ "pattern": " 2" }));
        let (_, body) = send(&app, Method::DELETE, "/users/3/watchlist", entry).await;
        assert_eq!(body["outcome"], "removed");
    }

    #[tokio::test]
    async fn invalid_regex_is_a_bad_request() {
        let (app, state) = app(FakeCinema::default()).await;

        let body = Some(json!({ "pattern": "([", "regex": true }));
        let (status, body) = send(&app, Method::POST, "/users/7/ignore", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not a valid regex"));
        assert!(state.subscriptions.list_for_user(ListKind::Ignore, 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_filters_titles() {
        let (app, state) = app(FakeCinema::default()).await;
        for title in ["Flow", "Flow (IMAX)", "Wicked"] {
            let dates = ShowtimeDates::default();
            state.catalog.upsert(&listing(title), &dates, false, "").await.unwrap();
        }

        let (status, body) = send(&app, Method::GET, "/movies?q=flo", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["titles"], json!(["Flow", "Flow (IMAX)"]));
    }

    #[tokio::test]
    async fn showtimes_for_unknown_movie_is_404() {
        let (app, _) = app(FakeCinema::default()).await;

        let (status, body) = send(&app, Method::GET, "/movies/Nope/showtimes", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Movie 'Nope' not found.");
    }

    #[tokio::test]
    async fn showtimes_report_notices() {
        let (app, state) = app(FakeCinema::default()).await;
        let dates = ShowtimeDates::default();
        state.catalog.upsert(&listing("Flow"), &dates, false, "").await.unwrap();

        let (status, body) = send(&app, Method::GET, "/movies/Flow/showtimes", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["movie"]["title"], "Flow");
        assert_eq!(body["showtimes"]["status"], "notice");
        assert_eq!(body["showtimes"]["detail"], "Showtimes not available yet.");
    }

    #[tokio::test]
    async fn check_runs_a_cycle_and_reports() {
        let (app, state) = app(FakeCinema::with_listings(vec![listing("Flow")])).await;

        let (status, body) = send(&app, Method::POST, "/check", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["started"], true);
        assert_eq!(body["success"], true);
        assert_eq!(body["report"]["new"], 1);
        assert!(state.catalog.get("Flow").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn abandoned_check_request_still_delivers() {
        let gate = Arc::new(Notify::new());
        let sink = Arc::new(RecordingSink { gate: Some(gate.clone()), ..Default::default() });
        let cinema = FakeCinema::with_listings(vec![listing("Flow")]);
        let (app, state) = app_with_sink(cinema, sink.clone()).await;

        let request = send(&app, Method::POST, "/check", None);
        assert!(tokio::time::timeout(Duration::from_millis(100), request).await.is_err());
        assert!(state.catalog.get("Flow").await.unwrap().is_some());

        gate.notify_one();
        for _ in 0..200 {
            if !state.monitor.is_checking() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!state.monitor.is_checking());
        assert_eq!(sink.audiences(), vec![Audience::AllMovies]);
    }
}
