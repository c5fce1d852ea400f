//! API JSON du générateur.
//!
//! Toutes les réponses suivent l'enveloppe `{"success": bool, ..., "message"?}`.
//! La connexion SQLite est partagée derrière un `Mutex` : chaque handler la
//! verrouille, lit ou écrit, puis la relâche avant tout calcul long.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use loto7_db::db::{StoreError, add_draw, latest_draw, load_draws_or_empty, parse_draw_file};
use loto7_db::models::{Draw, Pool};
use loto7_db::rusqlite::Connection;
use loto7_engine::analyzer::most_common;
use loto7_engine::config::FilterConfig;
use loto7_engine::predict::{
    PredictionRequest, analyze_history, evaluate_combination, evaluate_history, generate_predictions,
    next_draw_date, next_draw_number,
};
use loto7_engine::sampler::make_rng;

use crate::config::AppConfig;

const STATS_TOP: usize = 10;

pub struct AppState {
    pub db: Mutex<Connection>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Mutex::new(conn),
            config,
        })
    }

    fn history(&self) -> Vec<Draw> {
        load_draws_or_empty(&lock_or_recover(&self.db))
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"success": false, "message": message.into()}))).into_response()
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/data", get(handler_data))
        .route("/api/predict", post(handler_predict))
        .route("/api/upload", post(handler_upload))
        .route("/api/stats", get(handler_stats))
        .route("/api/add-draw", post(handler_add_draw))
        .route("/api/insights", get(handler_insights))
        .route("/api/evaluate", post(handler_evaluate))
        .route("/healthz", get(handler_healthz))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(bind: &str, state: Arc<AppState>) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Adresse d'écoute invalide : {bind}"))?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Impossible d'écouter sur {addr}"))?;
    info!(%addr, "serveur démarré");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("serveur arrêté");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("SIGINT reçu, arrêt en cours");
    }
}

async fn handler_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Default, Deserialize)]
struct DataQuery {
    #[serde(default)]
    evaluation: bool,
}

async fn handler_data(State(state): State<Arc<AppState>>, Query(query): Query<DataQuery>) -> Response {
    let mut draws = state.history();
    if query.evaluation {
        draws = evaluate_history(&draws, &state.config.filters);
    }
    Json(json!({
        "success": true,
        "count": draws.len(),
        "draws": draws,
        "has_evaluation": query.evaluation,
    }))
    .into_response()
}

fn default_count() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PredictBody {
    #[serde(default = "default_count")]
    count: i64,
    next_draw_number: Option<u32>,
    filter_config: Option<FilterConfig>,
    #[serde(default = "default_true")]
    include_scoring: bool,
    #[serde(default)]
    include_patterns: bool,
}

async fn handler_predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.body_text()),
    };

    let history = state.history();
    let request = PredictionRequest {
        count: usize::try_from(body.count).unwrap_or(0),
        next_draw_number: body.next_draw_number.unwrap_or_else(|| next_draw_number(&history)),
        filter_config: body.filter_config.unwrap_or_else(|| state.config.filters.clone()),
        include_scoring: body.include_scoring,
        include_patterns: body.include_patterns,
        max_attempts: state.config.max_attempts,
        recent_window: state.config.recent_window,
    };

    let result = tokio::task::spawn_blocking(move || {
        let mut rng = make_rng(None);
        generate_predictions(&request, &history, history.first(), &next_draw_date(), &mut rng)
    })
    .await;

    let prediction = match result {
        Ok(Ok(prediction)) => prediction,
        Ok(Err(e)) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Échec de la génération : {e}"),
            );
        }
    };

    if prediction.draws.is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            "Aucune grille générée : les filtres sont probablement trop stricts.",
        );
    }

    info!(
        count = prediction.draws.len(),
        attempts = prediction.attempts,
        next_draw = prediction.next_draw_number,
        "prédictions générées"
    );
    let message = format!(
        "{} grille(s) générée(s) pour le tirage n°{}.",
        prediction.draws.len(),
        prediction.next_draw_number
    );
    let mut response = match serde_json::to_value(&prediction) {
        Ok(value) => value,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if let Value::Object(map) = &mut response {
        map.insert("success".into(), json!(true));
        map.insert("count".into(), json!(prediction.draws.len()));
        map.insert("message".into(), json!(message));
    }
    Json(response).into_response()
}

/// Analyse un fichier de tirages sans l'enregistrer.
async fn handler_upload(body: String) -> Response {
    match parse_draw_file(&body) {
        Ok(draws) => Json(json!({
            "success": true,
            "count": draws.len(),
            "message": format!("{} tirage(s) chargé(s).", draws.len()),
            "draws": draws,
        }))
        .into_response(),
        Err(e) => failure(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn handler_stats(State(state): State<Arc<AppState>>) -> Response {
    let draws = state.history();
    if draws.is_empty() {
        return Json(json!({"success": true, "stats": {}, "message": "Aucune donnée."})).into_response();
    }
    Json(json!({
        "success": true,
        "stats": {
            "total_draws": draws.len(),
            "most_common_main": most_common(&draws, Pool::Main, STATS_TOP),
            "most_common_bonus": most_common(&draws, Pool::Bonus, STATS_TOP),
            "latest_draw": draws.first(),
        },
    }))
    .into_response()
}

async fn handler_add_draw(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Draw>, JsonRejection>,
) -> Response {
    let Json(draw) = match payload {
        Ok(draw) => draw,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.body_text()),
    };

    let result = add_draw(&lock_or_recover(&state.db), &draw);
    match result {
        Ok(()) => {
            info!(id = %draw.id, "tirage ajouté");
            Json(json!({
                "success": true,
                "message": format!("Tirage {} ajouté.", draw.id),
                "draw": draw,
            }))
            .into_response()
        }
        Err(e @ (StoreError::Invalid { .. } | StoreError::DuplicateId(_))) => {
            failure(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "ajout impossible");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn handler_insights(State(state): State<Arc<AppState>>) -> Response {
    let draws = state.history();
    if draws.is_empty() {
        return Json(json!({"success": true, "insights": {}, "message": "Aucune donnée."})).into_response();
    }
    let analysis = analyze_history(&draws, state.config.recent_window);
    Json(json!({
        "success": true,
        "insights": analysis.insights,
        "patterns": analysis.patterns,
        "total_draws_analyzed": analysis.total_draws,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct EvaluateBody {
    numbers: Vec<u8>,
    previous: Option<Draw>,
}

async fn handler_evaluate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EvaluateBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.body_text()),
    };

    let previous = match body.previous {
        Some(draw) => Some(draw),
        None => {
            let latest = latest_draw(&lock_or_recover(&state.db));
            latest.unwrap_or_else(|e| {
                tracing::warn!(error = %format!("{e:#}"), "dernier tirage illisible");
                None
            })
        }
    };

    match evaluate_combination(&body.numbers, previous.as_ref(), &state.config.filters) {
        Ok(evaluation) => Json(json!({
            "success": true,
            "overall_pass": evaluation.overall_pass,
            "previous": previous.map(|d| d.id),
            "evaluation": evaluation,
        }))
        .into_response(),
        Err(e) => failure(StatusCode::BAD_REQUEST, e.to_string()),
    }
}
