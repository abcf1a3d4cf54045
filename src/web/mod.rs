use actix_web::error::InternalError;
use actix_web::{App, HttpResponse, HttpServer, Responder, delete, get, post, web};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::export::{ARCHIVE_NAME, package};
use crate::model::{BatchResult, BatchSummary, ListingRecord, QueryConfig, QueryForm};
use crate::progress::{ProgressEvent, Reporter};

mod dashboard;
mod state;

pub use state::{AppState, RunError, RunGuard, Session};

// -------------------------
// Response types
// -------------------------

#[derive(Serialize)]
struct ConfigEntry<'a> {
    index: usize,
    #[serde(flatten)]
    config: &'a QueryConfig,
}

#[derive(Serialize)]
struct ConfigList<'a> {
    configs: Vec<ConfigEntry<'a>>,
}

#[derive(Serialize)]
struct ResultsResponse<'a> {
    summary: BatchSummary,
    rows: &'a [ListingRecord],
}

fn config_list(configs: &[QueryConfig]) -> HttpResponse {
    let configs = configs
        .iter()
        .enumerate()
        .map(|(index, config)| ConfigEntry { index, config })
        .collect();
    HttpResponse::Ok().json(ConfigList { configs })
}

fn results(result: &BatchResult) -> HttpResponse {
    HttpResponse::Ok().json(ResultsResponse {
        summary: result.summary(),
        rows: &result.combined,
    })
}

fn error_json(msg: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "error": msg.to_string() })
}

fn run_error(e: &RunError) -> HttpResponse {
    match e {
        RunError::Invalid(v) => HttpResponse::BadRequest().json(error_json(v)),
        RunError::Busy(b) => HttpResponse::Conflict().json(error_json(b)),
    }
}

// -------------------------
// HTTP Handlers
// -------------------------

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[get("/api/configs")]
async fn list_configs(state: web::Data<AppState>) -> impl Responder {
    let s = state.session();
    config_list(s.batch.configs())
}

#[post("/api/configs")]
async fn add_config(state: web::Data<AppState>, body: web::Json<QueryForm>) -> impl Responder {
    match QueryConfig::try_from(body.into_inner()) {
        Ok(config) => {
            let mut s = state.session();
            let index = s.batch.add(config);
            info!(index, "marketplace added");
            config_list(s.batch.configs())
        }
        Err(e) => HttpResponse::BadRequest().json(error_json(e)),
    }
}

#[delete("/api/configs/{index}")]
async fn remove_config(state: web::Data<AppState>, path: web::Path<usize>) -> impl Responder {
    let mut s = state.session();
    match s.batch.remove(path.into_inner()) {
        Ok(gone) => {
            info!(city = gone.city(), "marketplace removed");
            config_list(s.batch.configs())
        }
        Err(e) => HttpResponse::BadRequest().json(error_json(e)),
    }
}

#[post("/api/run")]
async fn run_now(state: web::Data<AppState>) -> impl Responder {
    let guard = match state.begin_run() {
        Ok(g) => g,
        Err(e) => return run_error(&RunError::from(e)),
    };
    // detached so a client disconnect cannot cancel the batch mid-session
    let task = actix_web::rt::spawn(async move {
        let outcome = state.run(&guard, &Reporter::silent()).await;
        drop(guard);
        outcome
    });
    match task.await {
        Ok(Ok(result)) => results(&result),
        Ok(Err(e)) => run_error(&e),
        Err(e) => {
            warn!("batch task failed: {e}");
            HttpResponse::InternalServerError().json(error_json("batch task failed"))
        }
    }
}

#[get("/api/results")]
async fn last_results(state: web::Data<AppState>) -> impl Responder {
    match &state.session().last {
        Some(result) => results(result),
        None => HttpResponse::NotFound().json(error_json("no results yet")),
    }
}

#[get("/api/results/download")]
async fn download(state: web::Data<AppState>) -> impl Responder {
    let bytes = {
        let s = state.session();
        match &s.last {
            Some(result) if !result.is_empty() => package(result),
            _ => return HttpResponse::NotFound().json(error_json("no results to download")),
        }
    };
    match bytes {
        Ok(b) => HttpResponse::Ok()
            .content_type("application/zip")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{ARCHIVE_NAME}\""),
            ))
            .body(b),
        Err(e) => {
            warn!("packaging failed: {e:#}");
            HttpResponse::InternalServerError().json(error_json(format!("{e:#}")))
        }
    }
}

// --------------
// SSE streaming
// --------------

fn sse_event(event: &str, data_json: &str) -> Bytes {
    let payload = format!("event: {}\ndata: {}\n\n", event, data_json);
    Bytes::from(payload)
}

fn progress_event(ev: &ProgressEvent) -> Bytes {
    let name = match ev {
        ProgressEvent::Status { .. } => "progress",
        ProgressEvent::ConfigDone { .. } => "config",
    };
    let data = serde_json::to_string(ev).unwrap_or_else(|_| "{}".to_string());
    sse_event(name, &data)
}

#[get("/api/run/stream")]
async fn run_stream(state: web::Data<AppState>) -> impl Responder {
    let guard = match state.begin_run() {
        Ok(g) => g,
        Err(e) => return run_error(&RunError::from(e)),
    };
    let (tx, mut rx) = mpsc::channel::<Bytes>(32);

    actix_web::rt::spawn(async move {
        let configs = state.session().batch.len();
        let _ = tx
            .send(sse_event("start", &format!(r#"{{"configs":{configs}}}"#)))
            .await;

        let (ptx, mut prx) = mpsc::unbounded_channel();
        let reporter = Reporter::with_channel(ptx);
        let run = async move {
            let r = state.run(&guard, &reporter).await;
            drop(reporter);
            r
        };
        let forward = async {
            while let Some(ev) = prx.recv().await {
                let _ = tx.send(progress_event(&ev)).await;
            }
        };
        let (outcome, ()) = tokio::join!(run, forward);

        let last = match outcome {
            Ok(result) => {
                let payload = serde_json::json!({
                    "summary": result.summary(),
                    "rows": result.combined,
                });
                sse_event("done", &payload.to_string())
            }
            Err(e) => sse_event("error", &error_json(&e).to_string()),
        };
        let _ = tx.send(last).await;
    });

    let stream = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, actix_web::Error>(chunk);
        }
    };

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

// -------------------------
// Wiring
// -------------------------

/// Malformed form bodies come back as the same `{"error": ...}` shape as
/// validation failures.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let resp = HttpResponse::BadRequest().json(error_json(&err));
        InternalError::from_response(err, resp).into()
    })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(dashboard::dashboard)
        .service(healthz)
        .service(list_configs)
        .service(add_config)
        .service(remove_config)
        .service(run_now)
        .service(run_stream)
        .service(last_results)
        .service(download);
}

pub async fn serve(state: AppState, bind: std::net::SocketAddr) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!(%bind, "dashboard listening");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind(bind)?
        .run()
        .await
}
