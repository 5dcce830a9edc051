use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use uitranslate::KeyedTextCollection;
use uitranslate_mt::languages::LANGUAGES;
use uitranslate_mt::{
    AppConfig, GeminiProvider, GithubScanner, MockGenerator, MockMode, MtError, RepoRef,
    RepositoryScanner, ScanFailure, ScanRequest, SingleCallTranslator, TextGenerator,
};

mod projects;

use projects::ProjectStore;

#[derive(Serialize, Deserialize)]
pub struct TranslateRequest {
    pub strings: IndexMap<String, String>,
    pub target_language: String,
    #[serde(default)]
    pub contexts: Option<IndexMap<String, String>>,
}

#[derive(Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translations: IndexMap<String, String>,
    /// Keys that kept their source text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub untranslated: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct GithubScanRequest {
    pub repo_url: String,
    #[serde(default = "default_pattern_search")]
    pub pattern_search: bool,
    #[serde(default)]
    pub branch: Option<String>,
}

fn default_pattern_search() -> bool {
    true
}

#[derive(Serialize, Deserialize)]
pub struct GithubScanResponse {
    pub files: IndexMap<String, String>,
    pub failures: Vec<ScanFailure>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when no Gemini API key is configured
    pub generator: Option<Arc<dyn TextGenerator>>,
    /// `None` when no GitHub token is configured
    pub scanner: Option<Arc<dyn RepositoryScanner>>,
    pub projects: ProjectStore,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let mut config = match std::env::var("UITRANSLATE_CONFIG") {
        Ok(path) => AppConfig::load(Path::new(&path))?,
        Err(_) => AppConfig::default(),
    };
    config.apply_env();

    let generator: Option<Arc<dyn TextGenerator>> = if std::env::var("UITRANSLATE_MOCK").is_ok() {
        warn!("UITRANSLATE_MOCK is set, translations come from the mock generator");
        Some(Arc::new(MockGenerator::new(MockMode::Suffix)))
    } else if config.gemini.api_key.is_empty() {
        warn!("GEMINI_API_KEY not set, translation endpoints will fail");
        None
    } else {
        Some(Arc::new(GeminiProvider::new(config.gemini.clone())?))
    };

    let scanner: Option<Arc<dyn RepositoryScanner>> = if config.github.token.is_empty() {
        warn!("GITHUB_TOKEN not set, repository scanning will fail");
        None
    } else {
        Some(Arc::new(GithubScanner::new(config.github.clone())?))
    };

    let state = AppState {
        config: Arc::new(config),
        generator,
        scanner,
        projects: ProjectStore::default(),
    };

    info!("Starting UI String Translator API");

    let addr = std::env::var("UITRANSLATE_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/translations/translate", post(translate_strings))
        .route("/api/translations/languages", get(supported_languages))
        .route("/api/github/scan", post(scan_repository))
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/{project_id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "message": "API is running" }))
}

async fn supported_languages() -> Json<IndexMap<&'static str, &'static str>> {
    Json(
        LANGUAGES
            .iter()
            .map(|language| (language.name, language.code))
            .collect(),
    )
}

async fn translate_strings(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let generator = state.generator.clone().ok_or_else(|| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Gemini API key not configured",
        )
    })?;

    info!(
        "Translating {} strings to {}",
        request.strings.len(),
        &request.target_language
    );

    let mut collection = KeyedTextCollection::from_pairs(request.strings)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    if let Some(contexts) = &request.contexts {
        collection.apply_contexts(contexts);
    }

    let translator = SingleCallTranslator::new(
        generator,
        state.config.single_call.clone(),
        state.config.batch.clone(),
    );
    let outcome = translator
        .translate_all(&collection, &request.target_language)
        .await
        .map_err(|e| match e {
            MtError::InvalidLanguage(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
            _ => api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Translation error: {}", e),
            ),
        })?;

    let untranslated = outcome.untranslated_keys();
    let warning = if untranslated.is_empty() {
        None
    } else {
        let message = format!(
            "{} of {} strings could not be translated and kept their source text",
            untranslated.len(),
            collection.len()
        );
        warn!("{}", message);
        Some(message)
    };

    Ok(Json(TranslateResponse {
        translations: outcome.translations,
        untranslated,
        warning,
    }))
}

async fn scan_repository(
    State(state): State<AppState>,
    Json(request): Json<GithubScanRequest>,
) -> Result<Json<GithubScanResponse>, ApiError> {
    let scanner = state.scanner.clone().ok_or_else(|| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "GitHub token not configured",
        )
    })?;

    let repo = RepoRef::parse(&request.repo_url)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let scan_request = ScanRequest {
        pattern_search: request.pattern_search,
        ..ScanRequest::default()
    };

    let report = scanner
        .scan(&repo, request.branch.as_deref(), &scan_request)
        .await
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error scanning repository: {}", e),
            )
        })?;

    Ok(Json(GithubScanResponse {
        files: report.files,
        failures: report.failures,
    }))
}
