//! In-memory translation projects
//!
//! Projects live only as long as the server process.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{ApiError, AppState, api_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "Manual Upload")]
    ManualUpload,
    #[serde(rename = "GitHub Repository")]
    GithubRepository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    #[serde(default)]
    pub repo_url: Option<String>,
}

/// Replacement contents for an existing project; id and creation time are kept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub files: IndexMap<String, String>,
    #[serde(default)]
    pub translations: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    pub file_translations: IndexMap<String, IndexMap<String, IndexMap<String, String>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    pub repo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Path → raw resource content
    pub files: IndexMap<String, String>,
    /// Language → key → translation
    pub translations: IndexMap<String, IndexMap<String, String>>,
    /// Path → language → key → translation
    pub file_translations: IndexMap<String, IndexMap<String, IndexMap<String, String>>>,
}

#[derive(Clone, Default)]
pub struct ProjectStore {
    projects: Arc<RwLock<IndexMap<String, Project>>>,
}

fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Project not found")
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<ProjectCreate>,
) -> Json<Project> {
    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        kind: request.kind,
        repo_url: request.repo_url,
        created_at: Utc::now(),
        files: IndexMap::new(),
        translations: IndexMap::new(),
        file_translations: IndexMap::new(),
    };
    info!("Created project '{}' ({})", project.name, project.id);
    state
        .projects
        .projects
        .write()
        .await
        .insert(project.id.clone(), project.clone());
    Json(project)
}

pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.projects.projects.read().await.values().cloned().collect())
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    state
        .projects
        .projects
        .read()
        .await
        .get(&project_id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(update): Json<ProjectUpdate>,
) -> Result<Json<Project>, ApiError> {
    let mut projects = state.projects.projects.write().await;
    let project = projects.get_mut(&project_id).ok_or_else(not_found)?;
    project.name = update.name;
    project.kind = update.kind;
    project.repo_url = update.repo_url;
    project.files = update.files;
    project.translations = update.translations;
    project.file_translations = update.file_translations;
    Ok(Json(project.clone()))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .projects
        .projects
        .write()
        .await
        .shift_remove(&project_id)
        .ok_or_else(not_found)?;
    info!("Deleted project {}", project_id);
    Ok(Json(
        serde_json::json!({ "message": "Project deleted successfully" }),
    ))
}
