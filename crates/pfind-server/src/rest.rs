use crate::types::*;
use axum::{
    Router,
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pfind_core::config::ServerConfig;
use pfind_core::{ArtifactId, ContainerId, Error};
use pfind_finder::{LocateOutcome, ParticipantFinder, ParticipantRef, SaveContext};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Header carrying the caller's identity (an email address).
pub const IDENTITY_HEADER: &str = "x-user-email";

#[derive(Clone)]
pub struct AppState {
    pub finder: Arc<ParticipantFinder>,
}

pub fn create_router(finder: Arc<ParticipantFinder>) -> Router {
    let state = AppState { finder };

    Router::new()
        // Health check endpoints
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        // API endpoints
        .route("/api/v1/accelerometers", get(list_accelerometers))
        .route("/api/v1/participants/locate", post(locate_participant))
        .route("/api/v1/artifacts/:id/content", get(download_content))
        .route("/api/v1/containers/:id/versions", post(save_version))
        // Middleware layers (applied in reverse order)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `config.host:config.port` and serve until the process is stopped.
pub async fn serve(finder: Arc<ParticipantFinder>, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "pfind server listening");
    axum::serve(listener, create_router(finder)).await?;
    Ok(())
}

/// Health check endpoint - returns OK if the service is running
async fn health_check() -> impl IntoResponse {
    tracing::debug!("Health check requested");
    (StatusCode::OK, "OK")
}

/// Readiness check endpoint - the finder is wired at startup
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!(anchor = %state.finder.anchor(), "Readiness check requested");
    (StatusCode::OK, "READY")
}

fn identity(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingIdentity)
}

async fn list_accelerometers(State(state): State<AppState>) -> Json<AccelerometersResponse> {
    Json(AccelerometersResponse {
        types: state.finder.layout().accelerometer_types.clone(),
    })
}

async fn locate_participant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LocateRequest>,
) -> Result<Json<LocateOutcome>, AppError> {
    let identity = identity(&headers)?;
    let outcome = state
        .finder
        .locate_participant_files(&identity, &req.accelerometer_type, &req.participant_id)
        .await?;
    Ok(Json(outcome))
}

async fn download_content(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let identity = identity(&headers)?;
    let download = state.finder.download(&identity, &ArtifactId::new(id)).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, download.content_kind)],
        download.content,
    )
        .into_response())
}

async fn save_version(
    Path(container_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<SaveVersionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SaveVersionResponse>), AppError> {
    let identity = identity(&headers)?;

    let mut ctx = SaveContext::new(
        ContainerId::new(container_id),
        query.base_filename,
        body.to_vec(),
    );
    if let Some(kind) = query.content_kind {
        ctx = ctx.with_content_kind(kind);
    }
    let participant = match (query.accelerometer_type, query.participant_id) {
        (Some(accelerometer_type), Some(participant_id)) => {
            Some(ParticipantRef::new(accelerometer_type, participant_id))
        }
        _ => None,
    };

    let receipt = state
        .finder
        .save_edited_artifact(&identity, &ctx, participant.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

// Error handling
pub enum AppError {
    MissingIdentity,
    Pfind(Error),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::Pfind(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Pfind(Error::Other(err))
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingIdentity => StatusCode::UNAUTHORIZED,
            AppError::Pfind(err) => match err {
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Unauthorized(_) => StatusCode::FORBIDDEN,
                Error::InvalidPath(_) | Error::InvalidName(_) => StatusCode::BAD_REQUEST,
                Error::VersionConflict { .. } | Error::NameCollision { .. } => {
                    StatusCode::CONFLICT
                }
                Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::MissingIdentity => format!("missing {} header", IDENTITY_HEADER),
            AppError::Pfind(err) => err.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, error = %error_message, "request failed");
        }
        let json = serde_json::json!({
            "error": error_message
        });
        (status, Json(json)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pfind_access::{Authorizer, StaticAllowlist};
    use pfind_core::RetryPolicy;
    use pfind_store::InMemoryObjectStore;
    use tower::ServiceExt;

    const USER: &str = "researcher@lab.edu";
    const EDITABLE: &str = "part4_nightsummary_sleep_cleaned.csv";

    struct Fixture {
        router: Router,
        store: InMemoryObjectStore,
        results: ContainerId,
    }

    fn fixture() -> Fixture {
        let store = InMemoryObjectStore::new();
        let root = store.root();
        let results = store
            .add_path(&root, &["ActiGraph", "PID123", "output_PID123", "results"])
            .unwrap();
        store.add_artifact(&results, EDITABLE, "id,night\n1,1\n").unwrap();

        let finder = ParticipantFinder::builder()
            .store(Arc::new(store.clone()))
            .authorizer(Arc::new(Authorizer::new(Arc::new(StaticAllowlist::new([
                USER,
            ])))))
            .anchor(root)
            .retry(RetryPolicy::none())
            .build()
            .unwrap();

        Fixture {
            router: create_router(Arc::new(finder)),
            store,
            results,
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn locate_request(identity: Option<&str>, participant: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/participants/locate")
            .header("content-type", "application/json");
        if let Some(identity) = identity {
            builder = builder.header(IDENTITY_HEADER, identity);
        }
        builder
            .body(Body::from(
                serde_json::json!({
                    "accelerometerType": "ActiGraph",
                    "participantId": participant,
                })
                .to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = fixture()
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_accelerometer_list() {
        let response = fixture()
            .router
            .oneshot(
                Request::get("/api/v1/accelerometers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["types"][0], "ActiGraph");
        assert_eq!(body["types"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_locate() {
        let fx = fixture();
        let response = fx
            .router
            .clone()
            .oneshot(locate_request(Some(USER), "PID123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "found");
        assert_eq!(body["container"], fx.results.as_str());
        assert_eq!(body["editable"]["name"], EDITABLE);
        assert!(body["read_only"][0].is_null());

        let missing = fx
            .router
            .oneshot(locate_request(Some(USER), "PID404"))
            .await
            .unwrap();
        let body = json_body(missing).await;
        assert_eq!(body["status"], "folder_missing");
        assert_eq!(body["segment"], "PID404");
    }

    #[tokio::test]
    async fn test_identity_is_required_and_checked() {
        let fx = fixture();
        let response = fx
            .router
            .clone()
            .oneshot(locate_request(None, "PID123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = fx
            .router
            .oneshot(locate_request(Some("intruder@example.com"), "PID123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_save_and_download() {
        let fx = fixture();
        let uri = format!(
            "/api/v1/containers/{}/versions?baseFilename={}&participantId=PID123&accelerometerType=ActiGraph",
            fx.results, EDITABLE
        );

        let response = fx
            .router
            .clone()
            .oneshot(
                Request::post(uri)
                    .header(IDENTITY_HEADER, USER)
                    .body(Body::from("id,night\n1,9\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["name"], "part4_nightsummary_sleep_cleaned_v1.csv");
        assert_eq!(body["version"], 1);
        assert_eq!(body["savedBy"], USER);

        let id = body["id"].as_str().unwrap().to_string();
        let response = fx
            .router
            .oneshot(
                Request::get(format!("/api/v1/artifacts/{}/content", id))
                    .header(IDENTITY_HEADER, USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // In-memory ids carry no extension; the type comes from the store.
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"id,night\n1,9\n");

        assert_eq!(
            fx.store.artifact_names(&fx.results).unwrap(),
            vec![EDITABLE, "part4_nightsummary_sleep_cleaned_v1.csv"]
        );
    }

    #[tokio::test]
    async fn test_unknown_artifact_is_404() {
        let response = fixture()
            .router
            .oneshot(
                Request::get("/api/v1/artifacts/nope/content")
                    .header(IDENTITY_HEADER, USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_mapping() {
        let conflict = AppError::from(Error::VersionConflict {
            base_filename: "data.csv".into(),
            attempts: 5,
            last_name: "data_v9.csv".into(),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(Error::unavailable("drive down")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(Error::InvalidPath("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
