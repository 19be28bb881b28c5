//! HANS Management Interface REST server.
//!
//! ## Purpose
//! Administrative backend for the Hospital Activity Notification Service:
//! registered managers, care-provider locations, care recipients, bulk CSV
//! import, and the pseudonymized search endpoint used by downstream systems.
//!
//! ## Surfaces
//! - `POST /care-provider-location/_search`: resolve a pseudonymized
//!   care-recipient identifier to the owning location's name. Failures are
//!   FHIR OperationOutcome envelopes.
//! - `/admin/*`: JSON CRUD plus multipart CSV import, guarded by an
//!   `x-api-key` header when `HANS_ADMIN_API_KEY` is configured.
//! - `/swagger-ui`: OpenAPI documentation.

use axum::{
    extract::{Multipart, Path as AxumPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use hans_core::constants::DEFAULT_REGISTRY_DATA_DIR;
use hans_core::{
    pseudonym_salt_from_env_value, Actor, CareRecipientData, CoreConfig, CsvImportService,
    HttpSubscriptionClient, ImportError, LocalSubscriptionIssuer, LocationService, ManagerService,
    NewCareProviderLocation, NewCareRecipient, NewRegisteredManager, OrganizationData,
    PractitionerData, RecipientService, RegistryError, SubscriptionService,
};
use hans_fhir::{IssueCode, OperationOutcome};
use hans_types::{EmailAddress, NonEmptyText};
use hans_uuid::RecordUuid;

/// Application state shared across REST API handlers.
///
/// Resolved once at startup; request handlers never read environment
/// variables.
#[derive(Clone)]
struct AppState {
    cfg: Arc<CoreConfig>,
    subscriptions: Arc<dyn SubscriptionService>,
    actor: Actor,
    admin_api_key: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        care_provider_search,
        create_registered_manager,
        list_registered_managers,
        create_care_provider_location,
        list_care_provider_locations,
        list_location_care_recipients,
        import_care_recipients,
        create_care_recipient,
        care_recipient_detail,
    ),
    components(schemas(
        HealthRes,
        SearchRes,
        CreateManagerReq,
        ManagerRes,
        ListManagersRes,
        CreateLocationReq,
        LocationRes,
        ListLocationsRes,
        CreateCareRecipientReq,
        CareRecipientRes,
        ListCareRecipientsRes,
        ImportRes,
        ErrorRes,
    ))
)]
struct ApiDoc;

/// Main entry point for the HANS management interface.
///
/// # Environment Variables
/// - `HANS_REST_ADDR`: server address (default: "0.0.0.0:3000")
/// - `REGISTRY_DATA_DIR`: registry storage directory (default: "registry_data")
/// - `HANS_PSEUDONYM_SALT`: salt for pseudonym derivation (default: development salt)
/// - `HANS_ADMIN_API_KEY`: when set, required in `x-api-key` on `/admin/*`
/// - `HANS_SUBSCRIPTIONS_URL`: external subscription endpoint; when unset,
///   subscription IDs are issued locally
/// - `HANS_ADMIN_NAME` / `HANS_ADMIN_EMAIL`: actor recorded in record history
///
/// # Errors
/// Returns an error if the logging configuration cannot be initialised, the
/// configuration is invalid, or the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hans_run=info".parse()?)
                .add_directive("hans_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("HANS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("REGISTRY_DATA_DIR")
        .unwrap_or_else(|_| DEFAULT_REGISTRY_DATA_DIR.into());
    let salt = pseudonym_salt_from_env_value(std::env::var("HANS_PSEUDONYM_SALT").ok())?;
    let cfg = Arc::new(CoreConfig::new(PathBuf::from(&data_dir), salt));

    let actor = Actor::new(
        std::env::var("HANS_ADMIN_NAME").unwrap_or_else(|_| "HANS Administrator".into()),
        std::env::var("HANS_ADMIN_EMAIL").unwrap_or_else(|_| "admin@hans.nhs.uk".into()),
    )?;

    let subscriptions: Arc<dyn SubscriptionService> =
        match std::env::var("HANS_SUBSCRIPTIONS_URL") {
            Ok(url) if !url.trim().is_empty() => Arc::new(HttpSubscriptionClient::new(url)),
            _ => {
                tracing::warn!(
                    "HANS_SUBSCRIPTIONS_URL not set; issuing subscription IDs locally"
                );
                Arc::new(LocalSubscriptionIssuer)
            }
        };

    let admin_api_key = std::env::var("HANS_ADMIN_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    if admin_api_key.is_none() {
        tracing::warn!("HANS_ADMIN_API_KEY not set; admin endpoints are unauthenticated");
    }

    tracing::info!("-- Starting HANS management interface on {}", addr);

    let state = AppState {
        cfg,
        subscriptions,
        actor,
        admin_api_key,
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Builds the application router.
fn app(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/registered-managers",
            post(create_registered_manager).get(list_registered_managers),
        )
        .route(
            "/care-provider-locations",
            post(create_care_provider_location).get(list_care_provider_locations),
        )
        .route(
            "/care-provider-locations/:id/care-recipients",
            get(list_location_care_recipients),
        )
        .route(
            "/care-provider-locations/:id/import-care-recipients",
            post(import_care_recipients),
        )
        .route("/care-recipients", post(create_care_recipient))
        .route("/care-recipients/:id", get(care_recipient_detail))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .route(
            "/care-provider-location/_search",
            post(care_provider_search).fallback(search_method_not_allowed),
        )
        .nest("/admin", admin)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Rejects `/admin/*` requests without the configured API key.
///
/// When no key is configured the guard is a no-op (development mode; a
/// warning is logged at startup).
async fn require_admin_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.admin_api_key {
        let provided = req
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorRes {
                    error: "invalid or missing API key".into(),
                }),
            )
                .into_response();
        }
    }
    next.run(req).await
}

// ============================================================================
// Request/response types
// ============================================================================

#[derive(Serialize, Deserialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ErrorRes {
    error: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct SearchRes {
    name: String,
}

#[derive(Deserialize)]
struct SearchForm {
    #[serde(rename = "_careRecipientPseudoId", default)]
    pseudo_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct CreateManagerReq {
    given_name: String,
    family_name: String,
    cqc_registered_manager_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ManagerRes {
    id: String,
    given_name: String,
    family_name: String,
    cqc_registered_manager_id: String,
}

impl From<PractitionerData> for ManagerRes {
    fn from(data: PractitionerData) -> Self {
        Self {
            id: data.id.to_string(),
            given_name: data.given_name,
            family_name: data.family_name,
            cqc_registered_manager_id: data.cqc_registered_manager_id,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ListManagersRes {
    managers: Vec<ManagerRes>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct CreateLocationReq {
    name: String,
    email: String,
    ods_code: String,
    cqc_location_id: String,
    manager_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct LocationRes {
    id: String,
    name: String,
    email: String,
    ods_code: String,
    cqc_location_id: String,
    manager_id: String,
}

impl From<OrganizationData> for LocationRes {
    fn from(data: OrganizationData) -> Self {
        Self {
            id: data.id.to_string(),
            name: data.name,
            email: data.email,
            ods_code: data.ods_code,
            cqc_location_id: data.cqc_location_id,
            manager_id: data.manager_id.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ListLocationsRes {
    locations: Vec<LocationRes>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct CreateCareRecipientReq {
    location_id: String,
    /// Plaintext NHS number; hashed during creation and never stored.
    nhs_number: String,
    provider_reference_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct CareRecipientRes {
    id: String,
    nhs_number_hash: String,
    subscription_id: String,
    provider_reference_id: String,
    location_id: String,
}

impl From<CareRecipientData> for CareRecipientRes {
    fn from(data: CareRecipientData) -> Self {
        Self {
            id: data.id.to_string(),
            nhs_number_hash: data.nhs_number_hash.to_string(),
            subscription_id: data.subscription_id,
            provider_reference_id: data.provider_reference_id,
            location_id: data.location_id.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ListCareRecipientsRes {
    care_recipients: Vec<CareRecipientRes>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ImportRes {
    messages: Vec<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Maps a registry error to the HTTP status of the admin surface.
fn registry_error_status(e: &RegistryError) -> StatusCode {
    match e {
        RegistryError::DuplicateManagerId(_) | RegistryError::DuplicatePseudonym => {
            StatusCode::CONFLICT
        }
        RegistryError::UnknownManager(_) | RegistryError::UnknownLocation(_) => {
            StatusCode::NOT_FOUND
        }
        RegistryError::InvalidInput(_)
        | RegistryError::InvalidNhsNumber
        | RegistryError::Uuid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn registry_error_response(context: &str, e: RegistryError) -> Response {
    let status = registry_error_status(&e);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("{} error: {:?}", context, e);
        return (
            status,
            Json(ErrorRes {
                error: "Internal error".into(),
            }),
        )
            .into_response();
    }
    (
        status,
        Json(ErrorRes {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn bad_id_response(e: hans_uuid::UuidError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorRes {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn outcome_response(status: StatusCode, code: IssueCode, diagnostics: &str) -> Response {
    (status, Json(OperationOutcome::error(code, diagnostics))).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "HANS management interface is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/care-provider-location/_search",
    responses(
        (status = 200, description = "Owning care provider location", body = SearchRes),
        (status = 400, description = "Missing _careRecipientPseudoId parameter"),
        (status = 404, description = "No care recipient matches the identifier"),
        (status = 405, description = "Method not allowed")
    )
)]
/// Resolves a pseudonymized care-recipient identifier to a location name.
///
/// Accepts a form-encoded body carrying `_careRecipientPseudoId`. All
/// failures are FHIR OperationOutcome envelopes with a machine-readable
/// issue code.
async fn care_provider_search(
    State(state): State<AppState>,
    form: Option<Form<SearchForm>>,
) -> Response {
    let pseudo_id = form
        .and_then(|Form(f)| f.pseudo_id)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let Some(pseudo_id) = pseudo_id else {
        return outcome_response(
            StatusCode::BAD_REQUEST,
            IssueCode::Required,
            "_careRecipientPseudoId is required",
        );
    };

    let recipients = RecipientService::new(state.cfg.clone());
    let Some(recipient) = recipients.find_by_pseudonym(&pseudo_id) else {
        return outcome_response(
            StatusCode::NOT_FOUND,
            IssueCode::NotFound,
            "no care recipient matches the supplied identifier",
        );
    };

    let locations = LocationService::new(state.cfg.clone());
    match locations.get(&recipient.location_id) {
        Ok(Some(location)) => (
            StatusCode::OK,
            Json(SearchRes {
                name: location.name,
            }),
        )
            .into_response(),
        Ok(None) => {
            tracing::warn!(
                "care recipient {} references missing location {}",
                recipient.id,
                recipient.location_id
            );
            outcome_response(
                StatusCode::NOT_FOUND,
                IssueCode::NotFound,
                "no care provider location matches the supplied identifier",
            )
        }
        Err(e) => {
            tracing::error!("Search location lookup error: {:?}", e);
            outcome_response(
                StatusCode::NOT_FOUND,
                IssueCode::NotFound,
                "no care provider location matches the supplied identifier",
            )
        }
    }
}

/// Fallback for disallowed HTTP methods on the search endpoint.
async fn search_method_not_allowed() -> Response {
    outcome_response(
        StatusCode::METHOD_NOT_ALLOWED,
        IssueCode::NotAllowed,
        "method not allowed; use POST",
    )
}

#[utoipa::path(
    post,
    path = "/admin/registered-managers",
    request_body = CreateManagerReq,
    responses(
        (status = 201, description = "Registered manager created", body = ManagerRes),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "CQC registered-manager ID already in use"),
        (status = 500, description = "Internal server error")
    )
)]
/// Creates a registered manager.
async fn create_registered_manager(
    State(state): State<AppState>,
    Json(req): Json<CreateManagerReq>,
) -> Response {
    let new = match (
        NonEmptyText::new(&req.given_name),
        NonEmptyText::new(&req.family_name),
        NonEmptyText::new(&req.cqc_registered_manager_id),
    ) {
        (Ok(given_name), Ok(family_name), Ok(cqc_registered_manager_id)) => NewRegisteredManager {
            given_name,
            family_name,
            cqc_registered_manager_id,
        },
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorRes {
                    error: "given_name, family_name and cqc_registered_manager_id are required"
                        .into(),
                }),
            )
                .into_response();
        }
    };

    let service = ManagerService::new(state.cfg.clone());
    match service.create(&state.actor, new) {
        Ok(manager) => (StatusCode::CREATED, Json(ManagerRes::from(manager))).into_response(),
        Err(e) => registry_error_response("Create registered manager", e),
    }
}

#[utoipa::path(
    get,
    path = "/admin/registered-managers",
    responses(
        (status = 200, description = "List of registered managers", body = ListManagersRes)
    )
)]
/// Lists all registered managers.
async fn list_registered_managers(State(state): State<AppState>) -> Json<ListManagersRes> {
    let managers = ManagerService::new(state.cfg.clone())
        .list()
        .into_iter()
        .map(ManagerRes::from)
        .collect();
    Json(ListManagersRes { managers })
}

#[utoipa::path(
    post,
    path = "/admin/care-provider-locations",
    request_body = CreateLocationReq,
    responses(
        (status = 201, description = "Care provider location created", body = LocationRes),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Registered manager not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Creates a care provider location under an existing registered manager.
async fn create_care_provider_location(
    State(state): State<AppState>,
    Json(req): Json<CreateLocationReq>,
) -> Response {
    let manager_id = match RecordUuid::parse(&req.manager_id) {
        Ok(id) => id,
        Err(e) => return bad_id_response(e),
    };
    let email = match EmailAddress::parse(&req.email) {
        Ok(email) => email,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorRes {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };
    let new = match (
        NonEmptyText::new(&req.name),
        NonEmptyText::new(&req.ods_code),
        NonEmptyText::new(&req.cqc_location_id),
    ) {
        (Ok(name), Ok(ods_code), Ok(cqc_location_id)) => NewCareProviderLocation {
            name,
            email,
            ods_code,
            cqc_location_id,
            manager_id,
        },
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorRes {
                    error: "name, ods_code and cqc_location_id are required".into(),
                }),
            )
                .into_response();
        }
    };

    let service = LocationService::new(state.cfg.clone());
    match service.create(&state.actor, new) {
        Ok(location) => (StatusCode::CREATED, Json(LocationRes::from(location))).into_response(),
        Err(e) => registry_error_response("Create care provider location", e),
    }
}

#[utoipa::path(
    get,
    path = "/admin/care-provider-locations",
    responses(
        (status = 200, description = "List of care provider locations", body = ListLocationsRes)
    )
)]
/// Lists all care provider locations.
async fn list_care_provider_locations(State(state): State<AppState>) -> Json<ListLocationsRes> {
    let locations = LocationService::new(state.cfg.clone())
        .list()
        .into_iter()
        .map(LocationRes::from)
        .collect();
    Json(ListLocationsRes { locations })
}

#[utoipa::path(
    get,
    path = "/admin/care-provider-locations/{id}/care-recipients",
    responses(
        (status = 200, description = "Care recipients at this location", body = ListCareRecipientsRes),
        (status = 400, description = "Invalid location identifier")
    )
)]
/// Lists the care recipients registered at one location.
///
/// The payload carries identifiers only; care-recipient records have no
/// demographic fields to expose.
async fn list_location_care_recipients(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let location_id = match RecordUuid::parse(&id) {
        Ok(id) => id,
        Err(e) => return bad_id_response(e),
    };

    let care_recipients = RecipientService::new(state.cfg.clone())
        .list_for_location(&location_id)
        .into_iter()
        .map(CareRecipientRes::from)
        .collect();
    (
        StatusCode::OK,
        Json(ListCareRecipientsRes { care_recipients }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/admin/care-provider-locations/{id}/import-care-recipients",
    responses(
        (status = 200, description = "Import completed; messages report counts", body = ImportRes),
        (status = 400, description = "Upload rejected; messages carry the reason", body = ImportRes),
        (status = 404, description = "Care provider location not found", body = ImportRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Bulk-imports care recipients from a multipart CSV upload (field `csvfile`).
///
/// File-level problems reject the whole upload; row-level problems are
/// accumulated and reported in the completion message without aborting the
/// batch.
async fn import_care_recipients(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    mut multipart: Multipart,
) -> Response {
    let location_id = match RecordUuid::parse(&id) {
        Ok(id) => id,
        Err(e) => return bad_id_response(e),
    };

    let mut upload: Option<Vec<u8>> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("csvfile") {
                    match field.bytes().await {
                        Ok(bytes) => upload = Some(bytes.to_vec()),
                        Err(e) => {
                            tracing::warn!("failed to read csvfile field: {}", e);
                            return import_messages(
                                StatusCode::BAD_REQUEST,
                                ImportError::InvalidOrEmptyFile.to_string(),
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("malformed multipart upload: {}", e);
                return import_messages(
                    StatusCode::BAD_REQUEST,
                    ImportError::InvalidOrEmptyFile.to_string(),
                );
            }
        }
    }

    let Some(upload) = upload else {
        return import_messages(
            StatusCode::BAD_REQUEST,
            ImportError::InvalidOrEmptyFile.to_string(),
        );
    };

    // The import pipeline is synchronous (filesystem, Git, and possibly a
    // blocking HTTP call per row), so it runs on a blocking task.
    let cfg = state.cfg.clone();
    let subscriptions = state.subscriptions.clone();
    let actor = state.actor.clone();
    let result = tokio::task::spawn_blocking(move || {
        let import = CsvImportService::new(cfg, subscriptions.as_ref());
        import.import(&actor, &location_id, &upload)
    })
    .await;

    match result {
        Ok(Ok(summary)) => import_messages(StatusCode::OK, summary.message()),
        Ok(Err(
            e @ (ImportError::InvalidOrEmptyFile
            | ImportError::CorruptedOrBinaryFile
            | ImportError::InvalidColumnSet),
        )) => import_messages(StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Err(e @ ImportError::UnknownLocation(_))) => {
            import_messages(StatusCode::NOT_FOUND, e.to_string())
        }
        Ok(Err(ImportError::Registry(e))) => {
            tracing::error!("Import error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Internal error".into(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Import task panicked: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Internal error".into(),
                }),
            )
                .into_response()
        }
    }
}

fn import_messages(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ImportRes {
            messages: vec![message],
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/admin/care-recipients",
    request_body = CreateCareRecipientReq,
    responses(
        (status = 201, description = "Care recipient created", body = CareRecipientRes),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Care provider location not found"),
        (status = 409, description = "Pseudonymized identifier already registered"),
        (status = 500, description = "Internal server error")
    )
)]
/// Creates a single care recipient directly.
///
/// The supplied NHS number is validated, hashed, and discarded; exactly one
/// subscription is created for the new record.
async fn create_care_recipient(
    State(state): State<AppState>,
    Json(req): Json<CreateCareRecipientReq>,
) -> Response {
    let location_id = match RecordUuid::parse(&req.location_id) {
        Ok(id) => id,
        Err(e) => return bad_id_response(e),
    };
    let provider_reference_id = match NonEmptyText::new(&req.provider_reference_id) {
        Ok(text) => text,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorRes {
                    error: "provider_reference_id is required".into(),
                }),
            )
                .into_response();
        }
    };

    let cfg = state.cfg.clone();
    let subscriptions = state.subscriptions.clone();
    let actor = state.actor.clone();
    let nhs_number = req.nhs_number;
    let result = tokio::task::spawn_blocking(move || {
        let hash = hans_core::derive_pseudonym(cfg.pseudonym_salt(), &nhs_number)?;
        let subscription_id = subscriptions.create_subscription(&hash)?;
        RecipientService::new(cfg).create(
            &actor,
            NewCareRecipient {
                location_id,
                nhs_number,
                provider_reference_id,
                subscription_id,
            },
        )
    })
    .await;

    match result {
        Ok(Ok(recipient)) => {
            (StatusCode::CREATED, Json(CareRecipientRes::from(recipient))).into_response()
        }
        Ok(Err(e)) => registry_error_response("Create care recipient", e),
        Err(e) => {
            tracing::error!("Create care recipient task panicked: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Internal error".into(),
                }),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/care-recipients/{id}",
    responses(
        (status = 200, description = "Care recipient detail", body = CareRecipientRes),
        (status = 400, description = "Invalid identifier"),
        (status = 404, description = "Care recipient not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Care-recipient detail view.
///
/// Returns identifiers only: the pseudonym hash, subscription correlation
/// ID, provider reference, and owning location. Demographic values supplied
/// at import time are not stored and can never appear here.
async fn care_recipient_detail(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let recipient_id = match RecordUuid::parse(&id) {
        Ok(id) => id,
        Err(e) => return bad_id_response(e),
    };

    match RecipientService::new(state.cfg.clone()).get(&recipient_id) {
        Ok(Some(recipient)) => {
            (StatusCode::OK, Json(CareRecipientRes::from(recipient))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorRes {
                error: "care recipient not found".into(),
            }),
        )
            .into_response(),
        Err(e) => registry_error_response("Care recipient detail", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use hans_uuid::Sha256Hash;
    use http_body_util::BodyExt;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    const VALID_NHS_NUMBER: &str = "9434765919";

    const VALID_CSV: &str = "\
nhs_number,given_name,family_name,birth_date,provider_reference_id
9434765919,Sarah,Williams,1992-03-20,AX812938
9434765870,John,Smith,1985-06-20,AX812939
9434765862,Alice,Jones,,AX812940
";

    /// Counts subscription calls so tests can assert the one-per-row rule.
    #[derive(Default)]
    struct CountingSubscriptions {
        calls: AtomicUsize,
    }

    impl CountingSubscriptions {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SubscriptionService for CountingSubscriptions {
        fn create_subscription(
            &self,
            _pseudo_id: &Sha256Hash,
        ) -> Result<Uuid, hans_core::SubscriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Uuid::new_v4())
        }
    }

    fn test_actor() -> Actor {
        Actor::new("Test Administrator", "admin@example.com").expect("valid actor")
    }

    fn test_state(
        data_dir: &Path,
        subscriptions: Arc<dyn SubscriptionService>,
        admin_api_key: Option<String>,
    ) -> AppState {
        let salt = NonEmptyText::new("test-salt").expect("valid salt");
        AppState {
            cfg: Arc::new(CoreConfig::new(data_dir.to_path_buf(), salt)),
            subscriptions,
            actor: test_actor(),
            admin_api_key,
        }
    }

    fn create_location(state: &AppState) -> RecordUuid {
        let manager_id = ManagerService::new(state.cfg.clone())
            .create(
                &test_actor(),
                NewRegisteredManager {
                    given_name: NonEmptyText::new("Jehosephat").expect("valid name"),
                    family_name: NonEmptyText::new("McGibbons").expect("valid name"),
                    cqc_registered_manager_id: NonEmptyText::new("1-000000001")
                        .expect("valid id"),
                },
            )
            .expect("manager create should succeed")
            .id;

        LocationService::new(state.cfg.clone())
            .create(
                &test_actor(),
                NewCareProviderLocation {
                    name: NonEmptyText::new("My Location Name").expect("valid name"),
                    email: EmailAddress::parse("nosuchaddress@nhs.net").expect("valid email"),
                    ods_code: NonEmptyText::new("V81999").expect("valid code"),
                    cqc_location_id: NonEmptyText::new("1-100000001").expect("valid id"),
                    manager_id,
                },
            )
            .expect("location create should succeed")
            .id
    }

    fn create_recipient(state: &AppState, location_id: RecordUuid) -> hans_core::CareRecipientData {
        RecipientService::new(state.cfg.clone())
            .create(
                &test_actor(),
                NewCareRecipient {
                    location_id,
                    nhs_number: VALID_NHS_NUMBER.to_owned(),
                    provider_reference_id: NonEmptyText::new("AX812938")
                        .expect("valid reference"),
                    subscription_id: Uuid::new_v4(),
                },
            )
            .expect("recipient create should succeed")
    }

    async fn send(state: AppState, request: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(state)
            .oneshot(request)
            .await
            .expect("request should complete");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, json)
    }

    fn search_request(pseudo_id: Option<&str>) -> HttpRequest<Body> {
        let body = match pseudo_id {
            Some(id) => format!("_careRecipientPseudoId={id}"),
            None => String::new(),
        };
        HttpRequest::builder()
            .method("POST")
            .uri("/care-provider-location/_search")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request should build")
    }

    fn multipart_request(uri: &str, csv: &[u8]) -> HttpRequest<Body> {
        let boundary = "hans-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"csvfile\"; \
                 filename=\"patients_test_data.csv\"\r\nContent-Type: text/csv\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(csv);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request should build")
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);

        let request = HttpRequest::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request should build");
        let (status, json) = send(state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn successful_search_returns_location_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);
        let location_id = create_location(&state);
        let recipient = create_recipient(&state, location_id);

        let (status, json) = send(
            state,
            search_request(Some(recipient.nhs_number_hash.as_str())),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "My Location Name");
    }

    #[tokio::test]
    async fn search_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);
        let location_id = create_location(&state);
        create_recipient(&state, location_id);

        let (status, json) = send(state, search_request(Some("not_existing_id"))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["issue"][0]["code"], "not-found");
    }

    #[tokio::test]
    async fn search_missing_param_returns_bad_request() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);

        let (status, json) = send(state, search_request(None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["issue"][0]["code"], "required");
    }

    #[tokio::test]
    async fn search_get_method_not_allowed() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/care-provider-location/_search?_careRecipientPseudoId=abc")
            .body(Body::empty())
            .expect("request should build");
        let (status, json) = send(state, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["issue"][0]["code"], "not-allowed");
    }

    #[tokio::test]
    async fn admin_upload_csv_file_successfully() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let subscriptions = Arc::new(CountingSubscriptions::default());
        let state = test_state(temp_dir.path(), subscriptions.clone(), None);
        let location_id = create_location(&state);

        let uri = format!("/admin/care-provider-locations/{location_id}/import-care-recipients");
        let (status, json) = send(
            state.clone(),
            multipart_request(&uri, VALID_CSV.as_bytes()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let messages = json["messages"][0].as_str().expect("message should exist");
        assert!(messages.contains("File imported successfully"));
        assert!(!messages.contains("error(s)"));
        assert_eq!(subscriptions.calls(), 3);
        assert_eq!(RecipientService::new(state.cfg.clone()).list().len(), 3);
    }

    #[tokio::test]
    async fn admin_upload_csv_file_with_broken_rows() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let subscriptions = Arc::new(CountingSubscriptions::default());
        let state = test_state(temp_dir.path(), subscriptions.clone(), None);
        let location_id = create_location(&state);

        let csv = "\
nhs_number,given_name,family_name,birth_date,provider_reference_id
9434765919,Sarah,Williams,1992-03-20,AX812938
9434765918,Broken,Row,1990-01-01,AX812939
9434765870,John,Smith,1985-06-20,AX812940
";
        let uri = format!("/admin/care-provider-locations/{location_id}/import-care-recipients");
        let (status, json) = send(state.clone(), multipart_request(&uri, csv.as_bytes())).await;

        assert_eq!(status, StatusCode::OK);
        let messages = json["messages"][0].as_str().expect("message should exist");
        assert!(messages.contains("File imported successfully"));
        assert!(messages.contains("error(s)"));
        assert_eq!(subscriptions.calls(), 2);
        assert_eq!(RecipientService::new(state.cfg.clone()).list().len(), 2);
    }

    #[tokio::test]
    async fn admin_upload_empty_post_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let subscriptions = Arc::new(CountingSubscriptions::default());
        let state = test_state(temp_dir.path(), subscriptions.clone(), None);
        let location_id = create_location(&state);

        // Multipart body with no csvfile field at all.
        let boundary = "hans-test-boundary";
        let request = HttpRequest::builder()
            .method("POST")
            .uri(format!(
                "/admin/care-provider-locations/{location_id}/import-care-recipients"
            ))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(format!("--{boundary}--\r\n")))
            .expect("request should build");
        let (status, json) = send(state.clone(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["messages"][0], "Invalid or empty file");
        assert!(RecipientService::new(state.cfg.clone()).list().is_empty());
        assert_eq!(subscriptions.calls(), 0);
    }

    #[tokio::test]
    async fn admin_upload_binary_file_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);
        let location_id = create_location(&state);

        let png: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
        let uri = format!("/admin/care-provider-locations/{location_id}/import-care-recipients");
        let (status, json) = send(state.clone(), multipart_request(&uri, png)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["messages"][0], "File is corrupted or binary");
        assert!(RecipientService::new(state.cfg.clone()).list().is_empty());
    }

    #[tokio::test]
    async fn admin_upload_invalid_columns_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);
        let location_id = create_location(&state);

        let csv = "nhs_number,surname,provider_reference_id\n9434765919,Williams,AX812938\n";
        let uri = format!("/admin/care-provider-locations/{location_id}/import-care-recipients");
        let (status, json) = send(state.clone(), multipart_request(&uri, csv.as_bytes())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["messages"][0], "Invalid column set");
        assert!(RecipientService::new(state.cfg.clone()).list().is_empty());
    }

    #[tokio::test]
    async fn admin_upload_unknown_location_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);
        create_location(&state);

        let uri = format!(
            "/admin/care-provider-locations/{}/import-care-recipients",
            RecordUuid::new()
        );
        let (status, _json) = send(state, multipart_request(&uri, VALID_CSV.as_bytes())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn change_view_does_not_display_fields_not_stored_in_database() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(CountingSubscriptions::default()), None);
        let location_id = create_location(&state);

        // Import supplies demographics; the detail view must never echo them.
        let uri = format!("/admin/care-provider-locations/{location_id}/import-care-recipients");
        let (status, _json) = send(
            state.clone(),
            multipart_request(&uri, VALID_CSV.as_bytes()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let recipient = RecipientService::new(state.cfg.clone())
            .list()
            .into_iter()
            .next()
            .expect("recipient should exist");

        let request = HttpRequest::builder()
            .uri(format!("/admin/care-recipients/{}", recipient.id))
            .body(Body::empty())
            .expect("request should build");
        let response = app(state)
            .oneshot(request)
            .await
            .expect("request should complete");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let body_text = String::from_utf8(bytes.to_vec())
            .expect("body should be utf-8")
            .to_lowercase();
        assert!(!body_text.contains("given_name"));
        assert!(!body_text.contains("family_name"));
        assert!(!body_text.contains("birth"));
        assert!(!body_text.contains("sarah"));
        assert!(!body_text.contains("williams"));
        assert!(!body_text.contains("9434765919"));
    }

    #[tokio::test]
    async fn create_manager_endpoint_rejects_duplicates() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(temp_dir.path(), Arc::new(LocalSubscriptionIssuer), None);

        let body = serde_json::json!({
            "given_name": "Jehosephat",
            "family_name": "McGibbons",
            "cqc_registered_manager_id": "1-000000001",
        })
        .to_string();

        let request = |body: String| {
            HttpRequest::builder()
                .method("POST")
                .uri("/admin/registered-managers")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .expect("request should build")
        };

        let (status, json) = send(state.clone(), request(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["given_name"], "Jehosephat");

        let (status, _json) = send(state, request(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn admin_requires_api_key_when_configured() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(
            temp_dir.path(),
            Arc::new(LocalSubscriptionIssuer),
            Some("sekrit".into()),
        );

        let unauthenticated = HttpRequest::builder()
            .uri("/admin/registered-managers")
            .body(Body::empty())
            .expect("request should build");
        let (status, _json) = send(state.clone(), unauthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let authenticated = HttpRequest::builder()
            .uri("/admin/registered-managers")
            .header("x-api-key", "sekrit")
            .body(Body::empty())
            .expect("request should build");
        let (status, json) = send(state.clone(), authenticated).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["managers"].is_array());

        // The search endpoint stays open regardless of the admin key.
        let (status, _json) = send(state, search_request(None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
