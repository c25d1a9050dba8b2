use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{delete, get, post, put},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser, Sessions, User, authenticate};
use crate::config::Config;
use crate::error::{ApiError, ApiErrorWithMeta, E_BAD_CREDENTIALS, E_CONFIRMATION_REQUIRED};
use crate::import::ParsedCampaign;
use crate::report::{ALL_PLATFORMS, FinancialReport, ReportFilter};
use crate::responses::{ApiOk, RequestMeta, meta_middleware};
use crate::store::Store;
use crate::types::{AdCampaign, AdCampaignInput, Course, CourseInput, Round, RoundInput, Sale, SaleInput};
use crate::{GOVERNORATES, PAYMENT_METHODS, PLATFORMS, PaymentMethodOption};

/// The application state.
#[derive(Clone)]
pub struct AppState {
    /// Courses, sales and ad spend.
    pub store: Arc<Mutex<Store>>,
    /// Logged-in users by token.
    pub sessions: Arc<Sessions>,
    /// The application configuration.
    pub config: Config,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            sessions: Arc::new(Sessions::new(config.session_ttl())),
            config,
        }
    }
}

/// The login form.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// The response after a successful login.
#[derive(Serialize)]
pub struct LoginResponse {
    /// Bearer token for later requests.
    pub token: Uuid,
    pub user: User,
}

/// Choices offered by the sale and campaign forms.
#[derive(Serialize)]
pub struct OptionsResponse {
    pub platforms: Vec<&'static str>,
    pub payment_methods: Vec<PaymentMethodOption>,
    pub governorates: Vec<&'static str>,
}

/// A sale with its course and round resolved to display labels.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    #[serde(flatten)]
    pub sale: Sale,
    pub course_name: String,
    pub round_name: String,
}

/// An ad campaign with its course resolved to a display label.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCampaignView {
    #[serde(flatten)]
    pub ad: AdCampaign,
    pub course_name: String,
}

#[derive(Deserialize)]
pub struct SalesQuery {
    pub course_id: Option<String>,
    #[serde(default)]
    pub search: String,
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub platform: Option<String>,
}

/// Destructive calls must carry `?confirm=true`.
#[derive(Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
pub struct DiscardResponse {
    pub discarded: usize,
}

pub fn init_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(me_handler))
        .route("/options", get(options_handler))
        .route("/courses", get(list_courses_handler).post(add_course_handler))
        .route("/courses/{id}", delete(delete_course_handler))
        .route("/courses/{id}/rounds", post(add_round_handler))
        .route("/courses/{id}/rounds/{round_id}", delete(delete_round_handler))
        .route("/sales", get(list_sales_handler).post(add_sale_handler))
        .route("/sales/installments", get(installments_handler))
        .route("/sales/{id}", put(edit_sale_handler).delete(delete_sale_handler))
        .route("/sales/{id}/withdraw", post(withdraw_sale_handler))
        .route("/ads", get(list_ads_handler).post(add_ad_handler))
        .route("/ads/{id}", delete(delete_ad_handler))
        .route("/ads/import", delete(discard_import_handler))
        .route("/ads/import/preview", post(preview_import_handler))
        .route("/ads/import/confirm", post(confirm_import_handler))
        .route("/reports/financial", get(report_handler))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(meta_middleware))
}

fn require_confirmation(q: &ConfirmQuery, meta: &RequestMeta) -> Result<(), ApiErrorWithMeta> {
    if q.confirm {
        return Ok(());
    }
    Err(ApiError::BadRequest("add ?confirm=true to perform this action".into())
        .with_meta(meta.clone())
        .with_code(E_CONFIRMATION_REQUIRED))
}

fn sale_view(store: &Store, sale: &Sale) -> SaleView {
    SaleView {
        sale: sale.clone(),
        course_name: store.course_label(&sale.course_id).to_string(),
        round_name: store.round_label(&sale.course_id, &sale.round_id).to_string(),
    }
}

// --- auth ---

async fn login_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<LoginRequest>,
) -> Result<ApiOk<LoginResponse>, ApiErrorWithMeta> {
    let user = authenticate(&req.username, &req.password).ok_or_else(|| {
        ApiError::Unauthorized("invalid username or password".into())
            .with_meta(meta.clone())
            .with_code(E_BAD_CREDENTIALS)
    })?;
    let token = st.sessions.open(user.clone()).await;
    info!(username = %user.username, "logged in");

    Ok(ApiOk::ok("logged in", LoginResponse { token, user }, meta))
}

async fn logout_handler(
    State(st): State<AppState>,
    current: CurrentUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<User> {
    st.sessions.close(&current.token).await;
    info!(username = %current.user.username, "logged out");
    ApiOk::ok("logged out", current.user, meta)
}

async fn me_handler(current: CurrentUser, Extension(meta): Extension<RequestMeta>) -> ApiOk<User> {
    ApiOk::ok("session active", current.user, meta)
}

async fn options_handler(_: CurrentUser, Extension(meta): Extension<RequestMeta>) -> ApiOk<OptionsResponse> {
    ApiOk::ok(
        "form options",
        OptionsResponse {
            platforms: PLATFORMS.to_vec(),
            payment_methods: PAYMENT_METHODS.to_vec(),
            governorates: GOVERNORATES.to_vec(),
        },
        meta,
    )
}

// --- catalog ---

async fn list_courses_handler(
    State(st): State<AppState>,
    _: CurrentUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<Vec<Course>> {
    let store = st.store.lock().await;
    ApiOk::list("courses fetched", store.courses().to_vec(), meta)
}

async fn add_course_handler(
    State(st): State<AppState>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<CourseInput>,
) -> Result<ApiOk<Course>, ApiErrorWithMeta> {
    let course = st
        .store
        .lock()
        .await
        .add_course(req)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::created("course created", course, meta))
}

async fn delete_course_handler(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ConfirmQuery>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Course>, ApiErrorWithMeta> {
    require_confirmation(&q, &meta)?;
    let course = st
        .store
        .lock()
        .await
        .delete_course(&id)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::ok("course deleted", course, meta))
}

async fn add_round_handler(
    State(st): State<AppState>,
    Path(id): Path<String>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<RoundInput>,
) -> Result<ApiOk<Round>, ApiErrorWithMeta> {
    let round = st
        .store
        .lock()
        .await
        .add_round(&id, req)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::created("round created", round, meta))
}

async fn delete_round_handler(
    State(st): State<AppState>,
    Path((id, round_id)): Path<(String, String)>,
    Query(q): Query<ConfirmQuery>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Round>, ApiErrorWithMeta> {
    require_confirmation(&q, &meta)?;
    let round = st
        .store
        .lock()
        .await
        .delete_round(&id, &round_id)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::ok("round deleted", round, meta))
}

// --- sales ---

async fn add_sale_handler(
    State(st): State<AppState>,
    current: CurrentUser,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<SaleInput>,
) -> Result<ApiOk<SaleView>, ApiErrorWithMeta> {
    let mut store = st.store.lock().await;
    let sale = store
        .add_sale(req)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    info!(sale_id = sale.id, by = %current.user.username, "sale created");
    Ok(ApiOk::created("sale created", sale_view(&store, &sale), meta))
}

async fn list_sales_handler(
    State(st): State<AppState>,
    Query(q): Query<SalesQuery>,
    _: CurrentUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<Vec<SaleView>> {
    let store = st.store.lock().await;
    let course_id = q.course_id.as_deref().filter(|c| !c.is_empty());
    let sales = store
        .list_sales(course_id, q.search.trim())
        .into_iter()
        .map(|s| sale_view(&store, s))
        .collect();
    ApiOk::list("sales fetched", sales, meta)
}

async fn installments_handler(
    State(st): State<AppState>,
    _: CurrentUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<Vec<SaleView>> {
    let store = st.store.lock().await;
    let sales = store
        .installments()
        .into_iter()
        .map(|s| sale_view(&store, s))
        .collect();
    ApiOk::list("installments fetched", sales, meta)
}

async fn edit_sale_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<SaleInput>,
) -> Result<ApiOk<SaleView>, ApiErrorWithMeta> {
    let mut store = st.store.lock().await;
    let sale = store
        .edit_sale(id, req)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::ok("sale updated", sale_view(&store, &sale), meta))
}

async fn withdraw_sale_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<ConfirmQuery>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Sale>, ApiErrorWithMeta> {
    require_confirmation(&q, &meta)?;
    let sale = st
        .store
        .lock()
        .await
        .withdraw_sale(id)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::ok("sale withdrawn", sale, meta))
}

async fn delete_sale_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<ConfirmQuery>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Sale>, ApiErrorWithMeta> {
    require_confirmation(&q, &meta)?;
    let sale = st
        .store
        .lock()
        .await
        .delete_sale(id)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::ok("sale deleted", sale, meta))
}

// --- ad spend ---

async fn list_ads_handler(
    State(st): State<AppState>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<Vec<AdCampaignView>> {
    let store = st.store.lock().await;
    let ads = store
        .ads()
        .iter()
        .map(|a| AdCampaignView {
            ad: a.clone(),
            course_name: store.course_label(&a.course_id).to_string(),
        })
        .collect();
    ApiOk::list("ad campaigns fetched", ads, meta)
}

async fn add_ad_handler(
    State(st): State<AppState>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<AdCampaignInput>,
) -> Result<ApiOk<AdCampaign>, ApiErrorWithMeta> {
    let ad = st
        .store
        .lock()
        .await
        .add_ad_campaign(req)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::created("ad campaign created", ad, meta))
}

async fn delete_ad_handler(
    State(st): State<AppState>,
    Path(id): Path<f64>,
    Query(q): Query<ConfirmQuery>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<AdCampaign>, ApiErrorWithMeta> {
    require_confirmation(&q, &meta)?;
    let ad = st
        .store
        .lock()
        .await
        .delete_ad_campaign(id)
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::ok("ad campaign deleted", ad, meta))
}

async fn preview_import_handler(
    State(st): State<AppState>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<ImportRequest>,
) -> ApiOk<Vec<ParsedCampaign>> {
    let mut store = st.store.lock().await;
    let staged = store.stage_ad_import(&req.text).to_vec();
    ApiOk::list("import staged", staged, meta)
}

async fn confirm_import_handler(
    State(st): State<AppState>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Vec<AdCampaign>>, ApiErrorWithMeta> {
    let imported = st
        .store
        .lock()
        .await
        .confirm_ad_import()
        .map_err(|e| ApiError::from_dashboard(e, meta.clone()))?;
    Ok(ApiOk::list("import saved", imported, meta))
}

async fn discard_import_handler(
    State(st): State<AppState>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<DiscardResponse> {
    let discarded = st.store.lock().await.discard_ad_import();
    ApiOk::ok("import discarded", DiscardResponse { discarded }, meta)
}

// --- reporting ---

async fn report_handler(
    State(st): State<AppState>,
    Query(q): Query<ReportQuery>,
    _: AdminUser,
    Extension(meta): Extension<RequestMeta>,
) -> ApiOk<FinancialReport> {
    let defaults = ReportFilter::month_to_date(Utc::now().date_naive());
    let filter = ReportFilter {
        start: q.start.unwrap_or(defaults.start),
        end: q.end.unwrap_or(defaults.end),
        platform: q
            .platform
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| ALL_PLATFORMS.to_string()),
    };
    let report = st.store.lock().await.report(&filter, st.config.roas_precision);
    ApiOk::ok("report computed", report, meta)
}
