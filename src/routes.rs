use std::sync::Arc;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_multipart::Multipart;
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Sha256, Digest};
use utoipa::ToSchema;

use crate::attendance::{self, AttendanceReport, MissingStatusPolicy, Summary};
use crate::auth::Auth;
use crate::builder::{BuilderCommand, FormBuilder};
use crate::calendar::{self, AttendanceGrid, CellStyle};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::*;
use crate::rate_limit::SubmissionLimiter;
use crate::repo::{normalize_payload, Repo};
use crate::storage::{sniff_mime, UploadStore, UploadStoreError};
use crate::validation::{upload_refs, validate_form_payload, validate_submission, FieldError, Issue};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    );
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/forms")
                    .route(web::get().to(list_forms))
                    .route(web::post().to(create_form)),
            )
            // drafts and links before /forms/{id} so they are not taken for ids
            .service(web::resource("/forms/drafts").route(web::get().to(list_drafts)))
            .service(
                web::resource("/forms/drafts/{key}")
                    .route(web::get().to(get_draft))
                    .route(web::put().to(save_draft))
                    .route(web::delete().to(delete_draft)),
            )
            .service(web::resource("/forms/drafts/{key}/commands").route(web::post().to(apply_draft_command)))
            .service(web::resource("/forms/drafts/{key}/publish").route(web::post().to(publish_draft)))
            .service(web::resource("/forms/link/{link}").route(web::get().to(get_public_form)))
            .service(web::resource("/forms/link/{link}/submissions").route(web::post().to(submit_form)))
            .service(
                web::resource("/forms/{id}")
                    .route(web::get().to(get_form))
                    .route(web::put().to(update_form))
                    .route(web::delete().to(delete_form)),
            )
            .service(web::resource("/forms/{id}/share").route(web::get().to(share_form)))
            .service(web::resource("/forms/{id}/submissions").route(web::get().to(list_submissions)))
            .service(web::resource("/students-info/{form_id}").route(web::get().to(students_info)))
            .service(web::resource("/attendance").route(web::get().to(attendance_overview)))
            .service(
                web::resource("/attendance/{form_id}")
                    .route(web::get().to(form_attendance))
                    .route(web::put().to(set_attendance)),
            )
            .service(web::resource("/attendance/{form_id}/calendar").route(web::get().to(attendance_calendar)))
            .service(
                web::resource("/attendance/{form_id}/calendar/cycle").route(web::post().to(cycle_attendance)),
            )
            .service(web::resource("/uploads").route(web::post().to(upload_file)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me))),
    );
    // public fetch route (no /api prefix so file links work directly)
    cfg.route("/uploads/{hash}", web::get().to(get_upload));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub uploads: Arc<dyn UploadStore>,
    pub limiter: SubmissionLimiter,
    pub config: Arc<AppConfig>,
}

impl AppState {
    fn missing_status(&self) -> MissingStatusPolicy {
        self.config.missing_status
    }
}

/// Loads a form the caller owns; other users' forms look missing.
async fn owned_form(data: &AppState, auth: &Auth, id: Id) -> Result<FormDetail, ApiError> {
    let detail = data.repo.get_form(id).await?;
    if detail.form.user_id != auth.user_id() {
        return Err(ApiError::NotFound);
    }
    Ok(detail)
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string()
}

// ---------------- Forms ---------------------------------------------

#[utoipa::path(
    get,
    path = "/api/forms",
    responses(
        (status = 200, description = "Forms owned by the caller", body = [Form]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_forms(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let forms = data.repo.list_forms(auth.user_id()).await?;
    Ok(HttpResponse::Ok().json(forms))
}

#[utoipa::path(
    post,
    path = "/api/forms",
    request_body = FormPayload,
    responses(
        (status = 201, description = "Form created", body = FormDetail),
        (status = 400, description = "Invalid form definition"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_form(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<FormPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = normalize_payload(payload.into_inner());
    validate_form_payload(&payload).map_err(|p| ApiError::validation(&p))?;
    let detail = data.repo.create_form(auth.user_id(), payload).await?;
    tracing::info!(form_id = detail.form.id, fields = detail.fields.len(), "form created");
    Ok(HttpResponse::Created().json(detail))
}

#[utoipa::path(
    get,
    path = "/api/forms/{id}",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 200, description = "Form with fields", body = FormDetail),
        (status = 404, description = "Form not found")
    )
)]
pub async fn get_form(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let detail = owned_form(&data, &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    put,
    path = "/api/forms/{id}",
    request_body = FormPayload,
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 200, description = "Form updated", body = FormDetail),
        (status = 400, description = "Invalid form definition"),
        (status = 404, description = "Form not found")
    )
)]
pub async fn update_form(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<FormPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    owned_form(&data, &auth, id).await?;
    let payload = normalize_payload(payload.into_inner());
    validate_form_payload(&payload).map_err(|p| ApiError::validation(&p))?;
    let detail = data.repo.update_form(id, payload).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/forms/{id}",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 204, description = "Form and everything attached to it deleted"),
        (status = 404, description = "Form not found")
    )
)]
pub async fn delete_form(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    owned_form(&data, &auth, id).await?;
    data.repo.delete_form(id).await?;
    tracing::info!(form_id = id, "form deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShareInfo {
    pub link: String,
    pub path: String,
    /// Absolute URL to encode in a QR code.
    pub url: String,
    #[serde(rename = "type")]
    pub visibility: FormVisibility,
}

#[utoipa::path(
    get,
    path = "/api/forms/{id}/share",
    params(("id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "Share link", body = ShareInfo))
)]
pub async fn share_form(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let path = format!("/forms/{}", form.link);
    let url = format!("{}{}", data.config.frontend_url.trim_end_matches('/'), path);
    Ok(HttpResponse::Ok().json(ShareInfo { link: form.link, path, url, visibility: form.visibility }))
}

#[utoipa::path(
    get,
    path = "/api/forms/{id}/submissions",
    params(("id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "Submissions, oldest first", body = [Submission]))
)]
pub async fn list_submissions(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let subs = data.repo.list_submissions(form.id).await?;
    Ok(HttpResponse::Ok().json(subs))
}

// ---------------- Drafts --------------------------------------------

fn draft_key(raw: String) -> Result<String, ApiError> {
    let ok = !raw.is_empty()
        && raw.len() <= 64
        && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(raw) } else { Err(ApiError::BadRequest("draft key must be 1-64 of [A-Za-z0-9_-]".into())) }
}

fn builder_from(draft: &Draft) -> Result<FormBuilder, ApiError> {
    serde_json::from_value(draft.content.clone()).map_err(|e| {
        log::error!("stored draft {} is unreadable: {e}", draft.key);
        ApiError::Internal
    })
}

fn builder_value(builder: &FormBuilder) -> Result<Value, ApiError> {
    serde_json::to_value(builder).map_err(|_| ApiError::Internal)
}

pub async fn list_drafts(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let drafts = data.repo.list_drafts(auth.user_id()).await?;
    Ok(HttpResponse::Ok().json(drafts))
}

pub async fn get_draft(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let key = draft_key(path.into_inner())?;
    let draft = data.repo.get_draft(auth.user_id(), &key).await?;
    Ok(HttpResponse::Ok().json(draft))
}

#[utoipa::path(
    put,
    path = "/api/forms/drafts/{key}",
    request_body = FormBuilder,
    params(("key" = String, Path, description = "Draft key")),
    responses((status = 200, description = "Draft saved", body = Draft))
)]
pub async fn save_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<FormBuilder>,
) -> Result<HttpResponse, ApiError> {
    let key = draft_key(path.into_inner())?;
    let content = builder_value(&payload)?;
    let draft = data.repo.save_draft(auth.user_id(), &key, content).await?;
    Ok(HttpResponse::Ok().json(draft))
}

pub async fn delete_draft(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let key = draft_key(path.into_inner())?;
    data.repo.delete_draft(auth.user_id(), &key).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/forms/drafts/{key}/commands",
    request_body = BuilderCommand,
    params(("key" = String, Path, description = "Draft key")),
    responses(
        (status = 200, description = "Builder state after the command", body = FormBuilder),
        (status = 400, description = "Command refers to an unknown section or field")
    )
)]
pub async fn apply_draft_command(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<BuilderCommand>,
) -> Result<HttpResponse, ApiError> {
    let key = draft_key(path.into_inner())?;
    let current = match data.repo.get_draft(auth.user_id(), &key).await {
        Ok(draft) => builder_from(&draft)?,
        Err(crate::repo::RepoError::NotFound) => FormBuilder::new(),
        Err(e) => return Err(e.into()),
    };
    let next = current
        .apply(payload.into_inner())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    data.repo.save_draft(auth.user_id(), &key, builder_value(&next)?).await?;
    Ok(HttpResponse::Ok().json(next))
}

#[utoipa::path(
    post,
    path = "/api/forms/drafts/{key}/publish",
    params(("key" = String, Path, description = "Draft key")),
    responses(
        (status = 201, description = "Form created from the draft", body = FormDetail),
        (status = 400, description = "Draft is not publishable"),
        (status = 404, description = "Draft not found")
    )
)]
pub async fn publish_draft(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let key = draft_key(path.into_inner())?;
    let draft = data.repo.get_draft(auth.user_id(), &key).await?;
    let builder = builder_from(&draft)?;
    let payload = builder.to_payload().map_err(|p| ApiError::validation(&p))?;
    let payload = normalize_payload(payload);
    validate_form_payload(&payload).map_err(|p| ApiError::validation(&p))?;
    let detail = data.repo.create_form(auth.user_id(), payload).await?;
    // the form is stored; a leftover draft is only logged
    if let Err(e) = data.repo.delete_draft(auth.user_id(), &key).await {
        tracing::warn!(form_id = detail.form.id, draft = %key, "draft kept after publish: {e}");
    }
    tracing::info!(form_id = detail.form.id, draft = %key, "draft published");
    Ok(HttpResponse::Created().json(detail))
}

// ---------------- Public form access --------------------------------

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    code: Option<String>,
}

/// Active form behind `link` that the caller may open.
async fn reachable_form(data: &AppState, link: &str, code: Option<&str>) -> Result<FormDetail, ApiError> {
    let detail = data.repo.get_form_by_link(link).await?;
    if detail.form.status != FormStatus::Active {
        return Err(ApiError::NotFound);
    }
    if detail.form.visibility == FormVisibility::Private {
        let expected = detail.form.access_code.as_deref().unwrap_or_default();
        if expected.is_empty() || code.map(str::trim) != Some(expected) {
            return Err(ApiError::Forbidden);
        }
    }
    Ok(detail)
}

#[utoipa::path(
    get,
    path = "/api/forms/link/{link}",
    params(
        ("link" = String, Path, description = "Share link"),
        ("code" = Option<String>, Query, description = "Access code for private forms")
    ),
    responses(
        (status = 200, description = "Form definition", body = PublicForm),
        (status = 403, description = "Access code missing or wrong"),
        (status = 404, description = "No active form behind this link")
    )
)]
pub async fn get_public_form(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<AccessQuery>,
) -> Result<HttpResponse, ApiError> {
    let detail = reachable_form(&data, &path.into_inner(), query.code.as_deref()).await?;
    Ok(HttpResponse::Ok().json(PublicForm::from(detail)))
}

#[utoipa::path(
    post,
    path = "/api/forms/link/{link}/submissions",
    request_body = NewSubmission,
    params(
        ("link" = String, Path, description = "Share link"),
        ("code" = Option<String>, Query, description = "Access code for private forms")
    ),
    responses(
        (status = 201, description = "Submission stored", body = Submission),
        (status = 400, description = "Missing or invalid answers"),
        (status = 403, description = "Access code missing or wrong"),
        (status = 429, description = "Too many submissions")
    )
)]
pub async fn submit_form(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<AccessQuery>,
    payload: web::Json<NewSubmission>,
) -> Result<HttpResponse, ApiError> {
    let link = path.into_inner();
    if !data.limiter.allow_submission(&client_ip(&req), &link) {
        return Err(ApiError::TooManyRequests);
    }
    let detail = reachable_form(&data, &link, query.code.as_deref()).await?;
    let answers = validate_submission(&detail.fields, &payload.data).map_err(|errs| ApiError::validation(&errs))?;
    let mut unknown = Vec::new();
    for (field, hash) in upload_refs(&detail.fields, &answers) {
        let stored = data.uploads.exists(hash).await.map_err(|e| {
            tracing::error!(hash, "upload lookup failed: {e}");
            ApiError::Internal
        })?;
        if !stored {
            unknown.push(FieldError::new(field, Issue::InvalidUpload));
        }
    }
    if !unknown.is_empty() {
        return Err(ApiError::validation(&unknown));
    }
    let sub = data.repo.create_submission(detail.form.id, Value::Object(answers)).await?;
    Ok(HttpResponse::Created().json(sub))
}

// ---------------- Attendance ----------------------------------------

async fn form_entries(data: &AppState, form_id: Id) -> Result<Vec<attendance::Entry>, ApiError> {
    let fields = data.repo.list_fields(form_id).await?;
    let subs = data.repo.list_submissions(form_id).await?;
    let records = data.repo.list_attendance(form_id).await?;
    Ok(attendance::collect_entries(&subs, &fields, &records, data.missing_status()))
}

#[utoipa::path(
    get,
    path = "/api/students-info/{form_id}",
    params(("form_id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "Per-student attendance", body = [attendance::StudentInfo]))
)]
pub async fn students_info(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let entries = form_entries(&data, form.id).await?;
    Ok(HttpResponse::Ok().json(attendance::students(&entries)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FormAttendance {
    pub form_id: Id,
    pub topic: String,
    #[serde(flatten)]
    pub report: AttendanceReport,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceOverview {
    pub forms: Vec<FormAttendance>,
    pub summary: Summary,
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    responses((status = 200, description = "Reports for every form of the caller", body = AttendanceOverview))
)]
pub async fn attendance_overview(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let forms = data.repo.list_forms(auth.user_id()).await?;
    let mut reports = Vec::with_capacity(forms.len());
    for form in &forms {
        let entries = form_entries(&data, form.id).await?;
        reports.push(attendance::report_from_entries(&entries));
    }
    let summary = attendance::merge_summaries(&reports);
    let forms = forms
        .into_iter()
        .zip(reports)
        .map(|(f, report)| FormAttendance { form_id: f.id, topic: f.topic, report })
        .collect();
    Ok(HttpResponse::Ok().json(AttendanceOverview { forms, summary }))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{form_id}",
    params(("form_id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "Sessions and summary", body = AttendanceReport))
)]
pub async fn form_attendance(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let entries = form_entries(&data, form.id).await?;
    Ok(HttpResponse::Ok().json(attendance::report_from_entries(&entries)))
}

#[utoipa::path(
    put,
    path = "/api/attendance/{form_id}",
    request_body = SetAttendance,
    params(("form_id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "Stored record, null when cleared", body = AttendanceRecord))
)]
pub async fn set_attendance(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<SetAttendance>,
) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let set = payload.into_inner();
    if set.student_id.trim().is_empty() {
        return Err(ApiError::BadRequest("student_id is required".into()));
    }
    let record = data.repo.set_attendance(form.id, set).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{form_id}/calendar",
    params(("form_id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "Student by date matrix", body = calendar::GridView))
)]
pub async fn attendance_calendar(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let entries = form_entries(&data, form.id).await?;
    Ok(HttpResponse::Ok().json(AttendanceGrid::from_entries(&entries).view()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CycledCell {
    pub student_id: String,
    pub date: chrono::NaiveDate,
    pub status: AttendanceStatus,
    #[serde(flatten)]
    pub style: CellStyle,
}

#[utoipa::path(
    post,
    path = "/api/attendance/{form_id}/calendar/cycle",
    request_body = CellRef,
    params(("form_id" = i64, Path, description = "Form id")),
    responses((status = 200, description = "New status of the cell", body = CycledCell))
)]
pub async fn cycle_attendance(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CellRef>,
) -> Result<HttpResponse, ApiError> {
    let form = owned_form(&data, &auth, path.into_inner()).await?.form;
    let cell = payload.into_inner();
    if cell.student_id.trim().is_empty() {
        return Err(ApiError::BadRequest("student_id is required".into()));
    }
    let entries = form_entries(&data, form.id).await?;
    let mut grid = AttendanceGrid::from_entries(&entries);
    let status = grid.cycle(&cell.student_id, cell.date);
    data.repo
        .set_attendance(
            form.id,
            SetAttendance { student_id: cell.student_id.clone(), date: cell.date, status: Some(status) },
        )
        .await?;
    Ok(HttpResponse::Ok().json(CycledCell {
        student_id: cell.student_id,
        date: cell.date,
        status,
        style: calendar::style(Some(status)),
    }))
}

// ---------------- Uploads -------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub hash: String,
    pub mime: String,
    pub size: usize,
    pub duplicate: bool, // true when upload was a duplicate (idempotent)
}

const ALLOWED_MIME: &[&str] = &[
    "image/png", "image/jpeg", "image/gif", "image/webp",
    "application/pdf", "application/zip",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

#[utoipa::path(
    post,
    path = "/api/uploads",
    responses(
        (status = 201, description = "File stored (new)", body = UploadResponse),
        (status = 200, description = "File already existed (idempotent)", body = UploadResponse),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type"),
        (status = 429, description = "Too many uploads")
    )
)]
pub async fn upload_file(req: HttpRequest, data: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    use actix_web::http::StatusCode;
    if !data.limiter.allow_submission(&client_ip(&req), "uploads") {
        return Err(ApiError::TooManyRequests);
    }
    let limit = data.config.upload_max_bytes;
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::error!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }
        let mut bytes: Vec<u8> = Vec::new();
        let mut hasher = Sha256::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::error!("stream read error: {e}");
            ApiError::BadRequest("upload interrupted".into())
        })? {
            if bytes.len() + chunk.len() > limit {
                return Ok(HttpResponse::build(StatusCode::PAYLOAD_TOO_LARGE).finish());
            }
            hasher.update(&chunk);
            bytes.extend_from_slice(&chunk);
        }
        let hash = format!("{:x}", hasher.finalize());
        let mime = sniff_mime(&bytes);
        if !ALLOWED_MIME.contains(&mime.as_str()) {
            return Ok(HttpResponse::UnsupportedMediaType().finish());
        }
        let (status_code, duplicate) = match data.uploads.save(&hash, &mime, &bytes).await {
            Ok(()) => (StatusCode::CREATED, false),
            Err(UploadStoreError::Duplicate) => (StatusCode::OK, true),
            Err(e) => {
                log::error!("upload store save error: {e}");
                return Err(ApiError::Internal);
            }
        };
        let resp = UploadResponse { hash, mime, size: bytes.len(), duplicate };
        return Ok(HttpResponse::build(status_code).json(resp));
    }
    Err(ApiError::BadRequest("expected a multipart field named 'file'".into()))
}

pub async fn get_upload(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let hash = path.into_inner();
    match data.uploads.load(&hash).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok().insert_header(("Content-Type", mime)).body(bytes)),
        Err(UploadStoreError::NotFound) => Err(ApiError::NotFound),
        Err(e) => {
            log::error!("upload store load error: {e}");
            Err(ApiError::Internal)
        }
    }
}

// ---------------- Session -------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user info", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth) -> Result<HttpResponse, ApiError> {
    let me = MeResponse { id: auth.0.sub, name: auth.0.name, email: auth.0.email };
    Ok(HttpResponse::Ok().json(me))
}
