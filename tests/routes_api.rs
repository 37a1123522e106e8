#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::Utc;
use formdesk::auth::create_jwt;
use formdesk::models::{AttendanceRecord, Draft, Field, Form, FormDetail, FormPayload, Id, SetAttendance, Submission};
use formdesk::rate_limit::{InMemoryRateLimiter, RateLimitConfig, SubmissionLimiter};
use formdesk::repo::inmem::InMemRepo;
use formdesk::repo::{AttendanceRepo, DraftRepo, FormRepo, Repo, RepoError, RepoResult, SubmissionRepo};
use formdesk::storage::FsUploadStore;
use formdesk::{config, AppConfig, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn state_on(repo: Arc<dyn Repo>, limiter: SubmissionLimiter) -> AppState {
    setup_env();
    let uploads = tempfile::tempdir().unwrap().into_path();
    AppState {
        repo,
        uploads: Arc::new(FsUploadStore::new(uploads)),
        limiter,
        config: Arc::new(AppConfig { frontend_url: "https://forms.example.edu/".into(), ..AppConfig::default() }),
    }
}

fn state_with(limiter: SubmissionLimiter) -> AppState {
    state_on(Arc::new(InMemRepo::ephemeral()), limiter)
}

fn state() -> AppState {
    state_with(SubmissionLimiter::disabled())
}

fn bearer(user: &str) -> (&'static str, String) {
    let token = create_jwt(user, Some("Ms. Frizzle"), Some("frizzle@school.test")).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn sample_form() -> Value {
    json!({
        "topic": "Period 3 check-in",
        "description": "Sign in for today's class",
        "type": "public",
        "fields": [
            {"label": "Name", "type": "text", "required": true},
            {"label": "Email", "type": "email", "required": false},
            {"label": "Mood", "type": "dropdown", "required": false, "options": ["good", "meh"]}
        ]
    })
}

macro_rules! read_json {
    ($resp:expr) => {{
        let body = test::read_body($resp).await;
        serde_json::from_slice::<Value>(&body).unwrap()
    }};
}

#[actix_web::test]
async fn forms_require_a_session() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/forms").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let v = read_json!(resp);
    assert_eq!(v["error"], "unauthorized");
}

#[actix_web::test]
async fn form_lifecycle() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;

    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(sample_form()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created = read_json!(resp);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["status"], "active");
    assert_eq!(created["fields"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get().uri("/api/forms").insert_header(bearer("t1")).to_request();
    let list = read_json!(test::call_service(&app, req).await);
    assert_eq!(list.as_array().unwrap().len(), 1);

    // someone else's form looks missing
    let req = test::TestRequest::get().uri(&format!("/api/forms/{id}")).insert_header(bearer("t2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // rename the first field, keep its id
    let mut upd = sample_form();
    upd["fields"][0]["id"] = created["fields"][0]["id"].clone();
    upd["fields"][0]["label"] = json!("Full name");
    let req = test::TestRequest::put()
        .uri(&format!("/api/forms/{id}"))
        .insert_header(bearer("t1"))
        .set_json(&upd)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let updated = read_json!(resp);
    assert_eq!(updated["fields"][0]["id"], created["fields"][0]["id"]);
    assert_eq!(updated["fields"][0]["label"], "Full name");

    let req = test::TestRequest::get().uri(&format!("/api/forms/{id}/share")).insert_header(bearer("t1")).to_request();
    let share = read_json!(test::call_service(&app, req).await);
    let link = created["link"].as_str().unwrap();
    assert_eq!(share["url"], format!("https://forms.example.edu/forms/{link}"));

    let req = test::TestRequest::delete().uri(&format!("/api/forms/{id}")).insert_header(bearer("t1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let req = test::TestRequest::get().uri(&format!("/api/forms/{id}")).insert_header(bearer("t1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = test::TestRequest::get().uri(&format!("/api/forms/link/{link}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn invalid_definitions_list_every_problem() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let body = json!({"topic": "  ", "description": "", "type": "private", "fields": []});
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v = read_json!(resp);
    let problems: Vec<_> = v["details"].as_array().unwrap().iter().map(|p| p["problem"].as_str().unwrap().to_string()).collect();
    for expected in ["missing_topic", "missing_description", "no_fields", "missing_access_code"] {
        assert!(problems.iter().any(|p| p == expected), "missing {expected} in {problems:?}");
    }

    // malformed JSON still answers with the error envelope
    let req = test::TestRequest::post()
        .uri("/api/forms")
        .insert_header(bearer("t1"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(read_json!(resp)["error"].as_str().unwrap().starts_with("bad request"));
}

#[actix_web::test]
async fn public_submission_flow() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(sample_form()).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let id = created["id"].as_i64().unwrap();
    let link = created["link"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri(&format!("/api/forms/link/{link}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let public = read_json!(resp);
    assert_eq!(public["topic"], "Period 3 check-in");
    assert!(public.get("user_id").is_none());

    // required field left blank
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/link/{link}/submissions"))
        .set_json(json!({"data": {"Name": "   ", "Mood": "great"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v = read_json!(resp);
    let issues: Vec<_> = v["details"].as_array().unwrap().iter().map(|e| e["issue"].as_str().unwrap().to_string()).collect();
    assert_eq!(issues, vec!["required", "not_an_option"]);

    let req = test::TestRequest::get().uri(&format!("/api/forms/{id}/submissions")).insert_header(bearer("t1")).to_request();
    assert!(read_json!(test::call_service(&app, req).await).as_array().unwrap().is_empty());

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/link/{link}/submissions"))
        .set_json(json!({"data": {"Name": "Ada", "Email": "ada@school.test", "studentId": "s-1"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let sub = read_json!(resp);
    assert_eq!(sub["data"]["Name"], "Ada");

    let req = test::TestRequest::get().uri(&format!("/api/forms/{id}/submissions")).insert_header(bearer("t1")).to_request();
    assert_eq!(read_json!(test::call_service(&app, req).await).as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn private_forms_need_the_access_code() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let mut body = sample_form();
    body["type"] = json!("private");
    body["access_code"] = json!("s3cret");
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(&body).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let link = created["link"].as_str().unwrap().to_string();

    for uri in [format!("/api/forms/link/{link}"), format!("/api/forms/link/{link}?code=wrong")] {
        let req = test::TestRequest::get().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403, "{uri}");
    }
    let req = test::TestRequest::get().uri(&format!("/api/forms/link/{link}?code=s3cret")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/link/{link}/submissions"))
        .set_json(json!({"data": {"Name": "Ada"}}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/link/{link}/submissions?code=s3cret"))
        .set_json(json!({"data": {"Name": "Ada"}}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
}

#[actix_web::test]
async fn inactive_forms_are_not_served() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let mut body = sample_form();
    body["status"] = json!("draft");
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(&body).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let link = created["link"].as_str().unwrap();
    let req = test::TestRequest::get().uri(&format!("/api/forms/link/{link}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn attendance_report_and_calendar() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(sample_form()).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let id = created["id"].as_i64().unwrap();
    let link = created["link"].as_str().unwrap().to_string();

    for data in [
        json!({"Name": "Ada", "studentId": "s1"}),
        json!({"Name": "Bob", "studentId": "s2", "status": "absent"}),
    ] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/forms/link/{link}/submissions"))
            .set_json(json!({ "data": data }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let req = test::TestRequest::get().uri(&format!("/api/attendance/{id}")).insert_header(bearer("t1")).to_request();
    let report = read_json!(test::call_service(&app, req).await);
    assert_eq!(report["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(report["sessions"][0]["present"], 1);
    assert_eq!(report["sessions"][0]["absent"], 1);
    assert_eq!(report["sessions"][0]["rate"], 50.0);
    assert_eq!(report["summary"]["total_students"], 2);

    let req = test::TestRequest::get().uri(&format!("/api/attendance/{id}/calendar")).insert_header(bearer("t1")).to_request();
    let grid = read_json!(test::call_service(&app, req).await);
    assert_eq!(grid["rows"].as_array().unwrap().len(), 2);

    // present -> absent -> late -> present
    let today = Utc::now().date_naive().to_string();
    let mut seen = Vec::new();
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri(&format!("/api/attendance/{id}/calendar/cycle"))
            .insert_header(bearer("t1"))
            .set_json(json!({"student_id": "s1", "date": today}))
            .to_request();
        let cell = read_json!(test::call_service(&app, req).await);
        seen.push(cell["status"].as_str().unwrap().to_string());
    }
    assert_eq!(seen, ["absent", "late", "present"]);

    // an empty cell starts at present
    let req = test::TestRequest::post()
        .uri(&format!("/api/attendance/{id}/calendar/cycle"))
        .insert_header(bearer("t1"))
        .set_json(json!({"student_id": "s3", "date": "2024-01-15"}))
        .to_request();
    let cell = read_json!(test::call_service(&app, req).await);
    assert_eq!(cell["status"], "present");
    assert_eq!(cell["label"], "Present");

    // clearing an explicit record falls back to the submission
    let req = test::TestRequest::put()
        .uri(&format!("/api/attendance/{id}"))
        .insert_header(bearer("t1"))
        .set_json(json!({"student_id": "s2", "date": today, "status": "late"}))
        .to_request();
    assert_eq!(read_json!(test::call_service(&app, req).await)["status"], "late");
    let req = test::TestRequest::put()
        .uri(&format!("/api/attendance/{id}"))
        .insert_header(bearer("t1"))
        .set_json(json!({"student_id": "s2", "date": today, "status": null}))
        .to_request();
    assert!(read_json!(test::call_service(&app, req).await).is_null());

    let req = test::TestRequest::get().uri(&format!("/api/students-info/{id}")).insert_header(bearer("t1")).to_request();
    let students = read_json!(test::call_service(&app, req).await);
    let ids: Vec<_> = students.as_array().unwrap().iter().map(|s| s["student_id"].as_str().unwrap().to_string()).collect();
    assert_eq!(ids, ["s1", "s2", "s3"]);
    let bob = &students[1];
    assert_eq!(bob["absent"], 1);

    let req = test::TestRequest::get().uri("/api/attendance").insert_header(bearer("t1")).to_request();
    let overview = read_json!(test::call_service(&app, req).await);
    assert_eq!(overview["forms"].as_array().unwrap().len(), 1);
    assert_eq!(overview["forms"][0]["form_id"], id);
    assert_eq!(overview["summary"]["total_students"], 3);
    assert_eq!(overview["summary"]["total_sessions"], 2);

    let req = test::TestRequest::get().uri(&format!("/api/attendance/{id}")).insert_header(bearer("t2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn attendance_reads_answers_keyed_by_field_id() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let body = json!({
        "topic": "Homeroom",
        "description": "Roll call",
        "type": "public",
        "fields": [
            {"label": "studentId", "type": "text", "required": true},
            {"label": "status", "type": "dropdown", "required": true, "options": ["present", "absent", "late"]}
        ]
    });
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(&body).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let id = created["id"].as_i64().unwrap();
    let link = created["link"].as_str().unwrap().to_string();
    let student_field = created["fields"][0]["id"].to_string();
    let status_field = created["fields"][1]["id"].to_string();

    let mut data = serde_json::Map::new();
    data.insert(student_field, json!("s1"));
    data.insert(status_field, json!("absent"));
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/link/{link}/submissions"))
        .set_json(json!({ "data": data }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::get().uri(&format!("/api/attendance/{id}")).insert_header(bearer("t1")).to_request();
    let report = read_json!(test::call_service(&app, req).await);
    assert_eq!(report["sessions"][0]["absent"], 1);
    assert_eq!(report["sessions"][0]["present"], 0);

    let req = test::TestRequest::get().uri(&format!("/api/students-info/{id}")).insert_header(bearer("t1")).to_request();
    let students = read_json!(test::call_service(&app, req).await);
    assert_eq!(students.as_array().unwrap().len(), 1);
    assert_eq!(students[0]["student_id"], "s1");
}

#[actix_web::test]
async fn malformed_paths_and_queries_use_the_error_envelope() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/forms/abc").insert_header(bearer("t1")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(read_json!(resp)["error"].as_str().unwrap().starts_with("bad request"));

    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(sample_form()).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let link = created["link"].as_str().unwrap();
    let req = test::TestRequest::get().uri(&format!("/api/forms/link/{link}?code=a&code=b")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(read_json!(resp)["error"].as_str().unwrap().starts_with("bad request"));
}

#[actix_web::test]
async fn drafts_build_and_publish() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let uri = "/api/forms/drafts/week-1/commands";
    for cmd in [
        json!({"op": "set_title", "title": "Lab safety quiz"}),
        json!({"op": "set_description", "description": "Read chapter 2 first"}),
        json!({"op": "add_field", "section": 1, "type": "text", "label": "Name"}),
        json!({"op": "begin_edit", "target": {"kind": "title"}}),
    ] {
        let req = test::TestRequest::post().uri(uri).insert_header(bearer("t1")).set_json(&cmd).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "{cmd}");
    }

    let req = test::TestRequest::post()
        .uri(uri)
        .insert_header(bearer("t1"))
        .set_json(json!({"op": "add_field", "section": 99, "type": "text"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri("/api/forms/drafts/week-1").insert_header(bearer("t1")).to_request();
    let draft = read_json!(test::call_service(&app, req).await);
    assert_eq!(draft["content"]["title"], "Lab safety quiz");
    assert_eq!(draft["content"]["sections"][0]["fields"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/api/forms/drafts").insert_header(bearer("t2")).to_request();
    assert!(read_json!(test::call_service(&app, req).await).as_array().unwrap().is_empty());

    let req = test::TestRequest::post().uri("/api/forms/drafts/week-1/publish").insert_header(bearer("t1")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let form = read_json!(resp);
    assert_eq!(form["topic"], "Lab safety quiz");
    assert_eq!(form["fields"][0]["label"], "Name");

    let req = test::TestRequest::get().uri("/api/forms/drafts/week-1").insert_header(bearer("t1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // an untouched builder is not publishable
    let req = test::TestRequest::put()
        .uri("/api/forms/drafts/empty")
        .insert_header(bearer("t1"))
        .set_json(formdesk::builder::FormBuilder::new())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::post().uri("/api/forms/drafts/empty/publish").insert_header(bearer("t1")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(read_json!(resp)["details"].as_array().unwrap().iter().any(|p| p["problem"] == "missing_title"));

    let req = test::TestRequest::get().uri("/api/forms/drafts/bad%20key").insert_header(bearer("t1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn submissions_are_rate_limited() {
    let limiter = SubmissionLimiter::new(
        InMemoryRateLimiter::new(true),
        RateLimitConfig { submit_limit: 2, submit_window: Duration::from_secs(60) },
    );
    let app = test::init_service(App::new().app_data(web::Data::new(state_with(limiter))).configure(config)).await;
    let req = test::TestRequest::post().uri("/api/forms").insert_header(bearer("t1")).set_json(sample_form()).to_request();
    let created = read_json!(test::call_service(&app, req).await);
    let link = created["link"].as_str().unwrap().to_string();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri(&format!("/api/forms/link/{link}/submissions"))
            .set_json(json!({"data": {"Name": "Ada"}}))
            .to_request();
        statuses.push(test::call_service(&app, req).await.status().as_u16());
    }
    assert_eq!(statuses, [201, 201, 429]);
}

#[actix_web::test]
async fn me_reflects_the_session() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/auth/me").insert_header(bearer("t9")).to_request();
    let me = read_json!(test::call_service(&app, req).await);
    assert_eq!(me["id"], "t9");
    assert_eq!(me["email"], "frizzle@school.test");
}

/// In-memory repository whose draft deletes always fail.
struct StuckDrafts(InMemRepo);

#[async_trait]
impl FormRepo for StuckDrafts {
    async fn list_forms(&self, user_id: &str) -> RepoResult<Vec<Form>> { self.0.list_forms(user_id).await }
    async fn get_form(&self, id: Id) -> RepoResult<FormDetail> { self.0.get_form(id).await }
    async fn get_form_by_link(&self, link: &str) -> RepoResult<FormDetail> { self.0.get_form_by_link(link).await }
    async fn list_fields(&self, form_id: Id) -> RepoResult<Vec<Field>> { self.0.list_fields(form_id).await }
    async fn create_form(&self, user_id: &str, new: FormPayload) -> RepoResult<FormDetail> {
        self.0.create_form(user_id, new).await
    }
    async fn update_form(&self, id: Id, upd: FormPayload) -> RepoResult<FormDetail> { self.0.update_form(id, upd).await }
    async fn delete_form(&self, id: Id) -> RepoResult<()> { self.0.delete_form(id).await }
}

#[async_trait]
impl SubmissionRepo for StuckDrafts {
    async fn create_submission(&self, form_id: Id, data: Value) -> RepoResult<Submission> {
        self.0.create_submission(form_id, data).await
    }
    async fn list_submissions(&self, form_id: Id) -> RepoResult<Vec<Submission>> { self.0.list_submissions(form_id).await }
}

#[async_trait]
impl AttendanceRepo for StuckDrafts {
    async fn list_attendance(&self, form_id: Id) -> RepoResult<Vec<AttendanceRecord>> { self.0.list_attendance(form_id).await }
    async fn set_attendance(&self, form_id: Id, set: SetAttendance) -> RepoResult<Option<AttendanceRecord>> {
        self.0.set_attendance(form_id, set).await
    }
}

#[async_trait]
impl DraftRepo for StuckDrafts {
    async fn list_drafts(&self, user_id: &str) -> RepoResult<Vec<Draft>> { self.0.list_drafts(user_id).await }
    async fn get_draft(&self, user_id: &str, key: &str) -> RepoResult<Draft> { self.0.get_draft(user_id, key).await }
    async fn save_draft(&self, user_id: &str, key: &str, content: Value) -> RepoResult<Draft> {
        self.0.save_draft(user_id, key, content).await
    }
    async fn delete_draft(&self, _user_id: &str, _key: &str) -> RepoResult<()> {
        Err(RepoError::Internal("disk full".into()))
    }
}

#[actix_web::test]
async fn publishing_succeeds_when_the_draft_cannot_be_removed() {
    let repo = Arc::new(StuckDrafts(InMemRepo::ephemeral()));
    let state = state_on(repo.clone(), SubmissionLimiter::disabled());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;
    let uri = "/api/forms/drafts/quiz/commands";
    for cmd in [
        json!({"op": "set_title", "title": "Pop quiz"}),
        json!({"op": "set_description", "description": "Five minutes"}),
        json!({"op": "add_field", "section": 1, "type": "text", "label": "Answer"}),
    ] {
        let req = test::TestRequest::post().uri(uri).insert_header(bearer("t1")).set_json(&cmd).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200, "{cmd}");
    }

    let req = test::TestRequest::post().uri("/api/forms/drafts/quiz/publish").insert_header(bearer("t1")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    assert_eq!(read_json!(resp)["topic"], "Pop quiz");
    assert_eq!(repo.list_forms("t1").await.unwrap().len(), 1);
    assert!(repo.get_draft("t1", "quiz").await.is_ok());
}
