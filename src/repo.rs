use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::Value;

use crate::fields::{plan_field_changes, to_field, FieldPlan};
use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait FormRepo: Send + Sync {
    async fn list_forms(&self, user_id: &str) -> RepoResult<Vec<Form>>;
    async fn get_form(&self, id: Id) -> RepoResult<FormDetail>;
    async fn get_form_by_link(&self, link: &str) -> RepoResult<FormDetail>;
    async fn list_fields(&self, form_id: Id) -> RepoResult<Vec<Field>>;
    async fn create_form(&self, user_id: &str, new: FormPayload) -> RepoResult<FormDetail>;
    /// Replaces the form's attributes and reconciles its fields with `upd.fields`.
    async fn update_form(&self, id: Id, upd: FormPayload) -> RepoResult<FormDetail>;
    /// Removes the form with its fields, submissions and attendance records.
    async fn delete_form(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    async fn create_submission(&self, form_id: Id, data: Value) -> RepoResult<Submission>;
    async fn list_submissions(&self, form_id: Id) -> RepoResult<Vec<Submission>>;
}

#[async_trait]
pub trait AttendanceRepo: Send + Sync {
    async fn list_attendance(&self, form_id: Id) -> RepoResult<Vec<AttendanceRecord>>;
    /// Upserts one cell; `status: None` clears it and returns `None`.
    async fn set_attendance(&self, form_id: Id, set: SetAttendance) -> RepoResult<Option<AttendanceRecord>>;
}

#[async_trait]
pub trait DraftRepo: Send + Sync {
    async fn list_drafts(&self, user_id: &str) -> RepoResult<Vec<Draft>>;
    async fn get_draft(&self, user_id: &str, key: &str) -> RepoResult<Draft>;
    async fn save_draft(&self, user_id: &str, key: &str, content: Value) -> RepoResult<Draft>;
    async fn delete_draft(&self, user_id: &str, key: &str) -> RepoResult<()>;
}

pub trait Repo: FormRepo + SubmissionRepo + AttendanceRepo + DraftRepo {}

impl<T> Repo for T where T: FormRepo + SubmissionRepo + AttendanceRepo + DraftRepo {}

/// Random token used in public form URLs.
pub fn new_share_link() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Trims the payload and fills in derived attributes: blank field
/// categories fall back to "General", every field category appears in
/// `categories`, and public forms drop their access code.
pub fn normalize_payload(mut p: FormPayload) -> FormPayload {
    p.topic = p.topic.trim().to_string();
    p.description = p.description.trim().to_string();
    let mut categories: Vec<String> = Vec::new();
    for c in p.categories.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !categories.iter().any(|k| k == c) {
            categories.push(c.to_string());
        }
    }
    for f in &mut p.fields {
        f.label = f.label.trim().to_string();
        let c = f.category.trim();
        f.category = if c.is_empty() { "General".to_string() } else { c.to_string() };
        if !categories.contains(&f.category) {
            categories.push(f.category.clone());
        }
    }
    p.categories = categories;
    p.access_code = match p.visibility {
        FormVisibility::Private => p.access_code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        FormVisibility::Public => None,
    };
    p
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};
    use std::sync::{RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        forms: HashMap<Id, Form>,
        fields: HashMap<Id, Field>,
        submissions: HashMap<Id, Submission>,
        attendance: HashMap<Id, AttendanceRecord>,
        drafts: BTreeMap<String, BTreeMap<String, Draft>>, // user -> key -> draft
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }

        fn fields_of(&self, form_id: Id) -> Vec<Field> {
            let mut v: Vec<_> = self.fields.values().filter(|f| f.form_id == form_id).cloned().collect();
            v.sort_by_key(|f| (f.position, f.id));
            v
        }

        fn detail(&self, form: &Form) -> FormDetail {
            FormDetail { form: form.clone(), fields: self.fields_of(form.id) }
        }

        fn apply_plan(&mut self, form_id: Id, plan: FieldPlan) {
            for id in plan.delete {
                self.fields.remove(&id);
            }
            for (id, planned) in plan.update {
                self.fields.insert(id, to_field(id, form_id, &planned));
            }
            for planned in plan.insert {
                let id = self.next_id();
                self.fields.insert(id, to_field(id, form_id, &planned));
            }
        }
    }

    /// In-process repository. With a snapshot path the whole state is
    /// written as JSON after every mutation and reloaded on start.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
            let path = path.into();
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) }
        }

        /// Nothing touches the disk.
        pub fn ephemeral() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), snapshot_path: None }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("[inmem] loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!("[inmem] failed to parse snapshot '{}': {e}. Starting empty.", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("[inmem] no snapshot at '{}': {e}. Starting empty.", path.display());
                    State::default()
                }
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else { return };
            let Ok(state) = self.state.read() else { return };
            match serde_json::to_vec_pretty(&*state) {
                Ok(bytes) => {
                    if let Some(dir) = path.parent() {
                        let _ = std::fs::create_dir_all(dir);
                    }
                    if let Err(e) = std::fs::write(path, bytes) {
                        log::error!("[inmem] failed to write snapshot '{}': {e}", path.display());
                    }
                }
                Err(e) => log::error!("[inmem] failed to serialise snapshot: {e}"),
            }
        }
    }

    #[async_trait]
    impl FormRepo for InMemRepo {
        async fn list_forms(&self, user_id: &str) -> RepoResult<Vec<Form>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.forms.values().filter(|f| f.user_id == user_id).cloned().collect();
            v.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id))); // newest first
            Ok(v)
        }

        async fn get_form(&self, id: Id) -> RepoResult<FormDetail> {
            let s = self.read()?;
            let form = s.forms.get(&id).ok_or(RepoError::NotFound)?;
            Ok(s.detail(form))
        }

        async fn get_form_by_link(&self, link: &str) -> RepoResult<FormDetail> {
            let s = self.read()?;
            let form = s.forms.values().find(|f| f.link == link).ok_or(RepoError::NotFound)?;
            Ok(s.detail(form))
        }

        async fn list_fields(&self, form_id: Id) -> RepoResult<Vec<Field>> {
            Ok(self.read()?.fields_of(form_id))
        }

        async fn create_form(&self, user_id: &str, new: FormPayload) -> RepoResult<FormDetail> {
            let new = normalize_payload(new);
            let mut s = self.write()?;
            let id = s.next_id();
            let now = Utc::now();
            let mut link = new_share_link();
            while s.forms.values().any(|f| f.link == link) {
                link = new_share_link();
            }
            let form = Form {
                id,
                user_id: user_id.to_string(),
                topic: new.topic,
                description: new.description,
                status: new.status.unwrap_or_default(),
                visibility: new.visibility,
                categories: new.categories,
                link,
                access_code: new.access_code,
                created_at: now,
                updated_at: now,
            };
            s.forms.insert(id, form.clone());
            let plan = plan_field_changes(&[], &new.fields);
            s.apply_plan(id, plan);
            let detail = s.detail(&form);
            drop(s); // release lock before persisting
            self.persist();
            Ok(detail)
        }

        async fn update_form(&self, id: Id, upd: FormPayload) -> RepoResult<FormDetail> {
            let upd = normalize_payload(upd);
            let mut s = self.write()?;
            let existing = s.fields_of(id);
            let form = s.forms.get_mut(&id).ok_or(RepoError::NotFound)?;
            form.topic = upd.topic;
            form.description = upd.description;
            if let Some(status) = upd.status {
                form.status = status;
            }
            form.visibility = upd.visibility;
            form.categories = upd.categories;
            form.access_code = upd.access_code;
            form.updated_at = Utc::now();
            let form = form.clone();
            let plan = plan_field_changes(&existing, &upd.fields);
            s.apply_plan(id, plan);
            let detail = s.detail(&form);
            drop(s);
            self.persist();
            Ok(detail)
        }

        async fn delete_form(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.forms.remove(&id).ok_or(RepoError::NotFound)?;
            s.fields.retain(|_, f| f.form_id != id);
            s.submissions.retain(|_, d| d.form_id != id);
            s.attendance.retain(|_, a| a.form_id != id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl SubmissionRepo for InMemRepo {
        async fn create_submission(&self, form_id: Id, data: Value) -> RepoResult<Submission> {
            let mut s = self.write()?;
            if !s.forms.contains_key(&form_id) { return Err(RepoError::NotFound); }
            let id = s.next_id();
            let sub = Submission { id, form_id, data, created_at: Utc::now() };
            s.submissions.insert(id, sub.clone());
            drop(s);
            self.persist();
            Ok(sub)
        }

        async fn list_submissions(&self, form_id: Id) -> RepoResult<Vec<Submission>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.submissions.values().filter(|d| d.form_id == form_id).cloned().collect();
            v.sort_by_key(|d| (d.created_at, d.id)); // ascending
            Ok(v)
        }
    }

    #[async_trait]
    impl AttendanceRepo for InMemRepo {
        async fn list_attendance(&self, form_id: Id) -> RepoResult<Vec<AttendanceRecord>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.attendance.values().filter(|a| a.form_id == form_id).cloned().collect();
            v.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.student_id.cmp(&b.student_id)));
            Ok(v)
        }

        async fn set_attendance(&self, form_id: Id, set: SetAttendance) -> RepoResult<Option<AttendanceRecord>> {
            let mut s = self.write()?;
            if !s.forms.contains_key(&form_id) { return Err(RepoError::NotFound); }
            let existing = s
                .attendance
                .values()
                .find(|a| a.form_id == form_id && a.student_id == set.student_id && a.date == set.date)
                .map(|a| a.id);
            let out = match (set.status, existing) {
                (None, Some(id)) => {
                    s.attendance.remove(&id);
                    None
                }
                (None, None) => None,
                (Some(status), id) => {
                    let id = match id { Some(id) => id, None => s.next_id() };
                    let rec = AttendanceRecord {
                        id,
                        form_id,
                        student_id: set.student_id,
                        date: set.date,
                        status,
                        updated_at: Utc::now(),
                    };
                    s.attendance.insert(id, rec.clone());
                    Some(rec)
                }
            };
            drop(s);
            self.persist();
            Ok(out)
        }
    }

    #[async_trait]
    impl DraftRepo for InMemRepo {
        async fn list_drafts(&self, user_id: &str) -> RepoResult<Vec<Draft>> {
            let s = self.read()?;
            Ok(s.drafts.get(user_id).map(|m| m.values().cloned().collect()).unwrap_or_default())
        }

        async fn get_draft(&self, user_id: &str, key: &str) -> RepoResult<Draft> {
            let s = self.read()?;
            s.drafts.get(user_id).and_then(|m| m.get(key)).cloned().ok_or(RepoError::NotFound)
        }

        async fn save_draft(&self, user_id: &str, key: &str, content: Value) -> RepoResult<Draft> {
            let mut s = self.write()?;
            let draft = Draft {
                key: key.to_string(),
                user_id: user_id.to_string(),
                content,
                updated_at: Utc::now(),
            };
            s.drafts.entry(user_id.to_string()).or_default().insert(key.to_string(), draft.clone());
            drop(s);
            self.persist();
            Ok(draft)
        }

        async fn delete_draft(&self, user_id: &str, key: &str) -> RepoResult<()> {
            let mut s = self.write()?;
            s.drafts
                .get_mut(user_id)
                .and_then(|m| m.remove(key))
                .ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use sqlx::{Pool, Postgres, Transaction};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> anyhow::Result<()> {
            sqlx::migrate!("./migrations").run(&self.pool).await?;
            Ok(())
        }
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(d) if d.is_unique_violation() => RepoError::Conflict,
            sqlx::Error::Database(d) if d.is_foreign_key_violation() => RepoError::NotFound,
            other => {
                log::error!("database error: {other}");
                RepoError::Internal(other.to_string())
            }
        }
    }

    const FORM_COLUMNS: &str =
        "id, user_id, topic, description, status, visibility, categories, link, access_code, created_at, updated_at";
    const FIELD_COLUMNS: &str = "id, form_id, label, field_type, category, required, options, placeholder, position";

    #[derive(sqlx::FromRow)]
    struct FormRow {
        id: Id,
        user_id: String,
        topic: String,
        description: String,
        status: String,
        visibility: String,
        categories: Vec<String>,
        link: String,
        access_code: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl TryFrom<FormRow> for Form {
        type Error = RepoError;
        fn try_from(r: FormRow) -> Result<Self, Self::Error> {
            Ok(Form {
                status: FormStatus::parse(&r.status)
                    .ok_or_else(|| RepoError::Internal(format!("bad form status {}", r.status)))?,
                visibility: FormVisibility::parse(&r.visibility)
                    .ok_or_else(|| RepoError::Internal(format!("bad form visibility {}", r.visibility)))?,
                id: r.id,
                user_id: r.user_id,
                topic: r.topic,
                description: r.description,
                categories: r.categories,
                link: r.link,
                access_code: r.access_code,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
        }
    }

    #[derive(sqlx::FromRow)]
    struct FieldRow {
        id: Id,
        form_id: Id,
        label: String,
        field_type: String,
        category: String,
        required: bool,
        options: Vec<String>,
        placeholder: Option<String>,
        position: i32,
    }

    impl TryFrom<FieldRow> for Field {
        type Error = RepoError;
        fn try_from(r: FieldRow) -> Result<Self, Self::Error> {
            Ok(Field {
                field_type: FieldType::parse(&r.field_type)
                    .ok_or_else(|| RepoError::Internal(format!("bad field type {}", r.field_type)))?,
                id: r.id,
                form_id: r.form_id,
                label: r.label,
                category: r.category,
                required: r.required,
                options: r.options,
                placeholder: r.placeholder,
                position: r.position,
            })
        }
    }

    #[derive(sqlx::FromRow)]
    struct AttendanceRow {
        id: Id,
        form_id: Id,
        student_id: String,
        date: NaiveDate,
        status: String,
        updated_at: DateTime<Utc>,
    }

    impl TryFrom<AttendanceRow> for AttendanceRecord {
        type Error = RepoError;
        fn try_from(r: AttendanceRow) -> Result<Self, Self::Error> {
            Ok(AttendanceRecord {
                status: AttendanceStatus::parse(&r.status)
                    .ok_or_else(|| RepoError::Internal(format!("bad attendance status {}", r.status)))?,
                id: r.id,
                form_id: r.form_id,
                student_id: r.student_id,
                date: r.date,
                updated_at: r.updated_at,
            })
        }
    }

    impl PgRepo {
        async fn fields_of<'e, E>(exec: E, form_id: Id) -> RepoResult<Vec<Field>>
        where
            E: sqlx::Executor<'e, Database = Postgres>,
        {
            let rows = sqlx::query_as::<_, FieldRow>(&format!(
                "SELECT {FIELD_COLUMNS} FROM fields WHERE form_id = $1 ORDER BY position, id"
            ))
            .bind(form_id)
            .fetch_all(exec)
            .await
            .map_err(db_err)?;
            rows.into_iter().map(Field::try_from).collect()
        }

        async fn detail(&self, row: FormRow) -> RepoResult<FormDetail> {
            let form = Form::try_from(row)?;
            let fields = Self::fields_of(&self.pool, form.id).await?;
            Ok(FormDetail { form, fields })
        }

        async fn apply_plan(tx: &mut Transaction<'_, Postgres>, form_id: Id, plan: FieldPlan) -> RepoResult<()> {
            if !plan.delete.is_empty() {
                sqlx::query("DELETE FROM fields WHERE form_id = $1 AND id = ANY($2)")
                    .bind(form_id)
                    .bind(&plan.delete)
                    .execute(&mut **tx)
                    .await
                    .map_err(db_err)?;
            }
            for (id, planned) in &plan.update {
                let f = to_field(*id, form_id, planned);
                sqlx::query(
                    "UPDATE fields SET label=$3, field_type=$4, category=$5, required=$6, options=$7, placeholder=$8, position=$9 \
                     WHERE id=$1 AND form_id=$2",
                )
                .bind(f.id)
                .bind(form_id)
                .bind(&f.label)
                .bind(f.field_type.as_str())
                .bind(&f.category)
                .bind(f.required)
                .bind(&f.options)
                .bind(&f.placeholder)
                .bind(f.position)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
            }
            for planned in &plan.insert {
                let f = to_field(0, form_id, planned);
                sqlx::query(
                    "INSERT INTO fields (form_id, label, field_type, category, required, options, placeholder, position) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
                )
                .bind(form_id)
                .bind(&f.label)
                .bind(f.field_type.as_str())
                .bind(&f.category)
                .bind(f.required)
                .bind(&f.options)
                .bind(&f.placeholder)
                .bind(f.position)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl FormRepo for PgRepo {
        async fn list_forms(&self, user_id: &str) -> RepoResult<Vec<Form>> {
            let rows = sqlx::query_as::<_, FormRow>(&format!(
                "SELECT {FORM_COLUMNS} FROM forms WHERE user_id = $1 ORDER BY updated_at DESC, id DESC"
            ))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.into_iter().map(Form::try_from).collect()
        }

        async fn get_form(&self, id: Id) -> RepoResult<FormDetail> {
            let row = sqlx::query_as::<_, FormRow>(&format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
            self.detail(row).await
        }

        async fn get_form_by_link(&self, link: &str) -> RepoResult<FormDetail> {
            let row = sqlx::query_as::<_, FormRow>(&format!("SELECT {FORM_COLUMNS} FROM forms WHERE link = $1"))
                .bind(link)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
            self.detail(row).await
        }

        async fn list_fields(&self, form_id: Id) -> RepoResult<Vec<Field>> {
            Self::fields_of(&self.pool, form_id).await
        }

        async fn create_form(&self, user_id: &str, new: FormPayload) -> RepoResult<FormDetail> {
            let new = normalize_payload(new);
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let row = sqlx::query_as::<_, FormRow>(&format!(
                "INSERT INTO forms (user_id, topic, description, status, visibility, categories, link, access_code) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8) RETURNING {FORM_COLUMNS}"
            ))
            .bind(user_id)
            .bind(&new.topic)
            .bind(&new.description)
            .bind(new.status.unwrap_or_default().as_str())
            .bind(new.visibility.as_str())
            .bind(&new.categories)
            .bind(new_share_link())
            .bind(&new.access_code)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            let plan = plan_field_changes(&[], &new.fields);
            Self::apply_plan(&mut tx, row.id, plan).await?;
            tx.commit().await.map_err(db_err)?;
            self.detail(row).await
        }

        async fn update_form(&self, id: Id, upd: FormPayload) -> RepoResult<FormDetail> {
            let upd = normalize_payload(upd);
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let row = sqlx::query_as::<_, FormRow>(&format!(
                "UPDATE forms SET topic=$2, description=$3, status=COALESCE($4, status), visibility=$5, \
                 categories=$6, access_code=$7, updated_at=now() WHERE id=$1 RETURNING {FORM_COLUMNS}"
            ))
            .bind(id)
            .bind(&upd.topic)
            .bind(&upd.description)
            .bind(upd.status.map(|s| s.as_str()))
            .bind(upd.visibility.as_str())
            .bind(&upd.categories)
            .bind(&upd.access_code)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            let existing = Self::fields_of(&mut *tx, id).await?;
            let plan = plan_field_changes(&existing, &upd.fields);
            Self::apply_plan(&mut tx, id, plan).await?;
            tx.commit().await.map_err(db_err)?;
            self.detail(row).await
        }

        async fn delete_form(&self, id: Id) -> RepoResult<()> {
            // fields, submissions and attendance_records cascade
            let res = sqlx::query("DELETE FROM forms WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl SubmissionRepo for PgRepo {
        async fn create_submission(&self, form_id: Id, data: Value) -> RepoResult<Submission> {
            sqlx::query_as::<_, Submission>(
                "INSERT INTO submissions (form_id, data) VALUES ($1,$2) RETURNING id, form_id, data, created_at",
            )
            .bind(form_id)
            .bind(&data)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn list_submissions(&self, form_id: Id) -> RepoResult<Vec<Submission>> {
            sqlx::query_as::<_, Submission>(
                "SELECT id, form_id, data, created_at FROM submissions WHERE form_id = $1 ORDER BY created_at, id",
            )
            .bind(form_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
        }
    }

    #[async_trait]
    impl AttendanceRepo for PgRepo {
        async fn list_attendance(&self, form_id: Id) -> RepoResult<Vec<AttendanceRecord>> {
            let rows = sqlx::query_as::<_, AttendanceRow>(
                "SELECT id, form_id, student_id, date, status, updated_at FROM attendance_records \
                 WHERE form_id = $1 ORDER BY date, student_id",
            )
            .bind(form_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.into_iter().map(AttendanceRecord::try_from).collect()
        }

        async fn set_attendance(&self, form_id: Id, set: SetAttendance) -> RepoResult<Option<AttendanceRecord>> {
            let Some(status) = set.status else {
                sqlx::query("DELETE FROM attendance_records WHERE form_id=$1 AND student_id=$2 AND date=$3")
                    .bind(form_id)
                    .bind(&set.student_id)
                    .bind(set.date)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
                return Ok(None);
            };
            let row = sqlx::query_as::<_, AttendanceRow>(
                "INSERT INTO attendance_records (form_id, student_id, date, status) VALUES ($1,$2,$3,$4) \
                 ON CONFLICT (form_id, student_id, date) DO UPDATE SET status = EXCLUDED.status, updated_at = now() \
                 RETURNING id, form_id, student_id, date, status, updated_at",
            )
            .bind(form_id)
            .bind(&set.student_id)
            .bind(set.date)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            AttendanceRecord::try_from(row).map(Some)
        }
    }

    #[async_trait]
    impl DraftRepo for PgRepo {
        async fn list_drafts(&self, user_id: &str) -> RepoResult<Vec<Draft>> {
            sqlx::query_as::<_, Draft>(
                "SELECT key, user_id, content, updated_at FROM drafts WHERE user_id = $1 ORDER BY key",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn get_draft(&self, user_id: &str, key: &str) -> RepoResult<Draft> {
            sqlx::query_as::<_, Draft>(
                "SELECT key, user_id, content, updated_at FROM drafts WHERE user_id = $1 AND key = $2",
            )
            .bind(user_id)
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn save_draft(&self, user_id: &str, key: &str, content: Value) -> RepoResult<Draft> {
            sqlx::query_as::<_, Draft>(
                "INSERT INTO drafts (user_id, key, content) VALUES ($1,$2,$3) \
                 ON CONFLICT (user_id, key) DO UPDATE SET content = EXCLUDED.content, updated_at = now() \
                 RETURNING key, user_id, content, updated_at",
            )
            .bind(user_id)
            .bind(key)
            .bind(&content)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn delete_draft(&self, user_id: &str, key: &str) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM drafts WHERE user_id = $1 AND key = $2")
                .bind(user_id)
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }
}
