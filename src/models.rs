use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value; // opaque submission payload
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Active => "active",
            FormStatus::Draft => "draft",
            FormStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(FormStatus::Active),
            "draft" => Some(FormStatus::Draft),
            "archived" => Some(FormStatus::Archived),
            _ => None,
        }
    }
}

/// Who may open a form through its share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormVisibility {
    #[default]
    #[serde(alias = "Public")]
    Public,
    #[serde(alias = "Private")]
    Private,
}

impl FormVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormVisibility::Public => "public",
            FormVisibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Some(FormVisibility::Public),
            "private" => Some(FormVisibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Checkbox,
    Dropdown,
    Select,
    Email,
    Textarea,
    File,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Checkbox => "checkbox",
            FieldType::Dropdown => "dropdown",
            FieldType::Select => "select",
            FieldType::Email => "email",
            FieldType::Textarea => "textarea",
            FieldType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "text" => FieldType::Text,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            "checkbox" => FieldType::Checkbox,
            "dropdown" => FieldType::Dropdown,
            "select" => FieldType::Select,
            "email" => FieldType::Email,
            "textarea" => FieldType::Textarea,
            "file" => FieldType::File,
            _ => return None,
        })
    }

    /// Choice fields carry a list of allowed options.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Dropdown | FieldType::Select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    /// Calendar click transition: empty → present → absent → late → present.
    pub fn next(current: Option<Self>) -> Self {
        match current {
            None | Some(AttendanceStatus::Late) => AttendanceStatus::Present,
            Some(AttendanceStatus::Present) => AttendanceStatus::Absent,
            Some(AttendanceStatus::Absent) => AttendanceStatus::Late,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Form {
    pub id: Id,
    pub user_id: String,
    pub topic: String,
    pub description: String,
    pub status: FormStatus,
    #[serde(rename = "type")]
    pub visibility: FormVisibility,
    pub categories: Vec<String>,
    pub link: String,
    pub access_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Field {
    pub id: Id,
    pub form_id: Id,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub category: String,
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    pub placeholder: Option<String>,
    pub position: i32,
}

/// Incoming field definition. `id` ties it to an existing field on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewField {
    #[serde(default)]
    pub id: Option<Id>,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// Body of create and update; fields are the full desired set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormPayload {
    pub topic: String,
    pub description: String,
    #[serde(default)]
    pub status: Option<FormStatus>,
    #[serde(rename = "type", default)]
    pub visibility: FormVisibility,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub access_code: Option<String>,
    pub fields: Vec<NewField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormDetail {
    #[serde(flatten)]
    pub form: Form,
    pub fields: Vec<Field>,
}

/// What a respondent sees through a share link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicForm {
    pub link: String,
    pub topic: String,
    pub description: String,
    #[serde(rename = "type")]
    pub visibility: FormVisibility,
    pub categories: Vec<String>,
    pub fields: Vec<Field>,
}

impl From<FormDetail> for PublicForm {
    fn from(d: FormDetail) -> Self {
        Self {
            link: d.form.link,
            topic: d.form.topic,
            description: d.form.description,
            visibility: d.form.visibility,
            categories: d.form.categories,
            fields: d.fields,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Submission {
    pub id: Id,
    pub form_id: Id,
    #[schema(value_type = Object)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewSubmission {
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: Id,
    pub form_id: Id,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub updated_at: DateTime<Utc>,
}

/// Set (or clear with `status: null`) one calendar cell.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetAttendance {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CellRef {
    pub student_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Draft {
    pub key: String,
    pub user_id: String,
    #[schema(value_type = Object)]
    pub content: Value,
    pub updated_at: DateTime<Utc>,
}
