//! Checks applied to form definitions before they are stored and to
//! respondent submissions before they are accepted.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::models::{Field, FieldType, FormPayload, FormVisibility};
use crate::storage::valid_hash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    Required,
    NotANumber,
    InvalidEmail,
    InvalidDate,
    NotABoolean,
    NotAnOption,
    NotText,
    InvalidUpload,
}

impl Issue {
    pub fn message(&self) -> &'static str {
        match self {
            Issue::Required => "this field is required",
            Issue::NotANumber => "expected a number",
            Issue::InvalidEmail => "expected an email address",
            Issue::InvalidDate => "expected a date",
            Issue::NotABoolean => "expected true or false",
            Issue::NotAnOption => "value is not one of the options",
            Issue::NotText => "expected text",
            Issue::InvalidUpload => "expected an uploaded file reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field_id: i64,
    pub label: String,
    pub issue: Issue,
}

/// Problems with a form definition, reported all at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FormProblem {
    MissingTopic,
    MissingDescription,
    NoFields,
    MissingAccessCode,
    BlankLabel { index: usize },
    MissingOptions { index: usize, label: String },
}

pub fn validate_form_payload(payload: &FormPayload) -> Result<(), Vec<FormProblem>> {
    let mut problems = Vec::new();
    if payload.topic.trim().is_empty() {
        problems.push(FormProblem::MissingTopic);
    }
    if payload.description.trim().is_empty() {
        problems.push(FormProblem::MissingDescription);
    }
    if payload.fields.is_empty() {
        problems.push(FormProblem::NoFields);
    }
    if payload.visibility == FormVisibility::Private
        && payload.access_code.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        problems.push(FormProblem::MissingAccessCode);
    }
    for (index, f) in payload.fields.iter().enumerate() {
        if f.label.trim().is_empty() {
            problems.push(FormProblem::BlankLabel { index });
        } else if f.field_type.has_options() && f.options.iter().all(|o| o.trim().is_empty()) {
            problems.push(FormProblem::MissingOptions { index, label: f.label.clone() });
        }
    }
    if problems.is_empty() { Ok(()) } else { Err(problems) }
}

/// Validates a submission against the form's fields and returns the data
/// object on success. Values are looked up by field id, then by label.
pub fn validate_submission(fields: &[Field], data: &Value) -> Result<Map<String, Value>, Vec<FieldError>> {
    // anything other than an object carries no answers
    let empty = Map::new();
    let obj = data.as_object().unwrap_or(&empty);

    let mut errors = Vec::new();
    for field in fields {
        let value = lookup(obj, field);
        if is_blank(field, value) {
            if field.required {
                errors.push(FieldError::new(field, Issue::Required));
            }
            continue;
        }
        if let Some(v) = value {
            if let Err(issue) = check_type(field, v) {
                errors.push(FieldError::new(field, issue));
            }
        }
    }
    if errors.is_empty() { Ok(obj.clone()) } else { Err(errors) }
}

impl FieldError {
    pub fn new(field: &Field, issue: Issue) -> Self {
        FieldError { field_id: field.id, label: field.label.clone(), issue }
    }
}

/// Upload hashes answered for `file` fields, paired with their field.
/// Expects answers that already passed [`validate_submission`].
pub fn upload_refs<'a>(fields: &'a [Field], answers: &'a Map<String, Value>) -> Vec<(&'a Field, &'a str)> {
    fields
        .iter()
        .filter(|f| f.field_type == FieldType::File)
        .filter_map(|f| lookup(answers, f).and_then(Value::as_str).map(|hash| (f, hash)))
        .collect()
}

fn lookup<'a>(obj: &'a Map<String, Value>, field: &Field) -> Option<&'a Value> {
    obj.get(&field.id.to_string()).or_else(|| obj.get(&field.label))
}

fn is_blank(field: &Field, value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Bool(false)) => field.field_type == FieldType::Checkbox,
        _ => false,
    }
}

fn check_type(field: &Field, v: &Value) -> Result<(), Issue> {
    match field.field_type {
        FieldType::Text | FieldType::Textarea => match v {
            Value::String(_) | Value::Number(_) => Ok(()),
            _ => Err(Issue::NotText),
        },
        FieldType::Number => match v {
            Value::Number(_) => Ok(()),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
            _ => Err(Issue::NotANumber),
        },
        FieldType::Email => match v.as_str() {
            Some(s) if looks_like_email(s) => Ok(()),
            _ => Err(Issue::InvalidEmail),
        },
        FieldType::Date => match v.as_str() {
            Some(s) if parse_date(s).is_some() => Ok(()),
            _ => Err(Issue::InvalidDate),
        },
        FieldType::Checkbox => match v {
            Value::Bool(_) => Ok(()),
            _ => Err(Issue::NotABoolean),
        },
        FieldType::Dropdown | FieldType::Select => {
            if field.options.is_empty() {
                return Ok(());
            }
            let chosen: Vec<&str> = match v {
                Value::String(s) => vec![s.as_str()],
                // multi-select
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => return Err(Issue::NotAnOption),
            };
            let all_known = chosen.iter().all(|c| field.options.iter().any(|o| o == c));
            if !chosen.is_empty() && all_known { Ok(()) } else { Err(Issue::NotAnOption) }
        }
        FieldType::File => match v.as_str() {
            Some(s) if valid_hash(s) => Ok(()),
            _ => Err(Issue::InvalidUpload),
        },
    }
}

fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    let Some((local, domain)) = s.split_once('@') else { return false };
    !local.is_empty()
        && !domain.contains('@')
        && !s.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false)
}

/// Accepts a plain calendar date or a full RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
}
