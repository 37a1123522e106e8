//! Attendance derived from form submissions.
//!
//! Every submission is one attendance entry on the UTC calendar date it was
//! created. Entries are grouped by date into sessions; explicit
//! [`AttendanceRecord`]s set from the calendar override whatever the
//! submissions said for the same student and date.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use utoipa::ToSchema;

use crate::models::{AttendanceRecord, AttendanceStatus, Field, Id, Submission};

// Compared against answer keys folded by `fold_key`.
const STATUS_KEYS: &[&str] = &["status", "attendancestatus"];
const STUDENT_KEYS: &[&str] = &["studentid", "email", "name"];
const NAME_KEYS: &[&str] = &["name", "studentname", "fullname"];

/// What to do with a submission that carries no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingStatusPolicy {
    #[default]
    AssumePresent,
    /// Keep the entry in the session total but in none of the status counts.
    Exclude,
}

impl MissingStatusPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assume_present" | "present" => Some(Self::AssumePresent),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RowError {
    #[error("submission {0} data is not an object")]
    NotAnObject(Id),
    #[error("submission {id} has unknown status {value}")]
    UnknownStatus { id: Id, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub student_id: String,
    pub name: Option<String>,
    pub date: NaiveDate,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub date: NaiveDate,
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub unmarked: usize,
    /// Percentage of present entries, one decimal.
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Summary {
    pub total_students: usize,
    pub total_sessions: usize,
    pub total_present: usize,
    pub total_absent: usize,
    pub total_late: usize,
    pub average_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceReport {
    pub sessions: Vec<Session>,
    pub summary: Summary,
    #[serde(skip)]
    students: HashSet<String>,
    #[serde(skip)]
    raw_rates: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudentInfo {
    pub student_id: String,
    pub name: Option<String>,
    pub sessions: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub rate: f64,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 * 100.0 }
}

fn string_at(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `"Student ID"`, `"student_id"` and `"studentId"` all fold to `"studentid"`.
fn fold_key(key: &str) -> String {
    key.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

/// Submissions may key answers by label or by field id. Returns the answers
/// keyed by folded label; a literal key wins over an id-keyed answer.
fn answers_by_label(obj: &Map<String, Value>, fields: &[Field]) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in obj {
        out.entry(fold_key(k)).or_insert_with(|| v.clone());
    }
    for f in fields {
        if let Some(v) = obj.get(&f.id.to_string()) {
            out.entry(fold_key(&f.label)).or_insert_with(|| v.clone());
        }
    }
    out
}

/// Reads one submission into an entry. `fields` are the form's fields, used
/// to resolve answers stored under field ids.
pub fn entry_from_submission(
    s: &Submission,
    fields: &[Field],
    policy: MissingStatusPolicy,
) -> Result<Entry, RowError> {
    let obj = answers_by_label(s.data.as_object().ok_or(RowError::NotAnObject(s.id))?, fields);
    let status = match STATUS_KEYS.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null())) {
        None => match policy {
            MissingStatusPolicy::AssumePresent => Some(AttendanceStatus::Present),
            MissingStatusPolicy::Exclude => None,
        },
        Some(v) => {
            let parsed = v.as_str().and_then(AttendanceStatus::parse);
            Some(parsed.ok_or_else(|| RowError::UnknownStatus { id: s.id, value: v.to_string() })?)
        }
    };
    Ok(Entry {
        student_id: string_at(&obj, STUDENT_KEYS).unwrap_or_else(|| format!("submission-{}", s.id)),
        name: string_at(&obj, NAME_KEYS),
        date: s.created_at.date_naive(),
        status,
    })
}

/// Merges submissions and explicit records into one entry per
/// (date, student). Unreadable submissions are logged and skipped.
pub fn collect_entries(
    submissions: &[Submission],
    fields: &[Field],
    records: &[AttendanceRecord],
    policy: MissingStatusPolicy,
) -> Vec<Entry> {
    let mut ordered: Vec<&Submission> = submissions.iter().collect();
    ordered.sort_by_key(|s| (s.created_at, s.id));

    let mut cells: BTreeMap<(NaiveDate, String), Entry> = BTreeMap::new();
    for s in ordered {
        match entry_from_submission(s, fields, policy) {
            Ok(mut entry) => {
                // latest submission of the day wins
                let key = (entry.date, entry.student_id.clone());
                if entry.name.is_none() {
                    entry.name = cells.get(&key).and_then(|e| e.name.clone());
                }
                cells.insert(key, entry);
            }
            Err(e) => warn!(form_id = s.form_id, "skipping submission in attendance report: {e}"),
        }
    }
    for r in records {
        let key = (r.date, r.student_id.clone());
        let name = cells.get(&key).and_then(|e| e.name.clone());
        cells.insert(
            key,
            Entry { student_id: r.student_id.clone(), name, date: r.date, status: Some(r.status) },
        );
    }
    cells.into_values().collect()
}

pub fn report_from_entries(entries: &[Entry]) -> AttendanceReport {
    let mut by_date: BTreeMap<NaiveDate, Session> = BTreeMap::new();
    let mut students = HashSet::new();
    for e in entries {
        students.insert(e.student_id.clone());
        let session = by_date.entry(e.date).or_insert_with(|| Session {
            date: e.date,
            total: 0,
            present: 0,
            absent: 0,
            late: 0,
            unmarked: 0,
            rate: 0.0,
        });
        session.total += 1;
        match e.status {
            Some(AttendanceStatus::Present) => session.present += 1,
            Some(AttendanceStatus::Absent) => session.absent += 1,
            Some(AttendanceStatus::Late) => session.late += 1,
            None => session.unmarked += 1,
        }
    }

    let mut raw_rates = Vec::with_capacity(by_date.len());
    let sessions: Vec<Session> = by_date
        .into_values()
        .map(|mut s| {
            let raw = percent(s.present, s.total);
            raw_rates.push(raw);
            s.rate = round1(raw);
            s
        })
        .collect();

    let mut report = AttendanceReport { sessions, summary: Summary::default(), students, raw_rates };
    report.summary = summarize(std::slice::from_ref(&report));
    report
}

pub fn build_report(
    submissions: &[Submission],
    fields: &[Field],
    records: &[AttendanceRecord],
    policy: MissingStatusPolicy,
) -> AttendanceReport {
    report_from_entries(&collect_entries(submissions, fields, records, policy))
}

/// Global aggregates across several reports (one per form).
pub fn merge_summaries(reports: &[AttendanceReport]) -> Summary {
    summarize(reports)
}

fn summarize(reports: &[AttendanceReport]) -> Summary {
    let mut students: HashSet<&str> = HashSet::new();
    let mut summary = Summary::default();
    let mut rate_sum = 0.0;
    for r in reports {
        students.extend(r.students.iter().map(String::as_str));
        for s in &r.sessions {
            summary.total_sessions += 1;
            summary.total_present += s.present;
            summary.total_absent += s.absent;
            summary.total_late += s.late;
        }
        rate_sum += r.raw_rates.iter().sum::<f64>();
    }
    summary.total_students = students.len();
    if summary.total_sessions > 0 {
        summary.average_rate = round1(rate_sum / summary.total_sessions as f64);
    }
    summary
}

/// Per-student view used by the students-info endpoint, sorted by id.
pub fn students(entries: &[Entry]) -> Vec<StudentInfo> {
    let mut by_student: BTreeMap<&str, StudentInfo> = BTreeMap::new();
    for e in entries {
        let info = by_student.entry(e.student_id.as_str()).or_insert_with(|| StudentInfo {
            student_id: e.student_id.clone(),
            name: None,
            sessions: 0,
            present: 0,
            absent: 0,
            late: 0,
            rate: 0.0,
            first_seen: e.date,
            last_seen: e.date,
        });
        info.sessions += 1;
        match e.status {
            Some(AttendanceStatus::Present) => info.present += 1,
            Some(AttendanceStatus::Absent) => info.absent += 1,
            Some(AttendanceStatus::Late) => info.late += 1,
            None => {}
        }
        if info.name.is_none() {
            info.name = e.name.clone();
        }
        info.first_seen = info.first_seen.min(e.date);
        info.last_seen = info.last_seen.max(e.date);
    }
    by_student
        .into_values()
        .map(|mut i| {
            i.rate = round1(percent(i.present, i.sessions));
            i
        })
        .collect()
}
