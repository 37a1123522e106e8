use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::Entry;
use crate::models::AttendanceStatus;

/// How a cell is drawn in the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CellStyle {
    pub color: String,
    pub icon: String,
    pub label: String,
}

impl CellStyle {
    fn new(color: &str, icon: &str, label: &str) -> Self {
        Self { color: color.into(), icon: icon.into(), label: label.into() }
    }
}

pub fn style(status: Option<AttendanceStatus>) -> CellStyle {
    match status {
        Some(AttendanceStatus::Present) => CellStyle::new("green", "✓", "Present"),
        Some(AttendanceStatus::Absent) => CellStyle::new("red", "✗", "Absent"),
        Some(AttendanceStatus::Late) => CellStyle::new("amber", "⏱", "Late"),
        None => CellStyle::new("gray", "", "Not marked"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CellView {
    pub date: NaiveDate,
    pub status: Option<AttendanceStatus>,
    #[serde(flatten)]
    pub style: CellStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RowView {
    pub student_id: String,
    pub name: Option<String>,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GridView {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RowView>,
}

/// Student × date attendance matrix.
#[derive(Debug, Clone, Default)]
pub struct AttendanceGrid {
    dates: BTreeSet<NaiveDate>,
    names: BTreeMap<String, Option<String>>,
    cells: BTreeMap<(String, NaiveDate), AttendanceStatus>,
}

impl AttendanceGrid {
    pub fn from_entries(entries: &[Entry]) -> Self {
        let mut grid = Self::default();
        for e in entries {
            grid.dates.insert(e.date);
            let name = grid.names.entry(e.student_id.clone()).or_default();
            if name.is_none() {
                *name = e.name.clone();
            }
            if let Some(status) = e.status {
                grid.cells.insert((e.student_id.clone(), e.date), status);
            }
        }
        grid
    }

    pub fn status(&self, student_id: &str, date: NaiveDate) -> Option<AttendanceStatus> {
        self.cells.get(&(student_id.to_string(), date)).copied()
    }

    /// Advances one cell and returns its new status. Unknown students and
    /// dates join the grid.
    pub fn cycle(&mut self, student_id: &str, date: NaiveDate) -> AttendanceStatus {
        let next = AttendanceStatus::next(self.status(student_id, date));
        self.dates.insert(date);
        self.names.entry(student_id.to_string()).or_default();
        self.cells.insert((student_id.to_string(), date), next);
        next
    }

    pub fn view(&self) -> GridView {
        let dates: Vec<NaiveDate> = self.dates.iter().copied().collect();
        let rows = self
            .names
            .iter()
            .map(|(student_id, name)| RowView {
                student_id: student_id.clone(),
                name: name.clone(),
                cells: dates
                    .iter()
                    .map(|d| {
                        let status = self.status(student_id, *d);
                        CellView { date: *d, status, style: style(status) }
                    })
                    .collect(),
            })
            .collect();
        GridView { dates, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn cycling_four_times() {
        let mut grid = AttendanceGrid::default();
        let day = d("2024-03-01");
        assert_eq!(grid.status("s1", day), None);
        let seen: Vec<_> = (0..4).map(|_| grid.cycle("s1", day)).collect();
        assert_eq!(
            seen,
            vec![
                AttendanceStatus::Present,
                AttendanceStatus::Absent,
                AttendanceStatus::Late,
                AttendanceStatus::Present
            ]
        );
    }

    #[test]
    fn view_fills_missing_cells() {
        let entries = vec![
            Entry { student_id: "a".into(), name: Some("Ann".into()), date: d("2024-03-01"), status: Some(AttendanceStatus::Late) },
            Entry { student_id: "b".into(), name: None, date: d("2024-03-02"), status: Some(AttendanceStatus::Present) },
        ];
        let view = AttendanceGrid::from_entries(&entries).view();
        assert_eq!(view.dates.len(), 2);
        assert_eq!(view.rows.len(), 2);
        let ann = &view.rows[0];
        assert_eq!(ann.name.as_deref(), Some("Ann"));
        assert_eq!(ann.cells[0].style.color, "amber");
        assert_eq!(ann.cells[1].status, None);
        assert_eq!(ann.cells[1].style.color, "gray");
        assert_eq!(view.rows[1].cells[1].style.icon, "✓");
    }
}
