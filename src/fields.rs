//! Diff-and-patch planning for a form's field set.
//!
//! Updates send the complete desired list of fields. Rather than deleting
//! everything and recreating it, the repositories apply the minimal plan
//! computed here, so untouched fields keep their ids.

use std::collections::{HashMap, HashSet};

use crate::models::{Field, Id, NewField};

/// A field as it should exist after the update, with its display order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedField {
    pub position: i32,
    pub field: NewField,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldPlan {
    pub insert: Vec<PlannedField>,
    pub update: Vec<(Id, PlannedField)>,
    pub delete: Vec<Id>,
}

impl FieldPlan {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

pub fn plan_field_changes(existing: &[Field], incoming: &[NewField]) -> FieldPlan {
    let by_id: HashMap<Id, &Field> = existing.iter().map(|f| (f.id, f)).collect();
    let mut kept: HashSet<Id> = HashSet::new();
    let mut plan = FieldPlan::default();

    for (idx, nf) in incoming.iter().enumerate() {
        let planned = PlannedField { position: idx as i32, field: nf.clone() };
        // a duplicated id in the payload only claims the existing row once
        match nf.id.and_then(|id| by_id.get(&id)).filter(|f| !kept.contains(&f.id)) {
            Some(current) => {
                kept.insert(current.id);
                if differs(current, &planned) {
                    plan.update.push((current.id, planned));
                }
            }
            None => plan.insert.push(planned),
        }
    }

    plan.delete = existing
        .iter()
        .filter(|f| !kept.contains(&f.id))
        .map(|f| f.id)
        .collect();
    plan
}

fn differs(current: &Field, planned: &PlannedField) -> bool {
    let nf = &planned.field;
    current.position != planned.position
        || current.label != nf.label
        || current.field_type != nf.field_type
        || current.category != nf.category
        || current.required != nf.required
        || current.options != nf.options
        || current.placeholder != nf.placeholder
}

/// Materialise a planned field as a row of `form_id`.
pub fn to_field(id: Id, form_id: Id, planned: &PlannedField) -> Field {
    let nf = &planned.field;
    Field {
        id,
        form_id,
        label: nf.label.trim().to_string(),
        field_type: nf.field_type,
        category: nf.category.clone(),
        required: nf.required,
        options: nf.options.clone(),
        placeholder: nf.placeholder.clone(),
        position: planned.position,
    }
}
