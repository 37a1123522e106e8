//! Inline form builder.
//!
//! The builder is the editable tree behind a draft: a title, a description
//! and an ordered list of sections, each holding fields. Every edit is a
//! [`BuilderCommand`] applied copy-on-write, so a rejected command leaves
//! the previous state untouched. The builder also tracks which parts are
//! currently open for editing, the same way the form editor toggles its
//! pencil/done affordances.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{FieldType, FormPayload, FormStatus, FormVisibility, NewField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SectionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FieldId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldDraft {
    pub id: FieldId,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDraft>,
}

/// Which editors are open. Title, description, section titles and field
/// labels toggle independently; only one field-detail editor is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Editing {
    #[serde(default)]
    pub title: bool,
    #[serde(default)]
    pub description: bool,
    #[serde(default)]
    pub sections: BTreeSet<SectionId>,
    #[serde(default)]
    pub labels: BTreeSet<FieldId>,
    #[serde(default)]
    pub field_detail: Option<FieldId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditTarget {
    Title,
    Description,
    SectionTitle { section: SectionId },
    FieldLabel { field: FieldId },
    FieldDetail { field: FieldId },
}

/// Partial update of one field; absent members stay as they are.
/// An empty `placeholder` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldChanges {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BuilderCommand {
    SetTitle { title: String },
    SetDescription { description: String },
    SetVisibility { visibility: FormVisibility },
    SetAccessCode { access_code: Option<String> },
    AddSection { title: String },
    RenameSection { section: SectionId, title: String },
    RemoveSection { section: SectionId },
    AddField {
        section: SectionId,
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default)]
        label: Option<String>,
    },
    UpdateField { field: FieldId, changes: FieldChanges },
    RemoveField { field: FieldId },
    MoveField { field: FieldId, section: SectionId, index: usize },
    BeginEdit { target: EditTarget },
    FinishEdit { target: EditTarget },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("unknown section {0:?}")]
    UnknownSection(SectionId),
    #[error("unknown field {0:?}")]
    UnknownField(FieldId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum PublishError {
    MissingTitle,
    MissingDescription,
    NoFields,
    MissingAccessCode,
    BlankLabel { field: FieldId },
    BlankSection { section: SectionId },
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::MissingTitle => write!(f, "form title is required"),
            PublishError::MissingDescription => write!(f, "form description is required"),
            PublishError::NoFields => write!(f, "add at least one field"),
            PublishError::MissingAccessCode => write!(f, "private forms need an access code"),
            PublishError::BlankLabel { field } => write!(f, "field {} has no label", field.0),
            PublishError::BlankSection { section } => write!(f, "section {} has no title", section.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FormBuilder {
    pub title: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub visibility: FormVisibility,
    #[serde(default)]
    pub access_code: Option<String>,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub editing: Editing,
    #[serde(default)]
    next_id: u64,
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormBuilder {
    /// An empty form with a single "General" section.
    pub fn new() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            visibility: FormVisibility::Public,
            access_code: None,
            sections: vec![Section { id: SectionId(1), title: "General".into(), fields: vec![] }],
            editing: Editing::default(),
            next_id: 1,
        }
    }

    fn alloc(&mut self) -> u64 {
        // drafts saved by older clients may lack next_id
        let max_seen = self
            .sections
            .iter()
            .flat_map(|s| std::iter::once(s.id.0).chain(s.fields.iter().map(|f| f.id.0)))
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_seen) + 1;
        self.next_id
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldDraft> {
        self.sections.iter().flat_map(|s| s.fields.iter()).find(|f| f.id == id)
    }

    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }

    fn section_mut(&mut self, id: SectionId) -> Result<&mut Section, BuilderError> {
        self.sections.iter_mut().find(|s| s.id == id).ok_or(BuilderError::UnknownSection(id))
    }

    fn field_mut(&mut self, id: FieldId) -> Result<&mut FieldDraft, BuilderError> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.fields.iter_mut())
            .find(|f| f.id == id)
            .ok_or(BuilderError::UnknownField(id))
    }

    fn take_field(&mut self, id: FieldId) -> Result<FieldDraft, BuilderError> {
        for s in &mut self.sections {
            if let Some(pos) = s.fields.iter().position(|f| f.id == id) {
                return Ok(s.fields.remove(pos));
            }
        }
        Err(BuilderError::UnknownField(id))
    }

    fn forget_field(&mut self, id: FieldId) {
        self.editing.labels.remove(&id);
        if self.editing.field_detail == Some(id) {
            self.editing.field_detail = None;
        }
    }

    fn check_target(&self, target: EditTarget) -> Result<(), BuilderError> {
        match target {
            EditTarget::Title | EditTarget::Description => Ok(()),
            EditTarget::SectionTitle { section } => {
                self.section(section).map(|_| ()).ok_or(BuilderError::UnknownSection(section))
            }
            EditTarget::FieldLabel { field } | EditTarget::FieldDetail { field } => {
                self.field(field).map(|_| ()).ok_or(BuilderError::UnknownField(field))
            }
        }
    }

    pub fn is_editing(&self, target: EditTarget) -> bool {
        match target {
            EditTarget::Title => self.editing.title,
            EditTarget::Description => self.editing.description,
            EditTarget::SectionTitle { section } => self.editing.sections.contains(&section),
            EditTarget::FieldLabel { field } => self.editing.labels.contains(&field),
            EditTarget::FieldDetail { field } => self.editing.field_detail == Some(field),
        }
    }

    /// Returns the state after `command`; `self` is left unchanged.
    pub fn apply(&self, command: BuilderCommand) -> Result<Self, BuilderError> {
        let mut next = self.clone();
        match command {
            BuilderCommand::SetTitle { title } => next.title = title,
            BuilderCommand::SetDescription { description } => next.description = description,
            BuilderCommand::SetVisibility { visibility } => next.visibility = visibility,
            BuilderCommand::SetAccessCode { access_code } => next.access_code = access_code,
            BuilderCommand::AddSection { title } => {
                let id = SectionId(next.alloc());
                next.sections.push(Section { id, title, fields: vec![] });
            }
            BuilderCommand::RenameSection { section, title } => next.section_mut(section)?.title = title,
            BuilderCommand::RemoveSection { section } => {
                let pos = next
                    .sections
                    .iter()
                    .position(|s| s.id == section)
                    .ok_or(BuilderError::UnknownSection(section))?;
                let removed = next.sections.remove(pos);
                next.editing.sections.remove(&section);
                for f in removed.fields {
                    next.forget_field(f.id);
                }
            }
            BuilderCommand::AddField { section, field_type, label } => {
                next.section_mut(section)?;
                let id = FieldId(next.alloc());
                let label = label.unwrap_or_else(|| "Untitled question".into());
                next.section_mut(section)?.fields.push(FieldDraft {
                    id,
                    label,
                    field_type,
                    required: false,
                    options: vec![],
                    placeholder: None,
                });
            }
            BuilderCommand::UpdateField { field, changes } => {
                let f = next.field_mut(field)?;
                if let Some(label) = changes.label {
                    f.label = label;
                }
                if let Some(t) = changes.field_type {
                    f.field_type = t;
                    if !t.has_options() {
                        f.options.clear();
                    }
                }
                if let Some(required) = changes.required {
                    f.required = required;
                }
                if let Some(options) = changes.options {
                    f.options = options;
                }
                if let Some(placeholder) = changes.placeholder {
                    f.placeholder = Some(placeholder).filter(|p| !p.is_empty());
                }
            }
            BuilderCommand::RemoveField { field } => {
                next.take_field(field)?;
                next.forget_field(field);
            }
            BuilderCommand::MoveField { field, section, index } => {
                next.section_mut(section)?;
                let moved = next.take_field(field)?;
                let target = next.section_mut(section)?;
                let index = index.min(target.fields.len());
                target.fields.insert(index, moved);
            }
            BuilderCommand::BeginEdit { target } => {
                next.check_target(target)?;
                match target {
                    EditTarget::Title => next.editing.title = true,
                    EditTarget::Description => next.editing.description = true,
                    EditTarget::SectionTitle { section } => {
                        next.editing.sections.insert(section);
                    }
                    EditTarget::FieldLabel { field } => {
                        next.editing.labels.insert(field);
                    }
                    EditTarget::FieldDetail { field } => next.editing.field_detail = Some(field),
                }
            }
            BuilderCommand::FinishEdit { target } => match target {
                EditTarget::Title => next.editing.title = false,
                EditTarget::Description => next.editing.description = false,
                EditTarget::SectionTitle { section } => {
                    next.editing.sections.remove(&section);
                }
                EditTarget::FieldLabel { field } => {
                    next.editing.labels.remove(&field);
                }
                EditTarget::FieldDetail { field } => {
                    if next.editing.field_detail == Some(field) {
                        next.editing.field_detail = None;
                    }
                }
            },
        }
        Ok(next)
    }

    pub fn validate_for_publish(&self) -> Result<(), Vec<PublishError>> {
        let mut problems = Vec::new();
        if self.title.trim().is_empty() {
            problems.push(PublishError::MissingTitle);
        }
        if self.description.trim().is_empty() {
            problems.push(PublishError::MissingDescription);
        }
        if self.field_count() == 0 {
            problems.push(PublishError::NoFields);
        }
        if self.visibility == FormVisibility::Private
            && self.access_code.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            problems.push(PublishError::MissingAccessCode);
        }
        for s in &self.sections {
            if s.title.trim().is_empty() {
                problems.push(PublishError::BlankSection { section: s.id });
            }
        }
        for f in self.sections.iter().flat_map(|s| s.fields.iter()) {
            if f.label.trim().is_empty() {
                problems.push(PublishError::BlankLabel { field: f.id });
            }
        }
        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }

    /// The create-form body for this draft: one field record per field,
    /// each categorised under its section's title.
    pub fn to_payload(&self) -> Result<FormPayload, Vec<PublishError>> {
        self.validate_for_publish()?;
        let titled: Vec<(String, &Section)> =
            self.sections.iter().map(|s| (s.title.trim().to_string(), s)).collect();
        let fields = titled
            .iter()
            .flat_map(|(title, s)| {
                s.fields.iter().map(move |f| NewField {
                    id: None,
                    label: f.label.trim().to_string(),
                    field_type: f.field_type,
                    category: title.clone(),
                    required: f.required,
                    options: f.options.iter().map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect(),
                    placeholder: f.placeholder.clone(),
                })
            })
            .collect();
        Ok(FormPayload {
            topic: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            status: Some(FormStatus::Active),
            visibility: self.visibility,
            categories: titled.iter().map(|(t, _)| t.clone()).collect(),
            access_code: match self.visibility {
                FormVisibility::Private => self.access_code.as_ref().map(|c| c.trim().to_string()),
                FormVisibility::Public => None,
            },
            fields,
        })
    }
}
