use crate::attendance::{AttendanceReport, Session, StudentInfo, Summary};
use crate::builder::{BuilderCommand, EditTarget, Editing, FieldChanges, FieldDraft, FieldId, FormBuilder, Section, SectionId};
use crate::calendar::{CellStyle, CellView, GridView, RowView};
use crate::models::*;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_forms,
        crate::routes::create_form,
        crate::routes::get_form,
        crate::routes::update_form,
        crate::routes::delete_form,
        crate::routes::share_form,
        crate::routes::list_submissions,
        crate::routes::save_draft,
        crate::routes::apply_draft_command,
        crate::routes::publish_draft,
        crate::routes::get_public_form,
        crate::routes::submit_form,
        crate::routes::students_info,
        crate::routes::attendance_overview,
        crate::routes::form_attendance,
        crate::routes::set_attendance,
        crate::routes::attendance_calendar,
        crate::routes::cycle_attendance,
        crate::routes::upload_file,
        crate::routes::auth_me,
    ),
    components(schemas(
        Form, Field, NewField, FormPayload, FormDetail, PublicForm,
        FormStatus, FormVisibility, FieldType, AttendanceStatus,
        Submission, NewSubmission, AttendanceRecord, SetAttendance, CellRef, Draft,
        FormBuilder, BuilderCommand, EditTarget, Editing, FieldChanges, FieldDraft, FieldId, Section, SectionId,
        AttendanceReport, Session, Summary, StudentInfo,
        CellStyle, CellView, RowView, GridView,
        crate::routes::ShareInfo, crate::routes::FormAttendance, crate::routes::AttendanceOverview,
        crate::routes::CycledCell, crate::routes::UploadResponse, crate::routes::MeResponse,
        crate::error::ApiErrorBody,
        crate::validation::FormProblem, crate::validation::FieldError, crate::validation::Issue,
        crate::builder::PublishError,
    )),
    tags(
        (name = "forms", description = "Form definitions and sharing"),
        (name = "submissions", description = "Public form access and responses"),
        (name = "attendance", description = "Attendance reports and calendar"),
    )
)]
pub struct ApiDoc;
