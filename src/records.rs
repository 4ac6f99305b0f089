use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Staff,
}

impl Role {
    /// "admin" and "teacher" positions keep their role; every other position is staff.
    pub fn from_position(position: &str) -> Role {
        let p = position.trim();
        if p.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else if p.eq_ignore_ascii_case("teacher") {
            Role::Teacher
        } else {
            Role::Staff
        }
    }

    pub fn can_log_in(self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Staff => "staff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<AttendanceStatus> {
        let t = raw.trim();
        if t.eq_ignore_ascii_case("present") {
            Some(AttendanceStatus::Present)
        } else if t.eq_ignore_ascii_case("absent") {
            Some(AttendanceStatus::Absent)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: u64,
    pub name: String,
    pub contact: String,
    pub position: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: u64,
    pub name: String,
    pub age: u32,
    pub class_id: String,
    pub marks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub attendance_id: u64,
    pub class_id: String,
    pub student_id: u64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub class_id: String,
    pub teacher_id: u64,
    pub class_name: Option<String>,
    pub date: Option<NaiveDate>,
    /// Minutes.
    pub duration: Option<u32>,
    pub max_students: Option<u32>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub lesson_id: u64,
    pub teacher_id: u64,
    pub class_id: String,
    pub subject: String,
    pub details: String,
    pub date: Option<NaiveDate>,
    pub objectives: String,
    pub assessment: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeDraft {
    pub name: String,
    pub contact: String,
    pub position: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentDraft {
    pub name: String,
    pub age: u32,
    pub class_id: String,
    pub marks: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleDraft {
    pub class_id: String,
    pub teacher_id: u64,
    pub date: Option<NaiveDate>,
    pub class_name: Option<String>,
    pub duration: Option<u32>,
    pub max_students: Option<u32>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LessonPlanDraft {
    pub class_id: String,
    pub subject: String,
    pub details: String,
    pub date: Option<NaiveDate>,
    pub objectives: String,
    pub assessment: String,
}

// Patches: `None` leaves a field alone, `Some` overwrites it (including with an
// empty string or zero). Nullable columns take `Some(None)` to clear.

#[derive(Debug, Clone, Default)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub position: Option<String>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub class_id: Option<String>,
    pub marks: Option<Option<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulePatch {
    pub teacher_id: Option<u64>,
    pub class_name: Option<Option<String>>,
    pub duration: Option<Option<u32>>,
    pub max_students: Option<Option<u32>>,
    pub subject: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct LessonPlanPatch {
    pub class_id: Option<String>,
    pub subject: Option<String>,
    pub details: Option<String>,
    pub date: Option<Option<NaiveDate>>,
    pub objectives: Option<String>,
    pub assessment: Option<String>,
}

impl Employee {
    pub fn apply(&mut self, patch: EmployeePatch) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.contact {
            self.contact = v;
        }
        if let Some(v) = patch.position {
            self.role = Role::from_position(&v);
            self.position = v;
        }
        if let Some(v) = patch.username {
            self.username = v;
        }
        if let Some(v) = patch.password {
            self.password = v;
        }
        if !self.role.can_log_in() {
            self.username = None;
            self.password = None;
        }
    }
}

impl Student {
    pub fn apply(&mut self, patch: StudentPatch) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.age {
            self.age = v;
        }
        if let Some(v) = patch.class_id {
            self.class_id = v;
        }
        if let Some(v) = patch.marks {
            self.marks = v;
        }
    }
}

impl Schedule {
    pub fn apply(&mut self, patch: SchedulePatch) {
        if let Some(v) = patch.teacher_id {
            self.teacher_id = v;
        }
        if let Some(v) = patch.class_name {
            self.class_name = v;
        }
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        if let Some(v) = patch.max_students {
            self.max_students = v;
        }
        if let Some(v) = patch.subject {
            self.subject = v;
        }
    }
}

impl LessonPlan {
    pub fn apply(&mut self, patch: LessonPlanPatch) {
        if let Some(v) = patch.class_id {
            self.class_id = v;
        }
        if let Some(v) = patch.subject {
            self.subject = v;
        }
        if let Some(v) = patch.details {
            self.details = v;
        }
        if let Some(v) = patch.date {
            self.date = v;
        }
        if let Some(v) = patch.objectives {
            self.objectives = v;
        }
        if let Some(v) = patch.assessment {
            self.assessment = v;
        }
    }
}
