use crate::error::{ImportError, Result, StoreError};
use crate::import;
use crate::persist::{decode_table, encode_table, CsvDir, Persistence};
use crate::records::{
    AttendanceRecord, AttendanceStatus, Employee, EmployeeDraft, EmployeePatch, LessonPlan,
    LessonPlanDraft, LessonPlanPatch, Role, Schedule, ScheduleDraft, SchedulePatch, Student,
    StudentDraft, StudentPatch,
};
use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub const EMPLOYEES: &str = "employees";
pub const STUDENTS: &str = "students";
pub const ATTENDANCE: &str = "attendance";
pub const SCHEDULES: &str = "schedules";
pub const LESSON_PLANS: &str = "lesson_plans";

const EMPLOYEE_HEADERS: [&str; 7] = [
    "employee_id",
    "name",
    "contact",
    "position",
    "username",
    "password",
    "role",
];
const STUDENT_HEADERS: [&str; 5] = ["student_id", "name", "age", "class_id", "marks"];
const ATTENDANCE_HEADERS: [&str; 5] = ["attendance_id", "class_id", "student_id", "date", "status"];
const SCHEDULE_HEADERS: [&str; 7] = [
    "class_id",
    "teacher_id",
    "class_name",
    "date",
    "duration",
    "max_students",
    "subject",
];
const LESSON_PLAN_HEADERS: [&str; 8] = [
    "lesson_id",
    "teacher_id",
    "class_id",
    "subject",
    "details",
    "date",
    "objectives",
    "assessment",
];

/// Next sequential id: one past the current maximum, or 1 for an empty collection.
fn next_id<T>(rows: &[T], id: impl Fn(&T) -> u64) -> u64 {
    rows.iter().map(id).max().map_or(1, |m| m + 1)
}

fn load_table<R>(port: &mut dyn Persistence, table: &str, headers: &[&str]) -> Result<Vec<R>>
where
    R: Serialize + DeserializeOwned,
{
    match port.read(table)? {
        Some(bytes) => decode_table(table, &bytes),
        None => {
            // First run: leave a header-only file behind.
            port.write(table, &encode_table::<R>(table, headers, &[])?)?;
            Ok(Vec::new())
        }
    }
}

/// Decodes `bytes` as the typed rows of `table` without keeping them.
pub fn check_table(table: &str, bytes: &[u8]) -> Result<()> {
    match table {
        EMPLOYEES => decode_table::<Employee>(table, bytes).map(drop),
        STUDENTS => decode_table::<Student>(table, bytes).map(drop),
        ATTENDANCE => decode_table::<AttendanceRecord>(table, bytes).map(drop),
        SCHEDULES => decode_table::<Schedule>(table, bytes).map(drop),
        LESSON_PLANS => decode_table::<LessonPlan>(table, bytes).map(drop),
        other => Err(StoreError::Corrupt {
            table: other.to_string(),
            message: "unknown table".to_string(),
        }),
    }
}

/// Opens (creating on first run) the CSV tables under `<workspace>/csv`.
pub fn open_workspace(workspace: &Path) -> anyhow::Result<RecordStore> {
    let dir = CsvDir::open(workspace).with_context(|| {
        format!(
            "failed to prepare workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    RecordStore::open(Box::new(dir)).with_context(|| {
        format!(
            "failed to load records from {}",
            workspace.to_string_lossy()
        )
    })
}

/// All five collections, held in memory and rewritten in full after each mutation.
pub struct RecordStore {
    port: Box<dyn Persistence>,
    employees: Vec<Employee>,
    students: Vec<Student>,
    attendance: Vec<AttendanceRecord>,
    schedules: Vec<Schedule>,
    lesson_plans: Vec<LessonPlan>,
}

impl RecordStore {
    pub fn open(mut port: Box<dyn Persistence>) -> Result<RecordStore> {
        let employees = load_table(port.as_mut(), EMPLOYEES, &EMPLOYEE_HEADERS)?;
        let students = load_table(port.as_mut(), STUDENTS, &STUDENT_HEADERS)?;
        let attendance = load_table(port.as_mut(), ATTENDANCE, &ATTENDANCE_HEADERS)?;
        let schedules = load_table(port.as_mut(), SCHEDULES, &SCHEDULE_HEADERS)?;
        let lesson_plans = load_table(port.as_mut(), LESSON_PLANS, &LESSON_PLAN_HEADERS)?;
        info!(
            employees = employees.len(),
            students = students.len(),
            attendance = attendance.len(),
            schedules = schedules.len(),
            lesson_plans = lesson_plans.len(),
            "record store loaded"
        );
        Ok(RecordStore {
            port,
            employees,
            students,
            attendance,
            schedules,
            lesson_plans,
        })
    }

    fn persist(&mut self) -> Result<()> {
        let employees = encode_table(EMPLOYEES, &EMPLOYEE_HEADERS, &self.employees)?;
        let students = encode_table(STUDENTS, &STUDENT_HEADERS, &self.students)?;
        let attendance = encode_table(ATTENDANCE, &ATTENDANCE_HEADERS, &self.attendance)?;
        let schedules = encode_table(SCHEDULES, &SCHEDULE_HEADERS, &self.schedules)?;
        let lesson_plans = encode_table(LESSON_PLANS, &LESSON_PLAN_HEADERS, &self.lesson_plans)?;
        self.port.write(EMPLOYEES, &employees)?;
        self.port.write(STUDENTS, &students)?;
        self.port.write(ATTENDANCE, &attendance)?;
        self.port.write(SCHEDULES, &schedules)?;
        self.port.write(LESSON_PLANS, &lesson_plans)?;
        Ok(())
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn attendance(&self) -> &[AttendanceRecord] {
        &self.attendance
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn lesson_plans(&self) -> &[LessonPlan] {
        &self.lesson_plans
    }

    pub fn employee(&self, employee_id: u64) -> Option<&Employee> {
        self.employees.iter().find(|e| e.employee_id == employee_id)
    }

    pub fn employee_by_username(&self, username: &str) -> Option<&Employee> {
        self.employees
            .iter()
            .find(|e| e.username.as_deref() == Some(username))
    }

    pub fn student(&self, student_id: u64) -> Option<&Student> {
        self.students.iter().find(|s| s.student_id == student_id)
    }

    pub fn lesson_plan(&self, lesson_id: u64) -> Option<&LessonPlan> {
        self.lesson_plans.iter().find(|l| l.lesson_id == lesson_id)
    }

    pub fn schedules_for_teacher(&self, teacher_id: u64) -> Vec<&Schedule> {
        self.schedules
            .iter()
            .filter(|s| s.teacher_id == teacher_id)
            .collect()
    }

    pub fn lesson_plans_for_teacher(&self, teacher_id: u64) -> Vec<&LessonPlan> {
        self.lesson_plans
            .iter()
            .filter(|l| l.teacher_id == teacher_id)
            .collect()
    }

    pub fn has_admin(&self) -> bool {
        self.employees.iter().any(|e| e.role == Role::Admin)
    }

    /// Plain-text credential check. Only roles that can log in match.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| {
            e.role.can_log_in()
                && e.username.as_deref() == Some(username)
                && e.password.as_deref() == Some(password)
        })
    }

    pub fn add_employee(&mut self, draft: EmployeeDraft) -> Result<u64> {
        let employee_id = next_id(&self.employees, |e| e.employee_id);
        let role = Role::from_position(&draft.position);
        let (username, password) = if role.can_log_in() {
            (draft.username, draft.password)
        } else {
            (None, None)
        };
        self.employees.push(Employee {
            employee_id,
            name: draft.name,
            contact: draft.contact,
            position: draft.position,
            username,
            password,
            role,
        });
        self.persist()?;
        info!(employee_id, role = role.as_str(), "employee added");
        Ok(employee_id)
    }

    pub fn update_employee(&mut self, employee_id: u64, patch: EmployeePatch) -> Result<bool> {
        let Some(e) = self
            .employees
            .iter_mut()
            .find(|e| e.employee_id == employee_id)
        else {
            debug!(employee_id, "update_employee: not found");
            return Ok(false);
        };
        e.apply(patch);
        self.persist()?;
        info!(employee_id, "employee updated");
        Ok(true)
    }

    /// Also drops the employee's schedule rows. Attendance and lesson plans stay.
    pub fn remove_employee(&mut self, employee_id: u64) -> Result<()> {
        self.employees.retain(|e| e.employee_id != employee_id);
        self.schedules.retain(|s| s.teacher_id != employee_id);
        self.persist()?;
        info!(employee_id, "employee removed");
        Ok(())
    }

    pub fn add_student(&mut self, draft: StudentDraft) -> Result<u64> {
        let student_id = next_id(&self.students, |s| s.student_id);
        self.students.push(Student {
            student_id,
            name: draft.name,
            age: draft.age,
            class_id: draft.class_id,
            marks: draft.marks,
        });
        self.persist()?;
        info!(student_id, "student added");
        Ok(student_id)
    }

    pub fn update_student(&mut self, student_id: u64, patch: StudentPatch) -> Result<bool> {
        let Some(s) = self
            .students
            .iter_mut()
            .find(|s| s.student_id == student_id)
        else {
            debug!(student_id, "update_student: not found");
            return Ok(false);
        };
        s.apply(patch);
        self.persist()?;
        info!(student_id, "student updated");
        Ok(true)
    }

    pub fn update_student_mark(&mut self, student_id: u64, mark: Option<f64>) -> Result<bool> {
        self.update_student(
            student_id,
            StudentPatch {
                marks: Some(mark),
                ..Default::default()
            },
        )
    }

    pub fn remove_student(&mut self, student_id: u64) -> Result<()> {
        self.students.retain(|s| s.student_id != student_id);
        self.persist()?;
        info!(student_id, "student removed");
        Ok(())
    }

    /// Appends every row or none. Ids continue from the current maximum.
    pub fn import_students<R: Read>(&mut self, source: R) -> Result<Vec<u64>> {
        let drafts = import::parse_students(source)?;
        let first = next_id(&self.students, |s| s.student_id);
        let mut ids = Vec::with_capacity(drafts.len());
        for (offset, draft) in drafts.into_iter().enumerate() {
            let student_id = first + offset as u64;
            self.students.push(Student {
                student_id,
                name: draft.name,
                age: draft.age,
                class_id: draft.class_id,
                marks: draft.marks,
            });
            ids.push(student_id);
        }
        self.persist()?;
        info!(count = ids.len(), "students imported");
        Ok(ids)
    }

    pub fn import_students_from_path(&mut self, path: &Path) -> Result<Vec<u64>> {
        let file = std::fs::File::open(path).map_err(|e| {
            ImportError::Unreadable(format!("{}: {}", path.to_string_lossy(), e))
        })?;
        self.import_students(file)
    }

    /// Updates the row keyed by `(class_id, date)` or inserts one. `false` when
    /// no employee has `teacher_id`.
    pub fn assign_teacher_to_class(&mut self, draft: ScheduleDraft) -> Result<bool> {
        if self.employee(draft.teacher_id).is_none() {
            debug!(teacher_id = draft.teacher_id, "assign_teacher: unknown teacher");
            return Ok(false);
        }
        let existing = self
            .schedules
            .iter_mut()
            .find(|s| s.class_id == draft.class_id && s.date == draft.date);
        match existing {
            Some(row) => {
                row.apply(SchedulePatch {
                    teacher_id: Some(draft.teacher_id),
                    class_name: draft.class_name.map(Some),
                    duration: draft.duration.map(Some),
                    max_students: draft.max_students.map(Some),
                    subject: draft.subject.map(Some),
                });
            }
            None => self.schedules.push(Schedule {
                class_id: draft.class_id.clone(),
                teacher_id: draft.teacher_id,
                class_name: draft.class_name,
                date: draft.date,
                duration: draft.duration,
                max_students: draft.max_students,
                subject: draft.subject,
            }),
        }
        self.persist()?;
        info!(
            class_id = %draft.class_id,
            teacher_id = draft.teacher_id,
            "teacher assigned to class"
        );
        Ok(true)
    }

    /// `false` when the row is absent or the patch names an unknown teacher.
    pub fn update_schedule(
        &mut self,
        class_id: &str,
        date: Option<NaiveDate>,
        patch: SchedulePatch,
    ) -> Result<bool> {
        if let Some(teacher_id) = patch.teacher_id {
            if self.employee(teacher_id).is_none() {
                debug!(teacher_id, "update_schedule: unknown teacher");
                return Ok(false);
            }
        }
        let Some(row) = self
            .schedules
            .iter_mut()
            .find(|s| s.class_id == class_id && s.date == date)
        else {
            debug!(class_id, "update_schedule: not found");
            return Ok(false);
        };
        row.apply(patch);
        self.persist()?;
        info!(class_id, "schedule updated");
        Ok(true)
    }

    pub fn remove_schedule(&mut self, class_id: &str, date: Option<NaiveDate>) -> Result<()> {
        self.schedules
            .retain(|s| !(s.class_id == class_id && s.date == date));
        self.persist()?;
        info!(class_id, "schedule removed");
        Ok(())
    }

    /// No check that the class or student exists.
    pub fn mark_attendance(
        &mut self,
        class_id: &str,
        student_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> Result<u64> {
        let attendance_id = next_id(&self.attendance, |a| a.attendance_id);
        self.attendance.push(AttendanceRecord {
            attendance_id,
            class_id: class_id.to_string(),
            student_id,
            date,
            status,
        });
        self.persist()?;
        info!(
            attendance_id,
            class_id,
            student_id,
            status = status.as_str(),
            "attendance marked"
        );
        Ok(attendance_id)
    }

    pub fn add_lesson_plan(&mut self, teacher_id: u64, draft: LessonPlanDraft) -> Result<u64> {
        let lesson_id = next_id(&self.lesson_plans, |l| l.lesson_id);
        self.lesson_plans.push(LessonPlan {
            lesson_id,
            teacher_id,
            class_id: draft.class_id,
            subject: draft.subject,
            details: draft.details,
            date: draft.date,
            objectives: draft.objectives,
            assessment: draft.assessment,
        });
        self.persist()?;
        info!(lesson_id, teacher_id, "lesson plan added");
        Ok(lesson_id)
    }

    pub fn update_lesson_plan(&mut self, lesson_id: u64, patch: LessonPlanPatch) -> Result<bool> {
        let Some(l) = self
            .lesson_plans
            .iter_mut()
            .find(|l| l.lesson_id == lesson_id)
        else {
            debug!(lesson_id, "update_lesson_plan: not found");
            return Ok(false);
        };
        l.apply(patch);
        self.persist()?;
        info!(lesson_id, "lesson plan updated");
        Ok(true)
    }

    pub fn remove_lesson_plan(&mut self, lesson_id: u64) -> Result<()> {
        self.lesson_plans.retain(|l| l.lesson_id != lesson_id);
        self.persist()?;
        info!(lesson_id, "lesson plan removed");
        Ok(())
    }
}
