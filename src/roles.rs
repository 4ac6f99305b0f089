use crate::calc::{self, AnalysisReport, AttendanceReportRow};
use crate::error::Result;
use crate::records::{
    AttendanceStatus, Employee, EmployeeDraft, EmployeePatch, LessonPlan, LessonPlanDraft,
    LessonPlanPatch, Role, Schedule, ScheduleDraft, SchedulePatch, StudentDraft, StudentPatch,
};
use crate::store::RecordStore;
use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

fn resolve(store: &RecordStore, username: &str, role: Role) -> Option<u64> {
    store
        .employee_by_username(username)
        .filter(|e| e.role == role)
        .map(|e| e.employee_id)
}

/// Administrative operations bound to a logged-in admin.
pub struct Admin<'a> {
    store: &'a mut RecordStore,
    employee_id: u64,
}

impl<'a> Admin<'a> {
    pub fn bind(store: &'a mut RecordStore, username: &str) -> Option<Admin<'a>> {
        let employee_id = resolve(store, username, Role::Admin)?;
        Some(Admin { store, employee_id })
    }

    pub fn employee_id(&self) -> u64 {
        self.employee_id
    }

    pub fn store(&self) -> &RecordStore {
        &*self.store
    }

    pub fn add_employee(&mut self, draft: EmployeeDraft) -> Result<u64> {
        self.store.add_employee(draft)
    }

    pub fn update_employee(&mut self, employee_id: u64, patch: EmployeePatch) -> Result<bool> {
        self.store.update_employee(employee_id, patch)
    }

    pub fn remove_employee(&mut self, employee_id: u64) -> Result<()> {
        self.store.remove_employee(employee_id)
    }

    pub fn add_student(&mut self, draft: StudentDraft) -> Result<u64> {
        self.store.add_student(draft)
    }

    pub fn update_student(&mut self, student_id: u64, patch: StudentPatch) -> Result<bool> {
        self.store.update_student(student_id, patch)
    }

    pub fn remove_student(&mut self, student_id: u64) -> Result<()> {
        self.store.remove_student(student_id)
    }

    pub fn import_students<R: Read>(&mut self, source: R) -> Result<Vec<u64>> {
        self.store.import_students(source)
    }

    pub fn import_students_from_path(&mut self, path: &Path) -> Result<Vec<u64>> {
        self.store.import_students_from_path(path)
    }

    pub fn assign_teacher_to_class(&mut self, draft: ScheduleDraft) -> Result<bool> {
        self.store.assign_teacher_to_class(draft)
    }

    pub fn update_schedule(
        &mut self,
        class_id: &str,
        date: Option<NaiveDate>,
        patch: SchedulePatch,
    ) -> Result<bool> {
        self.store.update_schedule(class_id, date, patch)
    }

    pub fn remove_schedule(&mut self, class_id: &str, date: Option<NaiveDate>) -> Result<()> {
        self.store.remove_schedule(class_id, date)
    }

    pub fn attendance_report(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Option<Vec<AttendanceReportRow>> {
        calc::attendance_report(&*self.store, class_id, date)
    }

    pub fn analysis_report(&self, class_id: &str) -> AnalysisReport {
        calc::analysis_report(&*self.store, class_id)
    }
}

/// Classroom operations scoped to one teacher's own employee id.
pub struct Teacher<'a> {
    store: &'a mut RecordStore,
    employee_id: u64,
}

impl<'a> Teacher<'a> {
    pub fn bind(store: &'a mut RecordStore, username: &str) -> Option<Teacher<'a>> {
        let employee_id = resolve(store, username, Role::Teacher)?;
        Some(Teacher { store, employee_id })
    }

    pub fn employee_id(&self) -> u64 {
        self.employee_id
    }

    pub fn store(&self) -> &RecordStore {
        &*self.store
    }

    pub fn profile(&self) -> Option<&Employee> {
        self.store.employee(self.employee_id)
    }

    /// Position stays fixed; a teacher cannot change their own role.
    pub fn update_profile(&mut self, mut patch: EmployeePatch) -> Result<bool> {
        patch.position = None;
        self.store.update_employee(self.employee_id, patch)
    }

    pub fn assigned_classes(&self) -> Vec<&Schedule> {
        self.store.schedules_for_teacher(self.employee_id)
    }

    pub fn teaches(&self, class_id: &str) -> bool {
        self.store
            .schedules_for_teacher(self.employee_id)
            .iter()
            .any(|s| s.class_id == class_id)
    }

    /// `None` when the class is not on this teacher's schedule.
    pub fn mark_attendance(
        &mut self,
        class_id: &str,
        student_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> Result<Option<u64>> {
        if !self.teaches(class_id) {
            tracing::debug!(
                teacher_id = self.employee_id,
                class_id,
                "mark_attendance: class not assigned"
            );
            return Ok(None);
        }
        self.store
            .mark_attendance(class_id, student_id, date, status)
            .map(Some)
    }

    pub fn update_student_mark(&mut self, student_id: u64, mark: Option<f64>) -> Result<bool> {
        self.store.update_student_mark(student_id, mark)
    }

    pub fn lesson_plans(&self) -> Vec<&LessonPlan> {
        self.store.lesson_plans_for_teacher(self.employee_id)
    }

    pub fn add_lesson_plan(&mut self, draft: LessonPlanDraft) -> Result<u64> {
        self.store.add_lesson_plan(self.employee_id, draft)
    }

    fn owns_lesson(&self, lesson_id: u64) -> bool {
        self.store
            .lesson_plan(lesson_id)
            .is_some_and(|l| l.teacher_id == self.employee_id)
    }

    /// `false` for a missing plan or one that belongs to another teacher.
    pub fn update_lesson_plan(&mut self, lesson_id: u64, patch: LessonPlanPatch) -> Result<bool> {
        if !self.owns_lesson(lesson_id) {
            return Ok(false);
        }
        self.store.update_lesson_plan(lesson_id, patch)
    }

    pub fn remove_lesson_plan(&mut self, lesson_id: u64) -> Result<bool> {
        if !self.owns_lesson(lesson_id) {
            return Ok(false);
        }
        self.store.remove_lesson_plan(lesson_id)?;
        Ok(true)
    }

    pub fn attendance_report(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Option<Vec<AttendanceReportRow>> {
        calc::attendance_report(&*self.store, class_id, date)
    }

    pub fn analysis_report(&self, class_id: &str) -> AnalysisReport {
        calc::analysis_report(&*self.store, class_id)
    }
}
