use crate::records::AttendanceStatus;
use crate::store::RecordStore;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spread {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Mean and sample standard deviation. Fewer than two values have no spread.
pub fn spread<I>(values: I) -> Spread
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    let count = values.len();
    if count == 0 {
        return Spread::default();
    }
    let mean = values.iter().sum::<f64>() / count as f64;
    let std_dev = if count < 2 {
        0.0
    } else {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (count - 1) as f64).sqrt()
    };
    Spread {
        count,
        mean,
        std_dev,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReportRow {
    pub student_id: u64,
    pub student_name: Option<String>,
    pub status: AttendanceStatus,
    pub attendance_id: u64,
    pub class_id: String,
    pub date: NaiveDate,
}

/// Rows for one class on one day, joined with student names. `None` when
/// nothing was marked.
pub fn attendance_report(
    store: &RecordStore,
    class_id: &str,
    date: NaiveDate,
) -> Option<Vec<AttendanceReportRow>> {
    let rows: Vec<AttendanceReportRow> = store
        .attendance()
        .iter()
        .filter(|a| a.class_id == class_id && a.date == date)
        .map(|a| AttendanceReportRow {
            student_id: a.student_id,
            student_name: store.student(a.student_id).map(|s| s.name.clone()),
            status: a.status,
            attendance_id: a.attendance_id,
            class_id: a.class_id.clone(),
            date: a.date,
        })
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub records: usize,
    pub present: usize,
    pub present_rate: f64,
    pub present_rate_std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub class_id: String,
    pub attendance: AttendanceStats,
    pub marks: MarkStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn finite(s: Spread) -> Option<Spread> {
    if s.mean.is_finite() && s.std_dev.is_finite() {
        Some(s)
    } else {
        None
    }
}

/// Present-rate and marks statistics for a class. A statistic that comes out
/// non-finite is zeroed and described in `error`; this never fails.
pub fn analysis_report(store: &RecordStore, class_id: &str) -> AnalysisReport {
    let mut errors: Vec<String> = Vec::new();

    let flags: Vec<f64> = store
        .attendance()
        .iter()
        .filter(|a| a.class_id == class_id)
        .map(|a| match a.status {
            AttendanceStatus::Present => 1.0,
            AttendanceStatus::Absent => 0.0,
        })
        .collect();
    let present = flags.iter().filter(|f| **f > 0.0).count();
    let rate = spread(flags);
    let attendance = AttendanceStats {
        records: rate.count,
        present,
        present_rate: rate.mean,
        present_rate_std_dev: rate.std_dev,
    };

    let marks = store
        .students()
        .iter()
        .filter(|s| s.class_id == class_id)
        .filter_map(|s| s.marks);
    let marks = match finite(spread(marks)) {
        Some(s) => MarkStats {
            count: s.count,
            mean: s.mean,
            std_dev: s.std_dev,
        },
        None => {
            errors.push("marks statistics are not finite; check for NaN or infinite marks".to_string());
            MarkStats::default()
        }
    };

    AnalysisReport {
        class_id: class_id.to_string(),
        attendance,
        marks,
        error: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    }
}
