use crate::api_error::ApiError;
use crate::db;
use crate::models::{Enrollment, Student};
use crate::schema::{attendance_records, courses, enrollments};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use derive_more::Display;
use diesel::pg::upsert::excluded;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

/// Percentages strictly below this trigger a warning notification.
pub const LOW_ATTENDANCE_THRESHOLD: i64 = 80;
pub const WARNING_SUPPRESSION_DAYS: i64 = 3;
pub const TREND_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[display(fmt = "present")]
    Present,
    #[display(fmt = "absent")]
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            other => Err(ApiError::bad_request(format!("Unknown attendance status {:?}", other))),
        }
    }
}

/// Rounded percentage of conducted classes attended; 100 before any class is held.
pub fn attendance_percentage(attended: i64, conducted: i64) -> i64 {
    if conducted <= 0 {
        return 100;
    }
    (attended as f64 / conducted as f64 * 100.0).round() as i64
}

/// A warning is due below the threshold unless one went out within the suppression window.
pub fn needs_low_attendance_warning(
    percentage: i64,
    last_warning_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> bool {
    if percentage >= LOW_ATTENDANCE_THRESHOLD {
        return false;
    }
    match last_warning_at {
        Some(at) => at < now - Duration::days(WARNING_SUPPRESSION_DAYS),
        None => true,
    }
}

#[derive(Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "attendance_records"]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub date: NaiveDate,
    pub status: String,
    pub marked_by: Uuid,
    pub marked_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceEntry {
    pub enrollment_id: Uuid,
    pub status: AttendanceStatus,
}

#[derive(Deserialize)]
pub struct SaveAttendanceInput {
    pub date: NaiveDate,
    pub records: Vec<AttendanceEntry>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CourseAttendance {
    pub course_code: String,
    pub course_name: String,
    pub classes_conducted: i64,
    pub classes_attended: i64,
    pub percentage: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Course code to percentage present among that day's records.
    pub courses: BTreeMap<String, i64>,
}

/// Groups `(date, course_code, present)` rows into per-day, per-course percentages.
pub fn build_trend<I>(records: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = (NaiveDate, String, bool)>,
{
    let mut days: BTreeMap<NaiveDate, BTreeMap<String, (i64, i64)>> = BTreeMap::new();
    for (date, course_code, present) in records {
        let counts = days.entry(date).or_default().entry(course_code).or_insert((0, 0));
        counts.0 += 1;
        if present {
            counts.1 += 1;
        }
    }

    days.into_iter()
        .map(|(date, courses)| TrendPoint {
            date,
            courses: courses
                .into_iter()
                .map(|(code, (total, present))| (code, attendance_percentage(present, total)))
                .collect(),
        })
        .collect()
}

impl AttendanceRecord {
    /// Enrollment id to "was present" for one class date.
    pub fn for_date(course_id: Uuid, date: NaiveDate) -> Result<HashMap<Uuid, bool>, ApiError> {
        let conn = db::connection()?;

        let rows = attendance_records::table
            .inner_join(enrollments::table)
            .filter(enrollments::course_id.eq(course_id))
            .filter(attendance_records::date.eq(date))
            .select((attendance_records::enrollment_id, attendance_records::status))
            .load::<(Uuid, String)>(&conn)?;

        Ok(rows
            .into_iter()
            .map(|(enrollment_id, status)| (enrollment_id, status == AttendanceStatus::Present.as_str()))
            .collect())
    }

    /// Upserts one record per enrollment for the date. Every enrollment must belong
    /// to the course.
    pub fn save(
        course_id: Uuid,
        teacher_id: Uuid,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> Result<usize, ApiError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let enrolled: HashSet<Uuid> = Enrollment::find_for_course(course_id)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        if let Some(stray) = entries.iter().find(|e| !enrolled.contains(&e.enrollment_id)) {
            return Err(ApiError::bad_request(format!(
                "Enrollment {} does not belong to this course",
                stray.enrollment_id
            )));
        }

        let now = Utc::now().naive_utc();
        let rows: Vec<AttendanceRecord> = entries
            .iter()
            .map(|entry| AttendanceRecord {
                id: Uuid::new_v4(),
                enrollment_id: entry.enrollment_id,
                date,
                status: entry.status.as_str().to_string(),
                marked_by: teacher_id,
                marked_at: now,
            })
            .collect();

        let conn = db::connection()?;
        let saved = diesel::insert_into(attendance_records::table)
            .values(&rows)
            .on_conflict((attendance_records::enrollment_id, attendance_records::date))
            .do_update()
            .set((
                attendance_records::status.eq(excluded(attendance_records::status)),
                attendance_records::marked_by.eq(excluded(attendance_records::marked_by)),
                attendance_records::marked_at.eq(excluded(attendance_records::marked_at)),
            ))
            .execute(&conn)?;

        Ok(saved)
    }

    /// Distinct dates on which any attendance was recorded for the course.
    pub fn classes_conducted(conn: &PgConnection, course_id: Uuid) -> Result<i64, ApiError> {
        let dates = attendance_records::table
            .inner_join(enrollments::table)
            .filter(enrollments::course_id.eq(course_id))
            .select(attendance_records::date)
            .distinct()
            .load::<NaiveDate>(conn)?;

        Ok(dates.len() as i64)
    }

    pub fn classes_attended(conn: &PgConnection, enrollment_id: Uuid) -> Result<i64, ApiError> {
        let count = attendance_records::table
            .filter(attendance_records::enrollment_id.eq(enrollment_id))
            .filter(attendance_records::status.eq(AttendanceStatus::Present.as_str()))
            .count()
            .get_result(conn)?;

        Ok(count)
    }

    pub fn enrollment_percentage(
        conn: &PgConnection,
        enrollment_id: Uuid,
        course_id: Uuid,
    ) -> Result<i64, ApiError> {
        let conducted = AttendanceRecord::classes_conducted(conn, course_id)?;
        let attended = AttendanceRecord::classes_attended(conn, enrollment_id)?;
        Ok(attendance_percentage(attended, conducted))
    }

    pub fn student_summary(student: &Student) -> Result<Vec<CourseAttendance>, ApiError> {
        let enrolled = Enrollment::find_for_student(student.id)?;
        let conn = db::connection()?;

        enrolled
            .into_iter()
            .map(|(enrollment, course)| {
                let conducted = AttendanceRecord::classes_conducted(&conn, course.id)?;
                let attended = AttendanceRecord::classes_attended(&conn, enrollment.id)?;
                Ok(CourseAttendance {
                    course_code: course.course_code,
                    course_name: course.course_name,
                    classes_conducted: conducted,
                    classes_attended: attended,
                    percentage: attendance_percentage(attended, conducted),
                })
            })
            .collect()
    }

    /// Present records over all records for the course, 0 when nothing is recorded.
    pub fn course_average(course_id: Uuid) -> Result<i64, ApiError> {
        let conn = db::connection()?;

        let statuses = attendance_records::table
            .inner_join(enrollments::table)
            .filter(enrollments::course_id.eq(course_id))
            .select(attendance_records::status)
            .load::<String>(&conn)?;

        if statuses.is_empty() {
            return Ok(0);
        }
        let present = statuses
            .iter()
            .filter(|s| s.as_str() == AttendanceStatus::Present.as_str())
            .count();

        Ok(attendance_percentage(present as i64, statuses.len() as i64))
    }

    pub fn trend(course_ids: &[Uuid], today: NaiveDate) -> Result<Vec<TrendPoint>, ApiError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = db::connection()?;
        let since = today - Duration::days(TREND_WINDOW_DAYS);

        let rows = attendance_records::table
            .inner_join(enrollments::table.inner_join(courses::table))
            .filter(enrollments::course_id.eq_any(course_ids.to_vec()))
            .filter(attendance_records::date.ge(since))
            .select((
                attendance_records::date,
                courses::course_code,
                attendance_records::status,
            ))
            .load::<(NaiveDate, String, String)>(&conn)?;

        Ok(build_trend(rows.into_iter().map(|(date, code, status)| {
            (date, code, status == AttendanceStatus::Present.as_str())
        })))
    }
}
