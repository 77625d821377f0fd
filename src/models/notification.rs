use crate::api_error::ApiError;
use crate::db;
use crate::models::attendance::{needs_low_attendance_warning, AttendanceEntry, AttendanceStatus};
use crate::models::{AttendanceRecord, Course, Enrollment};
use crate::schema::notifications;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use derive_more::Display;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MARKS_POSTED_TITLE: &str = "New Marks Posted";
pub const LOW_ATTENDANCE_TITLE: &str = "Low Attendance Warning";
pub const MARKED_ABSENT_TITLE: &str = "Marked Absent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[display(fmt = "info")]
    Info,
    #[display(fmt = "warning")]
    Warning,
    #[display(fmt = "success")]
    Success,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Success => "success",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "notifications"]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_course_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub is_read: bool,
}

impl Notification {
    fn build(user_id: Uuid, kind: NotificationKind, title: &str, message: String, course_id: Uuid) -> Self {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.as_str().to_string(),
            title: title.to_string(),
            message,
            related_course_id: Some(course_id),
            created_at: Utc::now().naive_utc(),
            is_read: false,
        }
    }

    pub fn marks_posted(user_id: Uuid, course: &Course, assessment_name: &str) -> Self {
        Notification::build(
            user_id,
            NotificationKind::Info,
            MARKS_POSTED_TITLE,
            format!(
                "Marks for {} have been uploaded for {}",
                assessment_name, course.course_code
            ),
            course.id,
        )
    }

    pub fn low_attendance(user_id: Uuid, course: &Course, percentage: i64) -> Self {
        Notification::build(
            user_id,
            NotificationKind::Warning,
            LOW_ATTENDANCE_TITLE,
            format!(
                "Your attendance in {} has dropped to {}%. Please ensure you attend upcoming classes.",
                course.course_code, percentage
            ),
            course.id,
        )
    }

    pub fn marked_absent(user_id: Uuid, course: &Course, date: NaiveDate) -> Self {
        Notification::build(
            user_id,
            NotificationKind::Warning,
            MARKED_ABSENT_TITLE,
            format!("You were marked absent in {} on {}", course.course_code, date),
            course.id,
        )
    }

    /// Newest first; `limit` caps the list for dashboards.
    pub fn find_for_user(user_id: Uuid, limit: Option<i64>) -> Result<Vec<Self>, ApiError> {
        let conn = db::connection()?;

        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.desc())
            .into_boxed();

        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let notifications = query.load::<Notification>(&conn)?;

        Ok(notifications)
    }

    /// Only the owner may mark a notification as read.
    pub fn mark_read(id: Uuid, user_id: Uuid) -> Result<Self, ApiError> {
        let conn = db::connection()?;

        diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_read.eq(true))
        .get_result(&conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Notification not found"))
    }

    fn insert_many(conn: &PgConnection, rows: &[Notification]) -> Result<usize, ApiError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let res = diesel::insert_into(notifications::table)
            .values(rows)
            .execute(conn)?;

        Ok(res)
    }

    fn last_low_attendance_warning(
        conn: &PgConnection,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<NaiveDateTime>, ApiError> {
        let at = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::related_course_id.eq(course_id))
            .filter(notifications::title.eq(LOW_ATTENDANCE_TITLE))
            .select(notifications::created_at)
            .order(notifications::created_at.desc())
            .first::<NaiveDateTime>(conn)
            .optional()?;

        Ok(at)
    }

    /// Tells every enrolled student that marks for an assessment are up.
    pub fn notify_marks_posted(course: &Course, assessment_name: &str) -> Result<usize, ApiError> {
        let rows: Vec<Notification> = Enrollment::student_user_ids(course.id)?
            .into_iter()
            .map(|user_id| Notification::marks_posted(user_id, course, assessment_name))
            .collect();

        let conn = db::connection()?;
        let sent = Notification::insert_many(&conn, &rows)?;
        debug!("Sent {} marks notifications for {}", sent, course.course_code);

        Ok(sent)
    }

    /// Warns students whose attendance fell below the threshold and tells absentees
    /// they were marked absent on `date`.
    pub fn notify_attendance(
        course: &Course,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> Result<usize, ApiError> {
        let conn = db::connection()?;
        let rows = Notification::attendance_notices(&conn, course, date, entries, Utc::now().naive_utc())?;

        let sent = Notification::insert_many(&conn, &rows)?;
        debug!("Sent {} attendance notifications for {}", sent, course.course_code);

        Ok(sent)
    }

    /// Builds the notifications for one attendance save. Every query runs on `conn`.
    fn attendance_notices(
        conn: &PgConnection,
        course: &Course,
        date: NaiveDate,
        entries: &[AttendanceEntry],
        now: NaiveDateTime,
    ) -> Result<Vec<Notification>, ApiError> {
        let mut rows = Vec::new();

        for entry in entries {
            let user_id = Enrollment::student_user_id(conn, entry.enrollment_id)?;
            let percentage = AttendanceRecord::enrollment_percentage(conn, entry.enrollment_id, course.id)?;
            let last_warning = Notification::last_low_attendance_warning(conn, user_id, course.id)?;

            if needs_low_attendance_warning(percentage, last_warning, now) {
                rows.push(Notification::low_attendance(user_id, course, percentage));
            }
            if entry.status == AttendanceStatus::Absent {
                rows.push(Notification::marked_absent(user_id, course, date));
            }
        }

        Ok(rows)
    }
}

/// Runs a notification job off the request path. The response never waits on it and
/// failures are only logged.
pub fn spawn_fanout<F>(label: &'static str, job: F)
where
    F: FnOnce() -> Result<usize, ApiError> + Send + 'static,
{
    actix_rt::task::spawn_blocking(move || {
        if let Err(e) = job() {
            error!("{} notification fan-out failed: {}", label, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> Course {
        Course {
            id: Uuid::new_v4(),
            course_code: "CS101".to_string(),
            course_name: "Programming Fundamentals".to_string(),
            credits: 3,
            syllabus: None,
            num_assignments: 0,
            num_quizzes: 0,
            num_midterms: 2,
            num_finals: 1,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn marks_posted_is_info() {
        let course = course();
        let n = Notification::marks_posted(Uuid::new_v4(), &course, "Quiz 1");
        assert_eq!(n.kind, "info");
        assert_eq!(n.title, "New Marks Posted");
        assert_eq!(n.message, "Marks for Quiz 1 have been uploaded for CS101");
        assert_eq!(n.related_course_id, Some(course.id));
        assert!(!n.is_read);
    }

    #[test]
    fn attendance_warnings_carry_course_and_date() {
        let course = course();
        let user = Uuid::new_v4();

        let low = Notification::low_attendance(user, &course, 67);
        assert_eq!(low.kind, "warning");
        assert_eq!(
            low.message,
            "Your attendance in CS101 has dropped to 67%. Please ensure you attend upcoming classes."
        );

        let absent = Notification::marked_absent(user, &course, NaiveDate::from_ymd(2024, 11, 4));
        assert_eq!(absent.title, "Marked Absent");
        assert_eq!(absent.message, "You were marked absent in CS101 on 2024-11-04");
    }

    #[test]
    fn serializes_kind_as_type() {
        let n = Notification::marks_posted(Uuid::new_v4(), &course(), "Midterm 1");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "info");
        assert!(json.get("kind").is_none());
    }

    mod database {
        use super::*;
        use crate::campus::Campus;
        use crate::models::fixtures;
        use crate::schema::attendance_records;
        use chrono::Duration;

        fn titles(rows: &[Notification]) -> Vec<&str> {
            rows.iter().map(|n| n.title.as_str()).collect()
        }

        #[test]
        fn only_a_recent_low_attendance_warning_suppresses_another() {
            let conn = match db::test_connection() {
                Some(conn) => conn,
                None => return,
            };
            let course = fixtures::course(&conn, 3);
            let teacher = fixtures::teacher(&conn, Campus::F);
            let student = fixtures::student(&conn, Campus::F);
            let enrollment = fixtures::enroll(&conn, &student, &course);

            let today = Utc::now().naive_utc().date();
            let records: Vec<AttendanceRecord> = vec![
                (today - Duration::days(1), AttendanceStatus::Present),
                (today, AttendanceStatus::Absent),
            ]
            .into_iter()
            .map(|(date, status)| AttendanceRecord {
                id: Uuid::new_v4(),
                enrollment_id: enrollment.id,
                date,
                status: status.as_str().to_string(),
                marked_by: teacher.id,
                marked_at: Utc::now().naive_utc(),
            })
            .collect();
            diesel::insert_into(attendance_records::table)
                .values(&records)
                .execute(&conn)
                .unwrap();

            let entries = vec![AttendanceEntry {
                enrollment_id: enrollment.id,
                status: AttendanceStatus::Absent,
            }];
            let now = Utc::now().naive_utc();

            // A recent absence notice is not a warning.
            Notification::insert_many(&conn, &[Notification::marked_absent(student.user_id, &course, today)])
                .unwrap();
            let rows = Notification::attendance_notices(&conn, &course, today, &entries, now).unwrap();
            assert_eq!(titles(&rows), vec![LOW_ATTENDANCE_TITLE, MARKED_ABSENT_TITLE]);
            assert_eq!(
                rows[0].message,
                format!(
                    "Your attendance in {} has dropped to 50%. Please ensure you attend upcoming classes.",
                    course.course_code
                )
            );

            let mut stale = Notification::low_attendance(student.user_id, &course, 50);
            stale.created_at = now - Duration::days(4);
            Notification::insert_many(&conn, &[stale]).unwrap();
            let rows = Notification::attendance_notices(&conn, &course, today, &entries, now).unwrap();
            assert_eq!(titles(&rows), vec![LOW_ATTENDANCE_TITLE, MARKED_ABSENT_TITLE]);

            Notification::insert_many(&conn, &[Notification::low_attendance(student.user_id, &course, 50)])
                .unwrap();
            let rows = Notification::attendance_notices(&conn, &course, today, &entries, now).unwrap();
            assert_eq!(titles(&rows), vec![MARKED_ABSENT_TITLE]);
        }
    }
}
