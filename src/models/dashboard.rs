use crate::api_error::ApiError;
use crate::grading::{self, GradeCount};
use crate::models::attendance::{attendance_percentage, CourseAttendance};
use crate::models::{
    Assessment, AttendanceRecord, Course, CourseAssignment, Enrollment, Notification, Student,
    Teacher,
};
use crate::user::Profile;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

pub const RECENT_ACTIVITY_LIMIT: usize = 5;
pub const RECENT_NOTIFICATIONS_LIMIT: i64 = 3;

#[derive(Serialize)]
pub struct AdminStats {
    pub total_students: i64,
    pub total_teachers: i64,
    pub total_courses: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Serialize)]
pub struct TeacherCourseStats {
    pub course_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub students: i64,
    pub attendance: i64,
    pub avg_marks: i64,
}

#[derive(Serialize)]
pub struct TeacherDashboard {
    pub name: String,
    pub courses: Vec<TeacherCourseStats>,
}

#[derive(Serialize)]
pub struct StudentDashboard {
    pub name: String,
    pub enrolled_courses: usize,
    pub overall_attendance: i64,
    pub avg_grade: String,
    pub avg_gpa: String,
    pub course_attendance: Vec<CourseAttendance>,
    pub grade_distribution: Vec<GradeCount>,
    pub recent_notifications: Vec<Notification>,
}

/// Summed attended over summed conducted across courses.
pub fn overall_attendance(courses: &[CourseAttendance]) -> i64 {
    let attended = courses.iter().map(|c| c.classes_attended).sum();
    let conducted = courses.iter().map(|c| c.classes_conducted).sum();
    attendance_percentage(attended, conducted)
}

/// Newest first, at most `limit` items.
pub fn latest_activity(mut items: Vec<ActivityItem>, limit: usize) -> Vec<ActivityItem> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items.truncate(limit);
    items
}

pub fn admin_stats() -> Result<AdminStats, ApiError> {
    Ok(AdminStats {
        total_students: Student::count()?,
        total_teachers: Teacher::count()?,
        total_courses: Course::count()?,
    })
}

pub fn recent_activity() -> Result<Vec<ActivityItem>, ApiError> {
    let limit = RECENT_ACTIVITY_LIMIT as i64;

    let users = Profile::find_recent(limit)?.into_iter().map(|p| ActivityItem {
        kind: "user".to_string(),
        description: format!("New {} registered: {}", p.role, p.full_name),
        created_at: p.created_at,
    });
    let courses = Course::find_recent(limit)?.into_iter().map(|c| ActivityItem {
        kind: "course".to_string(),
        description: format!("Course created: {} - {}", c.course_code, c.course_name),
        created_at: c.created_at,
    });

    Ok(latest_activity(users.chain(courses).collect(), RECENT_ACTIVITY_LIMIT))
}

pub fn teacher_dashboard(teacher: &Teacher) -> Result<TeacherDashboard, ApiError> {
    let mut seen = HashSet::new();
    let mut courses = Vec::new();

    for section in CourseAssignment::sections_for_teacher(teacher.id)? {
        if !seen.insert(section.course_id) {
            continue;
        }
        courses.push(TeacherCourseStats {
            students: Enrollment::count_for_course(section.course_id)?,
            attendance: AttendanceRecord::course_average(section.course_id)?,
            avg_marks: Assessment::class_average(section.course_id)?,
            course_id: section.course_id,
            course_code: section.course_code,
            course_name: section.course_name,
        });
    }

    Ok(TeacherDashboard {
        name: teacher.full_name()?,
        courses,
    })
}

pub fn student_dashboard(student: &Student) -> Result<StudentDashboard, ApiError> {
    let course_attendance = AttendanceRecord::student_summary(student)?;
    let results = Assessment::results_for_student(student.id)?;
    let overview = grading::gpa_overview(results.iter().map(|r| &r.summary));

    Ok(StudentDashboard {
        name: student.full_name()?,
        enrolled_courses: results.len(),
        overall_attendance: overall_attendance(&course_attendance),
        avg_grade: overview.avg_grade,
        avg_gpa: overview.avg_gpa,
        course_attendance,
        grade_distribution: overview.grade_distribution,
        recent_notifications: Notification::find_for_user(
            student.user_id,
            Some(RECENT_NOTIFICATIONS_LIMIT),
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn attendance(conducted: i64, attended: i64) -> CourseAttendance {
        CourseAttendance {
            course_code: "CS101".to_string(),
            course_name: "Programming Fundamentals".to_string(),
            classes_conducted: conducted,
            classes_attended: attended,
            percentage: attendance_percentage(attended, conducted),
        }
    }

    fn item(kind: &str, day: u32) -> ActivityItem {
        ActivityItem {
            kind: kind.to_string(),
            description: format!("{} on {}", kind, day),
            created_at: NaiveDate::from_ymd(2024, 11, day).and_hms(9, 0, 0),
        }
    }

    #[test]
    fn overall_attendance_weights_by_classes() {
        let courses = vec![attendance(8, 6), attendance(2, 2)];
        assert_eq!(overall_attendance(&courses), 80);
    }

    #[test]
    fn overall_attendance_without_classes_is_full() {
        assert_eq!(overall_attendance(&[]), 100);
        assert_eq!(overall_attendance(&[attendance(0, 0)]), 100);
    }

    #[test]
    fn activity_is_newest_first_and_capped() {
        let items = vec![
            item("user", 1),
            item("course", 7),
            item("user", 3),
            item("course", 2),
            item("user", 6),
            item("course", 5),
        ];

        let latest = latest_activity(items, RECENT_ACTIVITY_LIMIT);
        let days: Vec<u32> = latest.iter().map(|i| i.created_at.date().day()).collect();
        assert_eq!(days, vec![7, 6, 5, 3, 2]);
    }
}
