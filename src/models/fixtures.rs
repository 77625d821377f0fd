//! Rows for database tests. Everything is inserted on the caller's test connection,
//! so it disappears when the test transaction rolls back.

use crate::campus::Campus;
use crate::models::{
    Course, CourseAssignment, Enrollment, Student, StudentMessage, Teacher, TeacherMessage,
};
use crate::schema::{course_assignments, courses, enrollments};
use crate::user::{Profile, ProfileMessage, Role};
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rand::Rng;
use uuid::Uuid;

pub fn profile(conn: &PgConnection, role: Role) -> Profile {
    Profile::insert(
        conn,
        ProfileMessage {
            email: format!("{}@test.nu.edu.pk", Uuid::new_v4()),
            full_name: "Test User".to_string(),
            role,
            password: "password123".to_string(),
        },
    )
    .unwrap()
}

/// A roll number like `37F-4821` that is unlikely to clash with other tests.
pub fn roll_number(campus: Campus) -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{:02}{}-{:04}",
        rng.gen_range(30..100),
        campus,
        rng.gen_range(1000..10000)
    )
}

pub fn student(conn: &PgConnection, campus: Campus) -> Student {
    let profile = profile(conn, Role::Student);
    Student::insert(
        conn,
        StudentMessage {
            user_id: profile.id,
            roll_number: roll_number(campus),
            batch: "BSE-3A".to_string(),
            program: "BSE".to_string(),
            enrollment_year: 2024,
        },
    )
    .unwrap()
}

pub fn teacher(conn: &PgConnection, campus: Campus) -> Teacher {
    let profile = profile(conn, Role::Teacher);
    Teacher::insert(
        conn,
        TeacherMessage {
            user_id: profile.id,
            employee_id: "EMP-1000".to_string(),
            department: "CS".to_string(),
            campus: Some(campus.code().to_string()),
            designation: "Lecturer".to_string(),
        },
    )
    .unwrap()
}

pub fn course(conn: &PgConnection, credits: i32) -> Course {
    let code = format!("T{}", &Uuid::new_v4().to_simple().to_string()[..8]);
    diesel::insert_into(courses::table)
        .values(Course {
            id: Uuid::new_v4(),
            course_code: code,
            course_name: "Test Course".to_string(),
            credits,
            syllabus: None,
            num_assignments: 2,
            num_quizzes: 4,
            num_midterms: 2,
            num_finals: 1,
            created_at: Utc::now().naive_utc(),
        })
        .get_result(conn)
        .unwrap()
}

pub fn assign(conn: &PgConnection, course: &Course, teacher: &Teacher, campus: Campus) -> CourseAssignment {
    diesel::insert_into(course_assignments::table)
        .values(CourseAssignment {
            id: Uuid::new_v4(),
            course_id: course.id,
            teacher_id: teacher.id,
            section: "3A".to_string(),
            department: "CS".to_string(),
            campus: campus.code().to_string(),
            created_at: Utc::now().naive_utc(),
        })
        .get_result(conn)
        .unwrap()
}

pub fn enroll(conn: &PgConnection, student: &Student, course: &Course) -> Enrollment {
    diesel::insert_into(enrollments::table)
        .values(Enrollment {
            id: Uuid::new_v4(),
            student_id: student.id,
            course_id: course.id,
            enrollment_date: Utc::now().naive_utc(),
        })
        .get_result(conn)
        .unwrap()
}
