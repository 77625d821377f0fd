use crate::api_error::ApiError;
use crate::db;
use crate::models::{Course, CourseAssignment, Student};
use crate::rules;
use crate::schema::{courses, enrollments, profiles, students};
use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const UNASSIGNED: &str = "TBA";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "enrollments"]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub enrollment_date: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct EnrollmentInput {
    pub course_id: Uuid,
}

#[derive(Serialize, Queryable)]
pub struct CourseStudent {
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub roll_number: String,
    pub full_name: String,
}

#[derive(Serialize)]
pub struct EnrolledCourse {
    pub id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub teacher_name: String,
    pub section: String,
    pub enrollment_date: NaiveDateTime,
}

#[derive(Serialize)]
pub struct AvailableCourse {
    pub id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub teachers: Vec<String>,
}

/// Picks the teacher whose section matches the student's, falling back to the first
/// section offered on the campus. Rows are `(teacher_name, section)`.
pub fn pick_section<'a>(
    offered: &'a [(String, String)],
    student_section: Option<&str>,
) -> Option<&'a (String, String)> {
    student_section
        .and_then(|wanted| offered.iter().find(|(_, section)| section == wanted))
        .or_else(|| offered.first())
}

impl Enrollment {
    pub fn enroll(student: &Student, course_id: Uuid) -> Result<Self, ApiError> {
        let conn = db::connection()?;
        Enrollment::enroll_on(&conn, student, course_id)
    }

    /// Campus, credit and duplicate checks run under a lock on the student row.
    pub fn enroll_on(conn: &PgConnection, student: &Student, course_id: Uuid) -> Result<Self, ApiError> {
        conn.transaction::<_, ApiError, _>(|| {
            let student = Student::lock(conn, student.id)?;

            let course: Course = courses::table
                .find(course_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Course not found"))?;

            let campus = student.campus()?;
            if CourseAssignment::find_on_campus(conn, campus, Some(&[course.id][..]))?.is_empty() {
                return Err(ApiError::bad_request(format!(
                    "{} is not offered on the {} campus.",
                    course.course_code, campus
                )));
            }

            let enrolled_credits = enrollments::table
                .inner_join(courses::table)
                .filter(enrollments::student_id.eq(student.id))
                .select(courses::credits)
                .load::<i32>(conn)?;
            let current = rules::total_credits(&enrolled_credits)?;

            rules::check_credit_limit(current, course.credits)?;

            let enrollment = Enrollment {
                id: Uuid::new_v4(),
                student_id: student.id,
                course_id: course.id,
                enrollment_date: Utc::now().naive_utc(),
            };

            let enrollment = diesel::insert_into(enrollments::table)
                .values(enrollment)
                .get_result(conn)
                .map_err(|e| ApiError::from_diesel_or_duplicate(e, "Already enrolled in this course."))?;

            info!(
                "Enrolled student {} in {} ({} credit hours)",
                student.roll_number,
                course.course_code,
                current + course.credits
            );

            Ok(enrollment)
        })
    }

    pub fn find_for_student(student_id: Uuid) -> Result<Vec<(Enrollment, Course)>, ApiError> {
        let conn = db::connection()?;

        let rows = enrollments::table
            .inner_join(courses::table)
            .filter(enrollments::student_id.eq(student_id))
            .select((enrollments::all_columns, courses::all_columns))
            .order(courses::course_code.asc())
            .load::<(Enrollment, Course)>(&conn)?;

        Ok(rows)
    }

    pub fn find_for_course(course_id: Uuid) -> Result<Vec<Enrollment>, ApiError> {
        let conn = db::connection()?;

        let enrollments = enrollments::table
            .filter(enrollments::course_id.eq(course_id))
            .load::<Enrollment>(&conn)?;

        Ok(enrollments)
    }

    pub fn count_for_course(course_id: Uuid) -> Result<i64, ApiError> {
        let conn = db::connection()?;

        let count = enrollments::table
            .filter(enrollments::course_id.eq(course_id))
            .count()
            .get_result(&conn)?;

        Ok(count)
    }

    pub fn course_students(course_id: Uuid) -> Result<Vec<CourseStudent>, ApiError> {
        let conn = db::connection()?;

        let students = enrollments::table
            .inner_join(students::table.inner_join(profiles::table))
            .filter(enrollments::course_id.eq(course_id))
            .select((
                enrollments::id,
                enrollments::student_id,
                students::roll_number,
                profiles::full_name,
            ))
            .order(students::roll_number.asc())
            .load::<CourseStudent>(&conn)?;

        Ok(students)
    }

    /// Profile ids of everyone enrolled in a course, for notification fan-out.
    pub fn student_user_ids(course_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        let conn = db::connection()?;

        let ids = enrollments::table
            .inner_join(students::table)
            .filter(enrollments::course_id.eq(course_id))
            .select(students::user_id)
            .load::<Uuid>(&conn)?;

        Ok(ids)
    }

    pub fn student_user_id(conn: &PgConnection, enrollment_id: Uuid) -> Result<Uuid, ApiError> {
        let id = enrollments::table
            .inner_join(students::table)
            .filter(enrollments::id.eq(enrollment_id))
            .select(students::user_id)
            .first(conn)?;

        Ok(id)
    }

    /// Student ids (not profile ids) enrolled in a course.
    pub fn enrolled_student_ids(conn: &PgConnection, course_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        let ids = enrollments::table
            .filter(enrollments::course_id.eq(course_id))
            .select(enrollments::student_id)
            .load::<Uuid>(conn)?;

        Ok(ids)
    }

    /// Enrolled courses with the teacher and section serving the student's campus.
    pub fn enrolled_courses(student: &Student) -> Result<Vec<EnrolledCourse>, ApiError> {
        let rows = Enrollment::find_for_student(student.id)?;
        let course_ids: Vec<Uuid> = rows.iter().map(|(_, course)| course.id).collect();
        let offered = offered_on_campus(student, Some(course_ids.as_slice()))?;

        Ok(rows
            .into_iter()
            .map(|(enrollment, course)| {
                let empty = Vec::new();
                let sections = offered.get(&course.id).unwrap_or(&empty);
                let (teacher_name, section) = pick_section(sections, student.section())
                    .cloned()
                    .unwrap_or_else(|| (UNASSIGNED.to_string(), UNASSIGNED.to_string()));

                EnrolledCourse {
                    id: course.id,
                    course_code: course.course_code,
                    course_name: course.course_name,
                    credits: course.credits,
                    teacher_name,
                    section,
                    enrollment_date: enrollment.enrollment_date,
                }
            })
            .collect())
    }

    /// Courses offered on the student's campus that they have not enrolled in yet.
    pub fn available_courses(student: &Student) -> Result<Vec<AvailableCourse>, ApiError> {
        let offered = offered_on_campus(student, None)?;
        let enrolled: Vec<Uuid> = Enrollment::find_for_student(student.id)?
            .into_iter()
            .map(|(enrollment, _)| enrollment.course_id)
            .collect();

        let ids: Vec<Uuid> = offered
            .keys()
            .filter(|id| !enrolled.contains(id))
            .cloned()
            .collect();

        let mut courses = Course::find_many(&ids)?;
        courses.sort_by(|a, b| a.course_code.cmp(&b.course_code));

        Ok(courses
            .into_iter()
            .map(|course| AvailableCourse {
                teachers: offered
                    .get(&course.id)
                    .map(|rows| {
                        rows.iter()
                            .map(|(name, section)| format!("{} ({})", name, section))
                            .collect()
                    })
                    .unwrap_or_default(),
                id: course.id,
                course_code: course.course_code,
                course_name: course.course_name,
                credits: course.credits,
            })
            .collect())
    }
}

fn offered_on_campus(
    student: &Student,
    course_ids: Option<&[Uuid]>,
) -> Result<HashMap<Uuid, Vec<(String, String)>>, ApiError> {
    let conn = db::connection()?;
    let rows = CourseAssignment::find_on_campus(&conn, student.campus()?, course_ids)?;

    let mut offered: HashMap<Uuid, Vec<(String, String)>> = HashMap::new();
    for (course_id, teacher_name, section) in rows {
        offered.entry(course_id).or_default().push((teacher_name, section));
    }
    Ok(offered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered() -> Vec<(String, String)> {
        vec![
            ("Ali Raza".to_string(), "3A".to_string()),
            ("Sana Iqbal".to_string(), "3B".to_string()),
        ]
    }

    #[test]
    fn matching_section_wins() {
        let rows = offered();
        let (name, section) = pick_section(&rows, Some("3B")).unwrap();
        assert_eq!(name, "Sana Iqbal");
        assert_eq!(section, "3B");
    }

    #[test]
    fn falls_back_to_first_section_on_campus() {
        let rows = offered();
        assert_eq!(pick_section(&rows, Some("5C")).unwrap().1, "3A");
        assert_eq!(pick_section(&rows, None).unwrap().1, "3A");
        assert!(pick_section(&[], Some("3A")).is_none());
    }

    mod database {
        use super::*;
        use crate::campus::Campus;
        use crate::models::fixtures;

        #[test]
        fn enrolling_needs_a_section_on_the_student_campus() {
            let conn = match db::test_connection() {
                Some(conn) => conn,
                None => return,
            };
            let course = fixtures::course(&conn, 3);
            let student = fixtures::student(&conn, Campus::F);
            let lahore = fixtures::teacher(&conn, Campus::L);
            fixtures::assign(&conn, &course, &lahore, Campus::L);

            let err = Enrollment::enroll_on(&conn, &student, course.id).unwrap_err();
            assert_eq!(err.status_code, 400);
            assert_eq!(err.message, format!("{} is not offered on the F campus.", course.course_code));

            let faisalabad = fixtures::teacher(&conn, Campus::F);
            fixtures::assign(&conn, &course, &faisalabad, Campus::F);

            let enrollment = Enrollment::enroll_on(&conn, &student, course.id).unwrap();
            assert_eq!(enrollment.student_id, student.id);
            assert_eq!(enrollment.course_id, course.id);
        }

        #[test]
        fn enrolling_past_the_credit_limit_is_rejected() {
            let conn = match db::test_connection() {
                Some(conn) => conn,
                None => return,
            };
            let student = fixtures::student(&conn, Campus::K);
            let teacher = fixtures::teacher(&conn, Campus::K);
            let heavy = fixtures::course(&conn, 18);
            let extra = fixtures::course(&conn, 3);
            fixtures::assign(&conn, &heavy, &teacher, Campus::K);
            fixtures::assign(&conn, &extra, &teacher, Campus::K);

            Enrollment::enroll_on(&conn, &student, heavy.id).unwrap();
            let err = Enrollment::enroll_on(&conn, &student, extra.id).unwrap_err();
            assert_eq!(err.status_code, 400);
        }
    }
}
