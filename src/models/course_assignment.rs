use crate::api_error::ApiError;
use crate::campus::Campus;
use crate::db;
use crate::models::{Course, Enrollment, Teacher};
use crate::rules;
use crate::schema::{course_assignments, courses, profiles, teachers};
use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "course_assignments"]
pub struct CourseAssignment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub section: String,
    pub department: String,
    pub campus: String,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct AssignmentInput {
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub section: String,
    pub department: String,
    pub campus: Campus,
}

#[derive(Serialize, Queryable)]
pub struct AssignmentListing {
    pub id: Uuid,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub section: String,
    pub department: String,
    pub campus: String,
}

/// A section taught by a teacher, joined with its course.
#[derive(Serialize, Queryable)]
pub struct TeachingSection {
    pub course_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub section: String,
}

/// One row per assigned section on the teacher's course list.
#[derive(Serialize)]
pub struct TeacherCourse {
    pub course_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub section: String,
    pub students: i64,
}

#[derive(Serialize)]
pub struct CourseDetails {
    #[serde(flatten)]
    pub course: Course,
    pub sections: Vec<String>,
    pub student_count: i64,
}

impl CourseAssignment {
    pub fn find_for_course(course_id: Uuid) -> Result<Vec<AssignmentListing>, ApiError> {
        let conn = db::connection()?;

        let assignments = course_assignments::table
            .inner_join(teachers::table.inner_join(profiles::table))
            .filter(course_assignments::course_id.eq(course_id))
            .select((
                course_assignments::id,
                course_assignments::course_id,
                course_assignments::teacher_id,
                profiles::full_name,
                course_assignments::section,
                course_assignments::department,
                course_assignments::campus,
            ))
            .order(course_assignments::section.asc())
            .load::<AssignmentListing>(&conn)?;

        Ok(assignments)
    }

    pub fn sections_for_teacher(teacher_id: Uuid) -> Result<Vec<TeachingSection>, ApiError> {
        let conn = db::connection()?;

        let sections = course_assignments::table
            .inner_join(courses::table)
            .filter(course_assignments::teacher_id.eq(teacher_id))
            .select((
                courses::id,
                courses::course_code,
                courses::course_name,
                course_assignments::section,
            ))
            .order((courses::course_code.asc(), course_assignments::section.asc()))
            .load::<TeachingSection>(&conn)?;

        Ok(sections)
    }

    /// The caller's sections of a course; empty means they do not teach it.
    pub fn sections_of(teacher_id: Uuid, course_id: Uuid) -> Result<Vec<String>, ApiError> {
        let conn = db::connection()?;

        let sections = course_assignments::table
            .filter(course_assignments::teacher_id.eq(teacher_id))
            .filter(course_assignments::course_id.eq(course_id))
            .select(course_assignments::section)
            .order(course_assignments::section.asc())
            .load::<String>(&conn)?;

        Ok(sections)
    }

    pub fn ensure_teaches(teacher_id: Uuid, course_id: Uuid) -> Result<Vec<String>, ApiError> {
        let sections = CourseAssignment::sections_of(teacher_id, course_id)?;
        if sections.is_empty() {
            return Err(ApiError::forbidden());
        }
        Ok(sections)
    }

    pub fn teacher_courses(teacher_id: Uuid) -> Result<Vec<TeacherCourse>, ApiError> {
        CourseAssignment::sections_for_teacher(teacher_id)?
            .into_iter()
            .map(|s| {
                Ok(TeacherCourse {
                    students: Enrollment::count_for_course(s.course_id)?,
                    course_id: s.course_id,
                    course_code: s.course_code,
                    course_name: s.course_name,
                    section: s.section,
                })
            })
            .collect()
    }

    /// Course by code, only for a teacher assigned to it.
    pub fn course_for_teacher(teacher_id: Uuid, code: &str) -> Result<(Course, Vec<String>), ApiError> {
        let course = Course::find_by_code(code)?;
        let sections = CourseAssignment::ensure_teaches(teacher_id, course.id)?;
        Ok((course, sections))
    }

    pub fn course_details(teacher_id: Uuid, code: &str) -> Result<CourseDetails, ApiError> {
        let (course, sections) = CourseAssignment::course_for_teacher(teacher_id, code)?;

        Ok(CourseDetails {
            student_count: Enrollment::count_for_course(course.id)?,
            course,
            sections,
        })
    }

    /// Assignments on a campus for the given courses, with teacher names.
    pub fn find_on_campus(
        conn: &PgConnection,
        campus: Campus,
        course_ids: Option<&[Uuid]>,
    ) -> Result<Vec<(Uuid, String, String)>, ApiError> {
        let mut query = course_assignments::table
            .inner_join(teachers::table.inner_join(profiles::table))
            .filter(course_assignments::campus.eq(campus.code()))
            .select((
                course_assignments::course_id,
                profiles::full_name,
                course_assignments::section,
            ))
            .into_boxed();

        if let Some(ids) = course_ids {
            query = query.filter(course_assignments::course_id.eq_any(ids.to_vec()));
        }

        let rows = query
            .order(course_assignments::section.asc())
            .load::<(Uuid, String, String)>(conn)?;

        Ok(rows)
    }

    /// Checks workload and campus rules, then inserts. The teacher row stays locked
    /// between the check and the insert.
    pub fn create(input: AssignmentInput) -> Result<Self, ApiError> {
        let section = input.section.trim().to_string();
        if section.is_empty() || input.department.trim().is_empty() {
            return Err(ApiError::bad_request("Missing required fields"));
        }

        let conn = db::connection()?;

        conn.transaction::<_, ApiError, _>(|| {
            let teacher = Teacher::lock(&conn, input.teacher_id)?
                .ok_or_else(|| ApiError::not_found("Teacher not found"))?;

            let course_exists: i64 = courses::table
                .filter(courses::id.eq(input.course_id))
                .count()
                .get_result(&conn)?;
            if course_exists == 0 {
                return Err(ApiError::not_found("Course not found"));
            }

            let existing = course_assignments::table
                .filter(course_assignments::teacher_id.eq(teacher.id))
                .select(course_assignments::course_id)
                .load::<Uuid>(&conn)?;

            rules::check_assignment(
                teacher.campus.as_deref(),
                input.campus,
                input.course_id,
                &existing,
            )
            .map_err(|e| {
                debug!("Rejected assignment for teacher {}: {}", teacher.id, e);
                e
            })?;

            let assignment = CourseAssignment {
                id: Uuid::new_v4(),
                course_id: input.course_id,
                teacher_id: teacher.id,
                section,
                department: input.department.trim().to_string(),
                campus: input.campus.code().to_string(),
                created_at: Utc::now().naive_utc(),
            };

            let assignment = diesel::insert_into(course_assignments::table)
                .values(assignment)
                .get_result(&conn)
                .map_err(|e| ApiError::from_diesel_or_duplicate(e, "This assignment already exists."))?;

            Ok(assignment)
        })
    }

    pub fn delete(id: Uuid) -> Result<usize, ApiError> {
        let conn = db::connection()?;

        let res = diesel::delete(course_assignments::table.filter(course_assignments::id.eq(id)))
            .execute(&conn)?;

        Ok(res)
    }
}
