use crate::api_error::ApiError;
use crate::db;
use crate::rules::MAX_CREDIT_HOURS;
use crate::schema::{course_assignments, courses, profiles, teachers};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Midterm and final counts are fixed for every course.
pub const DEFAULT_MIDTERMS: i32 = 2;
pub const DEFAULT_FINALS: i32 = 1;

#[derive(Clone, Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "courses"]
pub struct Course {
    pub id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub syllabus: Option<String>,
    pub num_assignments: i32,
    pub num_quizzes: i32,
    pub num_midterms: i32,
    pub num_finals: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct CourseInput {
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub syllabus: Option<String>,
    #[serde(default)]
    pub num_assignments: i32,
    #[serde(default)]
    pub num_quizzes: i32,
}

#[derive(Serialize)]
pub struct AssignmentSummary {
    pub teacher_name: String,
    pub section: String,
    pub campus: String,
}

#[derive(Serialize)]
pub struct CourseListing {
    pub id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub assignments: Vec<AssignmentSummary>,
}

impl CourseInput {
    fn validate(&self) -> Result<(), ApiError> {
        if self.course_code.trim().is_empty() || self.course_name.trim().is_empty() || self.credits == 0 {
            return Err(ApiError::bad_request("Missing required fields"));
        }
        if !(1..=MAX_CREDIT_HOURS).contains(&self.credits) {
            return Err(ApiError::bad_request(format!(
                "Credits must be between 1 and {}",
                MAX_CREDIT_HOURS
            )));
        }
        if self.num_assignments < 0 || self.num_quizzes < 0 {
            return Err(ApiError::bad_request("Assessment counts cannot be negative"));
        }
        Ok(())
    }
}

impl Course {
    pub fn find_by_code(code: &str) -> Result<Self, ApiError> {
        let conn = db::connection()?;

        courses::table
            .filter(courses::course_code.eq(code))
            .first(&conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found(format!("Course {} not found", code)))
    }

    pub fn find_many(ids: &[Uuid]) -> Result<Vec<Self>, ApiError> {
        let conn = db::connection()?;

        let courses = courses::table
            .filter(courses::id.eq_any(ids.to_vec()))
            .load::<Course>(&conn)?;

        Ok(courses)
    }

    /// Newest first, each with the teachers assigned to its sections.
    pub fn find_all() -> Result<Vec<CourseListing>, ApiError> {
        let conn = db::connection()?;

        let courses = courses::table
            .order(courses::created_at.desc())
            .load::<Course>(&conn)?;

        let rows = course_assignments::table
            .inner_join(teachers::table.inner_join(profiles::table))
            .select((
                course_assignments::course_id,
                profiles::full_name,
                course_assignments::section,
                course_assignments::campus,
            ))
            .order(course_assignments::section.asc())
            .load::<(Uuid, String, String, String)>(&conn)?;

        let mut by_course: HashMap<Uuid, Vec<AssignmentSummary>> = HashMap::new();
        for (course_id, teacher_name, section, campus) in rows {
            by_course.entry(course_id).or_default().push(AssignmentSummary {
                teacher_name,
                section,
                campus,
            });
        }

        Ok(courses
            .into_iter()
            .map(|course| CourseListing {
                assignments: by_course.remove(&course.id).unwrap_or_default(),
                id: course.id,
                course_code: course.course_code,
                course_name: course.course_name,
                credits: course.credits,
            })
            .collect())
    }

    pub fn find_recent(limit: i64) -> Result<Vec<Self>, ApiError> {
        let conn = db::connection()?;

        let courses = courses::table
            .order(courses::created_at.desc())
            .limit(limit)
            .load::<Course>(&conn)?;

        Ok(courses)
    }

    pub fn count() -> Result<i64, ApiError> {
        let conn = db::connection()?;

        let count = courses::table.count().get_result(&conn)?;

        Ok(count)
    }

    pub fn create(course: CourseInput) -> Result<Self, ApiError> {
        course.validate()?;
        let conn = db::connection()?;

        let code = course.course_code.trim().to_string();
        let duplicate = format!("Course code {} already exists", code);

        let existing: i64 = courses::table
            .filter(courses::course_code.eq(&code))
            .count()
            .get_result(&conn)?;
        if existing > 0 {
            return Err(ApiError::new(409, duplicate));
        }

        let course = diesel::insert_into(courses::table)
            .values(Course::from(course))
            .get_result(&conn)
            .map_err(|e| ApiError::from_diesel_or_duplicate(e, &duplicate))?;

        Ok(course)
    }

    pub fn delete(id: Uuid) -> Result<usize, ApiError> {
        let conn = db::connection()?;

        let res = diesel::delete(courses::table.filter(courses::id.eq(id))).execute(&conn)?;

        Ok(res)
    }
}

impl From<CourseInput> for Course {
    fn from(course: CourseInput) -> Self {
        Course {
            id: Uuid::new_v4(),
            course_code: course.course_code.trim().to_string(),
            course_name: course.course_name.trim().to_string(),
            credits: course.credits,
            syllabus: course.syllabus.filter(|s| !s.trim().is_empty()),
            num_assignments: course.num_assignments,
            num_quizzes: course.num_quizzes,
            num_midterms: DEFAULT_MIDTERMS,
            num_finals: DEFAULT_FINALS,
            created_at: Utc::now().naive_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(credits: i32) -> CourseInput {
        serde_json::from_value(serde_json::json!({
            "course_code": " CS101 ",
            "course_name": "Programming Fundamentals",
            "credits": credits,
            "num_quizzes": 4
        }))
        .unwrap()
    }

    #[test]
    fn midterms_and_finals_are_fixed() {
        let course = Course::from(input(3));
        assert_eq!(course.course_code, "CS101");
        assert_eq!(course.num_midterms, 2);
        assert_eq!(course.num_finals, 1);
        assert_eq!(course.num_quizzes, 4);
        assert_eq!(course.num_assignments, 0);
        assert!(course.syllabus.is_none());
    }

    #[test]
    fn zero_credits_is_missing_required_field() {
        assert!(input(0).validate().is_err());
        assert!(input(3).validate().is_ok());
    }

    #[test]
    fn credits_are_capped_at_the_semester_limit() {
        assert!(input(19).validate().is_ok());
        assert!(input(20).validate().is_err());
        assert!(input(-3).validate().is_err());
        let err = input(i32::MAX).validate().unwrap_err();
        assert_eq!(err.message, "Credits must be between 1 and 19");
    }
}
