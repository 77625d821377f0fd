use crate::api_error::ApiError;
use crate::db;
use crate::grading::{self, AssessmentKind, AssessmentMark, GradeSummary};
use crate::models::{Course, Enrollment};
use crate::schema::{assessments, student_marks};
use chrono::{NaiveDateTime, Utc};
use diesel::pg::upsert::excluded;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "assessments"]
pub struct Assessment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub kind: String,
    pub total_marks: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "student_marks"]
pub struct StudentMark {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub student_id: Uuid,
    pub obtained_marks: Option<f64>,
    pub updated_at: NaiveDateTime,
}

/// Marks for one assessment, keyed by student id. A null mark means "not marked yet".
#[derive(Deserialize)]
pub struct SaveMarksInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub total_marks: i32,
    pub marks: HashMap<Uuid, Option<f64>>,
}

#[derive(Serialize)]
pub struct AssessmentMarks {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub total_marks: i32,
    pub marks: HashMap<Uuid, f64>,
}

#[derive(Serialize)]
pub struct CourseResult {
    pub course_code: String,
    pub course_name: String,
    #[serde(flatten)]
    pub summary: GradeSummary,
}

pub fn validate_marks(total_marks: i32, marks: &HashMap<Uuid, Option<f64>>) -> Result<(), ApiError> {
    if total_marks < 0 {
        return Err(ApiError::bad_request("Total marks cannot be negative"));
    }
    for obtained in marks.values().flatten() {
        if !obtained.is_finite() || *obtained < 0.0 {
            return Err(ApiError::bad_request(format!("Invalid mark {}", obtained)));
        }
        if *obtained > total_marks as f64 {
            return Err(ApiError::bad_request(format!(
                "Mark {} exceeds the total of {}",
                obtained, total_marks
            )));
        }
    }
    Ok(())
}

/// Marks may only be saved for students enrolled in the course.
pub fn check_enrolled(enrolled: &HashSet<Uuid>, marks: &HashMap<Uuid, Option<f64>>) -> Result<(), ApiError> {
    match marks.keys().find(|student_id| !enrolled.contains(student_id)) {
        Some(student_id) => Err(ApiError::bad_request(format!(
            "Student {} is not enrolled in this course",
            student_id
        ))),
        None => Ok(()),
    }
}

/// An assessment keeps the type it was created with.
pub fn check_same_kind(stored: &str, requested: AssessmentKind) -> Result<(), ApiError> {
    if stored != requested.as_str() {
        return Err(ApiError::bad_request(format!(
            "Assessment type is {} and cannot be changed to {}",
            stored, requested
        )));
    }
    Ok(())
}

/// A lowered total must still cover every stored mark that this save leaves untouched.
pub fn check_stored_marks<I>(total_marks: i32, untouched: I) -> Result<(), ApiError>
where
    I: IntoIterator<Item = f64>,
{
    match untouched.into_iter().find(|obtained| *obtained > total_marks as f64) {
        Some(obtained) => Err(ApiError::bad_request(format!(
            "Total of {} is below an existing mark of {}",
            total_marks, obtained
        ))),
        None => Ok(()),
    }
}

impl Assessment {
    pub fn kind(&self) -> Result<AssessmentKind, ApiError> {
        self.kind.parse()
    }

    pub fn find_for_course(course_id: Uuid) -> Result<Vec<Self>, ApiError> {
        let conn = db::connection()?;

        let assessments = assessments::table
            .filter(assessments::course_id.eq(course_id))
            .order(assessments::created_at.asc())
            .load::<Assessment>(&conn)?;

        Ok(assessments)
    }

    pub fn find_with_marks(course_id: Uuid, name: &str) -> Result<AssessmentMarks, ApiError> {
        let conn = db::connection()?;

        let assessment: Assessment = assessments::table
            .filter(assessments::course_id.eq(course_id))
            .filter(assessments::name.eq(name))
            .first(&conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found(format!("Assessment {} not found", name)))?;

        let marks = student_marks::table
            .filter(student_marks::assessment_id.eq(assessment.id))
            .select((student_marks::student_id, student_marks::obtained_marks))
            .load::<(Uuid, Option<f64>)>(&conn)?
            .into_iter()
            .filter_map(|(student_id, obtained)| obtained.map(|o| (student_id, o)))
            .collect();

        Ok(AssessmentMarks {
            id: assessment.id,
            kind: assessment.kind,
            total_marks: assessment.total_marks,
            marks,
        })
    }

    pub fn save_marks(course_id: Uuid, input: &SaveMarksInput) -> Result<Self, ApiError> {
        let conn = db::connection()?;
        Assessment::save_marks_on(&conn, course_id, input)
    }

    /// Gets or creates the assessment by (course, name), then upserts every mark.
    pub fn save_marks_on(conn: &PgConnection, course_id: Uuid, input: &SaveMarksInput) -> Result<Self, ApiError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Assessment name is required"));
        }
        let kind: AssessmentKind = input.kind.parse()?;
        validate_marks(input.total_marks, &input.marks)?;

        let enrolled: HashSet<Uuid> = Enrollment::enrolled_student_ids(conn, course_id)?
            .into_iter()
            .collect();
        check_enrolled(&enrolled, &input.marks)?;

        conn.transaction::<_, ApiError, _>(|| {
            let existing: Option<Assessment> = assessments::table
                .filter(assessments::course_id.eq(course_id))
                .filter(assessments::name.eq(name))
                .for_update()
                .first(conn)
                .optional()?;

            let assessment = match existing {
                Some(assessment) => {
                    check_same_kind(&assessment.kind, kind)?;

                    let stored = student_marks::table
                        .filter(student_marks::assessment_id.eq(assessment.id))
                        .select((student_marks::student_id, student_marks::obtained_marks))
                        .load::<(Uuid, Option<f64>)>(conn)?;
                    check_stored_marks(
                        input.total_marks,
                        stored
                            .into_iter()
                            .filter(|(student_id, _)| !input.marks.contains_key(student_id))
                            .filter_map(|(_, obtained)| obtained),
                    )?;

                    diesel::update(assessments::table.find(assessment.id))
                        .set(assessments::total_marks.eq(input.total_marks))
                        .get_result::<Assessment>(conn)?
                }
                None => diesel::insert_into(assessments::table)
                    .values(Assessment {
                        id: Uuid::new_v4(),
                        course_id,
                        name: name.to_string(),
                        kind: kind.as_str().to_string(),
                        total_marks: input.total_marks,
                        created_at: Utc::now().naive_utc(),
                    })
                    .get_result::<Assessment>(conn)
                    .map_err(|e| ApiError::from_diesel_or_duplicate(e, "Assessment already exists"))?,
            };

            let now = Utc::now().naive_utc();
            let rows: Vec<StudentMark> = input
                .marks
                .iter()
                .map(|(student_id, obtained)| StudentMark {
                    id: Uuid::new_v4(),
                    assessment_id: assessment.id,
                    student_id: *student_id,
                    obtained_marks: *obtained,
                    updated_at: now,
                })
                .collect();

            if !rows.is_empty() {
                diesel::insert_into(student_marks::table)
                    .values(&rows)
                    .on_conflict((student_marks::assessment_id, student_marks::student_id))
                    .do_update()
                    .set((
                        student_marks::obtained_marks.eq(excluded(student_marks::obtained_marks)),
                        student_marks::updated_at.eq(excluded(student_marks::updated_at)),
                    ))
                    .execute(conn)?;
            }

            Ok(assessment)
        })
    }

    pub fn delete_by_name(course_id: Uuid, name: &str) -> Result<usize, ApiError> {
        let conn = db::connection()?;

        let res = diesel::delete(
            assessments::table
                .filter(assessments::course_id.eq(course_id))
                .filter(assessments::name.eq(name)),
        )
        .execute(&conn)?;

        Ok(res)
    }

    pub fn grade_summary(course_id: Uuid, student_id: Uuid) -> Result<GradeSummary, ApiError> {
        let assessments = Assessment::find_for_course(course_id)?;
        if assessments.is_empty() {
            return Ok(GradeSummary::empty());
        }

        let conn = db::connection()?;
        let ids: Vec<Uuid> = assessments.iter().map(|a| a.id).collect();
        let marks: HashMap<Uuid, Option<f64>> = student_marks::table
            .filter(student_marks::student_id.eq(student_id))
            .filter(student_marks::assessment_id.eq_any(ids))
            .select((student_marks::assessment_id, student_marks::obtained_marks))
            .load::<(Uuid, Option<f64>)>(&conn)?
            .into_iter()
            .collect();

        let inputs = assessments
            .into_iter()
            .map(|a| {
                Ok(AssessmentMark {
                    kind: a.kind()?,
                    obtained: marks.get(&a.id).cloned().flatten(),
                    name: a.name,
                    total_marks: a.total_marks,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(grading::aggregate(&inputs))
    }

    pub fn course_result(course: &Course, student_id: Uuid) -> Result<CourseResult, ApiError> {
        Ok(CourseResult {
            course_code: course.course_code.clone(),
            course_name: course.course_name.clone(),
            summary: Assessment::grade_summary(course.id, student_id)?,
        })
    }

    /// One result per enrolled course, ordered by course code.
    pub fn results_for_student(student_id: Uuid) -> Result<Vec<CourseResult>, ApiError> {
        Enrollment::find_for_student(student_id)?
            .iter()
            .map(|(_, course)| Assessment::course_result(course, student_id))
            .collect()
    }

    pub fn class_average(course_id: Uuid) -> Result<i64, ApiError> {
        let assessments = Assessment::find_for_course(course_id)?;
        if assessments.is_empty() {
            return Ok(0);
        }

        let conn = db::connection()?;
        let ids: Vec<Uuid> = assessments.iter().map(|a| a.id).collect();
        let marks = student_marks::table
            .filter(student_marks::assessment_id.eq_any(ids))
            .select((student_marks::student_id, student_marks::obtained_marks))
            .load::<(Uuid, Option<f64>)>(&conn)?;

        let mut per_student: HashMap<Uuid, f64> = HashMap::new();
        for (student_id, obtained) in marks {
            if let Some(obtained) = obtained {
                *per_student.entry(student_id).or_insert(0.0) += obtained;
            }
        }

        let totals: Vec<i32> = assessments.iter().map(|a| a.total_marks).collect();
        Ok(grading::class_average(&totals, per_student.into_iter().map(|(_, v)| v)))
    }
}
