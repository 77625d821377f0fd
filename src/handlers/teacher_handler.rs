use crate::api_error::{ActionResponse, ApiError};
use crate::models::dashboard;
use crate::models::{
    spawn_fanout, Assessment, AttendanceRecord, CourseAssignment, Enrollment, Notification,
    SaveAttendanceInput, SaveMarksInput, Teacher,
};
use crate::user::{AuthUser, Role};
use actix_web::{delete, get, put, web, HttpResponse};
use chrono::{NaiveDate, Utc};

fn current_teacher(identity: &AuthUser) -> Result<Teacher, ApiError> {
    identity.require(Role::Teacher)?;
    Teacher::find_by_user(identity.id)
}

fn parse_date(date: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date {:?}, expected YYYY-MM-DD", date)))
}

#[get("/teacher/courses/")]
async fn find_courses(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;

    let courses = CourseAssignment::teacher_courses(teacher.id)?;

    Ok(HttpResponse::Ok().json(courses))
}

#[get("/teacher/courses/{code}/")]
async fn find_course(code: web::Path<String>, identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;

    let details = CourseAssignment::course_details(teacher.id, &code)?;

    Ok(HttpResponse::Ok().json(details))
}

#[get("/teacher/courses/{code}/students/")]
async fn course_students(
    code: web::Path<String>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;
    let (course, _) = CourseAssignment::course_for_teacher(teacher.id, &code)?;

    let students = Enrollment::course_students(course.id)?;

    Ok(HttpResponse::Ok().json(students))
}

#[get("/teacher/courses/{code}/assessments/{name}/")]
async fn find_assessment(
    path: web::Path<(String, String)>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;
    let (code, name) = path.into_inner();
    let (course, _) = CourseAssignment::course_for_teacher(teacher.id, &code)?;

    let assessment = Assessment::find_with_marks(course.id, &name)?;

    Ok(HttpResponse::Ok().json(assessment))
}

#[put("/teacher/courses/{code}/assessments/")]
async fn save_marks(
    code: web::Path<String>,
    marks: web::Json<SaveMarksInput>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;
    let (course, _) = CourseAssignment::course_for_teacher(teacher.id, &code)?;

    let assessment = Assessment::save_marks(course.id, &marks)?;
    info!(
        "Saved {} marks for {} in {}",
        marks.marks.len(),
        assessment.name,
        course.course_code
    );

    let name = assessment.name;
    spawn_fanout("marks", move || Notification::notify_marks_posted(&course, &name));

    Ok(HttpResponse::Ok().json(ActionResponse::ok("Marks saved successfully")))
}

#[delete("/teacher/courses/{code}/assessments/{name}/")]
async fn delete_assessment(
    path: web::Path<(String, String)>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;
    let (code, name) = path.into_inner();
    let (course, _) = CourseAssignment::course_for_teacher(teacher.id, &code)?;

    let num_deleted = Assessment::delete_by_name(course.id, &name)?;
    if num_deleted == 0 {
        return Err(ApiError::not_found(format!("Assessment {} not found", name)));
    }

    Ok(HttpResponse::Ok().json(ActionResponse::ok("Assessment deleted")))
}

#[get("/teacher/courses/{code}/attendance/{date}/")]
async fn find_attendance(
    path: web::Path<(String, String)>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;
    let (code, date) = path.into_inner();
    let date = parse_date(&date)?;
    let (course, _) = CourseAssignment::course_for_teacher(teacher.id, &code)?;

    let attendance = AttendanceRecord::for_date(course.id, date)?;

    Ok(HttpResponse::Ok().json(attendance))
}

#[put("/teacher/courses/{code}/attendance/")]
async fn save_attendance(
    code: web::Path<String>,
    attendance: web::Json<SaveAttendanceInput>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;
    let (course, _) = CourseAssignment::course_for_teacher(teacher.id, &code)?;
    let SaveAttendanceInput { date, records } = attendance.into_inner();

    let saved = AttendanceRecord::save(course.id, teacher.id, date, &records)?;
    info!("Saved {} attendance records for {} on {}", saved, course.course_code, date);

    spawn_fanout("attendance", move || {
        Notification::notify_attendance(&course, date, &records)
    });

    Ok(HttpResponse::Ok().json(ActionResponse::ok("Attendance saved successfully")))
}

#[get("/teacher/dashboard/")]
async fn stats(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;

    let dashboard = dashboard::teacher_dashboard(&teacher)?;

    Ok(HttpResponse::Ok().json(dashboard))
}

#[get("/teacher/attendance-trend/")]
async fn attendance_trend(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let teacher = current_teacher(&identity)?;

    let course_ids: Vec<_> = CourseAssignment::sections_for_teacher(teacher.id)?
        .into_iter()
        .map(|s| s.course_id)
        .collect();
    let trend = AttendanceRecord::trend(&course_ids, Utc::now().naive_utc().date())?;

    Ok(HttpResponse::Ok().json(trend))
}

pub fn teacher_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(find_courses);
    cfg.service(find_course);
    cfg.service(course_students);
    cfg.service(find_assessment);
    cfg.service(save_marks);
    cfg.service(delete_assessment);
    cfg.service(find_attendance);
    cfg.service(save_attendance);
    cfg.service(stats);
    cfg.service(attendance_trend);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_dates_are_iso() {
        assert_eq!(
            parse_date("2024-11-04").unwrap(),
            NaiveDate::from_ymd(2024, 11, 4)
        );
        let err = parse_date("04/11/2024").unwrap_err();
        assert_eq!(err.status_code, 400);
    }
}
