use crate::api_error::ApiError;
use crate::models::dashboard;
use crate::models::{Assessment, AttendanceRecord, Enrollment, EnrollmentInput, Notification, Student};
use crate::user::{AuthUser, Role};
use actix_web::{get, post, put, web, HttpResponse};
use uuid::Uuid;

use serde_json::json;

fn current_student(identity: &AuthUser) -> Result<Student, ApiError> {
    identity.require(Role::Student)?;
    Student::find_by_user(identity.id)
}

#[get("/student/courses/")]
async fn enrolled_courses(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let student = current_student(&identity)?;

    let courses = Enrollment::enrolled_courses(&student)?;

    Ok(HttpResponse::Ok().json(courses))
}

#[get("/student/courses/available/")]
async fn available_courses(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let student = current_student(&identity)?;

    let courses = Enrollment::available_courses(&student)?;

    Ok(HttpResponse::Ok().json(courses))
}

#[post("/student/enrollments/")]
async fn enroll(
    enrollment: web::Json<EnrollmentInput>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let student = current_student(&identity)?;

    let enrollment = Enrollment::enroll(&student, enrollment.course_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Enrolled successfully",
        "enrollment": enrollment,
    })))
}

#[get("/student/results/")]
async fn results(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let student = current_student(&identity)?;

    let results = Assessment::results_for_student(student.id)?;

    Ok(HttpResponse::Ok().json(results))
}

#[get("/student/attendance/")]
async fn attendance(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let student = current_student(&identity)?;

    let attendance = AttendanceRecord::student_summary(&student)?;

    Ok(HttpResponse::Ok().json(attendance))
}

#[get("/student/dashboard/")]
async fn stats(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let student = current_student(&identity)?;

    let dashboard = dashboard::student_dashboard(&student)?;

    Ok(HttpResponse::Ok().json(dashboard))
}

#[get("/student/notifications/")]
async fn notifications(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Student)?;

    let notifications = Notification::find_for_user(identity.id, None)?;

    Ok(HttpResponse::Ok().json(notifications))
}

#[put("/student/notifications/{id}/read/")]
async fn mark_read(id: web::Path<Uuid>, identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Student)?;

    let notification = Notification::mark_read(id.into_inner(), identity.id)?;

    Ok(HttpResponse::Ok().json(notification))
}

pub fn student_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(enrolled_courses);
    cfg.service(available_courses);
    cfg.service(enroll);
    cfg.service(results);
    cfg.service(attendance);
    cfg.service(stats);
    cfg.service(notifications);
    cfg.service(mark_read);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::user::Profile;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use chrono::Utc;

    #[actix_rt::test]
    async fn teachers_cannot_enroll() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .configure(student_routes),
        )
        .await;

        let teacher = Profile {
            id: Uuid::new_v4(),
            email: "ali.raza@cfd.nu.edu.pk".to_string(),
            full_name: "Ali Raza".to_string(),
            role: Role::Teacher.as_str().to_string(),
            password: String::new(),
            created_at: Utc::now().naive_utc(),
        };
        let token = teacher.generate_token(&test_config()).unwrap();

        let req = test::TestRequest::post()
            .uri("/student/enrollments/")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .set_json(&json!({ "course_id": Uuid::new_v4() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }
}
