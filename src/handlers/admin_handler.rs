use crate::api_error::{ActionResponse, ApiError};
use crate::models::dashboard;
use crate::models::{AssignmentInput, Course, CourseAssignment, CourseInput, Student, Teacher};
use crate::user::{AuthUser, Role};
use actix_web::{delete, get, post, web, HttpResponse};
use uuid::Uuid;

use serde_json::json;

#[get("/admin/teachers/")]
async fn find_teachers(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let teachers = Teacher::find_all()?;

    Ok(HttpResponse::Ok().json(teachers))
}

#[get("/admin/students/")]
async fn find_students(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let students = Student::find_all()?;

    Ok(HttpResponse::Ok().json(students))
}

#[get("/admin/courses/")]
async fn find_courses(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let courses = Course::find_all()?;

    Ok(HttpResponse::Ok().json(courses))
}

#[post("/admin/courses/")]
async fn create_course(
    course: web::Json<CourseInput>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let course = Course::create(course.into_inner())?;
    info!("Created course {}", course.course_code);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Course {} created", course.course_code),
        "course": course,
    })))
}

#[delete("/admin/courses/{id}/")]
async fn delete_course(id: web::Path<Uuid>, identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let num_deleted = Course::delete(id.into_inner())?;
    if num_deleted == 0 {
        return Err(ApiError::not_found("Course not found"));
    }

    Ok(HttpResponse::Ok().json(ActionResponse::ok("Course deleted")))
}

#[get("/admin/courses/{id}/assignments/")]
async fn course_assignments(
    id: web::Path<Uuid>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let assignments = CourseAssignment::find_for_course(id.into_inner())?;

    Ok(HttpResponse::Ok().json(assignments))
}

#[post("/admin/assignments/")]
async fn create_assignment(
    assignment: web::Json<AssignmentInput>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let assignment = CourseAssignment::create(assignment.into_inner())?;
    info!(
        "Assigned teacher {} to course {} section {}",
        assignment.teacher_id, assignment.course_id, assignment.section
    );

    Ok(HttpResponse::Ok().json(ActionResponse::ok("Course assigned successfully")))
}

#[delete("/admin/assignments/{id}/")]
async fn delete_assignment(
    id: web::Path<Uuid>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let num_deleted = CourseAssignment::delete(id.into_inner())?;
    if num_deleted == 0 {
        return Err(ApiError::not_found("Assignment not found"));
    }

    Ok(HttpResponse::Ok().json(ActionResponse::ok("Assignment removed")))
}

#[get("/admin/dashboard/")]
async fn stats(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let stats = dashboard::admin_stats()?;

    Ok(HttpResponse::Ok().json(stats))
}

#[get("/admin/activity/")]
async fn activity(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let activity = dashboard::recent_activity()?;

    Ok(HttpResponse::Ok().json(activity))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(find_teachers);
    cfg.service(find_students);
    cfg.service(find_courses);
    cfg.service(create_course);
    cfg.service(delete_course);
    cfg.service(course_assignments);
    cfg.service(create_assignment);
    cfg.service(delete_assignment);
    cfg.service(stats);
    cfg.service(activity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::user::Profile;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use chrono::Utc;

    fn token_for(role: Role) -> String {
        let profile = Profile {
            id: Uuid::new_v4(),
            email: format!("{}@cfd.nu.edu.pk", role),
            full_name: "Test User".to_string(),
            role: role.as_str().to_string(),
            password: String::new(),
            created_at: Utc::now().naive_utc(),
        };
        profile.generate_token(&test_config()).unwrap()
    }

    #[actix_rt::test]
    async fn admin_routes_require_a_session() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .configure(admin_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/admin/dashboard/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_rt::test]
    async fn non_admins_are_forbidden() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .configure(admin_routes),
        )
        .await;

        for role in &[Role::Student, Role::Teacher] {
            let req = test::TestRequest::get()
                .uri("/admin/courses/")
                .insert_header((header::AUTHORIZATION, format!("Bearer {}", token_for(*role))))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }
    }

    #[actix_rt::test]
    async fn tampered_token_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .configure(admin_routes),
        )
        .await;

        let token = format!("{}x", token_for(Role::Admin));
        let req = test::TestRequest::delete()
            .uri(&format!("/admin/courses/{}/", Uuid::new_v4()))
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
