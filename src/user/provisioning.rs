//! Admin-side account creation for students and teachers.

use crate::api_error::ApiError;
use crate::campus::{Campus, RollNumber};
use crate::db;
use crate::models::{Student, StudentMessage, Teacher, TeacherMessage};
use crate::user::{Profile, ProfileMessage, Role};
use chrono::{Datelike, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";
pub const PASSWORD_LENGTH: usize = 12;
/// Suffixes `.1` through `.10` are tried after the bare name.
const MAX_EMAIL_SUFFIX: usize = 10;
const DEFAULT_DESIGNATION: &str = "Lecturer";

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub role: Role,
    pub name: String,
    pub campus: Campus,
    pub batch_year: Option<String>,
    pub roll_no: Option<String>,
    pub program: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
}

/// Returned once to the admin; the plain password is not stored anywhere.
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_no: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub success: bool,
    pub credentials: Credentials,
}

pub fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

pub fn generate_employee_id() -> String {
    format!("EMP-{}", rand::thread_rng().gen_range(1000..=9999))
}

/// `Ali  Raza` on campus L gives `ali.raza@lhr.nu.edu.pk`, then `ali.raza.1@…` and so on.
pub fn teacher_email_candidates(name: &str, campus: Campus) -> Vec<String> {
    let base = name
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(".");

    (0..=MAX_EMAIL_SUFFIX)
        .map(|n| match n {
            0 => format!("{}@{}", base, campus.domain()),
            n => format!("{}.{}@{}", base, n, campus.domain()),
        })
        .collect()
}

fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

/// A unique violation on the students table is a roll number clash.
fn roll_number_conflict(error: ApiError, duplicate: &str) -> ApiError {
    match error.status_code {
        409 => ApiError::new(409, duplicate.to_string()),
        _ => error,
    }
}

pub fn create_user(request: CreateUserRequest) -> Result<Credentials, ApiError> {
    let conn = db::connection()?;
    create_user_on(&conn, request)
}

pub fn create_user_on(conn: &PgConnection, request: CreateUserRequest) -> Result<Credentials, ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    match request.role {
        Role::Student => create_student(conn, name, &request),
        Role::Teacher => create_teacher(conn, name, &request),
        Role::Admin => Err(ApiError::bad_request("Only student and teacher accounts can be created")),
    }
}

fn create_student(conn: &PgConnection, name: &str, request: &CreateUserRequest) -> Result<Credentials, ApiError> {
    let batch_year = required(&request.batch_year, "Missing student fields")?;
    let roll_no = required(&request.roll_no, "Missing student fields")?;
    let program = required(&request.program, "Missing student fields")?;
    let section = required(&request.section, "Missing student fields")?;

    let roll = RollNumber::new(batch_year, request.campus, roll_no)?;
    let roll_number = roll.to_string();
    let email = roll.email();
    let password = generate_password(PASSWORD_LENGTH);
    let duplicate = format!("A student with Roll Number {} already exists.", roll_number);

    if Student::roll_number_exists(conn, &roll_number)? {
        return Err(ApiError::new(409, duplicate));
    }
    if Profile::email_exists(conn, &email)? {
        return Err(ApiError::new(
            409,
            format!(
                "A user with email {} already exists. Please check the Roll Number or Name.",
                email
            ),
        ));
    }

    conn.transaction::<_, ApiError, _>(|| {
        let profile = Profile::insert(
            conn,
            ProfileMessage {
                email: email.clone(),
                full_name: name.to_string(),
                role: Role::Student,
                password: password.clone(),
            },
        )?;

        Student::insert(
            conn,
            StudentMessage {
                user_id: profile.id,
                roll_number: roll_number.clone(),
                batch: format!("{}-{}", program, section),
                program: program.to_string(),
                enrollment_year: Utc::now().year(),
            },
        )
        .map_err(|e| roll_number_conflict(e, &duplicate))?;

        Ok(())
    })?;

    info!("Provisioned student {} ({})", roll_number, email);

    Ok(Credentials {
        email,
        password,
        roll_no: Some(roll_number),
    })
}

fn create_teacher(conn: &PgConnection, name: &str, request: &CreateUserRequest) -> Result<Credentials, ApiError> {
    let department = required(&request.department, "Missing teacher fields")?;
    let password = generate_password(PASSWORD_LENGTH);

    let mut email = None;
    for candidate in teacher_email_candidates(name, request.campus) {
        if !Profile::email_exists(conn, &candidate)? {
            email = Some(candidate);
            break;
        }
    }
    let email = email.ok_or_else(|| {
        ApiError::new(
            409,
            "Too many teachers with similar names. Please use a different name.".to_string(),
        )
    })?;

    conn.transaction::<_, ApiError, _>(|| {
        let profile = Profile::insert(
            conn,
            ProfileMessage {
                email: email.clone(),
                full_name: name.to_string(),
                role: Role::Teacher,
                password: password.clone(),
            },
        )?;

        Teacher::insert(
            conn,
            TeacherMessage {
                user_id: profile.id,
                employee_id: generate_employee_id(),
                department: department.to_string(),
                campus: Some(request.campus.code().to_string()),
                designation: DEFAULT_DESIGNATION.to_string(),
            },
        )?;

        Ok(())
    })?;

    info!("Provisioned teacher {}", email);

    Ok(Credentials {
        email,
        password,
        roll_no: None,
    })
}
