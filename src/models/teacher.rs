use crate::api_error::ApiError;
use crate::db;
use crate::schema::{profiles, teachers};
use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "teachers"]
pub struct Teacher {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_id: String,
    pub department: String,
    pub campus: Option<String>,
    pub designation: String,
    pub created_at: NaiveDateTime,
}

pub struct TeacherMessage {
    pub user_id: Uuid,
    pub employee_id: String,
    pub department: String,
    pub campus: Option<String>,
    pub designation: String,
}

#[derive(Serialize, Queryable)]
pub struct TeacherOption {
    pub id: Uuid,
    pub full_name: String,
    pub department: String,
    pub campus: Option<String>,
}

impl Teacher {
    pub fn find_by_user(user_id: Uuid) -> Result<Self, ApiError> {
        let conn = db::connection()?;

        teachers::table
            .filter(teachers::user_id.eq(user_id))
            .first(&conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Teacher not found"))
    }

    pub fn find_all() -> Result<Vec<TeacherOption>, ApiError> {
        let conn = db::connection()?;

        let teachers = teachers::table
            .inner_join(profiles::table)
            .select((
                teachers::id,
                profiles::full_name,
                teachers::department,
                teachers::campus,
            ))
            .order(profiles::full_name.asc())
            .load::<TeacherOption>(&conn)?;

        Ok(teachers)
    }

    pub fn full_name(&self) -> Result<String, ApiError> {
        let conn = db::connection()?;

        let name = profiles::table
            .filter(profiles::id.eq(self.user_id))
            .select(profiles::full_name)
            .first(&conn)?;

        Ok(name)
    }

    pub fn count() -> Result<i64, ApiError> {
        let conn = db::connection()?;

        let count = teachers::table.count().get_result(&conn)?;

        Ok(count)
    }

    pub fn insert(conn: &PgConnection, message: TeacherMessage) -> Result<Self, ApiError> {
        let teacher = diesel::insert_into(teachers::table)
            .values(Teacher::from(message))
            .get_result(conn)?;

        Ok(teacher)
    }

    /// Locks the teacher row for the rest of the surrounding transaction.
    pub fn lock(conn: &PgConnection, id: Uuid) -> Result<Option<Self>, ApiError> {
        let teacher = teachers::table
            .find(id)
            .for_update()
            .get_result(conn)
            .optional()?;

        Ok(teacher)
    }
}

impl From<TeacherMessage> for Teacher {
    fn from(teacher: TeacherMessage) -> Self {
        Teacher {
            id: Uuid::new_v4(),
            user_id: teacher.user_id,
            employee_id: teacher.employee_id,
            department: teacher.department,
            campus: teacher.campus,
            designation: teacher.designation,
            created_at: Utc::now().naive_utc(),
        }
    }
}
