use crate::api_error::ApiError;
use crate::campus::{split_batch, Campus, RollNumber};
use crate::db;
use crate::schema::{profiles, students};
use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Queryable, Insertable)]
#[table_name = "students"]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub roll_number: String,
    pub batch: String,
    pub program: String,
    pub enrollment_year: i32,
    pub created_at: NaiveDateTime,
}

pub struct StudentMessage {
    pub user_id: Uuid,
    pub roll_number: String,
    pub batch: String,
    pub program: String,
    pub enrollment_year: i32,
}

#[derive(Serialize, Queryable)]
pub struct StudentListing {
    pub id: Uuid,
    pub roll_number: String,
    pub full_name: String,
    pub email: String,
    pub batch: String,
    pub program: String,
    pub enrollment_year: i32,
}

impl Student {
    pub fn find_by_user(user_id: Uuid) -> Result<Self, ApiError> {
        let conn = db::connection()?;

        students::table
            .filter(students::user_id.eq(user_id))
            .first(&conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Student not found"))
    }

    pub fn find_all() -> Result<Vec<StudentListing>, ApiError> {
        let conn = db::connection()?;

        let students = students::table
            .inner_join(profiles::table)
            .select((
                students::id,
                students::roll_number,
                profiles::full_name,
                profiles::email,
                students::batch,
                students::program,
                students::enrollment_year,
            ))
            .order(students::roll_number.asc())
            .load::<StudentListing>(&conn)?;

        Ok(students)
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

        let count = students::table.count().get_result(&conn)?;

        Ok(count)
    }

    pub fn roll_number_exists(conn: &PgConnection, roll_number: &str) -> Result<bool, ApiError> {
        let count: i64 = students::table
            .filter(students::roll_number.eq(roll_number))
            .count()
            .get_result(conn)?;

        Ok(count > 0)
    }

    pub fn insert(conn: &PgConnection, message: StudentMessage) -> Result<Self, ApiError> {
        let student = diesel::insert_into(students::table)
            .values(Student::from(message))
            .get_result(conn)?;

        Ok(student)
    }

    /// Locks the student row for the rest of the surrounding transaction.
    pub fn lock(conn: &PgConnection, id: Uuid) -> Result<Self, ApiError> {
        let student = students::table.find(id).for_update().get_result(conn)?;

        Ok(student)
    }

    pub fn campus(&self) -> Result<Campus, ApiError> {
        Ok(RollNumber::parse(&self.roll_number)?.campus)
    }

    /// Section part of the batch label, e.g. `3B` for `BSE-3B`.
    pub fn section(&self) -> Option<&str> {
        split_batch(&self.batch).map(|(_, section)| section)
    }
}

impl From<StudentMessage> for Student {
    fn from(student: StudentMessage) -> Self {
        Student {
            id: Uuid::new_v4(),
            user_id: student.user_id,
            roll_number: student.roll_number,
            batch: student.batch,
            program: student.program,
            enrollment_year: student.enrollment_year,
            created_at: Utc::now().naive_utc(),
        }
    }
}
