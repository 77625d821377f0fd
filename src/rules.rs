//! Pre-insert validation for teacher workload and student credit load.

use crate::api_error::ApiError;
use crate::campus::Campus;
use std::collections::HashSet;
use uuid::Uuid;

pub const MAX_COURSES_PER_TEACHER: usize = 3;
pub const MAX_SECTIONS_PER_COURSE: usize = 2;
pub const MAX_CREDIT_HOURS: i32 = 19;

/// Validates a new (course, section) assignment against the teacher's home campus and
/// their current assignments, given as the course id of each existing row.
pub fn check_assignment(
    teacher_campus: Option<&str>,
    campus: Campus,
    course_id: Uuid,
    existing_course_ids: &[Uuid],
) -> Result<(), ApiError> {
    if let Some(home) = teacher_campus.filter(|c| !c.is_empty()) {
        if home != campus.code() {
            return Err(ApiError::bad_request(format!(
                "Teacher is from {} campus but assignment is for {} campus.",
                home, campus
            )));
        }
    }

    let distinct: HashSet<&Uuid> = existing_course_ids.iter().collect();
    if !distinct.contains(&course_id) && distinct.len() >= MAX_COURSES_PER_TEACHER {
        return Err(ApiError::bad_request(format!(
            "Workload Limit: Teacher cannot teach more than {} different courses.",
            MAX_COURSES_PER_TEACHER
        )));
    }

    let sections = existing_course_ids.iter().filter(|id| **id == course_id).count();
    if sections >= MAX_SECTIONS_PER_COURSE {
        return Err(ApiError::bad_request(format!(
            "Workload Limit: Teacher cannot teach more than {} sections of the same course.",
            MAX_SECTIONS_PER_COURSE
        )));
    }

    Ok(())
}

fn credit_overflow() -> ApiError {
    ApiError::bad_request(format!(
        "Credit limit exceeded: the maximum is {} credit hours.",
        MAX_CREDIT_HOURS
    ))
}

/// Credit hours across the courses a student is already enrolled in.
pub fn total_credits(credits: &[i32]) -> Result<i32, ApiError> {
    credits
        .iter()
        .try_fold(0i32, |total, c| total.checked_add(*c))
        .ok_or_else(credit_overflow)
}

pub fn check_credit_limit(current_credits: i32, new_course_credits: i32) -> Result<(), ApiError> {
    let total = current_credits
        .checked_add(new_course_credits)
        .ok_or_else(credit_overflow)?;
    if total > MAX_CREDIT_HOURS {
        return Err(ApiError::bad_request(format!(
            "Credit limit exceeded: enrolling would bring you to {} credit hours (max {}).",
            total, MAX_CREDIT_HOURS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn fourth_distinct_course_is_rejected() {
        let courses = ids(3);
        let err = check_assignment(None, Campus::F, Uuid::new_v4(), &courses).unwrap_err();
        assert_eq!(err.status_code, 400);
        assert!(err.message.contains("more than 3 different courses"));
    }

    #[test]
    fn second_section_of_taught_course_is_accepted() {
        let courses = ids(3);
        assert!(check_assignment(Some("F"), Campus::F, courses[1], &courses).is_ok());
    }

    #[test]
    fn third_section_of_same_course_is_rejected() {
        let course = Uuid::new_v4();
        let existing = vec![course, course];
        let err = check_assignment(None, Campus::L, course, &existing).unwrap_err();
        assert!(err.message.contains("more than 2 sections"));
    }

    #[test]
    fn campus_mismatch_is_rejected_only_when_home_campus_is_set() {
        let err = check_assignment(Some("L"), Campus::I, Uuid::new_v4(), &[]).unwrap_err();
        assert_eq!(err.message, "Teacher is from L campus but assignment is for I campus.");

        assert!(check_assignment(None, Campus::I, Uuid::new_v4(), &[]).is_ok());
        assert!(check_assignment(Some(""), Campus::I, Uuid::new_v4(), &[]).is_ok());
    }

    #[test]
    fn first_assignment_is_accepted() {
        assert!(check_assignment(Some("K"), Campus::K, Uuid::new_v4(), &[]).is_ok());
    }

    #[test]
    fn credit_limit_is_inclusive_of_19() {
        assert!(check_credit_limit(18, 3).is_err());
        assert!(check_credit_limit(16, 3).is_ok());
        assert!(check_credit_limit(0, 19).is_ok());
        assert!(check_credit_limit(19, 1).is_err());
    }

    #[test]
    fn oversized_credit_values_are_rejected_without_wrapping() {
        let err = check_credit_limit(3, i32::MAX).unwrap_err();
        assert_eq!(err.status_code, 400);
        assert!(check_credit_limit(i32::MAX, i32::MAX).is_err());
        assert!(check_credit_limit(-5, i32::MIN).is_err());
    }

    #[test]
    fn total_credits_sums_or_rejects_overflow() {
        assert_eq!(total_credits(&[3, 3, 4]).unwrap(), 10);
        assert_eq!(total_credits(&[]).unwrap(), 0);
        assert!(total_credits(&[i32::MAX, 1]).is_err());
    }
}
