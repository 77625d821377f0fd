table! {
    assessments (id) {
        id -> Uuid,
        course_id -> Uuid,
        name -> Text,
        kind -> Text,
        total_marks -> Int4,
        created_at -> Timestamp,
    }
}

table! {
    attendance_records (id) {
        id -> Uuid,
        enrollment_id -> Uuid,
        date -> Date,
        status -> Text,
        marked_by -> Uuid,
        marked_at -> Timestamp,
    }
}

table! {
    course_assignments (id) {
        id -> Uuid,
        course_id -> Uuid,
        teacher_id -> Uuid,
        section -> Text,
        department -> Text,
        campus -> Text,
        created_at -> Timestamp,
    }
}

table! {
    courses (id) {
        id -> Uuid,
        course_code -> Text,
        course_name -> Text,
        credits -> Int4,
        syllabus -> Nullable<Text>,
        num_assignments -> Int4,
        num_quizzes -> Int4,
        num_midterms -> Int4,
        num_finals -> Int4,
        created_at -> Timestamp,
    }
}

table! {
    enrollments (id) {
        id -> Uuid,
        student_id -> Uuid,
        course_id -> Uuid,
        enrollment_date -> Timestamp,
    }
}

table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        kind -> Text,
        title -> Text,
        message -> Text,
        related_course_id -> Nullable<Uuid>,
        created_at -> Timestamp,
        is_read -> Bool,
    }
}

table! {
    profiles (id) {
        id -> Uuid,
        email -> Text,
        full_name -> Text,
        role -> Text,
        password -> Text,
        created_at -> Timestamp,
    }
}

table! {
    student_marks (id) {
        id -> Uuid,
        assessment_id -> Uuid,
        student_id -> Uuid,
        obtained_marks -> Nullable<Float8>,
        updated_at -> Timestamp,
    }
}

table! {
    students (id) {
        id -> Uuid,
        user_id -> Uuid,
        roll_number -> Text,
        batch -> Text,
        program -> Text,
        enrollment_year -> Int4,
        created_at -> Timestamp,
    }
}

table! {
    teachers (id) {
        id -> Uuid,
        user_id -> Uuid,
        employee_id -> Text,
        department -> Text,
        campus -> Nullable<Text>,
        designation -> Text,
        created_at -> Timestamp,
    }
}

joinable!(assessments -> courses (course_id));
joinable!(attendance_records -> enrollments (enrollment_id));
joinable!(attendance_records -> teachers (marked_by));
joinable!(course_assignments -> courses (course_id));
joinable!(course_assignments -> teachers (teacher_id));
joinable!(enrollments -> courses (course_id));
joinable!(enrollments -> students (student_id));
joinable!(notifications -> profiles (user_id));
joinable!(student_marks -> assessments (assessment_id));
joinable!(student_marks -> students (student_id));
joinable!(students -> profiles (user_id));
joinable!(teachers -> profiles (user_id));

allow_tables_to_appear_in_same_query!(
    assessments,
    attendance_records,
    course_assignments,
    courses,
    enrollments,
    notifications,
    profiles,
    student_marks,
    students,
    teachers,
);
