mod assessment;
pub mod attendance;
mod course;
mod course_assignment;
pub mod dashboard;
mod enrollment;
#[cfg(test)]
pub mod fixtures;
mod notification;
mod student;
mod teacher;

pub use assessment::*;
pub use attendance::{AttendanceRecord, SaveAttendanceInput};
pub use course::*;
pub use course_assignment::*;
pub use enrollment::*;
pub use notification::*;
pub use student::*;
pub use teacher::*;
