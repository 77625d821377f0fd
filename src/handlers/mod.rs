mod admin_handler;
mod student_handler;
mod teacher_handler;

pub use admin_handler::*;
pub use student_handler::*;
pub use teacher_handler::*;
