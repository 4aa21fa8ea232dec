pub mod assignment;
pub mod enrollment;
pub mod grade;
pub mod role;
pub mod subject;
pub mod user;
