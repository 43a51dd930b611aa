pub mod branch;
pub mod employee;
pub mod module;
pub mod rbac;
pub mod user;
