pub mod auth;
pub mod branches;
pub mod employees;
pub mod health;
pub mod modules;
pub mod rbac;
