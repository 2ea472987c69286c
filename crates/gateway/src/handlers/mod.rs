//! API handlers module

pub mod blogs;
pub mod health;
pub mod schemas;
pub mod users;
