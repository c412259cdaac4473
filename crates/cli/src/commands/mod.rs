//! CLI Commands

pub mod aggregate;
pub mod decode;
pub mod profiles;
pub mod queries;
pub mod run;
