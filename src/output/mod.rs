//! Report output
//!
//! - `text`: console tables
//! - `json`: JSON report file

pub mod json;
pub mod text;
