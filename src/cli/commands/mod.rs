//! CLI command implementations

pub mod completions;
pub mod db;
pub mod dept;
pub mod import;
pub mod init;
pub mod member;
pub mod position;
pub mod region;
pub mod tree;
