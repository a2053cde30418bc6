//! Roster: members, their regions and positions
//!
//! Regions and positions form two self-referential hierarchies. Members
//! belong to a region, optionally a department, and hold any number of
//! positions with at most one primary. Everything lives in one SQLite file.

pub mod cli;
pub mod core;
pub mod entities;
pub mod viewmodel;
