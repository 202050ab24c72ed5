//! `SQLite` backing for the repair event log.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;
