//! Stateless repositories; every method takes a `&Connection`.

pub mod repair_event;
