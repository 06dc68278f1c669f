pub mod agenda;
pub mod calendar;
pub mod conflict;
pub mod error;
pub mod merge;
