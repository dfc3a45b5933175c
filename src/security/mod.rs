//! Security module - keeps credentials out of logs

mod redactor;

pub use redactor::Redactor;
