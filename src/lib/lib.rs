//! Excuse form generator.
//!
//! Fills the school's absence excuse form (`.docx`) from a [`form::models::FormRequest`]
//! and turns it into a PDF through a chain of external converters.

pub mod form;
pub mod pdf;
