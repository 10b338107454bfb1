pub mod convert;
pub mod pdf;
