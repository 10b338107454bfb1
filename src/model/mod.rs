pub mod convert;
pub mod image;
