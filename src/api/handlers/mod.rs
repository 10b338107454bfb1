pub mod convert;
pub mod health;
pub mod pdf_images;
