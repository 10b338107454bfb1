pub mod path;
pub mod temp;
