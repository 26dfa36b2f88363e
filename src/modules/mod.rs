pub mod charset;
pub mod marc;
