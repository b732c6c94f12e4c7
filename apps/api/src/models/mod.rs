pub mod parsed;
pub mod resume;
