pub mod files;
pub mod submit;
pub mod system;
