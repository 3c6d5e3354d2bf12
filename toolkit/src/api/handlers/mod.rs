pub mod files;
pub mod utils;
