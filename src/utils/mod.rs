pub mod file;
pub mod text;
pub mod time;

pub use file::{list_json_files, FileEntry};
pub use text::{ellipsize, sanitize_file_stem};
pub use time::current_year_month;
