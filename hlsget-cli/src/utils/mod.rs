mod files;
mod headers;
pub mod progress;

// Export utility functions
pub use self::files::{
    expand_name, extract_filename_from_path, extract_filename_from_url, is_url,
};
pub use self::headers::parse_headers;
