pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{is_internal_href, is_valid_url, validate_url};
