pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const NAME_MAX_LENGTH: usize = 200;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USER_FIELD_MAX_LENGTH: usize = 150;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const COLOR_MAX_LENGTH: usize = 7;

pub const RESERVED_USERNAMES: &[&str] = &["me"];

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

/// Upper bound for JSON bodies; recipe images travel inline as base64.
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

pub const AUTH_HEADER_PREFIX: &str = "Token ";

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_TITLE: &str = "Shopping list";
