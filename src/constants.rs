pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;

/// How many short recipes a subscription entry carries when the client
/// doesn't ask for a specific amount, and the hard cap on what it may ask.
pub const RECIPES_LIMIT_DEFAULT: i64 = 3;
pub const RECIPES_LIMIT_MAX: i64 = 50;

pub const FORBIDDEN_USERNAMES: &[&str] = &["me"];

pub const SHOPLIST_FILENAME: &str = "shopping_list.pdf";
pub const SHOPLIST_TITLE: &str = "Ostoslista:";

/* Shopping-list document geometry, in points on an A4 page */
pub const DOC_PAGE_WIDTH_MM: f32 = 210.0;
pub const DOC_PAGE_HEIGHT_MM: f32 = 297.0;
pub const DOC_MARGIN_X_PT: f32 = 30.0;
pub const DOC_TITLE_Y_PT: f32 = 770.0;
pub const DOC_FIRST_LINE_Y_PT: f32 = 730.0;
pub const DOC_LINE_HEIGHT_PT: f32 = 30.0;
pub const DOC_MIN_Y_PT: f32 = 100.0;
pub const DOC_TITLE_SIZE: f32 = 25.0;
pub const DOC_TEXT_SIZE: f32 = 18.0;
