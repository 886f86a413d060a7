pub mod distance;
pub mod product_matcher;

pub use distance::levenshtein_distance;
pub use product_matcher::{
    NameOrigin, ProductMatcher, ProductName, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_TOKEN_LEN,
};
