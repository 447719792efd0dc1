pub mod codegen;
pub mod normalize;

pub use codegen::{generate_code, generate_unique_code, validate_custom_code, CODE_ALPHABET};
pub use normalize::{check_target, normalize, MAX_URL_LENGTH};
