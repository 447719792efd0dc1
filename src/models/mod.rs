mod access;
mod link;

pub use access::{AccessRecord, NewAccessRecord};
pub use link::{LinkSortField, ShortLink, SortDirection};
