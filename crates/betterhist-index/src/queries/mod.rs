pub mod meta;
pub mod record;
pub mod search;
