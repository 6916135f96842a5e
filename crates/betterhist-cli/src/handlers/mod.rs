pub mod context;
pub mod get;
pub mod info;
pub mod last;
pub mod search;
pub mod session;
pub mod shell_init;

pub use context::HandlerContext;
