//! Identity allow-listing for pfind
//!
//! Every resolution or write is gated on [`Authorizer::is_authorized`]. The
//! list itself comes from an [`AllowlistSource`]; entries are compared
//! trimmed and lower-cased.

mod authorizer;
mod source;

pub use authorizer::Authorizer;
pub use source::{AllowlistSource, FileAllowlist, StaticAllowlist, normalize_identity};
