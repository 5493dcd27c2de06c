//! typdex-core: font catalog indexing & family query engine (made by FontLab https://www.fontlab.com/)
//!
//! Keeps a durable catalog of the font files living under user-registered
//! roots and answers grouped-by-family queries over it.
//!
//! - **Scan**: walk every registered root and reconcile each container file
//!   against the catalog. Unchanged files are skipped on a size/mtime stat
//!   match; changed files are re-hashed, re-parsed (collections yield one
//!   face record per member) and atomically replaced.
//! - **Watch**: consume filesystem add/change/remove notifications and
//!   reconcile incrementally, concurrently with any full scan in flight.
//! - **Query**: fold faces into family aggregates with filtering, sorting
//!   and pagination; favorites and collection membership included.
//!
//! The font parser is a pluggable capability ([`parse::FaceParser`]); the
//! default implementation rides the fontations stack behind the
//! `fontations` feature.

pub mod catalog;
pub mod identity;
pub mod output;
pub mod parse;
pub mod query;
pub mod scanner;
pub mod watch;
