//! # Penmark URLs
//!
//! Maps requests to route handlers and handlers to rendered documents.
//!
//! - [`pattern`]: route patterns and `page/N` suffix parsing
//! - [`router`]: the ordered route table and reverse routing
//! - [`dispatch`]: request state machine, [`RouteContext`], error pages
//! - [`handlers`]: the built-in blog routes
//!
//! ## Example
//!
//! ```
//! use penmark_conf::UrlScan;
//! use penmark_urls::Router;
//! use penmark_urls::handlers::register_blog_routes;
//!
//! let mut router = Router::new("http://blog.test/", UrlScan::PathInfo);
//! register_blog_routes(&mut router).unwrap();
//!
//! let (entry, matched) = router.resolve("archive/2024/03").unwrap();
//! assert_eq!(entry.kind, "archive");
//! assert_eq!(matched.group(2), Some("03"));
//! assert!(router.resolve("unknown/thing").is_none());
//! ```

pub mod dispatch;
pub mod handlers;
pub mod pattern;
pub mod request;
pub mod response;
pub mod router;

pub use dispatch::{DispatchBehavior, Dispatcher, RouteContext, Services};
pub use pattern::{RouteMatch, RoutePattern, split_page_suffix};
pub use request::Request;
pub use response::Response;
pub use router::{ErrorHandler, RouteEntry, RouteHandler, Router};
