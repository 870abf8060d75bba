//! # Router Module
//!
//! Regex-based method + path multiplexer. Path templates such as `/users/{id}` are
//! compiled once at registration into anchored regexes; each request is matched
//! against them to find the endpoint and extract path parameters.
//!
//! Registration rejects a second route with the same method and pattern shape
//! (placeholder names are ignored when comparing), so routes are never silently
//! replaced.

mod core;

pub(crate) use self::core::{path_params, path_to_regex, Mux, RouteEntry, RouteLookup};
