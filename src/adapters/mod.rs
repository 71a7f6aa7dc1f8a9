// Adapters layer: concrete implementations of the domain ports.

pub mod cookies;

pub use cookies::{FileCookieStore, MemoryCookieStore};
