//! Typed - 型付き subscription API
//!
//! event type の typo を型で排除し、Handler との対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Event` trait, `Handler<E>` trait - 型安全
//! - **内部（Dyn）**: `Consumer` trait - object-safe, type erasure

pub mod handler;
pub mod registry;

pub use self::handler::{Handler, TypedHandler};
pub use self::registry::{RegistryError, Subscriptions};
