//! Database models split into domain-specific modules.

pub mod common;
pub mod invitation;
pub mod order;
pub mod points;
pub mod product;
pub mod user;
pub mod workout;

pub use common::*;
pub use invitation::*;
pub use order::*;
pub use points::*;
pub use product::*;
pub use user::*;
pub use workout::*;
