//! User domain entities.

pub mod model;
pub mod role;
pub mod status;

pub use model::{NewUser, User, UserChanges};
pub use role::Role;
pub use status::UserStatus;
