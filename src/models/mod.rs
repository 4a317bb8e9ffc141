pub mod user;

pub use user::{NewUser, RegisteredUser, User, UserProfile, VerifiedUser};
