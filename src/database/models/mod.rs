pub mod membership;
pub mod trainee;
pub mod user;

pub use membership::Membership;
pub use trainee::Trainee;
pub use user::User;
