pub mod claims;
pub mod extractors;
pub mod jwt;
pub mod password;

pub use claims::Principal;
pub use extractors::AuthUser;
pub use jwt::JwtKeys;
pub use password::PasswordHasher;
