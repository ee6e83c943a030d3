mod admin;

pub use admin::{secrets_match, AdminAuthFactory, AdminAuthService, AdminSecret, ADMIN_SECRET_HEADER};
