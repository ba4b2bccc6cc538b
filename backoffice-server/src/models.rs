//! Domain models exchanged between the API, services and stores

pub mod user;

pub use user::{
    CreateUserRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, UpdateUserRequest,
    User, UserRole,
};
