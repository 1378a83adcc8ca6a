//! Client-side session manager for GWIN accounts.
//!
//! This crate provides:
//! - `SessionManager`: sign-up, sign-in, sign-out, phone verification,
//!   password reset and profile fetch against the account service, with the
//!   resulting credential and profile mirrored into persisted slots
//! - `Transport` / `HttpTransport`: the request/response exchange with the service
//! - `SlotStore` and its backends: in-memory, cookie jar, JSON file, OS keychain
//!
//! The session context is an explicit object: construct one manager at startup
//! and share it (it is `Send + Sync`).

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

pub use api::{
    endpoints, ApiError, ApiRequest, ApiResponse, HttpTransport, RequestOptions, Status,
    Transport,
};
pub use auth::{
    CaptchaCode, LogNavigator, Md5Digest, Navigator, PasswordDigest, PinCodePurpose, SessionBuilder,
    SessionManager, SignInRequest, SignInfo, SignInfoUpdate, SignOutCallback, SignUpRequest,
    UserBasicInfo,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PassportConfig;
pub use error::{PassportError, Result};
pub use store::{slots, CookieStore, FileStore, KeyringStore, MemoryStore, SlotStore, StoreError};
