//! Authentication module for managing the account session.
//!
//! This module provides:
//! - `SessionManager`: sign-in family operations, sign-out, verification
//!   flows and profile fetch, mirrored into persisted slots
//! - the credential, profile and request records exchanged with the service
//! - `PasswordDigest`: the one-way transform applied to passwords
//! - `Navigator`: where sign-out and account closure send the user

pub mod digest;
pub mod navigation;
pub mod records;
pub mod session;

pub use digest::{Md5Digest, PasswordDigest};
pub use navigation::{LogNavigator, Navigator, SignOutCallback};
pub use records::{
    CaptchaCode, PinCodePurpose, SignInRequest, SignInfo, SignInfoUpdate, SignUpRequest,
    UserBasicInfo, UNSET,
};
pub use session::{SessionBuilder, SessionManager};
