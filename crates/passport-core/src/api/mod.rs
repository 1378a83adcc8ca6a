//! Account service API module.
//!
//! This module provides the `Transport` contract used by the session manager,
//! the reqwest-backed `HttpTransport`, and the fixed endpoint paths of the
//! GWIN account service.

pub mod client;
pub mod error;
pub mod transport;

pub use client::HttpTransport;
pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, RequestOptions, Status, Transport};

/// Endpoint paths. These are shared with the browser client and must not change.
pub mod endpoints {
    pub const SIGN_UP: &str = "/cif/v1/AccountSignUpOrSignIn";
    pub const SIGN_IN: &str = "/cif/v1/AccountSignIn";
    pub const CLOSE_ACCOUNT: &str = "/cif/v1/AccountCancellationMaintenance";
    pub const SEND_PIN_CODE: &str = "/cif/v1/AccountPinCodeApply";
    pub const CAPTCHA: &str = "/cif/v1/VerifyCodeGeneration";
    pub const VERIFY_PHONE: &str = "/cif/v1/AccountVerifySms";
    pub const RESET_PASSWORD: &str = "/cif/v1/AccountPassportReset";
    pub const CHANGE_PHONE: &str = "/cif/v1/AccountPhoneMaintenance";
    pub const USER_BASIC_INFO: &str = "/cif/v1/UserBasicInfoInquiry";
}
