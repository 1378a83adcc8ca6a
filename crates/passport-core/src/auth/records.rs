//! Wire and persisted shapes of the account service.
//!
//! Field names are camelCase on the wire and inside the persisted slot
//! blobs, which the browser client reads too.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sentinel for an expiry that is not known yet
pub const UNSET: i64 = -1;

fn unset() -> i64 {
    UNSET
}

/// Accept `null` for numeric fields, mapping it to [`UNSET`]
fn null_as_unset<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(UNSET))
}

/// Accept strings, numbers or `null` for identifier and text fields
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Credential record returned by sign-in and sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SignInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub access_token: String,
    /// Token lifetime in seconds
    #[serde(default = "unset", deserialize_with = "null_as_unset")]
    pub expires_in: i64,
    /// Absolute expiry in epoch milliseconds, derived from `expires_in`
    #[serde(default = "unset", deserialize_with = "null_as_unset")]
    pub expires_time: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub refresh_token: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    /// Tenant id
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject_id: String,
    /// Tenant name
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject_name: String,
}

impl Default for SignInfo {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            expires_in: UNSET,
            expires_time: UNSET,
            refresh_token: String::new(),
            user_id: String::new(),
            subject_id: String::new(),
            subject_name: String::new(),
        }
    }
}

impl SignInfo {
    pub fn merge(&mut self, update: SignInfoUpdate) {
        let SignInfoUpdate {
            access_token,
            expires_in,
            expires_time,
            refresh_token,
            user_id,
            subject_id,
            subject_name,
        } = update;

        if let Some(v) = access_token {
            self.access_token = v;
        }
        if let Some(v) = expires_in {
            self.expires_in = v;
        }
        if let Some(v) = expires_time {
            self.expires_time = v;
        }
        if let Some(v) = refresh_token {
            self.refresh_token = v;
        }
        if let Some(v) = user_id {
            self.user_id = v;
        }
        if let Some(v) = subject_id {
            self.subject_id = v;
        }
        if let Some(v) = subject_name {
            self.subject_name = v;
        }
    }
}

/// Partial credential; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignInfoUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
}

/// Profile record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserBasicInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mobile: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub province: String,
}

/// Graphical challenge shown before password sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CaptchaCode {
    /// Base64-encoded image
    #[serde(default)]
    pub captcha_code: String,
    #[serde(default)]
    pub captcha_code_id: String,
}

/// Only mobile numbers can register today
const PASSPORT_TYPE_MOBILE: &str = "mobile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SignUpRequest {
    /// Account name, i.e. the mobile number
    pub passport_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_type: Option<String>,
    pub password: String,
    pub pin_code: String,
}

impl SignUpRequest {
    pub fn new(
        mobile: impl Into<String>,
        password: impl Into<String>,
        pin_code: impl Into<String>,
    ) -> Self {
        Self {
            passport_no: mobile.into(),
            passport_type: Some(PASSPORT_TYPE_MOBILE.to_string()),
            password: password.into(),
            pin_code: pin_code.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SignInRequest {
    pub passport_no: String,
    pub passport_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// `password` or `pinCode`
    pub sign_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_code_id: Option<String>,
}

impl SignInRequest {
    pub fn with_password(mobile: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            passport_no: mobile.into(),
            passport_type: PASSPORT_TYPE_MOBILE.to_string(),
            password: Some(password.into()),
            sign_type: "password".to_string(),
            pin_code: None,
            captcha_code: None,
            captcha_code_id: None,
        }
    }

    pub fn with_pin_code(mobile: impl Into<String>, pin_code: impl Into<String>) -> Self {
        Self {
            passport_no: mobile.into(),
            passport_type: PASSPORT_TYPE_MOBILE.to_string(),
            password: None,
            sign_type: "pinCode".to_string(),
            pin_code: Some(pin_code.into()),
            captcha_code: None,
            captcha_code_id: None,
        }
    }

    /// Attach the answer to a graphical challenge
    pub fn captcha(mut self, code: impl Into<String>, code_id: impl Into<String>) -> Self {
        self.captcha_code = Some(code.into());
        self.captcha_code_id = Some(code_id.into());
        self
    }
}

/// What a one-time code is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCodePurpose {
    Register,
    SignIn,
    ResetPassword,
    RebindPhone,
}

impl PinCodePurpose {
    /// Numeric code expected by the service
    pub fn code(self) -> u8 {
        match self {
            PinCodePurpose::Register => 1,
            PinCodePurpose::SignIn => 2,
            PinCodePurpose::ResetPassword => 3,
            PinCodePurpose::RebindPhone => 4,
        }
    }
}

impl FromStr for PinCodePurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "register" => Ok(PinCodePurpose::Register),
            "2" | "sign-in" => Ok(PinCodePurpose::SignIn),
            "3" | "reset-password" => Ok(PinCodePurpose::ResetPassword),
            "4" | "rebind-phone" => Ok(PinCodePurpose::RebindPhone),
            other => Err(format!(
                "unknown purpose '{}' (expected register, sign-in, reset-password or rebind-phone)",
                other
            )),
        }
    }
}
