//! The session manager.
//!
//! State machine:
//!
//! ```text
//! Anonymous --sign-in / sign-up--> Authenticated(expiry)
//! Authenticated --clock passes expiry--> Authenticated, is_signed_in() == false
//! any --sign-out / account closure--> Anonymous
//! ```
//!
//! Nothing leaves the expired state automatically and no request is blocked
//! because of expiry; the service rejects stale tokens itself.
//!
//! Concurrent operations are not coordinated. The state lock is held only while
//! a response is applied and mirrored to the store, never across a request, so
//! when two mutating calls race the one applied last wins.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::digest::{Md5Digest, PasswordDigest};
use super::navigation::{LogNavigator, Navigator, SignOutCallback};
use super::records::{
    CaptchaCode, PinCodePurpose, SignInRequest, SignInfo, SignInfoUpdate, SignUpRequest,
    UserBasicInfo, UNSET,
};
use crate::api::{endpoints, ApiRequest, ApiResponse, RequestOptions, Transport};
use crate::clock::{Clock, SystemClock};
use crate::config::PassportConfig;
use crate::error::{PassportError, Result};
use crate::store::{slots, SlotStore};

#[derive(Debug, Clone, Default)]
struct SessionState {
    sign_info: SignInfo,
    basic_info: UserBasicInfo,
}

pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SlotStore>,
    navigator: Arc<dyn Navigator>,
    digest: Arc<dyn PasswordDigest>,
    clock: Arc<dyn Clock>,
    login_url: String,
}

impl SessionBuilder {
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn digest(mut self, digest: Arc<dyn PasswordDigest>) -> Self {
        self.digest = digest;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Login page used after sign-out and account closure
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn config(self, config: &PassportConfig) -> Self {
        self.login_url(config.login_url.clone())
    }

    /// Hydrate from the store and return the manager.
    ///
    /// Missing, unreadable or malformed slots leave the session anonymous.
    pub fn build(self) -> SessionManager {
        let sign_info = read_slot::<SignInfo>(self.store.as_ref(), slots::SIGN_INFO).unwrap_or_default();
        let basic_info =
            read_slot::<UserBasicInfo>(self.store.as_ref(), slots::USER_BASIC_INFO).unwrap_or_default();
        debug!(
            restored = !sign_info.access_token.is_empty(),
            "Session hydrated from store"
        );

        SessionManager {
            transport: self.transport,
            store: self.store,
            navigator: self.navigator,
            digest: self.digest,
            clock: self.clock,
            login_url: self.login_url,
            state: RwLock::new(SessionState {
                sign_info,
                basic_info,
            }),
        }
    }
}

fn read_slot<T: DeserializeOwned>(store: &dyn SlotStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(slot = key, error = %e, "Ignoring malformed persisted slot");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(slot = key, error = %e, "Failed to read persisted slot");
            None
        }
    }
}

/// Client-side session for one user agent.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SlotStore>,
    navigator: Arc<dyn Navigator>,
    digest: Arc<dyn PasswordDigest>,
    clock: Arc<dyn Clock>,
    login_url: String,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn builder(transport: Arc<dyn Transport>, store: Arc<dyn SlotStore>) -> SessionBuilder {
        SessionBuilder {
            transport,
            store,
            navigator: Arc::new(LogNavigator),
            digest: Arc::new(Md5Digest),
            clock: Arc::new(SystemClock),
            login_url: PassportConfig::default().login_url,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Queries =====

    /// True while an access token is held and its expiry lies in the future
    pub fn is_signed_in(&self) -> bool {
        let state = self.read();
        !state.sign_info.access_token.is_empty()
            && state.sign_info.expires_time > self.clock.now_millis()
    }

    pub fn current_credential(&self) -> SignInfo {
        self.read().sign_info.clone()
    }

    pub fn current_profile(&self) -> UserBasicInfo {
        self.read().basic_info.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        let state = self.read();
        (!state.sign_info.access_token.is_empty()).then(|| state.sign_info.access_token.clone())
    }

    // ===== Sign-in family =====

    pub async fn sign_up(&self, account: SignUpRequest) -> Result<ApiResponse<SignInfo>> {
        let mut params = account;
        params.password = self.digest.digest(&params.password);

        let response: ApiResponse<SignInfo> = self
            .exchange(endpoints::SIGN_UP, params, RequestOptions::LOADING_MESSAGE)
            .await?;
        self.replace_credential(response.body.clone());
        Ok(response)
    }

    /// Sign in with a password or a one-time code
    pub async fn sign_in(&self, account: SignInRequest) -> Result<ApiResponse<SignInfo>> {
        let mut params = account;
        if let Some(password) = params.password.as_mut().filter(|p| !p.is_empty()) {
            let hashed = self.digest.digest(password);
            *password = hashed;
        }

        let response: ApiResponse<SignInfo> = self
            .exchange(endpoints::SIGN_IN, params, RequestOptions::LOADING_ERROR)
            .await?;
        self.replace_credential(response.body.clone());
        Ok(response)
    }

    /// Merge credential fields obtained out of band and persist the result
    pub fn update_credential(&self, update: SignInfoUpdate) {
        let mut state = self.write();
        state.sign_info.merge(update);
        self.persist_credential(&mut state.sign_info);
    }

    fn replace_credential(&self, sign_info: SignInfo) {
        let mut state = self.write();
        state.sign_info = sign_info;
        self.persist_credential(&mut state.sign_info);
        info!(user_id = %state.sign_info.user_id, "Signed in");
    }

    // ===== Sign-out =====

    /// Drop the session and leave.
    ///
    /// Goes to `redirect` if given, else runs `callback` if given, else sends
    /// the user to the login page with the current location as callback.
    pub fn sign_out(&self, redirect: Option<&str>, callback: Option<SignOutCallback>) {
        self.clear_session();

        if let Some(url) = redirect.filter(|url| !url.is_empty()) {
            self.navigator.navigate(url);
        } else if let Some(callback) = callback {
            callback();
        } else {
            let target = match self.navigator.current_location() {
                Some(location) => format!("{}?callback={}", self.login_url, location),
                None => self.login_url.clone(),
            };
            self.navigator.navigate(&target);
        }
    }

    /// Close the account server-side, then drop the session and go to the
    /// login page. A rejected closure leaves the session as it was.
    pub async fn close_account(
        &self,
        account_id: &str,
        pin_code: &str,
        mobile: &str,
    ) -> Result<ApiResponse<Value>> {
        let params = json!({
            "accountId": account_id,
            "pinCode": pin_code,
            "mobile": mobile,
        });
        let response = self
            .exchange(endpoints::CLOSE_ACCOUNT, params, RequestOptions::LOADING_MESSAGE)
            .await?;

        self.clear_session();
        self.navigator.navigate(&self.login_url);
        Ok(response)
    }

    fn clear_session(&self) {
        let mut state = self.write();
        for key in slots::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(slot = key, error = %e, "Failed to remove persisted slot");
            }
        }
        *state = SessionState::default();
        info!("Signed out");
    }

    // ===== Verification flows =====

    pub async fn send_pin_code(
        &self,
        phone: &str,
        purpose: PinCodePurpose,
    ) -> Result<ApiResponse<Value>> {
        let params = json!({
            "phone": phone.trim(),
            "type": purpose.code(),
        });
        self.exchange(endpoints::SEND_PIN_CODE, params, RequestOptions::LOADING_MESSAGE)
            .await
    }

    /// Fetch a graphical challenge for password sign-in
    pub async fn captcha(&self) -> Result<ApiResponse<CaptchaCode>> {
        self.exchange(endpoints::CAPTCHA, json!({}), RequestOptions::NONE)
            .await
    }

    /// Verify a phone number; the response carries the verification token
    /// (see [`ApiResponse::pin_code_token`])
    pub async fn verify_phone(&self, mobile: &str, pin_code: &str) -> Result<ApiResponse<Value>> {
        let params = json!({
            "mobile": mobile.trim(),
            "pinCode": pin_code,
        });
        self.exchange(endpoints::VERIFY_PHONE, params, RequestOptions::LOADING_MESSAGE)
            .await
    }

    /// Reset or change the password using a verification token
    pub async fn change_password(
        &self,
        new_password: &str,
        pin_code_token: &str,
    ) -> Result<ApiResponse<Value>> {
        let params = json!({
            "newPassword": self.digest.digest(new_password),
            "pinCodeToken": pin_code_token,
        });
        self.exchange(endpoints::RESET_PASSWORD, params, RequestOptions::LOADING_MESSAGE)
            .await
    }

    /// Rebind the account to a new mobile number.
    ///
    /// `pin_code` was sent to the new number; `pin_code_token` proves
    /// ownership of the old one.
    pub async fn change_phone(
        &self,
        mobile: &str,
        pin_code: &str,
        pin_code_token: &str,
        user_id: &str,
    ) -> Result<ApiResponse<Value>> {
        let params = json!({
            "mobile": mobile,
            "pinCode": pin_code,
            "pinCodeToken": pin_code_token,
            "userId": user_id,
        });
        self.exchange(endpoints::CHANGE_PHONE, params, RequestOptions::LOADING_MESSAGE)
            .await
    }

    // ===== Profile =====

    /// Fetch the profile of the signed-in user and cache it
    pub async fn fetch_profile(&self) -> Result<ApiResponse<UserBasicInfo>> {
        let user_id = self.read().sign_info.user_id.clone();
        let response: ApiResponse<UserBasicInfo> = self
            .exchange(
                endpoints::USER_BASIC_INFO,
                json!({ "userId": user_id }),
                RequestOptions::LOADING_MESSAGE,
            )
            .await?;

        let mut state = self.write();
        state.basic_info = response.body.clone();
        self.persist_profile(&state);
        Ok(response)
    }

    // ===== Plumbing =====

    async fn exchange<T, P>(
        &self,
        path: &'static str,
        params: P,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let params = serde_json::to_value(params).map_err(PassportError::Encode)?;
        let request = ApiRequest {
            path,
            params,
            options,
            access_token: self.access_token(),
        };
        debug!(path, "Dispatching request");

        let response = self.transport.send(request).await?;
        if !response.status.success {
            debug!(path, code = %response.status.code, "Request rejected by service");
            return Err(PassportError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let body = serde_json::from_value(response.body).map_err(PassportError::Decode)?;
        Ok(ApiResponse {
            status: response.status,
            body,
        })
    }

    /// Derive the absolute expiry if still unset, then mirror the credential
    /// into its slots
    fn persist_credential(&self, info: &mut SignInfo) {
        if info.expires_time == UNSET {
            info.expires_time = self
                .clock
                .now_millis()
                .saturating_add(info.expires_in.saturating_mul(1000));
        }
        let expires = DateTime::from_timestamp_millis(info.expires_time);
        if expires.is_none() {
            warn!(
                expires_time = info.expires_time,
                "Credential expiry out of range, slots written without expiry"
            );
        }

        match serde_json::to_string(info) {
            Ok(blob) => self.write_slot(slots::SIGN_INFO, &blob, expires),
            Err(e) => warn!(error = %e, "Failed to encode credential"),
        }
        self.write_slot(slots::ACCESS_TOKEN, &info.access_token, expires);
        self.write_slot(slots::USER_ID, &info.user_id, expires);
        if !info.subject_id.is_empty() {
            self.write_slot(slots::ENTITY_ID, &info.subject_id, expires);
        }
    }

    /// Mirror the profile, sharing the credential's expiry when it has one
    fn persist_profile(&self, state: &SessionState) {
        let expires = Some(state.sign_info.expires_time)
            .filter(|&ms| ms > 0)
            .and_then(DateTime::from_timestamp_millis);

        match serde_json::to_string(&state.basic_info) {
            Ok(blob) => self.write_slot(slots::USER_BASIC_INFO, &blob, expires),
            Err(e) => warn!(error = %e, "Failed to encode profile"),
        }
    }

    fn write_slot(&self, key: &str, value: &str, expires: Option<DateTime<Utc>>) {
        if let Err(e) = self.store.set(key, value, expires) {
            warn!(slot = key, error = %e, "Failed to persist slot");
        }
    }
}
