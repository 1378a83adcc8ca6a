//! Cookie-jar slot store.
//!
//! Slots are cookies scoped to the shared console domain with path `/`, so a
//! session written by one console subdomain is readable by all of them. A
//! server-side host seeds the jar from the incoming `Cookie` header and
//! writes [`CookieStore::set_cookie_headers`] back on the response.

use std::sync::{Arc, Mutex, PoisonError};

use ::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;
use tracing::warn;

use super::{SlotStore, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::config::PassportConfig;

pub struct CookieStore {
    jar: Mutex<CookieJar>,
    domain: String,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl CookieStore {
    /// Cookie jar for `domain`; cookies written without expiry live one day
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            jar: Mutex::new(CookieJar::new()),
            domain: domain.into(),
            default_ttl: Some(Duration::days(1)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &PassportConfig) -> Self {
        let ttl = (config.cookie_ttl_days > 0).then(|| Duration::days(config.cookie_ttl_days));
        Self::new(config.cookie_domain.clone()).with_default_ttl(ttl)
    }

    /// Lifetime for cookies written without an expiry; `None` makes them
    /// browser-session cookies
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Seed the jar from a `Cookie` request header. Unparseable pairs are skipped.
    pub fn load_request_header(&self, header: &str) {
        let mut jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        for parsed in Cookie::split_parse_encoded(header.to_string()) {
            match parsed {
                Ok(cookie) => jar.add_original(cookie.into_owned()),
                Err(e) => warn!(error = %e, "Skipping malformed cookie"),
            }
        }
    }

    /// `Set-Cookie` values for every change since the jar was seeded
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        jar.delta().map(|cookie| cookie.encoded().to_string()).collect()
    }
}

fn to_offset(at: DateTime<Utc>) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(at.timestamp_millis()) * 1_000_000)
        .map_err(|e| StoreError::Expiry(e.to_string()))
}

impl SlotStore for CookieStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = to_offset(self.clock.now())?;
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jar
            .get(key)
            .filter(|cookie| cookie.expires_datetime().map(|at| at > now).unwrap_or(true))
            .map(|cookie| cookie.value().to_string()))
    }

    fn set(&self, key: &str, value: &str, expires: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        let expires = expires.or_else(|| self.default_ttl.map(|ttl| self.clock.now() + ttl));
        let mut builder = Cookie::build((key.to_string(), value.to_string()))
            .domain(self.domain.clone())
            .path("/");
        if let Some(at) = expires {
            builder = builder.expires(to_offset(at)?);
        }

        let mut jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        jar.add(builder.build());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removal = Cookie::build((key.to_string(), ""))
            .domain(self.domain.clone())
            .path("/");
        let mut jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        jar.remove(removal);
        Ok(())
    }
}
