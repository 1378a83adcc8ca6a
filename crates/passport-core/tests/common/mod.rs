//! In-process stand-ins for the collaborators of `SessionManager`.
//!
//! *  `FakeTransport` replays scripted replies in order and records every
//!    request it was handed, so tests can assert on exactly what went over
//!    the wire.
//! *  `RecordingNavigator` keeps every navigation target.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passport_core::{
    ApiError, ApiRequest, ApiResponse, ManualClock, MemoryStore, Navigator, SessionManager,
    SlotStore, Status, Transport,
};
use serde_json::{json, Value};

pub const T0_MILLIS: i64 = 1_700_000_000_000;

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(T0_MILLIS).unwrap()
}

#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<Result<ApiResponse<Value>, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
    /// Suspend once inside `send`, letting other futures run mid-request
    yield_in_flight: bool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn suspending() -> Arc<Self> {
        Arc::new(Self {
            yield_in_flight: true,
            ..Self::default()
        })
    }

    pub fn reply_ok(&self, body: Value) {
        self.push(Ok(ApiResponse {
            status: Status::ok(),
            body,
        }));
    }

    pub fn reply_rejected(&self, code: &str, message: &str) {
        self.push(Ok(ApiResponse {
            status: Status {
                success: false,
                code: code.to_string(),
                message: message.to_string(),
            },
            body: Value::Null,
        }));
    }

    pub fn reply_err(&self, err: ApiError) {
        self.push(Err(err));
    }

    fn push(&self, reply: Result<ApiResponse<Value>, ApiError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request sent")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse<Value>, ApiError> {
        self.requests.lock().unwrap().push(request);
        if self.yield_in_flight {
            tokio::task::yield_now().await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| {
            Ok(ApiResponse {
                status: Status::ok(),
                body: Value::Null,
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
    location: Option<String>,
}

impl RecordingNavigator {
    pub fn at(location: &str) -> Arc<Self> {
        Arc::new(Self {
            location: Some(location.to_string()),
            ..Self::default()
        })
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.visits.lock().unwrap().push(url.to_string());
    }

    fn current_location(&self) -> Option<String> {
        self.location.clone()
    }
}

/// Everything a test needs to drive and observe one session.
pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transport(FakeTransport::new())
    }

    pub fn with_transport(transport: Arc<FakeTransport>) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        Self {
            transport,
            store: Arc::new(MemoryStore::with_clock(clock.clone())),
            navigator: RecordingNavigator::at("https://console.cdgwin.com/orders"),
            clock,
        }
    }

    /// Build a manager over the current store contents
    pub fn manager(&self) -> SessionManager {
        SessionManager::builder(self.transport.clone(), self.store.clone())
            .navigator(self.navigator.clone())
            .clock(self.clock.clone())
            .login_url("//account.console.cdgwin.com/login")
            .build()
    }

    pub fn slot(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }
}

/// Sign-in response body as the service sends it (no `expiresTime`)
pub fn sign_info_body(expires_in: i64) -> Value {
    json!({
        "accessToken": "access-1",
        "expiresIn": expires_in,
        "refreshToken": "refresh-1",
        "userId": "u-1",
        "subjectId": "tenant-9",
        "subjectName": "Chengdu Gwin"
    })
}

pub fn profile_body() -> Value {
    json!({
        "address": "1 Tianfu Ave",
        "city": "Chengdu",
        "country": "CN",
        "district": "Gaoxin",
        "mobile": "13800000000",
        "name": "Li Lei",
        "province": "Sichuan"
    })
}
