//! Sign-in, expiry, persistence and sign-out behaviour of `SessionManager`.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use common::{profile_body, sign_info_body, FakeTransport, Harness, T0_MILLIS};
use passport_core::{
    slots, ApiError, FileStore, PassportError, SessionManager, SignInRequest, SignInfo, SignInfoUpdate, SignUpRequest,
    SlotStore,
};
use serde_json::{json, Value};

fn password_sign_in() -> SignInRequest {
    SignInRequest::with_password("13800000000", "hunter2")
}

#[tokio::test]
async fn signed_in_until_expiry_boundary() {
    for expires_in in [0_i64, 1, 3600] {
        let h = Harness::new();
        let session = h.manager();
        h.transport.reply_ok(sign_info_body(expires_in));

        session.sign_in(password_sign_in()).await.unwrap();
        let expiry = T0_MILLIS + expires_in * 1000;
        assert_eq!(session.current_credential().expires_time, expiry);

        assert_eq!(session.is_signed_in(), expires_in > 0);
        if expires_in > 0 {
            h.clock.advance(Duration::milliseconds(expires_in * 1000 - 1));
            assert!(session.is_signed_in(), "still valid 1ms before expiry");
        }
        h.clock.set(common::t0() + Duration::milliseconds(expires_in * 1000));
        assert!(!session.is_signed_in(), "expired at the boundary");
    }
}

#[tokio::test]
async fn expired_session_is_kept_until_sign_out() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(60));
    session.sign_in(password_sign_in()).await.unwrap();

    h.clock.advance(Duration::minutes(5));
    assert!(!session.is_signed_in());
    // the record stays and requests still carry the stale token
    assert_eq!(session.current_credential().access_token, "access-1");
    h.transport.reply_ok(json!({"captchaCode": "iVBORw0KGgo=", "captchaCodeId": "c-1"}));
    session.captcha().await.unwrap();
    assert_eq!(h.transport.last_request().access_token.as_deref(), Some("access-1"));
}

#[tokio::test]
async fn sign_in_persists_all_credential_slots() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));

    let response = session.sign_in(password_sign_in()).await.unwrap();
    assert!(response.status.success);
    assert_eq!(response.body.user_id, "u-1");

    let expiry = chrono::DateTime::from_timestamp_millis(T0_MILLIS + 3_600_000);
    assert_eq!(h.slot(slots::ACCESS_TOKEN).as_deref(), Some("access-1"));
    assert_eq!(h.slot(slots::USER_ID).as_deref(), Some("u-1"));
    assert_eq!(h.slot(slots::ENTITY_ID).as_deref(), Some("tenant-9"));
    for key in [slots::SIGN_INFO, slots::ACCESS_TOKEN, slots::USER_ID, slots::ENTITY_ID] {
        assert_eq!(h.store.expires_at(key), expiry, "slot {key}");
    }

    let blob: SignInfo = serde_json::from_str(&h.slot(slots::SIGN_INFO).unwrap()).unwrap();
    assert_eq!(blob, session.current_credential());
}

#[tokio::test]
async fn entity_slot_skipped_without_tenant() {
    let h = Harness::new();
    let session = h.manager();
    let mut body = sign_info_body(3600);
    body["subjectId"] = json!("");
    h.transport.reply_ok(body);

    session.sign_in(password_sign_in()).await.unwrap();
    assert!(h.slot(slots::ENTITY_ID).is_none());
    assert!(h.slot(slots::USER_ID).is_some());
}

#[tokio::test]
async fn out_of_range_expiry_still_persists_slots() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(i64::MAX));

    session.sign_in(password_sign_in()).await.unwrap();
    assert_eq!(session.current_credential().expires_time, i64::MAX);
    assert!(session.is_signed_in());
    assert_eq!(h.slot(slots::ACCESS_TOKEN).as_deref(), Some("access-1"));
    assert_eq!(h.store.expires_at(slots::ACCESS_TOKEN), None);
}

#[tokio::test]
async fn corrupt_session_file_recovers_on_sign_out() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{truncated").unwrap();
    let manager = || {
        let store = Arc::new(FileStore::new(&path).with_clock(h.clock.clone()));
        SessionManager::builder(h.transport.clone(), store)
            .navigator(h.navigator.clone())
            .clock(h.clock.clone())
            .build()
    };

    let session = manager();
    assert!(!session.is_signed_in());
    session.sign_out(Some("/bye"), None);
    assert_eq!(FileStore::new(&path).get(slots::ACCESS_TOKEN).unwrap(), None);

    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();
    assert!(manager().is_signed_in(), "sign-in survives a restart");
}

#[tokio::test]
async fn restored_session_needs_no_network() {
    let h = Harness::new();
    {
        let first = h.manager();
        h.transport.reply_ok(sign_info_body(3600));
        first.sign_in(password_sign_in()).await.unwrap();
    }

    let restored = h.manager();
    assert!(restored.is_signed_in());
    assert_eq!(restored.current_credential().user_id, "u-1");
    assert_eq!(h.transport.requests().len(), 1);
}

#[tokio::test]
async fn corrupted_slots_start_anonymous() {
    let h = Harness::new();
    h.store.set(slots::SIGN_INFO, "{not json", None).unwrap();
    h.store.set(slots::USER_BASIC_INFO, "[1, 2", None).unwrap();

    let session = h.manager();
    assert!(!session.is_signed_in());
    assert_eq!(session.current_credential(), SignInfo::default());
    assert_eq!(session.current_credential().expires_time, -1);
    assert_eq!(session.current_profile().name, "");
}

#[tokio::test]
async fn persisted_expiry_is_derived_once() {
    let h = Harness::new();
    let blob = json!({
        "accessToken": "tok",
        "expiresIn": 3600,
        "expiresTime": -1,
        "refreshToken": "",
        "userId": "u-1",
        "subjectId": "",
        "subjectName": ""
    });
    h.store.set(slots::SIGN_INFO, &blob.to_string(), None).unwrap();

    let session = h.manager();
    assert!(!session.is_signed_in());

    session.update_credential(SignInfoUpdate {
        refresh_token: Some("refresh-2".to_string()),
        ..SignInfoUpdate::default()
    });
    let derived = T0_MILLIS + 3_600_000;
    assert_eq!(session.current_credential().expires_time, derived);
    assert!(session.is_signed_in());
    let persisted: SignInfo = serde_json::from_str(&h.slot(slots::SIGN_INFO).unwrap()).unwrap();
    assert_eq!(persisted.expires_time, derived);

    h.clock.advance(Duration::minutes(10));
    session.update_credential(SignInfoUpdate {
        access_token: Some("tok-2".to_string()),
        ..SignInfoUpdate::default()
    });
    assert_eq!(session.current_credential().expires_time, derived);
    let persisted: SignInfo = serde_json::from_str(&h.slot(slots::SIGN_INFO).unwrap()).unwrap();
    assert_eq!(persisted.expires_time, derived);
    assert_eq!(persisted.access_token, "tok-2");
}

#[tokio::test]
async fn fresh_sign_in_rederives_expiry() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(60));
    session.sign_in(password_sign_in()).await.unwrap();

    h.clock.advance(Duration::seconds(30));
    h.transport.reply_ok(sign_info_body(60));
    session.sign_in(password_sign_in()).await.unwrap();

    assert_eq!(session.current_credential().expires_time, T0_MILLIS + 90_000);
}

#[tokio::test]
async fn failed_sign_in_leaves_session_untouched() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();
    let before = session.current_credential();

    h.transport.reply_err(ApiError::Unauthorized);
    let err = session.sign_in(password_sign_in()).await.unwrap_err();
    assert!(matches!(err, PassportError::Transport(ApiError::Unauthorized)));

    h.transport.reply_rejected("CIF0101", "wrong password");
    let err = session.sign_in(password_sign_in()).await.unwrap_err();
    assert_eq!(err.status().unwrap().message, "wrong password");

    assert_eq!(session.current_credential(), before);
    // one exchange per call, no retries
    assert_eq!(h.transport.requests().len(), 3);
}

#[tokio::test]
async fn passwords_never_reach_the_transport_in_plaintext() {
    let h = Harness::new();
    let session = h.manager();

    h.transport.reply_ok(sign_info_body(3600));
    session
        .sign_up(SignUpRequest::new("13800000000", "hunter2", "246810"))
        .await
        .unwrap();
    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();
    session.change_password("hunter2", "pin-token").await.unwrap();

    let digest = "2ab96390c7dbe3439de74d0c9b0b1767";
    let requests = h.transport.requests();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        let wire = request.params.to_string();
        assert!(!wire.contains("hunter2"), "{} leaked: {wire}", request.path);
        assert!(wire.contains(digest), "{} missing digest", request.path);
    }
    assert_eq!(requests[2].params["newPassword"], json!(digest));
}

#[tokio::test]
async fn pin_code_sign_in_sends_no_password() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));

    session
        .sign_in(SignInRequest::with_pin_code("13800000000", "135790"))
        .await
        .unwrap();
    let request = h.transport.last_request();
    assert_eq!(request.path, "/cif/v1/AccountSignIn");
    assert!(request.params.get("password").is_none());
    assert!(request.options.loading && request.options.error);
    assert!(request.access_token.is_none());
}

#[tokio::test]
async fn sign_out_clears_every_slot_and_is_idempotent() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();
    h.transport.reply_ok(profile_body());
    session.fetch_profile().await.unwrap();
    assert_eq!(h.store.len(), 5);

    session.sign_out(None, None);
    assert!(h.store.is_empty());
    assert!(!session.is_signed_in());
    assert_eq!(session.current_credential(), SignInfo::default());
    assert_eq!(
        h.navigator.visits(),
        vec!["//account.console.cdgwin.com/login?callback=https://console.cdgwin.com/orders"]
    );

    session.sign_out(None, None);
    assert!(h.store.is_empty());
    assert_eq!(session.current_credential(), SignInfo::default());
    assert_eq!(h.navigator.visits().len(), 2);
}

#[tokio::test]
async fn sign_out_prefers_redirect_over_callback() {
    let h = Harness::new();
    let session = h.manager();
    let called = Arc::new(AtomicBool::new(false));

    let flag = called.clone();
    session.sign_out(Some("/goodbye"), Some(Box::new(move || flag.store(true, Ordering::SeqCst))));
    assert_eq!(h.navigator.visits(), vec!["/goodbye"]);
    assert!(!called.load(Ordering::SeqCst));

    // an empty redirect counts as absent
    let flag = called.clone();
    session.sign_out(Some(""), Some(Box::new(move || flag.store(true, Ordering::SeqCst))));
    assert!(called.load(Ordering::SeqCst));
    assert_eq!(h.navigator.visits().len(), 1);
}

#[tokio::test]
async fn rejected_account_closure_keeps_session() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();
    let slots_before = h.store.len();

    h.transport.reply_rejected("CIF0400", "pin code mismatch");
    let err = session
        .close_account("u-1", "000000", "13800000000")
        .await
        .unwrap_err();
    assert!(matches!(err, PassportError::Rejected { .. }));

    assert_eq!(h.store.len(), slots_before);
    assert!(session.is_signed_in());
    assert!(h.navigator.visits().is_empty());
}

#[tokio::test]
async fn account_closure_signs_out_and_goes_to_login() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();

    h.transport.reply_ok(Value::Null);
    session
        .close_account("u-1", "123456", "13800000000")
        .await
        .unwrap();

    let request = h.transport.last_request();
    assert_eq!(request.path, "/cif/v1/AccountCancellationMaintenance");
    assert_eq!(request.params, json!({"accountId": "u-1", "pinCode": "123456", "mobile": "13800000000"}));
    assert!(h.store.is_empty());
    assert!(!session.is_signed_in());
    assert_eq!(h.navigator.visits(), vec!["//account.console.cdgwin.com/login"]);
}

#[tokio::test]
async fn profile_shares_credential_expiry() {
    let h = Harness::new();
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));
    session.sign_in(password_sign_in()).await.unwrap();

    h.transport.reply_ok(profile_body());
    let response = session.fetch_profile().await.unwrap();
    assert_eq!(response.body.city, "Chengdu");
    assert_eq!(h.transport.last_request().params, json!({"userId": "u-1"}));
    assert_eq!(session.current_profile().name, "Li Lei");
    assert_eq!(
        h.store.expires_at(slots::USER_BASIC_INFO),
        chrono::DateTime::from_timestamp_millis(T0_MILLIS + 3_600_000)
    );
}

#[tokio::test]
async fn anonymous_profile_has_no_expiry_and_failures_keep_cache() {
    let h = Harness::new();
    let session = h.manager();

    h.transport.reply_ok(profile_body());
    session.fetch_profile().await.unwrap();
    assert!(h.slot(slots::USER_BASIC_INFO).is_some());
    assert_eq!(h.store.expires_at(slots::USER_BASIC_INFO), None);

    h.transport.reply_rejected("CIF0500", "user not found");
    assert!(session.fetch_profile().await.is_err());
    assert_eq!(session.current_profile().name, "Li Lei");
}

#[tokio::test]
async fn racing_sign_in_and_sign_out_last_writer_wins() {
    let h = Harness::with_transport(FakeTransport::suspending());
    let session = h.manager();
    h.transport.reply_ok(sign_info_body(3600));

    // sign-in suspends inside the transport, sign-out completes meanwhile,
    // then the sign-in response is applied on top
    let (signed_in, ()) = futures::join!(session.sign_in(password_sign_in()), async {
        session.sign_out(Some("/bye"), None)
    });
    signed_in.unwrap();

    assert_eq!(h.navigator.visits(), vec!["/bye"]);
    assert!(session.is_signed_in());
    assert_eq!(h.slot(slots::ACCESS_TOKEN).as_deref(), Some("access-1"));
}
