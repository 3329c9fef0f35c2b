//! # Decision Flows
//!
//! Admission decisions driven through the admin surface:
//!
//! 1. **Private network**: first contact denied, admin authorization admits
//! 2. **Deauthorization**: revoking one member narrows credentials of the rest
//! 3. **Tokens**: live tokens admit, expired tokens do not
//! 4. **Rate limiting**: keyed per (network, requester)

use super::fixtures::{request, Harness, START};
use oc_01_network_controller::domain::{AuthToken, MemberUpdate, AUTHORIZED_BY_TOKEN};
use oc_01_network_controller::{
    ControllerAdminApi, ControllerError, NetworkConfigApi, NetworkUpdate, NodeAddress, ResultCode,
};
use std::net::IpAddr;

const ALICE: NodeAddress = NodeAddress(0xa11ce00001);
const BOB: NodeAddress = NodeAddress(0xb0b0000002);

fn deauthorize() -> MemberUpdate {
    MemberUpdate {
        authorized: Some(false),
        ..Default::default()
    }
}

fn authorize() -> MemberUpdate {
    MemberUpdate {
        authorized: Some(true),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_private_network_admin_flow() {
    let h = Harness::in_memory();
    let nwid = h.network(1, true, ("10.9.0.1", "10.9.0.254")).await;

    let (code, _) = h.service.resolve_network_config(request(nwid, ALICE)).await;
    assert_eq!(code, ResultCode::AccessDenied);

    // The denied node is visible to the operator.
    let listed = h.service.list_members(nwid).await.unwrap();
    assert!(listed.contains_key(&ALICE));
    assert!(!h.service.get_member(nwid, ALICE).await.unwrap().authorized);

    h.service.update_member(nwid, ALICE, authorize()).await.unwrap();
    h.clock.advance(1_000);

    let config = h
        .service
        .request_network_config(request(nwid, ALICE))
        .await
        .unwrap();
    assert_eq!(config.static_ips.len(), 1);
    let ip = config.static_ips[0].addr;
    assert!(ip >= "10.9.0.1".parse::<IpAddr>().unwrap());
    assert!(ip <= "10.9.0.254".parse::<IpAddr>().unwrap());

    let summary = h.service.get_network(nwid).await.unwrap();
    assert_eq!(summary.authorized_member_count, 1);
    assert_eq!(summary.total_member_count, 1);
}

#[tokio::test]
async fn test_deauthorization_narrows_credentials_of_others() {
    let h = Harness::in_memory();
    let nwid = h.network(2, false, ("10.9.0.1", "10.9.0.254")).await;

    let first = h
        .service
        .request_network_config(request(nwid, ALICE))
        .await
        .unwrap();
    assert_eq!(
        first.credential_time_max_delta,
        h.service.config().credential_time_max_delta_ms
    );
    h.service
        .request_network_config(request(nwid, BOB))
        .await
        .unwrap();

    h.clock.advance(10_000);
    h.service.update_member(nwid, BOB, deauthorize()).await.unwrap();
    h.clock.advance(1_000);

    let config = h
        .service
        .request_network_config(request(nwid, ALICE))
        .await
        .unwrap();
    assert_eq!(config.credential_time_max_delta, 1_000);

    // Public admission never overrides an explicit deauthorization.
    let (code, _) = h.service.resolve_network_config(request(nwid, BOB)).await;
    assert_eq!(code, ResultCode::AccessDenied);
}

#[tokio::test]
async fn test_reauthorized_member_keeps_its_address() {
    let h = Harness::in_memory();
    let nwid = h.network(3, true, ("10.9.0.1", "10.9.0.254")).await;
    h.service.update_member(nwid, BOB, authorize()).await.unwrap();

    let before = h
        .service
        .request_network_config(request(nwid, BOB))
        .await
        .unwrap();

    h.clock.advance(1_000);
    h.service.update_member(nwid, BOB, deauthorize()).await.unwrap();
    h.clock.advance(1_000);
    let (code, _) = h.service.resolve_network_config(request(nwid, BOB)).await;
    assert_eq!(code, ResultCode::AccessDenied);

    h.clock.advance(1_000);
    h.service.update_member(nwid, BOB, authorize()).await.unwrap();
    h.clock.advance(1_000);
    let after = h
        .service
        .request_network_config(request(nwid, BOB))
        .await
        .unwrap();
    assert_eq!(before.static_ips, after.static_ips);
}

#[tokio::test]
async fn test_token_admission() {
    let h = Harness::in_memory();
    let nwid = h.network(4, true, ("10.9.0.1", "10.9.0.254")).await;
    h.service
        .update_network(
            nwid,
            NetworkUpdate {
                auth_tokens: Some(vec![AuthToken {
                    token: "join-before-noon".to_string(),
                    expires: START + 5_000,
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut with_token = request(nwid, ALICE);
    with_token.metadata.auth_token = Some("join-before-noon".to_string());
    h.service.request_network_config(with_token).await.unwrap();
    let alice = h.service.get_member(nwid, ALICE).await.unwrap();
    assert!(alice.authorized);
    assert_eq!(alice.last_authorized_by, AUTHORIZED_BY_TOKEN);

    h.clock.advance(10_000);
    let mut late = request(nwid, BOB);
    late.metadata.auth_token = Some("join-before-noon".to_string());
    let (code, _) = h.service.resolve_network_config(late).await;
    assert_eq!(code, ResultCode::AccessDenied);

    let mut wrong = request(nwid, NodeAddress(0x3));
    wrong.metadata.auth_token = Some("guess".to_string());
    let (code, _) = h.service.resolve_network_config(wrong).await;
    assert_eq!(code, ResultCode::AccessDenied);
}

#[tokio::test]
async fn test_rate_limit_is_per_network_and_requester() {
    let h = Harness::in_memory();
    let a = h.network(5, false, ("10.9.0.1", "10.9.0.254")).await;
    let b = h.network(6, false, ("10.8.0.1", "10.8.0.254")).await;

    h.service.request_network_config(request(a, ALICE)).await.unwrap();
    h.service.request_network_config(request(a, BOB)).await.unwrap();
    h.service.request_network_config(request(b, ALICE)).await.unwrap();

    let limited = h.service.request_network_config(request(a, ALICE)).await;
    assert!(matches!(
        limited,
        Err(ControllerError::RateLimited { retry_after_ms: 1_000 })
    ));
}

#[tokio::test]
async fn test_deleted_member_starts_over() {
    let h = Harness::in_memory();
    let nwid = h.network(7, false, ("10.9.0.1", "10.9.0.254")).await;
    h.service
        .request_network_config(request(nwid, ALICE))
        .await
        .unwrap();

    h.service.delete_member(nwid, ALICE).await.unwrap();
    h.clock.advance(1_000);

    h.service
        .request_network_config(request(nwid, ALICE))
        .await
        .unwrap();
    let member = h.service.get_member(nwid, ALICE).await.unwrap();
    assert_eq!(member.recent_log.len(), 1);
    assert_eq!(member.creation_time, START + 1_000);
}
