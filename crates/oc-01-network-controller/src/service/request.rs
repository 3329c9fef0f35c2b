//! Configuration request decision.

use super::ControllerService;
use crate::domain::{
    assign_addresses, synthesize, ControllerError, LogEntry, Member, NetworkConfig, ResultCode,
    AUTHORIZED_BY_AUTO, AUTHORIZED_BY_TOKEN,
};
use crate::metrics;
use crate::ports::{ConfigRequest, NetworkConfigApi};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[async_trait]
impl NetworkConfigApi for ControllerService {
    async fn request_network_config(
        &self,
        request: ConfigRequest,
    ) -> Result<NetworkConfig, ControllerError> {
        let started = Instant::now();
        let nwid = request.network_id;
        let member = request.identity.address;

        let result = self.decide(request).await;

        let code = ResultCode::of(&result);
        metrics::record_config_request(code.as_str(), started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => debug!(network = %nwid, member = %member, "[oc-01] Config issued"),
            Err(e) => match code {
                ResultCode::TemporarilyUnavailable => warn!(
                    network = %nwid,
                    member = %member,
                    error = %e,
                    "[oc-01] Config request failed"
                ),
                ResultCode::InternalError => error!(
                    network = %nwid,
                    member = %member,
                    error = %e,
                    "[oc-01] Config request failed"
                ),
                _ => debug!(
                    network = %nwid,
                    member = %member,
                    result = code.as_str(),
                    "[oc-01] Config refused"
                ),
            },
        }
        result
    }
}

impl ControllerService {
    async fn decide(&self, request: ConfigRequest) -> Result<NetworkConfig, ControllerError> {
        let now = self.now();
        let nwid = request.network_id;
        let address = request.identity.address;

        if !self.rate_limiter.should_accept(nwid, address, now) {
            return Err(ControllerError::RateLimited {
                retry_after_ms: self.rate_limiter.retry_after(nwid, address, now).max(1),
            });
        }

        if request.signing_identity.address != nwid.controller() {
            return Err(ControllerError::NetworkNotFound(nwid));
        }
        let lock = self.network_lock(nwid);
        let _guard = lock.lock().await;
        let network = self.load_network(nwid).await?;

        let mut member = match self.cache.get_member(nwid, address).await? {
            Some(existing) => {
                if !existing.identity_matches(&request.identity) {
                    return Err(ControllerError::AccessDenied {
                        network: nwid,
                        member: address,
                        reason: "identity does not match pinned fingerprint",
                    });
                }
                existing
            }
            None => {
                let fresh = Member::first_contact(nwid, &request.identity, now);
                if let Err(e) = self.cache.put_member(fresh.clone()).await {
                    metrics::record_store_write_failure();
                    warn!(
                        network = %nwid,
                        member = %address,
                        error = %e,
                        "[oc-01] Failed to persist first-contact member"
                    );
                }
                info!(network = %nwid, member = %address, "[oc-01] New member");
                fresh
            }
        };
        // Members created by an operator are pinned on their first request.
        if member.identity.is_none() {
            member.identity = Some(request.identity.fingerprint());
            member.revision += 1;
            if let Err(e) = self.cache.put_member(member.clone()).await {
                metrics::record_store_write_failure();
                warn!(
                    network = %nwid,
                    member = %address,
                    error = %e,
                    "[oc-01] Failed to persist pinned identity"
                );
            }
        }

        if !member.authorized {
            let token_ok = request
                .metadata
                .auth_token
                .as_deref()
                .is_some_and(|token| network.accepts_token(token, now));
            let blocked = member.deauthorized_since_authorization();
            if !network.private && !blocked {
                member.authorize(now, AUTHORIZED_BY_AUTO);
            } else if token_ok && !blocked {
                member.authorize(now, AUTHORIZED_BY_TOKEN);
                info!(network = %nwid, member = %address, "[oc-01] Member authorized by token");
            } else {
                return Err(ControllerError::AccessDenied {
                    network: nwid,
                    member: address,
                    reason: "not authorized",
                });
            }
        }

        if member.deauthorized_since_authorization() {
            member.authorized = false;
            member.revision += 1;
            if let Err(e) = self.cache.put_member(member).await {
                metrics::record_store_write_failure();
                warn!(
                    network = %nwid,
                    member = %address,
                    error = %e,
                    "[oc-01] Failed to persist deauthorization"
                );
            }
            info!(network = %nwid, member = %address, "[oc-01] Stale authorization revoked");
            return Err(ControllerError::AccessDenied {
                network: nwid,
                member: address,
                reason: "deauthorized",
            });
        }

        let mut aggregate = self
            .cache
            .aggregate(nwid, now, self.config.active_member_window_ms)
            .await?;

        if !member.no_auto_assign_ips {
            let assigned = assign_addresses(
                &network,
                address,
                &mut member.ip_assignments,
                &mut aggregate.allocated_ips,
            );
            for a in &assigned {
                metrics::record_ip_assigned(a.mode.as_str());
                info!(
                    network = %nwid,
                    member = %address,
                    ip = %a.ip,
                    mode = a.mode.as_str(),
                    "[oc-01] Assigned address"
                );
            }
        }

        let config = synthesize(
            &network,
            &member,
            &aggregate,
            now,
            self.config.credential_time_max_delta_ms,
        );

        let entry = LogEntry::for_request(now, &member, request.from, &request.metadata);
        member.push_log(entry, self.config.recent_log_capacity);
        member.revision += 1;

        if let Err(e) = self.cache.put_member(member).await {
            metrics::record_store_write_failure();
            warn!(
                network = %nwid,
                member = %address,
                error = %e,
                "[oc-01] Failed to persist member after decision"
            );
        }
        Ok(config)
    }
}
