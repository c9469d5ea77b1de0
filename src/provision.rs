//! Device provisioning and policy management
//!
//! Servers may refuse every command with HTTP 449 until the device has
//! acknowledged their policy. The handshake is two round-trips: a
//! discovery request yields a temporary policy key and the policy body;
//! acknowledging that key yields the final key attached to all
//! subsequent requests. The key itself is opaque — this component only
//! produces and validates it; persistence belongs to the account store.

use crate::error::{Error, Result};
use crate::store::AccountStore;
use crate::transport::Session;
use crate::wbxml::pages::{PROVISION, provision};
use crate::wbxml::{Writer, decode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const POLICY_TYPE: &str = "MS-EAS-Provisioning-WBXML";
const STATUS_OK: u32 = 1;

/// Provisioning lifecycle of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    /// No policy key yet; the next sync must provision first when the
    /// server demands it.
    Unprovisioned,
    /// Handshake in flight.
    Provisioning,
    /// Handshake completed; requests carry this key.
    Provisioned { policy_key: String },
}

/// Account-scoped policy state with a single writer.
///
/// Passed by reference into the sync engine rather than living in a
/// global, so tests can inject deterministic fixtures.
pub struct ProvisionManager {
    account_id: String,
    accounts: Arc<dyn AccountStore>,
    state: RwLock<ProvisionState>,
}

impl ProvisionManager {
    /// Restore state from the persisted policy key, if any.
    pub fn new(
        account_id: &str,
        initial_key: Option<String>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        let state = initial_key.map_or(ProvisionState::Unprovisioned, |policy_key| {
            ProvisionState::Provisioned { policy_key }
        });
        Self {
            account_id: account_id.to_string(),
            accounts,
            state: RwLock::new(state),
        }
    }

    /// The key to attach to outgoing requests, if provisioned.
    pub async fn policy_key(&self) -> Option<String> {
        match &*self.state.read().await {
            ProvisionState::Provisioned { policy_key } => Some(policy_key.clone()),
            _ => None,
        }
    }

    pub async fn state(&self) -> ProvisionState {
        self.state.read().await.clone()
    }

    /// Run the full policy handshake and persist the resulting key.
    ///
    /// Failure at any step drops back to `Unprovisioned` — fatal for the
    /// current sync attempt, not for the account; the next attempt
    /// restarts the handshake.
    pub async fn provision(&self, session: &Session) -> Result<String> {
        let mut state = self.state.write().await;
        *state = ProvisionState::Provisioning;
        drop(state);

        match self.handshake(session).await {
            Ok(policy_key) => {
                info!(account = %self.account_id, "provisioning handshake complete");
                if let Err(e) = self.accounts.save_policy_key(&self.account_id, &policy_key) {
                    warn!(account = %self.account_id, error = %e, "failed to persist policy key");
                }
                *self.state.write().await = ProvisionState::Provisioned {
                    policy_key: policy_key.clone(),
                };
                Ok(policy_key)
            }
            Err(e) => {
                warn!(account = %self.account_id, error = %e, "provisioning handshake failed");
                *self.state.write().await = ProvisionState::Unprovisioned;
                Err(e)
            }
        }
    }

    async fn handshake(&self, session: &Session) -> Result<String> {
        // Round one: request the policy.
        debug!(account = %self.account_id, "requesting device policy");
        let response = session
            .execute("Provision", None, discovery_request())
            .await?;
        let temporary_key = parse_policy_response(&response)?;

        // Round two: acknowledge the temporary key.
        debug!(account = %self.account_id, "acknowledging device policy");
        let response = session
            .execute("Provision", Some(&temporary_key), ack_request(&temporary_key))
            .await?;
        parse_policy_response(&response)
    }
}

/// Initial provisioning request asking the server for its policy.
#[must_use]
pub fn discovery_request() -> Vec<u8> {
    let mut w = Writer::new();
    w.start(PROVISION, provision::PROVISION);
    w.start(PROVISION, provision::POLICIES);
    w.start(PROVISION, provision::POLICY);
    w.text_element(PROVISION, provision::POLICY_TYPE, POLICY_TYPE);
    w.end();
    w.end();
    w.end();
    w.finish()
}

/// Acknowledgment of a received policy: echoes the temporary key with
/// status 1 (applied).
#[must_use]
pub fn ack_request(temporary_key: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(PROVISION, provision::PROVISION);
    w.start(PROVISION, provision::POLICIES);
    w.start(PROVISION, provision::POLICY);
    w.text_element(PROVISION, provision::POLICY_TYPE, POLICY_TYPE);
    w.text_element(PROVISION, provision::POLICY_KEY, temporary_key);
    w.text_element(PROVISION, provision::STATUS, "1");
    w.end();
    w.end();
    w.end();
    w.finish()
}

/// Extract the policy key from a provisioning response, validating both
/// the command status and the per-policy status.
pub fn parse_policy_response(bytes: &[u8]) -> Result<String> {
    let root = decode(bytes)?;
    if !root.is(PROVISION, provision::PROVISION) {
        return Err(Error::ProtocolDecode(
            "expected Provision response root".into(),
        ));
    }
    let status = root
        .child_u32(PROVISION, provision::STATUS)
        .unwrap_or(STATUS_OK);
    if status != STATUS_OK {
        return Err(Error::ProtocolDecode(format!(
            "provisioning rejected with status {status}"
        )));
    }
    let policy = root
        .find(PROVISION, provision::POLICIES)
        .and_then(|p| p.find(PROVISION, provision::POLICY))
        .ok_or_else(|| Error::ProtocolDecode("provisioning response without policy".into()))?;
    let policy_status = policy
        .child_u32(PROVISION, provision::STATUS)
        .unwrap_or(STATUS_OK);
    if policy_status != STATUS_OK {
        return Err(Error::ProtocolDecode(format!(
            "policy rejected with status {policy_status}"
        )));
    }
    policy
        .child_text(PROVISION, provision::POLICY_KEY)
        .ok_or_else(|| Error::ProtocolDecode("provisioning response without policy key".into()))
}
