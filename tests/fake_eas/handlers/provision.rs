//! Provision: two-phase policy handshake.
//!
//! Phase one (no PolicyKey in the request) hands out a temporary key;
//! phase two (acknowledgment echoing it) installs the final key that
//! subsequent commands must present.

use super::CommandResponse;
use crate::fake_eas::state::ServerState;
use airsync_client::wbxml::pages::{PROVISION, provision};
use airsync_client::wbxml::{Node, Writer};

pub const TEMPORARY_KEY: &str = "2134442939";
pub const FINAL_KEY: &str = "3378718254";

pub fn handle_provision(state: &mut ServerState, request: &Node) -> CommandResponse {
    let policy = request
        .find(PROVISION, provision::POLICIES)
        .and_then(|p| p.find(PROVISION, provision::POLICY));
    let acked_key = policy.and_then(|p| p.child_text(PROVISION, provision::POLICY_KEY));

    let key = match acked_key {
        Some(key) if key == TEMPORARY_KEY => {
            state.policy_key = Some(FINAL_KEY.to_string());
            state.handshakes += 1;
            FINAL_KEY
        }
        Some(_) => return CommandResponse::Wbxml(rejection()),
        None => TEMPORARY_KEY,
    };
    CommandResponse::Wbxml(response(key))
}

fn response(policy_key: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(PROVISION, provision::PROVISION);
    w.text_element(PROVISION, provision::STATUS, "1");
    w.start(PROVISION, provision::POLICIES);
    w.start(PROVISION, provision::POLICY);
    w.text_element(PROVISION, provision::POLICY_TYPE, "MS-EAS-Provisioning-WBXML");
    w.text_element(PROVISION, provision::STATUS, "1");
    w.text_element(PROVISION, provision::POLICY_KEY, policy_key);
    w.end();
    w.end();
    w.end();
    w.finish()
}

fn rejection() -> Vec<u8> {
    let mut w = Writer::new();
    w.start(PROVISION, provision::PROVISION);
    w.text_element(PROVISION, provision::STATUS, "2");
    w.end();
    w.finish()
}
