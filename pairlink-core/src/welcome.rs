//! Post-connect welcome messages
//!
//! Once a session connects, the linked account receives two messages: a
//! banner, then the bare session id so it can be copied for later reuse.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WelcomeError;
use crate::transport::Transport;

/// Domain appended to normalized user identities
pub const DEFAULT_DOMAIN_SUFFIX: &str = "s.whatsapp.net";

/// Name used in the banner when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "PAIRLINK";

/// Settings for the welcome sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeConfig {
    /// Service name shown in the banner
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Domain of user addresses
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_domain_suffix() -> String {
    DEFAULT_DOMAIN_SUFFIX.to_string()
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            domain_suffix: default_domain_suffix(),
        }
    }
}

/// Address that reaches the account behind `identity`
///
/// Device-scoped identities look like `user:device@host`; the device part and
/// host are dropped and the canonical domain is appended. Identities without
/// a device part are already deliverable and pass through unchanged.
pub fn normalize_identity(identity: &str, domain_suffix: &str) -> String {
    match identity.split_once(':') {
        Some((user, _)) => format!("{user}@{domain_suffix}"),
        None => identity.to_string(),
    }
}

/// The banner message
pub fn banner(service_name: &str) -> String {
    format!(
        "╭─────⊷ *{service_name} LINKED* ⊶─────╮\n\
         ✨ Your connection to the *{service_name}* engine has been established!\n\
         🔗 This session grants you full interaction rights with the bot system.\n\
         🚀 Keep your Session ID secure for future deployments.\n\
         🌌 If hosting on Heroku or similar panels, use this Session ID as a launch token.\n\
         ╰────⊷ Welcome to the command core."
    )
}

/// The session id message, fenced for tap-to-copy
pub fn session_id_message(session_id: &str) -> String {
    format!(" \n```{session_id}```\n\n")
}

/// Send the banner and then the session id to the connected account
pub async fn send_welcome(
    transport: &dyn Transport,
    config: &WelcomeConfig,
    session_id: &str,
    identity: &str,
) -> Result<String, WelcomeError> {
    let target = normalize_identity(identity, &config.domain_suffix);

    transport
        .send_message(&target, &banner(&config.service_name))
        .await
        .map_err(|source| WelcomeError::Send {
            step: "banner",
            source,
        })?;

    transport
        .send_message(&target, &session_id_message(session_id))
        .await
        .map_err(|source| WelcomeError::Send {
            step: "session id",
            source,
        })?;

    info!(session_id = %session_id, "Sent welcome message and session id to {}", target);
    Ok(target)
}
