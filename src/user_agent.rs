//! User-Agent strings for harvester HTTP traffic.
//!
//! Public metadata APIs ask clients to identify themselves with a contact
//! address (the "polite pool"), so the UA carries the configured email.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/oa-harvester";

/// Placeholder used when no contact email was configured.
const NO_CONTACT: &str = "no-contact";

/// User-Agent sent on every request: tool name, version, and contact email.
#[must_use]
pub(crate) fn polite_user_agent(contact_email: Option<&str>) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let contact = contact_email
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map_or_else(|| NO_CONTACT.to_string(), |email| format!("mailto:{email}"));
    format!("oa-harvester/{version} (+{PROJECT_UA_URL}; {contact})")
}
