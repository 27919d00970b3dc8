//! Request planning: premium (session-injected) vs free path.

use crate::accounts::SessionInfo;
use crate::registry::PluginDescriptor;

/// The concrete GET the transfer will issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPlan {
    pub url: String,
    /// True when the URL carries a premium session token; a 401/403 answer
    /// then triggers the one forced refresh.
    pub premium: bool,
}

/// Builds the request for a job URL.
///
/// With a premium-capable descriptor and a premium session, the plan targets
/// the service's processing endpoint with `user`/`pass`/`dl` query
/// parameters (the session token as `pass`, the source URL as `dl`).
/// Everything else downloads the source URL directly.
pub fn build_request(
    source_url: &str,
    descriptor: &PluginDescriptor,
    session: Option<&SessionInfo>,
) -> RequestPlan {
    let endpoint = match (&descriptor.premium_endpoint, session) {
        (Some(endpoint), Some(session)) if descriptor.premium && session.premium => endpoint,
        _ => {
            return RequestPlan {
                url: source_url.to_string(),
                premium: false,
            };
        }
    };

    let mut url = match url::Url::parse(endpoint) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(plugin = %descriptor.name, endpoint, "bad premium endpoint: {}", e);
            return RequestPlan {
                url: source_url.to_string(),
                premium: false,
            };
        }
    };
    url.query_pairs_mut()
        .append_pair("user", "cookie")
        .append_pair("pass", &session.unwrap().token)
        .append_pair("dl", source_url);

    RequestPlan {
        url: url.into(),
        premium: true,
    }
}
