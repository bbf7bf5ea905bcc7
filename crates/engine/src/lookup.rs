//! Display name to remote resource lookup
//!
//! The platform does not enforce unique display names. Two concurrent
//! deploys of the same name can both observe "no match" and both create;
//! nothing here prevents that.

use aectl_provider::{AgentEngineApi, RemoteResource};
use tracing::{debug, warn};

use crate::{EngineError, Result};

/// What to do when several resources share a display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Take the first match in listing order and log a warning
    #[default]
    FirstListed,
    /// Refuse with [`EngineError::AmbiguousMatch`]
    Strict,
}

/// Resource whose display name equals `display_name`, if any
pub async fn find_by_display_name(
    api: &dyn AgentEngineApi,
    display_name: &str,
    policy: MatchPolicy,
) -> Result<Option<RemoteResource>> {
    let listed = api
        .list(Some(display_name))
        .await
        .map_err(|e| EngineError::remote("list", "agent engines", e))?;

    // The server-side filter is advisory; compare exactly
    let matches: Vec<RemoteResource> = listed
        .into_iter()
        .filter(|r| r.display_name == display_name)
        .collect();
    debug!("◆ {} match(es) for '{}'", matches.len(), display_name);

    if matches.len() > 1 {
        let names: Vec<String> = matches.iter().map(|r| r.name.clone()).collect();
        match policy {
            MatchPolicy::Strict => {
                return Err(EngineError::AmbiguousMatch {
                    display_name: display_name.to_string(),
                    matches: names,
                })
            }
            MatchPolicy::FirstListed => warn!(
                "◆ {} agent engines share the display name '{}'; using {}",
                names.len(),
                display_name,
                names[0]
            ),
        }
    }

    Ok(matches.into_iter().next())
}
