//! Agent health monitoring.
//!
//! Every reconciler tick starts with a sweep over all agent rows: each is
//! probed concurrently, a success marks it online and advances `last_seen`,
//! and any failure marks it offline without touching `last_seen`. Admin-set
//! `maintenance` is overwritten by the next probe result.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use labfleet_store::{AgentStatus, Store};

use crate::agent_client::AgentClient;

/// Probe every agent and record the results.
///
/// Failures to persist a result are logged and do not abort the sweep.
pub async fn sweep<S, C>(store: &S, client: &C, now: DateTime<Utc>)
where
    S: Store + ?Sized,
    C: AgentClient + ?Sized,
{
    let agents = match store.list_agents() {
        Ok(agents) => agents,
        Err(e) => {
            tracing::error!(error = %e, "Health sweep could not list agents");
            return;
        }
    };

    let probes = agents.iter().map(|agent| async move {
        let healthy = client.health(agent).await.is_ok();
        (agent, healthy)
    });

    for (agent, healthy) in join_all(probes).await {
        let was_online = agent.status == AgentStatus::Online;
        if healthy != was_online {
            tracing::info!(
                agent_id = %agent.id,
                ip = %agent.ip,
                healthy,
                previous = ?agent.status,
                "Agent health changed"
            );
        }

        if let Err(e) = store.record_agent_health(agent.id, healthy, now) {
            tracing::error!(
                agent_id = %agent.id,
                error = %e,
                "Failed to record agent health"
            );
        }
    }
}
