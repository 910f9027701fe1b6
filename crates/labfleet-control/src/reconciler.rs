//! The reconciliation loop.
//!
//! A single long-lived task drives bookings through their lifecycle. Each
//! tick runs, in order:
//!
//! 1. A health sweep over every agent (see [`crate::health`])
//! 2. **Phase A** — Wake-on-LAN for bookings starting within the lead window
//! 3. **Phase B** — container starts for approved bookings whose start has
//!    arrived, debiting capacity in the same commit
//! 4. **Phase C** — container stops for active bookings past their end,
//!    crediting capacity in the same commit
//! 5. Every Nth tick, drift reconciliation against each online agent's
//!    actual containers
//!
//! Ticks never overlap: the timer delays a missed tick until the previous
//! one finishes. Any per-booking failure is logged and contained; the next
//! tick is the retry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use labfleet_store::{Agent, AgentStatus, Booking, Store, StoreError};
use tokio::time::MissedTickBehavior;

use crate::agent_client::{AgentCallError, AgentClient, StartContainerRequest, StopOutcome};
use crate::health;
use crate::types::ReconcilerConfig;
use crate::wol;

/// Label identifying containers this system manages.
pub const MANAGED_BY_LABEL: &str = "compute_booking";

/// The periodic reconciler driving the booking lifecycle.
pub struct Reconciler<S, C> {
    store: Arc<S>,
    client: Arc<C>,
    config: ReconcilerConfig,
}

impl<S, C> Reconciler<S, C>
where
    S: Store,
    C: AgentClient,
{
    /// Create a reconciler over the given store and agent client.
    #[must_use]
    pub fn new(store: Arc<S>, client: Arc<C>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Run the reconciliation loop forever.
    ///
    /// This should be spawned as a background task. The interval delays
    /// missed ticks, so at most one tick is ever in flight.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.tick_interval_secs,
            "Starting reconciliation loop"
        );

        let mut tick_no: u64 = 0;
        loop {
            ticker.tick().await;
            tick_no += 1;
            self.tick(Utc::now(), tick_no).await;
        }
    }

    /// Run one full tick against an explicit clock.
    pub async fn tick(&self, now: DateTime<Utc>, tick_no: u64) {
        health::sweep(self.store.as_ref(), self.client.as_ref(), now).await;
        self.phase_prewake(now).await;
        self.phase_start(now).await;
        self.phase_stop(now).await;

        if self.config.drift_every_ticks > 0 && tick_no % self.config.drift_every_ticks == 0 {
            self.reconcile_drift(now).await;
        }
    }

    /// Phase A: send Wake-on-LAN to hosts whose bookings start soon.
    async fn phase_prewake(&self, now: DateTime<Utc>) {
        let upcoming = match self
            .store
            .approved_starting_within(now, now + self.config.wake_lead())
        {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::error!(error = %e, "Pre-wake selection failed");
                return;
            }
        };

        for booking in upcoming {
            let Some(agent_id) = booking.agent_id else {
                continue;
            };
            let agent = match self.store.get_agent(agent_id) {
                Ok(Some(agent)) => agent,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(booking_id = %booking.id, error = %e, "Agent lookup failed");
                    continue;
                }
            };

            if !agent.wol_enabled {
                continue;
            }
            let Some(mac) = agent.mac.as_deref().filter(|m| !m.is_empty()) else {
                continue;
            };

            match wol::send_magic_packet(mac).await {
                Ok(()) => {
                    tracing::info!(
                        booking_id = %booking.id,
                        agent_id = %agent.id,
                        ip = %agent.ip,
                        "Sent Wake-on-LAN"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        booking_id = %booking.id,
                        agent_id = %agent.id,
                        error = %e,
                        "Wake-on-LAN failed"
                    );
                }
            }
        }
    }

    /// Phase B: start containers for approved bookings whose start has
    /// arrived.
    async fn phase_start(&self, now: DateTime<Utc>) {
        let due = match self.store.approved_starting_before(now) {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::error!(error = %e, "Start selection failed");
                return;
            }
        };

        for booking in due {
            self.start_booking(&booking, now).await;
        }
    }

    async fn start_booking(&self, booking: &Booking, now: DateTime<Utc>) {
        let Some(agent_id) = booking.agent_id else {
            tracing::warn!(booking_id = %booking.id, "Approved booking has no agent bound");
            return;
        };

        // Re-read the agent: the health sweep earlier this tick may have
        // flipped it.
        let agent = match self.store.get_agent(agent_id) {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                tracing::error!(
                    booking_id = %booking.id,
                    agent_id = %agent_id,
                    "Bound agent row is missing"
                );
                return;
            }
            Err(e) => {
                tracing::error!(booking_id = %booking.id, error = %e, "Agent lookup failed");
                return;
            }
        };

        if agent.status != AgentStatus::Online {
            tracing::debug!(
                booking_id = %booking.id,
                agent_id = %agent.id,
                status = ?agent.status,
                "Agent not online, start deferred"
            );
            return;
        }

        let request = StartContainerRequest {
            user_id: booking.user_id,
            image: booking.image.clone(),
            cpu: booking.cpu,
            memory: booking.memory.clone(),
            port: booking.id.container_port(self.config.port_base),
        };

        match self.client.start_container(&agent, &request).await {
            Ok(response) => {
                match self.store.activate_booking(
                    booking.id,
                    &response.container_name,
                    &response.url,
                    now,
                ) {
                    Ok(_) => {
                        tracing::info!(
                            booking_id = %booking.id,
                            agent_id = %agent.id,
                            container = %response.container_name,
                            url = %response.url,
                            "Session started"
                        );
                    }
                    Err(StoreError::WrongStatus { found }) => {
                        // Lost a race with a cancel; the container will be
                        // reaped by drift reconciliation.
                        tracing::info!(
                            booking_id = %booking.id,
                            found = ?found,
                            container = %response.container_name,
                            "Booking left approved state mid-start, not activated"
                        );
                    }
                    Err(StoreError::InsufficientCapacity) => {
                        tracing::warn!(
                            booking_id = %booking.id,
                            agent_id = %agent.id,
                            "Capacity exhausted at commit, start deferred"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            booking_id = %booking.id,
                            agent_id = %agent.id,
                            error = %e,
                            "Failed to commit activation"
                        );
                    }
                }
            }
            Err(AgentCallError::Transient(message)) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    agent_id = %agent.id,
                    error = %message,
                    "Container start failed, will retry next tick"
                );
            }
            Err(AgentCallError::Rejected { status, message }) => {
                tracing::error!(
                    booking_id = %booking.id,
                    agent_id = %agent.id,
                    status,
                    error = %message,
                    "Agent rejected container start"
                );
            }
        }
    }

    /// Phase C: stop containers for active bookings past their end time.
    async fn phase_stop(&self, now: DateTime<Utc>) {
        let expired = match self.store.active_ending_before(now) {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::error!(error = %e, "Stop selection failed");
                return;
            }
        };

        for booking in expired {
            self.stop_booking(&booking, now).await;
        }
    }

    async fn stop_booking(&self, booking: &Booking, now: DateTime<Utc>) {
        let Some(agent_id) = booking.agent_id else {
            tracing::error!(booking_id = %booking.id, "Active booking has no agent bound");
            return;
        };
        let Some(container_name) = booking.container_name.as_deref() else {
            tracing::error!(booking_id = %booking.id, "Active booking has no container name");
            return;
        };

        let agent = match self.store.get_agent(agent_id) {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                tracing::error!(
                    booking_id = %booking.id,
                    agent_id = %agent_id,
                    "Bound agent row is missing"
                );
                return;
            }
            Err(e) => {
                tracing::error!(booking_id = %booking.id, error = %e, "Agent lookup failed");
                return;
            }
        };

        match self.client.stop_container(&agent, container_name).await {
            // An unknown container means the work is already done.
            Ok(StopOutcome::Stopped | StopOutcome::NotFound) => {
                match self.store.complete_booking(booking.id, now) {
                    Ok(_) => {
                        tracing::info!(
                            booking_id = %booking.id,
                            agent_id = %agent.id,
                            container = %container_name,
                            "Session completed"
                        );
                    }
                    Err(StoreError::WrongStatus { found }) => {
                        tracing::info!(
                            booking_id = %booking.id,
                            found = ?found,
                            "Booking left active state mid-stop, not completed"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            booking_id = %booking.id,
                            error = %e,
                            "Failed to commit completion"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    agent_id = %agent.id,
                    error = %e,
                    "Container stop failed, will retry next tick"
                );
            }
        }
    }

    /// Compare controller state with each online agent's actual containers
    /// and repair disagreements: force-complete active bookings whose
    /// container is gone, stop managed containers nothing references.
    async fn reconcile_drift(&self, now: DateTime<Utc>) {
        let agents = match self.store.list_agents_by_status(AgentStatus::Online) {
            Ok(agents) => agents,
            Err(e) => {
                tracing::error!(error = %e, "Drift reconciliation could not list agents");
                return;
            }
        };

        for agent in agents {
            self.reconcile_agent_drift(&agent, now).await;
        }
    }

    async fn reconcile_agent_drift(&self, agent: &Agent, now: DateTime<Utc>) {
        let containers = match self.client.list_containers(agent).await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(agent_id = %agent.id, error = %e, "Container listing failed");
                return;
            }
        };
        let active = match self.store.active_bookings_on_agent(agent.id) {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::error!(agent_id = %agent.id, error = %e, "Active booking lookup failed");
                return;
            }
        };

        let running: HashSet<&str> = containers.iter().map(|c| c.name.as_str()).collect();
        let referenced: HashSet<&str> = active
            .iter()
            .filter_map(|b| b.container_name.as_deref())
            .collect();

        // Active in the store, gone on the agent: the session is over
        // whether we saw it end or not. Credit capacity and complete.
        for booking in &active {
            let Some(name) = booking.container_name.as_deref() else {
                continue;
            };
            if running.contains(name) {
                continue;
            }
            match self.store.complete_booking(booking.id, now) {
                Ok(_) => {
                    tracing::info!(
                        booking_id = %booking.id,
                        agent_id = %agent.id,
                        container = %name,
                        "Force-completed booking with missing container"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %e,
                        "Failed to force-complete drifted booking"
                    );
                }
            }
        }

        // Managed containers nothing references: orphans from lost starts
        // or cancel races. Stop them.
        for container in &containers {
            let managed =
                container.labels.get("managed_by").map(String::as_str) == Some(MANAGED_BY_LABEL);
            if !managed || referenced.contains(container.name.as_str()) {
                continue;
            }

            match self.client.stop_container(agent, &container.name).await {
                Ok(_) => {
                    tracing::info!(
                        agent_id = %agent.id,
                        container = %container.name,
                        "Stopped orphaned container"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        agent_id = %agent.id,
                        container = %container.name,
                        error = %e,
                        "Failed to stop orphaned container"
                    );
                }
            }
        }
    }
}
