//! Orchestration plane service implementation.
//!
//! This module provides the [`ControlPlane`] trait and [`ControlPlaneService`]
//! implementation covering the booking service (user intents) and the admin
//! service (approvals, agent administration, stats).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use labfleet_auth::{hash_password, verify_password};
use labfleet_core::{parse_mem_gb, AgentId, BookingId, Role, UserId};
use labfleet_store::{
    Agent, AgentStatus, Booking, BookingStatus, NewBooking, NewUser, Store, StoreError,
    StoreStats, User,
};

use crate::error::{ControlError, Result, ValidationErrors};
use crate::lifecycle;
use crate::types::{limits, BookingRequest, RegisterRequest};

/// Trait defining the orchestration plane operations.
///
/// This trait provides the complete API for user registration, booking
/// submission, and administration. Implementations handle validation,
/// state persistence, and capacity-aware agent selection.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::EmailExists` on a duplicate email and
    /// `ControlError::Validation` on malformed input.
    async fn register_user(&self, request: RegisterRequest) -> Result<User>;

    /// Verify credentials and return the user.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidCredentials` for unknown emails or wrong
    /// passwords, and `ControlError::AccountDisabled` for disabled accounts.
    async fn login(&self, email: &str, password: &str) -> Result<User>;

    /// Fetch a user by id.
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Fetch the caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UserNotFound` if the user doesn't exist.
    async fn get_profile(&self, user_id: UserId) -> Result<User>;

    // =========================================================================
    // Booking Service
    // =========================================================================

    /// Validate and record a booking intent with `status = pending`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` on malformed input and
    /// `ControlError::Overlap` if the interval collides with one of the
    /// caller's approved or active bookings.
    async fn create_booking(&self, user_id: UserId, request: BookingRequest) -> Result<Booking>;

    /// List the caller's bookings, newest first.
    async fn list_user_bookings(&self, user_id: UserId) -> Result<Vec<Booking>>;

    /// Cancel one of the caller's bookings while it is pending or approved.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::BookingNotFound` if the booking doesn't exist
    /// or belongs to someone else, and `ControlError::WrongStatus` for any
    /// other current status.
    async fn cancel_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking>;

    // =========================================================================
    // Admin Service
    // =========================================================================

    /// List all bookings, optionally filtered by status, newest first.
    async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>>;

    /// Approve a pending booking, binding it to an agent.
    ///
    /// With an explicit `agent_id` the agent must be online. Without one,
    /// the online agent with the most available CPU that fits the request
    /// is chosen (smallest id on ties). Capacity is not debited here.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NoAvailableAgents` if auto-selection finds no
    /// fit, and `ControlError::AgentNotAvailable` if the named agent is not
    /// online.
    async fn approve_booking(
        &self,
        booking_id: BookingId,
        agent_id: Option<AgentId>,
    ) -> Result<Booking>;

    /// Reject a pending booking with a reason.
    async fn reject_booking(&self, booking_id: BookingId, reason: &str) -> Result<Booking>;

    /// Extend an active booking's end time by the given hours.
    async fn extend_booking(&self, booking_id: BookingId, hours: u32) -> Result<Booking>;

    /// List all agents with capacity and status.
    async fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Set an agent's status (admin override).
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AgentNotFound` if the agent doesn't exist.
    async fn set_agent_status(&self, agent_id: AgentId, status: AgentStatus) -> Result<Agent>;

    /// Counts by booking status plus online agents.
    async fn stats(&self) -> Result<StoreStats>;
}

/// The main orchestration plane service implementation.
pub struct ControlPlaneService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> ControlPlaneService<S> {
    /// Create a new service over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn validate_registration(request: &RegisterRequest) -> Result<()> {
        let mut errors = ValidationErrors::new();

        let name_len = request.name.chars().count();
        if !(limits::NAME_MIN_LEN..=limits::NAME_MAX_LEN).contains(&name_len) {
            errors.insert(
                "name",
                vec![format!(
                    "must be {} to {} characters",
                    limits::NAME_MIN_LEN,
                    limits::NAME_MAX_LEN
                )],
            );
        }

        if !is_plausible_email(&request.email) {
            errors.insert("email", vec!["not a valid email address".to_string()]);
        }

        if request.password.len() < limits::PASSWORD_MIN_LEN {
            errors.insert(
                "password",
                vec![format!(
                    "must be at least {} characters",
                    limits::PASSWORD_MIN_LEN
                )],
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ControlError::Validation(errors))
        }
    }

    /// Validate a booking request against a known clock and compute its
    /// end time.
    fn validate_booking(
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<(u32, DateTime<Utc>)> {
        let mut errors = ValidationErrors::new();

        if !(limits::CPU_MIN..=limits::CPU_MAX).contains(&request.cpu) {
            errors.insert(
                "cpu",
                vec![format!(
                    "must be between {} and {}",
                    limits::CPU_MIN,
                    limits::CPU_MAX
                )],
            );
        }

        let mem_gb = match parse_mem_gb(&request.memory) {
            Ok(gb) => gb,
            Err(e) => {
                errors.insert("memory", vec![e.to_string()]);
                0
            }
        };

        if request.image.is_empty() || request.image.len() > limits::IMAGE_MAX_LEN {
            errors.insert(
                "image",
                vec![format!("must be 1 to {} characters", limits::IMAGE_MAX_LEN)],
            );
        }

        if !(limits::DURATION_MIN_HR..=limits::DURATION_MAX_HR).contains(&request.duration_hr) {
            errors.insert(
                "duration_hr",
                vec![format!(
                    "must be between {} and {}",
                    limits::DURATION_MIN_HR,
                    limits::DURATION_MAX_HR
                )],
            );
        }

        if request.start_time <= now {
            errors.insert("start_time", vec!["must be in the future".to_string()]);
        }

        if !errors.is_empty() {
            return Err(ControlError::Validation(errors));
        }

        let end_time = request.start_time + Duration::hours(i64::from(request.duration_hr));
        Ok((mem_gb, end_time))
    }

    /// Booking submission against an explicit clock. The trait method uses
    /// the wall clock; tests drive this directly.
    ///
    /// # Errors
    ///
    /// See [`ControlPlane::create_booking`].
    pub fn create_booking_at(
        &self,
        user_id: UserId,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let (mem_gb, end_time) = Self::validate_booking(request, now)?;

        // Half-open overlap check against the caller's committed sessions:
        // an interval ending exactly when another starts does not overlap.
        let holding = self.store.bookings_in_states_for_user(
            user_id,
            &[BookingStatus::Approved, BookingStatus::Active],
        )?;
        let collides = holding
            .iter()
            .any(|b| b.start_time < end_time && b.end_time > request.start_time);
        if collides {
            return Err(ControlError::Overlap);
        }

        let booking = self.store.create_booking(
            NewBooking {
                user_id,
                cpu: request.cpu,
                memory: request.memory.clone(),
                mem_gb,
                image: request.image.clone(),
                start_time: request.start_time,
                end_time,
                notes: request.tags.clone().unwrap_or_default(),
            },
            now,
        )?;

        tracing::info!(
            booking_id = %booking.id,
            user_id = %user_id,
            image = %booking.image,
            "Booking submitted"
        );

        Ok(booking)
    }

    /// Pick the online agent with the most available CPU that fits the
    /// request; ties go to the smallest id.
    fn select_agent(&self, cpu: u32, mem_gb: u32) -> Result<Agent> {
        let candidates = self.store.list_agents_by_status(AgentStatus::Online)?;

        candidates
            .into_iter()
            .filter(|a| a.available_cpu >= cpu && a.available_mem_gb >= mem_gb)
            .max_by(|a, b| {
                a.available_cpu
                    .cmp(&b.available_cpu)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .ok_or(ControlError::NoAvailableAgents)
    }
}

/// Map a guarded-transition failure to a caller-facing error.
fn transition_error(action: &'static str, id: BookingId, e: StoreError) -> ControlError {
    match e {
        StoreError::WrongStatus { found } => ControlError::WrongStatus { action, found },
        StoreError::NotFound => ControlError::BookingNotFound(id),
        other => ControlError::Store(other),
    }
}

/// A deliberately light email shape check; real validation happens when
/// mail is actually sent.
fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[async_trait]
impl<S: Store + 'static> ControlPlane for ControlPlaneService<S> {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn register_user(&self, request: RegisterRequest) -> Result<User> {
        Self::validate_registration(&request)?;

        let password_hash = hash_password(&request.password)?;
        let user = self
            .store
            .create_user(NewUser {
                name: request.name,
                email: request.email,
                password_hash,
                role: request.role.unwrap_or(Role::Student),
                department: "General".to_string(),
            })
            .map_err(|e| match e {
                StoreError::EmailExists => ControlError::EmailExists,
                other => ControlError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, email = %user.email, "User registered");

        Ok(user)
    }

    async fn login(&self, email: &str, password: &str) -> Result<User> {
        let Some(user) = self.store.find_user_by_email(email)? else {
            return Err(ControlError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(ControlError::InvalidCredentials);
        }
        if !user.active {
            return Err(ControlError::AccountDisabled);
        }

        tracing::info!(user_id = %user.id, email = %user.email, "User login");

        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.store.get_user(user_id)?)
    }

    async fn get_profile(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(user_id)?
            .ok_or(ControlError::UserNotFound(user_id))
    }

    // =========================================================================
    // Booking Service
    // =========================================================================

    async fn create_booking(&self, user_id: UserId, request: BookingRequest) -> Result<Booking> {
        self.create_booking_at(user_id, &request, Utc::now())
    }

    async fn list_user_bookings(&self, user_id: UserId) -> Result<Vec<Booking>> {
        Ok(self.store.list_bookings_by_user(user_id)?)
    }

    async fn cancel_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)?
            .filter(|b| b.user_id == user_id)
            .ok_or(ControlError::BookingNotFound(booking_id))?;

        if !lifecycle::can_cancel(booking.status) {
            return Err(ControlError::WrongStatus {
                action: "cancel",
                found: booking.status,
            });
        }

        let cancelled = self
            .store
            .cancel_booking(booking.id, Utc::now())
            .map_err(|e| transition_error("cancel", booking_id, e))?;

        tracing::info!(booking_id = %booking_id, user_id = %user_id, "Booking cancelled");

        Ok(cancelled)
    }

    // =========================================================================
    // Admin Service
    // =========================================================================

    async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>> {
        Ok(self.store.list_bookings(status)?)
    }

    async fn approve_booking(
        &self,
        booking_id: BookingId,
        agent_id: Option<AgentId>,
    ) -> Result<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)?
            .ok_or(ControlError::BookingNotFound(booking_id))?;
        if !lifecycle::is_valid_transition(booking.status, BookingStatus::Approved) {
            return Err(ControlError::WrongStatus {
                action: "approve",
                found: booking.status,
            });
        }

        let agent = match agent_id {
            Some(id) => {
                let agent = self
                    .store
                    .get_agent(id)?
                    .ok_or(ControlError::AgentNotFound(id))?;
                if agent.status != AgentStatus::Online {
                    return Err(ControlError::AgentNotAvailable(id));
                }
                agent
            }
            None => self.select_agent(booking.cpu, booking.mem_gb)?,
        };

        let approved = self
            .store
            .approve_booking(booking_id, agent.id, Utc::now())
            .map_err(|e| transition_error("approve", booking_id, e))?;

        tracing::info!(
            booking_id = %booking_id,
            agent_id = %agent.id,
            "Booking approved"
        );

        Ok(approved)
    }

    async fn reject_booking(&self, booking_id: BookingId, reason: &str) -> Result<Booking> {
        let rejected = self
            .store
            .reject_booking(booking_id, reason, Utc::now())
            .map_err(|e| transition_error("reject", booking_id, e))?;

        tracing::info!(booking_id = %booking_id, "Booking rejected");

        Ok(rejected)
    }

    async fn extend_booking(&self, booking_id: BookingId, hours: u32) -> Result<Booking> {
        let extended = self
            .store
            .extend_booking(booking_id, hours, Utc::now())
            .map_err(|e| transition_error("extend", booking_id, e))?;

        tracing::info!(
            booking_id = %booking_id,
            hours,
            new_end = %extended.end_time,
            "Booking extended"
        );

        Ok(extended)
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        Ok(self.store.list_agents()?)
    }

    async fn set_agent_status(&self, agent_id: AgentId, status: AgentStatus) -> Result<Agent> {
        let agent = self
            .store
            .set_agent_status(agent_id, status)
            .map_err(|e| match e {
                StoreError::NotFound => ControlError::AgentNotFound(agent_id),
                other => ControlError::Store(other),
            })?;

        tracing::info!(agent_id = %agent_id, status = ?status, "Agent status updated");

        Ok(agent)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(self.store.stats()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labfleet_store::{NewAgent, RocksStore};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn setup() -> (ControlPlaneService<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (ControlPlaneService::new(store), dir)
    }

    fn agent_spec(name: &str, cpu: u32, mem_gb: u32, status: AgentStatus) -> NewAgent {
        NewAgent {
            name: name.into(),
            ip: "10.0.0.1".into(),
            mac: None,
            port: 5000,
            wol_enabled: false,
            status,
            total_cpu: cpu,
            total_mem_gb: mem_gb,
            tags: BTreeSet::new(),
        }
    }

    fn booking_request(start: DateTime<Utc>, duration_hr: u32) -> BookingRequest {
        BookingRequest {
            cpu: 2,
            memory: "4g".into(),
            image: "jupyter/notebook".into(),
            start_time: start,
            duration_hr,
            tags: None,
        }
    }

    async fn register_student(service: &ControlPlaneService<RocksStore>) -> User {
        service
            .register_user(RegisterRequest {
                name: "Alice Student".into(),
                email: "alice@test.com".into(),
                password: "pw123456".into(),
                role: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_defaults_to_student() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.department, "General");
        assert!(user.active);
    }

    #[tokio::test]
    async fn register_duplicate_email_conflicts() {
        let (service, _dir) = setup();
        register_student(&service).await;

        let err = service
            .register_user(RegisterRequest {
                name: "Other".into(),
                email: "alice@test.com".into(),
                password: "pw123456".into(),
                role: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::EmailExists));
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let (service, _dir) = setup();
        let err = service
            .register_user(RegisterRequest {
                name: "A".into(),
                email: "not-an-email".into(),
                password: "short".into(),
                role: None,
            })
            .await
            .unwrap_err();

        let ControlError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }

    #[tokio::test]
    async fn login_checks_credentials_and_active_flag() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;

        let logged_in = service.login("alice@test.com", "pw123456").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let err = service.login("alice@test.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidCredentials));

        let err = service.login("nobody@test.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidCredentials));
    }

    #[tokio::test]
    async fn booking_boundary_durations() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let now = Utc::now();
        let start = now + Duration::hours(1);

        // 24 hours is accepted.
        let booking = service
            .create_booking_at(user.id, &booking_request(start, 24), now)
            .unwrap();
        assert_eq!(booking.end_time - booking.start_time, Duration::hours(24));
        assert_eq!(booking.status, BookingStatus::Pending);

        // 25 hours is rejected.
        let err = service
            .create_booking_at(user.id, &booking_request(start, 25), now)
            .unwrap_err();
        let ControlError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("duration_hr"));
    }

    #[tokio::test]
    async fn booking_start_must_be_strictly_future() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let now = Utc::now();

        // start_time == now is rejected.
        let err = service
            .create_booking_at(user.id, &booking_request(now, 2), now)
            .unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));

        // start_time == now + 1s is accepted.
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::seconds(1), 2), now)
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn booking_rejects_bad_memory_and_cpu() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let now = Utc::now();

        let mut request = booking_request(now + Duration::hours(1), 2);
        request.cpu = 17;
        request.memory = "4gb".into();
        let err = service
            .create_booking_at(user.id, &request, now)
            .unwrap_err();
        let ControlError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("cpu"));
        assert!(errors.contains_key("memory"));
    }

    #[tokio::test]
    async fn overlap_is_half_open() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let agent = service
            .store()
            .create_agent(agent_spec("rack", 8, 16, AgentStatus::Online))
            .unwrap();
        let now = Utc::now();
        let t10 = now + Duration::hours(10);
        let t12 = now + Duration::hours(12);

        // Approved booking [t10, t12).
        let held = service
            .create_booking_at(user.id, &booking_request(t10, 2), now)
            .unwrap();
        service.approve_booking(held.id, Some(agent.id)).await.unwrap();

        // [t11, t13) overlaps.
        let err = service
            .create_booking_at(
                user.id,
                &booking_request(now + Duration::hours(11), 2),
                now,
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::Overlap));

        // [t12, t14) touches the endpoint exactly; half-open, no overlap.
        let ok = service
            .create_booking_at(user.id, &booking_request(t12, 2), now)
            .unwrap();
        assert_eq!(ok.status, BookingStatus::Pending);

        // A pending booking does not block: only approved/active count.
        let ok = service
            .create_booking_at(
                user.id,
                &booking_request(t12 + Duration::hours(4), 2),
                now,
            )
            .unwrap();
        // Same window as the previous pending booking.
        let again = service
            .create_booking_at(
                user.id,
                &booking_request(t12 + Duration::hours(4), 2),
                now,
            )
            .unwrap();
        assert_ne!(ok.id, again.id);
    }

    #[tokio::test]
    async fn auto_selection_prefers_most_available_cpu() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let store = service.store();

        let _small = store
            .create_agent(agent_spec("small", 4, 16, AgentStatus::Online))
            .unwrap();
        let big = store
            .create_agent(agent_spec("big", 8, 16, AgentStatus::Online))
            .unwrap();
        // An offline giant must be ignored.
        store
            .create_agent(agent_spec("giant", 64, 128, AgentStatus::Offline))
            .unwrap();

        let now = Utc::now();
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();
        let approved = service.approve_booking(booking.id, None).await.unwrap();
        assert_eq!(approved.agent_id, Some(big.id));
        assert_eq!(approved.status, BookingStatus::Approved);
    }

    #[tokio::test]
    async fn auto_selection_tie_breaks_on_smallest_id() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let store = service.store();

        let first = store
            .create_agent(agent_spec("a", 8, 16, AgentStatus::Online))
            .unwrap();
        store
            .create_agent(agent_spec("b", 8, 16, AgentStatus::Online))
            .unwrap();

        let now = Utc::now();
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();
        let approved = service.approve_booking(booking.id, None).await.unwrap();
        assert_eq!(approved.agent_id, Some(first.id));
    }

    #[tokio::test]
    async fn auto_selection_requires_exact_fit_or_better() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let store = service.store();
        store
            .create_agent(agent_spec("tight", 2, 4, AgentStatus::Online))
            .unwrap();

        let now = Utc::now();
        // cpu=2/mem=4g exactly matches the agent's free capacity.
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();
        assert!(service.approve_booking(booking.id, None).await.is_ok());

        // A request for strictly more CPU finds nothing.
        let mut request = booking_request(now + Duration::hours(5), 2);
        request.cpu = 3;
        let booking = service
            .create_booking_at(user.id, &request, now)
            .unwrap();
        let err = service.approve_booking(booking.id, None).await.unwrap_err();
        assert!(matches!(err, ControlError::NoAvailableAgents));
    }

    #[tokio::test]
    async fn maintenance_agent_is_excluded_from_selection() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        service
            .store()
            .create_agent(agent_spec("parked", 8, 16, AgentStatus::Maintenance))
            .unwrap();

        let now = Utc::now();
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();
        let err = service.approve_booking(booking.id, None).await.unwrap_err();
        assert!(matches!(err, ControlError::NoAvailableAgents));

        // The booking stays pending.
        let row = service.store().get_booking(booking.id).unwrap().unwrap();
        assert_eq!(row.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn explicit_agent_must_be_online() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let agent = service
            .store()
            .create_agent(agent_spec("parked", 8, 16, AgentStatus::Maintenance))
            .unwrap();

        let now = Utc::now();
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();
        let err = service
            .approve_booking(booking.id, Some(agent.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::AgentNotAvailable(_)));
    }

    #[tokio::test]
    async fn double_approve_conflicts() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let agent = service
            .store()
            .create_agent(agent_spec("rack", 8, 16, AgentStatus::Online))
            .unwrap();

        let now = Utc::now();
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();
        service
            .approve_booking(booking.id, Some(agent.id))
            .await
            .unwrap();

        let err = service
            .approve_booking(booking.id, Some(agent.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::WrongStatus {
                action: "approve",
                found: BookingStatus::Approved
            }
        ));

        // Approval never debits capacity.
        let row = service.store().get_agent(agent.id).unwrap().unwrap();
        assert_eq!(row.available_cpu, 8);
    }

    #[tokio::test]
    async fn cancel_requires_ownership() {
        let (service, _dir) = setup();
        let user = register_student(&service).await;
        let stranger = service
            .register_user(RegisterRequest {
                name: "Bob Other".into(),
                email: "bob@test.com".into(),
                password: "pw123456".into(),
                role: None,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let booking = service
            .create_booking_at(user.id, &booking_request(now + Duration::hours(1), 2), now)
            .unwrap();

        let err = service
            .cancel_booking(stranger.id, booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::BookingNotFound(_)));

        let cancelled = service.cancel_booking(user.id, booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // Cancelling again conflicts.
        let err = service
            .cancel_booking(user.id, booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::WrongStatus { .. }));
    }
}
