//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//!
//! Read-modify-write operations (id assignment, guarded transitions, index
//! maintenance) serialize on a single write lock and commit through one
//! `WriteBatch`, so a booking transition and its coupled capacity change are
//! atomic. Plain reads never take the lock.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use labfleet_core::{AgentId, BookingId, UserId};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, counter};
use crate::types::{
    Agent, AgentStatus, Booking, BookingStatus, NewAgent, NewBooking, NewUser, StoreStats, User,
};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Allocate the next id from a meta counter. Caller must hold the
    /// write lock.
    fn next_id(&self, counter_key: &str) -> Result<u64> {
        let cf_meta = self.cf(cf::META)?;
        let current = self
            .db
            .get_cf(&cf_meta, counter_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| {
                let mut bytes = [0u8; 8];
                if data.len() == 8 {
                    bytes.copy_from_slice(&data);
                }
                u64::from_be_bytes(bytes)
            })
            .unwrap_or(0);

        let next = current + 1;
        self.db
            .put_cf(&cf_meta, counter_key, next.to_be_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(next)
    }

    /// Stage a booking write plus index maintenance into a batch.
    ///
    /// Index entries derived from the previously committed row are deleted
    /// before the new ones are written, so the time-ordered status indexes
    /// always reflect exactly one entry per booking.
    fn stage_booking(
        &self,
        batch: &mut WriteBatch,
        old: Option<&Booking>,
        new: &Booking,
    ) -> Result<()> {
        let cf_bookings = self.cf(cf::BOOKINGS)?;
        let cf_by_user = self.cf(cf::BOOKINGS_BY_USER)?;
        let cf_by_start = self.cf(cf::BOOKINGS_BY_STATUS_START)?;
        let cf_by_end = self.cf(cf::BOOKINGS_BY_STATUS_END)?;

        if let Some(old) = old {
            batch.delete_cf(
                &cf_by_start,
                keys::status_time_key(old.status.as_u8(), old.start_time, old.id),
            );
            batch.delete_cf(
                &cf_by_end,
                keys::status_time_key(old.status.as_u8(), old.end_time, old.id),
            );
        }

        batch.put_cf(
            &cf_bookings,
            keys::booking_key(new.id),
            Self::serialize(new)?,
        );
        batch.put_cf(&cf_by_user, keys::user_booking_key(new.user_id, new.id), []);
        batch.put_cf(
            &cf_by_start,
            keys::status_time_key(new.status.as_u8(), new.start_time, new.id),
            [],
        );
        batch.put_cf(
            &cf_by_end,
            keys::status_time_key(new.status.as_u8(), new.end_time, new.id),
            [],
        );
        Ok(())
    }

    /// Stage an agent write plus status index maintenance into a batch.
    fn stage_agent(
        &self,
        batch: &mut WriteBatch,
        old_status: Option<AgentStatus>,
        agent: &Agent,
    ) -> Result<()> {
        let cf_agents = self.cf(cf::AGENTS)?;
        let cf_by_status = self.cf(cf::AGENTS_BY_STATUS)?;

        if let Some(old) = old_status {
            if old != agent.status {
                batch.delete_cf(&cf_by_status, keys::status_agent_key(old.as_u8(), agent.id));
            }
        }

        batch.put_cf(&cf_agents, keys::agent_key(agent.id), Self::serialize(agent)?);
        batch.put_cf(
            &cf_by_status,
            keys::status_agent_key(agent.status.as_u8(), agent.id),
            [],
        );
        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn booking_or_not_found(&self, id: BookingId) -> Result<Booking> {
        self.get_booking(id)?.ok_or(StoreError::NotFound)
    }

    fn agent_or_not_found(&self, id: AgentId) -> Result<Agent> {
        self.get_agent(id)?.ok_or(StoreError::NotFound)
    }

    /// Scan a time-ordered status index, returning booking ids whose
    /// timestamp component lies in `(lower, upper]`. A `None` lower bound
    /// means unbounded below.
    fn scan_status_index(
        &self,
        cf_name: &str,
        status: BookingStatus,
        lower: Option<DateTime<Utc>>,
        upper: DateTime<Utc>,
    ) -> Result<Vec<BookingId>> {
        let cf_index = self.cf(cf_name)?;

        // Keys sort as (status, timestamp, id). Starting just past
        // (status, lower, MAX) skips everything at or before the lower
        // bound; stopping past (status, upper, MAX) keeps the upper bound
        // inclusive.
        let start = match lower {
            Some(ts) => keys::status_time_key(status.as_u8(), ts, BookingId::new(u64::MAX)),
            None => keys::status_prefix(status.as_u8()),
        };
        let stop = keys::status_time_key(status.as_u8(), upper, BookingId::new(u64::MAX));

        let mut ids = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&start, Direction::Forward));

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if key.first() != Some(&status.as_u8()) || key.as_ref() > stop.as_slice() {
                break;
            }
            if key.as_ref() == start.as_slice() {
                // The synthetic lower-bound key itself is excluded.
                continue;
            }
            ids.push(keys::booking_id_from_index_key(&key));
        }

        Ok(ids)
    }

    fn bookings_for_ids(&self, ids: &[BookingId]) -> Result<Vec<Booking>> {
        let mut bookings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(booking) = self.get_booking(*id)? {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }

    fn count_status_index(&self, cf_name: &str, prefix_byte: u8) -> Result<u64> {
        let cf_index = self.cf(cf_name)?;
        let prefix = keys::status_prefix(prefix_byte);

        let mut count = 0u64;
        let iter = self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if key.first() != Some(&prefix_byte) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn create_user(&self, new: NewUser) -> Result<User> {
        let _guard = self.write_lock.lock();

        let cf_by_email = self.cf(cf::USERS_BY_EMAIL)?;
        let email_key = keys::email_key(&new.email);

        let existing = self
            .db
            .get_cf(&cf_by_email, &email_key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(StoreError::EmailExists);
        }

        let id = UserId::new(self.next_id(counter::USER)?);
        let user = User {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            department: new.department,
            active: true,
            created_at: Utc::now(),
        };

        let cf_users = self.cf(cf::USERS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(id), Self::serialize(&user)?);
        batch.put_cf(&cf_by_email, &email_key, id.to_be_bytes());
        self.commit(batch)?;

        Ok(user)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let cf_users = self.cf(cf::USERS)?;
        self.db
            .get_cf(&cf_users, keys::user_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let cf_by_email = self.cf(cf::USERS_BY_EMAIL)?;
        let id = self
            .db
            .get_cf(&cf_by_email, keys::email_key(email))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match id {
            Some(data) if data.len() == 8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&data);
                self.get_user(UserId::new(u64::from_be_bytes(bytes)))
            }
            Some(_) => Err(StoreError::Database("corrupt email index entry".into())),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Agent Operations
    // =========================================================================

    fn create_agent(&self, new: NewAgent) -> Result<Agent> {
        let _guard = self.write_lock.lock();

        let id = AgentId::new(self.next_id(counter::AGENT)?);
        let now = Utc::now();
        let agent = Agent {
            id,
            name: new.name,
            ip: new.ip,
            mac: new.mac,
            port: new.port,
            wol_enabled: new.wol_enabled,
            status: new.status,
            last_seen: now,
            total_cpu: new.total_cpu,
            total_mem_gb: new.total_mem_gb,
            available_cpu: new.total_cpu,
            available_mem_gb: new.total_mem_gb,
            tags: new.tags,
            created_at: now,
        };

        let mut batch = WriteBatch::default();
        self.stage_agent(&mut batch, None, &agent)?;
        self.commit(batch)?;

        Ok(agent)
    }

    fn get_agent(&self, id: AgentId) -> Result<Option<Agent>> {
        let cf_agents = self.cf(cf::AGENTS)?;
        self.db
            .get_cf(&cf_agents, keys::agent_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_agents(&self) -> Result<Vec<Agent>> {
        let cf_agents = self.cf(cf::AGENTS)?;

        let mut agents = Vec::new();
        let iter = self.db.iterator_cf(&cf_agents, IteratorMode::Start);
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            agents.push(Self::deserialize::<Agent>(&value)?);
        }
        Ok(agents)
    }

    fn list_agents_by_status(&self, status: AgentStatus) -> Result<Vec<Agent>> {
        let cf_by_status = self.cf(cf::AGENTS_BY_STATUS)?;
        let prefix = keys::status_prefix(status.as_u8());

        let mut agents = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_by_status, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if key.first() != Some(&status.as_u8()) {
                break;
            }
            let agent_id = keys::agent_id_from_status_key(&key);
            if let Some(agent) = self.get_agent(agent_id)? {
                agents.push(agent);
            }
        }
        Ok(agents)
    }

    fn set_agent_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent> {
        let _guard = self.write_lock.lock();

        let mut agent = self.agent_or_not_found(id)?;
        let old_status = agent.status;
        agent.status = status;

        let mut batch = WriteBatch::default();
        self.stage_agent(&mut batch, Some(old_status), &agent)?;
        self.commit(batch)?;

        Ok(agent)
    }

    fn record_agent_health(&self, id: AgentId, healthy: bool, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut agent = self.agent_or_not_found(id)?;
        let old_status = agent.status;

        if healthy {
            agent.status = AgentStatus::Online;
            agent.last_seen = now;
        } else {
            agent.status = AgentStatus::Offline;
        }

        let mut batch = WriteBatch::default();
        self.stage_agent(&mut batch, Some(old_status), &agent)?;
        self.commit(batch)
    }

    // =========================================================================
    // Booking Operations
    // =========================================================================

    fn create_booking(&self, new: NewBooking, now: DateTime<Utc>) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let id = BookingId::new(self.next_id(counter::BOOKING)?);
        let booking = Booking {
            id,
            user_id: new.user_id,
            agent_id: None,
            cpu: new.cpu,
            memory: new.memory,
            mem_gb: new.mem_gb,
            image: new.image,
            start_time: new.start_time,
            end_time: new.end_time,
            status: BookingStatus::Pending,
            container_name: None,
            access_url: None,
            rejection_reason: None,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, None, &booking)?;
        self.commit(batch)?;

        Ok(booking)
    }

    fn get_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let cf_bookings = self.cf(cf::BOOKINGS)?;
        self.db
            .get_cf(&cf_bookings, keys::booking_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>> {
        let cf_bookings = self.cf(cf::BOOKINGS)?;

        let mut bookings = Vec::new();
        let iter = self.db.iterator_cf(&cf_bookings, IteratorMode::Start);
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let booking: Booking = Self::deserialize(&value)?;
            if status.map_or(true, |s| booking.status == s) {
                bookings.push(booking);
            }
        }

        // Ids are monotonic, so descending id order is creation order,
        // newest first.
        bookings.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(bookings)
    }

    fn list_bookings_by_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let cf_by_user = self.cf(cf::BOOKINGS_BY_USER)?;
        let prefix = keys::user_prefix(user_id);

        let mut ids = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(keys::booking_id_from_index_key(&key));
        }

        let mut bookings = self.bookings_for_ids(&ids)?;
        bookings.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(bookings)
    }

    fn bookings_in_states_for_user(
        &self,
        user_id: UserId,
        states: &[BookingStatus],
    ) -> Result<Vec<Booking>> {
        let all = self.list_bookings_by_user(user_id)?;
        Ok(all
            .into_iter()
            .filter(|b| states.contains(&b.status))
            .collect())
    }

    fn approved_starting_before(&self, ts: DateTime<Utc>) -> Result<Vec<Booking>> {
        let ids = self.scan_status_index(
            cf::BOOKINGS_BY_STATUS_START,
            BookingStatus::Approved,
            None,
            ts,
        )?;
        self.bookings_for_ids(&ids)
    }

    fn approved_starting_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let ids = self.scan_status_index(
            cf::BOOKINGS_BY_STATUS_START,
            BookingStatus::Approved,
            Some(from),
            to,
        )?;
        self.bookings_for_ids(&ids)
    }

    fn active_ending_before(&self, ts: DateTime<Utc>) -> Result<Vec<Booking>> {
        let ids = self.scan_status_index(
            cf::BOOKINGS_BY_STATUS_END,
            BookingStatus::Active,
            None,
            ts,
        )?;
        self.bookings_for_ids(&ids)
    }

    fn active_bookings_on_agent(&self, agent_id: AgentId) -> Result<Vec<Booking>> {
        let far_future = Utc::now() + Duration::days(365 * 100);
        let ids = self.scan_status_index(
            cf::BOOKINGS_BY_STATUS_END,
            BookingStatus::Active,
            None,
            far_future,
        )?;
        let bookings = self.bookings_for_ids(&ids)?;
        Ok(bookings
            .into_iter()
            .filter(|b| b.agent_id == Some(agent_id))
            .collect())
    }

    // =========================================================================
    // Guarded Transitions
    // =========================================================================

    fn approve_booking(
        &self,
        id: BookingId,
        agent_id: AgentId,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let old = self.booking_or_not_found(id)?;
        if old.status != BookingStatus::Pending {
            return Err(StoreError::WrongStatus { found: old.status });
        }

        let mut booking = old.clone();
        booking.status = BookingStatus::Approved;
        booking.agent_id = Some(agent_id);
        booking.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, Some(&old), &booking)?;
        self.commit(batch)?;

        Ok(booking)
    }

    fn reject_booking(&self, id: BookingId, reason: &str, now: DateTime<Utc>) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let old = self.booking_or_not_found(id)?;
        if old.status != BookingStatus::Pending {
            return Err(StoreError::WrongStatus { found: old.status });
        }

        let mut booking = old.clone();
        booking.status = BookingStatus::Rejected;
        booking.rejection_reason = Some(reason.to_string());
        booking.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, Some(&old), &booking)?;
        self.commit(batch)?;

        Ok(booking)
    }

    fn cancel_booking(&self, id: BookingId, now: DateTime<Utc>) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let old = self.booking_or_not_found(id)?;
        if !matches!(
            old.status,
            BookingStatus::Pending | BookingStatus::Approved
        ) {
            return Err(StoreError::WrongStatus { found: old.status });
        }

        let mut booking = old.clone();
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, Some(&old), &booking)?;
        self.commit(batch)?;

        Ok(booking)
    }

    fn extend_booking(&self, id: BookingId, hours: u32, now: DateTime<Utc>) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let old = self.booking_or_not_found(id)?;
        if old.status != BookingStatus::Active {
            return Err(StoreError::WrongStatus { found: old.status });
        }

        let mut booking = old.clone();
        booking.end_time = old.end_time + Duration::hours(i64::from(hours));
        booking.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, Some(&old), &booking)?;
        self.commit(batch)?;

        Ok(booking)
    }

    fn activate_booking(
        &self,
        id: BookingId,
        container_name: &str,
        access_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let old = self.booking_or_not_found(id)?;
        if old.status != BookingStatus::Approved {
            return Err(StoreError::WrongStatus { found: old.status });
        }

        let agent_id = old
            .agent_id
            .ok_or_else(|| StoreError::Database("approved booking has no agent".into()))?;
        let mut agent = self.agent_or_not_found(agent_id)?;

        agent.available_cpu = agent
            .available_cpu
            .checked_sub(old.cpu)
            .ok_or(StoreError::InsufficientCapacity)?;
        agent.available_mem_gb = agent
            .available_mem_gb
            .checked_sub(old.mem_gb)
            .ok_or(StoreError::InsufficientCapacity)?;

        let mut booking = old.clone();
        booking.status = BookingStatus::Active;
        booking.container_name = Some(container_name.to_string());
        booking.access_url = Some(access_url.to_string());
        booking.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, Some(&old), &booking)?;
        self.stage_agent(&mut batch, Some(agent.status), &agent)?;
        self.commit(batch)?;

        Ok(booking)
    }

    fn complete_booking(&self, id: BookingId, now: DateTime<Utc>) -> Result<Booking> {
        let _guard = self.write_lock.lock();

        let old = self.booking_or_not_found(id)?;
        if old.status != BookingStatus::Active {
            return Err(StoreError::WrongStatus { found: old.status });
        }

        let mut booking = old.clone();
        booking.status = BookingStatus::Completed;
        booking.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_booking(&mut batch, Some(&old), &booking)?;

        // Credit capacity back, clamped to totals so an admin-driven
        // capacity shrink cannot push available above total.
        if let Some(agent_id) = old.agent_id {
            if let Some(mut agent) = self.get_agent(agent_id)? {
                agent.available_cpu = agent.total_cpu.min(agent.available_cpu + old.cpu);
                agent.available_mem_gb =
                    agent.total_mem_gb.min(agent.available_mem_gb + old.mem_gb);
                self.stage_agent(&mut batch, Some(agent.status), &agent)?;
            } else {
                tracing::warn!(
                    booking_id = %id,
                    agent_id = %agent_id,
                    "completing booking whose agent row is missing, capacity not credited"
                );
            }
        }

        self.commit(batch)?;
        Ok(booking)
    }

    // =========================================================================
    // Stats
    // =========================================================================

    fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for status in BookingStatus::all() {
            let count =
                self.count_status_index(cf::BOOKINGS_BY_STATUS_START, status.as_u8())?;
            stats.total_bookings += count;
            match status {
                BookingStatus::Pending => stats.pending = count,
                BookingStatus::Approved => stats.approved = count,
                BookingStatus::Rejected => stats.rejected = count,
                BookingStatus::Active => stats.active = count,
                BookingStatus::Completed => stats.completed = count,
                BookingStatus::Cancelled => stats.cancelled = count,
            }
        }
        stats.online_agents =
            self.count_status_index(cf::AGENTS_BY_STATUS, AgentStatus::Online.as_u8())?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn test_agent_spec() -> NewAgent {
        NewAgent {
            name: "rack-1".into(),
            ip: "10.0.0.5".into(),
            mac: Some("00:11:22:33:44:55".into()),
            port: 5000,
            wol_enabled: true,
            status: AgentStatus::Online,
            total_cpu: 8,
            total_mem_gb: 16,
            tags: BTreeSet::new(),
        }
    }

    fn test_booking_spec(user_id: UserId, start_h: u32, end_h: u32) -> NewBooking {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        NewBooking {
            user_id,
            cpu: 2,
            memory: "4g".into(),
            mem_gb: 4,
            image: "jupyter/notebook".into(),
            start_time: base + Duration::hours(i64::from(start_h)),
            end_time: base + Duration::hours(i64::from(end_h)),
            notes: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap()
    }

    #[test]
    fn user_email_uniqueness() {
        let (store, _dir) = create_test_store();
        let new = NewUser {
            name: "Alice".into(),
            email: "alice@x".into(),
            password_hash: "h".into(),
            role: Role::Student,
            department: "General".into(),
        };

        let user = store.create_user(new.clone()).unwrap();
        assert_eq!(user.id.as_u64(), 1);
        assert!(user.active);

        let err = store.create_user(new).unwrap_err();
        assert!(matches!(err, StoreError::EmailExists));

        let found = store.find_user_by_email("alice@x").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(store.find_user_by_email("bob@x").unwrap().is_none());
    }

    #[test]
    fn booking_listing_is_newest_first() {
        let (store, _dir) = create_test_store();
        let user = UserId::new(1);

        let first = store
            .create_booking(test_booking_spec(user, 1, 2), now())
            .unwrap();
        let second = store
            .create_booking(test_booking_spec(user, 3, 4), now())
            .unwrap();

        let listed = store.list_bookings_by_user(user).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        let all = store.list_bookings(None).unwrap();
        assert_eq!(all[0].id, second.id);
    }

    #[test]
    fn approve_guard_rejects_second_approval() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let booking = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();

        let approved = store.approve_booking(booking.id, agent.id, now()).unwrap();
        assert_eq!(approved.status, BookingStatus::Approved);
        assert_eq!(approved.agent_id, Some(agent.id));

        // Approval alone never debits capacity.
        let agent = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent.available_cpu, 8);
        assert_eq!(agent.available_mem_gb, 16);

        let err = store.approve_booking(booking.id, agent.id, now()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongStatus {
                found: BookingStatus::Approved
            }
        ));
    }

    #[test]
    fn activate_debits_capacity_exactly_once() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let booking = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();
        store.approve_booking(booking.id, agent.id, now()).unwrap();

        let active = store
            .activate_booking(booking.id, "compute_1_42042", "http://agent:8001", now())
            .unwrap();
        assert_eq!(active.status, BookingStatus::Active);
        assert_eq!(active.container_name.as_deref(), Some("compute_1_42042"));
        assert_eq!(active.access_url.as_deref(), Some("http://agent:8001"));

        let agent_row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent_row.available_cpu, 6);
        assert_eq!(agent_row.available_mem_gb, 12);

        // A retried activation (lost 200) must not debit again.
        let err = store
            .activate_booking(booking.id, "compute_1_42042", "http://agent:8001", now())
            .unwrap_err();
        assert!(matches!(err, StoreError::WrongStatus { .. }));
        let agent_row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent_row.available_cpu, 6);
        assert_eq!(agent_row.available_mem_gb, 12);
    }

    #[test]
    fn activate_after_cancel_is_refused() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let booking = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();
        store.approve_booking(booking.id, agent.id, now()).unwrap();
        store.cancel_booking(booking.id, now()).unwrap();

        let err = store
            .activate_booking(booking.id, "compute_1_1", "http://agent:8001", now())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongStatus {
                found: BookingStatus::Cancelled
            }
        ));

        let agent_row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent_row.available_cpu, 8);
    }

    #[test]
    fn activate_refuses_overcommit() {
        let (store, _dir) = create_test_store();
        let mut spec = test_agent_spec();
        spec.total_cpu = 1;
        let agent = store.create_agent(spec).unwrap();
        let booking = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();
        store.approve_booking(booking.id, agent.id, now()).unwrap();

        let err = store
            .activate_booking(booking.id, "c", "u", now())
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientCapacity));

        // Nothing committed: booking still approved, capacity untouched.
        let booking = store.get_booking(booking.id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Approved);
        let agent_row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent_row.available_cpu, 1);
    }

    #[test]
    fn complete_credits_capacity_once_and_clamps() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let booking = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();
        store.approve_booking(booking.id, agent.id, now()).unwrap();
        store
            .activate_booking(booking.id, "c", "u", now())
            .unwrap();

        let completed = store.complete_booking(booking.id, now()).unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        let agent_row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent_row.available_cpu, 8);
        assert_eq!(agent_row.available_mem_gb, 16);

        // Stop-then-stop: the second completion is a status conflict and
        // must not credit again.
        let err = store.complete_booking(booking.id, now()).unwrap_err();
        assert!(matches!(err, StoreError::WrongStatus { .. }));
        let agent_row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(agent_row.available_cpu, 8);
    }

    #[test]
    fn phase_selectors_respect_time_bounds() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let user = UserId::new(1);
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        // Starts at base+1h, base+3h, base+20h; all approved.
        for (s, e) in [(1, 2), (3, 5), (20, 22)] {
            let b = store
                .create_booking(test_booking_spec(user, s, e), now())
                .unwrap();
            store.approve_booking(b.id, agent.id, now()).unwrap();
        }
        // A pending booking must not be selected.
        store
            .create_booking(test_booking_spec(user, 1, 2), now())
            .unwrap();

        let due = store
            .approved_starting_before(base + Duration::hours(3))
            .unwrap();
        assert_eq!(due.len(), 2);

        // Pre-wake window (base+2h, base+4h]: only the base+3h booking.
        let wake = store
            .approved_starting_within(base + Duration::hours(2), base + Duration::hours(4))
            .unwrap();
        assert_eq!(wake.len(), 1);
        assert_eq!(wake[0].start_time, base + Duration::hours(3));

        // Window lower bound is exclusive: a booking starting exactly at
        // `from` is not pre-woken (it is already due to start).
        let wake = store
            .approved_starting_within(base + Duration::hours(3), base + Duration::hours(4))
            .unwrap();
        assert!(wake.is_empty());
    }

    #[test]
    fn stop_selector_finds_expired_active() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let b = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();
        store.approve_booking(b.id, agent.id, now()).unwrap();
        store.activate_booking(b.id, "c", "u", now()).unwrap();

        assert!(store
            .active_ending_before(base + Duration::hours(1))
            .unwrap()
            .is_empty());
        let expired = store
            .active_ending_before(base + Duration::hours(2))
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, b.id);

        let on_agent = store.active_bookings_on_agent(agent.id).unwrap();
        assert_eq!(on_agent.len(), 1);
    }

    #[test]
    fn extend_pushes_end_time() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let b = store
            .create_booking(test_booking_spec(UserId::new(1), 1, 2), now())
            .unwrap();
        store.approve_booking(b.id, agent.id, now()).unwrap();

        // Only active bookings may be extended.
        let err = store.extend_booking(b.id, 2, now()).unwrap_err();
        assert!(matches!(err, StoreError::WrongStatus { .. }));

        store.activate_booking(b.id, "c", "u", now()).unwrap();
        let extended = store.extend_booking(b.id, 2, now()).unwrap();
        assert_eq!(extended.end_time, b.end_time + Duration::hours(2));

        // The end-time index moved with the row.
        let expired = store.active_ending_before(b.end_time).unwrap();
        assert!(expired.is_empty());
        let expired = store
            .active_ending_before(b.end_time + Duration::hours(2))
            .unwrap();
        assert_eq!(expired.len(), 1);
    }

    #[test]
    fn health_recording_touches_last_seen_only_when_online() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();

        let t1 = now();
        store.record_agent_health(agent.id, true, t1).unwrap();
        let row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(row.status, AgentStatus::Online);
        assert_eq!(row.last_seen, t1);

        let t2 = t1 + Duration::minutes(1);
        store.record_agent_health(agent.id, false, t2).unwrap();
        let row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(row.status, AgentStatus::Offline);
        assert_eq!(row.last_seen, t1);

        let t3 = t2 + Duration::minutes(1);
        store.record_agent_health(agent.id, true, t3).unwrap();
        let row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(row.status, AgentStatus::Online);
        assert_eq!(row.last_seen, t3);
    }

    #[test]
    fn health_overwrites_maintenance() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        store
            .set_agent_status(agent.id, AgentStatus::Maintenance)
            .unwrap();

        store.record_agent_health(agent.id, true, now()).unwrap();
        let row = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(row.status, AgentStatus::Online);
    }

    #[test]
    fn status_index_follows_admin_override() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();

        assert_eq!(store.list_agents_by_status(AgentStatus::Online).unwrap().len(), 1);

        store
            .set_agent_status(agent.id, AgentStatus::Maintenance)
            .unwrap();
        assert!(store.list_agents_by_status(AgentStatus::Online).unwrap().is_empty());
        assert_eq!(
            store
                .list_agents_by_status(AgentStatus::Maintenance)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn stats_snapshot() {
        let (store, _dir) = create_test_store();
        let agent = store.create_agent(test_agent_spec()).unwrap();
        let user = UserId::new(1);

        let b1 = store
            .create_booking(test_booking_spec(user, 1, 2), now())
            .unwrap();
        let b2 = store
            .create_booking(test_booking_spec(user, 3, 4), now())
            .unwrap();
        store.approve_booking(b1.id, agent.id, now()).unwrap();
        store.activate_booking(b1.id, "c", "u", now()).unwrap();
        store.reject_booking(b2.id, "no", now()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_bookings, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.online_agents, 1);
    }
}
