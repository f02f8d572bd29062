//! The firewall engine: interception decisions, the layered hold chain,
//! release/unlock/bypass operations, and housekeeping sweeps.
//!
//! One engine instance owns all mutable state behind a single coarse lock
//! (`GuardState`). Detector callbacks, UI-triggered operations, and the
//! housekeeping timer all funnel through it; spooler I/O always happens
//! outside the lock so a slow spooler never stalls detection.

use crate::config::Config;
use crate::engine::events::EngineEvent;
use crate::error::{EngineError, EngineResult};
use crate::model::{BlockedJobRecord, DetectionOrigin, HoldKind, JobKey, ObservedJob};
use crate::spool::QueueControl;
use crate::ttl::ExpiringMap;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Debounce window: a processed job key is not re-evaluated for this long.
const SEEN_TTL: Duration = Duration::from_secs(15 * 60);
/// Released jobs often re-surface transiently; ignore them this long.
const RELEASED_TTL: Duration = Duration::from_secs(5 * 60);
/// Grace window for a job admitted through a bypass token.
const ALLOWED_TTL: Duration = Duration::from_secs(2 * 60);
/// Default lifetime of a single-print bypass token.
const BYPASS_TTL: Duration = Duration::from_secs(2 * 60);

/// Outcome of a failed unlock attempt against a held job.
#[derive(Debug, Clone, Copy)]
pub struct FailedUnlock {
    /// The job was canceled because it hit the failure threshold.
    pub canceled: bool,
    /// Failure count after this attempt (0 for queue-fallback holds,
    /// which are never escalated).
    pub failures: u32,
    /// Configured threshold, 0 when the policy is disabled.
    pub threshold: u32,
}

/// Counters for diagnostics and the UI status surface.
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub held: usize,
    pub queues_paused: usize,
    pub seen: usize,
    pub recently_released: usize,
    pub recently_allowed: usize,
    pub bypass_tokens: usize,
}

/// Policy knobs derived from [`Config`], swapped atomically on a settings
/// change.
#[derive(Debug, Clone)]
struct EngineSettings {
    protect_all: bool,
    /// Normalized (uppercased) printer keys, used when `protect_all` is off.
    printers: HashSet<String>,
    cancel_on_pause_failure: bool,
    auto_cancel_after: Option<Duration>,
    cancel_after_failed_unlocks: Option<u32>,
    unlock_duration: Duration,
}

impl EngineSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            protect_all: config.protection.protect_all,
            printers: config
                .protection
                .printers
                .iter()
                .map(|p| p.to_uppercase())
                .collect(),
            cancel_on_pause_failure: config.policy.cancel_on_pause_failure,
            auto_cancel_after: config
                .policy
                .auto_cancel_enabled
                .then(|| Duration::from_secs(config.policy.auto_cancel_minutes * 60)),
            cancel_after_failed_unlocks: config
                .policy
                .cancel_after_failed_unlocks
                .then_some(config.policy.failed_unlock_threshold),
            unlock_duration: Duration::from_secs(config.policy.unlock_minutes * 60),
        }
    }

    fn covers(&self, printer_key: &str) -> bool {
        self.protect_all || self.printers.contains(printer_key)
    }
}

/// All mutable engine state, guarded by one lock.
#[derive(Debug)]
struct GuardState {
    enabled: bool,
    /// Global unlock window; no interception while now < this.
    unlock_until: Option<Instant>,
    /// Held jobs keyed by composite job key.
    blocked: HashMap<String, BlockedJobRecord>,
    seen: ExpiringMap<String>,
    recently_released: ExpiringMap<String>,
    recently_allowed: ExpiringMap<String>,
    /// One-shot bypass tokens keyed by normalized printer key.
    single_print_bypass: ExpiringMap<String>,
    /// Printers held via whole-queue pause: normalized key -> raw name.
    queue_paused: HashMap<String, String>,
}

impl GuardState {
    fn unlock_active(&self) -> bool {
        self.unlock_until
            .is_some_and(|until| Instant::now() < until)
    }

    fn unlock_remaining_secs(&self) -> Option<u64> {
        self.unlock_until.and_then(|until| {
            let now = Instant::now();
            (now < until).then(|| (until - now).as_secs().max(1))
        })
    }
}

/// What the decision logic concluded about one observation.
enum Verdict {
    Ignored(&'static str),
    Bypassed,
    Refreshed,
    Hold,
}

/// The print-job interception and release engine.
pub struct FirewallEngine {
    port: Arc<dyn QueueControl>,
    settings: RwLock<EngineSettings>,
    state: Mutex<GuardState>,
    events: broadcast::Sender<EngineEvent>,
}

impl FirewallEngine {
    pub fn new(port: Arc<dyn QueueControl>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            port,
            settings: RwLock::new(EngineSettings::from_config(config)),
            state: Mutex::new(GuardState {
                enabled: config.protection.enabled,
                unlock_until: None,
                blocked: HashMap::new(),
                seen: ExpiringMap::new(),
                recently_released: ExpiringMap::new(),
                recently_allowed: ExpiringMap::new(),
                single_print_bypass: ExpiringMap::new(),
                queue_paused: HashMap::new(),
            }),
            events,
        }
    }

    /// Subscribe to engine → UI events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Startup pass: re-secure jobs left in the spooler by a previous
    /// session, without raising UI prompts.
    pub async fn start(&self, reassert: bool) {
        if !self.is_enabled() {
            info!("protection disabled at startup");
            return;
        }
        if !reassert {
            return;
        }
        match self.port.list_current_jobs().await {
            Ok(jobs) => {
                info!(count = jobs.len(), "re-scanning spooler for leftover jobs");
                for job in jobs {
                    self.process(job.into_observed(DetectionOrigin::Reassert), false)
                        .await;
                }
            }
            Err(e) => warn!(error = %e, "startup re-scan failed"),
        }
    }

    /// Entry point for detection sources.
    pub async fn handle_observation(&self, job: ObservedJob) {
        self.process(job, true).await;
    }

    async fn process(&self, job: ObservedJob, announce: bool) {
        let composite = job.key.composite();
        let printer_key = job.key.printer_key();

        // Decision runs under the state lock; any spooler I/O comes after.
        let verdict = {
            let settings = self.settings.read();
            let mut st = self.state.lock();
            if !st.enabled {
                Verdict::Ignored("protection disabled")
            } else if st.unlock_active() {
                Verdict::Ignored("global unlock window active")
            } else if !settings.covers(&printer_key) {
                Verdict::Ignored("printer not protected")
            } else if st.recently_allowed.contains_live(&composite) {
                Verdict::Ignored("job pre-authorized")
            } else if st.single_print_bypass.consume(&printer_key) {
                // One-shot: re-detections of this same job within the
                // grace window are skipped silently.
                st.recently_allowed.insert(composite.clone(), ALLOWED_TTL);
                Verdict::Bypassed
            } else if let Some(record) = st.blocked.get_mut(&composite) {
                record.last_seen = Utc::now();
                Verdict::Refreshed
            } else if st.queue_paused.contains_key(&printer_key) {
                Verdict::Ignored("queue already held")
            } else if st.recently_released.contains_live(&composite) {
                Verdict::Ignored("recently released")
            } else if st.seen.contains_live(&composite) {
                Verdict::Ignored("within debounce window")
            } else {
                st.seen.insert(composite.clone(), SEEN_TTL);
                Verdict::Hold
            }
        };

        match verdict {
            Verdict::Ignored(reason) => {
                debug!(job = %job.key, source = job.origin.name(), reason, "observation ignored");
            }
            Verdict::Bypassed => {
                info!(job = %job.key, "single-print bypass consumed, job passes unheld");
            }
            Verdict::Refreshed => {
                debug!(job = %job.key, "held job re-observed");
            }
            Verdict::Hold => self.hold(job, announce).await,
        }
    }

    /// The fallback hold chain: per-job pause, then whole-queue pause,
    /// then cancel (policy) or nothing. First success short-circuits.
    async fn hold(&self, job: ObservedJob, announce: bool) {
        let key = job.key.clone();

        let reply = self.port.pause_job(&key).await;
        let kind = if reply.ok {
            HoldKind::PerJob
        } else {
            warn!(job = %key, error = %reply.message, "per-job pause failed, trying queue pause");
            let qreply = self.port.pause_queue(&key.printer).await;
            if qreply.ok {
                HoldKind::QueueFallback
            } else {
                warn!(printer = %key.printer, error = %qreply.message, "queue pause failed");
                if self.settings.read().cancel_on_pause_failure {
                    let creply = self.port.cancel_job(&key).await;
                    if !creply.ok {
                        warn!(job = %key, error = %creply.message, "cancel fallback failed");
                    }
                    HoldKind::CanceledFallback
                } else {
                    HoldKind::PauseUnavailable
                }
            }
        };

        // Protection may have been disabled (or an unlock window opened)
        // while the spooler call was in flight; the bulk release that ran
        // then could not see this hold, so committing it now would leave a
        // paused job behind with protection off.
        let committed = {
            let mut st = self.state.lock();
            if !st.enabled || st.unlock_active() {
                st.seen.remove(&key.composite());
                false
            } else {
                match kind {
                    HoldKind::PerJob => {
                        st.blocked
                            .insert(key.composite(), BlockedJobRecord::new(job.clone(), false));
                    }
                    HoldKind::QueueFallback => {
                        st.blocked
                            .insert(key.composite(), BlockedJobRecord::new(job.clone(), true));
                        st.queue_paused.insert(key.printer_key(), key.printer.clone());
                    }
                    HoldKind::CanceledFallback => {
                        // Authorize-next-print: the resubmission passes unheld.
                        st.single_print_bypass.insert(key.printer_key(), BYPASS_TTL);
                    }
                    HoldKind::PauseUnavailable => {}
                }
                true
            }
        };

        if !committed {
            match kind {
                HoldKind::PerJob => {
                    let reply = self.port.resume_job(&key).await;
                    if !reply.ok {
                        warn!(job = %key, error = %reply.message, "compensating resume failed");
                    }
                }
                HoldKind::QueueFallback => {
                    let reply = self.port.resume_queue(&key.printer).await;
                    if !reply.ok {
                        warn!(printer = %key.printer, error = %reply.message, "compensating queue resume failed");
                    }
                }
                HoldKind::CanceledFallback | HoldKind::PauseUnavailable => {}
            }
            info!(job = %key, "hold abandoned, protection state changed mid-flight");
            return;
        }

        match kind {
            HoldKind::PerJob => info!(job = %key, "job held"),
            HoldKind::QueueFallback => {
                info!(job = %key, printer = %key.printer, "whole queue paused to hold job");
            }
            HoldKind::CanceledFallback => {
                warn!(job = %key, "job canceled, next submission on printer pre-authorized");
            }
            HoldKind::PauseUnavailable => {
                // Nothing is holding the job: it will print even though an
                // authorization prompt is raised. Preserved upstream
                // behavior; see the security note in the README.
                warn!(job = %key, "no hold path available, job will print");
            }
        }

        if announce {
            let _ = self.events.send(EngineEvent::JobBlocked { job, kind });
        }
    }

    /// Release one held job. A queue-fallback record releases the whole
    /// queue and every record sharing that printer's fallback.
    pub async fn release_job(&self, key: &JobKey) -> EngineResult<()> {
        let composite = key.composite();
        let record = self.state.lock().blocked.get(&composite).cloned();
        let Some(record) = record else {
            return Err(EngineError::NotHeld(key.to_string()));
        };

        if record.queue_fallback {
            return self.release_queue_fallback(&record.job.key).await;
        }

        let reply = self.port.resume_job(key).await;
        if !reply.ok {
            return Err(EngineError::Port(reply.message));
        }
        let mut st = self.state.lock();
        st.blocked.remove(&composite);
        st.recently_released.insert(composite, RELEASED_TTL);
        info!(job = %key, "job released");
        Ok(())
    }

    async fn release_queue_fallback(&self, key: &JobKey) -> EngineResult<()> {
        let printer_key = key.printer_key();
        let reply = self.port.resume_queue(&key.printer).await;
        if !reply.ok {
            return Err(EngineError::Port(reply.message));
        }
        let mut st = self.state.lock();
        let members: Vec<String> = st
            .blocked
            .iter()
            .filter(|(_, r)| r.queue_fallback && r.job.key.printer_key() == printer_key)
            .map(|(k, _)| k.clone())
            .collect();
        let released = members.len();
        for member in members {
            st.blocked.remove(&member);
            st.recently_released.insert(member, RELEASED_TTL);
        }
        st.queue_paused.remove(&printer_key);
        info!(printer = %key.printer, released, "queue resumed, fallback holds cleared");
        Ok(())
    }

    /// Open the global unlock window (configured default when `None`) and
    /// release everything currently held.
    pub async fn unlock_for(&self, duration: Option<Duration>) {
        let duration = duration.unwrap_or_else(|| self.settings.read().unlock_duration);
        {
            self.state.lock().unlock_until = Some(Instant::now() + duration);
        }
        self.release_everything().await;
        self.emit_state_changed();
        info!(secs = duration.as_secs(), "global unlock window opened");
    }

    /// Grant exactly one future job on `printer` an automatic pass.
    pub fn arm_single_print_bypass(&self, printer: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(BYPASS_TTL);
        self.state
            .lock()
            .single_print_bypass
            .insert(printer.to_uppercase(), ttl);
        info!(printer, secs = ttl.as_secs(), "single-print bypass armed");
    }

    /// Toggle protection. Disabling clears all bypass/allow state and
    /// releases everything held.
    pub async fn set_enabled(&self, enabled: bool) {
        {
            let mut st = self.state.lock();
            st.enabled = enabled;
            if !enabled {
                st.single_print_bypass.clear();
                st.recently_allowed.clear();
                st.unlock_until = None;
            }
        }
        if !enabled {
            self.release_everything().await;
        }
        self.emit_state_changed();
        info!(enabled, "protection toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Record a wrong-password attempt against a held job, canceling it
    /// once the configured threshold is reached. Queue-fallback holds are
    /// never escalated: canceling would affect unrelated jobs.
    pub async fn record_failed_unlock(&self, key: &JobKey) -> FailedUnlock {
        let composite = key.composite();
        let threshold_opt = self.settings.read().cancel_after_failed_unlocks;
        let threshold = threshold_opt.unwrap_or(0);

        let (failures, should_cancel) = {
            let mut st = self.state.lock();
            match st.blocked.get_mut(&composite) {
                Some(record) if !record.queue_fallback => {
                    record.failed_unlocks += 1;
                    let hit = threshold_opt.is_some_and(|t| record.failed_unlocks >= t);
                    (record.failed_unlocks, hit)
                }
                _ => (0, false),
            }
        };

        let mut canceled = false;
        if should_cancel {
            let reply = self.port.cancel_job(key).await;
            if !reply.ok {
                warn!(job = %key, error = %reply.message, "escalation cancel failed");
            }
            self.state.lock().blocked.remove(&composite);
            canceled = true;
            warn!(job = %key, failures, "job canceled after repeated failed unlock attempts");
        }

        FailedUnlock {
            canceled,
            failures,
            threshold,
        }
    }

    /// Bulk release of every held job and paused queue. Best-effort: port
    /// failures are logged and the bookkeeping is cleared regardless.
    async fn release_everything(&self) {
        let (queues, jobs) = {
            let st = self.state.lock();
            let queues: Vec<String> = st.queue_paused.values().cloned().collect();
            let jobs: Vec<JobKey> = st
                .blocked
                .values()
                .filter(|r| !r.queue_fallback)
                .map(|r| r.job.key.clone())
                .collect();
            (queues, jobs)
        };

        for printer in &queues {
            let reply = self.port.resume_queue(printer).await;
            if !reply.ok {
                warn!(printer = %printer, error = %reply.message, "queue resume failed during bulk release");
            }
        }
        for key in &jobs {
            let reply = self.port.resume_job(key).await;
            if !reply.ok {
                warn!(job = %key, error = %reply.message, "job resume failed during bulk release");
            }
        }

        let mut st = self.state.lock();
        let keys: Vec<String> = st.blocked.keys().cloned().collect();
        let released = keys.len();
        for key in keys {
            st.blocked.remove(&key);
            st.recently_released.insert(key, RELEASED_TTL);
        }
        st.queue_paused.clear();
        if released > 0 {
            info!(released, "all held jobs released");
        }
    }

    /// One housekeeping pass: sweep TTL maps, reconcile held records
    /// against the spooler, auto-cancel overdue holds. The three sweeps
    /// are independent and order-insensitive.
    pub async fn run_housekeeping(&self) {
        {
            let mut st = self.state.lock();
            let removed = st.seen.sweep()
                + st.recently_released.sweep()
                + st.recently_allowed.sweep()
                + st.single_print_bypass.sweep();
            if removed > 0 {
                debug!(removed, "expired window entries swept");
            }
        }

        // The operator may have canceled held jobs from elsewhere.
        let held: Vec<JobKey> = {
            self.state
                .lock()
                .blocked
                .values()
                .filter(|r| !r.queue_fallback)
                .map(|r| r.job.key.clone())
                .collect()
        };
        for key in held {
            if !self.port.job_exists(&key).await
                && self.state.lock().blocked.remove(&key.composite()).is_some()
            {
                info!(job = %key, "held job vanished from spooler, record dropped");
            }
        }

        let max_age = self.settings.read().auto_cancel_after;
        if let Some(max_age) = max_age {
            let now = Utc::now();
            let overdue: Vec<JobKey> = {
                self.state
                    .lock()
                    .blocked
                    .values()
                    .filter(|r| {
                        !r.queue_fallback
                            && (now - r.blocked_at).num_seconds() >= max_age.as_secs() as i64
                    })
                    .map(|r| r.job.key.clone())
                    .collect()
            };
            for key in overdue {
                let reply = self.port.cancel_job(&key).await;
                if !reply.ok {
                    warn!(job = %key, error = %reply.message, "auto-cancel failed");
                }
                self.state.lock().blocked.remove(&key.composite());
                warn!(job = %key, "held job auto-canceled after timeout");
            }
        }
    }

    /// Swap in new policy settings (UI settings change).
    pub fn update_settings(&self, config: &Config) {
        *self.settings.write() = EngineSettings::from_config(config);
        debug!("engine settings updated");
    }

    pub fn held_snapshot(&self) -> Vec<BlockedJobRecord> {
        self.state.lock().blocked.values().cloned().collect()
    }

    pub fn is_held(&self, key: &JobKey) -> bool {
        self.state.lock().blocked.contains_key(&key.composite())
    }

    pub fn was_recently_released(&self, key: &JobKey) -> bool {
        self.state
            .lock()
            .recently_released
            .contains_live(&key.composite())
    }

    pub fn stats(&self) -> EngineStats {
        let st = self.state.lock();
        EngineStats {
            held: st.blocked.len(),
            queues_paused: st.queue_paused.len(),
            seen: st.seen.len(),
            recently_released: st.recently_released.len(),
            recently_allowed: st.recently_allowed.len(),
            bypass_tokens: st.single_print_bypass.len(),
        }
    }

    fn emit_state_changed(&self) {
        let (enabled, unlock_remaining_secs) = {
            let st = self.state.lock();
            (st.enabled, st.unlock_remaining_secs())
        };
        let _ = self.events.send(EngineEvent::StateChanged {
            enabled,
            unlock_remaining_secs,
        });
    }
}
