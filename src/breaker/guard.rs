//! The circuit breaker guard.
//!
//! [`CircuitBreaker::call`] wraps one protected operation: it loads the
//! record for the system, decides whether the call may run, races the
//! operation against the policy's timeout and writes the updated record
//! back. Nothing is cached between calls; the store is the only shared state.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::BreakerError;
use super::fallback::{Fallback, FallbackFn};
use super::record::{BreakerSettings, CircuitBreakerRecord, CircuitState};
use super::store::StateStore;
use crate::clock::{Clock, SystemClock};

/// Deadline applied to a guarded call when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-call-site configuration of a guarded call.
///
/// ```rust
/// use floodgate::{BreakerSettings, GuardPolicy};
/// use std::time::Duration;
///
/// let policy = GuardPolicy::new("recommendations")
///     .with_timeout(Duration::from_millis(800))
///     .with_settings(BreakerSettings::new().with_max_failure_count(4))
///     .with_fallback_value(Vec::<String>::new());
///
/// assert_eq!(policy.system_id(), "recommendations");
/// assert!(policy.has_fallback());
/// ```
pub struct GuardPolicy<T> {
    system_id: String,
    timeout: Duration,
    settings: BreakerSettings,
    fallback: Option<FallbackFn<T>>,
}

impl<T> GuardPolicy<T> {
    /// Policy for `system_id` with default timeout and thresholds, no fallback.
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            timeout: DEFAULT_TIMEOUT,
            settings: BreakerSettings::default(),
            fallback: None,
        }
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the thresholds used when the system has no record yet.
    pub fn with_settings(mut self, settings: BreakerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Return the result of `f` instead of failing.
    pub fn with_fallback_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(f));
        self
    }

    /// The protected system.
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// The per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Thresholds for new records.
    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Whether a fallback is configured.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Produce the fallback value, if a fallback is configured.
    pub fn resolve_fallback(&self) -> Option<T> {
        self.fallback.as_ref().map(|f| f())
    }
}

impl<T: Clone + Send + Sync + 'static> GuardPolicy<T> {
    /// Return `fallback` instead of failing.
    pub fn with_fallback(mut self, fallback: Fallback<T>) -> Self {
        self.fallback = Some(fallback.into_fn());
        self
    }

    /// Return a clone of `value` instead of failing.
    pub fn with_fallback_value(self, value: T) -> Self {
        self.with_fallback(Fallback::value(value))
    }
}

impl<T> Clone for GuardPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            system_id: self.system_id.clone(),
            timeout: self.timeout,
            settings: self.settings.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<T> fmt::Debug for GuardPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPolicy")
            .field("system_id", &self.system_id)
            .field("timeout", &self.timeout)
            .field("settings", &self.settings)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Guards calls to downstream systems with persisted breaker state.
///
/// One `CircuitBreaker` can guard any number of systems; each call names its
/// system through its [`GuardPolicy`].
///
/// Concurrent calls for the same system read, mutate and write the record
/// without coordination. The last write wins, so the failure count can lag
/// behind under heavy concurrency.
///
/// # Examples
///
/// ```rust
/// use floodgate::{BreakerError, CircuitBreaker, GuardPolicy, MemoryStore};
///
/// # tokio_test::block_on(async {
/// let breaker = CircuitBreaker::new(MemoryStore::new());
/// let policy = GuardPolicy::new("geo-lookup");
///
/// let ok: Result<u32, BreakerError<String>> = breaker.call(&policy, || async { Ok(7) }).await;
/// assert_eq!(ok.unwrap(), 7);
///
/// let err = breaker
///     .call(&policy, || async { Err::<u32, _>("503".to_string()) })
///     .await
///     .unwrap_err();
/// assert_eq!(err.into_operation_error(), Some("503".to_string()));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: StateStore> CircuitBreaker<S> {
    /// Guard calls with state kept in `store`.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: StateStore, C: Clock> CircuitBreaker<S, C> {
    /// Guard calls with state kept in `store`, reading time from `clock`.
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The persisted record for `system_id`.
    ///
    /// `None` when the system has no record or the store could not be read.
    pub async fn snapshot(&self, system_id: &str) -> Option<CircuitBreakerRecord> {
        match self.read(system_id).await {
            Loaded::Found(record) => Some(record),
            Loaded::Absent | Loaded::Unreadable => None,
        }
    }

    /// Run `operation` under the breaker for `policy.system_id()`.
    ///
    /// # Errors
    ///
    /// Without a fallback, returns [`BreakerError::Open`] when the call was
    /// blocked, [`BreakerError::Timeout`] when the deadline passed and
    /// [`BreakerError::Operation`] with the operation's own error otherwise.
    /// With a fallback, every failure resolves to the fallback value. Store
    /// faults are logged and never returned.
    ///
    /// When the record cannot be read, the call proceeds as if the breaker
    /// were closed and its outcome is not written back, so an unreadable
    /// store never overwrites the persisted state.
    pub async fn call<T, E, F, Fut>(
        &self,
        policy: &GuardPolicy<T>,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        E: fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let system_id = policy.system_id();
        let mut loaded = self.read(system_id).await;

        match &mut loaded {
            Loaded::Found(current) if current.state() == CircuitState::Open => {
                let now = self.clock.now_millis();
                if !current.is_reset_elapsed(now) {
                    current.register_blocked_call(now);
                    warn!(
                        system_id,
                        failure_count = current.failure_count(),
                        reset_deadline = current.reset_deadline(),
                        "circuit open, call blocked"
                    );
                    self.persist(current).await;
                    return Self::fail(policy, BreakerError::open(system_id));
                }

                current.begin_probe();
                info!(system_id, "reset timeout elapsed, circuit half-open");
                self.persist(current).await;
            }
            Loaded::Found(current) => {
                debug!(
                    system_id,
                    state = %current.state(),
                    failure_count = current.failure_count(),
                    "circuit allows call"
                );
            }
            Loaded::Absent => {
                warn!(system_id, "no circuit state recorded, proceeding as closed");
            }
            Loaded::Unreadable => {
                debug!(system_id, "circuit state unknown, proceeding as closed");
            }
        }

        let outcome = match tokio::time::timeout(policy.timeout(), operation()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BreakerError::Operation(e)),
            Err(_) => Err(BreakerError::timeout(system_id, policy.timeout())),
        };
        let now = self.clock.now_millis();

        match outcome {
            Ok(value) => {
                match loaded {
                    Loaded::Found(mut probed) if probed.state() == CircuitState::HalfOpen => {
                        probed.close(now);
                        info!(system_id, "probe succeeded, circuit closed");
                        self.persist(&probed).await;
                    }
                    _ => {}
                }
                Ok(value)
            }
            Err(error) => {
                let mut current = match loaded {
                    Loaded::Found(record) => record,
                    Loaded::Absent => CircuitBreakerRecord::new(system_id, policy.settings()),
                    Loaded::Unreadable => {
                        warn!(
                            system_id,
                            error = %error,
                            "failure not recorded, circuit state unreadable"
                        );
                        return Self::fail(policy, error);
                    }
                };
                let probing = current.state() == CircuitState::HalfOpen;

                if current.register_failure(now) {
                    warn!(
                        system_id,
                        probing,
                        failure_count = current.failure_count(),
                        failure_rate = current.failure_rate(),
                        error = %error,
                        "circuit tripped open"
                    );
                } else {
                    debug!(
                        system_id,
                        failure_count = current.failure_count(),
                        error = %error,
                        "failure recorded"
                    );
                }
                self.persist(&current).await;
                Self::fail(policy, error)
            }
        }
    }

    /// Bind `operation` to this breaker and `policy`.
    ///
    /// The returned [`GuardedOperation`] can be called any number of times,
    /// each call going through the breaker.
    ///
    /// ```rust
    /// use floodgate::{CircuitBreaker, GuardPolicy, MemoryStore};
    ///
    /// # tokio_test::block_on(async {
    /// let breaker = CircuitBreaker::new(MemoryStore::new());
    /// let fetch = breaker.protect(GuardPolicy::new("prices"), || async {
    ///     Ok::<_, std::io::Error>(19.99)
    /// });
    ///
    /// assert_eq!(fetch.call().await.unwrap(), 19.99);
    /// # });
    /// ```
    pub fn protect<T, F>(
        &self,
        policy: GuardPolicy<T>,
        operation: F,
    ) -> GuardedOperation<'_, S, C, T, F> {
        GuardedOperation {
            breaker: self,
            policy,
            operation,
        }
    }

    fn fail<T, E>(policy: &GuardPolicy<T>, error: BreakerError<E>) -> Result<T, BreakerError<E>> {
        match policy.resolve_fallback() {
            Some(value) => {
                debug!(system_id = policy.system_id(), "returning fallback");
                Ok(value)
            }
            None => Err(error),
        }
    }

    async fn read(&self, system_id: &str) -> Loaded {
        match self.store.load(system_id).await {
            Ok(Some(record)) => Loaded::Found(record),
            Ok(None) => Loaded::Absent,
            Err(e) => {
                warn!(system_id, error = %e, "failed to load circuit state");
                Loaded::Unreadable
            }
        }
    }

    async fn persist(&self, record: &CircuitBreakerRecord) {
        if let Err(e) = self.store.save(record).await {
            warn!(
                system_id = record.system_id(),
                state = %record.state(),
                error = %e,
                "failed to persist circuit state"
            );
        }
    }
}

/// What a call saw when it read the record.
enum Loaded {
    Found(CircuitBreakerRecord),
    Absent,
    Unreadable,
}

/// An operation bound to a breaker and a policy.
///
/// Created by [`CircuitBreaker::protect`].
pub struct GuardedOperation<'a, S, C, T, F> {
    breaker: &'a CircuitBreaker<S, C>,
    policy: GuardPolicy<T>,
    operation: F,
}

impl<S, C, T, F> GuardedOperation<'_, S, C, T, F>
where
    S: StateStore,
    C: Clock,
{
    /// The bound policy.
    pub fn policy(&self) -> &GuardPolicy<T> {
        &self.policy
    }

    /// Run the operation through the breaker.
    pub async fn call<E, Fut>(&self) -> Result<T, BreakerError<E>>
    where
        E: fmt::Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker
            .call(&self.policy, || (self.operation)())
            .await
    }
}

impl<S, C, T, F> fmt::Debug for GuardedOperation<'_, S, C, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedOperation")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
