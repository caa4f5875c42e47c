// Hook Registry (spec §4.2): the single serialization point for suspension
// state. Register/Resume/Reject are safe to call from parallel contexts;
// each hook undergoes at most one terminal transition.
//
// Grounded on `durable/src/activity/context.rs`'s AtomicBool cancellation
// handle for the "flip a flag, wake a waiter" idiom, generalized to a
// four-state machine with a oneshot channel standing in for the waiter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{AgentLoopError, Result};
use crate::hooks::definition::{HookInstance, HookOptions, HookOutcome, HookStatus};

struct HookEntry {
    instance: HookInstance,
    responder: Option<oneshot::Sender<HookOutcome>>,
    validate: Option<Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>>,
    default_value: Option<Value>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

/// Registry of pending human-in-the-loop suspensions.
#[derive(Clone)]
pub struct HookRegistry {
    entries: Arc<Mutex<HashMap<String, HookEntry>>>,
    counter: Arc<AtomicU64>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generates a globally-unique-per-process hook id:
    /// `hook-{name}-{base36 timestamp}-{6-char random}-{monotonic counter}`.
    pub fn generate_id(&self, name: &str) -> String {
        let timestamp_ms = now_millis();
        let timestamp36 = to_base36(timestamp_ms);
        let random_suffix = random_alnum(6);
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("hook-{name}-{timestamp36}-{random_suffix}-{counter}")
    }

    /// Registers a new hook and returns its id along with a future that
    /// resolves in exactly one of: resolved, rejected, timed_out, or never
    /// (if no timeout was configured and no external resume arrives).
    pub fn register(
        &self,
        name: impl Into<String>,
        payload: Value,
        options: HookOptions,
    ) -> Result<(String, oneshot::Receiver<HookOutcome>)> {
        let name = name.into();
        let id = self.generate_id(&name);
        self.register_with_id(id, name, payload, options)
    }

    /// Same as `register` but with a caller-supplied id; fails with a
    /// distinct error if the id collides with an existing hook.
    pub fn register_with_id(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        payload: Value,
        options: HookOptions,
    ) -> Result<(String, oneshot::Receiver<HookOutcome>)> {
        let id = id.into();
        let name = name.into();
        let (tx, rx) = oneshot::channel();

        let instance = HookInstance {
            id: id.clone(),
            name,
            payload,
            description: options.description.clone(),
            status: HookStatus::Pending,
            created_at: chrono::Utc::now(),
        };

        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(AgentLoopError::HookIdCollision(id));
        }

        let timer = options.timeout.map(|duration| {
            let entries_for_timer = self.entries.clone();
            let id_for_timer = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                fire_timeout(&entries_for_timer, &id_for_timer);
            })
        });

        if options.timeout.is_none() {
            warn!(hook_id = %id, "hook registered without a timeout; may never resolve");
        }

        entries.insert(
            id.clone(),
            HookEntry {
                instance,
                responder: Some(tx),
                validate: options.validate.clone(),
                default_value: options.default_value.clone(),
                timer,
            },
        );

        Ok((id, rx))
    }

    /// Resolves a pending hook. Atomically checks-and-sets status before
    /// running the validator; on validator failure, the status is rolled
    /// back to `pending` and the suspended future is left unresolved.
    pub fn resume(&self, id: &str, result: Value) -> Result<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| AgentLoopError::hook_not_found(id))?;

        if entry.instance.status != HookStatus::Pending {
            return Err(AgentLoopError::hook_not_pending(
                id,
                entry.instance.status.to_string(),
            ));
        }

        // Optimistically transition so a concurrent timeout cannot double-resolve.
        entry.instance.status = HookStatus::Resolved;

        if let Some(validate) = &entry.validate {
            if let Err(reason) = validate(&result) {
                entry.instance.status = HookStatus::Pending;
                return Err(AgentLoopError::validation(reason));
            }
        }

        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        if let Some(responder) = entry.responder.take() {
            let _ = responder.send(HookOutcome::Resolved(result));
        }

        Ok(())
    }

    /// Rejects a pending hook with a reason.
    pub fn reject(&self, id: &str, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| AgentLoopError::hook_not_found(id))?;

        if entry.instance.status != HookStatus::Pending {
            return Err(AgentLoopError::hook_not_pending(
                id,
                entry.instance.status.to_string(),
            ));
        }

        entry.instance.status = HookStatus::Rejected;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        if let Some(responder) = entry.responder.take() {
            let _ = responder.send(HookOutcome::Rejected(reason));
        }

        Ok(())
    }

    /// Snapshot of currently registered hooks, optionally filtered by status.
    pub fn list(&self, status_filter: Option<HookStatus>) -> Vec<HookInstance> {
        self.entries
            .lock()
            .values()
            .map(|entry| entry.instance.clone())
            .filter(|instance| status_filter.map_or(true, |s| instance.status == s))
            .collect()
    }

    /// Cancels all pending timers and empties the registry. Test/teardown only.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        for entry in entries.values_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
        entries.clear();
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn fire_timeout(entries: &Arc<Mutex<HashMap<String, HookEntry>>>, id: &str) {
    let mut entries = entries.lock();
    let Some(entry) = entries.get_mut(id) else {
        return;
    };
    if entry.instance.status != HookStatus::Pending {
        return;
    }
    entry.instance.status = HookStatus::TimedOut;
    let value = entry.default_value.clone().unwrap_or(Value::Null);
    if let Some(responder) = entry.responder.take() {
        let _ = responder.send(HookOutcome::TimedOut(value));
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

fn random_alnum(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_under_rapid_succession() {
        let registry = HookRegistry::new();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..1000 {
            ids.insert(registry.generate_id("approval"));
        }
        assert_eq!(ids.len(), 1000);
    }

    #[tokio::test]
    async fn resolve_delivers_result_to_waiter() {
        let registry = HookRegistry::new();
        let (id, rx) = registry
            .register("approval", serde_json::json!({"amount": 10}), HookOptions::default())
            .unwrap();

        registry.resume(&id, serde_json::json!({"approved": true})).unwrap();

        let outcome = rx.await.unwrap();
        match outcome {
            HookOutcome::Resolved(v) => assert_eq!(v, serde_json::json!({"approved": true})),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reject_delivers_reason() {
        let registry = HookRegistry::new();
        let (id, rx) = registry
            .register("approval", serde_json::json!({}), HookOptions::default())
            .unwrap();

        registry.reject(&id, "declined by operator").unwrap();

        match rx.await.unwrap() {
            HookOutcome::Rejected(reason) => assert_eq!(reason, "declined by operator"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn double_resolve_fails_with_not_pending() {
        let registry = HookRegistry::new();
        let (id, _rx) = registry
            .register("approval", serde_json::json!({}), HookOptions::default())
            .unwrap();

        registry.resume(&id, serde_json::json!(1)).unwrap();
        let err = registry.resume(&id, serde_json::json!(2)).unwrap_err();
        assert_eq!(err.code(), "hook-not-pending");
    }

    #[test]
    fn colliding_id_is_rejected() {
        let registry = HookRegistry::new();
        registry
            .register_with_id("hook-fixed-id", "approval", serde_json::json!({}), HookOptions::default())
            .unwrap();

        let err = registry
            .register_with_id("hook-fixed-id", "approval", serde_json::json!({}), HookOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "hook-id-collision");
    }

    #[test]
    fn validator_failure_rolls_back_to_pending() {
        let registry = HookRegistry::new();
        let options = HookOptions {
            validate: Some(Arc::new(|v: &Value| {
                if v.get("approved").is_some() {
                    Ok(())
                } else {
                    Err("missing 'approved' field".to_string())
                }
            })),
            ..Default::default()
        };
        let (id, _rx) = registry
            .register("approval", serde_json::json!({}), options)
            .unwrap();

        let err = registry.resume(&id, serde_json::json!({"bogus": 1})).unwrap_err();
        assert_eq!(err.code(), "validation-error");

        let instances = registry.list(Some(HookStatus::Pending));
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, id);
    }

    #[tokio::test]
    async fn timeout_resolves_with_default_value() {
        let registry = HookRegistry::new();
        let options = HookOptions {
            timeout: Some(Duration::from_millis(10)),
            default_value: Some(serde_json::json!({"approved": false})),
            ..Default::default()
        };
        let (_id, rx) = registry
            .register("approval", serde_json::json!({}), options)
            .unwrap();

        let outcome = rx.await.unwrap();
        match outcome {
            HookOutcome::TimedOut(v) => assert_eq!(v, serde_json::json!({"approved": false})),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn clear_empties_registry() {
        let registry = HookRegistry::new();
        registry
            .register("approval", serde_json::json!({}), HookOptions::default())
            .unwrap();
        assert_eq!(registry.list(None).len(), 1);
        registry.clear();
        assert_eq!(registry.list(None).len(), 0);
    }
}
