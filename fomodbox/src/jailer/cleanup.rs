//! Process-exit cleanup of isolation boundaries.
//!
//! Boundaries outlive the helper on purpose (the helper may be relaunched in
//! the same boundary) and are removed when the host process exits. Actions
//! are keyed by boundary name so relaunching in a boundary never stacks a
//! second action. A single `atexit` handler drains the registry.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Once, OnceLock};

use parking_lot::Mutex;

type CleanupAction = Box<dyn FnOnce() + Send + 'static>;

static ACTIONS: OnceLock<Mutex<BTreeMap<String, CleanupAction>>> = OnceLock::new();
static EXIT_HOOK: Once = Once::new();

fn actions() -> &'static Mutex<BTreeMap<String, CleanupAction>> {
    ACTIONS.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Register `action` to run when the process exits.
///
/// Returns `false` (and drops `action`) if an action for `name` is already
/// registered.
pub fn register(name: &str, action: impl FnOnce() + Send + 'static) -> bool {
    EXIT_HOOK.call_once(|| {
        if unsafe { libc::atexit(run_at_exit) } != 0 {
            tracing::warn!("Failed to install exit hook, boundaries will not be removed on exit");
        }
    });

    let mut actions = actions().lock();
    if actions.contains_key(name) {
        tracing::debug!(boundary = %name, "Exit cleanup already registered");
        return false;
    }
    actions.insert(name.to_string(), Box::new(action));
    true
}

/// Whether an action for `name` is pending.
pub fn is_registered(name: &str) -> bool {
    actions().lock().contains_key(name)
}

/// Run and drop the action for `name` now, if one is pending.
pub fn run(name: &str) -> bool {
    let Some(action) = actions().lock().remove(name) else {
        return false;
    };
    run_action(name, action);
    true
}

/// Run and drop every pending action now.
///
/// Hosts that leave through a path `atexit` does not cover (e.g. a signal
/// handler) call this themselves. Returns how many actions ran.
pub fn run_registered() -> usize {
    let drained = std::mem::take(&mut *actions().lock());
    let count = drained.len();

    for (name, action) in drained {
        run_action(&name, action);
    }

    count
}

fn run_action(name: &str, action: CleanupAction) {
    if catch_unwind(AssertUnwindSafe(action)).is_err() {
        tracing::warn!(boundary = %name, "Exit cleanup panicked");
    }
}

extern "C" fn run_at_exit() {
    // unwinding out of an extern "C" fn aborts
    let _ = catch_unwind(run_registered);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_one_action_per_name() {
        let runs = Arc::new(AtomicUsize::new(0));

        let first = runs.clone();
        assert!(register("cleanup-test-dedupe", move || {
            first.fetch_add(1, Ordering::SeqCst);
        }));
        let second = runs.clone();
        assert!(!register("cleanup-test-dedupe", move || {
            second.fetch_add(10, Ordering::SeqCst);
        }));
        assert!(is_registered("cleanup-test-dedupe"));

        assert!(run("cleanup-test-dedupe"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!is_registered("cleanup-test-dedupe"));
        assert!(!run("cleanup-test-dedupe"));
    }

    #[test]
    fn test_panicking_action_does_not_stop_others() {
        let runs = Arc::new(AtomicUsize::new(0));

        register("cleanup-test-panic-a", || panic!("boom"));
        let counter = runs.clone();
        register("cleanup-test-panic-b", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(run("cleanup-test-panic-a"));
        assert!(run("cleanup-test-panic-b"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
