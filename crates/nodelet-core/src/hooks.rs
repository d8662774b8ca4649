//! Measurement-region hooks.
//!
//! Logical phases (construction, a batch of appends) are bracketed with
//! begin/end markers handed to an external measurement collaborator. The
//! collaborator is optional: [`NoopHooks`] discards the markers, and
//! [`TracingHooks`] forwards them to `tracing`.

use std::sync::Mutex;
use std::time::Instant;

/// Receiver of begin/end markers for named measurement regions.
///
/// Regions may nest; implementations see markers in strict LIFO order when
/// driven through [`Region`].
pub trait RegionHooks: Send + Sync {
    /// A region named `name` has started.
    fn begin(&self, name: &str);
    /// The most recently begun region named `name` has ended.
    fn end(&self, name: &str);
}

/// Hooks that ignore every marker.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl RegionHooks for NoopHooks {
    fn begin(&self, _name: &str) {}
    fn end(&self, _name: &str) {}
}

/// Hooks that log region boundaries and durations through `tracing`.
#[derive(Debug, Default)]
pub struct TracingHooks {
    open: Mutex<Vec<(String, Instant)>>,
}

impl TracingHooks {
    /// Create hooks with no open regions.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegionHooks for TracingHooks {
    fn begin(&self, name: &str) {
        tracing::info!(region = name, "region begin");
        if let Ok(mut open) = self.open.lock() {
            open.push((name.to_string(), Instant::now()));
        }
    }

    fn end(&self, name: &str) {
        let started = self.open.lock().ok().and_then(|mut open| {
            let pos = open.iter().rposition(|(n, _)| n == name)?;
            Some(open.remove(pos).1)
        });
        match started {
            Some(t) => tracing::info!(
                region = name,
                elapsed_us = t.elapsed().as_micros() as u64,
                "region end"
            ),
            None => tracing::warn!(region = name, "region end without matching begin"),
        }
    }
}

/// RAII guard for a measurement region: `begin` on entry, `end` on drop.
#[must_use = "the region ends as soon as the guard is dropped"]
pub struct Region<'a> {
    hooks: &'a dyn RegionHooks,
    name: &'a str,
}

impl<'a> Region<'a> {
    /// Begin the region `name` on `hooks`.
    pub fn enter(hooks: &'a dyn RegionHooks, name: &'a str) -> Self {
        hooks.begin(name);
        Self { hooks, name }
    }
}

impl Drop for Region<'_> {
    fn drop(&mut self) {
        self.hooks.end(self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl RegionHooks for Recorder {
        fn begin(&self, name: &str) {
            self.events.lock().unwrap().push(format!("+{name}"));
        }
        fn end(&self, name: &str) {
            self.events.lock().unwrap().push(format!("-{name}"));
        }
    }

    #[test]
    fn region_guard_brackets_in_lifo_order() {
        let rec = Recorder::default();
        {
            let _outer = Region::enter(&rec, "build");
            {
                let _inner = Region::enter(&rec, "append");
            }
        }
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["+build", "+append", "-append", "-build"]
        );
    }

    #[test]
    fn tracing_hooks_pair_begin_and_end() {
        let hooks = TracingHooks::new();
        hooks.begin("a");
        hooks.begin("b");
        hooks.end("a");
        assert_eq!(hooks.open.lock().unwrap().len(), 1);
        hooks.end("b");
        assert!(hooks.open.lock().unwrap().is_empty());
    }

    #[test]
    fn unmatched_end_is_harmless() {
        let hooks = TracingHooks::new();
        hooks.end("never-begun");
        NoopHooks.end("never-begun");
    }
}
