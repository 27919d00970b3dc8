//! Reconnect script runner.
//!
//! Runs the configured reconnect script (e.g. a router IP-rotation helper),
//! bracketed by `before_reconnect` and `after_reconnect` so addons can react.
//! Blocking; callers on the async side use `spawn_blocking`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::events::{Event, EventBus};

pub fn run_reconnect(script: &Path, bus: &EventBus) -> Result<()> {
    bus.publish(&Event::BeforeReconnect);
    tracing::info!(script = %script.display(), "running reconnect script");

    let result = std::process::Command::new(script)
        .status()
        .with_context(|| format!("failed to run reconnect script {}", script.display()));

    // Addons waiting on after_reconnect must see it even when the script
    // fails, or they stall.
    bus.publish(&Event::AfterReconnect);

    let status = result?;
    if !status.success() {
        anyhow::bail!("reconnect script exited with {}", status);
    }
    Ok(())
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("reconnect.sh");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh\n{}", body).unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn events_bracket_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 0");
        let bus = EventBus::new();
        let order = Arc::new(AtomicUsize::new(0));

        let o1 = Arc::clone(&order);
        bus.subscribe(
            EventKind::BeforeReconnect,
            "t",
            Arc::new(move |_| {
                o1.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst).ok();
                Ok(())
            }),
        );
        let o2 = Arc::clone(&order);
        bus.subscribe(
            EventKind::AfterReconnect,
            "t",
            Arc::new(move |_| {
                o2.compare_exchange(1, 2, Ordering::SeqCst, Ordering::SeqCst).ok();
                Ok(())
            }),
        );

        run_reconnect(&script, &bus).unwrap();
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_script_still_publishes_after_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 3");
        let bus = EventBus::new();
        let after = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&after);
        bus.subscribe(
            EventKind::AfterReconnect,
            "t",
            Arc::new(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        assert!(run_reconnect(&script, &bus).is_err());
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }
}
