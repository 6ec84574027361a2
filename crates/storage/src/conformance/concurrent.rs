use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use super::{make_promoted, make_snapshot, ConformanceReport, STATE_MACHINE};
use crate::{InstanceStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F, report: &mut ConformanceReport)
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_cases!(
        report,
        factory,
        "concurrent",
        [
            concurrent_saves_different_instances_all_land,
            concurrent_save_and_promote_same_instance,
        ]
    );
}

// ── Concurrent saves of distinct instances ───────────────────────────────────

/// N tasks each save a different instance. Every save must be readable
/// afterwards; no write may clobber another instance.
async fn concurrent_saves_different_instances_all_land<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let ids: Vec<Uuid> = (0..N).map(|_| Uuid::new_v4()).collect();

    let mut handles = Vec::new();
    for id in ids.iter().copied() {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["ClosedLocked"]))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    for id in &ids {
        if storage
            .load_tracker(*id, STATE_MACHINE)
            .await
            .map_err(|e| e.to_string())?
            .is_none()
        {
            return Err(format!("tracker for {id} lost"));
        }
    }
    let mut listed = storage.list_instances().await.map_err(|e| e.to_string())?;
    let mut expected = ids.clone();
    listed.sort();
    expected.sort();
    if listed != expected {
        return Err(format!("expected {} instances, listed {}", N, listed.len()));
    }
    Ok(())
}

// ── Save and promote racing on one instance ──────────────────────────────────

/// A save and a promote for the same instance run concurrently. Both halves
/// must survive: neither write may drop the other's field.
async fn concurrent_save_and_promote_same_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let id = Uuid::new_v4();

    let saver = {
        let s = storage.clone();
        tokio::spawn(async move {
            s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["Open"]))
                .await
        })
    };
    let promoter = {
        let s = storage.clone();
        tokio::spawn(async move { s.promote(&make_promoted(id, STATE_MACHINE, "Open")).await })
    };
    for handle in [saver, promoter] {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    if storage
        .load_tracker(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_none()
    {
        return Err("tracker dropped by concurrent promote".to_string());
    }
    if storage
        .promoted_properties(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_none()
    {
        return Err("promotion dropped by concurrent save".to_string());
    }
    Ok(())
}
