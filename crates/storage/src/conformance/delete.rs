use std::future::Future;

use uuid::Uuid;

use super::{make_promoted, make_snapshot, ConformanceReport, STATE_MACHINE};
use crate::{InstanceStore, StorageError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F, report: &mut ConformanceReport)
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_cases!(
        report,
        factory,
        "delete",
        [
            delete_purges_tracker_and_promotion,
            delete_purges_every_state_machine,
            delete_leaves_other_instances,
            delete_unknown_returns_instance_not_found,
            delete_twice_returns_instance_not_found,
        ]
    );
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn delete_purges_tracker_and_promotion<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["Alert"]))
        .await
        .map_err(|e| e.to_string())?;
    s.promote(&make_promoted(id, STATE_MACHINE, "Alert"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance(id).await.map_err(|e| e.to_string())?;

    if s
        .load_tracker(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("tracker survived delete".to_string());
    }
    if s
        .promoted_properties(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("promoted properties survived delete".to_string());
    }
    let found = s
        .find_by_state(STATE_MACHINE, "Alert")
        .await
        .map_err(|e| e.to_string())?;
    if !found.is_empty() {
        return Err(format!("deleted instance still findable: {:?}", found));
    }
    Ok(())
}

async fn delete_purges_every_state_machine<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["Open"]))
        .await
        .map_err(|e| e.to_string())?;
    s.save_tracker(&make_snapshot(id, "Alarm", &["Armed"]))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance(id).await.map_err(|e| e.to_string())?;
    if s
        .load_tracker(id, "Alarm")
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("second state machine survived delete".to_string());
    }
    let listed = s.list_instances().await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("deleted instance still listed: {:?}", listed));
    }
    Ok(())
}

async fn delete_leaves_other_instances<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let gone = Uuid::new_v4();
    let kept = Uuid::new_v4();
    s.save_tracker(&make_snapshot(gone, STATE_MACHINE, &["Alert"]))
        .await
        .map_err(|e| e.to_string())?;
    s.save_tracker(&make_snapshot(kept, STATE_MACHINE, &["Open"]))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance(gone).await.map_err(|e| e.to_string())?;
    if s
        .load_tracker(kept, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_none()
    {
        return Err("unrelated instance deleted".to_string());
    }
    Ok(())
}

async fn delete_unknown_returns_instance_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    match s.delete_instance(id).await {
        Err(StorageError::InstanceNotFound { instance_id }) if instance_id == id => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got {e}")),
        Ok(()) => Err("expected InstanceNotFound, got Ok".to_string()),
    }
}

async fn delete_twice_returns_instance_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["Alert"]))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance(id).await.map_err(|e| e.to_string())?;
    match s.delete_instance(id).await {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got {e}")),
        Ok(()) => Err("second delete succeeded".to_string()),
    }
}
