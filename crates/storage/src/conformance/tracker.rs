use std::future::Future;

use uuid::Uuid;

use super::{make_snapshot, ConformanceReport, STATE_MACHINE};
use crate::InstanceStore;

pub(super) async fn run_tracker_tests<S, F, Fut>(factory: &F, report: &mut ConformanceReport)
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_cases!(
        report,
        factory,
        "tracker",
        [
            load_missing_returns_none,
            save_then_load_round_trips,
            save_overwrites_previous_snapshot,
            state_machines_are_independent,
            instances_are_independent,
            saved_instance_is_listed,
        ]
    );
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Loading an instance that was never saved is a fresh instance, not an error.
async fn load_missing_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let loaded = s
        .load_tracker(Uuid::new_v4(), STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?;
    if loaded.is_some() {
        return Err("expected None for an unknown instance".to_string());
    }
    Ok(())
}

/// Every snapshot field survives a save/load cycle.
async fn save_then_load_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = make_snapshot(
        Uuid::new_v4(),
        STATE_MACHINE,
        &["ClosedLocked", "ClosedUnlocked", "Open"],
    );
    s.save_tracker(&snap).await.map_err(|e| e.to_string())?;

    let loaded = s
        .load_tracker(snap.instance_id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("saved tracker not found")?;
    if loaded != snap {
        return Err(format!("expected {:?}, got {:?}", snap, loaded));
    }
    Ok(())
}

/// A second save replaces the first.
async fn save_overwrites_previous_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["ClosedLocked"]))
        .await
        .map_err(|e| e.to_string())?;
    let newer = make_snapshot(id, STATE_MACHINE, &["ClosedLocked", "ClosedUnlocked"]);
    s.save_tracker(&newer).await.map_err(|e| e.to_string())?;

    let loaded = s
        .load_tracker(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("saved tracker not found")?;
    if loaded.current_state.as_deref() != Some("ClosedUnlocked") {
        return Err(format!(
            "expected current state ClosedUnlocked, got {:?}",
            loaded.current_state
        ));
    }
    Ok(())
}

/// Two state machines embedded in one instance are stored separately.
async fn state_machines_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let door = s
        .load_tracker(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("door tracker not found")?;
    let alarm = s
        .load_tracker(id, "Alarm")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("alarm tracker not found")?;
    if door.current_state.as_deref() != Some("Open")
        || alarm.current_state.as_deref() != Some("Armed")
    {
        return Err(format!(
            "state machines mixed up: door={:?} alarm={:?}",
            door.current_state, alarm.current_state
        ));
    }
    Ok(())
}

/// Saving one instance leaves others untouched.
async fn instances_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    s.save_tracker(&make_snapshot(a, STATE_MACHINE, &["ClosedLocked"]))
        .await
        .map_err(|e| e.to_string())?;
    if s
        .load_tracker(b, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("unsaved instance has a tracker".to_string());
    }
    Ok(())
}

/// `list_instances` includes saved instances.
async fn saved_instance_is_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    s.save_tracker(&make_snapshot(id, STATE_MACHINE, &["ClosedLocked"]))
        .await
        .map_err(|e| e.to_string())?;
    let listed = s.list_instances().await.map_err(|e| e.to_string())?;
    if listed != vec![id] {
        return Err(format!("expected [{}], got {:?}", id, listed));
    }
    Ok(())
}
