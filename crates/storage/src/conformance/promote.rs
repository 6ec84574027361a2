use std::future::Future;

use uuid::Uuid;

use super::{make_promoted, make_snapshot, ConformanceReport, STATE_MACHINE};
use crate::InstanceStore;

pub(super) async fn run_promote_tests<S, F, Fut>(factory: &F, report: &mut ConformanceReport)
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_cases!(
        report,
        factory,
        "promote",
        [
            promoted_properties_round_trip,
            promote_does_not_create_tracker,
            promote_keeps_saved_tracker,
            find_by_state_matches_current_state_only,
            find_by_state_scoped_to_state_machine,
            find_by_state_follows_latest_promotion,
        ]
    );
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn promoted_properties_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let props = make_promoted(Uuid::new_v4(), STATE_MACHINE, "Open");
    s.promote(&props).await.map_err(|e| e.to_string())?;
    let loaded = s
        .promoted_properties(props.instance_id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("promoted properties not found")?;
    if loaded != props {
        return Err(format!("expected {:?}, got {:?}", props, loaded));
    }
    Ok(())
}

/// Promotion writes indexing columns only; it must not invent a tracker.
async fn promote_does_not_create_tracker<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let props = make_promoted(Uuid::new_v4(), STATE_MACHINE, "Open");
    s.promote(&props).await.map_err(|e| e.to_string())?;
    if s
        .load_tracker(props.instance_id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("promote created a tracker snapshot".to_string());
    }
    Ok(())
}

/// Promoting after a save leaves the saved tracker intact.
async fn promote_keeps_saved_tracker<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    let snap = make_snapshot(id, STATE_MACHINE, &["ClosedLocked", "ClosedUnlocked"]);
    s.save_tracker(&snap).await.map_err(|e| e.to_string())?;
    s.promote(&make_promoted(id, STATE_MACHINE, "ClosedUnlocked"))
        .await
        .map_err(|e| e.to_string())?;
    let loaded = s
        .load_tracker(id, STATE_MACHINE)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("tracker lost after promote")?;
    if loaded != snap {
        return Err(format!("tracker changed by promote: {:?}", loaded));
    }
    Ok(())
}

async fn find_by_state_matches_current_state_only<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let open = Uuid::new_v4();
    let locked = Uuid::new_v4();
    s.promote(&make_promoted(open, STATE_MACHINE, "Open"))
        .await
        .map_err(|e| e.to_string())?;
    s.promote(&make_promoted(locked, STATE_MACHINE, "ClosedLocked"))
        .await
        .map_err(|e| e.to_string())?;
    let found = s
        .find_by_state(STATE_MACHINE, "Open")
        .await
        .map_err(|e| e.to_string())?;
    if found != vec![open] {
        return Err(format!("expected [{}], got {:?}", open, found));
    }
    Ok(())
}

async fn find_by_state_scoped_to_state_machine<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.promote(&make_promoted(Uuid::new_v4(), "Alarm", "Open"))
        .await
        .map_err(|e| e.to_string())?;
    let found = s
        .find_by_state(STATE_MACHINE, "Open")
        .await
        .map_err(|e| e.to_string())?;
    if !found.is_empty() {
        return Err(format!("expected no matches, got {:?}", found));
    }
    Ok(())
}

/// Re-promoting with a new state moves the instance between result sets.
async fn find_by_state_follows_latest_promotion<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = Uuid::new_v4();
    s.promote(&make_promoted(id, STATE_MACHINE, "ClosedUnlocked"))
        .await
        .map_err(|e| e.to_string())?;
    s.promote(&make_promoted(id, STATE_MACHINE, "Open"))
        .await
        .map_err(|e| e.to_string())?;
    let stale = s
        .find_by_state(STATE_MACHINE, "ClosedUnlocked")
        .await
        .map_err(|e| e.to_string())?;
    let fresh = s
        .find_by_state(STATE_MACHINE, "Open")
        .await
        .map_err(|e| e.to_string())?;
    if !stale.is_empty() || fresh != vec![id] {
        return Err(format!("stale={:?} fresh={:?}", stale, fresh));
    }
    Ok(())
}
