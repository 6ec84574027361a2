/// Panic unless the listed states were entered in order.
///
/// ```rust,ignore
/// assert_occurs_in_order!(definition, store, ["ClosedLocked", "ClosedUnlocked"]);
/// assert_occurs_in_order!(definition, store, ["ClosedLocked"], "after key {}", key);
/// ```
#[macro_export]
macro_rules! assert_occurs_in_order {
    ($definition:expr, $store:expr, [$($state:expr),* $(,)?] $(,)?) => {
        if let Err(e) = $crate::occurs_in_order(&$definition, &$store, &[$($state),*]) {
            panic!("assertion `occurs_in_order` failed: {}", e);
        }
    };
    ($definition:expr, $store:expr, [$($state:expr),* $(,)?], $($arg:tt)+) => {
        if let Err(e) = $crate::occurs_in_order(&$definition, &$store, &[$($state),*]) {
            panic!("assertion `occurs_in_order` failed: {}: {}", format_args!($($arg)+), e);
        }
    };
}

/// Panic unless `activity` reached the given state (closed by default).
///
/// ```rust,ignore
/// assert_exists!(store, "OpenTimeout");
/// assert_exists!(store, "DoorOpened", InstanceState::Executing);
/// ```
#[macro_export]
macro_rules! assert_exists {
    ($store:expr, $activity:expr $(,)?) => {
        $crate::assert_exists!($store, $activity, $crate::InstanceState::Closed)
    };
    ($store:expr, $activity:expr, $state:expr $(,)?) => {
        if let Err(e) = $crate::assert_exists(&$store, $activity, $state) {
            panic!("assertion `exists` failed: {}", e);
        }
    };
}
