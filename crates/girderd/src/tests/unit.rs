//! Unit tests for the scaffold utilities.

use rstest::rstest;

use crate::ShutdownFlag;

#[rstest]
fn detached_flag_starts_clear() {
    let flag = ShutdownFlag::detached();

    assert!(!flag.requested());
}

#[rstest]
fn request_is_visible_through_clones() {
    let flag = ShutdownFlag::detached();
    let observer = flag.clone();

    flag.request();

    assert!(observer.requested());
}
