//! Shared helpers for the end-to-end suites.

#![allow(dead_code)]

use automerge::{ReadDoc, ScalarValue, Value, ROOT};
use std::sync::Arc;
use std::time::Duration;
use tidemark_network::{ChannelAdapter, NetworkAdapter};
use tidemark_repo::{DocHandle, Repo};

/// Connect two repos over an in-process channel, returning both ends so
/// tests can disconnect them later.
pub fn connect(left: &Repo, right: &Repo) -> (Arc<ChannelAdapter>, Arc<ChannelAdapter>) {
    let (left_end, right_end) =
        ChannelAdapter::pair(left.peer_id().clone(), right.peer_id().clone());
    left.add_network_adapter(Arc::clone(&left_end) as Arc<dyn NetworkAdapter>)
        .expect("attach adapter");
    right
        .add_network_adapter(Arc::clone(&right_end) as Arc<dyn NetworkAdapter>)
        .expect("attach adapter");
    (left_end, right_end)
}

/// Poll until `condition` holds, panicking after a few seconds.
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition() {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Read a string value at the document root, if present.
pub fn get_string(handle: &DocHandle, key: &str) -> Option<String> {
    handle
        .with_doc(|doc| {
            Ok(match doc.get(ROOT, key)? {
                Some((Value::Scalar(s), _)) => match s.as_ref() {
                    ScalarValue::Str(text) => Some(text.to_string()),
                    _ => None,
                },
                _ => None,
            })
        })
        .ok()
        .flatten()
}

/// Read an integer value at the document root, if present.
pub fn get_int(handle: &DocHandle, key: &str) -> Option<i64> {
    handle
        .with_doc(|doc| {
            Ok(match doc.get(ROOT, key)? {
                Some((Value::Scalar(s), _)) => match s.as_ref() {
                    ScalarValue::Int(value) => Some(*value),
                    _ => None,
                },
                _ => None,
            })
        })
        .ok()
        .flatten()
}
