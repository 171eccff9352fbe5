use std::time::Duration;

use super::{DispatchError, HandlerResult};
use crate::runner::{ProcessOptions, run_process};

const PING_PROGRAM: &str = "/bin/ping";
const PING_TIMEOUT: Duration = Duration::from_secs(10);
const PING_MAX_OUTPUT_BYTES: usize = 8 * 1024;
const MAX_HOST_LEN: usize = 253;
const HOST_EDGES: [char; 2] = ['.', '-'];

/// Hostname or IPv4 literal: ASCII letters, digits, `.` and `-`, not
/// starting or ending with a separator.
pub fn is_safe_host(host: &str) -> bool {
    if host.is_empty() || host.len() > MAX_HOST_LEN {
        return false;
    }
    if !host
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-')
    {
        return false;
    }
    !(host.starts_with(HOST_EDGES) || host.ends_with(HOST_EDGES))
}

pub(super) async fn ping(args: &[String]) -> HandlerResult {
    let [host] = args else {
        return Err(DispatchError::PingArity);
    };
    let host = host.trim();
    if host.is_empty() {
        return Err(DispatchError::PingEmpty);
    }
    if !is_safe_host(host) {
        return Err(DispatchError::PingHost);
    }

    let options = ProcessOptions::new(PING_PROGRAM)
        .args(["-c", "4", "-W", "2", host])
        .timeout(PING_TIMEOUT)
        .max_output_bytes(PING_MAX_OUTPUT_BYTES);
    Ok(run_process(&options).await)
}
