//! Port selection for game workers.
//!
//! A port is free when no open room claims it and nothing answers a TCP
//! connect on the probe host. The probe cannot reserve the port: another
//! process may still bind it between the probe and the worker's own bind.

use std::ops::Range;
use std::time::Duration;

use tokio::net::TcpStream;

/// Returns the first port in `range` that `claimed` rejects and no local
/// listener occupies.
pub(crate) async fn allocate(
    range: Range<u16>,
    claimed: impl Fn(u16) -> bool,
    probe_host: &str,
    probe_timeout: Duration,
) -> Option<u16> {
    for port in range {
        if claimed(port) {
            continue;
        }
        if is_listening(probe_host, port, probe_timeout).await {
            tracing::debug!(port, "port in use outside the registry");
            continue;
        }
        return Some(port);
    }
    None
}

/// Returns `true` if a TCP connect to `host:port` succeeds within
/// `timeout`. A timeout counts as not listening.
pub(crate) async fn is_listening(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    const PROBE: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_allocate_skips_claimed_ports() {
        // Find a port nothing listens on, then claim it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let got = allocate(port..port.saturating_add(1), |p| p == port, "127.0.0.1", PROBE).await;
        assert_eq!(got, None);

        let got = allocate(port..port.saturating_add(1), |_| false, "127.0.0.1", PROBE).await;
        assert_eq!(got, Some(port));
    }

    #[tokio::test]
    async fn test_allocate_skips_ports_with_listeners() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(is_listening("127.0.0.1", port, PROBE).await);
        let got = allocate(port..port.saturating_add(1), |_| false, "127.0.0.1", PROBE).await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_allocate_empty_range() {
        assert_eq!(allocate(9000..9000, |_| false, "127.0.0.1", PROBE).await, None);
    }
}
