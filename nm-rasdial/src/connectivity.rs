// Internet reachability after NetworkManager restarts

//! Reachability probe and service restart
//!
//! The probe is a coarse heuristic: one bounded HTTP GET, where any failure
//! (DNS, connect, timeout, HTTP error status) counts as offline.

use crate::credentials::run_command;
use crate::types::ProbeConfig;
use crate::wait::{wait_until, PollPolicy};
use anyhow::Result;
use std::time::Duration;

/// Delay between two probes while waiting for the network to come back
const PROBE_RETRY_PERIOD_SECS: u64 = 1;

/// Whether a GET of `url` succeeds within `timeout`
pub async fn internet_on(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Failed to create HTTP client: {}", e);
            return false;
        }
    };

    match client.get(url).send().await.and_then(|r| r.error_for_status()) {
        Ok(_) => true,
        Err(e) => {
            log::debug!("Reachability probe of {} failed: {}", url, e);
            false
        }
    }
}

/// Probe schedule used after a restart: exactly `max_tries` probes spaced by
/// the retry period. Each probe is bounded by its own timeout, so a slow probe
/// never eats into the number of retries.
pub fn probe_policy(probe: &ProbeConfig) -> PollPolicy {
    PollPolicy::attempts(probe.max_tries, Duration::from_secs(PROBE_RETRY_PERIOD_SECS))
}

/// Restart the network service, then probe until the internet is reachable.
///
/// Returns `Ok(true)` as soon as one probe succeeds and `Ok(false)` when the
/// probe budget runs out. A restart command exiting non-zero is an error.
pub async fn restart_network_manager(
    restart_command: &[String],
    probe: &ProbeConfig,
) -> Result<bool> {
    log::info!("Restarting NetworkManager");
    if !run_command(restart_command).await? {
        anyhow::bail!("'{}' exited unsuccessfully", restart_command.join(" "));
    }

    let policy = probe_policy(probe);
    let timeout = Duration::from_secs(probe.timeout);
    log::debug!("Probing {} up to {} times", probe.url, probe.max_tries);

    let url = probe.url.as_str();
    wait_until(policy, move || async move { anyhow::Ok(internet_on(url, timeout).await) }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unreachable_probe(max_tries: u32) -> ProbeConfig {
        ProbeConfig {
            // Port 9 on loopback: connection refused immediately
            url: "http://127.0.0.1:9/".to_string(),
            timeout: 1,
            max_tries,
        }
    }

    /// Loopback HTTP endpoint counting accepted connections. With `reply`
    /// unset it accepts and then stays silent, like a stalled portal.
    fn local_endpoint(reply: Option<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        std::thread::spawn(move || {
            let mut held: Vec<TcpStream> = Vec::new();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                match reply {
                    Some(response) => {
                        let mut request = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                            match stream.read(&mut buf) {
                                Ok(0) | Err(_) => break,
                                Ok(n) => request.extend_from_slice(&buf[..n]),
                            }
                        }
                        let _ = stream.write_all(response.as_bytes());
                    }
                    None => held.push(stream),
                }
            }
        });

        (url, accepted)
    }

    const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    fn probe_at(url: &str, max_tries: u32) -> ProbeConfig {
        ProbeConfig {
            url: url.to_string(),
            timeout: 1,
            max_tries,
        }
    }

    #[test]
    fn test_probe_policy() {
        let policy = probe_policy(&unreachable_probe(3));
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.period, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, Some(3));
    }

    #[test]
    fn test_probe_policy_zero_tries() {
        let policy = probe_policy(&unreachable_probe(0));
        assert_eq!(policy.max_attempts, Some(0));
    }

    #[tokio::test]
    async fn test_internet_on_unreachable() {
        assert!(!internet_on("http://127.0.0.1:9/", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_internet_on_invalid_url() {
        assert!(!internet_on("not a url", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_internet_on_reachable() {
        let (url, accepted) = local_endpoint(Some(OK_RESPONSE));
        assert!(internet_on(&url, Duration::from_secs(2)).await);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_internet_on_error_status() {
        let (url, _) = local_endpoint(Some(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ));
        assert!(!internet_on(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_restart_command_failure_is_error() {
        let result = restart_network_manager(&["false".to_string()], &unreachable_probe(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_restart_without_probes_reports_offline() {
        let online = restart_network_manager(&["true".to_string()], &unreachable_probe(0))
            .await
            .unwrap();
        assert!(!online);
    }

    #[tokio::test]
    async fn test_restart_then_unreachable() {
        let online = restart_network_manager(&["true".to_string()], &unreachable_probe(1))
            .await
            .unwrap();
        assert!(!online);
    }

    #[tokio::test]
    async fn test_restart_then_reachable_stops_at_first_success() {
        let (url, accepted) = local_endpoint(Some(OK_RESPONSE));
        let online = restart_network_manager(&["true".to_string()], &probe_at(&url, 3))
            .await
            .unwrap();
        assert!(online);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_retries_every_stalled_attempt() {
        let (url, accepted) = local_endpoint(None);
        let online = restart_network_manager(&["true".to_string()], &probe_at(&url, 3))
            .await
            .unwrap();
        assert!(!online);

        // The last connection may still be on its way through accept()
        for _ in 0..50 {
            if accepted.load(Ordering::SeqCst) >= 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }
}
