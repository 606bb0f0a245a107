//! Waking agents and keeping them in real-time poll mode

use reqwest::StatusCode;
use std::future::Future;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use super::rse::{Rse, RseRoute};
use super::transport::{ApiClient, ApiRequest};
use crate::RcbuResult;

/// Budget for each wake attempt made by a keep-awake task
pub const KEEP_AWAKE_WAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Period used when the agent's real-time heartbeat timeout is too small to derive one
pub const DEFAULT_WAKE_PERIOD: Duration = Duration::from_secs(70);

/// `POST /v1.0/user/wakeupagents`; 200 means every agent on the account was asked to wake
pub async fn wake_agents(client: &ApiClient) -> RcbuResult<StatusCode> {
    let response = client.send(ApiRequest::post("/v1.0/user/wakeupagents")).await?;
    let status = response.status();
    debug!("Wake Agent: code = {}", status);
    Ok(status)
}

/// Re-run `attempt` until it yields true or `timeout` elapses.
///
/// At least one attempt is always made. A timeout too large to represent
/// as a deadline never expires.
pub async fn retry_until<F, Fut>(timeout: Duration, pause: Duration, mut attempt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if attempt().await {
            return true;
        }
        if let Some(deadline) = deadline {
            let next = Instant::now().checked_add(pause);
            if next.map_or(true, |next| next >= deadline) {
                return false;
            }
        }
        tokio::time::sleep(pause).await;
    }
}

/// Wake all agents, then wait for `machine_agent_id` to heartbeat on RSE.
///
/// Each phase gets the full `timeout`.
pub async fn wake_and_confirm(
    client: &ApiClient,
    rse: &Rse,
    route: &RseRoute,
    machine_agent_id: u64,
    timeout: Duration,
    pause: Duration,
) -> bool {
    let last_status = &AtomicU16::new(0);
    let woke_all = retry_until(timeout, pause, || async move {
        match wake_agents(client).await {
            Ok(status) => {
                last_status.store(status.as_u16(), Ordering::Relaxed);
                status == StatusCode::OK
            }
            Err(e) => {
                debug!("Wake agents request failed: {}", e);
                false
            }
        }
    })
    .await;

    if !woke_all {
        error!(
            "Unable to wake all agents. Status Code = {}",
            last_status.load(Ordering::Relaxed)
        );
        return false;
    }

    let heard = retry_until(timeout, pause, move || {
        rse.monitor_for_heartbeat(route, machine_agent_id)
    })
    .await;

    if !heard {
        error!(
            "Unable to locate agent id ({}) in RSE Heartbeats",
            machine_agent_id
        );
    }
    heard
}

/// Wake period derived from the real-time heartbeat timeout, leaving a margin
pub fn wake_period_from_heartbeat(real_time_timeout_ms: u64) -> Duration {
    let seconds = real_time_timeout_ms as f64 / 1000.0;
    if seconds > 6.0 {
        Duration::from_secs_f64(seconds - 5.0)
    } else if seconds > 2.0 {
        Duration::from_secs_f64(seconds - 1.0)
    } else {
        DEFAULT_WAKE_PERIOD
    }
}

/// Handle to a background task that keeps one agent awake
pub struct KeepAwake {
    machine_agent_id: u64,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl KeepAwake {
    /// Spawn the task.
    ///
    /// Each round wakes the agent (bounded by [`KEEP_AWAKE_WAKE_TIMEOUT`]); after
    /// a confirmed heartbeat it sleeps `period` before the next round, otherwise
    /// it retries straight away. A shutdown signal interrupts either wait.
    pub fn spawn(
        client: ApiClient,
        rse: Rse,
        route: RseRoute,
        machine_agent_id: u64,
        period: Duration,
        pause: Duration,
    ) -> Self {
        let (shutdown, mut signal) = watch::channel(false);
        debug!("Starting RSE Wakeup Thread for agent: {}", machine_agent_id);
        debug!("RSE Wakeup [{}]: period {:?}", machine_agent_id, period);

        let task = tokio::spawn(async move {
            loop {
                if *signal.borrow() {
                    break;
                }

                let awake = tokio::select! {
                    awake = wake_and_confirm(&client, &rse, &route, machine_agent_id, KEEP_AWAKE_WAKE_TIMEOUT, pause) => awake,
                    _ = signal.changed() => break,
                };

                if awake {
                    tokio::select! {
                        _ = tokio::time::sleep(period) => {}
                        _ = signal.changed() => break,
                    }
                } else {
                    debug!("RSE Wakeup [{}]: Failed to wake agent", machine_agent_id);
                }
            }
            debug!("RSE Wakeup [{}]: Terminating", machine_agent_id);
        });

        Self {
            machine_agent_id,
            shutdown,
            task,
        }
    }

    pub fn machine_agent_id(&self) -> u64 {
        self.machine_agent_id
    }

    pub fn signal(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal the task and wait for it to finish
    pub async fn stop(self) {
        debug!(
            "Telling RSE Wakeup Thread for agent {} to terminate",
            self.machine_agent_id
        );
        self.signal();
        if let Err(e) = self.task.await {
            error!(
                "RSE Wakeup Thread for agent {} ended abnormally: {}",
                self.machine_agent_id, e
            );
        }
    }
}
