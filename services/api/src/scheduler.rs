use chrono::{DateTime, Utc};
use outreach_engine::engagement::{
    CancellationToken, DecaySweepReport, EngagementNotifier, EngagementService, EventLedger,
    ProspectRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run the decay sweep every `every` until `cancel` fires.
///
/// The first sweep happens one full interval after start. Cancelling also stops a sweep that is
/// in flight at the next prospect boundary.
pub(crate) fn spawn_decay_scheduler<R, L, N>(
    service: Arc<EngagementService<R, L, N>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        info!(interval_secs = every.as_secs(), "decay scheduler started");

        loop {
            ticker.tick().await;
            if cancel.is_cancelled() {
                break;
            }
            run_once(&service, Utc::now(), &cancel);
        }

        info!("decay scheduler stopped");
    })
}

/// One sweep; failures are logged and retried on the next tick.
pub(crate) fn run_once<R, L, N>(
    service: &EngagementService<R, L, N>,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Option<DecaySweepReport>
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    match service.run_decay_sweep(now, cancel) {
        Ok(report) => Some(report),
        Err(err) => {
            error!(error = %err, "scheduled decay sweep failed");
            None
        }
    }
}
