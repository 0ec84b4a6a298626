use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::notifications::dispatcher::NotificationDispatcher;

const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct DigestScheduler {
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl DigestScheduler {
    pub fn spawn(
        dispatcher: Arc<NotificationDispatcher>,
        period: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        let period = period.max(MIN_PERIOD);
        let token = cancellation_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(period_ms = period.as_millis() as u64, "Digest scheduler started");

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,

                    _ = ticker.tick() => {
                        dispatcher.sweep();
                    }
                }
            }

            info!("Digest scheduler stopped");
        });

        Self {
            cancellation_token,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub async fn shutdown(self) {
        self.cancellation_token.cancel();

        if let Err(e) = self.handle.await {
            error!(error = %e, "Digest scheduler task failed");
        }
    }
}
