use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::storage::record_store::RecordStore;

use super::TimerController;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a task that refreshes the elapsed time of the running timer once per
/// period. The task ends when the timer stops, when [Ticker::cancel] is called, or when
/// the handle is dropped.
pub struct Ticker {
    token: CancellationToken,
    elapsed: watch::Receiver<Option<f64>>,
    task: JoinHandle<()>,
}

impl Ticker {
    /// Receives the elapsed minutes after every tick. Becomes `None` once the ticker is
    /// done.
    pub fn subscribe(&self) -> watch::Receiver<Option<f64>> {
        self.elapsed.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the ticking task to end.
    pub async fn finished(&mut self) {
        if let Err(e) = (&mut self.task).await {
            debug!("Ticker task ended abnormally {e:?}");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<S: RecordStore + 'static> TimerController<S> {
    /// Spawns a ticker for the current run. Returns `None` when nothing is running.
    pub async fn spawn_ticker(self: &Arc<Self>, period: Duration) -> Option<Ticker> {
        let token = self.run_token().await?.child_token();
        let (sender, elapsed) = watch::channel(None);
        let task = tokio::spawn(run_ticker(self.clone(), token.clone(), period, sender));
        Some(Ticker {
            token,
            elapsed,
            task,
        })
    }
}

/// Executes the ticker loop.
async fn run_ticker<S: RecordStore + 'static>(
    controller: Arc<TimerController<S>>,
    token: CancellationToken,
    period: Duration,
    sender: watch::Sender<Option<f64>>,
) {
    let mut tick_point = controller.clock.instant();
    loop {
        let Some(elapsed) = controller.tick().await else {
            break;
        };
        sender.send_replace(Some(elapsed));

        tick_point += period;
        tokio::select! {
            // Cancelled either by the handle or by the run ending.
            _ = token.cancelled() => break,
            _ = controller.clock.sleep_until(tick_point) => ()
        }
    }
    sender.send_replace(None);
    debug!("Ticker finished");
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{TimeZone, Utc};

    use crate::{
        storage::record_store::MemoryRecordStore,
        timer::{ticker::TICK_PERIOD, TimerController},
        utils::clock::testing::ManualClock,
    };

    fn controller() -> (Arc<TimerController<MemoryRecordStore>>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        let timer = TimerController::new(MemoryRecordStore::new(), Box::new(clock.clone()));
        (Arc::new(timer), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_publishes_elapsed_time() -> Result<()> {
        let (timer, clock) = controller();
        timer.start(None, None).await?;
        let ticker = timer.spawn_ticker(TICK_PERIOD).await.expect("timer is running");
        let mut elapsed = ticker.subscribe();

        clock.advance(chrono::Duration::seconds(90 * 60 + 30));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(*elapsed.borrow_and_update(), Some(90.5));
        assert_eq!(timer.snapshot().await.formatted_elapsed_time(), "01:30:30");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_ends_when_timer_stops() -> Result<()> {
        let (timer, _) = controller();
        timer.start(None, None).await?;
        let mut ticker = timer.spawn_ticker(TICK_PERIOD).await.expect("timer is running");
        let elapsed = ticker.subscribe();

        timer.stop().await?;
        ticker.finished().await;

        assert_eq!(*elapsed.borrow(), None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_ticker_cancels_it() -> Result<()> {
        let (timer, _) = controller();
        timer.start(None, None).await?;
        let ticker = timer.spawn_ticker(TICK_PERIOD).await.expect("timer is running");
        let mut elapsed = ticker.subscribe();
        elapsed.wait_for(Option::is_some).await?;

        drop(ticker);

        elapsed.wait_for(Option::is_none).await?;
        assert!(timer.snapshot().await.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn no_ticker_without_running_timer() {
        let (timer, _) = controller();

        assert!(timer.spawn_ticker(TICK_PERIOD).await.is_none());
    }
}
