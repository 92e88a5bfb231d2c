//! The timer tracks at most one running entry. The running entry is kept in a single
//! slot that is validated against the store once, in [TimerController::initialize].
//! Every operation goes through one async mutex, so a start issued while another start
//! or stop is still writing waits for it instead of racing it.

pub mod ticker;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{
    storage::{
        entities::{Entry, EntryPatch, EntrySource, ProjectId},
        record_store::{RecordStore, StoreError},
    },
    utils::clock::Clock,
};

#[derive(Default)]
struct TimerState {
    current: Option<Entry>,
    elapsed_minutes: f64,
    // Cancelled whenever the current run ends, which stops every ticker of that run.
    run_token: Option<CancellationToken>,
}

impl TimerState {
    fn begin(&mut self, entry: Entry, elapsed_minutes: f64) {
        self.clear();
        self.current = Some(entry);
        self.elapsed_minutes = elapsed_minutes;
        self.run_token = Some(CancellationToken::new());
    }

    fn clear(&mut self) {
        if let Some(token) = self.run_token.take() {
            token.cancel();
        }
        self.current = None;
        self.elapsed_minutes = 0.;
    }
}

/// Point in time copy of the timer state.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSnapshot {
    pub current_entry: Option<Entry>,
    pub elapsed_minutes: f64,
}

impl TimerSnapshot {
    pub fn is_running(&self) -> bool {
        self.current_entry.is_some()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.current_entry.as_ref().map(|e| e.start_ts)
    }

    pub fn formatted_elapsed_time(&self) -> String {
        format_elapsed(self.elapsed_minutes)
    }
}

pub struct TimerController<S: RecordStore> {
    store: S,
    clock: Box<dyn Clock>,
    state: Mutex<TimerState>,
}

impl<S: RecordStore> TimerController<S> {
    pub fn new(store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            state: Mutex::new(TimerState::default()),
        }
    }

    /// Adopts the running entry from the store, if there is one. Lookup failures are
    /// logged and leave the timer stopped.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let mut state = self.state.lock().await;
        match self.store.running_entry().await {
            Ok(Some(entry)) => {
                let elapsed = elapsed_minutes(entry.start_ts, self.clock.time());
                info!("Resuming running entry {}", entry.id);
                state.begin(entry, elapsed);
            }
            Ok(None) => {
                debug!("No running entry");
                state.clear();
            }
            Err(e) => {
                error!("Couldn't look up the running entry {e:?}");
                state.clear();
            }
        }
    }

    /// Starts a new timer entry. A timer that is already running is stopped first, and
    /// if that stop fails nothing new is created.
    #[instrument(skip(self, note))]
    pub async fn start(
        &self,
        project_id: Option<ProjectId>,
        note: Option<String>,
    ) -> Result<Entry, StoreError> {
        let mut state = self.state.lock().await;
        if state.current.is_some() {
            self.stop_locked(&mut state).await?;
        }

        let entry = Entry::running(self.clock.time(), EntrySource::Timer)
            .with_project(project_id)
            .with_note(note);
        let entry = self.store.insert_entry(entry).await?;

        info!("Started entry {}", entry.id);
        state.begin(entry.clone(), 0.);
        Ok(entry)
    }

    /// Stops the running timer. Returns the finished entry, or `None` when nothing was
    /// running.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<Option<Entry>, StoreError> {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state).await
    }

    async fn stop_locked(&self, state: &mut TimerState) -> Result<Option<Entry>, StoreError> {
        let Some(current) = state.current.as_ref() else {
            debug!("Stop requested without a running entry");
            return Ok(None);
        };

        // Keeps end strictly after start even if the wall clock stepped backwards.
        let end = self
            .clock
            .time()
            .max(current.start_ts + Duration::milliseconds(1));
        let entry = self
            .store
            .update_entry(current.id, EntryPatch::end_at(end))
            .await?;

        info!("Stopped entry {}", entry.id);
        state.clear();
        Ok(Some(entry))
    }

    /// Recomputes elapsed time. Returns `None` when the timer isn't running.
    pub async fn tick(&self) -> Option<f64> {
        let mut state = self.state.lock().await;
        let start = state.current.as_ref()?.start_ts;
        state.elapsed_minutes = elapsed_minutes(start, self.clock.time());
        Some(state.elapsed_minutes)
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let state = self.state.lock().await;
        TimerSnapshot {
            current_entry: state.current.clone(),
            elapsed_minutes: state.elapsed_minutes,
        }
    }

    async fn run_token(&self) -> Option<CancellationToken> {
        self.state.lock().await.run_token.clone()
    }
}

fn elapsed_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - start).num_milliseconds() as f64 / 60_000.).max(0.)
}

/// Renders fractional minutes as `HH:MM:SS`. Partial seconds are dropped.
pub fn format_elapsed(minutes: f64) -> String {
    // Rounded to whole milliseconds first, as `minutes` comes from a millisecond count.
    let total_seconds = (minutes.max(0.) * 60_000.).round() as u64 / 1000;
    let hours = total_seconds / 3600;
    let whole_minutes = total_seconds / 60 % 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{whole_minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use crate::{
        storage::{
            entities::{Entry, EntrySource, ProjectId},
            record_store::{MemoryRecordStore, MockRecordStore, RecordStore, StoreError},
        },
        timer::{format_elapsed, TimerController},
        utils::{clock::testing::ManualClock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    );

    fn start_time() -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE)
    }

    fn controller(
        store: MemoryRecordStore,
    ) -> (TimerController<MemoryRecordStore>, ManualClock) {
        let clock = ManualClock::new(start_time());
        (TimerController::new(store, Box::new(clock.clone())), clock)
    }

    fn storage_failure() -> StoreError {
        StoreError::Io(std::io::Error::other("disk is gone"))
    }

    #[test]
    fn formats_fractional_minutes() {
        assert_eq!(format_elapsed(90.5), "01:30:30");
        assert_eq!(format_elapsed(0.), "00:00:00");
        assert_eq!(format_elapsed(59.99), "00:59:59");
        assert_eq!(format_elapsed(600.25), "10:00:15");
    }

    #[test]
    fn formats_whole_seconds_exactly() {
        assert_eq!(format_elapsed(61_000. / 60_000.), "00:01:01");
        assert_eq!(format_elapsed(64_000. / 60_000.), "00:01:04");
        assert_eq!(format_elapsed(3_599_999. / 60_000.), "00:59:59");
    }

    #[tokio::test]
    async fn ticked_seconds_show_up_unchanged() -> Result<()> {
        let (timer, clock) = controller(MemoryRecordStore::new());
        timer.start(None, None).await?;

        for second in 1..=7200 {
            clock.advance(Duration::seconds(1));
            timer.tick().await;

            let expected = format!(
                "{:02}:{:02}:{:02}",
                second / 3600,
                second / 60 % 60,
                second % 60
            );
            assert_eq!(timer.snapshot().await.formatted_elapsed_time(), expected);
        }
        Ok(())
    }

    #[tokio::test]
    async fn start_then_stop_produces_one_timer_entry() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryRecordStore::new();
        let (timer, clock) = controller(store.clone());
        let project = ProjectId::new();

        timer.start(Some(project), Some("review".into())).await?;
        clock.advance(Duration::minutes(25));
        let stopped = timer.stop().await?.expect("timer should be running");

        let entries = store.entries().await?;
        assert_eq!(entries, vec![stopped.clone()]);
        assert_eq!(stopped.source, EntrySource::Timer);
        assert_eq!(stopped.project_id, Some(project));
        assert_eq!(stopped.note.as_deref(), Some("review"));
        assert!(stopped.end_ts.unwrap() >= stopped.start_ts);
        assert!(!timer.snapshot().await.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn stop_without_running_timer_is_noop() -> Result<()> {
        let store = MemoryRecordStore::new();
        let (timer, _) = controller(store.clone());

        assert_eq!(timer.stop().await?, None);
        assert_eq!(timer.stop().await?, None);

        assert!(store.entries().await?.is_empty());
        assert!(!timer.snapshot().await.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn stop_at_same_instant_keeps_end_after_start() -> Result<()> {
        let (timer, _) = controller(MemoryRecordStore::new());

        timer.start(None, None).await?;
        let stopped = timer.stop().await?.unwrap();

        assert!(stopped.end_ts.unwrap() > stopped.start_ts);
        Ok(())
    }

    #[tokio::test]
    async fn start_while_running_stops_previous_entry() -> Result<()> {
        let store = MemoryRecordStore::new();
        let (timer, clock) = controller(store.clone());

        let first = timer.start(None, None).await?;
        clock.advance(Duration::minutes(10));
        let second = timer.start(None, Some("next".into())).await?;

        let entries = store.entries().await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().filter(|e| e.is_running()).count(), 1);
        let first = store.entry(first.id).await?.unwrap();
        assert_eq!(first.end_ts, Some(start_time() + Duration::minutes(10)));
        assert_eq!(store.running_entry().await?, Some(second));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_starts_leave_single_running_entry() -> Result<()> {
        let store = MemoryRecordStore::new();
        let (timer, _) = controller(store.clone());
        let timer = Arc::new(timer);

        let (a, b) = tokio::join!(timer.start(None, None), timer.start(None, None));
        a?;
        b?;

        let entries = store.entries().await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().filter(|e| e.is_running()).count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn initialize_adopts_running_entry() -> Result<()> {
        let store = MemoryRecordStore::new();
        let running = store
            .insert_entry(Entry::running(
                start_time() - Duration::seconds(90 * 60 + 30),
                EntrySource::Timer,
            ))
            .await?;
        let (timer, _) = controller(store);

        timer.initialize().await;

        let snapshot = timer.snapshot().await;
        assert_eq!(snapshot.current_entry, Some(running.clone()));
        assert_eq!(snapshot.start_time(), Some(running.start_ts));
        assert_eq!(snapshot.formatted_elapsed_time(), "01:30:30");
        Ok(())
    }

    #[tokio::test]
    async fn initialize_failure_leaves_timer_stopped() {
        let mut store = MockRecordStore::new();
        store
            .expect_running_entry()
            .returning(|| Err(storage_failure()));
        let timer = TimerController::new(store, Box::new(ManualClock::new(start_time())));

        timer.initialize().await;

        assert!(!timer.snapshot().await.is_running());
    }

    #[tokio::test]
    async fn failed_start_does_not_change_state() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert_entry()
            .times(1)
            .returning(|_| Err(storage_failure()));
        let timer = TimerController::new(store, Box::new(ManualClock::new(start_time())));

        let result = timer.start(None, None).await;

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(!timer.snapshot().await.is_running());
    }

    #[tokio::test]
    async fn failed_stop_keeps_running_and_blocks_new_entry() -> Result<()> {
        let running = Entry::running(start_time(), EntrySource::Timer);
        let mut store = MockRecordStore::new();
        let adopted = running.clone();
        store
            .expect_running_entry()
            .returning(move || Ok(Some(adopted.clone())));
        store
            .expect_update_entry()
            .returning(|_, _| Err(storage_failure()));
        store.expect_insert_entry().never();
        let timer = TimerController::new(store, Box::new(ManualClock::new(start_time())));
        timer.initialize().await;

        assert!(timer.stop().await.is_err());
        assert!(timer.start(None, None).await.is_err());

        assert_eq!(timer.snapshot().await.current_entry, Some(running));
        Ok(())
    }

    #[tokio::test]
    async fn tick_recomputes_elapsed_minutes() -> Result<()> {
        let (timer, clock) = controller(MemoryRecordStore::new());

        assert_eq!(timer.tick().await, None);

        timer.start(None, None).await?;
        clock.advance(Duration::seconds(45));

        assert_eq!(timer.tick().await, Some(0.75));
        assert_eq!(timer.snapshot().await.formatted_elapsed_time(), "00:00:45");
        Ok(())
    }
}
