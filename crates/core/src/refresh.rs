//! The refresh cycle: fetch every source, commit, render, wait, repeat.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{sleep, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    board::{RenderSink, SinkClosed},
    config::Credentials,
    fetch::{bike, bus, train, Endpoints, FetchContext},
    reading::ArrivalReading,
    registry::{EntityId, Registry, SourceKind},
    transport::Transport,
};

/// Source of the reference "now" for a pass.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Reference instant the pass normalised against.
    pub refreshed_at: DateTime<Utc>,
    /// Entities rendered.
    pub entities: usize,
    /// Entities whose fetch failed.
    pub failures: usize,
    /// Wall time spent fetching and rendering.
    pub elapsed: Duration,
}

/// One full fetch-and-render pass over the registry.
pub struct RefreshCycle<T> {
    registry: Registry,
    transport: T,
    credentials: Credentials,
    endpoints: Endpoints,
    zone: Tz,
    clock: Clock,
}

impl<T: Transport> RefreshCycle<T> {
    /// Assemble a cycle over `registry`.
    pub fn new(
        registry: Registry,
        transport: T,
        credentials: Credentials,
        endpoints: Endpoints,
        zone: Tz,
    ) -> Self {
        Self {
            registry,
            transport,
            credentials,
            endpoints,
            zone,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for the reference instant.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Registry with the readings of the last committed pass.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fetch trains, then buses, then bike-share; commit all readings at
    /// once; then push every entity's text to `sink` and present it.
    ///
    /// Per-entity failures become board text and never abort the pass.
    pub async fn run_once<S: RenderSink>(
        &mut self,
        sink: &mut S,
    ) -> Result<CycleReport, SinkClosed> {
        let started = Instant::now();
        let now = (self.clock)();
        let ctx = FetchContext {
            transport: &self.transport,
            endpoints: &self.endpoints,
            zone: self.zone,
            now,
        };

        let mut staged: HashMap<EntityId, ArrivalReading> =
            HashMap::with_capacity(self.registry.len());
        staged.extend(
            train::fetch(
                &ctx,
                &self.credentials.train_key,
                &self.registry.of_kind(SourceKind::Train),
            )
            .await,
        );
        staged.extend(
            bus::fetch(
                &ctx,
                &self.credentials.bus_key,
                &self.registry.of_kind(SourceKind::Bus),
            )
            .await,
        );
        staged.extend(bike::fetch(&ctx, &self.registry.of_kind(SourceKind::BikeShare)).await);

        let failures = staged.values().filter(|reading| reading.is_failure()).count();
        self.registry.commit(staged);

        for entity in self.registry.entities() {
            let text = self
                .registry
                .display_text(&entity.id)
                .unwrap_or_default();
            sink.update_text(&entity.id, &text);
        }
        sink.present()?;

        let report = CycleReport {
            refreshed_at: now,
            entities: self.registry.len(),
            failures,
            elapsed: started.elapsed(),
        };
        info!(
            entities = report.entities,
            failures = report.failures,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Refresh pass complete"
        );
        Ok(report)
    }
}

/// Handle external collaborators use to request an immediate pass.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    sender: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Request a pass. Returns `false` when a request is already pending (the
    /// two are coalesced) or the scheduler has stopped.
    pub fn trigger(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Refresh already pending; trigger coalesced");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Why the scheduler loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured display duration elapsed.
    DeadlineReached,
    /// The render sink went away.
    SinkClosed,
}

/// Owns a [`RefreshCycle`] and its sink and alternates Fetching/Idle.
pub struct Scheduler<T, S> {
    cycle: RefreshCycle<T>,
    sink: S,
    interval: Duration,
    run_for: Option<Duration>,
    triggers: mpsc::Receiver<()>,
    handle: RefreshHandle,
}

impl<T: Transport, S: RenderSink> Scheduler<T, S> {
    /// Create a scheduler that waits `interval` after each pass.
    pub fn new(cycle: RefreshCycle<T>, sink: S, interval: Duration) -> Self {
        let (sender, triggers) = mpsc::channel(1);
        Self {
            cycle,
            sink,
            interval,
            run_for: None,
            triggers,
            handle: RefreshHandle { sender },
        }
    }

    /// Stop after `duration` has elapsed since [`Scheduler::run`] started.
    pub fn run_for(mut self, duration: Option<Duration>) -> Self {
        self.run_for = duration;
        self
    }

    /// Trigger handle for this scheduler.
    pub fn handle(&self) -> RefreshHandle {
        self.handle.clone()
    }

    /// Run passes until the deadline passes or the sink closes.
    ///
    /// A pass always runs to completion before the next wait starts, so at
    /// most one pass is ever in flight.
    pub async fn run(mut self) -> StopReason {
        let deadline = self
            .run_for
            .map(|duration| tokio::time::Instant::now() + duration);

        loop {
            if let Err(err) = self.cycle.run_once(&mut self.sink).await {
                warn!(%err, "Stopping refresh loop");
                return StopReason::SinkClosed;
            }

            if deadline.is_some_and(|at| tokio::time::Instant::now() >= at) {
                return StopReason::DeadlineReached;
            }

            tokio::select! {
                _ = sleep(self.interval) => debug!("Refresh interval elapsed"),
                Some(()) = self.triggers.recv() => debug!("Refresh triggered"),
                _ = wait_until(deadline) => {
                    info!("Display duration elapsed");
                    return StopReason::DeadlineReached;
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
