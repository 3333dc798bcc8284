use super::progress::{Progress, ProgressTracker};
use super::state::{RunState, SharedState};
use crate::av::{to_nanos, Packet, Rational};
use crate::error::{RemuxError, Result};
use crate::mux::MuxerRegistry;
use crate::remux::ContainerWriter;
use crate::source::{PacketQueue, Source, SourceSlot, SourceStatus};
use futures::future;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use url::Url;

/// Tunables of the download loop.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Upper bound of one queue-empty wait; source liveness is re-checked
    /// every wake.
    pub poll_interval: Duration,
    /// Wall-clock granularity of progress updates.
    pub progress_interval: Duration,
    /// Buffering window imposed on the secondary (audio) source while both
    /// sources are active. A bound against an unbounded audio backlog, not
    /// a synchronization correction.
    pub secondary_buffering_bound: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            progress_interval: Duration::from_secs(1),
            secondary_buffering_bound: Duration::from_millis(100),
        }
    }
}

/// One-shot completion notification of a download run.
///
/// Resolves to `true` on success, `false` on failure or cancellation,
/// delivered once after internal teardown finishes.
pub struct Completion {
    rx: oneshot::Receiver<bool>,
}

impl Completion {
    /// Waits for the run to finish.
    pub async fn wait(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}

type CompletionSender = Arc<Mutex<Option<oneshot::Sender<bool>>>>;

/// Downloads or remuxes the configured sources into a different output
/// container without re-encoding.
///
/// Up to two sources are attached (video drives the run when present,
/// audio is the secondary lane), then [`Downloader::open`] prepares them
/// and [`Downloader::download`] spawns one worker that merges both packet
/// queues by normalized timestamp and forwards them, one at a time, to the
/// container writer.
pub struct Downloader {
    config: DownloaderConfig,
    registry: MuxerRegistry,
    state: Arc<SharedState>,
    progress: Arc<ProgressTracker>,
    video: Option<Arc<dyn Source>>,
    audio: Option<Arc<dyn Source>>,
    writer: Arc<AsyncMutex<Option<ContainerWriter>>>,
    completion: CompletionSender,
    worker: Option<JoinHandle<()>>,
}

impl Downloader {
    /// Creates a downloader with default tunables.
    pub fn new(registry: MuxerRegistry) -> Self {
        Self::with_config(registry, DownloaderConfig::default())
    }

    /// Creates a downloader with explicit tunables.
    pub fn with_config(registry: MuxerRegistry, config: DownloaderConfig) -> Self {
        let progress = Arc::new(ProgressTracker::new(config.progress_interval));
        Self {
            config,
            registry,
            state: Arc::new(SharedState::new()),
            progress,
            video: None,
            audio: None,
            writer: Arc::new(AsyncMutex::new(None)),
            completion: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    /// Attaches the video source. It becomes the driving source of the
    /// run.
    pub fn attach_video(&mut self, source: Arc<dyn Source>) {
        self.video = Some(source);
    }

    /// Attaches the audio source.
    pub fn attach_audio(&mut self, source: Arc<dyn Source>) {
        self.audio = Some(source);
    }

    /// Current run status.
    pub fn status(&self) -> RunState {
        self.state.status()
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    fn driving_source(&self) -> Option<Arc<dyn Source>> {
        self.video.clone().or_else(|| self.audio.clone())
    }

    /// Opens the input on every attached source and prepares the run.
    /// Synchronous to the caller: when this returns the session is in
    /// `Opening` and streams can be inspected on the sources.
    pub async fn open(&mut self, url: &str) -> Result<()> {
        self.dispose().await;

        let Some(driving) = self.driving_source() else {
            return Err(RemuxError::Configuration(
                "no sources attached to the downloader".into(),
            ));
        };
        validate_input(url)?;

        if let Some(video) = &self.video {
            video.open(url).await?;
        }
        if let Some(audio) = &self.audio {
            audio.open(url).await?;
        }

        self.state.mark_opened();
        let duration = if driving.is_live() { 0 } else { driving.duration() };
        self.progress.reset(duration);
        info!("opened {url} (duration: {duration}ns, live: {})", driving.is_live());
        Ok(())
    }

    /// Starts downloading the mapped streams to `path` and returns the
    /// completion handle.
    ///
    /// When `use_recommended_extension` is set and `path` carries no
    /// extension, the driving source's native container extension is
    /// appended. Setup failures (no matching container, zero eligible
    /// streams, header error) fail here, before any worker starts.
    pub async fn download(
        &mut self,
        path: impl AsRef<Path>,
        use_recommended_extension: bool,
    ) -> Result<Completion> {
        if self.state.status() != RunState::Opening || self.state.is_disposed() {
            return Err(RemuxError::Configuration(
                "download requires a freshly opened session".into(),
            ));
        }
        let Some(driving) = self.driving_source() else {
            return Err(RemuxError::Configuration(
                "no sources attached to the downloader".into(),
            ));
        };

        let mut path: PathBuf = path.as_ref().to_path_buf();
        if use_recommended_extension && path.extension().is_none() {
            path.set_extension(driving.container_extension());
        }

        let mut writer = ContainerWriter::open(path, &self.registry)?;
        if let Some(video) = &self.video {
            add_streams(&mut writer, SourceSlot::Primary, video.as_ref());
        }
        if let Some(audio) = &self.audio {
            add_streams(&mut writer, SourceSlot::Secondary, audio.as_ref());
        }
        if !writer.has_streams() {
            return Err(RemuxError::Configuration(
                "no eligible streams to download".into(),
            ));
        }
        writer.write_header().await?;
        info!("downloading to {}", writer.path().display());

        let (tx, rx) = oneshot::channel();
        *self.completion.lock() = Some(tx);
        *self.writer.lock().await = Some(writer);
        self.spawn_worker();
        Ok(Completion { rx })
    }

    /// Requests a pause and waits until the worker has parked. The trailer
    /// is deliberately not written so the run can resume.
    pub async fn pause(&mut self) {
        if self.state.request_pause() {
            if let Some(worker) = self.worker.take() {
                let _ = worker.await;
            }
        }
    }

    /// Resumes a paused run by restarting the worker.
    pub async fn resume(&mut self) -> Result<()> {
        if self.state.status() != RunState::Paused {
            return Err(RemuxError::Configuration(
                "resume requires a paused session".into(),
            ));
        }
        if self.writer.lock().await.is_none() {
            return Err(RemuxError::Configuration(
                "no active download to resume".into(),
            ));
        }
        self.spawn_worker();
        Ok(())
    }

    /// Cancels the run. From an active state the worker still attempts a
    /// best-effort trailer write; from a paused state the output is
    /// released without a trailer.
    pub async fn stop(&mut self) {
        let was_paused = self.state.status() == RunState::Paused;
        self.state.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        if was_paused {
            // No worker is running anymore; finish the teardown here.
            if let Some(mut writer) = self.writer.lock().await.take() {
                writer.dispose();
            }
            stop_sources(&self.video, &self.audio).await;
            self.state.set(RunState::Stopped);
            notify_completion(&self.completion, false);
        }
    }

    /// Stops and releases everything. Idempotent; pending completion
    /// handles resolve to `false`.
    pub async fn dispose(&mut self) {
        if self.state.is_disposed() && self.worker.is_none() {
            return;
        }
        self.stop().await;
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.dispose();
        }
        notify_completion(&self.completion, false);
        self.state.mark_disposed();
    }

    fn spawn_worker(&mut self) {
        let ctx = RunContext {
            config: self.config.clone(),
            state: self.state.clone(),
            progress: self.progress.clone(),
            video: self.video.clone(),
            audio: self.audio.clone(),
            writer: self.writer.clone(),
            completion: self.completion.clone(),
        };
        self.worker = Some(tokio::spawn(run(ctx)));
    }
}

fn validate_input(url: &str) -> Result<()> {
    if Url::parse(url).is_ok() || Path::new(url).exists() {
        Ok(())
    } else {
        Err(RemuxError::Open(format!(
            "input is neither a valid url nor an existing path: {url}"
        )))
    }
}

fn add_streams(writer: &mut ContainerWriter, slot: SourceSlot, source: &dyn Source) {
    for stream in source.streams() {
        if let Err(err) = writer.add_stream(slot, &stream) {
            // Non-fatal: the stream is simply omitted from the output.
            warn!("skipping {slot} stream {}: {err}", stream.index);
        }
    }
}

fn notify_completion(completion: &CompletionSender, success: bool) {
    if let Some(tx) = completion.lock().take() {
        let _ = tx.send(success);
    }
}

async fn stop_sources(video: &Option<Arc<dyn Source>>, audio: &Option<Arc<dyn Source>>) {
    if let Some(video) = video {
        video.stop().await;
    }
    if let Some(audio) = audio {
        audio.stop().await;
    }
}

/// Everything the worker task needs, detached from the `Downloader` so the
/// caller keeps control of the public surface while the loop runs.
struct RunContext {
    config: DownloaderConfig,
    state: Arc<SharedState>,
    progress: Arc<ProgressTracker>,
    video: Option<Arc<dyn Source>>,
    audio: Option<Arc<dyn Source>>,
    writer: Arc<AsyncMutex<Option<ContainerWriter>>>,
    completion: CompletionSender,
}

/// One source's view in the merge loop: its queue plus the per-stream
/// timebases needed to normalize head timestamps.
struct Lane {
    slot: SourceSlot,
    source: Arc<dyn Source>,
    queue: Arc<PacketQueue>,
    time_bases: HashMap<usize, Rational>,
}

impl Lane {
    fn new(slot: SourceSlot, source: Arc<dyn Source>) -> Self {
        let queue = source.packets();
        let time_bases = source
            .streams()
            .into_iter()
            .map(|s| (s.index, s.time_base))
            .collect();
        Self {
            slot,
            source,
            queue,
            time_bases,
        }
    }

    /// Normalized timestamp of the head packet in nanoseconds:
    /// `dts · timebase − source start time`. A head with unset dts (or an
    /// unknown stream) compares as −∞ so it is forwarded immediately.
    fn head_timestamp(&self) -> Option<i64> {
        self.queue.with_head(|p| match p.dts {
            Some(dts) => match self.time_bases.get(&p.stream_index) {
                Some(tb) => to_nanos(dts, *tb) - self.source.start_time(),
                None => i64::MIN,
            },
            None => i64::MIN,
        })
    }

    fn dequeue(&self) -> Option<(SourceSlot, Packet)> {
        self.queue.dequeue().map(|p| (self.slot, p))
    }
}

/// The interleaver: drains both lanes until a terminal condition, merging
/// by normalized timestamp with the secondary (audio) lane winning exact
/// ties.
async fn run(ctx: RunContext) {
    let Some(mut writer) = ctx.writer.lock().await.take() else {
        notify_completion(&ctx.completion, false);
        return;
    };
    let Some(driving) = ctx.video.clone().or_else(|| ctx.audio.clone()) else {
        notify_completion(&ctx.completion, false);
        return;
    };
    let has_both = ctx.video.is_some() && ctx.audio.is_some();

    // Bound the audio backlog while video may stall; restored on exit.
    let mut restore_window = None;
    if has_both {
        if let Some(audio) = &ctx.audio {
            restore_window = Some(audio.buffering_window());
            audio.set_buffering_window(ctx.config.secondary_buffering_bound);
        }
    }

    match (&ctx.video, &ctx.audio) {
        (Some(video), Some(audio)) => {
            let (v, a) = future::join(video.start(), audio.start()).await;
            for result in [v, a] {
                if let Err(err) = result {
                    warn!("source start failed: {err}");
                }
            }
        }
        (Some(single), None) | (None, Some(single)) => {
            if let Err(err) = single.start().await {
                warn!("source start failed: {err}");
            }
        }
        (None, None) => {}
    }

    // The duration may only be known after the sources started.
    let duration = if driving.is_live() { 0 } else { driving.duration() };
    ctx.progress.set_duration(duration);

    let main_slot = if ctx.video.is_some() {
        SourceSlot::Primary
    } else {
        SourceSlot::Secondary
    };
    let main = Lane::new(main_slot, driving.clone());
    let aux = if has_both {
        ctx.audio
            .clone()
            .map(|audio| Lane::new(SourceSlot::Secondary, audio))
    } else {
        None
    };

    // Enter `Running` only from a fresh open or a paused resume; a stop
    // requested before the first iteration must not be overwritten.
    if ctx.state.transition(RunState::Opening, RunState::Running)
        || ctx.state.transition(RunState::Paused, RunState::Running)
    {
        debug!("download loop started (dual-source: {has_both})");
        drain(&ctx, &mut writer, &main, aux.as_ref()).await;
    }

    if let (Some(window), Some(audio)) = (restore_window, &ctx.audio) {
        audio.set_buffering_window(window);
    }

    let status = ctx.state.status();
    if status.is_pausing() {
        // Trailer deliberately unwritten so the run can resume later.
        if let Some(video) = &ctx.video {
            video.pause().await;
        }
        if let Some(audio) = &ctx.audio {
            audio.pause().await;
        }
        ctx.writer.lock().await.replace(writer);
        ctx.state.set(RunState::Paused);
        info!("download paused");
        return;
    }

    // Terminal: a structurally valid partial output beats an unterminated
    // file, so the trailer is attempted even on failure or cancel.
    let trailer_ok = match writer.write_trailer().await {
        Ok(()) => true,
        Err(err) => {
            warn!("trailer write failed: {err}");
            false
        }
    };
    let success = status == RunState::Ended && trailer_ok && !writer.sink_unusable();
    if writer.write_failures() > 0 {
        warn!("{} packet write(s) failed during the run", writer.write_failures());
    }
    writer.dispose();
    stop_sources(&ctx.video, &ctx.audio).await;
    if status == RunState::Stopping {
        ctx.state.set(RunState::Stopped);
    }
    info!("download finished (state: {status}, success: {success})");
    notify_completion(&ctx.completion, success);
}

/// One iteration at a time: merge the lane heads by normalized timestamp
/// and forward the winner, falling into a bounded `QueueEmpty` wait when
/// the required queue(s) are drained. Returns once the state leaves
/// `Running`.
async fn drain(ctx: &RunContext, writer: &mut ContainerWriter, main: &Lane, aux: Option<&Lane>) {
    let has_both = aux.is_some();
    loop {
        let main_empty = main.queue.is_empty();
        let aux_empty = aux.map_or(true, |lane| lane.queue.is_empty());

        if (main_empty && aux_empty) || (has_both && (main_empty || aux_empty)) {
            ctx.state.transition(RunState::Running, RunState::QueueEmpty);

            while main.queue.is_empty() && ctx.state.status() == RunState::QueueEmpty {
                match main.source.status() {
                    SourceStatus::Ended => {
                        ctx.state.set(RunState::Ended);
                        if !main.source.interrupted() {
                            ctx.progress.complete();
                        }
                        break;
                    }
                    status if !status.is_running() => {
                        debug!("driving source is not running (status: {status:?})");
                        if matches!(status, SourceStatus::Pausing | SourceStatus::Paused) {
                            ctx.state.set(RunState::Pausing);
                        } else {
                            ctx.state.set(RunState::Stopping);
                        }
                        break;
                    }
                    _ => {
                        main.queue.wait_for_data(ctx.config.poll_interval).await;
                    }
                }
            }

            if let Some(lane) = aux {
                while lane.queue.is_empty()
                    && ctx.state.status() == RunState::QueueEmpty
                    && lane.source.status().is_running()
                {
                    lane.queue.wait_for_data(ctx.config.poll_interval).await;
                }
            }

            if !ctx.state.transition(RunState::QueueEmpty, RunState::Running) {
                break;
            }
        }

        let selected = if let Some(lane) = aux {
            if lane.queue.is_empty() {
                main.dequeue()
            } else if main.queue.is_empty() {
                lane.dequeue()
            } else {
                let main_ts = main.head_timestamp().unwrap_or(i64::MIN);
                let aux_ts = lane.head_timestamp().unwrap_or(i64::MIN);
                // Audio wins an exact tie.
                if aux_ts <= main_ts {
                    lane.dequeue()
                } else {
                    main.dequeue()
                }
            }
        } else {
            main.dequeue()
        };

        let Some((slot, packet)) = selected else {
            continue;
        };

        // Coarse progress, driven by the primary lane only.
        if slot == main.slot {
            ctx.progress
                .tick(main.source.current_time() + main.source.buffered_duration());
        }

        if let Err(err) = writer.write(slot, packet).await {
            warn!("write failed: {err}");
        }

        if ctx.state.status() != RunState::Running {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_validation() {
        assert!(validate_input("https://example.com/stream.m3u8").is_ok());
        assert!(validate_input("file:///tmp/a.mp4").is_ok());
        assert!(validate_input("Cargo.toml").is_ok());
        assert!(matches!(
            validate_input("no/such/file.mkv"),
            Err(RemuxError::Open(_))
        ));
    }

    #[test]
    fn default_config_bounds() {
        let config = DownloaderConfig::default();
        assert!(config.poll_interval < config.progress_interval);
        assert_eq!(config.secondary_buffering_bound, Duration::from_millis(100));
    }
}
