//! Serial audio playback.
//!
//! All sound on a client goes through one [`AudioSequencer`]. Requests are
//! queued FIFO and played one clip at a time, so two call-outs never
//! overlap. A failed clip is logged and skipped; the rest of its sequence
//! still plays. An emergency loop preempts everything: the running sequence
//! is stopped, queued sequences are dropped, and new requests are refused
//! until the loop is stopped. Loop plays start at most once per
//! [`LOOP_MIN_PERIOD`].
//!
//! The sequencer is a cloneable handle over a command channel. The worker
//! task owns the [`AudioPlayer`] and the queue.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use queuecall_types::Clip;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Pause before replaying a siren clip that failed to play.
const LOOP_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Shortest time between the starts of two plays of a loop clip. A player
/// that returns at once (no output device) must not spin the worker.
pub const LOOP_MIN_PERIOD: Duration = Duration::from_secs(1);

/// Errors from playing a single clip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The asset for the clip does not exist.
    #[error("audio asset not found: {0}")]
    Missing(String),

    /// The asset exists but could not be decoded.
    #[error("failed to decode {clip}: {reason}")]
    Decode {
        /// The clip being decoded.
        clip: String,
        /// Decoder message.
        reason: String,
    },

    /// The output device refused or failed playback.
    #[error("audio device error: {0}")]
    Device(String),
}

/// Plays one clip to completion.
///
/// `play` resolves when the clip has finished or failed. `stop` must cut
/// off whatever is currently audible; the pending `play` future may then
/// resolve or simply be dropped.
pub trait AudioPlayer: Send + Sync + 'static {
    /// Play `clip` and wait for it to finish.
    fn play(&self, clip: &Clip) -> impl Future<Output = Result<(), PlaybackError>> + Send;

    /// Hard-stop current output.
    fn stop(&self);
}

/// A clip that failed during a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipFailure {
    /// The clip that failed.
    pub clip: Clip,
    /// Why it failed.
    pub error: PlaybackError,
}

/// How a playback request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every clip played.
    Completed,
    /// Every clip was attempted, at least one failed.
    PartialFailure,
    /// An emergency cut the sequence short, or it never started.
    Cancelled,
    /// Refused because an emergency loop was running.
    Suppressed,
}

/// Result of one [`AudioSequencer::play`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Clips that played successfully, in order.
    pub played: Vec<Clip>,
    /// Clips that failed, in order.
    pub failures: Vec<ClipFailure>,
    /// Overall outcome.
    pub outcome: PlaybackOutcome,
}

impl PlaybackReport {
    const fn suppressed() -> Self {
        Self {
            played: Vec::new(),
            failures: Vec::new(),
            outcome: PlaybackOutcome::Suppressed,
        }
    }

    const fn cancelled() -> Self {
        Self {
            played: Vec::new(),
            failures: Vec::new(),
            outcome: PlaybackOutcome::Cancelled,
        }
    }
}

/// Resolves to the [`PlaybackReport`] of one request.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<PlaybackReport>,
}

impl Completion {
    /// Wait until the request has finished, failed or been cancelled.
    pub async fn wait(self) -> PlaybackReport {
        self.rx.await.unwrap_or_else(|_| PlaybackReport::cancelled())
    }
}

enum Command {
    Play {
        sequence: Vec<Clip>,
        done: oneshot::Sender<PlaybackReport>,
    },
    StartLoop(Clip),
    StopLoop,
}

/// Handle to the playback worker.
#[derive(Debug, Clone)]
pub struct AudioSequencer {
    tx: mpsc::UnboundedSender<Command>,
}

impl AudioSequencer {
    /// Spawn the playback worker for `player`. Requires a Tokio runtime.
    pub fn spawn<P: AudioPlayer>(player: P) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            player: Arc::new(player),
            rx,
            queue: VecDeque::new(),
            looping: None,
            closed: false,
        };
        tokio::spawn(worker.run());
        Self { tx }
    }

    /// Queue `sequence` for playback after everything already queued.
    pub fn play(&self, sequence: Vec<Clip>) -> Completion {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Play { sequence, done }).is_err() {
            warn!("audio sequencer is gone, dropping playback request");
        }
        Completion { rx }
    }

    /// Stop everything and loop `clip` until [`stop_loop`](Self::stop_loop).
    ///
    /// Has no effect if a loop is already running.
    pub fn preempt_loop(&self, clip: Clip) {
        if self.tx.send(Command::StartLoop(clip)).is_err() {
            warn!("audio sequencer is gone, cannot start loop");
        }
    }

    /// Hard-stop the loop and return to idle.
    pub fn stop_loop(&self) {
        if self.tx.send(Command::StopLoop).is_err() {
            warn!("audio sequencer is gone, cannot stop loop");
        }
    }
}

struct Pending {
    sequence: Vec<Clip>,
    done: oneshot::Sender<PlaybackReport>,
}

struct Worker<P> {
    player: Arc<P>,
    rx: mpsc::UnboundedReceiver<Command>,
    queue: VecDeque<Pending>,
    looping: Option<Clip>,
    closed: bool,
}

impl<P: AudioPlayer> Worker<P> {
    async fn run(mut self) {
        loop {
            if self.closed {
                if self.looping.take().is_some() {
                    self.player.stop();
                }
                break;
            }
            if let Some(clip) = self.looping.clone() {
                self.loop_once(&clip).await;
                continue;
            }
            if let Some(pending) = self.queue.pop_front() {
                self.run_sequence(pending).await;
                continue;
            }
            match self.rx.recv().await {
                Some(command) => self.accept(command),
                None => self.closed = true,
            }
        }
        debug!(dropped = self.queue.len(), "audio sequencer stopped");
    }

    fn accept(&mut self, command: Command) {
        match command {
            Command::Play { sequence, done } => {
                if self.looping.is_some() {
                    debug!(clips = sequence.len(), "emergency loop running, suppressing playback");
                    let _ = done.send(PlaybackReport::suppressed());
                } else {
                    self.queue.push_back(Pending { sequence, done });
                }
            }
            Command::StartLoop(clip) => {
                if self.looping.is_some() {
                    debug!(clip = %clip, "loop already running");
                    return;
                }
                info!(clip = %clip, cancelled = self.queue.len(), "preempting playback with loop");
                for pending in self.queue.drain(..) {
                    let _ = pending.done.send(PlaybackReport::cancelled());
                }
                self.looping = Some(clip);
            }
            Command::StopLoop => {
                if self.looping.take().is_some() {
                    self.player.stop();
                    info!("loop stopped");
                }
            }
        }
    }

    /// Take one command while something is playing. Returns `true` if the
    /// current playback must be abandoned.
    fn interrupt(&mut self, command: Option<Command>, abandon_on_loop: bool) -> bool {
        match command {
            Some(command) => {
                let was_looping = self.looping.is_some();
                self.accept(command);
                if abandon_on_loop {
                    !was_looping && self.looping.is_some()
                } else {
                    self.looping.is_none()
                }
            }
            None => {
                self.closed = true;
                !abandon_on_loop
            }
        }
    }

    async fn run_sequence(&mut self, pending: Pending) {
        let Pending { sequence, done } = pending;
        let mut played = Vec::with_capacity(sequence.len());
        let mut failures = Vec::new();
        let mut cancelled = false;

        for clip in sequence {
            match self.play_clip(&clip).await {
                Some(Ok(())) => played.push(clip),
                Some(Err(error)) => {
                    warn!(clip = %clip, error = %error, "clip failed, continuing sequence");
                    failures.push(ClipFailure { clip, error });
                }
                None => {
                    cancelled = true;
                    break;
                }
            }
        }

        let outcome = if cancelled {
            PlaybackOutcome::Cancelled
        } else if failures.is_empty() {
            PlaybackOutcome::Completed
        } else {
            PlaybackOutcome::PartialFailure
        };
        let _ = done.send(PlaybackReport {
            played,
            failures,
            outcome,
        });
    }

    /// Play one clip of a queued sequence. `None` means a loop preempted it.
    async fn play_clip(&mut self, clip: &Clip) -> Option<Result<(), PlaybackError>> {
        let player = Arc::clone(&self.player);
        let playback = player.play(clip);
        tokio::pin!(playback);
        loop {
            tokio::select! {
                result = &mut playback => return Some(result),
                command = self.rx.recv(), if !self.closed => {
                    if self.interrupt(command, true) {
                        self.player.stop();
                        return None;
                    }
                }
            }
        }
    }

    /// Play the loop clip once, or until the loop is stopped.
    async fn loop_once(&mut self, clip: &Clip) {
        let started = tokio::time::Instant::now();
        let player = Arc::clone(&self.player);
        let result = {
            let playback = player.play(clip);
            tokio::pin!(playback);
            loop {
                tokio::select! {
                    result = &mut playback => break Some(result),
                    command = self.rx.recv(), if !self.closed => {
                        if self.interrupt(command, false) {
                            break None;
                        }
                    }
                }
            }
        };

        let resume_at = match result {
            Some(Ok(())) => started + LOOP_MIN_PERIOD,
            Some(Err(error)) => {
                warn!(clip = %clip, error = %error, "loop clip failed, retrying");
                tokio::time::Instant::now() + LOOP_RETRY_DELAY
            }
            None => return,
        };
        let delay = tokio::time::sleep_until(resume_at);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                () = &mut delay => break,
                command = self.rx.recv(), if !self.closed => {
                    if self.interrupt(command, false) {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        attempts: Mutex<Vec<Clip>>,
        failing: Vec<Clip>,
    }

    impl AudioPlayer for Recorder {
        async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
            self.attempts.lock().unwrap().push(clip.clone());
            if self.failing.contains(clip) {
                Err(PlaybackError::Missing(clip.to_string()))
            } else {
                Ok(())
            }
        }

        fn stop(&self) {}
    }

    impl Recorder {
        fn attempts(&self) -> Vec<Clip> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl AudioPlayer for Arc<Recorder> {
        async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
            <Recorder as AudioPlayer>::play(self, clip).await
        }

        fn stop(&self) {
            <Recorder as AudioPlayer>::stop(self);
        }
    }

    #[tokio::test]
    async fn plays_sequences_in_order() {
        let sequencer = AudioSequencer::spawn(Recorder::default());
        let first = sequencer.play(vec![Clip::Ding, Clip::TicketNumber(1)]);
        let second = sequencer.play(vec![Clip::Ding, Clip::TicketNumber(2)]);

        let first = first.wait().await;
        let second = second.wait().await;
        assert_eq!(first.outcome, PlaybackOutcome::Completed);
        assert_eq!(first.played, vec![Clip::Ding, Clip::TicketNumber(1)]);
        assert_eq!(second.played, vec![Clip::Ding, Clip::TicketNumber(2)]);
    }

    #[tokio::test]
    async fn missing_clip_is_skipped() {
        let player = Arc::new(Recorder {
            failing: vec![Clip::TicketNumber(7)],
            ..Recorder::default()
        });
        let sequencer = AudioSequencer::spawn(Arc::clone(&player));
        let sequence = vec![Clip::Ding, Clip::TicketNumber(7), Clip::ClinicNumber(3)];
        let report = sequencer.play(sequence.clone()).wait().await;

        assert_eq!(player.attempts(), sequence);
        assert_eq!(report.outcome, PlaybackOutcome::PartialFailure);
        assert_eq!(report.played, vec![Clip::Ding, Clip::ClinicNumber(3)]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].clip, Clip::TicketNumber(7));
    }

    #[tokio::test]
    async fn instant_loop_clip_is_paced() {
        let player = Arc::new(Recorder::default());
        let sequencer = AudioSequencer::spawn(Arc::clone(&player));
        sequencer.preempt_loop(Clip::Emergency);
        tokio::time::sleep(LOOP_MIN_PERIOD / 4).await;

        assert_eq!(player.attempts(), vec![Clip::Emergency]);

        sequencer.stop_loop();
        let resumed = sequencer.play(vec![Clip::Ding]).wait();
        let report = tokio::time::timeout(LOOP_MIN_PERIOD / 2, resumed)
            .await
            .unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
    }

    #[tokio::test]
    async fn requests_during_loop_are_suppressed() {
        let sequencer = AudioSequencer::spawn(Recorder::default());
        sequencer.preempt_loop(Clip::Emergency);
        let report = sequencer.play(vec![Clip::Ding]).wait().await;
        assert_eq!(report.outcome, PlaybackOutcome::Suppressed);

        sequencer.stop_loop();
        let report = sequencer.play(vec![Clip::Ding]).wait().await;
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
    }

    #[tokio::test]
    async fn empty_sequence_completes() {
        let sequencer = AudioSequencer::spawn(Recorder::default());
        let report = sequencer.play(Vec::new()).wait().await;
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert!(report.played.is_empty());
    }
}
