use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::calibration::{CalibrationRequest, IntrinsicDefaults, TiltGate};
use crate::config::Config;
use crate::detection::TrackedDetection;
use crate::error::Error;
use crate::frame::{Frame, FrameResult};
use crate::history::{self, HistoryStore};
use crate::tracker::Tracker;
use crate::transformer::GroundPlaneTransformer;

/// Per-frame processing: tracking, projection and speed estimation.
///
/// Owns the tracker and the history store, so frames must be fed in arrival
/// order by a single owner. The transformer is shared and may be
/// re-calibrated from elsewhere at any time.
pub struct Pipeline {
    tracker: Tracker,
    history: HistoryStore,
    transformer: Arc<GroundPlaneTransformer>,
}

impl Pipeline {
    pub fn new(config: &Config, transformer: Arc<GroundPlaneTransformer>) -> Self {
        Self {
            tracker: Tracker::new(config.tracker.clone()),
            history: HistoryStore::new(config.history.clone()),
            transformer,
        }
    }

    #[inline]
    pub fn transformer(&self) -> &Arc<GroundPlaneTransformer> {
        &self.transformer
    }

    #[inline]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[inline]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.history.clear();
    }

    pub fn process(&mut self, frame: Frame) -> FrameResult {
        let ids = self.tracker.update(&frame.detections);
        let (sx, sy) = frame.scale();
        let ts = frame.timestamp_ms;

        // one snapshot for the whole frame
        let calibration = self.transformer.snapshot();

        let mut detections = Vec::with_capacity(ids.len());

        for (det, id) in frame.detections.into_iter().zip(ids) {
            let mut tracked = TrackedDetection::new(det, Some(id));

            let snapshot = match &calibration {
                Some(c) => c,
                None => {
                    detections.push(tracked);
                    continue;
                }
            };

            let (gx, gy) = tracked.detection.bbox.scale(sx, sy).ground_contact();

            match snapshot.project(f64::from(gx), f64::from(gy)) {
                Ok(pos) => {
                    tracked.distance_m = Some(history::distance_from_camera(&pos));
                    tracked.speed_mps = self.history.observe(id, ts, pos);
                }
                Err(err) => trace!(id, %err, "ground projection skipped"),
            }

            detections.push(tracked);
        }

        if calibration.is_none() {
            trace!(ts, "frame processed without calibration");
        }

        self.history.prune(ts);

        FrameResult {
            timestamp_ms: ts,
            detections,
            inference_time_ms: frame.inference_time_ms,
        }
    }
}

/// Turns tilt readings and camera height changes into calibrations of a
/// shared transformer, independently of the frame worker.
pub struct Recalibrator {
    transformer: Arc<GroundPlaneTransformer>,
    defaults: IntrinsicDefaults,
    gate: TiltGate,
    request: CalibrationRequest,
}

impl Recalibrator {
    pub fn new(
        config: &Config,
        transformer: Arc<GroundPlaneTransformer>,
        request: CalibrationRequest,
    ) -> Self {
        Self {
            transformer,
            defaults: config.intrinsics,
            gate: config.tilt_gate.clone(),
            request,
        }
    }

    #[inline]
    pub fn request(&self) -> &CalibrationRequest {
        &self.request
    }

    fn apply(&mut self, request: CalibrationRequest) -> Result<(), Error> {
        self.transformer.calibrate(&request.resolve(&self.defaults))?;
        self.request = request;

        Ok(())
    }

    /// Calibrates with the current request, whatever the tilt gate says
    pub fn force(&mut self) -> Result<(), Error> {
        self.apply(self.request)
    }

    /// Returns `true` when the reading passed the gate and was applied.
    ///
    /// A reading the calibration rejects is not remembered by the gate.
    pub fn on_tilt(&mut self, tilt_deg: f64, now_ms: u64) -> Result<bool, Error> {
        if !self.gate.check(tilt_deg, now_ms) {
            return Ok(false);
        }

        self.apply(CalibrationRequest {
            tilt_deg: Some(tilt_deg),
            ..self.request
        })?;
        self.gate.commit(tilt_deg, now_ms);

        Ok(true)
    }

    pub fn set_camera_height(&mut self, camera_height_m: f64) -> Result<(), Error> {
        self.apply(CalibrationRequest {
            camera_height_m,
            ..self.request
        })
    }
}

/// Handle of a pipeline running on its own thread.
///
/// Frames are processed strictly one at a time in submission order and
/// results come back in the same order.
pub struct Worker {
    frames: Sender<Frame>,
    results: Receiver<FrameResult>,
    handle: thread::JoinHandle<Pipeline>,
}

/// Moves `pipeline` onto a dedicated thread; at most `capacity` frames wait
/// in the queue before `submit` blocks.
pub fn spawn_worker(mut pipeline: Pipeline, capacity: usize) -> Worker {
    let (frames_tx, frames_rx) = bounded::<Frame>(capacity.max(1));
    let (results_tx, results_rx) = unbounded();

    let handle = thread::spawn(move || {
        for frame in frames_rx.iter() {
            let result = pipeline.process(frame);

            if results_tx.send(result).is_err() {
                break;
            }
        }

        debug!("pipeline worker stopped");

        pipeline
    });

    Worker {
        frames: frames_tx,
        results: results_rx,
        handle,
    }
}

impl Worker {
    pub fn submit(&self, frame: Frame) -> Result<(), Error> {
        self.frames
            .send(frame)
            .map_err(|_| Error::WorkerDisconnected)
    }

    pub fn recv(&self) -> Result<FrameResult, Error> {
        self.results.recv().map_err(|_| Error::WorkerDisconnected)
    }

    pub fn try_recv(&self) -> Option<FrameResult> {
        self.results.try_recv().ok()
    }

    #[inline]
    pub fn results(&self) -> &Receiver<FrameResult> {
        &self.results
    }

    /// Stops accepting frames, waits for the queued ones and hands the
    /// pipeline back
    pub fn shutdown(self) -> Result<(Pipeline, Vec<FrameResult>), Error> {
        let Worker {
            frames,
            results,
            handle,
        } = self;

        drop(frames);

        let pipeline = handle.join().map_err(|_| Error::WorkerDisconnected)?;
        let pending = results.try_iter().collect();

        Ok((pipeline, pending))
    }
}
