use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::processing::ClipResampler;
use crate::error::SessionError;

/// Handle of one scheduled playback unit. Allocated by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// Output side of a live session: a clocked device that plays units at
/// absolute times on its own clock.
pub trait AudioOutput: Send {
    /// Acquires the device. Units that finish playing are reported on
    /// `finished`.
    fn open(
        &mut self,
        sample_rate: u32,
        finished: mpsc::UnboundedSender<SourceId>,
    ) -> Result<(), SessionError>;

    /// Seconds elapsed on the output clock since `open`.
    fn current_time(&self) -> f64;

    fn start_source(&mut self, id: SourceId, at: f64, samples: Vec<f32>);

    /// Silences a unit immediately. Stopped units are not reported as finished.
    fn stop_source(&mut self, id: SourceId);

    /// Releases the device. Safe to call repeatedly.
    fn close(&mut self);
}

struct Voice {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Sums scheduled voices into device buffers. Its clock is the number of
/// frames rendered so far.
pub struct Mixer {
    sample_rate: u32,
    frames_rendered: u64,
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames_rendered: 0,
            voices: Vec::new(),
        }
    }

    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    pub fn add(&mut self, id: SourceId, at: f64, samples: Vec<f32>) {
        let start_frame = (at.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        self.voices.push(Voice {
            id,
            start_frame,
            samples,
        });
    }

    pub fn remove(&mut self, id: SourceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|v| v.id != id);
        self.voices.len() != before
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Fills `out` with interleaved frames of `channels` channels, advancing
    /// the clock. Returns the voices that completed within this buffer.
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> Vec<SourceId> {
        let channels = channels.max(1);
        let mut frames = 0u64;
        for frame in out.chunks_mut(channels) {
            let t = self.frames_rendered + frames;
            let mut acc = 0.0f32;
            for voice in &self.voices {
                if t >= voice.start_frame {
                    if let Some(s) = voice.samples.get((t - voice.start_frame) as usize) {
                        acc += s;
                    }
                }
            }
            frame.fill(acc.clamp(-1.0, 1.0));
            frames += 1;
        }
        self.frames_rendered += frames;

        let now = self.frames_rendered;
        let mut finished = Vec::new();
        self.voices.retain(|v| {
            let done = v.end_frame() <= now;
            if done {
                finished.push(v.id);
            }
            !done
        });
        finished
    }
}

/// Picks the rate to run the device at: `preferred` when one of the
/// supported `(min, max)` ranges covers it, else `fallback`.
pub fn choose_device_rate(preferred: u32, supported: &[(u32, u32)], fallback: u32) -> u32 {
    if supported
        .iter()
        .any(|&(min, max)| min <= preferred && preferred <= max)
    {
        preferred
    } else {
        fallback
    }
}

/// Default output device through cpal. The stream lives on its own thread
/// and mixes from a shared [`Mixer`] clocked at the device rate. Units
/// arriving at another rate are resampled before they reach the mixer.
#[derive(Default)]
pub struct CpalPlayback {
    mixer: Option<Arc<Mutex<Mixer>>>,
    converter: Option<ClipResampler>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

type Ready = Result<(Arc<Mutex<Mixer>>, u32), String>;

impl CpalPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_mixer<R>(&self, f: impl FnOnce(&mut Mixer) -> R) -> Option<R> {
        self.mixer
            .as_ref()
            .map(|m| f(&mut m.lock().unwrap_or_else(PoisonError::into_inner)))
    }

    fn shutdown_worker(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl AudioOutput for CpalPlayback {
    fn open(
        &mut self,
        sample_rate: u32,
        finished: mpsc::UnboundedSender<SourceId>,
    ) -> Result<(), SessionError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Ready>(1);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let worker = std::thread::Builder::new()
            .name("locutor-playback".into())
            .spawn(move || {
                let (stream, mixer, device_rate) = match build_output_stream(sample_rate, finished) {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((mixer, device_rate)));
                // Parked until close(); dropping the stream stops the device.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| SessionError::PlaybackUnavailable(e.to_string()))?;

        let (mixer, device_rate) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(reason)) => {
                let _ = worker.join();
                return Err(SessionError::PlaybackUnavailable(reason));
            }
            Err(_) => {
                let _ = worker.join();
                return Err(SessionError::PlaybackUnavailable(
                    "playback thread exited before the stream started".into(),
                ));
            }
        };
        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);

        if device_rate != sample_rate {
            match ClipResampler::new(sample_rate, device_rate) {
                Ok(converter) => {
                    info!("Resampling playback {}Hz -> {}Hz", sample_rate, device_rate);
                    self.converter = Some(converter);
                }
                Err(e) => {
                    self.shutdown_worker();
                    return Err(SessionError::PlaybackUnavailable(e.to_string()));
                }
            }
        }
        self.mixer = Some(mixer);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.with_mixer(|m| m.current_time()).unwrap_or(0.0)
    }

    fn start_source(&mut self, id: SourceId, at: f64, samples: Vec<f32>) {
        if self.mixer.is_none() {
            warn!("Dropping unit {:?}: playback not open", id);
            return;
        }
        // Converted outside the mixer lock; the device callback takes it too.
        let samples = match self.converter.as_mut() {
            Some(converter) => converter.convert(&samples),
            None => samples,
        };
        self.with_mixer(|m| m.add(id, at, samples));
    }

    fn stop_source(&mut self, id: SourceId) {
        self.with_mixer(|m| m.remove(id));
    }

    fn close(&mut self) {
        self.with_mixer(|m| m.clear());
        self.shutdown_worker();
        self.mixer = None;
        self.converter = None;
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_output_stream(
    sample_rate: u32,
    finished: mpsc::UnboundedSender<SourceId>,
) -> anyhow::Result<(cpal::Stream, Arc<Mutex<Mixer>>, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;

    info!("Audio Output Device: {}", device.name().unwrap_or_default());

    let default_config = device.default_output_config()?;
    let channels = default_config.channels();
    let format = default_config.sample_format();

    let supported: Vec<(u32, u32)> = match device.supported_output_configs() {
        Ok(configs) => configs
            .filter(|c| c.channels() == channels && c.sample_format() == format)
            .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
            .collect(),
        Err(e) => {
            warn!("Could not list output configs: {}", e);
            Vec::new()
        }
    };
    let device_rate = choose_device_rate(sample_rate, &supported, default_config.sample_rate().0);

    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(device_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!("Audio Output Config: Rate={}Hz, Channels={}", device_rate, channels);

    let mixer = Arc::new(Mutex::new(Mixer::new(device_rate)));
    let callback_mixer = mixer.clone();
    let err_fn = |err| error!("an error occurred on output stream: {}", err);
    let channels = usize::from(channels);

    let stream = match format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render_into(&callback_mixer, &finished, data, channels);
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => {
            let mut scratch: Vec<f32> = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    render_into(&callback_mixer, &finished, &mut scratch, channels);
                    for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                        *dst = (src * i16::MAX as f32) as i16;
                    }
                },
                err_fn,
                None,
            )?
        }
        other => return Err(anyhow::anyhow!("Unsupported output sample format {:?}", other)),
    };

    stream.play()?;
    Ok((stream, mixer, device_rate))
}

fn render_into(
    mixer: &Mutex<Mixer>,
    finished: &mpsc::UnboundedSender<SourceId>,
    data: &mut [f32],
    channels: usize,
) {
    let done = mixer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .render(data, channels);
    for id in done {
        let _ = finished.send(id);
    }
}
