use ringbuf::traits::Consumer;
use rubato::{FftFixedIn, Resampler};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AudioError;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Converts device-rate audio to the transport rate and cuts it into
/// fixed-size frames.
pub struct FrameResampler {
    resampler: Option<FftFixedIn<f32>>,
    chunk_in: usize,
    in_buf: Vec<f32>,
    frame_len: usize,
    pending: Vec<f32>,
}

impl FrameResampler {
    pub fn new(in_hz: u32, out_hz: u32, frame_len: usize) -> Result<Self, AudioError> {
        let resampler = if in_hz == out_hz {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(in_hz as usize, out_hz as usize, RESAMPLER_CHUNK_SIZE, 1, 1)
                    .map_err(|e| AudioError::Resample(e.to_string()))?,
            )
        };

        Ok(Self {
            resampler,
            chunk_in: RESAMPLER_CHUNK_SIZE,
            in_buf: Vec::with_capacity(RESAMPLER_CHUNK_SIZE),
            frame_len: frame_len.max(1),
            pending: Vec::with_capacity(frame_len),
        })
    }

    pub fn push(&mut self, mut src: &[f32], mut emit: impl FnMut(&[f32])) {
        if self.resampler.is_none() {
            self.emit_frames(src, &mut emit);
            return;
        }

        while !src.is_empty() {
            let take = (self.chunk_in - self.in_buf.len()).min(src.len());
            self.in_buf.extend_from_slice(&src[..take]);
            src = &src[take..];

            if self.in_buf.len() == self.chunk_in {
                let out = match self.resampler.as_mut() {
                    Some(r) => r.process(&[&self.in_buf[..]], None),
                    None => break,
                };
                match out {
                    Ok(out) => {
                        if let Some(channel) = out.first() {
                            self.emit_frames(channel, &mut emit);
                        }
                    }
                    Err(e) => warn!("Resampler error: {}", e),
                }
                self.in_buf.clear();
            }
        }
    }

    /// Samples held back waiting for a full frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn emit_frames(&mut self, mut data: &[f32], emit: &mut impl FnMut(&[f32])) {
        while !data.is_empty() {
            let take = (self.frame_len - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == self.frame_len {
                emit(&self.pending);
                self.pending.clear();
            }
        }
    }
}

/// Converts whole playback units between rates. Each unit is resampled on
/// its own and comes out at exactly `len * out_hz / in_hz` samples, so unit
/// lengths in seconds survive the conversion.
pub struct ClipResampler {
    resampler: Option<FftFixedIn<f32>>,
    chunk_in: usize,
    in_hz: u32,
    out_hz: u32,
}

// Resampler flushes allowed after the input runs out.
const MAX_FLUSHES: usize = 4;

impl ClipResampler {
    pub fn new(in_hz: u32, out_hz: u32) -> Result<Self, AudioError> {
        let resampler = if in_hz == out_hz {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(in_hz as usize, out_hz as usize, RESAMPLER_CHUNK_SIZE, 1, 1)
                    .map_err(|e| AudioError::Resample(e.to_string()))?,
            )
        };

        Ok(Self {
            resampler,
            chunk_in: RESAMPLER_CHUNK_SIZE,
            in_hz,
            out_hz,
        })
    }

    /// Number of samples `convert` returns for `input_len` samples, rounded.
    pub fn output_len(&self, input_len: usize) -> usize {
        let in_hz = u64::from(self.in_hz.max(1));
        ((input_len as u64 * u64::from(self.out_hz) + in_hz / 2) / in_hz) as usize
    }

    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        let target = self.output_len(samples.len());
        let chunk_in = self.chunk_in;
        let resampler = match self.resampler.as_mut() {
            Some(r) => r,
            None => return samples.to_vec(),
        };
        resampler.reset();
        let delay = resampler.output_delay();
        let mut out: Vec<f32> = Vec::with_capacity(target + delay);

        let mut rest = samples;
        while rest.len() >= chunk_in {
            match resampler.process(&[&rest[..chunk_in]], None) {
                Ok(chunk) => out.extend(chunk.into_iter().flatten()),
                Err(e) => {
                    warn!("Resampler error: {}", e);
                    break;
                }
            }
            rest = &rest[chunk_in..];
        }
        if !rest.is_empty() {
            let tail = [rest];
            match resampler.process_partial(Some(&tail[..]), None) {
                Ok(chunk) => out.extend(chunk.into_iter().flatten()),
                Err(e) => warn!("Resampler error: {}", e),
            }
        }
        // Drain what the filter still holds back.
        for _ in 0..MAX_FLUSHES {
            if out.len() >= delay + target {
                break;
            }
            match resampler.process_partial(None::<&[&[f32]]>, None) {
                Ok(chunk) => out.extend(chunk.into_iter().flatten()),
                Err(e) => {
                    warn!("Resampler error: {}", e);
                    break;
                }
            }
        }

        out.drain(..delay.min(out.len()));
        out.resize(target, 0.0);
        out
    }
}

/// Drains the capture ring buffer and forwards fixed frames until stopped or
/// until nobody is listening.
pub struct CaptureProcessor<C>
where
    C: Consumer<Item = f32> + Send,
{
    consumer: C,
    frames: mpsc::UnboundedSender<Vec<f32>>,
    stop: CancellationToken,
    resampler: FrameResampler,
    device_rate: u32,
}

impl<C> CaptureProcessor<C>
where
    C: Consumer<Item = f32> + Send,
{
    pub fn new(
        consumer: C,
        device_rate: u32,
        target_rate: u32,
        frame_len: usize,
        frames: mpsc::UnboundedSender<Vec<f32>>,
        stop: CancellationToken,
    ) -> Result<Self, AudioError> {
        Ok(Self {
            consumer,
            frames,
            stop,
            resampler: FrameResampler::new(device_rate, target_rate, frame_len)?,
            device_rate,
        })
    }

    pub fn run(mut self) {
        info!("Capture Processor Started. Rate: {}Hz", self.device_rate);

        // 10ms of device audio per read.
        let read_len = (self.device_rate as usize / 100).max(1);
        let mut buf: Vec<f32> = vec![0.0; read_len];

        while !self.stop.is_cancelled() {
            if self.consumer.occupied_len() < read_len {
                std::thread::sleep(std::time::Duration::from_millis(10));
                continue;
            }

            let n = self.consumer.pop_slice(&mut buf);
            let frames = &self.frames;
            let mut closed = false;
            self.resampler.push(&buf[..n], |frame| {
                if frames.send(frame.to_vec()).is_err() {
                    closed = true;
                }
            });
            if closed {
                debug!("Frame receiver dropped; stopping capture processor");
                break;
            }
        }

        info!("Capture Processor Stopped.");
    }
}
