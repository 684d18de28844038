use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::processing::CaptureProcessor;
use crate::error::SessionError;

/// Input side of a live session.
pub trait AudioInput: Send {
    /// Starts capture. Frames of exactly `frame_len` normalized samples at
    /// `sample_rate` are sent on `frames` in capture order. May block while
    /// the platform asks the user for microphone permission.
    fn open(
        &mut self,
        sample_rate: u32,
        frame_len: usize,
        frames: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<(), SessionError>;

    /// Stops capture immediately. Safe to call repeatedly.
    fn close(&mut self);
}

pub struct AudioCapture {
    _stream: cpal::Stream,
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Opens the default input device, preferring `preferred_rate`, and pushes
    /// mono samples into `producer`.
    pub fn new<P>(mut producer: P, preferred_rate: u32) -> Result<Self, anyhow::Error>
    where
        P: Producer<Item = f32> + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        info!("Audio Input Device: {}", device.name().unwrap_or_default());

        let mut selected_config = None;
        for config_range in device.supported_input_configs()? {
            if config_range.min_sample_rate().0 <= preferred_rate
                && config_range.max_sample_rate().0 >= preferred_rate
            {
                selected_config =
                    Some(config_range.with_sample_rate(cpal::SampleRate(preferred_rate)));
                break;
            }
        }

        // Anything else gets resampled downstream.
        let config = match selected_config {
            Some(c) => c,
            None => device.default_input_config()?,
        };
        let sample_rate = config.sample_rate().0;
        let channels = usize::from(config.channels());

        info!("Audio Config Selected: Rate={}Hz, Channels={}", sample_rate, channels);

        let err_fn = |err| error!("an error occurred on stream: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| write_input_data(data, channels, &mut producer),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| write_input_data_i16(data, channels, &mut producer),
                err_fn,
                None,
            )?,
            _ => return Err(anyhow::anyhow!("Unsupported sample format")),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }
}

fn write_input_data<P>(input: &[f32], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    if channels <= 1 {
        // Lossy when the ring is full.
        producer.push_slice(input);
        return;
    }
    for frame in input.chunks(channels) {
        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
        let _ = producer.try_push(mono);
    }
}

fn write_input_data_i16<P>(input: &[i16], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    for frame in input.chunks(channels.max(1)) {
        let sum: f32 = frame.iter().map(|&s| s as f32 / 32768.0).sum();
        let _ = producer.try_push(sum / frame.len() as f32);
    }
}

struct CaptureWorker {
    stop: CancellationToken,
    thread: JoinHandle<()>,
}

/// Default microphone through cpal. Capture and frame processing run on a
/// dedicated thread that owns the stream.
#[derive(Default)]
pub struct MicrophoneInput {
    worker: Option<CaptureWorker>,
}

impl MicrophoneInput {
    pub fn new() -> Self {
        Self::default()
    }
}

// Half a second of 48 kHz audio.
const RING_CAPACITY: usize = 24_000;

impl AudioInput for MicrophoneInput {
    fn open(
        &mut self,
        sample_rate: u32,
        frame_len: usize,
        frames: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<(), SessionError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let stop = CancellationToken::new();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<u32, String>>(1);

        let thread_stop = stop.clone();
        let thread = std::thread::Builder::new()
            .name("locutor-capture".into())
            .spawn(move || {
                let rb = HeapRb::<f32>::new(RING_CAPACITY);
                let (producer, consumer) = rb.split();

                let capture = match AudioCapture::new(producer, sample_rate) {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let processor = match CaptureProcessor::new(
                    consumer,
                    capture.sample_rate,
                    sample_rate,
                    frame_len,
                    frames,
                    thread_stop,
                ) {
                    Ok(p) => p,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(capture.sample_rate));
                processor.run();
                // Stream dropped here, after the processor stops.
                drop(capture);
            })
            .map_err(|e| SessionError::CaptureUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(device_rate)) => {
                info!("Microphone capturing at {}Hz -> {}Hz", device_rate, sample_rate);
                self.worker = Some(CaptureWorker { stop, thread });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(SessionError::CaptureUnavailable(reason))
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::CaptureUnavailable(
                    "capture thread exited before the stream started".into(),
                ))
            }
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.cancel();
            let _ = worker.thread.join();
        }
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.close();
    }
}
