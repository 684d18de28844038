use tracing_subscriber::{EnvFilter, FmtSubscriber};

use locutor::audio::capture::MicrophoneInput;
use locutor::audio::pcm::{decode_base64, bytes_to_float, float_to_pcm16, pcm16_to_bytes};
use locutor::audio::playback::CpalPlayback;
use locutor::audio::processing::FrameResampler;
use locutor::config::LiveConfig;
use locutor::live::transport::loopback;
use locutor::live::{LiveSession, SessionEvent};

/// Manual check of the live path on a workstation: the "remote model" is an
/// echo that plays your microphone back through the speaker scheduler.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("Starting live echo session...");

    let config = LiveConfig::default();
    config.validate()?;

    // 2. Remote end: echo every captured frame back at the output rate
    let (connector, mut remote) = loopback();
    let mut upsampler =
        FrameResampler::new(config.input_sample_rate, config.output_sample_rate, 2400)?;
    tokio::spawn(async move {
        let mut echoed = 0usize;
        while let Some(chunk) = remote.received.recv().await {
            let bytes = match decode_base64(&chunk.data) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("Echo could not decode frame: {}", e);
                    continue;
                }
            };
            let mut out = Vec::new();
            upsampler.push(&bytes_to_float(&bytes), |frame| {
                out.push(pcm16_to_bytes(&float_to_pcm16(frame)))
            });
            for pcm in out {
                if !remote.send_audio(&pcm) {
                    return;
                }
            }
            echoed += 1;
            if echoed % 20 == 0 {
                remote.send_output_transcription(&format!("(echoed {} frames)", echoed));
            }
        }
    });

    // 3. Session with real devices
    let mut session = LiveSession::new(
        config,
        Box::new(connector),
        Box::new(MicrophoneInput::new()),
        Box::new(CpalPlayback::new()),
    );
    let mut events = session.subscribe();
    session.start().await?;
    tracing::info!("Session {} active. Press Ctrl+C to stop.", session.id());

    // 4. Run until interrupted
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(SessionEvent::Transcript(entry)) => {
                    println!("[{:?}] {}", entry.speaker, entry.text);
                }
                Some(SessionEvent::State(state)) => {
                    tracing::info!("Session state: {:?}", state);
                    if state.is_closed() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    session.stop();
    let stats = session.stats();
    tracing::info!(
        "Sent {} frames, scheduled {} chunks ({} after a gap)",
        stats.frames_sent,
        stats.chunks_scheduled,
        stats.gaps
    );
    Ok(())
}
