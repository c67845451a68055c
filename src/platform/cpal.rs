//! CPAL-based audio platform for desktop (Linux, macOS, Windows)
//!
//! The "context" is a CPAL output stream. `cpal::Stream` is not `Send` on every
//! host, so all streams live on one dedicated audio thread and the platform
//! talks to it over a command channel.

use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{ErrorCode, PlatformError};

use super::primer::generate_primer;
use super::{AudioPlatform, ContextState};

enum Command {
    State(mpsc::Sender<Option<ContextState>>),
    Create(mpsc::Sender<Result<ContextState, PlatformError>>),
    Resume(mpsc::Sender<Result<ContextState, PlatformError>>),
    PlaySilence {
        hold: Duration,
        reply: mpsc::Sender<Result<(), PlatformError>>,
    },
}

/// Desktop audio platform backed by the default CPAL output device.
pub struct CpalPlatform {
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    primer_amplitude: f32,
}

impl CpalPlatform {
    /// Create the platform. The audio thread is started on first use.
    pub fn new(primer_amplitude: f32) -> Self {
        Self {
            commands: Mutex::new(None),
            primer_amplitude,
        }
    }

    fn send(&self, build: impl FnOnce() -> Command) -> Result<(), PlatformError> {
        let mut guard = self.commands.lock().unwrap_or_else(|p| p.into_inner());
        let result = {
            let sender = guard.get_or_insert_with(|| spawn_audio_thread(self.primer_amplitude));
            sender.send(build())
        };
        if result.is_err() {
            // Thread is gone; start over on the next call.
            *guard = None;
            return Err(PlatformError::ContextClosed);
        }
        Ok(())
    }

    fn request<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<T>) -> Command,
        on_disconnect: T,
    ) -> T {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self.send(|| build(reply_tx)).is_err() {
            return on_disconnect;
        }
        reply_rx.recv().unwrap_or(on_disconnect)
    }
}

impl AudioPlatform for CpalPlatform {
    fn context_state(&self) -> Option<ContextState> {
        self.request(Command::State, None)
    }

    fn create_context(&self) -> Result<ContextState, PlatformError> {
        self.request(Command::Create, Err(PlatformError::ContextClosed))
    }

    fn resume(&self) -> Result<ContextState, PlatformError> {
        self.request(Command::Resume, Err(PlatformError::ContextClosed))
    }

    fn play_silent_buffer(&self, hold: Duration) -> Result<(), PlatformError> {
        self.request(
            |reply| Command::PlaySilence { hold, reply },
            Err(PlatformError::ContextClosed),
        )
    }
}

struct AudioThread {
    stream: Option<cpal::Stream>,
    state: Option<ContextState>,
    primer_amplitude: f32,
}

fn spawn_audio_thread(primer_amplitude: f32) -> mpsc::Sender<Command> {
    let (tx, rx) = mpsc::channel::<Command>();

    std::thread::spawn(move || {
        let mut thread = AudioThread {
            stream: None,
            state: None,
            primer_amplitude,
        };
        log::info!("[CpalPlatform] Audio thread started");

        while let Ok(command) = rx.recv() {
            match command {
                Command::State(reply) => {
                    let _ = reply.send(thread.state);
                }
                Command::Create(reply) => {
                    let _ = reply.send(thread.create());
                }
                Command::Resume(reply) => {
                    let _ = reply.send(thread.resume());
                }
                Command::PlaySilence { hold, reply } => {
                    let _ = reply.send(thread.play_silence(hold));
                }
            }
        }

        log::info!("[CpalPlatform] Audio thread exiting");
    });

    tx
}

impl AudioThread {
    fn create(&mut self) -> Result<ContextState, PlatformError> {
        // Drop the previous stream before opening a new one on the same device.
        self.stream = None;
        self.state = None;

        let stream = open_output_stream(None)?;
        // Mirror autoplay policy: a fresh context starts suspended.
        if let Err(err) = stream.pause() {
            log::debug!("[CpalPlatform] Host refused pause on new stream: {}", err);
        }

        self.stream = Some(stream);
        self.state = Some(ContextState::Suspended);
        Ok(ContextState::Suspended)
    }

    fn resume(&mut self) -> Result<ContextState, PlatformError> {
        let stream = match (&self.stream, self.state) {
            (_, Some(ContextState::Closed)) => return Err(PlatformError::ContextClosed),
            (Some(stream), _) => stream,
            (None, _) => {
                return Err(PlatformError::ResumeRejected {
                    reason: "no output stream".to_string(),
                })
            }
        };

        stream.play().map_err(|e| PlatformError::ResumeRejected {
            reason: e.to_string(),
        })?;
        self.state = Some(ContextState::Running);
        Ok(ContextState::Running)
    }

    fn play_silence(&mut self, hold: Duration) -> Result<(), PlatformError> {
        let primer = PrimerParams {
            hold,
            amplitude: self.primer_amplitude,
        };
        let stream = open_output_stream(Some(primer)).map_err(|e| PlatformError::PlaybackFailed {
            reason: e.message(),
        })?;

        stream.play().map_err(|e| PlatformError::PlaybackFailed {
            reason: e.to_string(),
        })?;
        std::thread::sleep(hold);
        drop(stream);
        Ok(())
    }
}

struct PrimerParams {
    hold: Duration,
    amplitude: f32,
}

/// Open an F32 output stream on the default device.
///
/// Without a primer the stream writes digital silence; with one it plays the
/// primer once and then silence.
fn open_output_stream(primer: Option<PrimerParams>) -> Result<cpal::Stream, PlatformError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(PlatformError::NoOutputDevice)?;

    let config = device
        .default_output_config()
        .map_err(|e| PlatformError::ContextCreateFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(PlatformError::ContextCreateFailed {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }

    let stream_config: cpal::StreamConfig = config.into();
    let samples = primer
        .map(|params| {
            generate_primer(
                params.hold,
                stream_config.sample_rate.0,
                stream_config.channels as usize,
                params.amplitude,
            )
        })
        .unwrap_or_default();
    let mut position = 0usize;

    let err_fn = |err: cpal::StreamError| log::warn!("[CpalPlatform] Output stream error: {}", err);

    device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = samples.get(position).copied().unwrap_or(0.0);
                    position = position.saturating_add(1);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| PlatformError::ContextCreateFailed {
            reason: format!("{:?}", e),
        })
}
