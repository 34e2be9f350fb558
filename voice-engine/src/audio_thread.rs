//! Dedicated OS thread hosting the `!Send` capture and playback resources.
//!
//! cpal's `Stream` and rodio's `OutputStream` cannot cross a thread
//! boundary; rather than fight that, this actor owns both for their entire
//! lifetime on one OS thread and the rest of the engine talks to it over
//! channels, exactly as the audio capture/playback device handles in §5 are
//! "owned by C2/C3 respectively" with teardown on every exit path.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tracing::debug;
use voice_core::CoreError;

use crate::capture::AudioCapture;
use crate::playback::AudioPlayback;

enum AudioCommand {
    StartCapture {
        frame_samples: usize,
        frame_tx: std_mpsc::Sender<Vec<i16>>,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    StopCapture {
        reply: oneshot::Sender<()>,
    },
    StartPlayback {
        sample_rate: u32,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    WritePlayback {
        chunk: Vec<i16>,
        reply: oneshot::Sender<bool>,
    },
    EndPlayback {
        reply: oneshot::Sender<()>,
    },
    StopPlayback {
        reply: oneshot::Sender<()>,
    },
    IsPlaying {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Handle used by the rest of the engine to talk to the audio thread.
pub struct AudioThreadHandle {
    cmd_tx: std_mpsc::Sender<AudioCommand>,
    thread: Option<JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread. Blocks briefly on startup to surface device
    /// acquisition failures (fatal per §7) before returning.
    pub fn spawn() -> Result<Self, CoreError> {
        let (cmd_tx, cmd_rx) = std_mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = std_mpsc::channel::<Result<(), CoreError>>();

        let thread = std::thread::Builder::new()
            .name("voicebridge-audio".to_string())
            .spawn(move || run(cmd_rx, init_tx))
            .map_err(|e| CoreError::MicUnavailable(e.to_string()))?;

        init_rx
            .recv()
            .unwrap_or_else(|_| Err(CoreError::MicUnavailable("audio thread died on startup".into())))?;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    pub async fn start_capture(
        &self,
        frame_samples: usize,
        frame_tx: std_mpsc::Sender<Vec<i16>>,
    ) -> Result<(), CoreError> {
        self.send_and_recv(|reply| AudioCommand::StartCapture {
            frame_samples,
            frame_tx,
            reply,
        })
        .await
    }

    pub async fn stop_capture(&self) {
        let _ = self.query(|reply| AudioCommand::StopCapture { reply }).await;
    }

    pub async fn start_playback(&self, sample_rate: u32) -> Result<(), CoreError> {
        self.send_and_recv(|reply| AudioCommand::StartPlayback { sample_rate, reply })
            .await
    }

    pub async fn write_playback(&self, chunk: Vec<i16>) -> bool {
        self.query(|reply| AudioCommand::WritePlayback { chunk, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn end_playback(&self) {
        let _ = self.query(|reply| AudioCommand::EndPlayback { reply }).await;
    }

    pub async fn stop_playback(&self) {
        let _ = self.query(|reply| AudioCommand::StopPlayback { reply }).await;
    }

    pub async fn is_playing(&self) -> bool {
        self.query(|reply| AudioCommand::IsPlaying { reply })
            .await
            .unwrap_or(false)
    }

    async fn send_and_recv<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, CoreError>>) -> AudioCommand,
    ) -> Result<T, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .map_err(|_| CoreError::MicUnavailable("audio thread is not running".into()))?;
        reply_rx
            .await
            .map_err(|_| CoreError::MicUnavailable("audio thread dropped the reply".into()))?
    }

    async fn query<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> AudioCommand) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx.send(build(reply_tx)).ok()?;
        reply_rx.await.ok()
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(cmd_rx: std_mpsc::Receiver<AudioCommand>, init_tx: std_mpsc::Sender<Result<(), CoreError>>) {
    let mut playback = match AudioPlayback::new() {
        Ok(p) => p,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    let _ = init_tx.send(Ok(()));

    let mut capture: Option<AudioCapture> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            AudioCommand::StartCapture {
                frame_samples,
                frame_tx,
                reply,
            } => {
                let result = AudioCapture::start(frame_samples, frame_tx).map(|c| {
                    capture = Some(c);
                });
                let _ = reply.send(result);
            }
            AudioCommand::StopCapture { reply } => {
                if let Some(mut c) = capture.take() {
                    c.stop();
                }
                let _ = reply.send(());
            }
            AudioCommand::StartPlayback { sample_rate, reply } => {
                let _ = reply.send(playback.start(sample_rate));
            }
            AudioCommand::WritePlayback { chunk, reply } => {
                let _ = reply.send(playback.write(&chunk));
            }
            AudioCommand::EndPlayback { reply } => {
                playback.end();
                let _ = reply.send(());
            }
            AudioCommand::StopPlayback { reply } => {
                playback.stop();
                let _ = reply.send(());
            }
            AudioCommand::IsPlaying { reply } => {
                let _ = reply.send(playback.is_playing());
            }
            AudioCommand::Shutdown => {
                if let Some(mut c) = capture.take() {
                    c.stop();
                }
                playback.stop();
                break;
            }
        }
    }
    debug!("audio thread exiting");
}
