//! Hands-free triggers for the pipeline.
//!
//! Microphone audio is streamed to a realtime speech model and every
//! transcript fragment is scanned for the two commands. The channel is
//! best-effort: a failure anywhere only logs and drops it back to `Off`.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use oshxona::Language;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod gemini_live;
pub mod intents;
mod recorder;

pub use gemini_live::GeminiLive;
pub use intents::Intent;
pub use recorder::Recorder;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VoiceState {
    #[default]
    Off,
    Listening,
}

/// A running audio capture producing 16 kHz 16-bit mono PCM.
#[async_trait]
pub trait AudioCapture: Send {
    /// The next block of samples, `None` once capture has ended.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
    /// Release the capture device.
    async fn stop(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Microphone: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AudioCapture>>;
}

/// Both directions of an open realtime session. Dropping `audio` ends the
/// upload; `fragments` closes when the session does.
pub struct SessionHandles {
    pub audio: mpsc::Sender<Vec<u8>>,
    pub fragments: mpsc::Receiver<String>,
}

#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a session. Everything it spawns must stop once `cancel` fires.
    async fn connect(&self, language: Language, cancel: CancellationToken)
        -> Result<SessionHandles>;
}

struct ActiveSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct VoiceChannel {
    microphone: Arc<dyn Microphone>,
    transport: Arc<dyn RealtimeTransport>,
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Sender<VoiceState>,
    active: Option<ActiveSession>,
}

impl VoiceChannel {
    /// Recognized intents are delivered on `intents`.
    pub fn new(
        microphone: Arc<dyn Microphone>,
        transport: Arc<dyn RealtimeTransport>,
        intents: mpsc::UnboundedSender<Intent>,
    ) -> Self {
        Self {
            microphone,
            transport,
            intents,
            state: watch::Sender::new(VoiceState::Off),
            active: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.state.subscribe()
    }

    /// Start listening, or tear the running session down.
    /// Returns whether a session was started.
    pub async fn toggle(&mut self, language: Language) -> bool {
        match self.active.take() {
            Some(active) if !active.task.is_finished() => {
                Self::shut_down(active).await;
                false
            }
            _ => {
                self.start(language);
                true
            }
        }
    }

    /// Stop listening if a session is running.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            Self::shut_down(active).await;
        }
    }

    fn start(&mut self, language: Language) {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(
            self.microphone.clone(),
            self.transport.clone(),
            language,
            self.intents.clone(),
            self.state.clone(),
            cancel.clone(),
        ));
        self.active = Some(ActiveSession { cancel, task });
    }

    async fn shut_down(active: ActiveSession) {
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            tracing::warn!("Voice session task failed: {}", e);
        }
    }
}

impl Drop for VoiceChannel {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

async fn run_session(
    microphone: Arc<dyn Microphone>,
    transport: Arc<dyn RealtimeTransport>,
    language: Language,
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Sender<VoiceState>,
    cancel: CancellationToken,
) {
    match listen(&*microphone, &*transport, language, &intents, &state, &cancel).await {
        Ok(()) => tracing::info!("Voice session closed"),
        Err(e) => tracing::warn!("Voice session ended: {:#}", e),
    }
    state.send_replace(VoiceState::Off);
}

async fn listen(
    microphone: &dyn Microphone,
    transport: &dyn RealtimeTransport,
    language: Language,
    intents: &mpsc::UnboundedSender<Intent>,
    state: &watch::Sender<VoiceState>,
    cancel: &CancellationToken,
) -> Result<()> {
    let session_cancel = cancel.child_token();
    let SessionHandles {
        audio,
        mut fragments,
    } = tokio::select! {
        handles = transport.connect(language, session_cancel.clone()) => handles?,
        _ = cancel.cancelled() => return Ok(()),
    };
    let mut capture = match microphone.open().await {
        Ok(capture) => capture,
        Err(e) => {
            session_cancel.cancel();
            return Err(e);
        }
    };
    state.send_replace(VoiceState::Listening);
    tracing::info!("Voice assistant listening in {}", language);

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            chunk = capture.next_chunk() => match chunk {
                Ok(Some(pcm)) => {
                    if audio.send(pcm).await.is_err() {
                        break Err(anyhow!("Realtime session stopped accepting audio"));
                    }
                }
                Ok(None) => break Err(anyhow!("Microphone capture ended")),
                Err(e) => break Err(e),
            },
            fragment = fragments.recv() => match fragment {
                Some(text) => {
                    tracing::debug!("Heard: {}", text);
                    for intent in intents::scan(&text) {
                        tracing::info!("Voice intent: {}", intent);
                        // A closed receiver means nobody is listening for intents any more.
                        intents.send(intent).ok();
                    }
                }
                None => break Ok(()),
            },
        }
    };

    if let Err(e) = capture.stop().await {
        tracing::warn!("Could not stop audio capture: {:#}", e);
    }
    drop(audio);
    session_cancel.cancel();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMicrophone {
        stopped: Arc<AtomicBool>,
        fail: bool,
    }

    struct FakeCapture {
        stopped: Arc<AtomicBool>,
        sent: usize,
    }

    #[async_trait]
    impl Microphone for FakeMicrophone {
        async fn open(&self) -> Result<Box<dyn AudioCapture>> {
            if self.fail {
                return Err(anyhow!("no input device"));
            }
            Ok(Box::new(FakeCapture {
                stopped: self.stopped.clone(),
                sent: 0,
            }))
        }
    }

    #[async_trait]
    impl AudioCapture for FakeCapture {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
            if self.sent < 3 {
                self.sent += 1;
                Ok(Some(vec![0; 320]))
            } else {
                std::future::pending().await
            }
        }

        async fn stop(&mut self) -> Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hands each session's far ends to the test.
    #[derive(Default)]
    struct FakeTransport {
        fail: bool,
        connects: AtomicUsize,
        ends: Mutex<Vec<(mpsc::Receiver<Vec<u8>>, mpsc::Sender<String>, CancellationToken)>>,
    }

    #[async_trait]
    impl RealtimeTransport for FakeTransport {
        async fn connect(
            &self,
            _language: Language,
            cancel: CancellationToken,
        ) -> Result<SessionHandles> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("handshake refused"));
            }
            let (audio, audio_rx) = mpsc::channel(8);
            let (fragment_tx, fragments) = mpsc::channel(8);
            self.ends.lock().unwrap().push((audio_rx, fragment_tx, cancel));
            Ok(SessionHandles { audio, fragments })
        }
    }

    fn channel(
        microphone: FakeMicrophone,
        transport: Arc<FakeTransport>,
    ) -> (VoiceChannel, mpsc::UnboundedReceiver<Intent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (VoiceChannel::new(Arc::new(microphone), transport, tx), rx)
    }

    async fn wait_for(channel: &VoiceChannel, wanted: VoiceState) {
        let mut rx = channel.subscribe();
        rx.wait_for(|s| *s == wanted).await.unwrap();
    }

    #[tokio::test]
    async fn fragments_become_intents_and_toggle_tears_down() {
        let microphone = FakeMicrophone::default();
        let stopped = microphone.stopped.clone();
        let transport = Arc::new(FakeTransport::default());
        let (mut voice, mut intents) = channel(microphone, transport.clone());

        assert!(voice.toggle(Language::Uz).await);
        wait_for(&voice, VoiceState::Listening).await;

        let (mut audio, fragments, session_cancel) = transport.ends.lock().unwrap().pop().unwrap();
        assert_eq!(audio.recv().await.unwrap().len(), 320);
        fragments.send("Rasm yuklash".into()).await.unwrap();
        fragments.send("Okay, generating a recipe".into()).await.unwrap();
        assert_eq!(intents.recv().await, Some(Intent::PickImage));
        assert_eq!(intents.recv().await, Some(Intent::GenerateRecipes));

        assert!(!voice.toggle(Language::Uz).await);
        assert_eq!(voice.state(), VoiceState::Off);
        assert!(stopped.load(Ordering::SeqCst));
        assert!(session_cancel.is_cancelled());
    }

    #[tokio::test]
    async fn failed_connect_falls_back_to_off() {
        let transport = Arc::new(FakeTransport {
            fail: true,
            ..Default::default()
        });
        let (mut voice, _intents) = channel(FakeMicrophone::default(), transport.clone());
        assert!(voice.toggle(Language::En).await);
        finished(&mut voice).await;
        assert_eq!(voice.state(), VoiceState::Off);

        // A dead session does not count as running; toggling starts a new one.
        assert!(voice.toggle(Language::En).await);
        voice.stop().await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_microphone_cancels_the_session() {
        let transport = Arc::new(FakeTransport::default());
        let microphone = FakeMicrophone {
            fail: true,
            ..Default::default()
        };
        let (mut voice, _intents) = channel(microphone, transport.clone());
        voice.toggle(Language::Ru).await;
        finished(&mut voice).await;

        assert_eq!(voice.state(), VoiceState::Off);
        let (_, _, session_cancel) = transport.ends.lock().unwrap().pop().unwrap();
        assert!(session_cancel.is_cancelled());
    }

    #[tokio::test]
    async fn remote_close_returns_to_off() {
        let transport = Arc::new(FakeTransport::default());
        let microphone = FakeMicrophone::default();
        let stopped = microphone.stopped.clone();
        let (mut voice, _intents) = channel(microphone, transport.clone());
        voice.toggle(Language::En).await;
        wait_for(&voice, VoiceState::Listening).await;

        let ends = transport.ends.lock().unwrap().pop().unwrap();
        drop(ends);
        wait_for(&voice, VoiceState::Off).await;
        finished(&mut voice).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    /// Wait for the current session task to end on its own.
    async fn finished(voice: &mut VoiceChannel) {
        let active = voice.active.as_mut().unwrap();
        (&mut active.task).await.unwrap();
    }
}
