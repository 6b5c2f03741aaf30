use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use oshxona::Language;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{RealtimeTransport, SessionHandles};
use crate::config::VoiceConfig;

/// Gemini Live `BidiGenerateContent` session over a WebSocket.
#[derive(Debug, Clone)]
pub struct GeminiLive {
    api_key: String,
    url: String,
    model: String,
}

impl GeminiLive {
    pub fn new(api_key: String, config: &VoiceConfig) -> Self {
        Self {
            api_key,
            url: config.live_url.clone(),
            model: config.live_model.clone(),
        }
    }
}

fn setup_message(model: &str, language: Language) -> serde_json::Value {
    let instruction =
        include_str!("../prompts/voice-instruction.md").replace("{language}", language.name());
    json!({
        "setup": {
            "model": format!("models/{model}"),
            "generationConfig": { "responseModalities": ["AUDIO"] },
            "systemInstruction": { "parts": [{ "text": instruction }] },
            "inputAudioTranscription": {}
        }
    })
}

fn audio_message(pcm: &[u8]) -> serde_json::Value {
    json!({
        "realtimeInput": {
            "audio": {
                "data": base64::engine::general_purpose::STANDARD.encode(pcm),
                "mimeType": "audio/pcm;rate=16000"
            }
        }
    })
}

fn decode(message: &Message) -> Option<serde_json::Value> {
    match message {
        Message::Text(text) => serde_json::from_str(text).ok(),
        Message::Binary(bytes) => serde_json::from_slice(bytes).ok(),
        _ => None,
    }
}

/// What the user said, from the input transcription of a server message.
///
/// The model echoes commands back, so its own text and speech are left out.
fn fragments_of(message: &serde_json::Value) -> Vec<String> {
    message
        .pointer("/serverContent/inputTranscription/text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
        .map(|t| vec![t.to_string()])
        .unwrap_or_default()
}

#[async_trait]
impl RealtimeTransport for GeminiLive {
    async fn connect(
        &self,
        language: Language,
        cancel: CancellationToken,
    ) -> Result<SessionHandles> {
        let url = format!("{}?key={}", self.url, self.api_key);
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .context("Connecting to the live session")?;
        let (mut sink, mut stream) = socket.split();

        sink.send(Message::Text(setup_message(&self.model, language).to_string()))
            .await?;
        loop {
            let message = stream
                .next()
                .await
                .ok_or_else(|| anyhow!("Live session closed during setup"))??;
            if let Message::Close(frame) = &message {
                bail!("Live session refused setup: {:?}", frame);
            }
            if decode(&message).is_some_and(|m| m.get("setupComplete").is_some()) {
                break;
            }
        }
        tracing::info!("Live session {} ready", self.model);

        let (audio, mut audio_rx) = mpsc::channel::<Vec<u8>>(32);
        let (fragment_tx, fragments) = mpsc::channel::<String>(32);

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => break,
                    pcm = audio_rx.recv() => match pcm {
                        Some(pcm) => {
                            let message = Message::Text(audio_message(&pcm).to_string());
                            if let Err(e) = sink.send(message).await {
                                tracing::debug!("Live session upload failed: {}", e);
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            sink.close().await.ok();
        });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    message = stream.next() => match message {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(message)) => {
                            let Some(value) = decode(&message) else { continue };
                            for text in fragments_of(&value) {
                                if fragment_tx.send(text).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::debug!("Live session read failed: {}", e);
                            break;
                        }
                    },
                }
            }
        });

        Ok(SessionHandles { audio, fragments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_names_model_and_language() {
        let setup = setup_message("gemini-live", Language::Ru);
        assert_eq!(setup["setup"]["model"], "models/gemini-live");
        let instruction = setup
            .pointer("/setup/systemInstruction/parts/0/text")
            .and_then(|t| t.as_str())
            .unwrap();
        assert!(instruction.contains("Russian"));
    }

    #[test]
    fn audio_is_base64_pcm() {
        let message = audio_message(&[1, 0, 2, 0]);
        assert_eq!(message["realtimeInput"]["audio"]["data"], "AQACAA==");
        assert_eq!(
            message["realtimeInput"]["audio"]["mimeType"],
            "audio/pcm;rate=16000"
        );
    }

    #[test]
    fn only_the_user_speech_is_scanned() {
        let message = json!({
            "serverContent": {
                "modelTurn": { "parts": [{ "text": "Retsept" }, { "inlineData": {} }] },
                "inputTranscription": { "text": "rasm yuklash" },
                "outputTranscription": { "text": "Rasm yuklash" }
            }
        });
        assert_eq!(fragments_of(&message), ["rasm yuklash"]);

        let echo = json!({
            "serverContent": { "outputTranscription": { "text": "Retsept yaratish" } }
        });
        assert!(fragments_of(&echo).is_empty());
        let silence = json!({ "serverContent": { "inputTranscription": { "text": " " } } });
        assert!(fragments_of(&silence).is_empty());
        assert!(fragments_of(&json!({ "setupComplete": {} })).is_empty());
    }

    #[test]
    fn binary_frames_are_json_too() {
        let frame = Message::Binary(br#"{"setupComplete":{}}"#.to_vec());
        assert!(decode(&frame).unwrap().get("setupComplete").is_some());
    }
}
