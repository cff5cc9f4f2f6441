use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use conecta_protocol::{Attachment, AttachmentKind};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Name given to the placeholder attachment when recording is impossible.
pub const UNAVAILABLE_LABEL: &str = "Audio unavailable";

pub const VOICE_NOTE_LABEL: &str = "Voice note";

/// URL of the placeholder attachment: an empty data URL.
pub const PLACEHOLDER_URL: &str = "data:,";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("no input device available")]
    NoDevice,

    #[error("input device failed: {0}")]
    Device(String),

    #[error("nothing was recorded")]
    Empty,
}

impl CaptureError {
    /// The environment cannot record at all, as opposed to a recording that
    /// went wrong.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied | CaptureError::NoDevice)
    }
}

/// A microphone the recorder can open
pub trait AudioInput: Send + Sync {
    /// Request access and start delivering encoded chunks.
    fn open(&self) -> Result<mpsc::Receiver<Vec<u8>>, CaptureError>;

    /// Stop delivering chunks and hand the device back.
    fn release(&self);

    fn mime_type(&self) -> &str {
        "audio/webm"
    }
}

/// A finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub chunks: usize,
}

impl Recording {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn into_attachment(self) -> Attachment {
        Attachment {
            kind: AttachmentKind::Audio,
            url: self.data_url(),
            name: Some(VOICE_NOTE_LABEL.to_string()),
        }
    }
}

/// Audio attachment standing in for a recording that could not be made.
pub fn unavailable_attachment() -> Attachment {
    Attachment {
        kind: AttachmentKind::Audio,
        url: PLACEHOLDER_URL.to_string(),
        name: Some(UNAVAILABLE_LABEL.to_string()),
    }
}

/// An open microphone.
///
/// The device is released exactly once: by [`Recorder::stop`], or when the
/// recorder is dropped (including on an early return or a cancelled task).
pub struct Recorder {
    input: Arc<dyn AudioInput>,
    chunks: mpsc::Receiver<Vec<u8>>,
    data: Vec<u8>,
    received: usize,
    released: bool,
}

impl Recorder {
    pub fn start(input: Arc<dyn AudioInput>) -> Result<Self, CaptureError> {
        let chunks = input.open()?;
        tracing::info!(mime_type = input.mime_type(), "Recording started");
        Ok(Self {
            input,
            chunks,
            data: Vec::new(),
            received: 0,
            released: false,
        })
    }

    /// Wait for the next chunk and buffer it. Returns the chunk size, or
    /// `None` once the input has stopped delivering.
    pub async fn next_chunk(&mut self) -> Option<usize> {
        let chunk = self.chunks.recv().await?;
        Some(self.push(chunk))
    }

    pub fn bytes_recorded(&self) -> usize {
        self.data.len()
    }

    /// Release the microphone and assemble everything delivered so far,
    /// including chunks still queued at the time of the call.
    pub fn stop(mut self) -> Result<Recording, CaptureError> {
        self.release();
        while let Ok(chunk) = self.chunks.try_recv() {
            self.push(chunk);
        }

        if self.data.is_empty() {
            return Err(CaptureError::Empty);
        }

        tracing::info!(
            bytes = self.data.len(),
            chunks = self.received,
            "Recording finished"
        );
        Ok(Recording {
            mime_type: self.input.mime_type().to_string(),
            data: std::mem::take(&mut self.data),
            chunks: self.received,
        })
    }

    fn push(&mut self, chunk: Vec<u8>) -> usize {
        let len = chunk.len();
        self.data.extend_from_slice(&chunk);
        self.received += 1;
        len
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.chunks.close();
        self.input.release();
        tracing::debug!("Microphone released");
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.release();
    }
}

/// Record a voice note until `stop` resolves or the input runs dry.
///
/// Denied or missing microphones yield [`unavailable_attachment`] so the
/// message flow can carry on.
pub async fn record_voice_note<F>(input: Arc<dyn AudioInput>, stop: F) -> Result<Attachment, CaptureError>
where
    F: Future<Output = ()>,
{
    let mut recorder = match Recorder::start(input) {
        Ok(recorder) => recorder,
        Err(e) if e.is_unavailable() => {
            tracing::warn!("Microphone unavailable, attaching placeholder: {}", e);
            return Ok(unavailable_attachment());
        }
        Err(e) => return Err(e),
    };

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            chunk = recorder.next_chunk() => {
                if chunk.is_none() {
                    break;
                }
            }
        }
    }

    recorder.stop().map(Recording::into_attachment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Microphone that replays fixed chunks.
    #[derive(Default)]
    struct ScriptedInput {
        chunks: Vec<Vec<u8>>,
        denied: bool,
        keep_open: bool,
        sender: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
        opened: AtomicUsize,
        released: AtomicUsize,
    }

    impl ScriptedInput {
        fn with_chunks(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                ..Default::default()
            }
        }

        fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    impl AudioInput for ScriptedInput {
        fn open(&self) -> Result<mpsc::Receiver<Vec<u8>>, CaptureError> {
            if self.denied {
                return Err(CaptureError::PermissionDenied);
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(self.chunks.len().max(1));
            for chunk in &self.chunks {
                tx.try_send(chunk.clone()).unwrap();
            }
            if self.keep_open {
                *self.sender.lock().unwrap() = Some(tx);
            }
            Ok(rx)
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn chunks_become_an_audio_attachment() {
        let input = Arc::new(ScriptedInput::with_chunks(&[b"abc", b"de"]));

        let attachment = record_voice_note(input.clone(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(attachment.kind, AttachmentKind::Audio);
        assert_eq!(attachment.url, "data:audio/webm;base64,YWJjZGU=");
        assert_eq!(attachment.name.as_deref(), Some(VOICE_NOTE_LABEL));
        assert_eq!(input.released(), 1);
    }

    #[tokio::test]
    async fn denied_access_yields_placeholder() {
        let input = Arc::new(ScriptedInput {
            denied: true,
            ..Default::default()
        });

        let attachment = record_voice_note(input.clone(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(attachment, unavailable_attachment());
        assert_eq!(attachment.name.as_deref(), Some("Audio unavailable"));
        assert_eq!(input.opened.load(Ordering::SeqCst), 0);
        assert_eq!(input.released(), 0);
    }

    #[tokio::test]
    async fn stop_collects_queued_chunks_from_an_open_input() {
        let input = Arc::new(ScriptedInput {
            keep_open: true,
            ..ScriptedInput::with_chunks(&[b"one", b"two", b"three"])
        });

        let mut recorder = Recorder::start(input.clone()).unwrap();
        assert_eq!(recorder.next_chunk().await, Some(3));
        assert_eq!(recorder.bytes_recorded(), 3);

        let recording = recorder.stop().unwrap();
        assert_eq!(recording.data, b"onetwothree".to_vec());
        assert_eq!(recording.chunks, 3);
        assert_eq!(input.released(), 1);
    }

    #[tokio::test]
    async fn stop_signal_ends_an_open_recording() {
        let input = Arc::new(ScriptedInput {
            keep_open: true,
            ..ScriptedInput::with_chunks(&[b"hi"])
        });

        let attachment = record_voice_note(input.clone(), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        })
        .await
        .unwrap();

        assert_eq!(attachment.url, "data:audio/webm;base64,aGk=");
        assert_eq!(input.released(), 1);
    }

    #[tokio::test]
    async fn dropping_a_recorder_releases_the_microphone() {
        let input = Arc::new(ScriptedInput::with_chunks(&[b"x"]));
        let recorder = Recorder::start(input.clone()).unwrap();
        assert_eq!(input.released(), 0);
        drop(recorder);
        assert_eq!(input.released(), 1);
    }

    #[tokio::test]
    async fn empty_recording_is_an_error_and_still_releases() {
        let input = Arc::new(ScriptedInput::default());

        let err = record_voice_note(input.clone(), std::future::pending())
            .await
            .unwrap_err();

        assert_eq!(err, CaptureError::Empty);
        assert!(!err.is_unavailable());
        assert_eq!(input.released(), 1);
    }
}
