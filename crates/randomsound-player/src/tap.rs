//! PCM tap: a side ffmpeg process decoding the same stream into mono f32
//! chunks for the visualizer.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::debug;

const TAP_WINDOW_SAMPLES: usize = 1024;
const TAP_SAMPLE_RATE: u32 = 44100;

/// Spawn the tap for `url`.  Aborting the returned handle kills ffmpeg.
pub fn spawn_pcm_tap(url: String, tx: broadcast::Sender<Arc<Vec<f32>>>) -> AbortHandle {
    tokio::spawn(async move {
        if let Err(e) = run_pcm_tap(&url, &tx).await {
            debug!("pcm tap exited: {e}");
        }
    })
    .abort_handle()
}

async fn run_pcm_tap(url: &str, tx: &broadcast::Sender<Arc<Vec<f32>>>) -> anyhow::Result<()> {
    let rate = TAP_SAMPLE_RATE.to_string();
    let ffmpeg_bin = randomsound_proto::platform::find_ffmpeg_binary()
        .unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let mut child = Command::new(ffmpeg_bin)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-re",
            "-i",
            url,
            "-vn",
            "-ac",
            "1",
            "-ar",
            rate.as_str(),
            "-f",
            "s16le",
            "pipe:1",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("ffmpeg stdout not captured"))?;
    let mut buf = vec![0u8; TAP_WINDOW_SAMPLES * 2];
    let mut decoder = ChunkDecoder::default();

    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for chunk in decoder.push(&buf[..n]) {
            // no subscribers is fine; the visualizer may be off
            let _ = tx.send(Arc::new(chunk));
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        anyhow::bail!("ffmpeg exited: {}", status);
    }
    Ok(())
}

/// Turns a little-endian s16 byte stream into fixed-size f32 chunks.
/// Reads may split a sample; the odd byte is carried over.
#[derive(Default)]
struct ChunkDecoder {
    carry: Option<u8>,
    samples: Vec<f32>,
}

impl ChunkDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        let mut iter = bytes.iter().copied();
        loop {
            let lo = match self.carry.take() {
                Some(b) => b,
                None => match iter.next() {
                    Some(b) => b,
                    None => break,
                },
            };
            let Some(hi) = iter.next() else {
                self.carry = Some(lo);
                break;
            };
            let sample = i16::from_le_bytes([lo, hi]);
            self.samples.push(sample as f32 / 32768.0);
            if self.samples.len() >= TAP_WINDOW_SAMPLES {
                out.push(std::mem::replace(
                    &mut self.samples,
                    Vec::with_capacity(TAP_WINDOW_SAMPLES),
                ));
            }
        }
        out
    }
}
