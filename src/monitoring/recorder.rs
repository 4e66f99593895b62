//! JSONL cycle recorder.
//!
//! One serialised record per line, appended. Buffered, flushed every
//! second and every `FLUSH_EVERY` records; the file is reopened once if a
//! write fails.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};

const FLUSH_EVERY: u32 = 100;

async fn open_writer(path: &str) -> Result<BufWriter<fs::File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("recorder: cannot create {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("recorder: cannot open {}", path))?;

    Ok(BufWriter::new(file))
}


/// Drains `rx` into `path` until the channel closes.
pub async fn run<T: Serialize>(mut rx: mpsc::Receiver<T>, path: String) -> Result<()> {
    tracing::info!("📝 Recorder writing to {}", path);
    let mut writer = open_writer(&path).await?;

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_record = rx.recv() => {
                let Some(record) = maybe_record else {
                    writer.flush().await.ok();
                    tracing::info!("📝 Recorder channel closed, stopped");
                    return Ok(());
                };

                let line = match serde_json::to_string(&record) {
                    Ok(mut line) => {
                        line.push('\n');
                        line
                    }
                    Err(e) => {
                        tracing::error!("❌ Recorder failed to serialize record: {}", e);
                        continue;
                    }
                };

                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    tracing::error!("❌ Recorder write failed, reopening: {}", e);
                    if let Err(e) = writer.flush().await {
                        tracing::error!("❌ Recorder could not flush buffered records: {}", e);
                    }
                    writer = open_writer(&path).await?;
                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                        tracing::error!("❌ Recorder write failed after reopen, dropping record: {}", e);
                        continue;
                    }
                }

                since_flush += 1;
                if since_flush >= FLUSH_EVERY {
                    writer.flush().await.ok();
                    since_flush = 0;
                }
            }

            _ = tick.tick() => {
                writer.flush().await.ok();
                since_flush = 0;
            }
        }
    }
}
