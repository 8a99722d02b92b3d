//! Sample worker body.
//!
//! Walks its pages in ascending order and logs every record on each page.
//! Records are synthetic (`page * page_size + n`); a real program substitutes
//! its own [`WorkerBody`] that loads and processes one page per iteration.

use crate::config::{SAMPLE_PAGE_SIZE, SAMPLE_PAUSE_MAX, SAMPLE_PAUSE_MIN};
use crate::dispatcher::{WorkContext, WorkerBody};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SampleWorker {
    pub page_size: usize,
    /// Random pause after the last page; `None` disables it
    pub pause: Option<(Duration, Duration)>,
}

impl Default for SampleWorker {
    fn default() -> Self {
        Self {
            page_size: SAMPLE_PAGE_SIZE,
            pause: Some((SAMPLE_PAUSE_MIN, SAMPLE_PAUSE_MAX)),
        }
    }
}

impl SampleWorker {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    pub fn with_pause(mut self, pause: Option<(Duration, Duration)>) -> Self {
        self.pause = pause;
        self
    }

    /// Record identifiers on `page`.
    pub fn records(&self, page: i64) -> Vec<i64> {
        let size = self.page_size as i64;
        (0..size).map(|n| page.saturating_mul(size).saturating_add(n)).collect()
    }

    fn pause_duration(&self) -> Option<Duration> {
        let (min, max) = self.pause?;
        if max <= min {
            return Some(min);
        }
        let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Some(Duration::from_millis(millis as u64))
    }
}

#[async_trait]
impl WorkerBody for SampleWorker {
    async fn run(&self, ctx: &WorkContext) -> anyhow::Result<()> {
        let (start, finish) = (ctx.range.start, ctx.range.end);
        ctx.log(format!("SampleWorker::run [{start}, {finish}] start"));

        for page in ctx.range.pages() {
            // One page is one unit: everything for it is logged before the next begins
            let records = self.records(page);
            for record in &records {
                ctx.log(format!("[{page}, {record}]"));
            }
        }

        if let Some(pause) = self.pause_duration() {
            tokio::time::sleep(pause).await;
        }

        ctx.log(format!("SampleWorker::run [{start}, {finish}] finish"));
        Ok(())
    }
}
