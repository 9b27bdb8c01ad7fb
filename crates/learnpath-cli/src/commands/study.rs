use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Subcommand;
use learnpath_core::storage::{progress_queue, run_writer, WriterStats};
use learnpath_core::{
    Config, ContentProgress, Event, ManualClock, ProgressStore, ProgressWrite,
    StudySession, SystemClock,
};
use serde::Serialize;

use super::{open_service, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StudyAction {
    /// Replay a focus pattern against a content item on a manual clock
    Simulate {
        #[arg(long)]
        student: String,
        #[arg(long)]
        content: String,
        /// Comma-separated tick runs, `f` focused or `u` unfocused (e.g. "70f,20u,60f")
        #[arg(long)]
        pattern: String,
    },
    /// Track a content item against the wall clock for a number of ticks
    Live {
        #[arg(long)]
        student: String,
        #[arg(long)]
        content: String,
        /// Ticks to run before ending the session
        #[arg(long)]
        ticks: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    ticks: u64,
    focused: bool,
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, String> {
    pattern
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|run| {
            let flag = run.chars().last().unwrap_or_default();
            let count = &run[..run.len() - flag.len_utf8()];
            let focused = match flag {
                'f' | 'F' => true,
                'u' | 'U' => false,
                _ => return Err(format!("segment '{run}' must end in 'f' or 'u'")),
            };
            let ticks = count
                .parse()
                .map_err(|_| format!("segment '{run}' has no tick count"))?;
            Ok(Segment { ticks, focused })
        })
        .collect()
}

#[derive(Serialize)]
struct StudyReport {
    ticks: u64,
    writes: usize,
    events: Vec<Event>,
    stored: Option<ContentProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    writer: Option<WriterReport>,
}

#[derive(Serialize)]
struct WriterReport {
    applied: u64,
    stale: u64,
    failed: u64,
}

impl From<WriterStats> for WriterReport {
    fn from(s: WriterStats) -> Self {
        Self {
            applied: s.applied,
            stale: s.stale,
            failed: s.failed,
        }
    }
}

pub fn run(action: StudyAction) -> CmdResult {
    let config = Config::load()?;
    match action {
        StudyAction::Simulate {
            student,
            content,
            pattern,
        } => simulate(&config, &student, &content, &pattern),
        StudyAction::Live {
            student,
            content,
            ticks,
        } => live(&config, &student, &content, ticks),
    }
}

fn simulate(config: &Config, student: &str, content_id: &str, pattern: &str) -> CmdResult {
    let segments = parse_pattern(pattern)?;
    let mut service = open_service(config)?;
    let (_, _, content) = service.catalog().find_content(content_id)?;
    let content = content.clone();
    let prior = service.store().content_progress(student, content_id)?;

    let mut clock = ManualClock::new();
    let mut session = StudySession::new(
        student,
        Vec::<ProgressWrite>::new(),
        config.engagement.autosave_every_ticks,
    )?;
    session.select(&content, prior.as_ref())?;
    let mut ticks = 0;
    for segment in segments {
        session.set_focus(segment.focused);
        clock.advance(segment.ticks);
        ticks += session.run_pending(&mut clock);
    }
    session.end();

    let mut events = session.drain_events();
    let writes = std::mem::take(session.sink_mut());
    for write in &writes {
        events.extend(service.apply_write(write)?.events);
    }
    print_json(&StudyReport {
        ticks,
        writes: writes.len(),
        events,
        stored: service.store().content_progress(student, content_id)?,
        writer: None,
    })
}

fn live(config: &Config, student: &str, content_id: &str, ticks: u64) -> CmdResult {
    let service = open_service(config)?;
    let (_, _, content) = service.catalog().find_content(content_id)?;
    let content = content.clone();
    let prior = service.store().content_progress(student, content_id)?;
    let service = Arc::new(Mutex::new(service));

    let runtime = tokio::runtime::Runtime::new()?;
    let (sink, rx) = progress_queue();
    let writer_service = Arc::clone(&service);
    let writer = runtime.spawn(run_writer(rx, move |write: &ProgressWrite| {
        let mut service = writer_service.lock().unwrap_or_else(|p| p.into_inner());
        service.apply_write(write).map(|ack| ack.outcome)
    }));

    let mut clock = SystemClock::from_millis(config.engagement.tick_ms)?;
    let poll = clock.tick_length() / 4;
    let mut session = StudySession::new(student, sink, config.engagement.autosave_every_ticks)?;
    session.select(&content, prior.as_ref())?;
    tracing::info!(student, content_id, ticks, "live study session started");

    let ran = runtime.block_on(async {
        let mut ran = 0;
        while ran < ticks {
            tokio::time::sleep(poll.max(Duration::from_millis(1))).await;
            ran += session.run_pending(&mut clock);
        }
        ran
    });
    session.end();
    let events = session.drain_events();
    drop(session);

    let stats = runtime.block_on(writer)?;
    let stored = {
        let service = service.lock().unwrap_or_else(|p| p.into_inner());
        service.store().content_progress(student, content_id)?
    };
    print_json(&StudyReport {
        ticks: ran,
        writes: (stats.applied + stats.stale + stats.failed) as usize,
        events,
        stored,
        writer: Some(stats.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_focus_pattern() {
        let segments = parse_pattern("70f, 20u,60F").unwrap();
        assert_eq!(
            segments,
            [
                Segment { ticks: 70, focused: true },
                Segment { ticks: 20, focused: false },
                Segment { ticks: 60, focused: true },
            ]
        );
    }

    #[test]
    fn rejects_bad_segments() {
        assert!(parse_pattern("70x").is_err());
        assert!(parse_pattern("f").is_err());
    }
}
