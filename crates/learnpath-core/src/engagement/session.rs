//! One student's active study session.
//!
//! The session schedules two cadences against the tracker of the open content
//! item: a tick every clock tick and an autosave flush every
//! `autosave_every_ticks`. Switching content, ending the session, or dropping
//! it cancels both cadences and forces a final flush of the outgoing tracker.

use crate::clock::{Clock, Scheduler, TimerHandle};
use crate::course::Content;
use crate::error::{require_id, Result, ValidationError};
use crate::events::Event;
use crate::progress::ContentProgress;

use super::{EngagementTracker, ProgressSink};

/// State the scheduled callbacks operate on.
struct Driver<S> {
    tracker: Option<EngagementTracker>,
    sink: S,
    focused: bool,
    events: Vec<Event>,
}

impl<S: ProgressSink> Driver<S> {
    fn on_tick(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            if let Some(event) = tracker.tick(self.focused, &mut self.sink) {
                self.events.push(event);
            }
        }
    }

    fn on_autosave(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.flush(false, &mut self.sink);
        }
    }
}

pub struct StudySession<S: ProgressSink + 'static> {
    student_id: String,
    autosave_every_ticks: u64,
    scheduler: Scheduler<Driver<S>>,
    driver: Driver<S>,
    timers: Vec<TimerHandle>,
}

impl<S: ProgressSink + 'static> StudySession<S> {
    /// # Errors
    /// Returns a validation error for a blank student id or a zero autosave
    /// cadence.
    pub fn new(student_id: impl Into<String>, sink: S, autosave_every_ticks: u64) -> Result<Self> {
        let student_id = student_id.into();
        require_id("student_id", &student_id)?;
        if autosave_every_ticks == 0 {
            return Err(ValidationError::InvalidValue {
                field: "autosave_every_ticks".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }
        Ok(Self {
            student_id,
            autosave_every_ticks,
            scheduler: Scheduler::new(),
            driver: Driver {
                tracker: None,
                sink,
                focused: true,
                events: Vec::new(),
            },
            timers: Vec::new(),
        })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn current(&self) -> Option<&EngagementTracker> {
        self.driver.tracker.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.driver.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.driver.sink
    }

    pub fn is_focused(&self) -> bool {
        self.driver.focused
    }

    /// Whether tick/autosave cadences are currently scheduled.
    pub fn is_counting(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Focus signal from the caller (tab visibility, window focus).
    pub fn set_focus(&mut self, focused: bool) {
        self.driver.focused = focused;
    }

    /// Open `content`, releasing whatever was open before.
    ///
    /// # Errors
    /// Propagates validation errors from [`EngagementTracker::select`]; the
    /// previous content is released even then.
    pub fn select(&mut self, content: &Content, prior: Option<&ContentProgress>) -> Result<()> {
        self.release_current();

        let (tracker, event) =
            EngagementTracker::select(&self.student_id, content, prior, &mut self.driver.sink)?;
        let counting = !tracker.is_satisfied();
        self.driver.events.push(event);
        self.driver.tracker = Some(tracker);

        if counting {
            let tick = self.scheduler.schedule(1, Driver::on_tick)?;
            let autosave = self
                .scheduler
                .schedule(self.autosave_every_ticks, Driver::on_autosave)?;
            self.timers = vec![tick, autosave];
        }
        Ok(())
    }

    /// Step the session by `ticks`. Returns the ticks stepped, whether or
    /// not any cadence fired.
    pub fn advance(&mut self, ticks: u64) -> u64 {
        self.scheduler.advance(ticks, &mut self.driver);
        ticks
    }

    /// Step the session by whatever `clock` reports. Returns the ticks
    /// elapsed on the clock.
    pub fn run_pending(&mut self, clock: &mut dyn Clock) -> u64 {
        let ticks = clock.elapsed_ticks();
        self.advance(ticks)
    }

    /// Close the open content, if any. Safe to call more than once.
    pub fn end(&mut self) {
        self.release_current();
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.driver.events)
    }

    fn release_current(&mut self) {
        for handle in self.timers.drain(..) {
            self.scheduler.cancel(handle);
        }
        if let Some(tracker) = self.driver.tracker.take() {
            let event = tracker.release(&mut self.driver.sink);
            self.driver.events.push(event);
        }
    }
}

impl<S: ProgressSink + 'static> Drop for StudySession<S> {
    fn drop(&mut self) {
        self.release_current();
    }
}

impl<S: ProgressSink + 'static> std::fmt::Debug for StudySession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudySession")
            .field("student_id", &self.student_id)
            .field("current", &self.driver.tracker)
            .field("focused", &self.driver.focused)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::course::ContentType;
    use crate::engagement::ProgressWrite;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Sink that stays readable after the session is dropped.
    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<ProgressWrite>>>);

    impl ProgressSink for SharedSink {
        fn submit(&mut self, write: ProgressWrite) {
            self.0.borrow_mut().push(write);
        }
    }

    fn content(id: &str, min: u64) -> Content {
        Content {
            id: id.into(),
            title: String::new(),
            content_type: ContentType::Video,
            url: None,
            min_engagement_seconds: min,
        }
    }

    #[test]
    fn autosaves_on_cadence() {
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.select(&content("c1", 600), None).unwrap();
        session.advance(25);
        let seconds: Vec<u64> = session.sink().iter().map(|w| w.engaged_seconds).collect();
        assert_eq!(seconds, [10, 20]);
        assert!(session.sink().iter().all(|w| !w.forced));
    }

    #[test]
    fn unfocused_autosave_before_any_engagement_is_suppressed() {
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.set_focus(false);
        session.select(&content("c1", 600), None).unwrap();
        session.advance(30);
        assert!(session.sink().is_empty());
    }

    #[test]
    fn switching_content_flushes_and_cancels() {
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.select(&content("c1", 600), None).unwrap();
        session.advance(4);
        session.select(&content("c2", 600), None).unwrap();
        session.advance(3);

        let last_c1 = session
            .sink()
            .iter()
            .filter(|w| w.content_id == "c1")
            .last()
            .cloned()
            .unwrap();
        assert_eq!(last_c1.engaged_seconds, 4);
        assert!(last_c1.forced);
        assert_eq!(session.current().unwrap().content_id(), "c2");
        assert_eq!(session.current().unwrap().engaged_seconds(), 3);
    }

    #[test]
    fn satisfied_content_schedules_nothing() {
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.select(&content("doc", 0), None).unwrap();
        assert!(!session.is_counting());
        assert_eq!(session.advance(50), 50);
        assert_eq!(session.current().unwrap().engaged_seconds(), 0);
    }

    #[test]
    fn drop_forces_final_flush() {
        let sink = SharedSink::default();
        {
            let mut session = StudySession::new("s1", sink.clone(), 10).unwrap();
            session.select(&content("c1", 600), None).unwrap();
            session.advance(7);
        }
        let writes = sink.0.borrow();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].engaged_seconds, 7);
        assert!(writes[0].forced);
    }

    #[test]
    fn end_is_idempotent() {
        let sink = SharedSink::default();
        let mut session = StudySession::new("s1", sink.clone(), 10).unwrap();
        session.select(&content("c1", 600), None).unwrap();
        session.advance(2);
        session.end();
        session.end();
        drop(session);
        assert_eq!(sink.0.borrow().len(), 1);
    }

    #[test]
    fn runs_from_manual_clock() {
        let mut clock = ManualClock::new();
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 5).unwrap();
        session.select(&content("c1", 8), None).unwrap();
        clock.advance(9);
        assert_eq!(session.run_pending(&mut clock), 9);

        let events = session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ContentCompleted { engaged_seconds: 8, .. })));
        // autosave at 5, forced completion flush at 8
        let seconds: Vec<u64> = session.sink().iter().map(|w| w.engaged_seconds).collect();
        assert_eq!(seconds, [5, 8]);
    }

    #[test]
    fn advance_reports_ticks_not_cadence_firings() {
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.select(&content("c1", 120), None).unwrap();
        let ran = session.advance(70) + session.advance(20) + session.advance(60);
        assert_eq!(ran, 150);
    }

    #[test]
    fn satisfied_content_still_reports_clock_ticks() {
        let mut clock = ManualClock::new();
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.select(&content("doc", 0), None).unwrap();
        clock.advance(3);
        assert_eq!(session.run_pending(&mut clock), 3);
    }

    #[test]
    fn rejects_zero_autosave_cadence() {
        assert!(StudySession::new("s1", Vec::<ProgressWrite>::new(), 0).is_err());
    }
}
