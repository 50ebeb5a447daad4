use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::UploadError;
use crate::nav::{Navigator, SlideChange};
use crate::slides::Slide;
use crate::upload::{Converter, SelectedFile, UploadPoll, UploadSession};

/// Keys the viewer reacts to while a deck is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    ArrowDown,
    ArrowUp,
    Escape,
}

/// Application state: the deck, the navigator over it, the menu and any
/// outstanding upload.
///
/// `slides` only changes through a successful upload or [`ViewerState::reset`],
/// and both rebuild the navigator, so `current` is always back at 0 after
/// the deck is replaced.
pub struct ViewerState {
    slides: Vec<Slide>,
    nav: Navigator,
    menu_open: bool,
    upload: Option<UploadSession>,
    generation: u64,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerState {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            nav: Navigator::new(0),
            menu_open: false,
            upload: None,
            generation: 0,
        }
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn has_slides(&self) -> bool {
        !self.nav.is_empty()
    }

    pub fn current(&self) -> usize {
        self.nav.current()
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.slides.get(self.nav.current())
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn menu_open(&self) -> bool {
        self.menu_open
    }

    pub fn set_menu_open(&mut self, open: bool) {
        self.menu_open = open && self.has_slides();
    }

    /// Bumped every time the deck is replaced or cleared.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn upload(&self) -> Option<&UploadSession> {
        self.upload.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// Replace the deck atomically and start over at the first slide.
    pub fn replace_slides(&mut self, slides: Vec<Slide>) {
        info!(slides = slides.len(), "deck loaded");
        self.nav = Navigator::new(slides.len());
        self.slides = slides;
        self.menu_open = false;
        self.upload = None;
        self.generation += 1;
    }

    /// Return to the upload screen.
    pub fn reset(&mut self) {
        self.slides.clear();
        self.nav = Navigator::new(0);
        self.menu_open = false;
        self.generation += 1;
    }

    // ── Uploads ────────────────────────────────────────────────────────────

    /// Start converting `file` in the background. A second request while one
    /// is running is rejected with [`UploadError::AlreadyInProgress`].
    pub fn begin_upload(
        &mut self,
        converter: Arc<dyn Converter>,
        file: SelectedFile,
        now: Instant,
    ) -> Result<(), UploadError> {
        self.start_session(now, |now| UploadSession::spawn(converter, file, now))
    }

    /// Like [`ViewerState::begin_upload`] with a session built by the caller.
    pub fn start_session(
        &mut self,
        now: Instant,
        make: impl FnOnce(Instant) -> UploadSession,
    ) -> Result<(), UploadError> {
        if self.upload.is_some() {
            warn!("upload requested while another is in flight; ignoring");
            return Err(UploadError::AlreadyInProgress);
        }
        self.upload = Some(make(now));
        Ok(())
    }

    /// Drive the outstanding upload. Returns the error to show the user if it
    /// failed; on failure the upload state is cleared and the deck is left
    /// untouched.
    pub fn poll_upload(&mut self, now: Instant) -> Option<UploadError> {
        let session = self.upload.as_mut()?;
        match session.poll(now) {
            UploadPoll::Pending => None,
            UploadPoll::Ready(slides) => {
                self.replace_slides(slides);
                None
            }
            UploadPoll::Failed(e) => {
                self.upload = None;
                Some(e)
            }
        }
    }

    // ── Navigation ─────────────────────────────────────────────────────────
    //
    // All triggers are ignored while the menu is open.

    pub fn next(&mut self, now: Instant) -> Option<SlideChange> {
        if self.menu_open {
            return None;
        }
        self.nav.next(now)
    }

    pub fn previous(&mut self, now: Instant) -> Option<SlideChange> {
        if self.menu_open {
            return None;
        }
        self.nav.previous(now)
    }

    pub fn select(&mut self, index: usize, now: Instant) -> Option<SlideChange> {
        if self.menu_open {
            return None;
        }
        self.nav.select(index, now)
    }

    pub fn wheel(&mut self, delta_y: f32, now: Instant) -> Option<SlideChange> {
        if self.menu_open {
            return None;
        }
        self.nav.wheel(delta_y, now)
    }

    pub fn touch_start(&mut self, y: f32) {
        self.nav.touch_start(y);
    }

    pub fn touch_end(&mut self, y: f32, now: Instant) -> Option<SlideChange> {
        if self.menu_open {
            self.nav.touch_cancel();
            return None;
        }
        self.nav.touch_end(y, now)
    }

    pub fn touch_cancel(&mut self) {
        self.nav.touch_cancel();
    }

    pub fn key(&mut self, key: NavKey, now: Instant) -> Option<SlideChange> {
        if !self.has_slides() {
            return None;
        }
        match key {
            NavKey::ArrowDown => self.next(now),
            NavKey::ArrowUp => self.previous(now),
            NavKey::Escape => {
                self.menu_open = false;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::ProgressEstimator;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::mpsc;
    use std::time::Duration;

    fn deck(n: u32) -> Vec<Slide> {
        (1..=n)
            .map(|page| Slide {
                page,
                image_base64: String::new(),
                text: String::new(),
            })
            .collect()
    }

    fn session(
        rx: mpsc::Receiver<Result<Vec<Slide>, UploadError>>,
    ) -> impl FnOnce(Instant) -> UploadSession {
        move |now| {
            UploadSession::new(
                "deck.pdf".into(),
                rx,
                ProgressEstimator::with_rng(StdRng::seed_from_u64(1)),
                now,
            )
        }
    }

    #[test]
    fn test_starts_empty() {
        let state = ViewerState::new();
        assert!(!state.has_slides());
        assert!(state.current_slide().is_none());
        assert!(!state.is_uploading());
    }

    #[test]
    fn test_replace_resets_current() {
        let t0 = Instant::now();
        let mut state = ViewerState::new();
        state.replace_slides(deck(5));
        state.select(4, t0);
        assert_eq!(state.current(), 4);

        state.set_menu_open(true);
        state.replace_slides(deck(3));
        assert_eq!(state.current(), 0);
        assert!(!state.menu_open());
        assert_eq!(state.slides().len(), 3);
    }

    #[test]
    fn test_menu_blocks_navigation() {
        let t0 = Instant::now();
        let mut state = ViewerState::new();
        state.replace_slides(deck(5));
        state.set_menu_open(true);

        assert_eq!(state.next(t0), None);
        assert_eq!(state.key(NavKey::ArrowDown, t0), None);
        assert_eq!(state.wheel(200.0, t0), None);
        assert_eq!(state.select(3, t0), None);
        state.touch_start(300.0);
        assert_eq!(state.touch_end(100.0, t0), None);
        assert_eq!(state.current(), 0);

        state.key(NavKey::Escape, t0);
        assert!(!state.menu_open());
        assert!(state.key(NavKey::ArrowDown, t0).is_some());
        assert_eq!(state.current(), 1);
    }

    #[test]
    fn test_arrow_keys() {
        let t0 = Instant::now();
        let mut state = ViewerState::new();
        state.replace_slides(deck(3));
        state.key(NavKey::ArrowDown, t0);
        state.key(NavKey::ArrowUp, t0 + Duration::from_secs(1));
        assert_eq!(state.current(), 0);
    }

    #[test]
    fn test_keys_ignored_without_deck() {
        let mut state = ViewerState::new();
        assert_eq!(state.key(NavKey::ArrowDown, Instant::now()), None);
        state.set_menu_open(true);
        assert!(!state.menu_open());
    }

    #[test]
    fn test_reset_returns_to_upload_screen() {
        let mut state = ViewerState::new();
        state.replace_slides(deck(4));
        state.select(2, Instant::now());
        let before = state.generation();
        state.reset();
        assert!(state.generation() > before);
        assert!(!state.has_slides());
        assert_eq!(state.current(), 0);
    }

    #[test]
    fn test_failed_upload_leaves_deck_empty() {
        let (tx, rx) = mpsc::channel();
        let t0 = Instant::now();
        let mut state = ViewerState::new();
        state.start_session(t0, session(rx)).unwrap();
        assert!(state.is_uploading());

        tx.send(Err(UploadError::Backend("bad file".into())))
            .unwrap();
        let err = state.poll_upload(t0).unwrap();
        assert_eq!(err.user_message(), "Upload failed: bad file");
        assert!(!state.is_uploading());
        assert!(!state.has_slides());
    }

    #[test]
    fn test_successful_upload_replaces_deck() {
        let (tx, rx) = mpsc::channel();
        let t0 = Instant::now();
        let mut state = ViewerState::new();
        state.replace_slides(deck(6));
        state.select(5, t0);

        state.start_session(t0, session(rx)).unwrap();
        tx.send(Ok(deck(2))).unwrap();
        assert!(state.poll_upload(t0).is_none());
        assert_eq!(state.upload().unwrap().progress_percent(), 100.0);
        // Old deck stays visible until the completion delay has passed.
        assert_eq!(state.slides().len(), 6);

        let later = t0 + crate::upload::COMPLETION_DELAY;
        assert!(state.poll_upload(later).is_none());
        assert_eq!(state.slides().len(), 2);
        assert_eq!(state.current(), 0);
        assert!(!state.is_uploading());
    }

    #[test]
    fn test_second_upload_is_ignored() {
        let (_tx1, rx1) = mpsc::channel();
        let (_tx2, rx2) = mpsc::channel();
        let t0 = Instant::now();
        let mut state = ViewerState::new();
        state.start_session(t0, session(rx1)).unwrap();
        assert!(matches!(
            state.start_session(t0, session(rx2)),
            Err(UploadError::AlreadyInProgress)
        ));
        assert!(state.is_uploading());
    }
}
