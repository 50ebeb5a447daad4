//! What the presentation view shows for a given deck position. Pure data:
//! the egui code in `app.rs` only paints what this module decides.

use crate::slides::Slide;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Visited,
    Active,
    Upcoming,
}

impl MarkerState {
    pub fn for_index(index: usize, current: usize) -> Self {
        use std::cmp::Ordering;
        match index.cmp(&current) {
            Ordering::Less => Self::Visited,
            Ordering::Equal => Self::Active,
            Ordering::Greater => Self::Upcoming,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlideView<'a> {
    pub counter: String,
    pub markers: Vec<MarkerState>,
    pub text: Option<&'a str>,
    pub show_arrows: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

impl<'a> SlideView<'a> {
    pub fn new(slide: &'a Slide, current: usize, total: usize, menu_open: bool) -> Self {
        let text = Some(slide.text.trim()).filter(|t| !t.is_empty());
        Self {
            counter: format!("Slide {} / {}", current + 1, total),
            markers: (0..total)
                .map(|i| MarkerState::for_index(i, current))
                .collect(),
            text,
            show_arrows: !menu_open,
            can_go_back: current > 0,
            can_go_forward: current + 1 < total,
        }
    }
}

/// Label for the progress bar on the upload screen.
pub fn upload_label(file_name: &str, percent: f32) -> String {
    format!("Converting {file_name}\u{2026} {:.0}%", percent.clamp(0.0, 100.0))
}
