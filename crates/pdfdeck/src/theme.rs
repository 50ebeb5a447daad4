use eframe::egui::Color32;

use crate::view::MarkerState;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub background: Color32,
    pub foreground: Color32,
    pub muted: Color32,
    pub accent: Color32,
    pub panel: Color32,
    pub text_size: f32,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark".to_string(),
            background: Color32::BLACK,
            foreground: Color32::WHITE,
            muted: Color32::from_rgb(0x8A, 0x8A, 0x8A),
            accent: Color32::from_rgb(0x52, 0x94, 0xE2),
            panel: Color32::from_rgb(0x1E, 0x1E, 0x1E),
            text_size: 16.0,
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light".to_string(),
            background: Color32::WHITE,
            foreground: Color32::from_rgb(0x1A, 0x1A, 0x2E),
            muted: Color32::from_rgb(0x70, 0x70, 0x80),
            accent: Color32::from_rgb(0x0F, 0x34, 0x60),
            panel: Color32::from_rgb(0xF5, 0xF5, 0xF5),
            text_size: 16.0,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn is_dark(&self) -> bool {
        self.name == "dark"
    }

    /// Apply opacity to a color
    pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
        Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (opacity * 255.0) as u8)
    }

    pub fn marker_color(&self, state: MarkerState) -> Color32 {
        match state {
            MarkerState::Visited => Self::with_opacity(self.foreground, 0.6),
            MarkerState::Active => self.accent,
            MarkerState::Upcoming => Self::with_opacity(self.foreground, 0.2),
        }
    }
}
