use eframe::egui;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::UploadError;
use crate::narration::{self, ClaudeNarrator, Narrator};
use crate::nav::{Direction, SlideChange};
use crate::service::ConversionClient;
use crate::state::{NavKey, ViewerState};
use crate::textures::SlideTextures;
use crate::theme::Theme;
use crate::upload::{Converter, SelectedFile};
use crate::view::{self, SlideView};

const MARKER_RADIUS: f32 = 4.0;
const MARKER_SPACING: f32 = 16.0;
const UPLOAD_REPAINT: Duration = Duration::from_millis(50);

/// Deferred UI actions, applied after painting so drawing code only borrows
/// the state immutably.
enum Action {
    Next,
    Previous,
    Select(usize),
    SelectFromMenu(usize),
    ToggleMenu,
    BackToUpload,
    Convert,
    DismissAlert,
}

enum NarrationSlot {
    Pending,
    Ready(String),
}

struct NarrationMessage {
    generation: u64,
    index: usize,
    text: String,
}

struct ViewerApp {
    state: ViewerState,
    theme: Theme,
    converter: Arc<dyn Converter>,
    narrator: Option<Arc<dyn Narrator>>,
    textures: SlideTextures,
    seen_generation: u64,
    path_input: String,
    alert: Option<String>,
    narrations: HashMap<usize, NarrationSlot>,
    narration_tx: Sender<NarrationMessage>,
    narration_rx: Receiver<NarrationMessage>,
    start_slide: Option<usize>,
    current_file: Option<String>,
}

impl ViewerApp {
    fn new(settings: &Settings, theme: Theme, start_slide: Option<usize>) -> Self {
        let converter: Arc<dyn Converter> = Arc::new(ConversionClient::new(
            &settings.service_url,
            settings.timeout_secs,
        ));
        let narrator: Option<Arc<dyn Narrator>> = settings.narration_enabled.then(|| {
            Arc::new(ClaudeNarrator::new(
                settings.api_key.clone(),
                &settings.model,
                settings.max_tokens,
            )) as Arc<dyn Narrator>
        });
        let (narration_tx, narration_rx) = mpsc::channel();

        Self {
            state: ViewerState::new(),
            theme,
            converter,
            narrator,
            textures: SlideTextures::default(),
            seen_generation: 0,
            path_input: String::new(),
            alert: None,
            narrations: HashMap::new(),
            narration_tx,
            narration_rx,
            start_slide,
            current_file: None,
        }
    }

    fn start_upload(&mut self, file: Result<SelectedFile, UploadError>) {
        let now = Instant::now();
        let result = file.and_then(|file| {
            let name = file.name.clone();
            self.state
                .begin_upload(self.converter.clone(), file, now)
                .map(|()| name)
        });
        match result {
            Ok(name) => {
                info!(file = %name, "upload started");
                self.current_file = Some(name);
            }
            // Already converting: the request is dropped without an alert.
            Err(UploadError::AlreadyInProgress) => {}
            Err(e) => self.alert = Some(e.user_message()),
        }
    }

    /// Drop per-deck caches when the deck has been replaced or cleared.
    fn sync_generation(&mut self, now: Instant) {
        let generation = self.state.generation();
        if generation == self.seen_generation {
            return;
        }
        self.seen_generation = generation;
        self.textures.clear();
        self.narrations.clear();

        if self.state.has_slides() {
            if let Some(n) = self.start_slide.take() {
                let last = self.state.slides().len() - 1;
                self.state.select(n.saturating_sub(1).min(last), now);
            }
        }
    }

    fn receive_narrations(&mut self) {
        while let Ok(msg) = self.narration_rx.try_recv() {
            if msg.generation == self.state.generation() {
                self.narrations
                    .insert(msg.index, NarrationSlot::Ready(msg.text));
            }
        }
    }

    fn request_narration(&mut self, ctx: &egui::Context) {
        let Some(narrator) = self.narrator.clone() else {
            return;
        };
        let index = self.state.current();
        if self.narrations.contains_key(&index) {
            return;
        }
        let Some(text) = self
            .state
            .current_slide()
            .map(|s| s.text.trim().to_string())
            .filter(|t| !t.is_empty())
        else {
            return;
        };

        self.narrations.insert(index, NarrationSlot::Pending);
        let generation = self.state.generation();
        let tx = self.narration_tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let text = narration::narrate_or_fallback(narrator.as_ref(), &text);
            let _ = tx.send(NarrationMessage {
                generation,
                index,
                text,
            });
            ctx.request_repaint();
        });
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.first().cloned());
        let Some(file) = dropped else { return };
        if self.state.has_slides() {
            return;
        }
        let selected = match (file.bytes, file.path) {
            (Some(bytes), _) => Ok(SelectedFile {
                name: file.name,
                bytes: bytes.to_vec(),
            }),
            (None, Some(path)) => SelectedFile::from_path(&path),
            (None, None) => Err(UploadError::NoFileSelected),
        };
        self.start_upload(selected);
    }

    fn handle_input(&mut self, ctx: &egui::Context, now: Instant) {
        let (scroll_y, touches, down, up, escape, menu) = ctx.input(|i| {
            let touches: Vec<(egui::TouchPhase, f32)> = i
                .events
                .iter()
                .filter_map(|e| match e {
                    egui::Event::Touch { phase, pos, .. } => Some((*phase, pos.y)),
                    _ => None,
                })
                .collect();
            (
                i.raw_scroll_delta.y,
                touches,
                i.key_pressed(egui::Key::ArrowDown),
                i.key_pressed(egui::Key::ArrowUp),
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::M),
            )
        });

        // egui reports scrolling down as a negative delta.
        if scroll_y != 0.0 {
            self.state.wheel(-scroll_y, now);
        }

        for (phase, y) in touches {
            match phase {
                egui::TouchPhase::Start => self.state.touch_start(y),
                egui::TouchPhase::End => {
                    self.state.touch_end(y, now);
                }
                egui::TouchPhase::Cancel => self.state.touch_cancel(),
                egui::TouchPhase::Move => {}
            }
        }

        if down {
            self.state.key(NavKey::ArrowDown, now);
        }
        if up {
            self.state.key(NavKey::ArrowUp, now);
        }
        if escape {
            self.state.key(NavKey::Escape, now);
        }
        if menu {
            self.state.set_menu_open(!self.state.menu_open());
        }
    }

    fn apply(&mut self, action: Action, now: Instant) {
        match action {
            Action::Next => {
                self.state.next(now);
            }
            Action::Previous => {
                self.state.previous(now);
            }
            Action::Select(index) => {
                self.state.select(index, now);
            }
            Action::SelectFromMenu(index) => {
                self.state.set_menu_open(false);
                self.state.select(index, now);
            }
            Action::ToggleMenu => self.state.set_menu_open(!self.state.menu_open()),
            Action::BackToUpload => {
                debug!("returning to upload screen");
                self.state.reset();
                self.current_file = None;
            }
            Action::Convert => {
                let file = SelectedFile::from_input(&self.path_input);
                self.start_upload(file);
            }
            Action::DismissAlert => self.alert = None,
        }
    }

    fn draw_upload_screen(&mut self, ui: &mut egui::Ui, action: &mut Option<Action>) {
        let rect = ui.max_rect();
        ui.painter().rect_filled(rect, 0.0, self.theme.background);

        ui.add_space(rect.height() * 0.3);
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new("pdfdeck")
                    .size(40.0)
                    .color(self.theme.foreground),
            );
            ui.add_space(12.0);
            ui.label(
                egui::RichText::new("Drop a PDF here, or enter its path")
                    .color(self.theme.muted),
            );
            ui.add_space(16.0);

            let uploading = self.state.is_uploading();
            ui.horizontal(|ui| {
                let width = 420.0_f32.min(ui.available_width() * 0.6);
                ui.add_space(((ui.available_width() - width - 90.0) / 2.0).max(0.0));
                let field = ui.add_enabled(
                    !uploading,
                    egui::TextEdit::singleline(&mut self.path_input)
                        .desired_width(width)
                        .hint_text("/path/to/slides.pdf"),
                );
                let submitted =
                    field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui
                    .add_enabled(!uploading, egui::Button::new("Convert"))
                    .clicked()
                    || submitted
                {
                    *action = Some(Action::Convert);
                }
            });

            if let Some(upload) = self.state.upload() {
                ui.add_space(24.0);
                let percent = upload.progress_percent();
                ui.add(
                    egui::ProgressBar::new(percent / 100.0)
                        .desired_width(420.0)
                        .text(view::upload_label(upload.file_name(), percent)),
                );
            }
        });
    }

    fn draw_menu(&self, ctx: &egui::Context, action: &mut Option<Action>) {
        egui::SidePanel::left("menu")
            .resizable(false)
            .default_width(260.0)
            .frame(egui::Frame::new().fill(self.theme.panel).inner_margin(16.0))
            .show(ctx, |ui| {
                if let Some(name) = &self.current_file {
                    ui.label(egui::RichText::new(name).strong().color(self.theme.foreground));
                    ui.add_space(8.0);
                }
                if ui.button("Back to upload").clicked() {
                    *action = Some(Action::BackToUpload);
                }
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let current = self.state.current();
                    for (i, slide) in self.state.slides().iter().enumerate() {
                        let label = match slide.headline() {
                            Some(line) => format!("{}. {}", slide.page, truncate(line, 32)),
                            None => format!("{}.", slide.page),
                        };
                        if ui.selectable_label(i == current, label).clicked() {
                            *action = Some(Action::SelectFromMenu(i));
                        }
                    }
                });
            });
    }

    fn draw_deck(
        &mut self,
        ui: &mut egui::Ui,
        ctx: &egui::Context,
        now: Instant,
        action: &mut Option<Action>,
    ) {
        let rect = ui.max_rect();
        ui.painter().rect_filled(rect, 0.0, self.theme.background);

        let total = self.state.navigator().len();
        let current = self.state.current();

        if let Some((change, t)) = self.state.navigator().transition_progress(now) {
            self.draw_transition(ui, ctx, rect, change, ease_in_out(t));
            ctx.request_repaint();
        } else {
            self.draw_slide(ui, ctx, current, rect, 1.0);
        }

        let Some(slide) = self.state.current_slide() else {
            return;
        };
        let view = SlideView::new(slide, current, total, self.state.menu_open());

        // Counter
        let counter_color = Theme::with_opacity(self.theme.foreground, 0.7);
        let galley = ui.painter().layout_no_wrap(
            view.counter.clone(),
            egui::FontId::proportional(12.0),
            counter_color,
        );
        let pos = egui::pos2(
            rect.center().x - galley.rect.width() / 2.0,
            rect.bottom() - 24.0,
        );
        ui.painter().galley(pos, galley, counter_color);

        // Progress markers along the right edge
        let column_height = MARKER_SPACING * total as f32;
        let top = rect.center().y - column_height / 2.0;
        for (i, state) in view.markers.iter().enumerate() {
            let center = egui::pos2(
                rect.right() - 20.0,
                top + MARKER_SPACING * (i as f32 + 0.5),
            );
            let radius = if i == current {
                MARKER_RADIUS * 1.5
            } else {
                MARKER_RADIUS
            };
            ui.painter()
                .circle_filled(center, radius, self.theme.marker_color(*state));
            let hit = egui::Rect::from_center_size(center, egui::vec2(24.0, MARKER_SPACING));
            if ui
                .interact(hit, ui.id().with(("marker", i)), egui::Sense::click())
                .clicked()
            {
                *action = Some(Action::Select(i));
            }
        }

        // Menu button and arrows
        let menu_rect = egui::Rect::from_min_size(
            rect.left_top() + egui::vec2(12.0, 12.0),
            egui::vec2(32.0, 28.0),
        );
        if ui.put(menu_rect, egui::Button::new("\u{2630}")).clicked() {
            *action = Some(Action::ToggleMenu);
        }

        if view.show_arrows {
            let size = egui::vec2(32.0, 28.0);
            let up_rect =
                egui::Rect::from_min_size(rect.right_bottom() - egui::vec2(52.0, 80.0), size);
            let down_rect =
                egui::Rect::from_min_size(rect.right_bottom() - egui::vec2(52.0, 46.0), size);
            if ui.put(up_rect, egui::Button::new("\u{25B2}")).clicked() && view.can_go_back {
                *action = Some(Action::Previous);
            }
            if ui.put(down_rect, egui::Button::new("\u{25BC}")).clicked() && view.can_go_forward {
                *action = Some(Action::Next);
            }
        }
    }

    fn draw_transition(
        &mut self,
        ui: &egui::Ui,
        ctx: &egui::Context,
        rect: egui::Rect,
        change: SlideChange,
        progress: f32,
    ) {
        let h = rect.height();
        // Forward: the old slide leaves through the top, the new one rises from below.
        let sign = match change.direction {
            Direction::Forward => -1.0,
            Direction::Backward => 1.0,
        };
        let from_rect = rect.translate(egui::vec2(0.0, sign * progress * h));
        let to_rect = rect.translate(egui::vec2(0.0, sign * (progress - 1.0) * h));
        self.draw_slide(ui, ctx, change.from, from_rect, 1.0 - progress);
        self.draw_slide(ui, ctx, change.to, to_rect, progress);
    }

    fn draw_slide(
        &mut self,
        ui: &egui::Ui,
        ctx: &egui::Context,
        index: usize,
        rect: egui::Rect,
        opacity: f32,
    ) {
        let Some(slide) = self.state.slides().get(index) else {
            return;
        };
        let painter = ui.painter().with_clip_rect(ui.max_rect());

        let total = self.state.navigator().len();
        let text = SlideView::new(slide, index, total, self.state.menu_open()).text;
        let narration = match self.narrations.get(&index) {
            Some(NarrationSlot::Ready(text)) => Some(text.clone()),
            Some(NarrationSlot::Pending) => Some("\u{2026}".to_string()),
            None => None,
        };
        let has_caption = text.is_some() || narration.is_some();
        let image_area = if has_caption {
            egui::Rect::from_min_max(
                rect.min,
                egui::pos2(rect.max.x, rect.top() + rect.height() * 0.8),
            )
        } else {
            rect
        }
        .shrink(16.0);

        match self.textures.get(ctx, index, slide) {
            Some(texture) => {
                let image_rect = fit_rect(texture.size_vec2(), image_area);
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                painter.image(
                    texture.id(),
                    image_rect,
                    uv,
                    Theme::with_opacity(egui::Color32::WHITE, opacity),
                );
            }
            None => {
                let color = Theme::with_opacity(self.theme.muted, opacity);
                let galley = painter.layout_no_wrap(
                    format!("Page {} could not be displayed", slide.page),
                    egui::FontId::proportional(18.0),
                    color,
                );
                let pos = image_area.center() - galley.rect.size() / 2.0;
                painter.galley(pos, galley, color);
            }
        }

        if !has_caption {
            return;
        }
        let caption_rect = egui::Rect::from_min_max(
            egui::pos2(rect.left() + 48.0, image_area.bottom() + 16.0),
            egui::pos2(rect.right() - 48.0, rect.bottom() - 32.0),
        );
        let caption_painter = painter.with_clip_rect(caption_rect.intersect(painter.clip_rect()));
        let mut y = caption_rect.top();
        let wrap = caption_rect.width();
        if let Some(text) = text {
            let color = Theme::with_opacity(self.theme.foreground, opacity);
            let galley = caption_painter.layout(
                text.to_string(),
                egui::FontId::proportional(self.theme.text_size),
                color,
                wrap,
            );
            y += galley.rect.height() + 8.0;
            caption_painter.galley(caption_rect.left_top(), galley, color);
        }
        if let Some(narration) = narration {
            let color = Theme::with_opacity(self.theme.accent, opacity);
            let galley = caption_painter.layout(
                narration,
                egui::FontId::proportional(self.theme.text_size * 0.9),
                color,
                wrap,
            );
            caption_painter.galley(egui::pos2(caption_rect.left(), y), galley, color);
        }
    }

    fn draw_alert(&self, ctx: &egui::Context, action: &mut Option<Action>) {
        let Some(message) = &self.alert else { return };
        egui::Window::new("Upload failed")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() || ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    *action = Some(Action::DismissAlert);
                }
            });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        if let Some(e) = self.state.poll_upload(now) {
            self.alert = Some(e.user_message());
        }
        self.sync_generation(now);
        self.receive_narrations();
        if self.state.is_uploading() {
            ctx.request_repaint_after(UPLOAD_REPAINT);
        }

        if self.alert.is_none() {
            self.handle_dropped_files(ctx);
            if self.state.has_slides() {
                self.handle_input(ctx, now);
            }
        }
        if self.state.has_slides() {
            self.request_narration(ctx);
        }

        let mut action = None;

        if self.state.has_slides() && self.state.menu_open() {
            self.draw_menu(ctx, &mut action);
        }

        let bg = self.theme.background;
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(bg).inner_margin(0.0))
            .show(ctx, |ui| {
                if self.state.has_slides() {
                    self.draw_deck(ui, ctx, now, &mut action);
                } else {
                    self.draw_upload_screen(ui, &mut action);
                }
            });

        self.draw_alert(ctx, &mut action);

        if let Some(action) = action {
            self.apply(action, now);
        }

        // Wake up once the transition lock runs out so input is re-enabled.
        if self.state.navigator().is_transitioning(now) {
            ctx.request_repaint();
        }
    }
}

fn ease_in_out(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Largest rect with the aspect ratio of `size` centred inside `area`.
fn fit_rect(size: egui::Vec2, area: egui::Rect) -> egui::Rect {
    if size.x <= 0.0 || size.y <= 0.0 {
        return area;
    }
    let scale = (area.width() / size.x).min(area.height() / size.y);
    egui::Rect::from_center_size(area.center(), size * scale)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('\u{2026}');
        out
    }
}

pub fn run(
    settings: Settings,
    file: Option<PathBuf>,
    windowed: bool,
    start_slide: Option<usize>,
    theme_name: Option<String>,
) -> anyhow::Result<()> {
    let theme_name = theme_name
        .or_else(|| settings.theme.clone())
        .unwrap_or_else(|| "dark".to_string());
    let theme = Theme::from_name(&theme_name);
    let windowed = windowed || settings.windowed;

    let title = match &file {
        Some(path) => format!(
            "pdfdeck - {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ),
        None => "pdfdeck".to_string(),
    };

    let viewport = if windowed {
        egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(&title)
    } else {
        egui::ViewportBuilder::default()
            .with_fullscreen(true)
            .with_title(&title)
    };

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(if theme.is_dark() {
                egui::Visuals::dark()
            } else {
                egui::Visuals::light()
            });
            let mut app = ViewerApp::new(&settings, theme, start_slide);
            if let Some(path) = file {
                app.start_upload(SelectedFile::from_path(&path));
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
