//! The translation popup: one borderless, always-on-top window at a time.

use eframe::egui;
use egui::scroll_area::{ScrollAreaOutput, ScrollBarVisibility};
use egui::{pos2, vec2, Color32, FontId, Pos2, RichText, Vec2};
use egui_phosphor::regular as icons;
use log::debug;

use crate::monitor::TranslationOutcome;

pub const POPUP_WIDTH: f32 = 400.0;
/// Room reserved for the header, separators and frame margins.
pub const HEADER_ALLOWANCE: f32 = 80.0;
pub const TOP_OFFSET: f32 = 100.0;
pub const EDGE_MARGIN: f32 = 20.0;
const TEXT_INSET: f32 = 60.0;
const TRANSLATED_SIZE: f32 = 15.0;
const ORIGINAL_SIZE: f32 = 12.0;
const FALLBACK_SCREEN: Vec2 = Vec2 { x: 1920.0, y: 1080.0 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupGeometry {
    pub position: Pos2,
    pub size: Vec2,
    pub scrollable: bool,
}

/// Sizes and positions a popup whose wrapped body is `content_height` tall.
pub fn place(content_height: f32, screen: Vec2, max_height: f32) -> PopupGeometry {
    let total = content_height + HEADER_ALLOWANCE;
    let cap = max_height.min(screen.y).max(HEADER_ALLOWANCE);
    let height = total.min(cap);

    let x = (screen.x - POPUP_WIDTH - EDGE_MARGIN).max(0.0);
    let mut y = TOP_OFFSET;
    if y + height > screen.y {
        y = screen.y - height - EDGE_MARGIN;
    }

    PopupGeometry {
        position: pos2(x, y.max(0.0)),
        size: vec2(POPUP_WIDTH, height),
        scrollable: total > cap,
    }
}

struct Palette {
    background: Color32,
    border: Color32,
    header: Color32,
    body: Color32,
    muted: Color32,
}

impl Palette {
    fn for_outcome(is_error: bool) -> Self {
        if is_error {
            Self {
                background: Color32::from_rgb(0xff, 0xeb, 0xee),
                border: Color32::from_rgb(0xf4, 0x43, 0x36),
                header: Color32::from_rgb(0xd3, 0x2f, 0x2f),
                body: Color32::from_rgb(0xd3, 0x2f, 0x2f),
                muted: Color32::from_gray(0x66),
            }
        } else {
            Self {
                background: Color32::from_rgb(0x25, 0x25, 0x25),
                border: Color32::from_rgb(0x57, 0x57, 0x57),
                header: Color32::from_rgb(0x4c, 0xaf, 0x50),
                body: Color32::from_rgb(0x42, 0xa5, 0xf5),
                muted: Color32::from_gray(0x99),
            }
        }
    }
}

fn original_label(original: &str) -> String {
    format!("{} Original: {}", icons::NOTE_PENCIL, original)
}

/// What the scrollable part of the popup shows, top to bottom.
#[derive(Debug, Clone, PartialEq)]
enum Block {
    Translated(String),
    Divider,
    Original(String),
}

fn blocks(outcome: &TranslationOutcome) -> Vec<Block> {
    let mut out = vec![Block::Translated(outcome.text.clone())];
    if !outcome.is_error {
        out.push(Block::Divider);
        out.push(Block::Original(original_label(&outcome.original)));
    }
    out
}

/// Height of the popup body once wrapped to the popup width.
pub fn measure_content(ctx: &egui::Context, outcome: &TranslationOutcome) -> f32 {
    let wrap = POPUP_WIDTH - TEXT_INSET;
    ctx.fonts(|fonts| {
        let mut height = 0.0;
        for block in blocks(outcome) {
            height += match block {
                Block::Translated(text) => {
                    let galley =
                        fonts.layout(text, FontId::proportional(TRANSLATED_SIZE), Color32::WHITE, wrap);
                    galley.size().y + 10.0
                }
                Block::Divider => 10.0,
                Block::Original(text) => {
                    let galley =
                        fonts.layout(text, FontId::proportional(ORIGINAL_SIZE), Color32::WHITE, wrap);
                    galley.size().y + 5.0
                }
            };
        }
        height
    })
}

fn screen_size(ctx: &egui::Context) -> Vec2 {
    ctx.input(|i| i.viewport().monitor_size).unwrap_or(FALLBACK_SCREEN)
}

struct Popup {
    serial: u64,
    outcome: TranslationOutcome,
    geometry: Option<PopupGeometry>,
}

/// Owns the single live popup, if any.
pub struct PopupPresenter {
    current: Option<Popup>,
    next_serial: u64,
    max_height: f32,
}

impl PopupPresenter {
    pub fn new(max_height: f32) -> Self {
        Self {
            current: None,
            next_serial: 0,
            max_height,
        }
    }

    /// Replaces whatever is showing with `outcome`. The old popup is torn down
    /// first; the new one gets a fresh viewport so the old window closes.
    pub fn show(&mut self, outcome: TranslationOutcome) {
        self.close();
        self.next_serial += 1;
        debug!("Opening popup #{} (error: {})", self.next_serial, outcome.is_error);
        self.current = Some(Popup {
            serial: self.next_serial,
            outcome,
            geometry: None,
        });
    }

    pub fn close(&mut self) {
        if let Some(p) = self.current.take() {
            debug!("Closing popup #{}", p.serial);
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    #[cfg(test)]
    pub fn outcome(&self) -> Option<&TranslationOutcome> {
        self.current.as_ref().map(|p| &p.outcome)
    }

    #[cfg(test)]
    pub fn geometry(&self) -> Option<PopupGeometry> {
        self.current.as_ref().and_then(|p| p.geometry)
    }

    /// Draws the popup for this frame. Call once per frame from the root app.
    pub fn ui(&mut self, ctx: &egui::Context) {
        let max_height = self.max_height;
        let Some(popup) = self.current.as_mut() else {
            return;
        };
        let geometry = *popup.geometry.get_or_insert_with(|| {
            place(measure_content(ctx, &popup.outcome), screen_size(ctx), max_height)
        });

        let title = if popup.outcome.is_error { "Translation Error" } else { "Translation" };
        let builder = egui::ViewportBuilder::default()
            .with_title(title)
            .with_decorations(false)
            .with_always_on_top()
            .with_resizable(false)
            .with_taskbar(false)
            .with_position(geometry.position)
            .with_inner_size(geometry.size);

        let outcome = &popup.outcome;
        let palette = Palette::for_outcome(outcome.is_error);
        let frame = egui::Frame::none()
            .fill(palette.background)
            .stroke(egui::Stroke::new(3.0, palette.border))
            .inner_margin(10.0);

        let id = egui::ViewportId::from_hash_of(("translation-popup", popup.serial));
        let mut close = false;
        ctx.show_viewport_immediate(id, builder, |ctx, class| {
            if ctx.input(|i| i.viewport().close_requested()) {
                close = true;
            }
            if class == egui::ViewportClass::Embedded {
                egui::Window::new(title)
                    .id(egui::Id::new(id))
                    .title_bar(false)
                    .resizable(false)
                    .frame(frame)
                    .fixed_size(geometry.size - vec2(20.0, 20.0))
                    .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
                    .show(ctx, |ui| close |= body(ui, outcome, &palette, geometry.scrollable).0);
            } else {
                egui::CentralPanel::default()
                    .frame(frame)
                    .show(ctx, |ui| close |= body(ui, outcome, &palette, geometry.scrollable).0);
            }
        });

        if close {
            self.close();
        }
    }
}

/// Header, separator and scrollable text. Returns whether the close
/// affordance was clicked, plus the scroll area's state for this frame.
fn body(
    ui: &mut egui::Ui,
    outcome: &TranslationOutcome,
    palette: &Palette,
    scrollable: bool,
) -> (bool, ScrollAreaOutput<()>) {
    let mut close = false;
    let header = if outcome.is_error {
        format!("{} Translation Error", icons::WARNING_CIRCLE)
    } else {
        format!("{} Translation", icons::TRANSLATE)
    };

    ui.horizontal(|ui| {
        ui.label(RichText::new(header).strong().color(palette.header));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let x = ui
                .add(egui::Label::new(RichText::new(icons::X).size(14.0).color(palette.muted)).sense(egui::Sense::click()))
                .on_hover_cursor(egui::CursorIcon::PointingHand);
            if x.clicked() {
                close = true;
            }
        });
    });
    ui.separator();

    // egui routes wheel input to the area under the pointer only.
    let visibility = if scrollable {
        ScrollBarVisibility::AlwaysVisible
    } else {
        ScrollBarVisibility::AlwaysHidden
    };
    let scroll = egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .scroll_bar_visibility(visibility)
        .show(ui, |ui| {
            for block in blocks(outcome) {
                match block {
                    Block::Translated(text) => {
                        ui.add(
                            egui::Label::new(RichText::new(text).size(TRANSLATED_SIZE).strong().color(palette.body))
                                .wrap(true),
                        );
                    }
                    Block::Divider => {
                        ui.add_space(10.0);
                        ui.separator();
                    }
                    Block::Original(text) => {
                        ui.add(
                            egui::Label::new(RichText::new(text).size(ORIGINAL_SIZE).color(palette.muted))
                                .wrap(true),
                        );
                    }
                }
            }
        });

    (close, scroll)
}
