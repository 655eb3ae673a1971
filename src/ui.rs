use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use eframe::egui;
use egui::{Color32, RichText};
use egui_phosphor::regular as icons;
use log::{info, warn};

use crate::config::Config;
use crate::dialog::Dialogs;
use crate::languages::{self, Language, LanguagePair};
use crate::monitor::{MonitorController, MonitorEvent, TEST_TEXT};
use crate::popup::PopupPresenter;
use crate::translator::{GoogleTranslator, TranslatorSettings};

const BACKGROUND: Color32 = Color32::from_rgb(0x1d, 0x1d, 0x1d);
const GROUP_FILL: Color32 = Color32::from_rgb(0x2e, 0x2e, 0x2e);
const RUNNING: Color32 = Color32::from_rgb(0x27, 0xae, 0x60);
const STOPPED: Color32 = Color32::from_rgb(0xe7, 0x4c, 0x3c);
const TITLE: Color32 = Color32::from_rgb(0xec, 0xf0, 0xf1);
const SUBTITLE: Color32 = Color32::from_rgb(0xbd, 0xc3, 0xc7);
const TIP: Color32 = Color32::from_rgb(0x95, 0xa5, 0xa6);

fn setup_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();
    egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);

    // Fallback for CJK and Arabic results; the default fonts cover Latin and Cyrillic.
    let candidates = [
        r"C:\Windows\Fonts\msyh.ttc",
        r"C:\Windows\Fonts\simsun.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
        "/System/Library/Fonts/PingFang.ttc",
    ];
    match candidates.iter().find_map(|p| fs::read(p).ok().map(|b| (p, b))) {
        Some((path, bytes)) => {
            fonts.font_data.insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
            for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                fonts.families.entry(family).or_default().push("cjk".to_owned());
            }
            info!("Loaded fallback font: {}", path);
        }
        None => warn!("No CJK font found; some translations may render as squares"),
    }
    ctx.set_fonts(fonts);
}

fn setup_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = BACKGROUND;
    visuals.window_fill = GROUP_FILL;
    ctx.set_visuals(visuals);
}

pub fn load_icon(path: &std::path::Path) -> Result<egui::IconData> {
    let image = image::open(path)
        .with_context(|| format!("failed to load icon {}", path.display()))?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Ok(egui::IconData {
        rgba: image.into_raw(),
        width,
        height,
    })
}

/// Returns true when the selection changed.
fn language_combo<'a>(
    ui: &mut egui::Ui,
    id: &str,
    selected: &mut String,
    options: impl Iterator<Item = &'a Language>,
) -> bool {
    let before = selected.clone();
    egui::ComboBox::from_id_source(id)
        .width(180.0)
        .selected_text(languages::display_name(selected))
        .show_ui(ui, |ui| {
            for lang in options {
                ui.selectable_value(selected, lang.code.to_string(), lang.name);
            }
        });
    *selected != before
}

pub struct TranslatorApp {
    controller: MonitorController,
    presenter: PopupPresenter,
    dialogs: Dialogs,
    selection: LanguagePair,
    settings: TranslatorSettings,
    shortcut: String,
}

impl TranslatorApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config, mut controller: MonitorController) -> Self {
        setup_fonts(&cc.egui_ctx);
        setup_theme(&cc.egui_ctx);

        let ctx = cc.egui_ctx.clone();
        controller.set_waker(Arc::new(move || ctx.request_repaint()));

        let mut app = Self {
            controller,
            presenter: PopupPresenter::new(config.popup_max_height),
            dialogs: Dialogs::default(),
            selection: config.language_pair(),
            settings: TranslatorSettings::from(&config),
            shortcut: config.hotkey.to_uppercase(),
        };
        app.rebuild_translator();
        app
    }

    fn rebuild_translator(&mut self) {
        match GoogleTranslator::new(self.selection.clone(), &self.settings) {
            Ok(t) => self.controller.set_translator(Arc::new(t)),
            Err(e) => self
                .dialogs
                .error("Error", format!("Translator initialization error: {}", e)),
        }
    }

    fn toggle_monitoring(&mut self) {
        let was_running = self.controller.is_running();
        if let Err(e) = self.controller.toggle() {
            let msg = if was_running {
                format!("Stop error: {}", e)
            } else {
                format!("Failed to start monitoring: {}", e)
            };
            self.dialogs.error("Error", msg);
        }
    }

    fn run_test(&mut self) {
        if let Err(e) = self.controller.inject_test_text(TEST_TEXT) {
            self.dialogs.error("Error", format!("Test failed: {}", e));
        }
    }

    fn main_ui(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(12.0);
            ui.label(
                RichText::new(format!("{} Smart Translator", icons::GLOBE))
                    .size(28.0)
                    .strong()
                    .color(TITLE),
            );
            ui.label(RichText::new("Automatic translation on copy").color(SUBTITLE));
        });
        ui.add_space(16.0);

        let mut changed = false;
        egui::Frame::group(ui.style()).fill(GROUP_FILL).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new("Language Settings").size(15.0).strong().color(TITLE));
            egui::Grid::new("languages")
                .num_columns(2)
                .spacing([40.0, 10.0])
                .show(ui, |ui| {
                    ui.label(RichText::new("From language:").strong());
                    changed |= language_combo(
                        ui,
                        "source_lang",
                        &mut self.selection.source,
                        languages::source_languages().iter(),
                    );
                    ui.end_row();

                    ui.label(RichText::new("To language:").strong());
                    changed |= language_combo(
                        ui,
                        "target_lang",
                        &mut self.selection.target,
                        languages::target_languages(),
                    );
                    ui.end_row();
                });
        });
        if changed {
            self.rebuild_translator();
        }

        ui.add_space(12.0);
        let running = self.controller.is_running();
        ui.horizontal(|ui| {
            let label = if running {
                format!("{} Stop Monitoring", icons::PAUSE)
            } else {
                format!("{} Start Monitoring", icons::PLAY)
            };
            if ui.button(RichText::new(label).strong()).clicked() {
                self.toggle_monitoring();
            }
            if ui.button(RichText::new(format!("{} Test", icons::FLASK)).strong()).clicked() {
                self.run_test();
            }
        });

        ui.add_space(8.0);
        let running = self.controller.is_running();
        ui.vertical_centered(|ui| {
            let (text, color) = if running {
                (format!("{} Running", icons::ARROWS_CLOCKWISE), RUNNING)
            } else {
                (format!("{} Stopped", icons::PAUSE), STOPPED)
            };
            ui.label(RichText::new(text).strong().color(color));
            ui.add_space(12.0);
            ui.label(
                RichText::new(format!(
                    "{} Tip: Copy any text ({}), and the translation will appear in a popup window",
                    icons::LIGHTBULB,
                    self.shortcut
                ))
                .size(12.0)
                .color(TIP),
            );
        });
    }
}

impl eframe::App for TranslatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        for event in self.controller.pump() {
            match event {
                MonitorEvent::ShowPopup(outcome) => self.presenter.show(outcome),
                MonitorEvent::ClipboardFailed(e) => self.dialogs.error("Error", format!("{}", e)),
            }
        }

        if ctx.input(|i| i.viewport().close_requested()) && self.controller.is_running() {
            if let Err(e) = self.controller.stop() {
                warn!("Stop on close failed: {}", e);
            }
        }

        if self.presenter.is_open() && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.presenter.close();
        }

        egui::CentralPanel::default().show(ctx, |ui| self.main_ui(ui));

        self.presenter.ui(ctx);
    }
}

pub fn run(config: Config, controller: MonitorController) -> Result<()> {
    let mut viewport = egui::ViewportBuilder::default()
        .with_title("Smart Translator")
        .with_inner_size([500.0, 400.0])
        .with_resizable(false);
    match load_icon(&config.icon_file()) {
        Ok(icon) => viewport = viewport.with_icon(icon),
        Err(e) => warn!("{:#}", e),
    }

    let native_options = eframe::NativeOptions {
        viewport,
        centered: true,
        ..Default::default()
    };

    info!("Main UI: starting event loop");
    eframe::run_native(
        "Smart Translator",
        native_options,
        Box::new(move |cc| Box::new(TranslatorApp::new(cc, config, controller))),
    )
    .map_err(|e| anyhow!("UI error: {}", e))?;
    info!("Main UI: event loop exited");
    Ok(())
}
