#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

mod clipboard;
mod config;
mod dialog;
mod hotkey;
mod languages;
mod logger;
mod monitor;
mod popup;
mod translator;
mod ui;

use clipboard::{ClipboardAccess, SystemClipboard};
use config::Config;
use hotkey::KeyCombo;
use monitor::MonitorController;

fn run(cfg: Config) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let clipboard: Arc<dyn ClipboardAccess> =
        Arc::new(SystemClipboard::new().context("failed to open the clipboard")?);
    let combo: KeyCombo = cfg.hotkey.parse()?;
    let listener = hotkey::system_listener();
    let controller = MonitorController::new(
        clipboard,
        listener,
        rt.handle().clone(),
        combo,
        cfg.copy_delay(),
    );

    ui::run(cfg, controller)
}

fn main() {
    // Init logger first so config warnings land in the log.
    logger::init(log::LevelFilter::Info);
    let cfg = Config::load();
    log::set_max_level(logger::parse_level(&cfg.log_level));
    info!("App starting ({} -> {}, hotkey {})", cfg.source_lang, cfg.target_lang, cfg.hotkey);

    if let Err(e) = run(cfg) {
        dialog::Dialogs::default().error("Error", format!("An error occurred: {:#}", e));
        std::process::exit(1);
    }
    info!("App exiting");
}
