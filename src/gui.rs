use eframe::egui;
use std::path::PathBuf;

use crate::i18n::{self, StatusMessage};
use crate::import::{self, ImportJob, ImportPoll};
use crate::player::RodioPlayerFactory;
use crate::{format_seconds_field, LoopWindow, PlayRequest, PlaybackSession, PlaybackSpeed, SessionSettings};

pub fn run(initial_file: Option<PathBuf>, settings: SessionSettings) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 720.0])
            .with_min_inner_size([420.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Loop Listening Practice",
        options,
        Box::new(move |cc| {
            configure_visuals(&cc.egui_ctx);
            Ok(Box::new(PracticeApp::new(initial_file, settings)))
        }),
    ).map_err(|e| anyhow::anyhow!("GUI Error: {}", e))
}

pub fn configure_visuals(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.window_corner_radius = egui::CornerRadius::same(8);
    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_gray(20);
    ctx.set_visuals(visuals);
}

pub struct PracticeApp {
    session: PlaybackSession,
    import: Option<ImportJob>,

    // Text fields, parsed on Play
    start_field: String,
    end_field: String,
    loops_field: String,

    speed: PlaybackSpeed,
    volume_boost: bool,

    // Scratchpad, never saved
    notes: String,
}

impl PracticeApp {
    pub fn new(initial_file: Option<PathBuf>, settings: SessionSettings) -> Self {
        let loops_field = settings.default_loops.to_string();
        let factory = RodioPlayerFactory::open_or_unavailable();
        let mut app = Self {
            session: PlaybackSession::new(factory, settings),
            import: None,
            start_field: "0".into(),
            end_field: String::new(),
            loops_field,
            speed: PlaybackSpeed::Normal,
            volume_boost: false,
            notes: String::new(),
        };

        if let Some(path) = initial_file {
            app.start_import(path);
        }
        app
    }

    fn pick_file(&mut self) {
        self.session.set_status(StatusMessage::OpeningPicker);
        match rfd::FileDialog::new()
            .add_filter("audio", &["mp3", "m4a", "aac", "wav", "flac", "ogg"])
            .pick_file()
        {
            Some(path) => self.start_import(path),
            None => {
                log::info!("file picker cancelled");
                self.session.set_status(StatusMessage::ImportCancelled);
            }
        }
    }

    fn start_import(&mut self, path: PathBuf) {
        log::info!("importing {:?}", path);
        self.session.set_status(StatusMessage::Importing);
        let timeout = self.session.settings().import_timeout;
        self.import = Some(ImportJob::spawn(path, import::sandbox_dir(), timeout));
    }

    fn poll_import(&mut self) {
        let Some(job) = self.import.as_mut() else { return };
        match job.poll() {
            ImportPoll::Pending => {}
            ImportPoll::TimedOut => self.session.set_status(StatusMessage::ImportTimedOut),
            ImportPoll::Done(result) => {
                self.import = None;
                self.loops_field = self.session.settings().default_loops.to_string();
                self.start_field = "0".into();
                match result {
                    Ok(resource) => {
                        self.end_field = format_seconds_field(resource.duration_secs());
                        self.session.load(resource);
                    }
                    Err(e) => {
                        self.end_field.clear();
                        self.session.fail_load(format!("{:#}", e));
                    }
                }
            }
        }
    }

    fn play(&mut self) {
        let request = PlayRequest::parse(
            &self.start_field,
            &self.end_field,
            &self.loops_field,
            self.speed.factor(),
            self.volume_boost,
        );
        match request {
            Ok(request) => {
                if let Err(e) = self.session.play(request) {
                    log::warn!("play failed: {}", e);
                }
            }
            Err(e) => {
                log::warn!("could not parse input: {}", e);
                self.session.set_status(StatusMessage::InputInvalid(e.to_string()));
            }
        }
    }

    fn show_window_fields(&mut self, window: LoopWindow) {
        self.start_field = format_seconds_field(window.start());
        self.end_field = format_seconds_field(window.end());
    }

    fn numeric_field(ui: &mut egui::Ui, label: &str, value: &mut String) {
        ui.label(label);
        let response = ui.add(egui::TextEdit::singleline(value).desired_width(80.0));
        if response.changed() {
            value.retain(|c| c.is_ascii_digit() || c == '.');
        }
    }
}

impl eframe::App for PracticeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_import();
        self.session.dispatch_pending();

        let view = self.session.view();

        egui::CentralPanel::default().show(ctx, |ui| {
            let spacing = 10.0;
            ui.spacing_mut().item_spacing = egui::vec2(spacing, spacing);

            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(i18n::t("app_title")).strong().color(egui::Color32::from_gray(100)));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    egui::ComboBox::from_id_salt("lang_select")
                        .selected_text(if i18n::get_language() == i18n::Language::Zh { "中文" } else { "English" })
                        .show_ui(ui, |ui| {
                            if ui.selectable_label(i18n::get_language() == i18n::Language::Zh, "中文").clicked() {
                                i18n::set_language(i18n::Language::Zh);
                            }
                            if ui.selectable_label(i18n::get_language() == i18n::Language::En, "English").clicked() {
                                i18n::set_language(i18n::Language::En);
                            }
                        });

                    let importing = self.import.is_some();
                    if ui.add_enabled(!importing, egui::Button::new(i18n::t("import"))).clicked() {
                        self.pick_file();
                    }
                    if importing {
                        ui.spinner();
                    }
                });
            });
            if let Some(resource) = self.session.resource() {
                let data = resource.data();
                ui.small(format!(
                    "{} - {} ({}Hz)",
                    data.title.as_deref().unwrap_or(resource.name()),
                    data.artist.as_deref().unwrap_or("Unknown"),
                    data.sample_rate
                ));
            }
            ui.separator();

            ui.horizontal(|ui| {
                Self::numeric_field(ui, &i18n::t("start_time"), &mut self.start_field);
                Self::numeric_field(ui, &i18n::t("end_time"), &mut self.end_field);
            });
            ui.horizontal(|ui| {
                Self::numeric_field(ui, &i18n::t("loop_count"), &mut self.loops_field);

                ui.label(i18n::t("speed"));
                let before = self.speed;
                egui::ComboBox::from_id_salt("speed_select")
                    .selected_text(self.speed.label())
                    .show_ui(ui, |ui| {
                        for speed in PlaybackSpeed::ALL {
                            ui.selectable_value(&mut self.speed, speed, speed.label());
                        }
                    });
                if self.speed != before {
                    self.session.set_speed(self.speed);
                }

                if ui.checkbox(&mut self.volume_boost, i18n::t("volume_boost")).changed() {
                    self.session.set_volume_boost(self.volume_boost);
                }
            });

            ui.horizontal(|ui| {
                if ui.button(i18n::t("play")).clicked() {
                    self.play();
                }
                if ui.button(i18n::t("pause")).clicked() {
                    self.session.pause();
                }
                if ui.button(i18n::t("stop")).clicked() {
                    self.session.stop();
                }
            });
            ui.horizontal(|ui| {
                if ui.button(i18n::t("mark_start")).clicked() {
                    if let Ok(window) = self.session.mark_loop_start() {
                        self.show_window_fields(window);
                    }
                }
                if ui.button(i18n::t("mark_end")).clicked() {
                    if let Ok(window) = self.session.mark_loop_end() {
                        self.show_window_fields(window);
                    }
                }
                if ui.button(i18n::t("reset_time")).clicked() {
                    if let Ok(window) = self.session.reset_window() {
                        self.show_window_fields(window);
                    }
                }
            });

            let mut fraction = view.progress_fraction as f32;
            let slider = egui::Slider::new(&mut fraction, 0.0..=1.0).show_value(false);
            if ui.add_enabled(view.state.has_resource(), slider).changed() {
                if let Err(e) = self.session.seek(fraction as f64) {
                    log::warn!("seek failed: {}", e);
                }
            }
            ui.label(egui::RichText::new(format!("{} / {}", view.display_position, view.display_end)).monospace());

            let status_color = match view.state {
                crate::PlaybackState::Failed(_) => egui::Color32::RED,
                _ => egui::Color32::GRAY,
            };
            ui.colored_label(status_color, &view.status_message);

            ui.separator();
            ui.horizontal(|ui| {
                ui.label(i18n::t("notes"));
                if ui.small_button(i18n::t("clear_notes")).clicked() {
                    self.notes.clear();
                }
            });
            ui.add(
                egui::TextEdit::multiline(&mut self.notes)
                    .hint_text(i18n::t("notes_hint"))
                    .desired_rows(8)
                    .desired_width(f32::INFINITY),
            );

            if view.state == crate::PlaybackState::Idle && self.import.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new(i18n::t("drag_drop")).color(egui::Color32::GRAY));
                });
            }
        });

        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(path) = dropped.first().and_then(|file| file.path.clone()) {
            self.start_import(path);
        }

        if view.state.is_playing() || self.import.is_some() {
            ctx.request_repaint_after(self.session.settings().tick_interval);
        }
    }
}
