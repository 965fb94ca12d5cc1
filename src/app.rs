use std::path::{Path, PathBuf};

use eframe::egui;
use image::RgbImage;
use tracing::{error, info};

use crate::nav::FrameNavigator;
use crate::persist::{self, SaveOutcome};
use crate::session::{AnnotationSession, PALETTE};
use crate::video::VideoSession;

const ANNOTATIONS_DIR: &str = "annotations";
const MARKER_HALF: f32 = 10.0;
const MARKER_STROKE: f32 = 1.0;

// ── Loaded state ────────────────────────────────────────────────────────────

struct LoadedVideo {
    session: VideoSession,
    nav: FrameNavigator,
}

/// One frame opened for annotation: the decoded image, its texture, the
/// annotation session, and the canvas view transform.
struct FrameView {
    frame_index: usize,
    image: RgbImage,
    image_size: (f32, f32),
    texture: Option<egui::TextureHandle>,
    session: AnnotationSession,

    // pan & zoom
    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
}

impl FrameView {
    fn new(frame_index: usize, image: RgbImage) -> Self {
        let image_size = (image.width() as f32, image.height() as f32);
        let mut session = AnnotationSession::new(image.width(), image.height());
        session.add_object();

        Self {
            frame_index,
            image,
            image_size,
            texture: None,
            session,
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        let size = [self.image.width() as usize, self.image.height() as usize];
        let color_image = egui::ColorImage::from_rgb(size, self.image.as_raw());
        self.texture = Some(ctx.load_texture("frame", color_image, egui::TextureOptions::LINEAR));
    }

    /// Convert image-space coords to screen-space
    fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        center
            + self.pan
            + (img_pos.to_vec2() - egui::vec2(self.image_size.0, self.image_size.1) * 0.5)
                * self.zoom
    }

    /// Convert screen-space coords to image-space
    fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        let rel = screen_pos - center - self.pan;
        egui::pos2(
            rel.x / self.zoom + self.image_size.0 * 0.5,
            rel.y / self.zoom + self.image_size.1 * 0.5,
        )
    }

    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let top_left = self.image_to_screen(canvas_rect, egui::Pos2::ZERO);
        let bot_right =
            self.image_to_screen(canvas_rect, egui::pos2(self.image_size.0, self.image_size.1));
        egui::Rect::from_min_max(top_left, bot_right)
    }

    /// Every recorded point is a cross in its object's color.
    fn draw_markers(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        for object in self.session.objects() {
            let stroke = egui::Stroke::new(MARKER_STROKE, object.color());
            for &(x, y) in object.points() {
                let center = self.image_to_screen(canvas_rect, egui::pos2(x, y));
                let half = MARKER_HALF * self.zoom;
                painter.line_segment(
                    [
                        egui::pos2(center.x - half, center.y),
                        egui::pos2(center.x + half, center.y),
                    ],
                    stroke,
                );
                painter.line_segment(
                    [
                        egui::pos2(center.x, center.y - half),
                        egui::pos2(center.x, center.y + half),
                    ],
                    stroke,
                );
            }
        }
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct FrameAnnotateApp {
    video: Option<LoadedVideo>,
    view: Option<FrameView>,
    allow_close: bool,
}

impl FrameAnnotateApp {
    pub fn new() -> Self {
        Self {
            video: None,
            view: None,
            allow_close: false,
        }
    }

    fn browse_video(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Select Video File")
            .add_filter("MP4 files", &["mp4"])
            .add_filter("All files", &["*"])
            .pick_file()
        else {
            return;
        };
        self.load_video(path);
    }

    fn load_video(&mut self, path: PathBuf) {
        // Release the previous decoder before opening a replacement.
        self.video = None;
        self.view = None;

        match VideoSession::open(&path) {
            Ok(session) => {
                let nav = FrameNavigator::new(session.frame_count());
                self.video = Some(LoadedVideo { session, nav });
            }
            Err(err) => {
                error!("{err:#}");
                error_dialog("Failed to load video. Check the file path.");
            }
        }
    }

    fn view_frame(&mut self) {
        let Some(video) = self.video.as_mut() else {
            return;
        };
        let frame_index = video.nav.index();
        info!("selected frame: {frame_index}");

        match video.session.decode(frame_index) {
            Ok(image) => {
                // Any previously opened frame's objects are discarded here.
                self.view = Some(FrameView::new(frame_index, image));
            }
            Err(err) => {
                error!("{err:#}");
                error_dialog("Failed to load selected frame.");
            }
        }
    }

    fn save_points(&mut self) {
        let (Some(video), Some(view)) = (self.video.as_ref(), self.view.as_ref()) else {
            return;
        };
        let base = Path::new(ANNOTATIONS_DIR);
        let video_name = video.session.video_name();

        match persist::save_points(base, video_name, view.frame_index, &view.session) {
            Ok(SaveOutcome::NoPoints) => info_dialog("No points to save."),
            Ok(SaveOutcome::Added(0)) => {
                info_dialog("No new points to add (all points already exist in file)");
            }
            Ok(SaveOutcome::Added(added)) => {
                let path = persist::csv_path(base, video_name);
                info!("added {added} new points to {}", path.display());
                info_dialog(&format!("Added {added} new points to {}", path.display()));
            }
            Err(err) => {
                error!("{err:#}");
                error_dialog(&format!("Failed to save points: {err}"));
            }
        }
    }

    // ── Screens ─────────────────────────────────────────────────────────────

    fn start_ui(&mut self, ui: &mut egui::Ui) {
        let mut browse = false;
        ui.vertical_centered(|ui| {
            ui.add_space(60.0);
            ui.heading("Video Frame Selector");
            ui.add_space(20.0);
            browse = ui.button("Select Video File").clicked();
        });
        if browse {
            self.browse_video();
        }
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        let mut browse = false;
        let mut view_clicked = false;

        {
            let Some(video) = self.video.as_mut() else {
                return;
            };
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);
                ui.heading("Video Frame Selector");
                ui.label(video.session.video_name().to_string());
                ui.add_space(10.0);
                browse = ui.button("Select Video File").clicked();
                ui.add_space(20.0);

                ui.label("Select Frame:");
                let mut index = video.nav.index();
                let max_index = video.nav.max_index();
                if ui
                    .add(egui::Slider::new(&mut index, 0..=max_index))
                    .changed()
                {
                    video.nav.set_index(index);
                }

                ui.add_space(5.0);
                ui.horizontal(|ui| {
                    if ui.button("←").clicked() {
                        video.nav.prev();
                    }
                    ui.label("Frame:");
                    let entry = ui.add(
                        egui::TextEdit::singleline(video.nav.entry_mut()).desired_width(80.0),
                    );
                    if entry.lost_focus() {
                        if let Err(message) = video.nav.commit_entry() {
                            warning_dialog("Invalid Frame", &message);
                        }
                    }
                    if ui.button("→").clicked() {
                        video.nav.next();
                    }
                });

                ui.add_space(10.0);
                view_clicked = ui.button("View Frame").clicked();
            });
        }

        if browse {
            self.browse_video();
        }
        if view_clicked {
            self.view_frame();
        }
    }

    fn toolbar_ui(&mut self, ui: &mut egui::Ui) {
        let Some(view) = self.view.as_ref() else {
            return;
        };
        let frame_index = view.frame_index;
        let zoom = view.zoom;

        let mut add = false;
        let mut save = false;
        let mut clear = false;
        let mut back = false;
        ui.horizontal(|ui| {
            ui.label(format!("Selected Frame: {frame_index}"));
            ui.separator();
            add = ui.button("+").on_hover_text("Add object").clicked();
            save = ui.button("Save").clicked();
            clear = ui
                .button("Clear")
                .on_hover_text("Clear the active object's points")
                .clicked();
            ui.separator();
            back = ui.button("Back").clicked();
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", zoom * 100.0));
        });

        if add {
            if let Some(view) = self.view.as_mut() {
                view.session.add_object();
            }
        }
        if clear {
            if let Some(view) = self.view.as_mut() {
                view.session.clear_active();
            }
        }
        if save {
            self.save_points();
        }
        if back {
            self.view = None;
        }
    }

    fn objects_ui(&mut self, ui: &mut egui::Ui) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        let active = view.session.active_index();
        let count = view.session.objects().len();

        let mut selected = None;
        let mut recolor = None;
        for index in 0..count {
            ui.horizontal(|ui| {
                let (color, color_name) = {
                    let object = &view.session.objects()[index];
                    (object.color(), object.color_name())
                };
                let label_color = if active == Some(index) {
                    color
                } else {
                    ui.visuals().text_color()
                };
                ui.label(
                    egui::RichText::new(format!("Obj {}:", index + 1)).color(label_color),
                );

                let entry = ui.add(
                    egui::TextEdit::singleline(view.session.name_mut(index)).desired_width(140.0),
                );
                // Committing the name field activates the object.
                if entry.lost_focus() {
                    selected = Some(index);
                }

                egui::ComboBox::from_id_salt(("object_color", index))
                    .selected_text(egui::RichText::new(color_name).color(color))
                    .show_ui(ui, |ui| {
                        for (name, swatch) in PALETTE {
                            let row = ui.selectable_label(
                                name == color_name,
                                egui::RichText::new(name).color(swatch),
                            );
                            if row.clicked() {
                                recolor = Some((index, name));
                            }
                        }
                    });
            });
        }

        if let Some(index) = selected {
            view.session.select(index);
        }
        if let Some((index, name)) = recolor {
            view.session.set_color_by_name(index, name);
        }
    }

    fn canvas_ui(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        view.ensure_texture(ctx);

        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;

        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        if let Some(ref tex) = view.texture {
            let img_rect = view.image_rect_on_screen(canvas_rect);
            painter.image(
                tex.id(),
                img_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        view.draw_markers(&painter, canvas_rect);

        // Handle pan (middle mouse button)
        let middle_down = ctx.input(|i| i.pointer.middle_down());
        if middle_down {
            let delta = ctx.input(|i| i.pointer.delta());
            view.pan += delta;
            view.panning = true;
        } else {
            view.panning = false;
        }

        // Handle zoom (scroll wheel)
        let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta != 0.0 && response.hovered() {
            let zoom_factor = 1.0 + scroll_delta * 0.002;
            let new_zoom = (view.zoom * zoom_factor).clamp(0.1, 10.0);
            if let Some(cursor) = response.hover_pos() {
                let center = canvas_rect.center();
                let cursor_rel = cursor - center - view.pan;
                view.pan -= cursor_rel * (new_zoom / view.zoom - 1.0);
            }
            view.zoom = new_zoom;
        }

        // A primary click inside the image adds a point to the active object.
        if !view.panning && response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let img_pos = view.screen_to_image(canvas_rect, pos);
                if view.session.click(img_pos.x, img_pos.y) {
                    if let Some(object) = view.session.active_object() {
                        info!(
                            "selected point for {}: ({}, {})",
                            object.name, img_pos.x as i32, img_pos.y as i32
                        );
                    }
                }
            }
        }
    }
}

impl eframe::App for FrameAnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Closing goes through a confirmation dialog.
        if ctx.input(|i| i.viewport().close_requested()) && !self.allow_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            if confirm_quit() {
                self.allow_close = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }

        // Keyboard shortcuts
        if self.video.is_some() && !ctx.wants_keyboard_input() {
            let (left, right) = ctx.input(|i| {
                (
                    i.key_pressed(egui::Key::ArrowLeft),
                    i.key_pressed(egui::Key::ArrowRight),
                )
            });
            if let Some(video) = self.video.as_mut() {
                if left {
                    video.nav.prev();
                }
                if right {
                    video.nav.next();
                }
            }
        }

        if self.view.is_some() {
            egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar_ui(ui));
            egui::TopBottomPanel::bottom("objects").show(ctx, |ui| self.objects_ui(ui));
            egui::CentralPanel::default().show(ctx, |ui| self.canvas_ui(ctx, ui));
        } else {
            egui::CentralPanel::default().show(ctx, |ui| {
                if self.video.is_some() {
                    self.controls_ui(ui);
                } else {
                    self.start_ui(ui);
                }
            });
        }
    }
}

// ── Dialogs ─────────────────────────────────────────────────────────────────

fn error_dialog(message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Error")
        .set_description(message)
        .show();
}

fn warning_dialog(title: &str, message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title(title)
        .set_description(message)
        .show();
}

fn info_dialog(message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Info)
        .set_title("Info")
        .set_description(message)
        .show();
}

fn confirm_quit() -> bool {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Info)
        .set_title("Quit")
        .set_description("Do you want to close the application?")
        .set_buttons(rfd::MessageButtons::OkCancel)
        .show()
        == rfd::MessageDialogResult::Ok
}
