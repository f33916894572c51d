//! Fatal configuration screen shown instead of the main window.

use eframe::egui;

pub struct ConfigErrorApp {
    detail: String,
    remediation: String,
}

impl ConfigErrorApp {
    pub fn new(detail: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            remediation: remediation.into(),
        }
    }
}

impl eframe::App for ConfigErrorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space((ui.available_height() * 0.2).clamp(16.0, 120.0));
            ui.vertical_centered(|ui| {
                ui.set_width(ui.available_width().clamp(320.0, 560.0));
                ui.heading("Backend configuration missing");
                ui.add_space(8.0);
                ui.label(
                    egui::RichText::new(&self.detail).color(crate::ui::theme::DANGER),
                );
                ui.add_space(8.0);
                ui.label(&self.remediation);
                ui.add_space(16.0);
                if ui.button("Quit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }
}
