use eframe::egui;
use serde::{Deserialize, Serialize};
use shared::domain::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeChoice {
    pub const ALL: [ThemeChoice; 3] = [ThemeChoice::Light, ThemeChoice::Dark, ThemeChoice::System];

    pub fn label(self) -> &'static str {
        match self {
            ThemeChoice::Light => "Light",
            ThemeChoice::Dark => "Dark",
            ThemeChoice::System => "System",
        }
    }

    pub fn preference(self) -> egui::ThemePreference {
        match self {
            ThemeChoice::Light => egui::ThemePreference::Light,
            ThemeChoice::Dark => egui::ThemePreference::Dark,
            ThemeChoice::System => egui::ThemePreference::System,
        }
    }

    pub fn apply(self, ctx: &egui::Context) {
        ctx.set_theme(self.preference());
    }
}

pub const ACCENT: egui::Color32 = egui::Color32::from_rgb(79, 70, 229);
pub const SUCCESS: egui::Color32 = egui::Color32::from_rgb(22, 163, 74);
pub const DANGER: egui::Color32 = egui::Color32::from_rgb(220, 38, 38);

pub fn priority_color(priority: Priority, dark_mode: bool) -> egui::Color32 {
    match (priority, dark_mode) {
        (Priority::Low, false) => egui::Color32::from_rgb(100, 116, 139),
        (Priority::Low, true) => egui::Color32::from_rgb(148, 163, 184),
        (Priority::Medium, false) => egui::Color32::from_rgb(37, 99, 235),
        (Priority::Medium, true) => egui::Color32::from_rgb(96, 165, 250),
        (Priority::High, false) => egui::Color32::from_rgb(217, 119, 6),
        (Priority::High, true) => egui::Color32::from_rgb(251, 191, 36),
        (Priority::Urgent, false) => DANGER,
        (Priority::Urgent, true) => egui::Color32::from_rgb(248, 113, 113),
    }
}
