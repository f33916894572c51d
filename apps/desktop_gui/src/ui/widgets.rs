//! Small reusable widgets for the to-do window.

use chrono::{DateTime, Local, Utc};
use client_core::{Notice, NoticeKind};
use eframe::egui;
use shared::domain::Priority;

use crate::ui::theme::{self, DANGER, SUCCESS};

pub fn card_frame(ui: &egui::Ui) -> egui::Frame {
    egui::Frame::NONE
        .fill(ui.visuals().faint_bg_color)
        .corner_radius(10.0)
        .stroke(egui::Stroke::new(
            1.0,
            ui.visuals().widgets.noninteractive.bg_stroke.color,
        ))
        .inner_margin(egui::Margin::symmetric(14, 12))
}

pub fn priority_badge(ui: &mut egui::Ui, priority: Priority) {
    let color = theme::priority_color(priority, ui.visuals().dark_mode);
    egui::Frame::NONE
        .fill(color.gamma_multiply(0.18))
        .corner_radius(6.0)
        .inner_margin(egui::Margin::symmetric(6, 2))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(priority.label()).small().strong().color(color));
        });
}

pub fn notice_banner(ui: &mut egui::Ui, notice: &Notice) {
    let color = match notice.kind {
        NoticeKind::Success => SUCCESS,
        NoticeKind::Error => DANGER,
    };
    egui::Frame::NONE
        .fill(color.gamma_multiply(0.15))
        .stroke(egui::Stroke::new(1.0, color))
        .corner_radius(8.0)
        .inner_margin(egui::Margin::symmetric(12, 8))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(egui::RichText::new(&notice.text).color(color));
        });
}

pub fn stat_tile(ui: &mut egui::Ui, label: &str, value: usize, color: Option<egui::Color32>) {
    card_frame(ui).show(ui, |ui| {
        ui.vertical_centered(|ui| {
            let mut text = egui::RichText::new(value.to_string()).size(22.0).strong();
            if let Some(color) = color {
                text = text.color(color);
            }
            ui.label(text);
            ui.weak(label);
        });
    });
}

pub fn form_field(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut String,
    hint: &str,
    password: bool,
) -> egui::Response {
    ui.label(label);
    ui.add(
        egui::TextEdit::singleline(value)
            .hint_text(hint)
            .password(password)
            .desired_width(f32::INFINITY),
    )
}

pub fn format_local_timestamp(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%b %-d, %Y %H:%M")
        .to_string()
}

pub fn format_local_day(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%b %-d, %Y").to_string()
}
