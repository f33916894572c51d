use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use client_core::{
    datetime::draft_from_todo,
    view::{is_overdue, visible_todos},
    Filter, MutationKind, Notice, NoticeBoard, TodoStats,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use serde::{Deserialize, Serialize};
use shared::domain::{Principal, Priority, Todo, TodoDraft, TodoId};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::{UiError, UiErrorContext, UiEvent},
    orchestration::dispatch_backend_command,
};
use crate::ui::{
    theme::{ThemeChoice, ACCENT, DANGER, SUCCESS},
    widgets,
};

pub const SETTINGS_STORAGE_KEY: &str = "todo_desktop.settings";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedDesktopSettings {
    #[serde(default)]
    pub theme: ThemeChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppView {
    Starting,
    SignIn,
    SignUp,
    ConfirmSignUp,
    Todos,
}

#[derive(Debug, Default)]
struct AuthForm {
    username: String,
    email: String,
    password: String,
    code: String,
    pending: bool,
    error: Option<String>,
}

impl AuthForm {
    fn keep_username(&mut self, username: String) {
        *self = Self {
            username,
            ..Self::default()
        };
    }
}

#[derive(Debug, Default)]
struct TodoForm {
    draft: TodoDraft,
    editing: Option<TodoId>,
    error: Option<String>,
}

impl TodoForm {
    fn reset(&mut self) {
        self.draft.clear();
        self.editing = None;
        self.error = None;
    }
}

pub struct DesktopGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    view: AppView,
    auth: AuthForm,
    principal: Option<Principal>,
    todos: Vec<Todo>,
    list_loading: bool,
    operation_in_flight: bool,
    filter: Filter,
    form: TodoForm,
    pending_delete: Option<Todo>,
    notices: NoticeBoard,
    status: String,
    theme: ThemeChoice,
    applied_theme: Option<ThemeChoice>,
}

impl DesktopGuiApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        persisted: Option<PersistedDesktopSettings>,
    ) -> Self {
        let persisted = persisted.unwrap_or_default();
        Self {
            cmd_tx,
            ui_rx,
            view: AppView::Starting,
            auth: AuthForm::default(),
            principal: None,
            todos: Vec::new(),
            list_loading: false,
            operation_in_flight: false,
            filter: Filter::All,
            form: TodoForm::default(),
            pending_delete: None,
            notices: NoticeBoard::default(),
            status: String::new(),
            theme: persisted.theme,
            applied_theme: None,
        }
    }

    fn dispatch(&mut self, cmd: BackendCommand) -> bool {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status)
    }

    fn show_notice(&mut self, notice: Notice) {
        self.notices.show(notice, Instant::now());
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => self.status = message,
                UiEvent::SignedOut => {
                    self.view = AppView::SignIn;
                    self.principal = None;
                    self.todos.clear();
                    self.form.reset();
                    self.pending_delete = None;
                    self.list_loading = false;
                    self.operation_in_flight = false;
                    self.auth.pending = false;
                }
                UiEvent::SignedIn(principal) => {
                    self.principal = Some(principal);
                    self.view = AppView::Todos;
                    self.auth = AuthForm::default();
                }
                UiEvent::SignUpComplete {
                    username,
                    confirmed,
                } => {
                    self.auth.keep_username(username);
                    if confirmed {
                        self.view = AppView::SignIn;
                        self.show_notice(Notice::success("Account created. Please sign in."));
                    } else {
                        self.view = AppView::ConfirmSignUp;
                        self.show_notice(Notice::success(
                            "Check your email for a confirmation code.",
                        ));
                    }
                }
                UiEvent::SignUpConfirmed { username } => {
                    self.auth.keep_username(username);
                    self.view = AppView::SignIn;
                    self.show_notice(Notice::success("Account confirmed. Please sign in."));
                }
                UiEvent::ListLoading => {
                    self.list_loading = true;
                    self.status.clear();
                }
                UiEvent::Snapshot(todos) => {
                    self.todos = todos;
                    self.list_loading = false;
                    self.drop_stale_selections();
                }
                UiEvent::Notice(notice) => self.show_notice(notice),
                UiEvent::MutationFinished {
                    kind,
                    succeeded,
                    notice,
                } => {
                    self.operation_in_flight = false;
                    if succeeded && matches!(kind, MutationKind::Create | MutationKind::Update) {
                        self.form.reset();
                    }
                    if let Some(notice) = notice {
                        self.show_notice(notice);
                    }
                }
                UiEvent::DraftRejected(message) => {
                    self.operation_in_flight = false;
                    self.form.error = Some(message);
                }
                UiEvent::Error(err) => self.handle_error(err),
            }
        }
    }

    fn handle_error(&mut self, err: UiError) {
        tracing::warn!(
            category = ?err.category(),
            context = ?err.context(),
            "{}",
            err.message()
        );
        match err.context() {
            UiErrorContext::SignIn | UiErrorContext::SignUp | UiErrorContext::ConfirmSignUp => {
                self.auth.pending = false;
                self.auth.error = Some(err.message().to_string());
            }
            UiErrorContext::BackendStartup => {
                self.status = err.message().to_string();
                self.show_notice(Notice::error(err.message()));
            }
            UiErrorContext::General => {
                self.show_notice(Notice::error(err.message()));
                if err.requires_reauth() {
                    self.view = AppView::SignIn;
                }
            }
        }
    }

    /// Forgets edit/delete targets that vanished from the list.
    fn drop_stale_selections(&mut self) {
        let known = |id: &TodoId| self.todos.iter().any(|todo| &todo.id == id);
        if self
            .pending_delete
            .as_ref()
            .is_some_and(|todo| !known(&todo.id))
        {
            self.pending_delete = None;
        }
        if self.form.editing.as_ref().is_some_and(|id| !known(id)) {
            self.form.reset();
        }
    }

    fn apply_theme_if_needed(&mut self, ctx: &egui::Context) {
        if self.applied_theme != Some(self.theme) {
            self.theme.apply(ctx);
            self.applied_theme = Some(self.theme);
        }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.heading(egui::RichText::new("To-do").color(ACCENT).strong());
                if let Some(principal) = &self.principal {
                    ui.weak(format!("· {}", principal.username));
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.principal.is_some() && ui.button("Sign out").clicked() {
                        self.dispatch(BackendCommand::SignOut);
                    }
                    egui::ComboBox::from_id_salt("theme_choice")
                        .selected_text(self.theme.label())
                        .show_ui(ui, |ui| {
                            for choice in ThemeChoice::ALL {
                                ui.selectable_value(&mut self.theme, choice, choice.label());
                            }
                        });
                    ui.weak("Theme");
                });
            });
            ui.add_space(4.0);
        });
    }

    fn show_notice_area(&mut self, ui: &mut egui::Ui) {
        if let Some(notice) = self.notices.current(Instant::now()) {
            widgets::notice_banner(ui, notice);
            ui.add_space(8.0);
        }
    }

    fn show_auth_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let avail = ui.available_size();
            ui.add_space((avail.y * 0.1).clamp(12.0, 80.0));
            ui.vertical_centered(|ui| {
                ui.set_width(avail.x.clamp(360.0, 440.0));
                self.show_notice_area(ui);
                widgets::card_frame(ui).show(ui, |ui| {
                    ui.style_mut().spacing.item_spacing = egui::vec2(8.0, 8.0);
                    match self.view {
                        AppView::SignUp => self.show_sign_up(ui),
                        AppView::ConfirmSignUp => self.show_confirm_sign_up(ui),
                        _ => self.show_sign_in(ui),
                    }
                    if let Some(error) = &self.auth.error {
                        ui.label(egui::RichText::new(error).color(DANGER));
                    }
                    if self.auth.pending {
                        ui.spinner();
                    }
                });
            });
        });
    }

    fn show_sign_in(&mut self, ui: &mut egui::Ui) {
        ui.heading("Sign in");
        widgets::form_field(ui, "Username", &mut self.auth.username, "username or email", false);
        let password = widgets::form_field(ui, "Password", &mut self.auth.password, "", true);
        let submit_on_enter =
            password.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

        let ready = !self.auth.pending
            && !self.auth.username.trim().is_empty()
            && !self.auth.password.is_empty();
        let clicked = ui.add_enabled(ready, egui::Button::new("Sign in")).clicked();
        if ready && (clicked || submit_on_enter) {
            self.auth.pending = true;
            self.auth.error = None;
            let cmd = BackendCommand::SignIn {
                username: self.auth.username.trim().to_string(),
                password: self.auth.password.clone(),
            };
            if !self.dispatch(cmd) {
                self.auth.pending = false;
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.weak("No account yet?");
            if ui.link("Create one").clicked() {
                self.auth.error = None;
                self.view = AppView::SignUp;
            }
        });
    }

    fn show_sign_up(&mut self, ui: &mut egui::Ui) {
        ui.heading("Create account");
        widgets::form_field(ui, "Username", &mut self.auth.username, "", false);
        widgets::form_field(ui, "Email", &mut self.auth.email, "you@example.com", false);
        widgets::form_field(ui, "Password", &mut self.auth.password, "", true);

        let ready = !self.auth.pending
            && !self.auth.username.trim().is_empty()
            && !self.auth.email.trim().is_empty()
            && !self.auth.password.is_empty();
        if ui.add_enabled(ready, egui::Button::new("Sign up")).clicked() {
            self.auth.pending = true;
            self.auth.error = None;
            let cmd = BackendCommand::SignUp {
                username: self.auth.username.trim().to_string(),
                email: self.auth.email.trim().to_string(),
                password: self.auth.password.clone(),
            };
            if !self.dispatch(cmd) {
                self.auth.pending = false;
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.link("Back to sign in").clicked() {
                self.auth.error = None;
                self.view = AppView::SignIn;
            }
            if ui.link("I have a code").clicked() {
                self.auth.error = None;
                self.view = AppView::ConfirmSignUp;
            }
        });
    }

    fn show_confirm_sign_up(&mut self, ui: &mut egui::Ui) {
        ui.heading("Confirm account");
        widgets::form_field(ui, "Username", &mut self.auth.username, "", false);
        widgets::form_field(ui, "Confirmation code", &mut self.auth.code, "123456", false);

        let ready = !self.auth.pending
            && !self.auth.username.trim().is_empty()
            && !self.auth.code.trim().is_empty();
        if ui.add_enabled(ready, egui::Button::new("Confirm")).clicked() {
            self.auth.pending = true;
            self.auth.error = None;
            let cmd = BackendCommand::ConfirmSignUp {
                username: self.auth.username.trim().to_string(),
                code: self.auth.code.trim().to_string(),
            };
            if !self.dispatch(cmd) {
                self.auth.pending = false;
            }
        }

        ui.separator();
        if ui.link("Back to sign in").clicked() {
            self.auth.error = None;
            self.view = AppView::SignIn;
        }
    }

    fn show_todos_screen(&mut self, ctx: &egui::Context) {
        let now = Utc::now();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.set_max_width(760.0);
            self.show_notice_area(ui);
            if !self.status.is_empty() {
                ui.weak(&self.status);
            }
            self.show_todo_form(ui);
            ui.add_space(10.0);
            self.show_stats(ui, now);
            ui.add_space(10.0);
            self.show_filter_bar(ui);
            ui.add_space(6.0);
            self.show_list(ui, now);
        });
        self.show_delete_modal(ctx);
    }

    fn show_todo_form(&mut self, ui: &mut egui::Ui) {
        let editing = self.form.editing.is_some();
        let enabled = !self.operation_in_flight;
        widgets::card_frame(ui).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.strong(if editing { "Edit to-do" } else { "New to-do" });
            ui.add_enabled_ui(enabled, |ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.form.draft.title)
                        .hint_text("What needs to be done?")
                        .desired_width(f32::INFINITY),
                );
                ui.add(
                    egui::TextEdit::multiline(&mut self.form.draft.description)
                        .hint_text("Description (optional)")
                        .desired_rows(2)
                        .desired_width(f32::INFINITY),
                );
                ui.horizontal(|ui| {
                    let selected = self.form.draft.priority.unwrap_or_default();
                    egui::ComboBox::from_id_salt("draft_priority")
                        .selected_text(selected.label())
                        .show_ui(ui, |ui| {
                            for priority in Priority::ALL {
                                ui.selectable_value(
                                    &mut self.form.draft.priority,
                                    Some(priority),
                                    priority.label(),
                                );
                            }
                        });
                    ui.add(
                        egui::TextEdit::singleline(&mut self.form.draft.due_date_input)
                            .hint_text("Due YYYY-MM-DDTHH:MM")
                            .desired_width(180.0),
                    );
                });
            });

            if let Some(error) = &self.form.error {
                ui.label(egui::RichText::new(error).color(DANGER));
            }

            ui.horizontal(|ui| {
                let label = if editing { "Save changes" } else { "Add to-do" };
                let submit = ui.add_enabled(enabled, egui::Button::new(label)).clicked();
                if editing && ui.add_enabled(enabled, egui::Button::new("Cancel")).clicked() {
                    self.form.reset();
                }
                if self.operation_in_flight {
                    ui.spinner();
                }
                if submit {
                    self.submit_form();
                }
            });
        });
    }

    fn submit_form(&mut self) {
        self.form.error = None;
        let draft = self.form.draft.clone();
        let cmd = match self.form.editing.clone() {
            Some(id) => BackendCommand::UpdateTodo { id, draft },
            None => BackendCommand::CreateTodo { draft },
        };
        self.operation_in_flight = self.dispatch(cmd);
    }

    fn show_stats(&mut self, ui: &mut egui::Ui, now: chrono::DateTime<Utc>) {
        let stats = TodoStats::compute(&self.todos, now);
        ui.columns(4, |columns| {
            widgets::stat_tile(&mut columns[0], "Total", stats.total, None);
            widgets::stat_tile(&mut columns[1], "Active", stats.active, Some(ACCENT));
            widgets::stat_tile(&mut columns[2], "Completed", stats.completed, Some(SUCCESS));
            widgets::stat_tile(&mut columns[3], "Overdue", stats.overdue, Some(DANGER));
        });
    }

    fn show_filter_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Show");
            let label = |filter: Filter, todos: &[Todo]| {
                format!("{} ({})", filter.label(), filter.count_in(todos))
            };
            egui::ComboBox::from_id_salt("todo_filter")
                .selected_text(label(self.filter, &self.todos))
                .show_ui(ui, |ui| {
                    for filter in Filter::ALL {
                        let text = label(filter, &self.todos);
                        ui.selectable_value(&mut self.filter, filter, text);
                    }
                });
            if self.list_loading {
                ui.spinner();
                ui.weak("Loading to-dos…");
            } else if ui.small_button("Reload").clicked() {
                self.dispatch(BackendCommand::Reload);
            }
        });
    }

    fn show_list(&mut self, ui: &mut egui::Ui, now: chrono::DateTime<Utc>) {
        let visible: Vec<Todo> = visible_todos(&self.todos, self.filter)
            .into_iter()
            .cloned()
            .collect();

        if visible.is_empty() && !self.list_loading {
            ui.add_space(24.0);
            ui.vertical_centered(|ui| ui.weak(self.filter.empty_state_text()));
            return;
        }

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for todo in &visible {
                    self.show_row(ui, todo, now);
                    ui.add_space(6.0);
                }
            });
    }

    fn show_row(&mut self, ui: &mut egui::Ui, todo: &Todo, now: chrono::DateTime<Utc>) {
        let overdue = is_overdue(todo, now);
        let busy = self.operation_in_flight;
        widgets::card_frame(ui).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                let mut completed = todo.completed;
                let toggled = ui
                    .add_enabled(!busy, egui::Checkbox::without_text(&mut completed))
                    .clicked();
                if toggled {
                    self.operation_in_flight = self.dispatch(BackendCommand::ToggleComplete {
                        id: todo.id.clone(),
                    });
                }

                let mut title = egui::RichText::new(&todo.title).strong();
                if todo.completed {
                    title = title.strikethrough().weak();
                }
                ui.label(title);
                widgets::priority_badge(ui, todo.priority);
                if overdue {
                    ui.label(egui::RichText::new("Overdue").small().strong().color(DANGER));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.add_enabled(!busy, egui::Button::new("Delete")).clicked() {
                        self.pending_delete = Some(todo.clone());
                    }
                    if ui.add_enabled(!busy, egui::Button::new("Edit")).clicked() {
                        self.form.draft = draft_from_todo(todo, &Local);
                        self.form.editing = Some(todo.id.clone());
                        self.form.error = None;
                    }
                });
            });

            if let Some(description) = todo.description.as_deref().filter(|d| !d.is_empty()) {
                ui.label(description);
            }
            ui.horizontal(|ui| {
                ui.weak(format!("Created {}", widgets::format_local_day(todo.created_at)));
                if let Some(due) = todo.due_date {
                    let text = format!("Due {}", widgets::format_local_timestamp(due));
                    if overdue {
                        ui.label(egui::RichText::new(text).small().color(DANGER));
                    } else {
                        ui.weak(text);
                    }
                }
            });
        });
    }

    fn show_delete_modal(&mut self, ctx: &egui::Context) {
        let Some(target) = self.pending_delete.clone() else {
            return;
        };
        let mut decision = None;
        let modal = egui::Modal::new(egui::Id::new("confirm_delete")).show(ctx, |ui| {
            ui.set_width(320.0);
            ui.heading("Delete to-do?");
            ui.label(format!("\"{}\" will be removed permanently.", target.title));
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui
                    .button(egui::RichText::new("Delete").color(DANGER))
                    .clicked()
                {
                    decision = Some(true);
                }
                if ui.button("Cancel").clicked() {
                    decision = Some(false);
                }
            });
        });
        if modal.should_close() && decision.is_none() {
            decision = Some(false);
        }

        match decision {
            Some(true) => {
                self.pending_delete = None;
                self.operation_in_flight =
                    self.dispatch(BackendCommand::DeleteTodo { id: target.id });
            }
            Some(false) => self.pending_delete = None,
            None => {}
        }
    }
}

impl eframe::App for DesktopGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.apply_theme_if_needed(ctx);
        self.notices.expire(Instant::now());

        self.show_header(ctx);
        match self.view {
            AppView::Starting => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(80.0);
                        ui.spinner();
                        ui.weak("Connecting…");
                    });
                });
            }
            AppView::SignIn | AppView::SignUp | AppView::ConfirmSignUp => {
                self.show_auth_screen(ctx)
            }
            AppView::Todos => self.show_todos_screen(ctx),
        }

        ctx.request_repaint_after(Duration::from_millis(100));
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedDesktopSettings { theme: self.theme };
        if let Ok(serialized) = serde_json::to_string(&settings) {
            storage.set_string(SETTINGS_STORAGE_KEY, serialized);
        }
    }
}
