// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::navigation::{NavigationPanel, get_module};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Parts,
    Employees,
}

impl ModuleKind {
    pub const ALL: [Self; 2] = [Self::Parts, Self::Employees];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parts => "parts",
            Self::Employees => "employees",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|module| module.as_str() == value)
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Parts => "Parts",
            Self::Employees => "Employees",
        }
    }

    pub fn path(self) -> String {
        match self {
            Self::Parts => paths::parts(),
            Self::Employees => paths::employees(),
        }
    }

    /// Module owning a path, by its `/x/<module>` segment.
    pub fn from_path(path: &str) -> Option<Self> {
        match get_module(path)? {
            "items" | "part" => Some(Self::Parts),
            "users" => Some(Self::Employees),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppMode {
    Table,
    Sidebar,
    ContextMenu,
    BulkMenu,
    ConfirmDelete,
    Modal,
    PartForm,
    Details,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_module: ModuleKind,
    pub sidebar: NavigationPanel,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Table,
            active_module: ModuleKind::Parts,
            sidebar: NavigationPanel::default(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    NextModule,
    PrevModule,
    OpenModule(ModuleKind),
    ToggleSidebar,
    Enter(AppMode),
    ExitToTable,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    ModuleChanged(ModuleKind),
    SidebarChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn with_module(module: ModuleKind) -> Self {
        Self {
            active_module: module,
            ..Self::default()
        }
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextModule => self.rotate_module(1),
            AppCommand::PrevModule => self.rotate_module(-1),
            AppCommand::OpenModule(module) => {
                self.sidebar.close();
                self.mode = AppMode::Table;
                let mut events = vec![
                    AppEvent::SidebarChanged(false),
                    AppEvent::ModeChanged(self.mode),
                ];
                if module != self.active_module {
                    self.active_module = module;
                    events.push(AppEvent::ModuleChanged(module));
                }
                events
            }
            AppCommand::ToggleSidebar => {
                self.sidebar.toggle();
                self.mode = if self.sidebar.expanded {
                    AppMode::Sidebar
                } else {
                    AppMode::Table
                };
                vec![
                    AppEvent::SidebarChanged(self.sidebar.expanded),
                    AppEvent::ModeChanged(self.mode),
                ]
            }
            AppCommand::Enter(mode) => {
                self.mode = mode;
                vec![AppEvent::ModeChanged(mode)]
            }
            AppCommand::ExitToTable => {
                self.mode = AppMode::Table;
                if self.sidebar.expanded {
                    self.sidebar.close();
                    return vec![
                        AppEvent::SidebarChanged(false),
                        AppEvent::ModeChanged(self.mode),
                    ];
                }
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_module(&mut self, delta: isize) -> Vec<AppEvent> {
        let modules = ModuleKind::ALL;
        let current = modules
            .iter()
            .position(|module| *module == self.active_module)
            .unwrap_or(0) as isize;
        let len = modules.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_module = modules[next];
        vec![AppEvent::ModuleChanged(self.active_module)]
    }

    pub fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppMode, AppState, ModuleKind};

    #[test]
    fn module_rotation_wraps() {
        let mut state = AppState::with_module(ModuleKind::Employees);
        let events = state.dispatch(AppCommand::NextModule);
        assert_eq!(state.active_module, ModuleKind::Parts);
        assert_eq!(events, vec![AppEvent::ModuleChanged(ModuleKind::Parts)]);
    }

    #[test]
    fn opening_a_module_collapses_the_sidebar() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::ToggleSidebar);
        assert!(state.sidebar.expanded);
        assert_eq!(state.mode, AppMode::Sidebar);

        let events = state.dispatch(AppCommand::OpenModule(ModuleKind::Employees));
        assert!(!state.sidebar.expanded);
        assert_eq!(state.mode, AppMode::Table);
        assert!(events.contains(&AppEvent::ModuleChanged(ModuleKind::Employees)));
    }

    #[test]
    fn modules_resolve_from_paths() {
        assert_eq!(ModuleKind::from_path("/x/items/parts"), Some(ModuleKind::Parts));
        assert_eq!(ModuleKind::from_path("/x/part/P1/edit"), Some(ModuleKind::Parts));
        assert_eq!(
            ModuleKind::from_path("/x/users/employees/E1"),
            Some(ModuleKind::Employees)
        );
        assert_eq!(ModuleKind::from_path("/"), None);
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();
        assert_eq!(
            state.set_status("saved"),
            AppEvent::StatusUpdated("saved".to_owned())
        );
        state.dispatch(AppCommand::ClearStatus);
        assert_eq!(state.status_line, None);
    }
}
