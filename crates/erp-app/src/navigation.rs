// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::paths;
use crate::permissions::{Capability, PermissionOracle, Resource, Verb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavIcon {
    Parts,
    Employees,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub name: &'static str,
    pub to: String,
    pub icon: NavIcon,
    pub permission: Capability,
}

fn all_modules() -> Vec<NavItem> {
    vec![
        NavItem {
            name: "Parts",
            to: paths::parts(),
            icon: NavIcon::Parts,
            permission: Capability::new(Verb::View, Resource::Parts),
        },
        NavItem {
            name: "Employees",
            to: paths::employees(),
            icon: NavIcon::Employees,
            permission: Capability::new(Verb::View, Resource::Users),
        },
    ]
}

/// Sidebar links the caller may view.
pub fn modules(permissions: &dyn PermissionOracle) -> Vec<NavItem> {
    all_modules()
        .into_iter()
        .filter(|item| permissions.allows(item.permission))
        .collect()
}

/// The segment after the `/x/` prefix, e.g. `items` for `/x/items/parts`.
pub fn get_module(path: &str) -> Option<&str> {
    path.split('/').nth(2).filter(|segment| !segment.is_empty())
}

/// A link is active when its module is the current one or one a matched route declared.
pub fn is_active(link: &NavItem, current_path: &str, matched_modules: &BTreeSet<String>) -> bool {
    let Some(module) = get_module(&link.to) else {
        return false;
    };
    get_module(current_path) == Some(module) || matched_modules.contains(module)
}

/// Collapsible sidebar state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationPanel {
    pub expanded: bool,
}

impl NavigationPanel {
    pub fn open(&mut self) {
        self.expanded = true;
    }

    pub fn close(&mut self) {
        self.expanded = false;
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }

    /// Following a link collapses the panel and yields the destination.
    pub fn follow(&mut self, link: &NavItem) -> String {
        self.close();
        link.to.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{NavigationPanel, get_module, is_active, modules};
    use crate::{Capability, Permissions, Resource, Role, Verb};
    use std::collections::BTreeSet;

    #[test]
    fn module_is_second_segment() {
        assert_eq!(get_module("/x/items/parts"), Some("items"));
        assert_eq!(get_module("/x/users/employees/E1"), Some("users"));
        assert_eq!(get_module("/"), None);
    }

    #[test]
    fn modules_are_filtered_by_view_permission() {
        let permissions = Permissions::all(Role::Employee)
            .without(Capability::new(Verb::View, Resource::Users));
        let links = modules(&permissions);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "Parts");
    }

    #[test]
    fn active_link_matches_current_or_matched_module() {
        let links = modules(&Permissions::all(Role::Employee));
        let parts = &links[0];
        let employees = &links[1];
        let none = BTreeSet::new();
        assert!(is_active(parts, "/x/items/parts?limit=5", &none));
        assert!(!is_active(employees, "/x/items/parts", &none));

        let matched = BTreeSet::from(["users".to_owned()]);
        assert!(is_active(employees, "/x/part/P1", &matched));
    }

    #[test]
    fn following_a_link_closes_the_panel() {
        let links = modules(&Permissions::all(Role::Employee));
        let mut panel = NavigationPanel::default();
        panel.toggle();
        assert!(panel.expanded);
        assert_eq!(panel.follow(&links[1]), "/x/users/employees");
        assert!(!panel.expanded);
    }
}
