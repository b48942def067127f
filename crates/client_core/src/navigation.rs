//! Sidebar sections and the roles allowed to see them.

use shared::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Inventory,
    Suppliers,
    Orders,
    Reports,
    Users,
}

const ALL_SECTIONS: [Section; 6] = [
    Section::Dashboard,
    Section::Inventory,
    Section::Suppliers,
    Section::Orders,
    Section::Reports,
    Section::Users,
];

impl Section {
    pub fn label(&self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Inventory => "Inventory",
            Section::Suppliers => "Suppliers",
            Section::Orders => "Orders",
            Section::Reports => "Reports",
            Section::Users => "Users",
        }
    }

    pub fn href(&self) -> &'static str {
        match self {
            Section::Dashboard => "/dashboard",
            Section::Inventory => "/inventory",
            Section::Suppliers => "/suppliers",
            Section::Orders => "/orders",
            Section::Reports => "/reports",
            Section::Users => "/users",
        }
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Section::Dashboard | Section::Inventory | Section::Suppliers => {
                &[Role::Admin, Role::Manager, Role::Viewer]
            }
            Section::Orders | Section::Reports => &[Role::Admin, Role::Manager],
            Section::Users => &[Role::Admin],
        }
    }

    pub fn is_visible_to(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

pub fn visible_sections(role: Role) -> Vec<Section> {
    ALL_SECTIONS
        .into_iter()
        .filter(|section| section.is_visible_to(role))
        .collect()
}

/// Section highlighted for `path` (prefix match, so `/orders/new` is Orders).
pub fn section_for_path(path: &str) -> Option<Section> {
    ALL_SECTIONS
        .into_iter()
        .find(|section| path.starts_with(section.href()))
}
