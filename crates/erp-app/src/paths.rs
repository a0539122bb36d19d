// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Route paths for every navigable view.

pub const ROOT: &str = "/";
pub const PARTS: &str = "/x/items/parts";
pub const NEW_PART: &str = "/x/part/new";
pub const BULK_UPDATE_ITEMS: &str = "/x/items/update";
pub const EMPLOYEES: &str = "/x/users/employees";
pub const NEW_EMPLOYEE: &str = "/x/users/employees/new";
pub const LOGOUT: &str = "/logout";

pub fn root() -> String {
    ROOT.to_owned()
}

pub fn parts() -> String {
    PARTS.to_owned()
}

pub fn part(id: &str) -> String {
    format!("/x/part/{id}")
}

pub fn part_details(id: &str) -> String {
    format!("/x/part/{id}/view/details")
}

pub fn edit_part(id: &str) -> String {
    format!("/x/part/{id}/edit")
}

pub fn new_part() -> String {
    NEW_PART.to_owned()
}

pub fn delete_item(id: &str) -> String {
    format!("/x/items/delete/{id}")
}

pub fn bulk_update_items() -> String {
    BULK_UPDATE_ITEMS.to_owned()
}

pub fn employees() -> String {
    EMPLOYEES.to_owned()
}

pub fn employee_account(id: &str) -> String {
    format!("/x/users/employees/{id}")
}

pub fn new_employee() -> String {
    NEW_EMPLOYEE.to_owned()
}

pub fn logout() -> String {
    LOGOUT.to_owned()
}

/// Appends a query string, skipping the separator when it is empty.
pub fn with_query(path: &str, query: &str) -> String {
    let query = query.trim_start_matches('?');
    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    }
}

/// Route parameters recognised in a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Parts,
    NewPart,
    Part(String),
    PartDetails(String),
    EditPart(String),
    Employees,
    NewEmployee,
    EmployeeAccount(String),
    Logout,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => Self::Root,
            ["logout"] => Self::Logout,
            ["x", "items", "parts"] => Self::Parts,
            ["x", "part", "new"] => Self::NewPart,
            ["x", "part", id] => Self::Part((*id).to_owned()),
            ["x", "part", id, "edit"] => Self::EditPart((*id).to_owned()),
            ["x", "part", id, "view", "details"] => Self::PartDetails((*id).to_owned()),
            ["x", "users", "employees"] => Self::Employees,
            ["x", "users", "employees", "new"] => Self::NewEmployee,
            ["x", "users", "employees", id] => Self::EmployeeAccount((*id).to_owned()),
            _ => return None,
        };
        Some(route)
    }
}
