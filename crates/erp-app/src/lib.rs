// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod bulk;
pub mod columns;
pub mod confirm;
pub mod controller;
pub mod employees;
pub mod error;
pub mod filters;
pub mod forms;
pub mod ids;
pub mod menu;
pub mod modal;
pub mod model;
pub mod navigation;
pub mod notify;
pub mod parts;
pub mod paths;
pub mod permissions;
pub mod realtime;
pub mod row;
pub mod state;

pub use bulk::*;
pub use columns::*;
pub use confirm::*;
pub use controller::*;
pub use employees::EmployeesTable;
pub use error::*;
pub use filters::*;
pub use forms::*;
pub use ids::*;
pub use menu::*;
pub use modal::*;
pub use model::*;
pub use navigation::*;
pub use notify::*;
pub use parts::PartsTable;
pub use permissions::*;
pub use realtime::*;
pub use row::*;
pub use state::*;
