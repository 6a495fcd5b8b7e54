// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod backend;
pub mod controller;
pub mod editor;
pub mod facets;
pub mod fields;
pub mod ids;
pub mod input;
pub mod model;
pub mod paginator;
pub mod query;
pub mod runner;
pub mod selection;
pub mod source;

pub use backend::*;
pub use controller::*;
pub use editor::*;
pub use facets::*;
pub use ids::*;
pub use model::*;
pub use paginator::*;
pub use query::*;
pub use selection::*;
pub use source::*;
