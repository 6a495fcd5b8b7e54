// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};
use vitrine_app::input::{artwork_input_kind, parse_cell_input};
use vitrine_app::runner::settle;
use vitrine_app::{
    Artwork, ArtworkId, Navigation, Notice, TableBackend, TableCommand, TableController,
    TableEffect, TableSpec,
};

/// `ID.FIELD=VALUE` from the command line, still as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row_id: i64,
    pub field_path: String,
    pub raw: String,
}

impl CellEdit {
    pub fn parse(arg: &str) -> Result<Self> {
        let (target, raw) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("edit {arg:?} must look like ID.FIELD=VALUE"))?;
        let (row_id, field_path) = target
            .split_once('.')
            .ok_or_else(|| anyhow!("edit {arg:?} must look like ID.FIELD=VALUE"))?;
        let row_id = row_id
            .trim()
            .parse()
            .with_context(|| format!("edit {arg:?} has a non-numeric row id"))?;
        let field_path = field_path.trim();
        if field_path.is_empty() {
            bail!("edit {arg:?} names no field");
        }
        Ok(Self {
            row_id,
            field_path: field_path.to_owned(),
            raw: raw.to_owned(),
        })
    }
}

/// Parses `FIELD=VALUE` pairs into bulk patch properties.
pub fn bulk_properties(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut properties = Map::new();
    for pair in pairs {
        let (field, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("bulk value {pair:?} must look like FIELD=VALUE"))?;
        let field = field.trim();
        let kind = artwork_input_kind(field)
            .ok_or_else(|| anyhow!("artwork field {field:?} cannot be bulk edited"))?;
        let value = parse_cell_input(kind, raw).with_context(|| format!("bulk value for {field}"))?;
        properties.insert(field.to_owned(), value);
    }
    Ok(properties)
}

/// Drives one artwork list page to quiescence after every command.
pub struct TableSession {
    controller: TableController<Artwork>,
    backend: Box<dyn TableBackend<Artwork>>,
    notices: Vec<Notice>,
    navigations: Vec<Navigation>,
}

impl TableSession {
    pub fn open(spec: TableSpec, backend: Box<dyn TableBackend<Artwork>>, location: &str) -> Self {
        let mut session = Self {
            controller: TableController::new(spec),
            backend,
            notices: Vec::new(),
            navigations: Vec::new(),
        };
        let effects = session.controller.open(location);
        session.drive(effects);
        session
    }

    pub fn run(&mut self, command: TableCommand<ArtworkId>) {
        let effects = self.controller.dispatch(command);
        self.drive(effects);
    }

    pub fn edit(&mut self, edit: &CellEdit) -> Result<()> {
        let kind = artwork_input_kind(&edit.field_path)
            .ok_or_else(|| anyhow!("artwork field {:?} is not editable", edit.field_path))?;
        let value = parse_cell_input(kind, &edit.raw)
            .with_context(|| format!("value for {}.{}", edit.row_id, edit.field_path))?;
        let effects = self
            .controller
            .commit(ArtworkId::new(edit.row_id), &edit.field_path, value);
        self.drive(effects);
        Ok(())
    }

    pub fn controller(&self) -> &TableController<Artwork> {
        &self.controller
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn navigations(&self) -> &[Navigation] {
        &self.navigations
    }

    fn drive(&mut self, effects: Vec<TableEffect>) {
        for effect in settle(&mut self.controller, self.backend.as_mut(), effects) {
            match effect {
                TableEffect::Notice(notice) => self.notices.push(notice),
                TableEffect::Navigate(navigation) => self.navigations.push(navigation),
                TableEffect::Request(request) => {
                    tracing::debug!(request_id = request.request_id().get(), "request left unsettled");
                }
            }
        }
    }
}
