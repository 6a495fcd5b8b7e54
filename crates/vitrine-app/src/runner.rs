// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Executes [`TableRequest`]s against a [`TableBackend`].

use anyhow::{Result, anyhow, bail};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::backend::{BulkStep, TableBackend};
use crate::controller::{Completion, TableController, TableEffect, TableRequest};
use crate::model::Entity;

/// Runs one request to completion on the calling thread.
pub fn execute<T, B>(backend: &mut B, request: &TableRequest) -> Completion<T>
where
    T: Entity,
    B: TableBackend<T> + ?Sized,
{
    match request {
        TableRequest::LoadFacets { request_id } => Completion::Facets {
            request_id: *request_id,
            result: backend.facet_vocabulary(),
        },
        TableRequest::FetchPage {
            request_id,
            listing,
        } => Completion::Page {
            request_id: *request_id,
            result: backend.list(listing),
        },
        TableRequest::Persist { request_id, update } => Completion::Persist {
            request_id: *request_id,
            result: backend.update(update),
        },
        TableRequest::Bulk { request_id, steps } => Completion::Bulk {
            request_id: *request_id,
            result: run_bulk(backend, steps),
        },
    }
}

/// Runs every step and reports success only if all of them succeeded.
/// Steps that did succeed are not rolled back when a sibling fails.
fn run_bulk<T, B>(backend: &mut B, steps: &[BulkStep]) -> Result<()>
where
    T: Entity,
    B: TableBackend<T> + ?Sized,
{
    let failures: Vec<String> = steps
        .iter()
        .filter_map(|step| {
            backend
                .bulk(step)
                .err()
                .map(|error| format!("{}: {error:#}", step.label()))
        })
        .collect();
    if failures.is_empty() {
        return Ok(());
    }
    if failures.len() < steps.len() {
        tracing::warn!(
            failed = failures.len(),
            total = steps.len(),
            "bulk batch partially applied"
        );
    }
    bail!("{}", failures.join("; "))
}

/// Runs `request` on a worker thread and posts its completion to `tx`.
pub fn spawn<T, B>(backend: Arc<Mutex<B>>, request: TableRequest, tx: Sender<Completion<T>>)
where
    T: Entity + Send + 'static,
    B: TableBackend<T> + Send + 'static,
{
    thread::spawn(move || {
        let completion = match backend.lock() {
            Ok(mut backend) => execute(&mut *backend, &request),
            Err(_) => failed(&request, anyhow!("backend lock poisoned")),
        };
        if tx.send(completion).is_err() {
            tracing::debug!(
                request_id = request.request_id().get(),
                "completion dropped; controller gone"
            );
        }
    });
}

fn failed<T>(request: &TableRequest, error: anyhow::Error) -> Completion<T> {
    let request_id = request.request_id();
    match request {
        TableRequest::LoadFacets { .. } => Completion::Facets {
            request_id,
            result: Err(error),
        },
        TableRequest::FetchPage { .. } => Completion::Page {
            request_id,
            result: Err(error),
        },
        TableRequest::Persist { .. } => Completion::Persist {
            request_id,
            result: Err(error),
        },
        TableRequest::Bulk { .. } => Completion::Bulk {
            request_id,
            result: Err(error),
        },
    }
}

/// Drives `effects` to quiescence on the calling thread, feeding every
/// completion back into `controller`. Returns the effects that are not
/// requests (navigations and notices) in the order they were produced.
pub fn settle<T, B>(
    controller: &mut TableController<T>,
    backend: &mut B,
    effects: Vec<TableEffect>,
) -> Vec<TableEffect>
where
    T: Entity,
    B: TableBackend<T> + ?Sized,
{
    let mut queue = std::collections::VecDeque::from(effects);
    let mut surfaced = Vec::new();
    while let Some(effect) = queue.pop_front() {
        match effect {
            TableEffect::Request(request) => {
                let completion = execute(backend, &request);
                queue.extend(controller.complete(completion));
            }
            other => surfaced.push(other),
        }
    }
    surfaced
}
