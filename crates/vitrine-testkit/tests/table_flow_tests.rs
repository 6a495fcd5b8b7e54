// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde_json::{Map, json};
use vitrine_app::runner::settle;
use vitrine_app::{
    Artwork, ArtworkStatus, CellPhase, FilterCriterion, FixedPredicate, HistoryMode,
    ListingRequest, NoticeLevel, PageStep, StoreType, TableCommand, TableController, TableEffect,
    TableSpec,
};
use vitrine_db::Store;
use vitrine_testkit::{FlakyBackend, demo_store};

const PAGE_SIZE: usize = 10;

fn spec() -> TableSpec {
    TableSpec {
        default_page_size: PAGE_SIZE,
        ..TableSpec::artworks()
    }
}

fn active_count(store: &Store, filters: Vec<FilterCriterion>) -> Result<usize> {
    Ok(store
        .list_artworks(&ListingRequest {
            keyword: None,
            filters,
            offset: 0,
            limit: 1,
            fixed_predicate: Some(FixedPredicate::new("status", ["active"])),
        })?
        .total_count)
}

fn opened(backend: &mut FlakyBackend<Store>) -> TableController<Artwork> {
    let mut controller = TableController::new(spec());
    let effects = controller.open("");
    settle(&mut controller, backend, effects);
    controller
}

fn notices(effects: &[TableEffect]) -> Vec<(NoticeLevel, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            TableEffect::Notice(notice) => Some((notice.level, notice.message.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn open_lists_active_artworks_with_facets() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let controller = opened(&mut backend);

    assert_eq!(controller.total_count(), 36, "every tenth seeded row is archived");
    assert_eq!(controller.rows().len(), PAGE_SIZE);
    assert_eq!(controller.page_count(), 4);
    assert!(
        controller
            .rows()
            .iter()
            .all(|artwork| artwork.status == ArtworkStatus::Active)
    );

    let facets = controller.available_filters();
    let keys: Vec<&str> = facets.iter().map(|facet| facet.key.as_str()).collect();
    assert_eq!(keys, vec!["storeType", "nationality", "artist"]);
    assert_eq!(facets[0].options.len(), StoreType::ALL.len());
    assert!(!facets[1].options.is_empty());
    assert_eq!(backend.calls, vec!["facets".to_owned(), "list@0".to_owned()]);
    Ok(())
}

#[test]
fn filters_narrow_results_and_replace_history() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);

    let effects = controller.dispatch(TableCommand::AddFilter {
        facet_key: "storeType".to_owned(),
        value: "inStock".to_owned(),
    });
    let surfaced = settle(&mut controller, &mut backend, effects);

    let [TableEffect::Navigate(navigation)] = surfaced.as_slice() else {
        panic!("expected a single navigation: {surfaced:?}");
    };
    assert_eq!(navigation.location, "storeType=inStock");
    assert_eq!(navigation.history, HistoryMode::Replace);

    let expected = active_count(
        &backend.inner,
        vec![FilterCriterion {
            field: "storeType".to_owned(),
            values: vec!["inStock".to_owned()],
        }],
    )?;
    assert_eq!(controller.total_count(), expected);
    assert!(
        controller
            .rows()
            .iter()
            .all(|artwork| artwork.store_type == StoreType::InStock)
    );

    let selected = controller.selected_filters();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].label, "在庫");
    Ok(())
}

#[test]
fn paging_walks_the_result_set_and_reuses_cached_pages() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);
    let first_page: Vec<_> = controller.rows().iter().map(|a| a.id).collect();

    let effects = controller.dispatch(TableCommand::StepPage(PageStep::Next));
    settle(&mut controller, &mut backend, effects);
    assert_eq!(controller.query().page_index, 1);
    assert_eq!(controller.location(), "pageIndex=1");
    assert!(
        controller
            .rows()
            .iter()
            .all(|artwork| !first_page.contains(&artwork.id))
    );

    let effects = controller.dispatch(TableCommand::StepPage(PageStep::Last));
    settle(&mut controller, &mut backend, effects);
    assert_eq!(controller.rows().len(), 6);

    let effects = controller.dispatch(TableCommand::LocationChanged(String::new()));
    settle(&mut controller, &mut backend, effects);
    let back: Vec<_> = controller.rows().iter().map(|a| a.id).collect();
    assert_eq!(back, first_page);
    assert_eq!(
        backend.calls.iter().filter(|call| *call == "list@0").count(),
        1,
        "page one comes back from the cache"
    );
    Ok(())
}

#[test]
fn inline_edits_persist_to_the_store() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);
    let target = controller.rows()[0].id;

    let effects = controller.dispatch(TableCommand::BeginEdit {
        row_id: target,
        field_path: "location".to_owned(),
    });
    assert!(effects.is_empty());
    controller.dispatch(TableCommand::EditInput(json!("Gallery 9")));
    let effects = controller.dispatch(TableCommand::EditBlur);
    let surfaced = settle(&mut controller, &mut backend, effects);
    assert!(notices(&surfaced).is_empty(), "{surfaced:?}");

    assert_eq!(backend.inner.get_artwork(target)?.location, "Gallery 9");
    assert_eq!(controller.rows()[0].location, "Gallery 9");

    let effects = controller.commit(target, "storeType", json!("repair"));
    settle(&mut controller, &mut backend, effects);
    assert_eq!(backend.inner.get_artwork(target)?.store_type, StoreType::Repair);
    assert_eq!(controller.rows()[0].store_type, StoreType::Repair);
    assert_eq!(controller.cell_phase(target, "storeType"), CellPhase::Idle);
    Ok(())
}

#[test]
fn failed_edit_reverts_to_the_stored_value() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?).failing_field("location");
    let mut controller = opened(&mut backend);
    let target = controller.rows()[0].id;
    let stored = backend.inner.get_artwork(target)?.location;

    let effects = controller.commit(target, "location", json!("Nowhere"));
    assert_eq!(controller.rows()[0].location, "Nowhere", "optimistic");
    let surfaced = settle(&mut controller, &mut backend, effects);

    let notices = notices(&surfaced);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, NoticeLevel::Error);
    assert!(notices[0].1.contains("location is locked"), "{notices:?}");
    assert_eq!(controller.rows()[0].location, stored);
    assert_eq!(controller.cell_phase(target, "location"), CellPhase::Idle);
    Ok(())
}

#[test]
fn store_rejections_surface_as_notices() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);
    let target = controller.rows()[0].id;
    let stored = backend.inner.get_artwork(target)?.title;

    let effects = controller.commit(target, "title", json!("   "));
    let surfaced = settle(&mut controller, &mut backend, effects);

    assert_eq!(notices(&surfaced).len(), 1);
    assert_eq!(controller.rows()[0].title, stored);
    Ok(())
}

#[test]
fn bulk_delete_spans_pages_and_refetches() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);

    controller.dispatch(TableCommand::ToggleAllVisible);
    let effects = controller.dispatch(TableCommand::StepPage(PageStep::Next));
    settle(&mut controller, &mut backend, effects);
    let extra = controller.rows()[0].id;
    controller.dispatch(TableCommand::ToggleRow(extra));
    assert_eq!(controller.selection().len(), PAGE_SIZE + 1);
    let selected = controller.selection().ids();

    let effects = controller.dispatch(TableCommand::BulkDelete);
    let surfaced = settle(&mut controller, &mut backend, effects);

    assert_eq!(
        notices(&surfaced),
        vec![(NoticeLevel::Info, "delete on 11 rows done".to_owned())]
    );
    assert!(controller.selection().is_empty());
    assert_eq!(controller.total_count(), 25);
    for id in selected {
        assert_eq!(backend.inner.get_artwork(id)?.status, ArtworkStatus::Deleted);
    }
    Ok(())
}

#[test]
fn failed_bulk_patch_keeps_selection_and_rows() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);
    let target = controller.rows()[1].id;
    let before = backend.inner.get_artwork(target)?;
    controller.dispatch(TableCommand::ToggleRow(target));

    backend.fail_patch = true;
    let mut properties = Map::new();
    properties.insert("storeType".to_owned(), json!("shipment"));
    let effects = controller.dispatch(TableCommand::BulkPatch(properties));
    let surfaced = settle(&mut controller, &mut backend, effects);

    let notices = notices(&surfaced);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, NoticeLevel::Error);
    assert!(notices[0].1.contains("patch rejected"));
    assert_eq!(controller.selection().ids(), vec![target]);
    assert_eq!(backend.inner.get_artwork(target)?, before);
    Ok(())
}

#[test]
fn facet_outage_leaves_listing_usable_until_refresh() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    backend.fail_facets = true;
    let mut controller = opened(&mut backend);

    assert!(controller.available_filters().is_empty());
    assert_eq!(controller.rows().len(), PAGE_SIZE);

    backend.fail_facets = false;
    let effects = controller.dispatch(TableCommand::Refresh);
    settle(&mut controller, &mut backend, effects);
    assert_eq!(controller.available_filters().len(), 3);
    Ok(())
}

#[test]
fn listing_outage_keeps_last_good_page() -> Result<()> {
    let mut backend = FlakyBackend::new(demo_store(11, 40)?);
    let mut controller = opened(&mut backend);
    let first_page: Vec<_> = controller.rows().iter().map(|a| a.id).collect();

    backend.fail_list = true;
    let effects = controller.dispatch(TableCommand::StepPage(PageStep::Next));
    let surfaced = settle(&mut controller, &mut backend, effects);

    assert!(
        notices(&surfaced)
            .iter()
            .any(|(level, message)| *level == NoticeLevel::Error
                && message.contains("listing unavailable"))
    );
    assert_eq!(controller.error(), Some("listing unavailable"));
    let shown: Vec<_> = controller.rows().iter().map(|a| a.id).collect();
    assert_eq!(shown, first_page);

    backend.fail_list = false;
    let effects = controller.dispatch(TableCommand::Refresh);
    settle(&mut controller, &mut backend, effects);
    assert_eq!(controller.error(), None);
    assert!(controller.rows().iter().all(|a| !first_page.contains(&a.id)));
    Ok(())
}
