// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde_json::{Map, json};
use time::macros::date;
use vitrine_app::{
    ArtworkId, ArtworkStatus, FilterCriterion, FixedPredicate, ListingRequest, PartialUpdate,
    StoreType, TableBackend,
};
use vitrine_db::{NewArtwork, Store, validate_db_path};

fn artwork(title: &str, artist: &str, nationality: &str, store_type: StoreType) -> NewArtwork {
    NewArtwork {
        title: title.to_owned(),
        artist: artist.to_owned(),
        nationality: nationality.to_owned(),
        store_type,
        status: ArtworkStatus::Active,
        year: Some(1990),
        price_cents: None,
        location: "Vault A".to_owned(),
        acquired_on: None,
        notes: String::new(),
    }
}

fn listing(limit: usize) -> ListingRequest {
    ListingRequest {
        keyword: None,
        filters: Vec::new(),
        offset: 0,
        limit,
        fixed_predicate: None,
    }
}

fn seeded() -> Result<(Store, Vec<ArtworkId>)> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let ids = vec![
        store.insert_artwork(&artwork("Harbor", "Lin Mei", "TW", StoreType::InStock))?,
        store.insert_artwork(&artwork("Wave 100%", "Sato Ken", "JP", StoreType::Lend))?,
        store.insert_artwork(&artwork("Lotus", "Lin Mei", "TW", StoreType::Repair))?,
        store.insert_artwork(&artwork("Quay", "Anne Roy", "FR", StoreType::Lend))?,
    ];
    Ok((store, ids))
}

fn titles(store: &Store, request: &ListingRequest) -> Result<Vec<String>> {
    Ok(store
        .list_artworks(request)?
        .items
        .into_iter()
        .map(|artwork| artwork.title)
        .collect())
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/vitrine.db").is_ok());
}

#[test]
fn open_creates_file_backed_store() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("catalogue.db");
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.insert_artwork(&artwork("Harbor", "Lin Mei", "TW", StoreType::InStock))?;
    }
    let reopened = Store::open(&path)?;
    reopened.bootstrap()?;
    assert_eq!(reopened.artwork_count()?, 1);
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.raw_connection().execute_batch(
        "
        CREATE TABLE artworks (
          id INTEGER PRIMARY KEY,
          title TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        ",
    )?;

    let Err(err) = store.bootstrap() else {
        panic!("schema validation should fail");
    };
    let message = err.to_string();
    assert!(message.contains("table `artworks` is missing required columns"));
    assert!(message.contains("store_type"));
    Ok(())
}

#[test]
fn listing_is_newest_first_and_paged() -> Result<()> {
    let (store, _) = seeded()?;

    let first = store.list_artworks(&listing(3))?;
    assert_eq!(first.total_count, 4);
    assert_eq!(first.take, 3);
    let names: Vec<&str> = first.items.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(names, vec!["Quay", "Lotus", "Wave 100%"]);

    let second = ListingRequest {
        offset: 3,
        ..listing(3)
    };
    assert_eq!(titles(&store, &second)?, vec!["Harbor"]);
    Ok(())
}

#[test]
fn filters_and_within_group_or_across_groups() -> Result<()> {
    let (store, _) = seeded()?;
    let request = ListingRequest {
        filters: vec![
            FilterCriterion {
                field: "storeType".to_owned(),
                values: vec!["lend".to_owned(), "repair".to_owned()],
            },
            FilterCriterion {
                field: "nationality".to_owned(),
                values: vec!["TW".to_owned()],
            },
        ],
        ..listing(10)
    };
    assert_eq!(titles(&store, &request)?, vec!["Lotus"]);
    Ok(())
}

#[test]
fn keyword_matches_text_columns_literally() -> Result<()> {
    let (store, _) = seeded()?;

    let by_artist = ListingRequest {
        keyword: Some("lin mei".to_owned()),
        ..listing(10)
    };
    assert_eq!(titles(&store, &by_artist)?, vec!["Lotus", "Harbor"]);

    let wildcard = ListingRequest {
        keyword: Some("100%".to_owned()),
        ..listing(10)
    };
    assert_eq!(titles(&store, &wildcard)?, vec!["Wave 100%"]);

    let blank = ListingRequest {
        keyword: Some("   ".to_owned()),
        ..listing(10)
    };
    assert_eq!(store.list_artworks(&blank)?.total_count, 4);
    Ok(())
}

#[test]
fn fixed_predicate_hides_deleted_rows() -> Result<()> {
    let (store, ids) = seeded()?;
    assert_eq!(store.delete_artworks(&[ids[0].get(), ids[1].get()])?, 2);

    let request = ListingRequest {
        fixed_predicate: Some(FixedPredicate::new("status", ["active"])),
        ..listing(10)
    };
    assert_eq!(titles(&store, &request)?, vec!["Quay", "Lotus"]);
    assert_eq!(store.get_artwork(ids[0])?.status, ArtworkStatus::Deleted);
    assert_eq!(store.artwork_count()?, 4, "deletes are soft");
    Ok(())
}

#[test]
fn listing_rejects_unknown_filter_fields() -> Result<()> {
    let (store, _) = seeded()?;
    let request = ListingRequest {
        filters: vec![FilterCriterion {
            field: "owner".to_owned(),
            values: vec!["x".to_owned()],
        }],
        ..listing(10)
    };
    let Err(err) = store.list_artworks(&request) else {
        panic!("unknown field should fail");
    };
    assert!(err.to_string().contains("unknown artwork field"));
    Ok(())
}

#[test]
fn facet_vocabulary_lists_distinct_live_values() -> Result<()> {
    let (store, ids) = seeded()?;
    store.delete_artworks(&[ids[3].get()])?;

    let vocabulary = store.facet_vocabulary()?;
    assert_eq!(vocabulary["storeType"].len(), StoreType::ALL.len());
    assert_eq!(vocabulary["status"][0].label, "上架");

    let nationalities: Vec<(&str, &str)> = vocabulary["nationality"]
        .iter()
        .map(|option| (option.value.as_str(), option.label.as_str()))
        .collect();
    assert_eq!(nationalities, vec![("JP", "日本"), ("TW", "台灣")]);

    let artists: Vec<&str> = vocabulary["artist"]
        .iter()
        .map(|option| option.value.as_str())
        .collect();
    assert_eq!(artists, vec!["Lin Mei", "Sato Ken"]);
    Ok(())
}

#[test]
fn update_field_converts_wire_values() -> Result<()> {
    let (mut store, ids) = seeded()?;
    let id = ids[0];

    let updated = store.update_artwork_field(id, "storeType", &json!("shipment"))?;
    assert_eq!(updated.store_type, StoreType::Shipment);

    let updated = store.update_artwork_field(id, "priceCents", &json!(125_000))?;
    assert_eq!(updated.price_cents, Some(125_000));

    let updated = store.update_artwork_field(id, "acquiredOn", &json!("2021-06-30"))?;
    assert_eq!(updated.acquired_on, Some(date!(2021 - 06 - 30)));

    let updated = store.update_artwork_field(id, "year", &json!(null))?;
    assert_eq!(updated.year, None);

    let confirmed = store.update(&PartialUpdate {
        id: id.get(),
        field_path: "title".to_owned(),
        value: json!("  Harbor at Dusk "),
    })?;
    assert_eq!(
        confirmed.map(|artwork| artwork.title),
        Some("Harbor at Dusk".to_owned())
    );
    Ok(())
}

#[test]
fn update_field_rejects_bad_input() -> Result<()> {
    let (store, ids) = seeded()?;
    let id = ids[0];

    for (field, value, needle) in [
        ("title", json!(""), "must not be empty"),
        ("storeType", json!("sold"), "unknown store type"),
        ("year", json!("nineteen"), "cannot hold"),
        ("year", json!(19.5), "whole number"),
        ("acquiredOn", json!("30/06/2021"), "YYYY-MM-DD"),
        ("createdAt", json!("x"), "unknown artwork field"),
    ] {
        let Err(err) = store.update_artwork_field(id, field, &value) else {
            panic!("{field} = {value} should be rejected");
        };
        assert!(
            format!("{err:#}").contains(needle),
            "{field}: {err:#} lacks {needle}"
        );
    }

    assert!(
        store
            .update_artwork_field(ArtworkId::new(999), "title", &json!("x"))
            .is_err()
    );
    assert_eq!(store.get_artwork(id)?.title, "Harbor");
    Ok(())
}

#[test]
fn nested_paths_are_refused_by_backend() -> Result<()> {
    let (mut store, ids) = seeded()?;
    let result = store.update(&PartialUpdate {
        id: ids[0].get(),
        field_path: "title.text".to_owned(),
        value: json!("x"),
    });
    assert!(result.is_err());
    Ok(())
}

#[test]
fn bulk_patch_updates_every_listed_row() -> Result<()> {
    let (mut store, ids) = seeded()?;
    let mut properties = Map::new();
    properties.insert("storeType".to_owned(), json!("shipment"));
    properties.insert("location".to_owned(), json!("Dock 3"));

    store.bulk_patch(&[ids[0].get(), ids[2].get()], &properties)?;

    for id in [ids[0], ids[2]] {
        let artwork = store.get_artwork(id)?;
        assert_eq!(artwork.store_type, StoreType::Shipment);
        assert_eq!(artwork.location, "Dock 3");
    }
    assert_eq!(store.get_artwork(ids[1])?.store_type, StoreType::Lend);
    Ok(())
}

#[test]
fn bulk_patch_with_invalid_value_changes_nothing() -> Result<()> {
    let (store, ids) = seeded()?;
    let mut properties = Map::new();
    properties.insert("storeType".to_owned(), json!("sold"));

    assert!(store.patch_artworks(&[ids[0].get()], &properties).is_err());
    assert!(store.patch_artworks(&[ids[0].get()], &Map::new()).is_err());
    assert_eq!(store.patch_artworks(&[], &properties)?, 0);
    assert_eq!(store.get_artwork(ids[0])?.store_type, StoreType::InStock);
    Ok(())
}
