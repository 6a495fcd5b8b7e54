// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;
use time::{Date, Duration, Month};
use vitrine_app::{
    ArtworkId, ArtworkStatus, Entity, FacetVocabulary, ListingRequest, Page, PartialUpdate,
    StoreType, TableBackend,
};
use vitrine_db::{NewArtwork, Store};

const ARTISTS: [(&str, &str); 16] = [
    ("Lin Mei", "TW"),
    ("Chen Yu-ting", "TW"),
    ("Huang Shih-chieh", "TW"),
    ("Sato Ken", "JP"),
    ("Mori Aiko", "JP"),
    ("Tanaka Ryo", "JP"),
    ("Anne Roy", "FR"),
    ("Luc Moreau", "FR"),
    ("Grace Porter", "US"),
    ("Eli Brooks", "US"),
    ("Zhou Lan", "CN"),
    ("Park Ji-woo", "KR"),
    ("Lena Vogel", "DE"),
    ("Marco Bellini", "IT"),
    ("Iris de Wit", "NL"),
    ("Hana Kim", "KR"),
];

const SUBJECTS: [&str; 18] = [
    "Harbor", "Lotus", "Quay", "Orchard", "Mountain", "River", "Lantern", "Temple", "Garden",
    "Bridge", "Market", "Window", "Tide", "Pine", "Crane", "Rain", "Courtyard", "Study",
];

const MODIFIERS: [&str; 12] = [
    "at Dusk",
    "in Winter",
    "after Rain",
    "No. 3",
    "in Blue",
    "at Dawn",
    "Revisited",
    "under Snow",
    "in Ochre",
    "at Noon",
    "(Diptych)",
    "in Mist",
];

const LOCATIONS: [&str; 8] = [
    "Vault A",
    "Vault B",
    "Gallery 1",
    "Gallery 2",
    "Framing Room",
    "Conservation Lab",
    "Loading Dock",
    "Offsite Storage",
];

const NOTES: [&str; 8] = [
    "",
    "",
    "",
    "Frame needs repair",
    "Signed lower right",
    "Provenance verified",
    "Awaiting condition report",
    "Certificate on file",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }
}

/// Seeded generator of plausible catalogue rows. Equal seeds yield equal rows.
#[derive(Debug, Clone)]
pub struct ArtworkFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl ArtworkFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn artwork(&mut self) -> NewArtwork {
        let (artist, nationality) = ARTISTS[self.rng.int_n(ARTISTS.len())];
        let year = self.int_range_i32(1890, 2024);
        NewArtwork {
            title: format!("{} {}", self.pick(&SUBJECTS), self.pick(&MODIFIERS)),
            artist: artist.to_owned(),
            nationality: nationality.to_owned(),
            store_type: self.store_type(),
            status: ArtworkStatus::Active,
            year: Some(year),
            price_cents: self
                .rng
                .chance(80)
                .then(|| self.int_range_i64(50_000, 250_000_000)),
            location: self.pick(&LOCATIONS).to_owned(),
            acquired_on: self.rng.chance(70).then(|| self.acquisition_date(year)),
            notes: self.pick(&NOTES).to_owned(),
        }
    }

    /// Mostly in stock, like a real catalogue.
    pub fn store_type(&mut self) -> StoreType {
        match self.rng.int_n(10) {
            0..=5 => StoreType::InStock,
            6 | 7 => StoreType::Lend,
            8 => StoreType::Repair,
            _ => StoreType::Shipment,
        }
    }

    fn acquisition_date(&mut self, made_in: i32) -> Date {
        let earliest = made_in.max(1990);
        let year = self.int_range_i32(earliest, 2025);
        let start = Date::from_calendar_date(year, Month::January, 1).unwrap_or(Date::MIN);
        start + Duration::days(self.int_range_i64(0, 364))
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i32(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = i64::from(max) - i64::from(min) + 1;
        let offset = (self.rng.next_u64() % (span as u64)) as i64;
        (i64::from(min) + offset) as i32
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

/// Inserts `count` generated artworks; roughly one in ten is archived.
pub fn seed_catalogue(store: &Store, seed: u64, count: usize) -> Result<Vec<ArtworkId>> {
    let mut faker = ArtworkFaker::new(seed);
    let mut ids = Vec::with_capacity(count);
    for index in 0..count {
        let mut artwork = faker.artwork();
        if index % 10 == 9 {
            artwork.status = ArtworkStatus::Archived;
        }
        let id = store
            .insert_artwork(&artwork)
            .with_context(|| format!("seed artwork {index}"))?;
        ids.push(id);
    }
    Ok(ids)
}

/// A bootstrapped in-memory store holding a seeded catalogue.
pub fn demo_store(seed: u64, count: usize) -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    seed_catalogue(&store, seed, count)?;
    Ok(store)
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("vitrine.db");
    Ok((dir, db_path))
}

/// Wraps a backend and fails chosen calls on demand.
#[derive(Debug)]
pub struct FlakyBackend<B> {
    pub inner: B,
    pub fail_list: bool,
    pub fail_facets: bool,
    pub fail_fields: BTreeSet<String>,
    pub fail_delete: bool,
    pub fail_patch: bool,
    pub calls: Vec<String>,
}

impl<B> FlakyBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fail_list: false,
            fail_facets: false,
            fail_fields: BTreeSet::new(),
            fail_delete: false,
            fail_patch: false,
            calls: Vec::new(),
        }
    }

    pub fn failing_field(mut self, field_path: &str) -> Self {
        self.fail_fields.insert(field_path.to_owned());
        self
    }
}

impl<T: Entity, B: TableBackend<T>> TableBackend<T> for FlakyBackend<B> {
    fn list(&mut self, request: &ListingRequest) -> Result<Page<T>> {
        self.calls.push(format!("list@{}", request.offset));
        if self.fail_list {
            bail!("listing unavailable");
        }
        self.inner.list(request)
    }

    fn facet_vocabulary(&mut self) -> Result<FacetVocabulary> {
        self.calls.push("facets".to_owned());
        if self.fail_facets {
            bail!("vocabulary unavailable");
        }
        self.inner.facet_vocabulary()
    }

    fn update(&mut self, update: &PartialUpdate) -> Result<Option<T>> {
        self.calls
            .push(format!("update {}.{}", update.id, update.field_path));
        if self.fail_fields.contains(&update.field_path) {
            bail!("{} is locked", update.field_path);
        }
        self.inner.update(update)
    }

    fn bulk_delete(&mut self, id_list: &[i64]) -> Result<()> {
        self.calls.push(format!("delete {id_list:?}"));
        if self.fail_delete {
            bail!("delete rejected");
        }
        self.inner.bulk_delete(id_list)
    }

    fn bulk_patch(&mut self, id_list: &[i64], properties: &Map<String, Value>) -> Result<()> {
        self.calls.push(format!("patch {id_list:?}"));
        if self.fail_patch {
            bail!("patch rejected");
        }
        self.inner.bulk_patch(id_list, properties)
    }
}
