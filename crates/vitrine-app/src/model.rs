// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use time::{Date, OffsetDateTime};

use crate::ids::*;

/// A row type the table controller can list, select and edit.
///
/// Field paths used by the inline editor are resolved through the serde
/// representation, so implementors only provide the id accessor.
pub trait Entity: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    type Id: Copy + Debug + Ord + Hash + Into<i64>;

    fn id(&self) -> Self::Id;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreType {
    #[serde(rename = "inStock")]
    InStock,
    #[serde(rename = "lend")]
    Lend,
    #[serde(rename = "repair")]
    Repair,
    #[serde(rename = "shipment")]
    Shipment,
}

impl StoreType {
    pub const ALL: [Self; 4] = [Self::InStock, Self::Lend, Self::Repair, Self::Shipment];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "inStock",
            Self::Lend => "lend",
            Self::Repair => "repair",
            Self::Shipment => "shipment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inStock" => Some(Self::InStock),
            "lend" => Some(Self::Lend),
            "repair" => Some(Self::Repair),
            "shipment" => Some(Self::Shipment),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::InStock => "在庫",
            Self::Lend => "借展",
            Self::Repair => "修復",
            Self::Shipment => "出貨",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkStatus {
    Active,
    Archived,
    Deleted,
}

impl ArtworkStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Archived, Self::Deleted];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "上架",
            Self::Archived => "封存",
            Self::Deleted => "已刪除",
        }
    }
}

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub id: ArtworkId,
    pub title: String,
    pub artist: String,
    pub nationality: String,
    pub store_type: StoreType,
    pub status: ArtworkStatus,
    pub year: Option<i32>,
    pub price_cents: Option<i64>,
    pub location: String,
    #[serde(default, with = "iso_date::option")]
    pub acquired_on: Option<Date>,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Entity for Artwork {
    type Id = ArtworkId;

    fn id(&self) -> ArtworkId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::{Artwork, ArtworkStatus, Entity, StoreType};
    use crate::ArtworkId;
    use anyhow::Result;
    use time::macros::{date, datetime};

    fn sample() -> Artwork {
        Artwork {
            id: ArtworkId::new(9),
            title: "Harbor at Dusk".to_owned(),
            artist: "Lin Mei".to_owned(),
            nationality: "TW".to_owned(),
            store_type: StoreType::Lend,
            status: ArtworkStatus::Active,
            year: Some(1987),
            price_cents: Some(1_250_000),
            location: "Vault B".to_owned(),
            acquired_on: Some(date!(2019 - 04 - 02)),
            notes: String::new(),
            updated_at: datetime!(2026-02-19 12:34:56 UTC),
        }
    }

    #[test]
    fn store_type_round_trips_through_wire_names() {
        for store_type in StoreType::ALL {
            assert_eq!(StoreType::parse(store_type.as_str()), Some(store_type));
        }
        assert_eq!(StoreType::parse("sold"), None);
        assert_eq!(StoreType::Lend.label(), "借展");
    }

    #[test]
    fn artwork_serializes_with_camel_case_wire_names() -> Result<()> {
        let value = serde_json::to_value(sample())?;
        assert_eq!(value["storeType"], "lend");
        assert_eq!(value["priceCents"], 1_250_000);
        assert_eq!(value["acquiredOn"], "2019-04-02");
        assert_eq!(value["updatedAt"], "2026-02-19T12:34:56Z");

        let decoded: Artwork = serde_json::from_value(value)?;
        assert_eq!(decoded, sample());
        assert_eq!(decoded.id().get(), 9);
        Ok(())
    }
}
