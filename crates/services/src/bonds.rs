//! Bond amount classification and the backfill that normalizes legacy
//! `bond_amount` values in place.

use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::Database;
use serde::Serialize;
use tracing::{debug, info};

use bailbook_db::models::{bson_number, County};

use crate::dao::base::DaoResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BondStatus {
    Numeric,
    ReferToMagistrate,
    NoBond,
    Unknown,
}

impl BondStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BondStatus::Numeric => "numeric",
            BondStatus::ReferToMagistrate => "refer_to_magistrate",
            BondStatus::NoBond => "no_bond",
            BondStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BondClassification {
    pub status: BondStatus,
    /// Positive dollar amount; only set when `status` is `Numeric`.
    pub amount: Option<f64>,
    /// Trimmed source text, kept so reclassifying yields the same status.
    pub bond_raw: Option<String>,
}

impl BondClassification {
    fn new(status: BondStatus, amount: Option<f64>, bond_raw: Option<String>) -> Self {
        Self {
            status,
            amount,
            bond_raw,
        }
    }
}

const NO_BOND_PHRASES: [&str; 3] = ["NO BOND", "DENIED", "HOLD"];

pub fn classify_bond(raw: &Bson) -> BondClassification {
    if let Some(n) = bson_number(raw) {
        return classify_amount(n, Some(format_amount(n)));
    }
    match raw {
        Bson::String(s) => classify_text(s),
        _ => BondClassification::new(BondStatus::Unknown, None, None),
    }
}

fn classify_text(s: &str) -> BondClassification {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return BondClassification::new(BondStatus::Unknown, None, None);
    }
    let raw = Some(trimmed.to_string());
    let upper = trimmed.to_ascii_uppercase();

    if upper.contains("REFER") && upper.contains("MAGISTRATE") {
        return BondClassification::new(BondStatus::ReferToMagistrate, None, raw);
    }
    if NO_BOND_PHRASES.iter().any(|p| upper.contains(p)) {
        return BondClassification::new(BondStatus::NoBond, None, raw);
    }
    match first_number(trimmed) {
        Some(n) => classify_amount(n, raw),
        None => BondClassification::new(BondStatus::Unknown, None, raw),
    }
}

fn classify_amount(n: f64, raw: Option<String>) -> BondClassification {
    if n > 0.0 {
        BondClassification::new(BondStatus::Numeric, Some(n), raw)
    } else if n == 0.0 {
        BondClassification::new(BondStatus::NoBond, None, raw)
    } else {
        BondClassification::new(BondStatus::Unknown, None, raw)
    }
}

fn format_amount(n: f64) -> String {
    format!("{n}")
}

/// First signed decimal token in `s`, ignoring `$` and thousands commas.
fn first_number(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    let bytes = cleaned.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let negative = start > 0 && bytes[start - 1] == b'-';

    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    let value: f64 = cleaned[start..end].trim_end_matches('.').parse().ok()?;
    Some(if negative { -value } else { value })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountyBackfill {
    pub county: String,
    pub scanned: u64,
    pub numeric: u64,
    pub refer_to_magistrate: u64,
    pub no_bond: u64,
    pub unknown: u64,
    pub updated: u64,
}

impl CountyBackfill {
    fn tally(&mut self, status: BondStatus) {
        self.scanned += 1;
        match status {
            BondStatus::Numeric => self.numeric += 1,
            BondStatus::ReferToMagistrate => self.refer_to_magistrate += 1,
            BondStatus::NoBond => self.no_bond += 1,
            BondStatus::Unknown => self.unknown += 1,
        }
    }
}

/// Documents that still need a `bond_status`, or whose `bond_amount` was
/// rewritten as text by a later normalizer run.
fn needs_backfill() -> Document {
    doc! {
        "$or": [
            { "bond_status": { "$exists": false } },
            { "bond_amount": { "$type": "string" } },
        ]
    }
}

/// Value to classify: the stored amount, or the preserved raw text when
/// an earlier pass already nulled the amount.
fn source_value(doc: &Document) -> Bson {
    match doc.get("bond_amount") {
        Some(Bson::Null) | None => doc
            .get_str("bond_raw")
            .map(|s| Bson::String(s.to_string()))
            .unwrap_or(Bson::Null),
        Some(v) => v.clone(),
    }
}

pub async fn backfill_bonds(db: &Database, dry_run: bool) -> DaoResult<Vec<CountyBackfill>> {
    let mut report = Vec::with_capacity(County::ALL.len());

    for county in County::ALL {
        let coll = db.collection::<Document>(county.collection());
        let mut counts = CountyBackfill {
            county: county.name().to_string(),
            ..Default::default()
        };

        let mut cursor = coll
            .find(needs_backfill())
            .projection(doc! { "bond_amount": 1, "bond_raw": 1 })
            .await?;

        while let Some(found) = cursor.try_next().await? {
            let Ok(id) = found.get_object_id("_id") else {
                continue;
            };
            let c = classify_bond(&source_value(&found));
            counts.tally(c.status);
            if dry_run {
                continue;
            }

            let mut set = doc! {
                "bond_amount": c.amount.map(Bson::Double).unwrap_or(Bson::Null),
                "bond_status": c.status.as_str(),
            };
            if let Some(raw) = c.bond_raw {
                set.insert("bond_raw", raw);
            }
            let result = coll.update_one(doc! { "_id": id }, doc! { "$set": set }).await?;
            counts.updated += result.modified_count;
            debug!(%county, %id, status = c.status.as_str(), "Classified bond");
        }

        info!(
            %county,
            scanned = counts.scanned,
            updated = counts.updated,
            dry_run,
            "Bond backfill finished for county"
        );
        report.push(counts);
    }

    Ok(report)
}
