//! Liveness and diagnostic probes.
//!
//! The light probe never touches the datastore. The full probe pings, then
//! audits each county collection in turn under one shared [`Budget`]; once
//! the budget runs out the remaining collections are reported as skipped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bson::{doc, Bson, Document};
use chrono::{NaiveDate, SecondsFormat};
use futures::TryStreamExt;
use mongodb::Database;
use serde::Serialize;

use bailbook_config::{DashboardSettings, HealthSettings};
use bailbook_db::models::County;

use crate::bounded::{Bounded, Budget, bounded};
use crate::clock::Clock;
use crate::union::count_of;
use crate::windows::BookingDays;

/// Fields every normalized booking is expected to carry.
pub const REQUIRED_FIELDS: [&str; 5] =
    ["county", "full_name", "booking_date", "bond_amount", "case_number"];

/// Fields reported by the sample-based coverage audit.
pub const COVERAGE_FIELDS: [&str; 13] = [
    "county",
    "category",
    "full_name",
    "first_name",
    "last_name",
    "booking_date",
    "offense",
    "charge",
    "bond_amount",
    "case_number",
    "spn",
    "source",
    "time_bucket",
];

pub const DEFAULT_SAMPLE: i64 = 200;
pub const MAX_SAMPLE: i64 = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightReport {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PingStatus {
    Ok,
    Failed,
    Timeout,
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreStatus {
    pub configured: bool,
    pub ping: PingStatus,
    pub ping_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionAudit {
    pub county: String,
    pub collection: String,
    pub estimated_count: Option<u64>,
    pub newest_booking_date: Option<String>,
    pub stale_days: Option<i64>,
    pub stale: bool,
    pub missing_fields: BTreeMap<String, u64>,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub time: String,
    pub datastore: DatastoreStatus,
    pub budget_ms: u64,
    pub elapsed_ms: u64,
    pub collections: Vec<CollectionAudit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStat {
    pub field: String,
    pub present: u64,
    pub present_pct: f64,
    pub types: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCoverage {
    pub county: String,
    pub sampled: u64,
    pub fields: Vec<FieldStat>,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub ok: bool,
    pub sample: i64,
    pub configured: bool,
    pub collections: Vec<CollectionCoverage>,
}

pub struct HealthService {
    db: Option<Database>,
    settings: HealthSettings,
    days: BookingDays,
    clock: Arc<dyn Clock>,
    started: Instant,
}

impl HealthService {
    pub fn new(
        db: Option<Database>,
        settings: &HealthSettings,
        dashboard: &DashboardSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            settings: settings.clone(),
            days: BookingDays::from_name(&dashboard.timezone),
            clock,
            started: Instant::now(),
        }
    }

    pub fn light(&self) -> LightReport {
        LightReport {
            ok: true,
            service: "bailbook-api",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: self.started.elapsed().as_secs(),
            time: self.now_string(),
        }
    }

    fn now_string(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn per_call(&self) -> Duration {
        Duration::from_millis(self.settings.ping_timeout_ms)
    }

    pub async fn full(&self) -> HealthReport {
        let budget = Budget::new(Duration::from_millis(self.settings.overall_budget_ms));

        let Some(db) = &self.db else {
            return HealthReport {
                ok: false,
                time: self.now_string(),
                datastore: DatastoreStatus {
                    configured: false,
                    ping: PingStatus::NotConfigured,
                    ping_ms: None,
                },
                budget_ms: self.settings.overall_budget_ms,
                elapsed_ms: 0,
                collections: Vec::new(),
            };
        };

        let ping_started = Instant::now();
        let ping = match bounded("ping", budget.slice(self.per_call()), bailbook_db::ping(db)).await
        {
            Bounded::Done(()) => PingStatus::Ok,
            Bounded::Failed(_) => PingStatus::Failed,
            Bounded::TimedOut => PingStatus::Timeout,
        };
        let ping_ms = ping_started.elapsed().as_millis() as u64;

        let mut collections = Vec::with_capacity(County::ALL.len());
        for county in County::ALL {
            if ping != PingStatus::Ok || budget.exhausted() {
                collections.push(CollectionAudit {
                    county: county.name().to_string(),
                    collection: county.collection().to_string(),
                    skipped: true,
                    ..Default::default()
                });
                continue;
            }
            collections.push(self.audit(db, county, &budget).await);
        }

        let ok = ping == PingStatus::Ok && collections.iter().all(|c| c.error.is_none());

        HealthReport {
            ok,
            time: self.now_string(),
            datastore: DatastoreStatus {
                configured: true,
                ping,
                ping_ms: Some(ping_ms),
            },
            budget_ms: self.settings.overall_budget_ms,
            elapsed_ms: budget.elapsed().as_millis() as u64,
            collections,
        }
    }

    async fn audit(&self, db: &Database, county: County, budget: &Budget) -> CollectionAudit {
        let mut audit = CollectionAudit {
            county: county.name().to_string(),
            collection: county.collection().to_string(),
            ..Default::default()
        };
        if budget.exhausted() {
            audit.skipped = true;
            return audit;
        }
        let coll = db.collection::<Document>(county.collection());

        match bounded(
            county.collection(),
            budget.slice(self.per_call()),
            coll.estimated_document_count(),
        )
        .await
        {
            Bounded::Done(n) => audit.estimated_count = Some(n),
            other => {
                audit.error = Some(describe(other));
                return audit;
            }
        }

        if budget.exhausted() {
            audit.skipped = true;
            return audit;
        }
        let newest = coll
            .find_one(doc! { "booking_date": { "$type": "string" } })
            .projection(doc! { "booking_date": 1 })
            .sort(doc! { "booking_date": -1 });
        match bounded(county.collection(), budget.slice(self.per_call()), newest).await {
            Bounded::Done(found) => {
                audit.newest_booking_date = found
                    .as_ref()
                    .and_then(|d| d.get_str("booking_date").ok())
                    .map(str::to_string);
            }
            other => {
                audit.error = Some(describe(other));
                return audit;
            }
        }

        let today = self.days.local_date(self.clock.now());
        audit.stale_days = audit
            .newest_booking_date
            .as_deref()
            .and_then(|d| stale_days(today, d));
        audit.stale = audit
            .stale_days
            .is_none_or(|d| d > self.settings.stale_after_days);

        if budget.exhausted() {
            audit.skipped = true;
            return audit;
        }
        let missing = async {
            let rows: Vec<Document> = coll
                .aggregate(vec![doc! { "$group": missing_fields_group() }])
                .await?
                .try_collect()
                .await?;
            Ok::<_, mongodb::error::Error>(rows)
        };
        match bounded(county.collection(), budget.slice(self.per_call()), missing).await {
            Bounded::Done(rows) => {
                let row = rows.into_iter().next().unwrap_or_default();
                audit.missing_fields = REQUIRED_FIELDS
                    .iter()
                    .map(|f| (f.to_string(), count_of(&row, f)))
                    .collect();
            }
            other => audit.error = Some(describe(other)),
        }

        audit
    }

    /// Sample-based field coverage across every county collection.
    pub async fn fields(&self, sample: Option<i64>) -> CoverageReport {
        let sample = clamp_sample(sample);
        let Some(db) = &self.db else {
            return CoverageReport {
                ok: false,
                sample,
                configured: false,
                collections: Vec::new(),
            };
        };

        let budget = Budget::new(Duration::from_millis(self.settings.overall_budget_ms));
        let mut collections = Vec::with_capacity(County::ALL.len());

        for county in County::ALL {
            let mut coverage = CollectionCoverage {
                county: county.name().to_string(),
                ..Default::default()
            };
            if budget.exhausted() {
                coverage.skipped = true;
                collections.push(coverage);
                continue;
            }

            let coll = db.collection::<Document>(county.collection());
            let sampled = async {
                let docs: Vec<Document> = coll
                    .aggregate(vec![doc! { "$sample": { "size": sample } }])
                    .await?
                    .try_collect()
                    .await?;
                Ok::<_, mongodb::error::Error>(docs)
            };
            match bounded(county.collection(), budget.slice(self.per_call()), sampled).await {
                Bounded::Done(docs) => {
                    coverage.sampled = docs.len() as u64;
                    coverage.fields = field_coverage(&docs, &COVERAGE_FIELDS);
                }
                other => coverage.error = Some(describe(other)),
            }
            collections.push(coverage);
        }

        CoverageReport {
            ok: collections.iter().all(|c| c.error.is_none()),
            sample,
            configured: true,
            collections,
        }
    }
}

fn describe<T>(outcome: Bounded<T>) -> String {
    match outcome {
        Bounded::Done(_) => String::new(),
        Bounded::Failed(e) => e,
        Bounded::TimedOut => "timeout".to_string(),
    }
}

pub fn clamp_sample(sample: Option<i64>) -> i64 {
    sample.map(|s| s.clamp(1, MAX_SAMPLE)).unwrap_or(DEFAULT_SAMPLE)
}

/// Whole days between `newest` and the local `today`; never negative.
pub fn stale_days(today: NaiveDate, newest: &str) -> Option<i64> {
    let newest = NaiveDate::parse_from_str(newest, "%Y-%m-%d").ok()?;
    Some((today - newest).num_days().max(0))
}

/// `$group` body counting documents where each required field is missing
/// or null.
fn missing_fields_group() -> Document {
    let mut group = doc! { "_id": Bson::Null };
    for field in REQUIRED_FIELDS {
        group.insert(
            field,
            doc! {
                "$sum": {
                    "$cond": [
                        { "$eq": [{ "$ifNull": [format!("${field}"), Bson::Null] }, Bson::Null] },
                        1,
                        0
                    ]
                }
            },
        );
    }
    group
}

pub fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Null => "null",
        Bson::Boolean(_) => "bool",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Double(_) => "double",
        Bson::Decimal128(_) => "decimal",
        Bson::String(_) => "string",
        Bson::DateTime(_) => "date",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::ObjectId(_) => "objectId",
        _ => "other",
    }
}

pub fn field_coverage(docs: &[Document], fields: &[&str]) -> Vec<FieldStat> {
    let total = docs.len() as u64;
    fields
        .iter()
        .map(|field| {
            let mut types = BTreeMap::new();
            let mut present = 0;
            for d in docs {
                let value = d.get(*field);
                *types.entry(value.map(type_name).unwrap_or("missing")).or_insert(0) += 1;
                if matches!(value, Some(v) if *v != Bson::Null) {
                    present += 1;
                }
            }
            let present_pct = if total == 0 {
                0.0
            } else {
                (present as f64 * 1000.0 / total as f64).round() / 10.0
            };
            FieldStat {
                field: field.to_string(),
                present,
                present_pct,
                types,
            }
        })
        .collect()
}
