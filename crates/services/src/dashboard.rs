//! Booking KPIs, trends, per-county breakdowns and lists.
//!
//! Every figure is fetched under its own deadline. A figure whose query
//! fails or times out is reported as zero/empty and named in `degraded`;
//! the response itself still succeeds.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use bson::{doc, Bson, Document};
use chrono::SecondsFormat;
use futures::{TryStreamExt, future::join_all};
use mongodb::Database;
use serde::Serialize;

use bailbook_config::DashboardSettings;
use bailbook_db::models::{BookingRecord, County};

use crate::bounded::{Bounded, bounded};
use crate::clock::Clock;
use crate::dao::base::{DaoError, DaoResult};
use crate::dao::job::JobDao;
use crate::filter::Filter;
use crate::union::{SOURCE_FIELD, UnionQuery, bond_value_expr, count_of, number_of};
use crate::windows::{BookingDays, Window, clamp_days};

pub const DEFAULT_TREND_DAYS: u64 = 7;
pub const DEFAULT_LIST_LIMIT: i64 = 25;
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayFigure {
    pub count: u64,
    pub bond_sum: f64,
}

impl DayFigure {
    fn add(&mut self, other: DayFigure) {
        self.count += other.count;
        self.bond_sum += other.bond_sum;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Windowed<T> {
    pub today: T,
    pub yesterday: T,
    pub last7d: T,
    pub last30d: T,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPull {
    pub kind: String,
    pub county: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiReport {
    pub ok: bool,
    pub tz: String,
    pub as_of: String,
    pub today: String,
    pub counts: Windowed<u64>,
    pub bonds: Windowed<f64>,
    pub last_pull: Option<LastPull>,
    pub degraded: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub count: u64,
    pub bond_sum: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub ok: bool,
    pub days: u64,
    pub series: Vec<TrendPoint>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyCounts {
    pub today: u64,
    pub yesterday: u64,
    pub two_days_ago: u64,
    pub window: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyRow {
    pub county: County,
    pub counts: CountyCounts,
    pub bond_today: f64,
    pub bond_yesterday: f64,
    pub bond_two_days_ago: f64,
    pub bond_window: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerCountyReport {
    pub ok: bool,
    pub window: Window,
    pub items: Vec<CountyRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub id: String,
    pub county: Option<String>,
    pub full_name: Option<String>,
    pub booking_date: Option<String>,
    pub bond_amount: Option<f64>,
    pub case_number: Option<String>,
    pub spn: Option<String>,
    pub crm_stage: &'static str,
}

impl BookingSummary {
    /// Builds a list item from a union row, preferring the county the row
    /// was tagged with over the one the normalizer wrote.
    pub fn from_row(doc: Document) -> Option<Self> {
        let source = doc.get_str(SOURCE_FIELD).ok().map(str::to_string);
        let record: BookingRecord = bson::from_document(doc).ok()?;
        Some(Self {
            id: record.id?.to_hex(),
            county: source.or(record.county.clone()),
            crm_stage: record.stage().as_str(),
            full_name: record.full_name,
            booking_date: record.booking_date,
            bond_amount: record.bond_amount,
            case_number: record.case_number,
            spn: record.spn,
        })
    }

    pub fn projection() -> Document {
        doc! {
            "county": 1,
            "full_name": 1,
            "booking_date": 1,
            "bond_amount": 1,
            "case_number": 1,
            "spn": 1,
            "crm_stage": 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
    pub items: Vec<BookingSummary>,
    pub degraded: bool,
}

pub struct DashboardService {
    db: Option<Database>,
    days: BookingDays,
    clock: Arc<dyn Clock>,
    query_timeout: Duration,
    stat_timeout: Duration,
}

impl DashboardService {
    pub fn new(db: Option<Database>, settings: &DashboardSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            days: BookingDays::from_name(&settings.timezone),
            clock,
            query_timeout: Duration::from_millis(settings.query_timeout_ms),
            stat_timeout: Duration::from_millis(settings.stat_timeout_ms),
        }
    }

    pub fn days(&self) -> BookingDays {
        self.days
    }

    fn db(&self) -> DaoResult<&Database> {
        self.db.as_ref().ok_or(DaoError::NotConfigured)
    }

    pub async fn kpis(&self) -> DaoResult<KpiReport> {
        let db = self.db()?;
        let now = self.clock.now();
        let jobs = JobDao::new(db);

        let (today, yesterday, last7d, last30d, last_pull) = tokio::join!(
            self.figure(db, "today", vec![self.days.day(now, 0)]),
            self.figure(db, "yesterday", vec![self.days.day(now, 1)]),
            self.figure(db, "last7d", self.days.window_days(now, Window::Last7d)),
            self.figure(db, "last30d", self.days.window_days(now, Window::Last30d)),
            bounded("last_pull", self.stat_timeout, jobs.latest_success()),
        );

        let mut degraded = Vec::new();
        let mut take = |name: &'static str, r: Bounded<DayFigure>| {
            if !r.is_done() {
                degraded.push(name);
            }
            r.ok().unwrap_or_default()
        };
        let today = take("today", today);
        let yesterday = take("yesterday", yesterday);
        let last7d = take("last7d", last7d);
        let last30d = take("last30d", last30d);

        let last_pull = match last_pull {
            Bounded::Done(job) => job.map(|j| LastPull {
                kind: j.kind,
                county: j.county,
                finished_at: j.finished_at.and_then(|t| t.try_to_rfc3339_string().ok()),
            }),
            _ => {
                degraded.push("lastPull");
                None
            }
        };

        Ok(KpiReport {
            ok: true,
            tz: self.days.tz().name().to_string(),
            as_of: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            today: self.days.today(now),
            counts: Windowed {
                today: today.count,
                yesterday: yesterday.count,
                last7d: last7d.count,
                last30d: last30d.count,
            },
            bonds: Windowed {
                today: today.bond_sum,
                yesterday: yesterday.bond_sum,
                last7d: last7d.bond_sum,
                last30d: last30d.bond_sum,
            },
            last_pull,
            degraded,
        })
    }

    /// One booking count + bond sum over `dates`, across all counties.
    async fn figure(&self, db: &Database, label: &str, dates: Vec<String>) -> Bounded<DayFigure> {
        let query = UnionQuery::new(Filter::is_in("booking_date", dates))
            .project(doc! { "bond_amount": 1 })
            .stage(doc! {
                "$group": {
                    "_id": Bson::Null,
                    "count": { "$sum": 1 },
                    "bond": { "$sum": bond_value_expr() },
                }
            });

        bounded(label, self.query_timeout, async {
            let rows = query.run(db).await?;
            Ok::<_, mongodb::error::Error>(rows.first().map(figure_of).unwrap_or_default())
        })
        .await
    }

    pub async fn trends(&self, days: Option<i64>) -> DaoResult<TrendReport> {
        let db = self.db()?;
        let now = self.clock.now();
        let n = clamp_days(days, DEFAULT_TREND_DAYS);
        let dates = self.days.last_n_days(now, n);

        let query = UnionQuery::new(Filter::is_in("booking_date", dates.clone()))
            .project(doc! { "booking_date": 1, "bond_amount": 1 })
            .stage(doc! {
                "$group": {
                    "_id": "$booking_date",
                    "count": { "$sum": 1 },
                    "bond": { "$sum": bond_value_expr() },
                }
            });

        let result = bounded("trends", self.query_timeout, query.run(db)).await;
        let degraded = !result.is_done();
        let by_day = by_day(result.ok().unwrap_or_default());

        let series = dates
            .into_iter()
            .rev()
            .map(|date| {
                let f = by_day.get(&date).copied().unwrap_or_default();
                TrendPoint {
                    date,
                    count: f.count,
                    bond_sum: f.bond_sum,
                }
            })
            .collect();

        Ok(TrendReport {
            ok: true,
            days: n,
            series,
            degraded,
        })
    }

    pub async fn per_county(&self, window: Window) -> DaoResult<PerCountyReport> {
        let db = self.db()?;
        let now = self.clock.now();
        let today = self.days.day(now, 0);
        let yesterday = self.days.day(now, 1);
        let two_days_ago = self.days.day(now, 2);
        let window_days = self.days.window_days(now, window);

        let mut wanted: BTreeSet<String> = window_days.iter().cloned().collect();
        wanted.extend([today.clone(), yesterday.clone(), two_days_ago.clone()]);
        let wanted: Vec<String> = wanted.into_iter().collect();

        let results = join_all(County::ALL.into_iter().map(|county| {
            let wanted = wanted.clone();
            async move {
                let r = bounded(
                    county.collection(),
                    self.stat_timeout,
                    county_days(db, county, wanted),
                )
                .await;
                (county, r)
            }
        }))
        .await;

        let items = results
            .into_iter()
            .map(|(county, r)| {
                let degraded = !r.is_done();
                let days = r.ok().unwrap_or_default();
                let at = |d: &String| days.get(d).copied().unwrap_or_default();
                let mut in_window = DayFigure::default();
                for d in &window_days {
                    in_window.add(at(d));
                }
                CountyRow {
                    county,
                    counts: CountyCounts {
                        today: at(&today).count,
                        yesterday: at(&yesterday).count,
                        two_days_ago: at(&two_days_ago).count,
                        window: in_window.count,
                    },
                    bond_today: at(&today).bond_sum,
                    bond_yesterday: at(&yesterday).bond_sum,
                    bond_two_days_ago: at(&two_days_ago).bond_sum,
                    bond_window: in_window.bond_sum,
                    degraded,
                }
            })
            .collect();

        Ok(PerCountyReport {
            ok: true,
            window,
            items,
        })
    }

    /// Bookings in the window that nobody has worked yet.
    pub async fn new_bookings(&self, window: Window, limit: Option<i64>) -> DaoResult<ListReport> {
        let now = self.clock.now();
        let filter = Filter::is_in("booking_date", self.days.window_days(now, window)).and(
            Filter::eq("crm_stage", Bson::Null).or(Filter::eq("crm_stage", "new")),
        );
        let sort = doc! { "booking_date": -1, "_id": -1 };
        self.list("new", filter, sort, limit, Some(window)).await
    }

    pub async fn recent(&self, limit: Option<i64>) -> DaoResult<ListReport> {
        let sort = doc! { "booking_date": -1, "_id": -1 };
        self.list("recent", Filter::exists("booking_date", true), sort, limit, None)
            .await
    }

    /// Largest numeric bonds in the window.
    pub async fn top(&self, window: Window, limit: Option<i64>) -> DaoResult<ListReport> {
        let now = self.clock.now();
        let filter = Filter::is_in("booking_date", self.days.window_days(now, window))
            .and(Filter::numeric("bond_amount"));
        let sort = doc! { "bond_amount": -1, "booking_date": -1 };
        self.list("top", filter, sort, limit, Some(window)).await
    }

    async fn list(
        &self,
        label: &str,
        filter: Filter,
        sort: Document,
        limit: Option<i64>,
        window: Option<Window>,
    ) -> DaoResult<ListReport> {
        let db = self.db()?;
        let limit = clamp_limit(limit);
        let query = UnionQuery::new(filter)
            .per_branch(sort.clone(), limit)
            .project(BookingSummary::projection())
            .tag_source()
            .stage(doc! { "$sort": sort })
            .stage(doc! { "$limit": limit });

        let result = bounded(label, self.query_timeout, query.run(db)).await;
        let degraded = !result.is_done();
        let items = result
            .ok()
            .unwrap_or_default()
            .into_iter()
            .filter_map(BookingSummary::from_row)
            .collect();

        Ok(ListReport {
            ok: true,
            window,
            items,
            degraded,
        })
    }
}

async fn county_days(
    db: &Database,
    county: County,
    dates: Vec<String>,
) -> Result<HashMap<String, DayFigure>, mongodb::error::Error> {
    let pipeline = vec![
        doc! { "$match": Filter::is_in("booking_date", dates).to_document() },
        doc! {
            "$group": {
                "_id": "$booking_date",
                "count": { "$sum": 1 },
                "bond": { "$sum": bond_value_expr() },
            }
        },
    ];
    let rows: Vec<Document> = db
        .collection::<Document>(county.collection())
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    Ok(by_day(rows))
}

fn figure_of(row: &Document) -> DayFigure {
    DayFigure {
        count: count_of(row, "count"),
        bond_sum: number_of(row, "bond").max(0.0),
    }
}

fn by_day(rows: Vec<Document>) -> HashMap<String, DayFigure> {
    rows.iter()
        .filter_map(|row| Some((row.get_str("_id").ok()?.to_string(), figure_of(row))))
        .collect()
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .map(|l| l.clamp(1, MAX_LIST_LIMIT))
        .unwrap_or(DEFAULT_LIST_LIMIT)
}
