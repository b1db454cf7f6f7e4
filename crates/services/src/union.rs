//! Union-aggregation across the per-county booking collections.
//!
//! The five `simple_<county>` collections are physically separate but share
//! a shape. A [`UnionQuery`] runs the same `$match`/`$project` on the anchor
//! collection and pulls each other collection in through `$unionWith`, so
//! downstream `$group`/`$sort`/`$limit` stages see one logical table.

use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::Database;

use bailbook_db::models::County;

use crate::filter::Filter;

#[derive(Debug, Clone)]
pub struct UnionQuery {
    filter: Filter,
    projection: Option<Document>,
    branch_sort: Option<(Document, i64)>,
    tag_source: bool,
    tail: Vec<Document>,
    counties: Vec<County>,
}

/// Field each branch stamps with the county it came from.
pub const SOURCE_FIELD: &str = "_source_county";

impl UnionQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            projection: None,
            branch_sort: None,
            tag_source: false,
            tail: Vec::new(),
            counties: County::ALL.to_vec(),
        }
    }

    pub fn project(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Records which county each merged document came from.
    pub fn tag_source(mut self) -> Self {
        self.tag_source = true;
        self
    }

    /// Sorts and truncates inside every branch so the merged stream carries
    /// at most `limit` documents per county. The caller still needs a final
    /// `$sort`/`$limit` over the union.
    pub fn per_branch(mut self, sort: Document, limit: i64) -> Self {
        self.branch_sort = Some((sort, limit));
        self
    }

    /// Appends a stage that runs over the merged stream.
    pub fn stage(mut self, stage: Document) -> Self {
        self.tail.push(stage);
        self
    }

    /// Restricts the union to a subset of counties (anchor is the first).
    pub fn counties(mut self, counties: Vec<County>) -> Self {
        if !counties.is_empty() {
            self.counties = counties;
        }
        self
    }

    pub fn anchor(&self) -> County {
        self.counties.first().copied().unwrap_or(County::ANCHOR)
    }

    fn branch(&self, county: County) -> Vec<Document> {
        let mut stages = vec![doc! { "$match": self.filter.to_document() }];
        if let Some((sort, limit)) = &self.branch_sort {
            stages.push(doc! { "$sort": sort.clone() });
            stages.push(doc! { "$limit": *limit });
        }
        if let Some(projection) = &self.projection {
            stages.push(doc! { "$project": projection.clone() });
        }
        if self.tag_source {
            stages.push(doc! { "$addFields": { SOURCE_FIELD: county.name() } });
        }
        stages
    }

    pub fn pipeline(&self) -> Vec<Document> {
        let mut pipeline = self.branch(self.anchor());
        for county in self.counties.iter().skip(1) {
            let branch: Vec<Bson> = self
                .branch(*county)
                .into_iter()
                .map(Bson::Document)
                .collect();
            pipeline.push(doc! {
                "$unionWith": { "coll": county.collection(), "pipeline": branch }
            });
        }
        pipeline.extend(self.tail.iter().cloned());
        pipeline
    }

    pub async fn run(&self, db: &Database) -> Result<Vec<Document>, mongodb::error::Error> {
        let cursor = db
            .collection::<Document>(self.anchor().collection())
            .aggregate(self.pipeline())
            .await?;
        cursor.try_collect().await
    }
}

/// `bond_amount` coalesced to a non-negative number: null, missing,
/// legacy strings and negative values all contribute 0.
pub fn bond_value_expr() -> Bson {
    Bson::Document(doc! {
        "$let": {
            "vars": { "amount": { "$ifNull": ["$bond_amount", 0] } },
            "in": {
                "$cond": [
                    { "$and": [
                        { "$isNumber": "$$amount" },
                        { "$gt": ["$$amount", 0] }
                    ] },
                    "$$amount",
                    0
                ]
            }
        }
    })
}

/// Reads a numeric field that `$group`/`$sum` may have produced as any width.
pub fn number_of(doc: &Document, key: &str) -> f64 {
    doc.get(key)
        .and_then(bailbook_db::models::bson_number)
        .unwrap_or(0.0)
}

pub fn count_of(doc: &Document, key: &str) -> u64 {
    number_of(doc, key).max(0.0) as u64
}
