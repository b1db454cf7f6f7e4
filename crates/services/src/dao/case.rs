//! CRM cases: booking records addressed by `_id` across the county
//! collections.
//!
//! Writes touch only `crm_*` fields and `updated_at`; the rest of the
//! document belongs to the normalizer.

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::{Collection, Database};
use bailbook_db::models::{
    Attachment, BookingRecord, ChecklistItem, County, CrmStage, Decision, default_checklist,
};

use super::base::{DaoError, DaoResult, PaginatedResult, PaginationParams, with_updated_at};
use crate::dashboard::BookingSummary;
use crate::filter::Filter;
use crate::union::{UnionQuery, count_of};

pub struct CaseDao {
    db: Database,
}

/// A case together with the collection it lives in.
#[derive(Debug, Clone)]
pub struct Located {
    pub county: County,
    pub record: BookingRecord,
}

impl Located {
    pub fn id(&self) -> DaoResult<ObjectId> {
        self.record.id.ok_or(DaoError::NotFound)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CaseQuery {
    pub county: Option<County>,
    pub stage: Option<CrmStage>,
    /// Case-insensitive match on name, case number or SPN.
    pub q: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct CrmUpdate {
    pub stage: Option<CrmStage>,
    pub assigned_to: Option<String>,
    pub assigned_department: Option<String>,
    pub notes: Option<String>,
    pub score: Option<i32>,
    /// Recorded on the acceptance/denial stamp.
    pub reason: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct AttachmentPatch {
    pub label: Option<String>,
    pub note: Option<String>,
    pub checklist_key: Option<String>,
}

impl AttachmentPatch {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.note.is_none() && self.checklist_key.is_none()
    }
}

pub fn stage_filter(stage: CrmStage) -> Filter {
    match stage {
        CrmStage::New => Filter::eq("crm_stage", Bson::Null).or(Filter::eq("crm_stage", "new")),
        other => Filter::eq("crm_stage", other.as_str()),
    }
}

impl CaseQuery {
    pub fn filter(&self, scope: Filter) -> Filter {
        let mut filter = scope;
        if let Some(stage) = self.stage {
            filter = filter.and(stage_filter(stage));
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            filter = filter.and(
                Filter::contains("full_name", q)
                    .or(Filter::contains("case_number", q))
                    .or(Filter::contains("spn", q)),
            );
        }
        filter
    }
}

impl CaseDao {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    fn collection(&self, county: County) -> Collection<BookingRecord> {
        self.db.collection(county.collection())
    }

    /// Finds the case in whichever county holds it. Cases outside `scope`
    /// are reported as missing.
    pub async fn locate(&self, id: ObjectId, scope: &Filter) -> DaoResult<Located> {
        let filter = Filter::eq("_id", id).and(scope.clone()).to_document();
        for county in County::ALL {
            if let Some(record) = self.collection(county).find_one(filter.clone()).await? {
                return Ok(Located { county, record });
            }
        }
        Err(DaoError::NotFound)
    }

    pub async fn list(
        &self,
        query: &CaseQuery,
        scope: Filter,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<BookingSummary>> {
        let params = params.normalized();
        let counties = query.county.map(|c| vec![c]).unwrap_or_default();
        let filter = query.filter(scope);
        let sort = doc! { "booking_date": -1, "_id": -1 };

        let total = UnionQuery::new(filter.clone())
            .counties(counties.clone())
            .stage(doc! { "$count": "total" })
            .run(&self.db)
            .await?
            .first()
            .map(|d| count_of(d, "total"))
            .unwrap_or(0);

        let window = params.window() as i64;
        let items = UnionQuery::new(filter)
            .counties(counties)
            .per_branch(sort.clone(), window)
            .project(BookingSummary::projection())
            .tag_source()
            .stage(doc! { "$sort": sort })
            .stage(doc! { "$skip": params.skip() as i64 })
            .stage(doc! { "$limit": params.per_page as i64 })
            .run(&self.db)
            .await?
            .into_iter()
            .filter_map(BookingSummary::from_row)
            .collect();

        Ok(PaginatedResult::new(items, total, &params))
    }

    async fn update(&self, at: &Located, filter: Document, update: Document) -> DaoResult<u64> {
        let result = self
            .collection(at.county)
            .update_one(filter, with_updated_at(update))
            .await?;
        Ok(result.matched_count)
    }

    async fn reload(&self, at: &Located) -> DaoResult<Located> {
        let id = at.id()?;
        let record = self
            .collection(at.county)
            .find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)?;
        Ok(Located {
            county: at.county,
            record,
        })
    }

    pub async fn update_crm(&self, at: &Located, update: CrmUpdate, by: &str) -> DaoResult<Located> {
        let mut set = Document::new();
        if let Some(stage) = update.stage {
            set.insert("crm_stage", stage.as_str());
            let decision = Decision {
                at: DateTime::now(),
                by: Some(by.to_string()),
                reason: update.reason.clone(),
            };
            match stage {
                CrmStage::Accepted => {
                    set.insert("crm_details.acceptance", bson::to_bson(&decision)?);
                }
                CrmStage::Denied => {
                    set.insert("crm_details.denial", bson::to_bson(&decision)?);
                }
                _ => {}
            }
        }
        if let Some(to) = update.assigned_to {
            set.insert("crm_details.assigned_to", to);
        }
        if let Some(dept) = update.assigned_department {
            set.insert("crm_details.assigned_department", dept);
        }
        if let Some(notes) = update.notes {
            set.insert("crm_details.qualification.notes", notes);
        }
        if let Some(score) = update.score {
            set.insert("crm_details.qualification.score", score);
        }
        if set.is_empty() {
            return Ok(at.clone());
        }

        if self.update(at, doc! { "_id": at.id()? }, doc! { "$set": set }).await? == 0 {
            return Err(DaoError::NotFound);
        }
        self.reload(at).await
    }

    /// Marks checklist item `key`. A case without a checklist starts from
    /// the default one.
    pub async fn set_checklist_item(
        &self,
        at: &Located,
        key: &str,
        completed: bool,
    ) -> DaoResult<Vec<ChecklistItem>> {
        let id = at.id()?;
        let completed_at = if completed {
            Bson::DateTime(DateTime::now())
        } else {
            Bson::Null
        };

        if at.record.crm_details.checklist.is_empty() {
            let mut checklist = default_checklist();
            let item = checklist
                .iter_mut()
                .find(|i| i.key == key)
                .ok_or(DaoError::NotFound)?;
            item.completed = completed;
            item.completed_at = completed_at.as_datetime().copied();
            self.update(
                at,
                doc! { "_id": id },
                doc! { "$set": { "crm_details.checklist": bson::to_bson(&checklist)? } },
            )
            .await?;
        } else {
            let matched = self
                .update(
                    at,
                    doc! { "_id": id, "crm_details.checklist.key": key },
                    doc! { "$set": {
                        "crm_details.checklist.$.completed": completed,
                        "crm_details.checklist.$.completed_at": completed_at,
                    } },
                )
                .await?;
            if matched == 0 {
                return Err(DaoError::NotFound);
            }
        }

        Ok(self.reload(at).await?.record.crm_details.checklist)
    }

    pub async fn add_attachment(&self, at: &Located, attachment: &Attachment) -> DaoResult<()> {
        let matched = self
            .update(
                at,
                doc! { "_id": at.id()? },
                doc! { "$push": { "crm_details.attachments": bson::to_bson(attachment)? } },
            )
            .await?;
        if matched == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    /// Sets only the fields present in `patch`.
    pub async fn update_attachment(
        &self,
        at: &Located,
        attachment_id: &str,
        patch: AttachmentPatch,
    ) -> DaoResult<Attachment> {
        let mut set = doc! { "crm_details.attachments.$.updated_at": DateTime::now() };
        if let Some(label) = patch.label {
            set.insert("crm_details.attachments.$.label", label);
        }
        if let Some(note) = patch.note {
            set.insert("crm_details.attachments.$.note", note);
        }
        if let Some(key) = patch.checklist_key {
            set.insert("crm_details.attachments.$.checklist_key", key);
        }

        let matched = self
            .update(
                at,
                doc! { "_id": at.id()?, "crm_details.attachments.id": attachment_id },
                doc! { "$set": set },
            )
            .await?;
        if matched == 0 {
            return Err(DaoError::NotFound);
        }

        self.reload(at)
            .await?
            .record
            .crm_details
            .attachments
            .into_iter()
            .find(|a| a.id == attachment_id)
            .ok_or(DaoError::NotFound)
    }

    /// Pulls the attachment and returns what was removed.
    pub async fn remove_attachment(&self, at: &Located, attachment_id: &str) -> DaoResult<Attachment> {
        let attachment = find_attachment(&at.record, attachment_id)?;
        let matched = self
            .update(
                at,
                doc! { "_id": at.id()?, "crm_details.attachments.id": attachment_id },
                doc! { "$pull": { "crm_details.attachments": { "id": attachment_id } } },
            )
            .await?;
        if matched == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(attachment)
    }
}

pub fn find_attachment(record: &BookingRecord, attachment_id: &str) -> DaoResult<Attachment> {
    record
        .crm_details
        .attachments
        .iter()
        .find(|a| a.id == attachment_id)
        .cloned()
        .ok_or(DaoError::NotFound)
}
