use bson::{oid::ObjectId, Bson, DateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// The five counties whose normalized bookings live in `simple_<county>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum County {
    Brazoria,
    Fortbend,
    Galveston,
    Harris,
    Jefferson,
}

impl County {
    pub const ALL: [County; 5] = [
        County::Brazoria,
        County::Fortbend,
        County::Galveston,
        County::Harris,
        County::Jefferson,
    ];

    /// Collection every union-aggregation is started from.
    pub const ANCHOR: County = County::Brazoria;

    pub fn name(self) -> &'static str {
        match self {
            County::Brazoria => "brazoria",
            County::Fortbend => "fortbend",
            County::Galveston => "galveston",
            County::Harris => "harris",
            County::Jefferson => "jefferson",
        }
    }

    pub fn collection(self) -> &'static str {
        match self {
            County::Brazoria => "simple_brazoria",
            County::Fortbend => "simple_fortbend",
            County::Galveston => "simple_galveston",
            County::Harris => "simple_harris",
            County::Jefferson => "simple_jefferson",
        }
    }

    pub fn parse(s: &str) -> Option<County> {
        let s: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect();
        let s = s.strip_prefix("simple").unwrap_or(&s);
        County::ALL.into_iter().find(|c| c.name() == s)
    }
}

impl std::fmt::Display for County {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrmStage {
    #[default]
    New,
    Contacted,
    Qualifying,
    Accepted,
    Denied,
}

impl CrmStage {
    pub fn as_str(self) -> &'static str {
        match self {
            CrmStage::New => "new",
            CrmStage::Contacted => "contacted",
            CrmStage::Qualifying => "qualifying",
            CrmStage::Accepted => "accepted",
            CrmStage::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<CrmStage> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(CrmStage::New),
            "contacted" => Some(CrmStage::Contacted),
            "qualifying" => Some(CrmStage::Qualifying),
            "accepted" => Some(CrmStage::Accepted),
            "denied" => Some(CrmStage::Denied),
            _ => None,
        }
    }
}

/// A normalized booking document. The normalizer owns the shape; fields it
/// adds that are not listed here are ignored on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub booking_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub bond_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_status: Option<String>,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub spn: Option<String>,
    #[serde(default, deserialize_with = "lenient_stage")]
    pub crm_stage: Option<CrmStage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub crm_details: CrmDetails,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manual_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(rename = "_upsert_key", default, skip_serializing_if = "Option::is_none")]
    pub upsert_key: Option<String>,
}

impl BookingRecord {
    pub fn stage(&self) -> CrmStage {
        self.crm_stage.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrmDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub qualification: Qualification,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assigned_department: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub acceptance: Option<Decision>,
    #[serde(default)]
    pub denial: Option<Decision>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Qualification {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub storage_path: String,
    #[serde(default)]
    pub checklist_key: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

/// Who accepted or denied a case, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub at: DateTime,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Checklist every new case starts from when it has none yet.
pub fn default_checklist() -> Vec<ChecklistItem> {
    [
        ("id_copy", "Government ID", true),
        ("indemnitor_application", "Indemnitor application", true),
        ("collateral_receipt", "Collateral receipt", false),
        ("court_notice", "Court notice", false),
    ]
    .into_iter()
    .map(|(key, label, required)| ChecklistItem {
        key: key.to_string(),
        label: label.to_string(),
        required,
        completed: false,
        completed_at: None,
    })
    .collect()
}

/// Numbers of any BSON width become `f64`; legacy strings ("REFER TO
/// MAGISTRATE") and nulls read as `None` until the backfill rewrites them.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Bson>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(bson_number))
}

/// Missing and explicit `null` both read as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_stage<'de, D>(deserializer: D) -> Result<Option<CrmStage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Bson>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Bson::as_str).and_then(CrmStage::parse))
}

pub fn bson_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) if v.is_finite() => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}
