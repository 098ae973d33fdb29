use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::RosterImportError;
use crate::workflows::laundry::domain::HostelStatus;

#[derive(Debug, Clone)]
pub(crate) struct RosterEntry {
    pub(crate) register_no: String,
    pub(crate) name: String,
    pub(crate) hostel_status: HostelStatus,
}

pub(crate) fn parse_entries<R: Read>(reader: R) -> Result<Vec<RosterEntry>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();

    for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
        let row = record?;
        let register_no = clean(&row.register_no);
        if register_no.is_empty() {
            // Header is line 1; data starts on line 2.
            return Err(RosterImportError::EmptyRegisterNo { line: index + 2 });
        }

        entries.push(RosterEntry {
            register_no,
            name: clean(&row.name),
            hostel_status: parse_status(row.status.as_deref()),
        });
    }

    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Register No")]
    register_no: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn clean(value: &str) -> String {
    let stripped = value.replace(['\u{feff}', '\u{200b}'], "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_status(value: Option<&str>) -> HostelStatus {
    let Some(value) = value else {
        return HostelStatus::Active;
    };
    match clean(value).to_ascii_lowercase().as_str() {
        "dropped" | "left" | "discontinued" => HostelStatus::Dropped,
        "completed" | "alumni" | "passed out" => HostelStatus::Completed,
        _ => HostelStatus::Active,
    }
}
