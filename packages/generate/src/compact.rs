//! Compact JSON document for application use.
//!
//! Optional address fields are kept as explicit `null`s so every office
//! has the same shape, while the `contact` block is left out entirely for
//! offices with no phone, email or website.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uk_solicitors_register_models::{Office, Organization, RecordId, non_empty};

pub const COMPACT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactDataset {
    pub version: String,
    pub generated: DateTime<Utc>,
    pub count: usize,
    pub organizations: Vec<CompactOrganization>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactOrganization {
    pub id: RecordId,
    pub sra_number: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub quality_score: f64,
    pub quality_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulator: Option<String>,
    pub offices: Vec<CompactOffice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactOffice {
    pub id: RecordId,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub address: CompactAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<CompactContact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub town: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

fn present(value: Option<&String>) -> Option<String> {
    non_empty(value.map(String::as_str)).map(str::to_string)
}

impl From<&Office> for CompactOffice {
    fn from(office: &Office) -> Self {
        let contact = CompactContact {
            phone: present(office.phone_number.as_ref()),
            email: present(office.email.as_ref()),
            website: present(office.website.as_ref()),
        };
        let has_contact =
            contact.phone.is_some() || contact.email.is_some() || contact.website.is_some();

        Self {
            id: office.office_id.clone(),
            name: office.name.clone(),
            kind: office.office_type.as_ref().map(ToString::to_string),
            address: CompactAddress {
                line1: office.address1.clone(),
                line2: present(office.address2.as_ref()),
                town: office.town.clone(),
                county: present(office.county.as_ref()),
                postcode: office.postcode.clone(),
                country: office.country.clone(),
            },
            contact: has_contact.then_some(contact),
        }
    }
}

impl From<&Organization> for CompactOrganization {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id.clone(),
            sra_number: org.sra_number.clone(),
            name: org.practice_name.clone(),
            kind: org.organisation_type.as_ref().map(ToString::to_string),
            quality_score: org.quality_score(),
            quality_category: org.quality_category().to_string(),
            authorization_type: present(org.authorisation_type.as_ref()),
            regulator: present(org.regulator.as_ref()),
            offices: org.offices.iter().map(CompactOffice::from).collect(),
        }
    }
}

/// Projects every organization into the compact document, preserving
/// input order.
#[must_use]
pub fn build(organizations: &[Organization], generated: DateTime<Utc>) -> CompactDataset {
    CompactDataset {
        version: COMPACT_VERSION.to_string(),
        generated,
        count: organizations.len(),
        organizations: organizations.iter().map(CompactOrganization::from).collect(),
    }
}
