//! Database-ready JSON arrays.
//!
//! Rows use snake_case column names and carry `created_at`/`updated_at`
//! stamped with the generation time. Offices join to organizations on
//! `organization_id`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uk_solicitors_register_models::{Organization, RecordId, non_empty};

use crate::GenerateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbOrganization {
    pub id: RecordId,
    pub sra_number: Option<String>,
    pub practice_name: Option<String>,
    pub organization_type: Option<String>,
    pub authorization_type: Option<String>,
    pub authorization_status: Option<String>,
    pub regulator: Option<String>,
    pub constitution: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub number_of_offices: Option<i64>,
    pub data_quality_score: Option<f64>,
    pub data_quality_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freelance_basis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbOffice {
    pub id: RecordId,
    pub organization_id: RecordId,
    pub name: Option<String>,
    pub office_type: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub address_line_3: Option<String>,
    pub address_line_4: Option<String>,
    pub town: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn present(value: Option<&String>) -> Option<String> {
    non_empty(value.map(String::as_str)).map(str::to_string)
}

/// Flattens organizations and their offices into relational rows.
///
/// Office rows are only ever produced from their parent's own office
/// list, so `organization_id` always refers to a row in the first array.
#[must_use]
pub fn build(
    organizations: &[Organization],
    stamped_at: DateTime<Utc>,
) -> (Vec<DbOrganization>, Vec<DbOffice>) {
    let mut db_organizations = Vec::with_capacity(organizations.len());
    let mut db_offices = Vec::new();

    for org in organizations {
        db_organizations.push(DbOrganization {
            id: org.id.clone(),
            sra_number: org.sra_number.clone(),
            practice_name: org.practice_name.clone(),
            organization_type: org.organisation_type.as_ref().map(ToString::to_string),
            authorization_type: org.authorisation_type.clone(),
            authorization_status: org.authorisation_status.clone(),
            regulator: org.regulator.clone(),
            constitution: org.constitution.clone(),
            kind: org.kind.clone(),
            number_of_offices: org.no_of_offices,
            data_quality_score: org.data_quality_score,
            data_quality_category: org.data_quality_category.clone(),
            created_at: stamped_at,
            updated_at: stamped_at,
            authorization_date: present(org.authorisation_date.as_ref()),
            freelance_basis: present(org.freelance_basis.as_ref()),
        });

        db_offices.extend(org.offices.iter().map(|office| DbOffice {
            id: office.office_id.clone(),
            organization_id: org.id.clone(),
            name: office.name.clone(),
            office_type: office.office_type.as_ref().map(ToString::to_string),
            address_line_1: office.address1.clone(),
            address_line_2: office.address2.clone(),
            address_line_3: office.address3.clone(),
            address_line_4: office.address4.clone(),
            town: office.town.clone(),
            county: office.county.clone(),
            postcode: office.postcode.clone(),
            country: office.country.clone(),
            phone_number: office.phone_number.clone(),
            email: office.email.clone(),
            website: office.website.clone(),
            created_at: stamped_at,
            updated_at: stamped_at,
        }));
    }

    (db_organizations, db_offices)
}

/// Fails if any office references an organization id that is not in
/// `organizations`.
///
/// # Errors
///
/// Returns [`GenerateError::Integrity`] with the number of orphaned
/// offices.
pub fn check_integrity(
    organizations: &[DbOrganization],
    offices: &[DbOffice],
) -> Result<(), GenerateError> {
    let ids: BTreeSet<&RecordId> = organizations.iter().map(|org| &org.id).collect();
    let orphans = offices
        .iter()
        .filter(|office| !ids.contains(&office.organization_id))
        .count();
    if orphans > 0 {
        log::error!("{orphans} offices reference unknown organizations");
        return Err(GenerateError::Integrity { orphans });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::test_support::sample_dataset;

    #[test]
    fn rows_use_database_names_and_stamps() {
        let dataset = sample_dataset();
        let now = Utc::now();
        let (orgs, offices) = build(&dataset.organizations, now);

        assert_eq!(orgs.len(), 2);
        assert_eq!(offices.len(), 2);
        assert_eq!(orgs[0].created_at, now);
        assert_eq!(offices[1].updated_at, now);

        let org = serde_json::to_value(&orgs[0]).unwrap();
        assert_eq!(org["organization_type"], "Recognised Body");
        assert_eq!(org["number_of_offices"], 1);
        assert_eq!(org["type"], "Organisation");
        assert_eq!(org["authorization_date"], "2001-05-04");

        let office = serde_json::to_value(&offices[0]).unwrap();
        assert_eq!(office["organization_id"], 1);
        assert_eq!(office["address_line_1"], "1 Strand");
        assert_eq!(office["office_type"], "Head Office");
    }

    #[test]
    fn optional_columns_only_when_present() {
        let dataset = sample_dataset();
        let (orgs, _) = build(&dataset.organizations, Utc::now());

        let jones = serde_json::to_value(&orgs[1]).unwrap();
        let jones = jones.as_object().unwrap();
        assert!(!jones.contains_key("authorization_date"));
        assert!(!jones.contains_key("freelance_basis"));
        assert_eq!(jones["data_quality_score"], Value::Null);
        assert_eq!(jones["regulator"], Value::Null);
    }

    #[test]
    fn built_rows_pass_integrity_check() {
        let dataset = sample_dataset();
        let (orgs, offices) = build(&dataset.organizations, Utc::now());
        assert!(check_integrity(&orgs, &offices).is_ok());
    }

    #[test]
    fn orphaned_offices_are_a_hard_error() {
        let dataset = sample_dataset();
        let (orgs, mut offices) = build(&dataset.organizations, Utc::now());
        offices[1].organization_id = RecordId::Number(999);

        let err = check_integrity(&orgs[..1], &offices).unwrap_err();
        assert!(matches!(err, GenerateError::Integrity { orphans: 1 }));
    }
}
