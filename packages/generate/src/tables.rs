//! Flat CSV tables for spreadsheet and analysis use.
//!
//! Cells carry the register's raw values; anything absent is written as
//! an empty cell.

use uk_solicitors_register_models::Organization;

use crate::GenerateError;

pub const ORGANIZATION_HEADERS: [&str; 11] = [
    "Id",
    "SraNumber",
    "PracticeName",
    "OrganisationType",
    "AuthorisationType",
    "Regulator",
    "Constitution",
    "Type",
    "NoOfOffices",
    "DataQualityScore",
    "DataQualityCategory",
];

pub const OFFICE_HEADERS: [&str; 15] = [
    "OrganizationId",
    "OfficeId",
    "Name",
    "OfficeType",
    "Address1",
    "Address2",
    "Address3",
    "Address4",
    "Town",
    "County",
    "Postcode",
    "Country",
    "PhoneNumber",
    "Email",
    "Website",
];

fn cell<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Scores keep a decimal point (`92.0`) so the column reads as numeric.
fn score_cell(score: Option<f64>) -> String {
    score
        .map(|score| serde_json::Value::from(score).to_string())
        .unwrap_or_default()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, GenerateError> {
    writer
        .into_inner()
        .map_err(|e| GenerateError::Io(e.into_error()))
}

/// One row per organization.
///
/// # Errors
///
/// Returns [`GenerateError::Csv`] if a row cannot be encoded.
pub fn organizations_csv(organizations: &[Organization]) -> Result<Vec<u8>, GenerateError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ORGANIZATION_HEADERS)?;

    for org in organizations {
        writer.write_record([
            org.id.to_string(),
            cell(org.sra_number.as_ref()),
            cell(org.practice_name.as_ref()),
            cell(org.organisation_type.as_ref()),
            cell(org.authorisation_type.as_ref()),
            cell(org.regulator.as_ref()),
            cell(org.constitution.as_ref()),
            cell(org.kind.as_ref()),
            cell(org.no_of_offices.as_ref()),
            score_cell(org.data_quality_score),
            cell(org.data_quality_category.as_ref()),
        ])?;
    }

    finish(writer)
}

/// One row per office, led by the owning organization's id.
///
/// # Errors
///
/// Returns [`GenerateError::Csv`] if a row cannot be encoded.
pub fn offices_csv(organizations: &[Organization]) -> Result<Vec<u8>, GenerateError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(OFFICE_HEADERS)?;

    for org in organizations {
        let org_id = org.id.to_string();
        for office in &org.offices {
            writer.write_record([
                org_id.clone(),
                office.office_id.to_string(),
                cell(office.name.as_ref()),
                cell(office.office_type.as_ref()),
                cell(office.address1.as_ref()),
                cell(office.address2.as_ref()),
                cell(office.address3.as_ref()),
                cell(office.address4.as_ref()),
                cell(office.town.as_ref()),
                cell(office.county.as_ref()),
                cell(office.postcode.as_ref()),
                cell(office.country.as_ref()),
                cell(office.phone_number.as_ref()),
                cell(office.email.as_ref()),
                cell(office.website.as_ref()),
            ])?;
        }
    }

    finish(writer)
}
