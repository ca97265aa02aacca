//! Statistics report and quality dashboard data.
//!
//! Distributions are listed in first-seen order unless stated otherwise;
//! the geographic breakdowns are ranked by frequency.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use uk_solicitors_register_models::{Organization, UNKNOWN_CATEGORY, non_empty};

use crate::{SourceDataset, mean, percentage};

/// How many counties the statistics report lists.
pub const TOP_COUNTIES: usize = 20;

/// How many organizations the dashboard ranks.
pub const TOP_ORGANIZATIONS: usize = 20;

/// Organization names on the dashboard are cut to this many characters.
pub const DASHBOARD_NAME_CHARS: usize = 50;

/// Label counts that serialize as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTable(Vec<(String, usize)>);

impl CountTable {
    pub fn add(&mut self, label: &str) {
        if let Some((_, count)) = self.0.iter_mut().find(|(existing, _)| existing == label) {
            *count += 1;
        } else {
            self.0.push((label.to_string(), 1));
        }
    }

    /// Sorts by descending count. Ties keep first-seen order.
    #[must_use]
    pub fn ranked(mut self) -> Self {
        self.0.sort_by(|a, b| b.1.cmp(&a.1));
        self
    }

    #[must_use]
    pub fn top(mut self, n: usize) -> Self {
        self.0.truncate(n);
        self
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<usize> {
        self.0
            .iter()
            .find_map(|(existing, count)| (existing == label).then_some(*count))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(label, count)| (label.as_str(), *count))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CountTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in &self.0 {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

fn label_or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or(UNKNOWN_CATEGORY)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatistics {
    pub dataset_info: DatasetInfo,
    pub quality_distribution: QualityDistribution,
    pub geographic_distribution: GeographicDistribution,
    pub organization_types: CountTable,
    pub office_types: CountTable,
    pub contact_completeness: ContactCompleteness,
    pub data_completeness: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub total_organizations: usize,
    pub total_offices: usize,
    pub generated_date: DateTime<Utc>,
    pub source_file: String,
    pub processing_info: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityDistribution {
    pub distribution: CountTable,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographicDistribution {
    pub by_country: CountTable,
    pub by_county: CountTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Completeness {
    pub count: usize,
    pub percentage: f64,
}

impl Completeness {
    fn of(count: usize, total: usize) -> Self {
        Self {
            count,
            percentage: percentage(count, total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContactCompleteness {
    pub phone_numbers: Completeness,
    pub email_addresses: Completeness,
    pub websites: Completeness,
}

fn quality_categories(organizations: &[Organization]) -> CountTable {
    let mut table = CountTable::default();
    for org in organizations {
        table.add(org.quality_category());
    }
    table
}

/// Builds the statistics report.
#[must_use]
pub fn build_statistics(
    dataset: &SourceDataset,
    source_file: &str,
    generated_at: DateTime<Utc>,
) -> DatasetStatistics {
    let organizations = &dataset.organizations;
    let total_offices = dataset.office_count();

    let mut by_country = CountTable::default();
    let mut by_county = CountTable::default();
    let mut organization_types = CountTable::default();
    let mut office_types = CountTable::default();
    let (mut phones, mut emails, mut websites) = (0, 0, 0);

    for org in organizations {
        organization_types.add(label_or_unknown(
            org.organisation_type.as_ref().map(|kind| kind.as_str()),
        ));

        for office in &org.offices {
            by_country.add(label_or_unknown(office.country.as_deref()));
            if let Some(county) = non_empty(office.county.as_deref())
                && county != UNKNOWN_CATEGORY
            {
                by_county.add(county);
            }
            office_types.add(label_or_unknown(
                office.office_type.as_ref().map(|kind| kind.as_str()),
            ));

            phones += usize::from(non_empty(office.phone_number.as_deref()).is_some());
            emails += usize::from(non_empty(office.email.as_deref()).is_some());
            websites += usize::from(non_empty(office.website.as_deref()).is_some());
        }
    }

    DatasetStatistics {
        dataset_info: DatasetInfo {
            total_organizations: organizations.len(),
            total_offices,
            generated_date: generated_at,
            source_file: source_file.to_string(),
            processing_info: dataset.metadata.clone(),
        },
        quality_distribution: QualityDistribution {
            distribution: quality_categories(organizations),
            average_score: dataset.average_quality_score(),
        },
        geographic_distribution: GeographicDistribution {
            by_country: by_country.ranked(),
            by_county: by_county.ranked().top(TOP_COUNTIES),
        },
        organization_types,
        office_types,
        contact_completeness: ContactCompleteness {
            phone_numbers: Completeness::of(phones, total_offices),
            email_addresses: Completeness::of(emails, total_offices),
            websites: Completeness::of(websites, total_offices),
        },
        data_completeness: BTreeMap::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityDashboard {
    pub summary: DashboardSummary,
    pub quality_metrics: Vec<QualityMetric>,
    pub geographic_breakdown: Vec<CountryQuality>,
    pub top_quality_organizations: Vec<TopOrganization>,
    pub improvement_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_organizations: usize,
    pub total_offices: usize,
    pub average_quality_score: f64,
    pub processing_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetric {
    pub category: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryQuality {
    pub country: String,
    pub office_count: usize,
    pub average_quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopOrganization {
    pub name: String,
    pub quality_score: f64,
    pub office_count: usize,
    pub location: String,
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Per-country office count and mean owner quality, first-seen order.
///
/// Every office contributes its organization's score once.
fn country_quality(organizations: &[Organization]) -> Vec<CountryQuality> {
    let mut countries: Vec<(String, Vec<f64>)> = Vec::new();
    for org in organizations {
        let score = org.quality_score();
        for office in &org.offices {
            let country = label_or_unknown(office.country.as_deref());
            if let Some((_, scores)) = countries.iter_mut().find(|(name, _)| name == country) {
                scores.push(score);
            } else {
                countries.push((country.to_string(), vec![score]));
            }
        }
    }

    countries
        .into_iter()
        .map(|(country, scores)| CountryQuality {
            country,
            office_count: scores.len(),
            average_quality: round_to_tenth(mean(scores)),
        })
        .collect()
}

fn top_organizations(organizations: &[Organization]) -> Vec<TopOrganization> {
    let mut ranked: Vec<&Organization> = organizations.iter().collect();
    ranked.sort_by(|a, b| b.quality_score().total_cmp(&a.quality_score()));

    ranked
        .into_iter()
        .take(TOP_ORGANIZATIONS)
        .map(|org| TopOrganization {
            name: org.name().chars().take(DASHBOARD_NAME_CHARS).collect(),
            quality_score: org.quality_score(),
            office_count: org.offices.len(),
            location: org
                .offices
                .first()
                .map_or(UNKNOWN_CATEGORY, |office| {
                    office.town.as_deref().unwrap_or(UNKNOWN_CATEGORY)
                })
                .to_string(),
        })
        .collect()
}

/// Builds the data behind the quality dashboard.
#[must_use]
pub fn build_dashboard(dataset: &SourceDataset) -> QualityDashboard {
    let organizations = &dataset.organizations;
    let total = organizations.len();

    let quality_metrics = quality_categories(organizations)
        .iter()
        .map(|(category, count)| QualityMetric {
            category: category.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();

    QualityDashboard {
        summary: DashboardSummary {
            total_organizations: total,
            total_offices: dataset.office_count(),
            average_quality_score: dataset.average_quality_score(),
            processing_date: dataset.processing_date().to_string(),
        },
        quality_metrics,
        geographic_breakdown: country_quality(organizations),
        top_quality_organizations: top_organizations(organizations),
        improvement_areas: Vec::new(),
    }
}
