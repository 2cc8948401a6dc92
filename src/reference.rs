//! Reference Data - Service Types, Film Types, Film Sizes
//!
//! Read-only records supplied by the storage layer. Loaded once, then handed
//! to the compatibility graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::MIN_REFERENCE_VERSION;

pub type ServiceTypeId = String;
pub type FilmTypeId = String;
pub type FilmSizeId = String;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read reference data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid reference data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid reference format version: {0}")]
    InvalidVersion(String),

    #[error("Reference format {0} is not supported, expected {1} compatible")]
    UnsupportedVersion(String, String),
}

/// Capability families a service type performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub dev: bool,
    #[serde(default)]
    pub scan: bool,
    #[serde(default)]
    pub print: bool,
}

impl Capabilities {
    pub const fn new(dev: bool, scan: bool, print: bool) -> Self {
        Self { dev, scan, print }
    }
}

/// Primary side of the service type relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub name: String,
    pub included_capabilities: Capabilities,
    #[serde(default)]
    pub compatible_film_types: BTreeSet<FilmTypeId>,
    #[serde(default)]
    pub compatible_film_sizes: BTreeSet<FilmSizeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmType {
    pub id: FilmTypeId,
    pub name: String,
    #[serde(default, rename = "isE6")]
    pub is_e6: bool,
    /// Mirror of `ServiceType::compatible_film_types`. Optional; checked when present.
    #[serde(default)]
    pub compatible_service_types: BTreeSet<ServiceTypeId>,
    /// Primary side of the film type / film size relation.
    #[serde(default)]
    pub compatible_film_sizes: BTreeSet<FilmSizeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmSize {
    pub id: FilmSizeId,
    pub name: String,
    #[serde(default)]
    pub is_pre_mounted: bool,
    #[serde(default)]
    pub compatible_service_types: BTreeSet<ServiceTypeId>,
    #[serde(default)]
    pub compatible_film_types: BTreeSet<FilmTypeId>,
}

/// A snapshot of all reference records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    #[serde(default = "default_format_version")]
    pub format_version: String,
    pub service_types: Vec<ServiceType>,
    pub film_types: Vec<FilmType>,
    pub film_sizes: Vec<FilmSize>,
}

fn default_format_version() -> String {
    MIN_REFERENCE_VERSION.to_string()
}

impl ReferenceData {
    pub fn from_json_str(content: &str) -> Result<Self, ReferenceError> {
        let data: ReferenceData = serde_json::from_str(content)?;
        data.check_format_version()?;
        Ok(data)
    }

    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn check_format_version(&self) -> Result<(), ReferenceError> {
        let actual = semver::Version::parse(&self.format_version)
            .map_err(|_| ReferenceError::InvalidVersion(self.format_version.clone()))?;
        let min = semver::Version::parse(MIN_REFERENCE_VERSION)
            .map_err(|_| ReferenceError::InvalidVersion(MIN_REFERENCE_VERSION.to_string()))?;

        if actual.major != min.major || actual < min {
            return Err(ReferenceError::UnsupportedVersion(
                self.format_version.clone(),
                MIN_REFERENCE_VERSION.to_string(),
            ));
        }
        Ok(())
    }

    /// The catalog most labs are provisioned from.
    pub fn standard() -> Self {
        let service_type = |id: &str, name: &str, caps: Capabilities, films: &[&str], sizes: &[&str]| {
            ServiceType {
                id: id.to_string(),
                name: name.to_string(),
                included_capabilities: caps,
                compatible_film_types: films.iter().map(|s| s.to_string()).collect(),
                compatible_film_sizes: sizes.iter().map(|s| s.to_string()).collect(),
            }
        };
        let film_type = |id: &str, name: &str, is_e6: bool, sizes: &[&str]| FilmType {
            id: id.to_string(),
            name: name.to_string(),
            is_e6,
            compatible_service_types: BTreeSet::new(),
            compatible_film_sizes: sizes.iter().map(|s| s.to_string()).collect(),
        };
        let film_size = |id: &str, name: &str, is_pre_mounted: bool| FilmSize {
            id: id.to_string(),
            name: name.to_string(),
            is_pre_mounted,
            compatible_service_types: BTreeSet::new(),
            compatible_film_types: BTreeSet::new(),
        };

        let all_films = ["c41", "bw", "e6"];
        let rolls = ["35mm", "120", "4x5"];

        Self {
            format_version: MIN_REFERENCE_VERSION.to_string(),
            service_types: vec![
                service_type("dev", "Develop Only", Capabilities::new(true, false, false), &all_films, &rolls),
                service_type("devScan", "Develop + Scan", Capabilities::new(true, true, false), &all_films, &rolls),
                service_type("devPrint", "Develop + Print", Capabilities::new(true, false, true), &all_films, &rolls),
                service_type(
                    "devScanPrint",
                    "Develop + Scan + Print",
                    Capabilities::new(true, true, true),
                    &all_films,
                    &rolls,
                ),
                service_type(
                    "scan",
                    "Scan Only",
                    Capabilities::new(false, true, false),
                    &all_films,
                    &["35mm", "35mmMounted", "120", "4x5"],
                ),
            ],
            film_types: vec![
                film_type("c41", "C-41 Color Negative", false, &["35mm", "120", "4x5"]),
                film_type("bw", "Black & White", false, &["35mm", "120", "4x5"]),
                film_type("e6", "E-6 Slide", true, &["35mm", "35mmMounted", "120", "4x5"]),
            ],
            film_sizes: vec![
                film_size("35mm", "35mm", false),
                film_size("35mmMounted", "35mm Mounted", true),
                film_size("120", "120", false),
                film_size("4x5", "4x5 Sheet", false),
            ],
        }
    }
}
