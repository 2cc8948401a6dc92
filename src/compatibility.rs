//! Compatibility Graph - Single Source of Truth for Services
//!
//! Each relation has a primary direction:
//! - service type -> film types
//! - service type -> film sizes
//! - film type -> film sizes
//!
//! Mirror lists on the other side are optional. When present they must agree
//! with the primary side exactly. Integrity violations are fatal: reference
//! data is loaded once and a bad snapshot is a data bug.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::reference::{
    FilmSize, FilmSizeId, FilmType, FilmTypeId, ReferenceData, ServiceType, ServiceTypeId,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{owner} references unknown {kind} '{missing}'")]
    DanglingId {
        owner: String,
        kind: &'static str,
        missing: String,
    },

    #[error("Asymmetric compatibility between {left} and {right}")]
    Asymmetric { left: String, right: String },

    #[error("Id '{0}' may not contain ':'")]
    InvalidId(String),
}

/// Composite id of a service: `serviceType:filmType:filmSize`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(service_type: &str, film_type: &str, film_size: &str) -> Self {
        Self(format!("{}:{}:{}", service_type, film_type, film_size))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A sellable (service type, film type, film size) triple.
///
/// Only the graph constructs these, so every `Service` is compatible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    id: ServiceId,
    service_type: ServiceTypeId,
    film_type: FilmTypeId,
    film_size: FilmSizeId,
}

impl Service {
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn film_type(&self) -> &str {
        &self.film_type
    }

    pub fn film_size(&self) -> &str {
        &self.film_size
    }
}

/// A service together with the records it was built from.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedService<'a> {
    pub service: &'a Service,
    pub service_type: &'a ServiceType,
    pub film_type: &'a FilmType,
    pub film_size: &'a FilmSize,
}

#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    service_types: BTreeMap<ServiceTypeId, ServiceType>,
    film_types: BTreeMap<FilmTypeId, FilmType>,
    film_sizes: BTreeMap<FilmSizeId, FilmSize>,
    services: BTreeMap<ServiceId, Service>,
}

impl CompatibilityGraph {
    pub fn build(data: ReferenceData) -> Result<Self, GraphError> {
        let mut service_types = index("service type", data.service_types, |r| &r.id)?;
        let mut film_types = index("film type", data.film_types, |r| &r.id)?;
        let mut film_sizes = index("film size", data.film_sizes, |r| &r.id)?;

        // Primary directions
        let mut type_film = BTreeSet::new();
        let mut type_size = BTreeSet::new();
        let mut film_size = BTreeSet::new();

        for st in service_types.values() {
            for ft in &st.compatible_film_types {
                require(&film_types, "film type", &st.id, ft)?;
                type_film.insert((st.id.clone(), ft.clone()));
            }
            for fs in &st.compatible_film_sizes {
                require(&film_sizes, "film size", &st.id, fs)?;
                type_size.insert((st.id.clone(), fs.clone()));
            }
        }
        for ft in film_types.values() {
            for fs in &ft.compatible_film_sizes {
                require(&film_sizes, "film size", &ft.id, fs)?;
                film_size.insert((ft.id.clone(), fs.clone()));
            }
        }

        // Mirrors must agree when declared
        for ft in film_types.values() {
            check_mirror(&ft.id, &ft.compatible_service_types, &type_film, &service_types, "service type")?;
        }
        for fs in film_sizes.values() {
            check_mirror(&fs.id, &fs.compatible_service_types, &type_size, &service_types, "service type")?;
            check_mirror(&fs.id, &fs.compatible_film_types, &film_size, &film_types, "film type")?;
        }

        // Close every record over the derived relations
        for ft in film_types.values_mut() {
            ft.compatible_service_types = lefts_of(&type_film, &ft.id);
        }
        for fs in film_sizes.values_mut() {
            fs.compatible_service_types = lefts_of(&type_size, &fs.id);
            fs.compatible_film_types = lefts_of(&film_size, &fs.id);
        }
        for st in service_types.values_mut() {
            st.compatible_film_types = rights_of(&type_film, &st.id);
            st.compatible_film_sizes = rights_of(&type_size, &st.id);
        }

        let mut services = BTreeMap::new();
        for (st, ft) in &type_film {
            for fs in rights_of(&film_size, ft) {
                if type_size.contains(&(st.clone(), fs.clone())) {
                    let id = ServiceId::new(st, ft, &fs);
                    services.insert(
                        id.clone(),
                        Service {
                            id,
                            service_type: st.clone(),
                            film_type: ft.clone(),
                            film_size: fs,
                        },
                    );
                }
            }
        }

        tracing::debug!(
            service_types = service_types.len(),
            film_types = film_types.len(),
            film_sizes = film_sizes.len(),
            services = services.len(),
            "compatibility graph built"
        );

        Ok(Self {
            service_types,
            film_types,
            film_sizes,
            services,
        })
    }

    pub fn is_valid_service(&self, service_type: &str, film_type: &str, film_size: &str) -> bool {
        self.services
            .contains_key(&ServiceId::new(service_type, film_type, film_size))
    }

    /// Every valid service, ordered by id.
    pub fn all_valid_services(&self) -> Vec<&Service> {
        self.services.values().collect()
    }

    pub fn service(&self, id: &ServiceId) -> Option<&Service> {
        self.services.get(id)
    }

    pub fn resolve(&self, id: &ServiceId) -> Option<ResolvedService<'_>> {
        let service = self.services.get(id)?;
        Some(ResolvedService {
            service,
            service_type: self.service_types.get(&service.service_type)?,
            film_type: self.film_types.get(&service.film_type)?,
            film_size: self.film_sizes.get(&service.film_size)?,
        })
    }

    pub fn service_type(&self, id: &str) -> Option<&ServiceType> {
        self.service_types.get(id)
    }

    pub fn film_type(&self, id: &str) -> Option<&FilmType> {
        self.film_types.get(id)
    }

    pub fn film_size(&self, id: &str) -> Option<&FilmSize> {
        self.film_sizes.get(id)
    }
}

fn index<T>(
    kind: &'static str,
    records: Vec<T>,
    id_of: impl Fn(&T) -> &String,
) -> Result<BTreeMap<String, T>, GraphError> {
    let mut map = BTreeMap::new();
    for record in records {
        let id = id_of(&record).clone();
        if id.contains(':') {
            return Err(GraphError::InvalidId(id));
        }
        if map.contains_key(&id) {
            return Err(GraphError::DuplicateId { kind, id });
        }
        map.insert(id, record);
    }
    Ok(map)
}

fn require<T>(
    map: &BTreeMap<String, T>,
    kind: &'static str,
    owner: &str,
    id: &str,
) -> Result<(), GraphError> {
    if map.contains_key(id) {
        Ok(())
    } else {
        Err(GraphError::DanglingId {
            owner: owner.to_string(),
            kind,
            missing: id.to_string(),
        })
    }
}

fn check_mirror<T>(
    owner: &str,
    declared: &BTreeSet<String>,
    relation: &BTreeSet<(String, String)>,
    lefts: &BTreeMap<String, T>,
    kind: &'static str,
) -> Result<(), GraphError> {
    if declared.is_empty() {
        return Ok(());
    }
    for left in declared {
        require(lefts, kind, owner, left)?;
    }
    let derived = lefts_of(relation, owner);
    if let Some(left) = derived.symmetric_difference(declared).next() {
        return Err(GraphError::Asymmetric {
            left: left.clone(),
            right: owner.to_string(),
        });
    }
    Ok(())
}

fn lefts_of(relation: &BTreeSet<(String, String)>, right: &str) -> BTreeSet<String> {
    relation
        .iter()
        .filter(|(_, r)| r == right)
        .map(|(l, _)| l.clone())
        .collect()
}

fn rights_of(relation: &BTreeSet<(String, String)>, left: &str) -> BTreeSet<String> {
    relation
        .iter()
        .filter(|(l, _)| l == left)
        .map(|(_, r)| r.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> CompatibilityGraph {
        CompatibilityGraph::build(ReferenceData::standard()).unwrap()
    }

    #[test]
    fn test_standard_catalog_builds() {
        let graph = graph();
        // 4 roll-film service types x 3 films x 3 sizes, scan-only adds mounted slides
        assert_eq!(graph.all_valid_services().len(), 4 * 9 + 9 + 1);
    }

    #[test]
    fn test_every_service_is_pairwise_compatible() {
        let graph = graph();
        for service in graph.all_valid_services() {
            let st = graph.service_type(service.service_type()).unwrap();
            let ft = graph.film_type(service.film_type()).unwrap();
            let fs = graph.film_size(service.film_size()).unwrap();
            assert!(st.compatible_film_types.contains(&ft.id));
            assert!(st.compatible_film_sizes.contains(&fs.id));
            assert!(ft.compatible_film_sizes.contains(&fs.id));
            assert!(fs.compatible_film_types.contains(&ft.id));
            assert!(ft.compatible_service_types.contains(&st.id));
            assert!(fs.compatible_service_types.contains(&st.id));
        }
    }

    #[test]
    fn test_incompatible_triple_rejected() {
        let graph = graph();
        assert!(graph.is_valid_service("scan", "e6", "35mmMounted"));
        assert!(!graph.is_valid_service("dev", "e6", "35mmMounted"));
        assert!(!graph.is_valid_service("scan", "c41", "35mmMounted"));
        assert!(!graph.is_valid_service("nope", "c41", "35mm"));
    }

    #[test]
    fn test_dangling_id_is_fatal() {
        let mut data = ReferenceData::standard();
        data.service_types[0].compatible_film_types.insert("kodachrome".into());
        let err = CompatibilityGraph::build(data).unwrap_err();
        assert!(matches!(err, GraphError::DanglingId { missing, .. } if missing == "kodachrome"));
    }

    #[test]
    fn test_asymmetric_mirror_is_fatal() {
        let mut data = ReferenceData::standard();
        // Declares only one of the service types that list c41
        data.film_types[0].compatible_service_types.insert("dev".into());
        let err = CompatibilityGraph::build(data).unwrap_err();
        assert!(matches!(err, GraphError::Asymmetric { .. }));
    }

    #[test]
    fn test_consistent_mirror_accepted() {
        let mut data = ReferenceData::standard();
        data.film_sizes[1].compatible_film_types.insert("e6".into());
        data.film_sizes[1].compatible_service_types.insert("scan".into());
        assert!(CompatibilityGraph::build(data).is_ok());
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let mut data = ReferenceData::standard();
        let copy = data.film_sizes[0].clone();
        data.film_sizes.push(copy);
        let err = CompatibilityGraph::build(data).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateId { kind: "film size", .. }));
    }

    #[test]
    fn test_resolve_returns_records() {
        let graph = graph();
        let resolved = graph.resolve(&ServiceId::new("scan", "e6", "35mmMounted")).unwrap();
        assert!(resolved.film_type.is_e6);
        assert!(resolved.film_size.is_pre_mounted);
        assert!(resolved.service_type.included_capabilities.scan);
    }
}
