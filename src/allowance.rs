//! Allowance Resolver - What a Lab May Offer
//!
//! Pure: the same graph, toggles and offerings always produce the same maps.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::addons::{AddOn, Denial};
use crate::compatibility::{CompatibilityGraph, ResolvedService, ServiceId};
use crate::lab::{Lab, LabOffering};
use crate::toggles::FeatureToggleSet;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Offering references unknown service {0}")]
pub struct UnknownService(pub ServiceId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAllowance {
    pub is_allowed: bool,
}

/// Lab-wide allowance for base and every add-on column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Columns {
    pub base: ColumnAllowance,
    #[serde(flatten)]
    pub add_ons: BTreeMap<AddOn, ColumnAllowance>,
}

/// Structural verdict for every field of one row.
#[derive(Debug, Clone)]
pub struct RowAllowance {
    add_ons: BTreeMap<AddOn, Result<(), Denial>>,
}

impl RowAllowance {
    /// Base is always allowed.
    pub fn base_allowed(&self) -> bool {
        true
    }

    pub fn is_allowed(&self, add_on: AddOn) -> bool {
        self.denial(add_on).is_none()
    }

    pub fn denial(&self, add_on: AddOn) -> Option<Denial> {
        self.add_ons.get(&add_on).and_then(|r| r.err())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub is_allowed: bool,
    pub is_enabled: bool,
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub service_id: ServiceId,
    pub service_type: String,
    pub film_type: String,
    pub film_size: String,
    pub base: Cell,
    #[serde(flatten)]
    pub add_ons: BTreeMap<AddOn, Cell>,
}

/// Read-only pricing view of a lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingMatrix {
    /// Digest of the lab state the matrix was built from.
    pub revision: String,
    pub columns: Columns,
    pub rows: Vec<MatrixRow>,
}

pub struct AllowanceResolver<'a> {
    graph: &'a CompatibilityGraph,
    toggles: &'a FeatureToggleSet,
}

impl<'a> AllowanceResolver<'a> {
    pub fn new(graph: &'a CompatibilityGraph, toggles: &'a FeatureToggleSet) -> Self {
        Self { graph, toggles }
    }

    /// Base is always offerable; add-ons follow the lab's toggles.
    pub fn columns(&self) -> Columns {
        let add_ons = AddOn::ALL
            .into_iter()
            .map(|a| {
                let is_allowed = a.spec().column_allowed(self.toggles);
                (a, ColumnAllowance { is_allowed })
            })
            .collect();
        Columns {
            base: ColumnAllowance { is_allowed: true },
            add_ons,
        }
    }

    pub fn resolve(&self, service_id: &ServiceId) -> Result<ResolvedService<'a>, UnknownService> {
        self.graph
            .resolve(service_id)
            .ok_or_else(|| UnknownService(service_id.clone()))
    }

    pub fn row(&self, service: &ResolvedService<'_>) -> RowAllowance {
        let add_ons = AddOn::ALL
            .into_iter()
            .map(|a| (a, a.spec().check(service, self.toggles)))
            .collect();
        RowAllowance { add_ons }
    }

    /// Whether the lab runs every capability the service includes.
    pub fn supports(&self, service: &ResolvedService<'_>) -> bool {
        self.toggles
            .supports(&service.service_type.included_capabilities)
    }

    /// Supported rows only; unsupported rows are omitted, not shown disabled.
    pub fn matrix_rows(&self, lab: &Lab) -> Result<Vec<MatrixRow>, UnknownService> {
        let mut rows = vec![];
        for offering in &lab.offerings {
            let service = self.resolve(&offering.service_id)?;
            if !self.supports(&service) {
                continue;
            }
            let allowance = self.row(&service);
            rows.push(self.matrix_row(&service, offering, &allowance));
        }
        Ok(rows)
    }

    fn matrix_row(
        &self,
        service: &ResolvedService<'_>,
        offering: &LabOffering,
        allowance: &RowAllowance,
    ) -> MatrixRow {
        let add_ons = AddOn::ALL
            .into_iter()
            .map(|a| {
                let is_allowed = allowance.is_allowed(a);
                let cell = if a.is_read_only() {
                    Cell {
                        is_allowed,
                        is_enabled: is_allowed,
                        price: None,
                        read_only: true,
                    }
                } else {
                    let stored = offering.add_on(a).cloned().unwrap_or_default();
                    Cell {
                        is_allowed,
                        is_enabled: stored.is_enabled && is_allowed,
                        price: stored.price,
                        read_only: false,
                    }
                };
                (a, cell)
            })
            .collect();

        MatrixRow {
            service_id: offering.service_id.clone(),
            service_type: service.service_type.name.clone(),
            film_type: service.film_type.name.clone(),
            film_size: service.film_size.name.clone(),
            base: Cell {
                is_allowed: allowance.base_allowed(),
                is_enabled: offering.is_enabled,
                price: offering.base_price,
                read_only: false,
            },
            add_ons,
        }
    }
}
