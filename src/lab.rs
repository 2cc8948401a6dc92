//! Lab Catalog - Offerings and Their Stored State
//!
//! A lab owns one offering per valid service. Offerings are never removed,
//! only disabled. Allowance is derived on read and never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::addons::AddOn;
use crate::compatibility::{CompatibilityGraph, ServiceId};
use crate::toggles::FeatureToggleSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnState {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabOffering {
    pub service_id: ServiceId,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub base_price: Option<Decimal>,
    /// Optional add-ons only; read-only columns are never stored.
    #[serde(default)]
    pub add_ons: BTreeMap<AddOn, AddOnState>,
}

impl LabOffering {
    /// Disabled, unpriced, with every optional add-on off.
    pub fn seeded(service_id: ServiceId) -> Self {
        Self {
            service_id,
            is_enabled: false,
            base_price: None,
            add_ons: AddOn::optional().map(|a| (a, AddOnState::default())).collect(),
        }
    }

    pub fn add_on(&self, add_on: AddOn) -> Option<&AddOnState> {
        self.add_ons.get(&add_on)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lab {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub toggles: FeatureToggleSet,
    #[serde(default)]
    pub offerings: Vec<LabOffering>,
}

impl Lab {
    /// New lab with one offering per valid service, in service id order.
    pub fn provision(
        graph: &CompatibilityGraph,
        name: &str,
        owner_id: &str,
        toggles: FeatureToggleSet,
    ) -> Self {
        let offerings: Vec<_> = graph
            .all_valid_services()
            .into_iter()
            .map(|s| LabOffering::seeded(s.id().clone()))
            .collect();

        let lab = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
            toggles,
            offerings,
        };
        tracing::info!(lab = %lab.id, offerings = lab.offerings.len(), "lab provisioned");
        lab
    }

    pub fn offering(&self, service_id: &ServiceId) -> Option<&LabOffering> {
        self.offerings.iter().find(|o| &o.service_id == service_id)
    }

    /// Replace stored rows with accepted ones, in order.
    ///
    /// Rows are matched by service id; a row absent from the lab is ignored.
    pub fn apply(&mut self, accepted: &[LabOffering]) -> usize {
        let mut applied = 0;
        for row in accepted {
            if let Some(slot) = self
                .offerings
                .iter_mut()
                .find(|o| o.service_id == row.service_id)
            {
                *slot = row.clone();
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceData;

    fn graph() -> CompatibilityGraph {
        CompatibilityGraph::build(ReferenceData::standard()).unwrap()
    }

    #[test]
    fn test_provision_seeds_every_service() {
        let graph = graph();
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::default());
        assert_eq!(lab.offerings.len(), graph.all_valid_services().len());
        for offering in &lab.offerings {
            assert!(!offering.is_enabled);
            assert!(offering.base_price.is_none());
            assert!(graph.service(&offering.service_id).is_some());
            assert!(!offering.add_ons.contains_key(&AddOn::JpegScans));
            assert!(offering.add_ons.contains_key(&AddOn::ReturnMounted));
        }
    }

    #[test]
    fn test_apply_replaces_matching_rows_only() {
        let graph = graph();
        let mut lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::default());
        let id = ServiceId::new("dev", "c41", "35mm");

        let mut row = LabOffering::seeded(id.clone());
        row.is_enabled = true;
        row.base_price = Some(Decimal::new(1200, 2));
        let stray = LabOffering::seeded(ServiceId::new("dev", "c41", "110"));

        assert_eq!(lab.apply(&[row.clone(), stray]), 1);
        assert_eq!(lab.offering(&id), Some(&row));
    }

    #[test]
    fn test_offering_json_shape() {
        let json = r#"{
            "serviceId": "dev:c41:35mm",
            "isEnabled": true,
            "basePrice": "12.50",
            "addOns": {"push1": {"isEnabled": true, "price": 3}}
        }"#;
        let offering: LabOffering = serde_json::from_str(json).unwrap();
        assert_eq!(offering.base_price, Some(Decimal::new(1250, 2)));
        assert_eq!(offering.add_on(AddOn::Push1).unwrap().price, Some(Decimal::new(3, 0)));
    }
}
