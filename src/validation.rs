//! Configuration Validator - Rule/Policy Separation
//!
//! Rules live in the add-on table and the price policy. This module applies
//! row policy on top of them:
//! - disabling is always legal
//! - enabling checks every touched field and collects all failures
//! - a row with any failure is not applied at all
//!
//! Rows never depend on each other. Results are reported in submission order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::addons::{AddOn, Denial};
use crate::allowance::{AllowanceResolver, RowAllowance, UnknownService};
use crate::compatibility::{CompatibilityGraph, ServiceId};
use crate::config::PricePolicy;
use crate::lab::{Lab, LabOffering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const BASE_FIELD: &str = "base";
pub const SERVICE_FIELD: &str = "serviceId";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProposedAddOn {
    pub is_enabled: bool,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// One row of a batch. Omitted prices keep the stored price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProposedOffering {
    pub service_id: ServiceId,
    pub is_enabled: bool,
    #[serde(default)]
    pub base_price: Option<Decimal>,
    #[serde(default)]
    pub add_ons: BTreeMap<AddOn, ProposedAddOn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub service_id: ServiceId,
    pub messages: BTreeMap<String, Vec<String>>,
}

impl RowError {
    fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            messages: BTreeMap::new(),
        }
    }

    fn push(&mut self, field: &str, message: String) {
        self.messages.entry(field.to_string()).or_default().push(message);
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    /// Revision of the lab snapshot the batch was checked against.
    pub base_revision: String,
    pub accepted: Vec<LabOffering>,
    pub errors: Vec<RowError>,
}

impl UpdateOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
enum RowVerdict {
    Accepted(LabOffering),
    Rejected(RowError),
}

#[derive(Debug, Clone, Default)]
pub struct BatchVerdict {
    pub accepted: Vec<LabOffering>,
    pub errors: Vec<RowError>,
}

pub struct ConfigurationValidator<'a> {
    graph: &'a CompatibilityGraph,
    policy: &'a PricePolicy,
}

impl<'a> ConfigurationValidator<'a> {
    pub fn new(graph: &'a CompatibilityGraph, policy: &'a PricePolicy) -> Self {
        Self { graph, policy }
    }

    /// Check every row against the lab's current toggles.
    ///
    /// A service named more than once is rejected as a whole: one error at its
    /// first position, no copy accepted.
    ///
    /// Only fails when the lab itself points at a service the graph lacks.
    pub fn validate(&self, lab: &Lab, batch: &[ProposedOffering]) -> Result<BatchVerdict, UnknownService> {
        let resolver = AllowanceResolver::new(self.graph, &lab.toggles);

        let mut copies: BTreeMap<&ServiceId, usize> = BTreeMap::new();
        for row in batch {
            *copies.entry(&row.service_id).or_default() += 1;
        }
        let check = |row: &ProposedOffering| -> Result<Option<RowVerdict>, UnknownService> {
            if copies[&row.service_id] > 1 {
                return Ok(None);
            }
            self.check_row(&resolver, lab, row).map(Some)
        };

        #[cfg(feature = "parallel")]
        let verdicts: Result<Vec<_>, _> = batch.par_iter().map(check).collect();
        #[cfg(not(feature = "parallel"))]
        let verdicts: Result<Vec<_>, _> = batch.iter().map(check).collect();

        let mut outcome = BatchVerdict::default();
        let mut reported = BTreeSet::new();
        for (row, verdict) in batch.iter().zip(verdicts?) {
            match verdict {
                Some(RowVerdict::Accepted(next)) => outcome.accepted.push(next),
                Some(RowVerdict::Rejected(error)) => outcome.errors.push(error),
                None if reported.insert(&row.service_id) => {
                    tracing::warn!(lab = %lab.id, service = %row.service_id, "batch names a service more than once");
                    let mut error = RowError::new(row.service_id.clone());
                    error.push(SERVICE_FIELD, "Service appears more than once in this batch.".to_string());
                    outcome.errors.push(error);
                }
                None => {}
            }
        }

        tracing::info!(
            lab = %lab.id,
            rows = batch.len(),
            accepted = outcome.accepted.len(),
            rejected = outcome.errors.len(),
            "offering batch validated"
        );
        Ok(outcome)
    }

    fn check_row(
        &self,
        resolver: &AllowanceResolver<'_>,
        lab: &Lab,
        proposed: &ProposedOffering,
    ) -> Result<RowVerdict, UnknownService> {
        let Some(current) = lab.offering(&proposed.service_id) else {
            tracing::warn!(lab = %lab.id, service = %proposed.service_id, "batch names a service the lab does not offer");
            let mut error = RowError::new(proposed.service_id.clone());
            error.push(SERVICE_FIELD, "Service is not offered by this lab.".to_string());
            return Ok(RowVerdict::Rejected(error));
        };

        // Disabling only ever hides things; nothing else on the row is touched.
        if !proposed.is_enabled {
            let mut next = current.clone();
            next.is_enabled = false;
            tracing::debug!(service = %proposed.service_id, "row disabled");
            return Ok(RowVerdict::Accepted(next));
        }

        let service = resolver.resolve(&current.service_id)?;
        let allowance = resolver.row(&service);
        let mut error = RowError::new(proposed.service_id.clone());
        let mut next = current.clone();
        next.is_enabled = true;

        if allowance.base_allowed() {
            if let Some(price) = proposed.base_price {
                match self.policy.check(price) {
                    Some(message) => error.push(BASE_FIELD, message),
                    None => next.base_price = Some(price),
                }
            }
        }

        for (&add_on, change) in &proposed.add_ons {
            if let Some(message) = self.apply_add_on(&allowance, &mut next, add_on, change) {
                error.push(add_on.name(), message);
            }
        }

        if error.messages.is_empty() {
            tracing::debug!(service = %proposed.service_id, "row accepted");
            Ok(RowVerdict::Accepted(next))
        } else {
            tracing::debug!(
                service = %proposed.service_id,
                fields = ?error.messages.keys().collect::<Vec<_>>(),
                "row rejected"
            );
            Ok(RowVerdict::Rejected(error))
        }
    }

    /// Writes the change into `next`, or returns why it cannot.
    fn apply_add_on(
        &self,
        allowance: &RowAllowance,
        next: &mut LabOffering,
        add_on: AddOn,
        change: &ProposedAddOn,
    ) -> Option<String> {
        let spec = add_on.spec();
        if spec.read_only {
            // Default behaviour of the service: nothing to store
            return match change.price {
                Some(_) if change.is_enabled => {
                    Some(Denial::ReadOnly(spec.label).message())
                }
                _ => None,
            };
        }

        let state = next.add_ons.entry(add_on).or_default();
        if !change.is_enabled {
            state.is_enabled = false;
            return None;
        }
        if let Some(denial) = allowance.denial(add_on) {
            return Some(denial.message());
        }
        if let Some(price) = change.price {
            if let Some(message) = self.policy.check(price) {
                return Some(message);
            }
            state.price = Some(price);
        }
        state.is_enabled = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::AddOnState;
    use crate::reference::ReferenceData;
    use crate::toggles::FeatureToggleSet;

    fn graph() -> CompatibilityGraph {
        CompatibilityGraph::build(ReferenceData::standard()).unwrap()
    }

    fn enable(id: &str, add_ons: &[(AddOn, Option<i64>)]) -> ProposedOffering {
        ProposedOffering {
            service_id: ServiceId::from(id),
            is_enabled: true,
            base_price: Some(Decimal::new(1000, 2)),
            add_ons: add_ons
                .iter()
                .map(|(a, p)| {
                    (*a, ProposedAddOn { is_enabled: true, price: p.map(|v| Decimal::new(v, 0)) })
                })
                .collect(),
        }
    }

    #[test]
    fn test_errors_collected_per_field() {
        let graph = graph();
        let policy = PricePolicy::default();
        let mut toggles = FeatureToggleSet::all_enabled();
        toggles.dev.is_enabled = false;
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", toggles);

        let batch = [enable(
            "devScan:c41:35mm",
            &[(AddOn::Push1, Some(2)), (AddOn::ReturnMounted, Some(4)), (AddOn::RawScans, Some(1))],
        )];
        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &batch).unwrap();

        assert!(verdict.accepted.is_empty());
        let error = &verdict.errors[0];
        assert_eq!(error.fields().collect::<Vec<_>>(), vec!["push1", "returnMounted"]);
        assert_eq!(error.messages["push1"], vec!["Developing is not currently enabled."]);
        assert_eq!(error.messages["returnMounted"], vec!["Only slide film may be mounted."]);
    }

    #[test]
    fn test_disable_skips_every_other_field() {
        let graph = graph();
        let policy = PricePolicy::default();
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::default());

        let mut row = enable("devScan:c41:35mm", &[(AddOn::ReturnMounted, Some(-4))]);
        row.is_enabled = false;
        row.base_price = Some(Decimal::new(-1, 0));

        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &[row]).unwrap();
        assert!(verdict.errors.is_empty());
        let accepted = &verdict.accepted[0];
        assert!(!accepted.is_enabled);
        assert_eq!(accepted.base_price, None);
        assert_eq!(accepted.add_on(AddOn::ReturnMounted), Some(&AddOnState::default()));
    }

    #[test]
    fn test_disabled_add_on_keeps_price() {
        let graph = graph();
        let policy = PricePolicy::default();
        let mut lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::all_enabled());
        let id = ServiceId::from("dev:c41:35mm");
        let mut stored = lab.offering(&id).cloned().unwrap();
        stored.add_ons.insert(AddOn::Push1, AddOnState { is_enabled: true, price: Some(Decimal::new(3, 0)) });
        lab.apply(&[stored]);

        let mut row = enable("dev:c41:35mm", &[]);
        row.add_ons.insert(AddOn::Push1, ProposedAddOn { is_enabled: false, price: Some(Decimal::new(-9, 0)) });

        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &[row]).unwrap();
        assert!(verdict.errors.is_empty());
        let push = verdict.accepted[0].add_on(AddOn::Push1).unwrap();
        assert!(!push.is_enabled);
        assert_eq!(push.price, Some(Decimal::new(3, 0)));
    }

    #[test]
    fn test_omitted_price_keeps_stored_price() {
        let graph = graph();
        let policy = PricePolicy::default();
        let mut lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::all_enabled());
        let id = ServiceId::from("dev:bw:120");
        let mut stored = lab.offering(&id).cloned().unwrap();
        stored.base_price = Some(Decimal::new(14, 0));
        lab.apply(&[stored]);

        let mut row = enable("dev:bw:120", &[(AddOn::Pull1, None)]);
        row.base_price = None;
        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &[row]).unwrap();

        let accepted = &verdict.accepted[0];
        assert_eq!(accepted.base_price, Some(Decimal::new(14, 0)));
        assert!(accepted.add_on(AddOn::Pull1).unwrap().is_enabled);
    }

    #[test]
    fn test_price_policy_errors_are_field_scoped() {
        let graph = graph();
        let policy = PricePolicy::default();
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::all_enabled());

        let mut row = enable("dev:c41:35mm", &[(AddOn::Push2, Some(-1))]);
        row.base_price = Some(Decimal::new(10001, 3));
        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &[row]).unwrap();

        let error = &verdict.errors[0];
        assert_eq!(error.messages[BASE_FIELD], vec!["Price may have at most 2 decimal places."]);
        assert_eq!(error.messages["push2"], vec!["Price cannot be negative."]);
    }

    #[test]
    fn test_read_only_columns() {
        let graph = graph();
        let policy = PricePolicy::default();
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::all_enabled());
        let validator = ConfigurationValidator::new(&graph, &policy);

        // Echoing the default back is harmless
        let echoed = enable("devScan:c41:35mm", &[(AddOn::JpegScans, None)]);
        let verdict = validator.validate(&lab, &[echoed]).unwrap();
        assert!(verdict.errors.is_empty());
        assert!(!verdict.accepted[0].add_ons.contains_key(&AddOn::JpegScans));

        let priced = enable("devScan:c41:35mm", &[(AddOn::JpegScans, Some(2))]);
        let verdict = validator.validate(&lab, &[priced]).unwrap();
        assert_eq!(
            verdict.errors[0].messages["jpegScans"],
            vec!["JPEG scans is included with the service and cannot be changed."]
        );
    }

    #[test]
    fn test_unknown_row_is_row_scoped() {
        let graph = graph();
        let policy = PricePolicy::default();
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::all_enabled());

        let batch = [enable("dev:c41:110", &[]), enable("dev:c41:35mm", &[])];
        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &batch).unwrap();
        assert_eq!(verdict.accepted.len(), 1);
        assert_eq!(verdict.errors.len(), 1);
        assert_eq!(
            verdict.errors[0].messages[SERVICE_FIELD],
            vec!["Service is not offered by this lab."]
        );
    }

    #[test]
    fn test_repeated_service_rejected_once() {
        let graph = graph();
        let policy = PricePolicy::default();
        let lab = Lab::provision(&graph, "Darkroom", "owner-1", FeatureToggleSet::all_enabled());

        let batch = [
            enable("dev:c41:35mm", &[]),
            enable("dev:bw:35mm", &[]),
            enable("dev:c41:35mm", &[(AddOn::ReturnMounted, Some(4))]),
            enable("dev:c41:35mm", &[]),
        ];
        let verdict = ConfigurationValidator::new(&graph, &policy).validate(&lab, &batch).unwrap();

        assert_eq!(verdict.accepted.len(), 1);
        assert_eq!(verdict.accepted[0].service_id, ServiceId::from("dev:bw:35mm"));
        assert_eq!(verdict.errors.len(), 1);
        assert_eq!(verdict.errors[0].service_id, ServiceId::from("dev:c41:35mm"));
        assert_eq!(
            verdict.errors[0].messages[SERVICE_FIELD],
            vec!["Service appears more than once in this batch."]
        );
    }

    #[test]
    fn test_unknown_add_on_is_malformed() {
        let json = r#"{"serviceId": "dev:c41:35mm", "isEnabled": true, "addOns": {"push9": {"isEnabled": true}}}"#;
        assert!(serde_json::from_str::<ProposedOffering>(json).is_err());
    }
}
