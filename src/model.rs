//! Benchmark data model
//!
//! Ids handed out by the database are opaque strings. They are stored and
//! passed back verbatim, never parsed.

use serde::{Deserialize, Serialize};

/// Separator used to store an alert list in a single property
pub const ALERTS_SEPARATOR: &str = "_!s!_";

/// Endpoint names created by the CREATE_ENDPOINT stage
pub const DEFAULT_ENDPOINTS: [&str; 7] = [
    "Carcinogenicity",
    "Chromosome Damage",
    "Hepatoxicity",
    "Mutagenicity",
    "Skin Iritation",
    "Skin Sensitisation",
    "Teratogenicity",
];

/// Alert sets assigned round-robin to prediction requests
pub fn default_alert_sets() -> Vec<Vec<String>> {
    [&["Alert 1"][..], &["Alert 1", "Alert 2"], &["Alert 2", "Alert 3"], &["Alert 4"]]
        .iter()
        .map(|set| set.iter().map(|s| s.to_string()).collect())
        .collect()
}

pub fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub id: String,
    pub name: String,
}

/// An inserted record and the id the database gave it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDescriptor {
    pub id: String,
    pub payload: String,
}

/// Endpoint and alerts chosen for one future prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionAssignment {
    pub endpoint_id: String,
    pub alerts: Vec<String>,
}

impl PredictionAssignment {
    /// Bind the assignment to an inserted structure
    pub fn for_structure(self, input_structure_id: impl Into<String>) -> PredictionLinkRequest {
        PredictionLinkRequest {
            input_structure_id: input_structure_id.into(),
            endpoint_id: self.endpoint_id,
            alerts: self.alerts,
        }
    }
}

/// A complete request to create one prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionLinkRequest {
    pub input_structure_id: String,
    pub endpoint_id: String,
    pub alerts: Vec<String>,
}

/// Assign endpoints and alert sets round-robin to `n` future predictions
///
/// Both catalogs cycle independently. An empty endpoint catalog yields no
/// assignments; an empty alert catalog yields empty alert lists.
pub fn generate_prediction_inputs(
    n: usize,
    endpoint_ids: &[String],
    alert_sets: &[Vec<String>],
) -> Vec<PredictionAssignment> {
    if endpoint_ids.is_empty() {
        return Vec::new();
    }
    let mut alerts = alert_sets.iter().cycle();
    endpoint_ids
        .iter()
        .cycle()
        .take(n)
        .map(|endpoint_id| PredictionAssignment {
            endpoint_id: endpoint_id.clone(),
            alerts: alerts.next().cloned().unwrap_or_default(),
        })
        .collect()
}

/// Pair assignments with structure ids in order; the shorter side wins
pub fn pair_with_structures(
    assignments: Vec<PredictionAssignment>,
    structure_ids: &[String],
) -> Vec<PredictionLinkRequest> {
    assignments
        .into_iter()
        .zip(structure_ids)
        .map(|(assignment, id)| assignment.for_structure(id.as_str()))
        .collect()
}

/// Join alerts into one property value
pub fn encode_alerts(alerts: &[String]) -> String {
    alerts.join(ALERTS_SEPARATOR)
}

/// Split a stored alerts value; the empty string is the empty list
pub fn decode_alerts(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(ALERTS_SEPARATOR).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_robin_endpoints() {
        let endpoints = ids(&["e1", "e2", "e3"]);
        let assigned: Vec<String> = generate_prediction_inputs(7, &endpoints, &default_alert_sets())
            .into_iter()
            .map(|a| a.endpoint_id)
            .collect();
        assert_eq!(assigned, ids(&["e1", "e2", "e3", "e1", "e2", "e3", "e1"]));
    }

    #[test]
    fn test_alerts_cycle_independently() {
        let endpoints = ids(&["e1", "e2", "e3"]);
        let inputs = generate_prediction_inputs(5, &endpoints, &default_alert_sets());
        assert_eq!(inputs[0].alerts, ids(&["Alert 1"]));
        assert_eq!(inputs[3].alerts, ids(&["Alert 4"]));
        assert_eq!(inputs[4].alerts, ids(&["Alert 1"]));
        assert_eq!(inputs[4].endpoint_id, "e2");
    }

    #[test]
    fn test_deterministic() {
        let endpoints = default_endpoints();
        let a = generate_prediction_inputs(20, &endpoints, &default_alert_sets());
        let b = generate_prediction_inputs(20, &endpoints, &default_alert_sets());
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_catalogs() {
        assert!(generate_prediction_inputs(5, &[], &default_alert_sets()).is_empty());
        let inputs = generate_prediction_inputs(2, &ids(&["e1"]), &[]);
        assert_eq!(inputs.len(), 2);
        assert!(inputs[0].alerts.is_empty());
    }

    #[test]
    fn test_pairing_uses_shorter_side() {
        let inputs = generate_prediction_inputs(4, &ids(&["e1", "e2"]), &default_alert_sets());
        let requests = pair_with_structures(inputs, &ids(&["#3:0", "#3:1"]));
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].input_structure_id, "#3:1");
        assert_eq!(requests[1].endpoint_id, "e2");
        assert_eq!(requests[1].alerts, ids(&["Alert 1", "Alert 2"]));
    }

    #[test]
    fn test_alerts_codec() {
        let alerts = ids(&["Alert 2", "Alert 3"]);
        assert_eq!(encode_alerts(&alerts), "Alert 2_!s!_Alert 3");
        assert_eq!(decode_alerts("Alert 2_!s!_Alert 3"), alerts);
        assert!(decode_alerts("").is_empty());
        assert_eq!(encode_alerts(&[]), "");
    }
}
