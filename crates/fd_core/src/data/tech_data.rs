//! Research nodes. Survey nodes unlock ore rings.

use serde::{Deserialize, Serialize};

use super::item_data::ItemStack;

/// A research node.
///
/// # Example RON
///
/// ```ron
/// TechNodeDef(
///     id: "geology_survey_1",
///     costs: [(item_id: "gear", quantity: 12)],
///     prerequisites: [],
///     survey_ring: Some(1),
///     duration_ticks: 360,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechNodeDef {
    /// Unique node id.
    pub id: String,
    /// Items drawn from the research center's input buffer.
    pub costs: Vec<ItemStack>,
    /// Nodes that must be completed first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Ore ring revealed on completion.
    #[serde(default)]
    pub survey_ring: Option<u32>,
    /// Research time.
    pub duration_ticks: u32,
}

impl TechNodeDef {
    /// The standard geology survey chain.
    #[must_use]
    pub fn standard_surveys() -> Vec<Self> {
        vec![
            Self {
                id: "geology_survey_1".into(),
                costs: vec![ItemStack::new("gear", 12)],
                prerequisites: Vec::new(),
                survey_ring: Some(1),
                duration_ticks: 360,
            },
            Self {
                id: "geology_survey_2".into(),
                costs: vec![ItemStack::new("plate_steel", 24)],
                prerequisites: vec!["geology_survey_1".into()],
                survey_ring: Some(2),
                duration_ticks: 420,
            },
            Self {
                id: "geology_survey_3".into(),
                costs: vec![ItemStack::new("plate_steel", 16), ItemStack::new("circuit", 8)],
                prerequisites: vec!["geology_survey_2".into()],
                survey_ring: Some(3),
                duration_ticks: 480,
            },
        ]
    }
}
