use {
    crate::{attribution::BlockAttribution, insights::Insight, labels::AddressLabels},
    serde::{Deserialize, Serialize},
    solana_clock::Slot,
    std::collections::BTreeMap,
};

pub const DEFAULT_TOP_ACCOUNTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramCompute {
    pub program_address: String,
    pub program_label: String,
    pub compute_units: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformativeAccount {
    pub address: String,
    pub address_label: String,
    pub compute_units: u64,
    pub associated_programs: Vec<String>,
    pub token_tags: Vec<String>,
}

///
/// Canonical per-block record handed to the publish collaborator.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub slot: Slot,
    pub programs_compute_units: Vec<ProgramCompute>,
    pub informative_accounts: Vec<InformativeAccount>,
    pub address_to_label_map: BTreeMap<String, String>,
    pub max_compute_units: u64,
    pub insights: Vec<Insight>,
}

///
/// Result of [`build_payload`]. A block without any program invocation yields [`BuildOutcome::NoData`]
/// instead of a payload with empty arrays.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Payload(Box<Payload>),
    NoData { slot: Slot },
}

impl BuildOutcome {
    pub fn slot(&self) -> Slot {
        match self {
            BuildOutcome::Payload(payload) => payload.slot,
            BuildOutcome::NoData { slot } => *slot,
        }
    }

    pub fn into_payload(self) -> Option<Payload> {
        match self {
            BuildOutcome::Payload(payload) => Some(*payload),
            BuildOutcome::NoData { .. } => None,
        }
    }
}

pub fn build_payload(
    slot: Slot,
    attribution: &BlockAttribution,
    insights: Vec<Insight>,
    labels: &AddressLabels,
    top_accounts: usize,
) -> BuildOutcome {
    if attribution.is_empty() {
        return BuildOutcome::NoData { slot };
    }

    let mut address_to_label_map = BTreeMap::new();

    let programs_compute_units = attribution
        .program_compute()
        .ranked(usize::MAX)
        .into_iter()
        .map(|(program_address, compute_units)| {
            let program_label = labels.label(&program_address).to_owned();
            address_to_label_map.insert(program_address.clone(), program_label.clone());
            ProgramCompute {
                program_address,
                program_label,
                compute_units,
            }
        })
        .collect();

    let informative_accounts = attribution
        .account_compute()
        .ranked(top_accounts)
        .into_iter()
        .map(|(address, compute_units)| {
            let address_label = labels.label(&address).to_owned();
            address_to_label_map.insert(address.clone(), address_label.clone());
            let associated_programs = attribution
                .associated_programs(&address)
                .map(|programs| programs.iter().cloned().collect())
                .unwrap_or_default();
            let token_tags = attribution
                .token_tags(&address)
                .map(|mints| mints.iter().cloned().collect())
                .unwrap_or_default();
            InformativeAccount {
                address,
                address_label,
                compute_units,
                associated_programs,
                token_tags,
            }
        })
        .collect();

    BuildOutcome::Payload(Box::new(Payload {
        slot,
        programs_compute_units,
        informative_accounts,
        address_to_label_map,
        max_compute_units: attribution.max_account_compute(),
        insights,
    }))
}
