use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use estimaro_core::condition::classify_offer;
use estimaro_core::config::AppConfig;
use estimaro_core::domain::offer::{ScoredOffer, VendorOffer};
use estimaro_core::scoring::{score_offers, VendorWeights};
use serde::{Deserialize, Serialize};

use super::CommandResult;

const COMMAND: &str = "score";

#[derive(Debug, Clone, Args)]
pub struct ScoreArgs {
    #[arg(long, help = "JSON file with `part_description`, `oem_numbers` and `offers`")]
    pub offers: PathBuf,
    #[arg(long, num_args = 3, value_names = ["BRAND", "PRICE", "DISTANCE"])]
    pub weights: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreInput {
    pub part_description: String,
    #[serde(default)]
    pub oem_numbers: Vec<String>,
    pub offers: Vec<VendorOffer>,
}

#[derive(Debug, Serialize)]
struct ScoreReport {
    weights: VendorWeights,
    ranked: Vec<ScoredOffer>,
}

pub fn read_input(path: &Path) -> Result<ScoreInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read offers file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("offers file `{}` is not valid score input", path.display()))
}

pub fn run(args: ScoreArgs, config: &AppConfig) -> CommandResult {
    let input = match read_input(&args.offers) {
        Ok(input) => input,
        Err(error) => return CommandResult::failure(COMMAND, "input", format!("{error:#}"), 3),
    };
    let weights = match args.weights.as_deref() {
        Some([brand, price, distance]) => VendorWeights::new(*brand, *price, *distance),
        _ => config.scoring.weights(),
    };

    let offers = input
        .offers
        .into_iter()
        .map(|offer| {
            let condition = classify_offer(&offer);
            (offer, condition)
        })
        .collect();

    match score_offers(&input.part_description, &input.oem_numbers, offers, &weights) {
        Ok(ranked) => {
            let message = ranked
                .first()
                .map(|top| {
                    format!(
                        "primary: {} @ {} (score {:.1})",
                        top.offer.brand, top.offer.vendor_name, top.composite_score
                    )
                })
                .unwrap_or_default();
            CommandResult::success_with_data(COMMAND, message, &ScoreReport { weights, ranked })
        }
        Err(error) => CommandResult::failure(COMMAND, error.code(), error.to_string(), 3),
    }
}
