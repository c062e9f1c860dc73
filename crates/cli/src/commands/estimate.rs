use std::sync::Arc;

use clap::Args;
use estimaro_core::classifier::KeywordJobClassifier;
use estimaro_core::collaborators::VendorSource;
use estimaro_core::config::AppConfig;
use estimaro_core::errors::EstimateError;
use estimaro_core::fixtures::{demo_collaborators, InMemoryEstimateSink};
use estimaro_core::integrations::{NhtsaClient, ScraperClient};
use estimaro_core::pipeline::{
    has_remanufactured_parts, DispatchOutcome, EstimateIntake, EstimatePipeline,
    PipelineCollaborators, PipelineResult,
};
use estimaro_core::pricing::round_cents;
use estimaro_core::scoring::VendorWeights;
use serde::Serialize;

use super::{runtime, CommandResult};

const COMMAND: &str = "estimate";

#[derive(Debug, Clone, Args)]
pub struct EstimateArgs {
    #[arg(long, help = "17-character vehicle identification number")]
    pub vin: String,
    #[arg(long = "request", help = "Customer's description of the problem or service")]
    pub service_request: String,
    #[arg(long = "name", default_value = "")]
    pub customer_name: String,
    #[arg(long = "phone", default_value = "")]
    pub customer_phone: String,
    #[arg(long = "email")]
    pub customer_email: Option<String>,
    #[arg(long)]
    pub odometer: Option<u32>,
    #[arg(
        long,
        num_args = 3,
        value_names = ["BRAND", "PRICE", "DISTANCE"],
        help = "Override vendor score weights for this run"
    )]
    pub weights: Option<Vec<f64>>,
    #[arg(long, help = "Use NHTSA and the scraper service instead of the demo catalog")]
    pub live: bool,
    #[arg(long, help = "Hand the estimate to the estimate sink when routing allows it")]
    pub dispatch: bool,
    #[arg(long, help = "Emit machine-readable JSON output")]
    pub json: bool,
}

impl EstimateArgs {
    fn intake(&self) -> EstimateIntake {
        EstimateIntake {
            vin: self.vin.clone(),
            service_request: self.service_request.clone(),
            customer_name: self.customer_name.clone(),
            customer_phone: self.customer_phone.clone(),
            customer_email: self.customer_email.clone(),
            odometer: self.odometer,
            vendor_weights: self.weights.as_deref().and_then(|weights| match weights {
                [brand, price, distance] => Some(VendorWeights::new(*brand, *price, *distance)),
                _ => None,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct EstimateReport<'a> {
    result: &'a PipelineResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatch: Option<DispatchOutcome>,
}

pub fn run(args: EstimateArgs, config: &AppConfig) -> CommandResult {
    let collaborators = if args.live {
        match live_collaborators(config) {
            Ok(collaborators) => collaborators,
            Err(result) => return result,
        }
    } else {
        demo_collaborators()
    };
    let pipeline = EstimatePipeline::new(collaborators, config.pipeline()).with_actor("cli");

    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let outcome = runtime.block_on(async {
        let result = pipeline.generate_estimate(args.intake()).await?;
        let dispatch = if args.dispatch {
            Some(pipeline.dispatch(&result, &InMemoryEstimateSink::default()).await?)
        } else {
            None
        };
        Ok::<_, EstimateError>((result, dispatch))
    });

    match outcome {
        Ok((result, dispatch)) => {
            let summary = format!(
                "{} estimate {} for {}",
                result.routing.as_str(),
                result.breakdown.grand_total,
                result.vehicle.describe()
            );
            if args.json {
                CommandResult::success_with_data(
                    COMMAND,
                    summary,
                    &EstimateReport { result: &result, dispatch },
                )
            } else {
                CommandResult { exit_code: 0, output: render_human(&result, dispatch.as_ref()) }
            }
        }
        Err(error) => {
            CommandResult::failure(COMMAND, error.code(), error.to_string(), exit_code(&error))
        }
    }
}

/// 3 for bad input the operator can fix, 4 when a data source blocked the run.
pub fn exit_code(error: &EstimateError) -> u8 {
    match error {
        EstimateError::InvalidIntake { .. }
        | EstimateError::InvalidIdentifier { .. }
        | EstimateError::InvalidWeights { .. }
        | EstimateError::InvalidEstimateInput { .. } => 3,
        _ => 4,
    }
}

fn live_collaborators(config: &AppConfig) -> Result<PipelineCollaborators, CommandResult> {
    let nhtsa = NhtsaClient::new(&config.integrations).map_err(|error| {
        CommandResult::failure(COMMAND, "integration_setup", error.to_string(), 1)
    })?;
    let scraper = ScraperClient::from_config(&config.integrations)
        .map_err(|error| {
            CommandResult::failure(COMMAND, "integration_setup", error.to_string(), 1)
        })?
        .ok_or_else(|| {
            CommandResult::failure(
                COMMAND,
                "integration_unconfigured",
                "live mode needs integrations.scraper_base_url and integrations.scraper_api_key",
                2,
            )
        })?;

    let nhtsa = Arc::new(nhtsa);
    let scraper = Arc::new(scraper);
    Ok(PipelineCollaborators {
        decoder: nhtsa.clone(),
        recalls: nhtsa,
        classifier: Arc::new(KeywordJobClassifier),
        labor: scraper.clone(),
        parts: scraper.clone(),
        vendors: vec![scraper as Arc<dyn VendorSource>],
    })
}

pub fn render_human(result: &PipelineResult, dispatch: Option<&DispatchOutcome>) -> String {
    let mut lines = vec![
        format!("estimate for {} (VIN {})", result.vehicle.describe(), result.vehicle.vin),
        format!(
            "routing: {} (confidence {:.2})",
            result.routing.as_str(),
            result.confidence_score
        ),
    ];

    if !result.compliance_flags.is_empty() {
        lines.push("compliance:".to_owned());
        for flag in &result.compliance_flags {
            lines.push(format!(
                "- [{}] {}: {} ({})",
                format!("{:?}", flag.severity).to_uppercase(),
                flag.title,
                flag.message,
                flag.recommended_action
            ));
        }
    }

    lines.push("labor:".to_owned());
    if result.labor_items.is_empty() {
        lines.push("- none resolved".to_owned());
    }
    for item in &result.labor_items {
        lines.push(format!(
            "- {} {}: {}h @ ${} = ${}",
            item.job_code,
            item.description,
            item.hours,
            item.rate,
            round_cents(item.total())
        ));
    }

    lines.push("parts:".to_owned());
    for part in &result.priced_parts {
        let tag = part.condition_tag().map(|tag| format!("{tag} ")).unwrap_or_default();
        let source = match (&part.vendor_id, &part.reason_badge) {
            (Some(vendor), _) => format!(" via {vendor}"),
            (None, Some(badge)) => format!(" ({badge})"),
            (None, None) => String::new(),
        };
        lines.push(format!(
            "- {tag}{} {} x{} @ ${}{source} = ${}",
            part.description,
            part.oem_number,
            part.quantity,
            part.vendor_cost,
            round_cents(part.line_total())
        ));
    }

    for selection in &result.selections {
        let describe = |label: &str, offer: Option<&estimaro_core::ScoredOffer>| {
            offer.map(|scored| {
                format!(
                    "{label} {} @ {} ${} score {:.1}",
                    scored.offer.brand,
                    scored.offer.vendor_name,
                    scored.offer.price,
                    scored.composite_score
                )
            })
        };
        let picks: Vec<String> =
            [describe("primary", selection.primary()), describe("backup", selection.backup())]
                .into_iter()
                .flatten()
                .collect();
        lines.push(format!("vendors for {}: {}", selection.request.description, picks.join("; ")));
    }
    for unpriced in &result.unpriced_parts {
        lines.push(format!("unpriced: {} ({})", unpriced.description, unpriced.reason));
    }

    let breakdown = &result.breakdown;
    lines.push(format!(
        "totals: labor ${} parts ${} subtotal ${} tax ${} {} ${} total ${}",
        breakdown.labor_total,
        breakdown.parts_total,
        breakdown.subtotal,
        breakdown.tax_amount,
        breakdown.cleaning_kit.name,
        breakdown.cleaning_kit.price,
        breakdown.grand_total
    ));

    if has_remanufactured_parts(result) {
        lines.push(
            "disclosure: this estimate includes remanufactured parts, tagged [REMANUFACTURED]"
                .to_owned(),
        );
    }
    for flag in &result.flags {
        lines.push(format!("flag: {flag}"));
    }
    match dispatch {
        Some(DispatchOutcome::Dispatched { record_id }) => {
            lines.push(format!("dispatched as {record_id}"))
        }
        Some(DispatchOutcome::Held { decision }) => {
            lines.push(format!("held for review ({})", decision.as_str()))
        }
        None => {}
    }

    lines.join("\n")
}
