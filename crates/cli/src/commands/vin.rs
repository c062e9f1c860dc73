use estimaro_core::collaborators::VehicleDecoder;
use estimaro_core::config::AppConfig;
use estimaro_core::fixtures::InMemoryVehicleDecoder;
use estimaro_core::integrations::NhtsaClient;
use estimaro_core::domain::vehicle::VehicleIdentity;
use estimaro_core::vin::{compute_check_digit, Vin, CHECK_DIGIT_INDEX};
use serde::Serialize;

use super::{runtime, CommandResult};

const COMMAND: &str = "vin";

#[derive(Debug, Serialize)]
struct VinReport {
    vin: String,
    world_manufacturer_identifier: String,
    check_digit: char,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    decoded: Vec<String>,
}

pub fn run(raw: &str, decode: bool, live: bool, config: &AppConfig) -> CommandResult {
    let vin = match Vin::parse(raw) {
        Ok(vin) => vin,
        Err(error) => {
            let hint = compute_check_digit(&raw.trim().to_ascii_uppercase())
                .map(|expected| format!(" (check digit should be `{expected}`)"))
                .unwrap_or_default();
            return CommandResult::failure(COMMAND, error.code(), format!("{error}{hint}"), 3);
        }
    };

    let mut report = VinReport {
        vin: vin.to_string(),
        world_manufacturer_identifier: vin.world_manufacturer_identifier().to_owned(),
        check_digit: vin.as_str().chars().nth(CHECK_DIGIT_INDEX).unwrap_or('?'),
        decoded: Vec::new(),
    };

    if decode || live {
        let runtime = match runtime(COMMAND) {
            Ok(runtime) => runtime,
            Err(result) => return result,
        };
        let decoded = if live {
            match NhtsaClient::new(&config.integrations) {
                Ok(client) => runtime.block_on(client.decode(&vin)),
                Err(error) => Err(error),
            }
        } else {
            runtime.block_on(InMemoryVehicleDecoder::demo().decode(&vin))
        };
        match decoded {
            Ok(variants) if variants.is_empty() => {
                return CommandResult::failure(
                    COMMAND,
                    "decode_unavailable",
                    format!("no vehicle record for {vin}"),
                    4,
                );
            }
            Ok(variants) => {
                report.decoded = variants.iter().map(VehicleIdentity::describe).collect();
            }
            Err(error) => {
                return CommandResult::failure(COMMAND, "decode_unavailable", error.to_string(), 4)
            }
        }
    }

    let message = match report.decoded.as_slice() {
        [] => format!("{vin} is a valid VIN"),
        [single] => format!("{vin} decodes to {single}"),
        many => format!("{vin} is ambiguous across {} variants", many.len()),
    };
    CommandResult::success_with_data(COMMAND, message, &report)
}
