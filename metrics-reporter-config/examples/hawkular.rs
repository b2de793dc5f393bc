//! Loads a reporter configuration file and starts every configured reporter.
//!
//! Usage: cargo run --example hawkular -- --file reporters.yaml

use std::env;

use metrics_reporter_config::model::ReporterConfig;
use opentelemetry::metrics::MeterProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args[1] != "--file" {
        println!("Usage: cargo run --example hawkular -- --file reporters.yaml");
        return Ok(());
    }

    let mut config = ReporterConfig::load_from_file(&args[2])?;
    if !config.enable_all(SdkMeterProvider::builder) {
        println!("No reporter could be enabled.");
        return Ok(());
    }

    for reporter in config.hawkular().iter().filter_map(|c| c.reporter()) {
        println!("Reporter enabled: {:?}", reporter);
        if let Some(provider) = reporter.meter_provider() {
            let counter = provider.meter("example").u64_counter("example.runs").build();
            counter.add(1, &[]);
        }
    }

    config.report_all();
    Ok(())
}
