//! CLI entry point: drives the HRV signal pipeline over stdin/stdout
//! line-delimited JSON.
//!
//! Usage: `beagle-hrv < samples.jsonl > steps.jsonl`

use std::io::{stdin, stdout, BufReader};

use beagle_hrv_signal::sink::{JsonLinesEmissionSink, JsonLinesInputSink};
use beagle_hrv_signal::Pipeline;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = beagle_hrv_config::load()?;
    info!(?config, "starting HRV signal pipeline");

    let stdin = stdin();
    let mut input = JsonLinesInputSink::new(BufReader::new(stdin.lock()));

    let stdout = stdout();
    let mut sink = JsonLinesEmissionSink::new(stdout.lock());
    sink.write_header(&config.schema_version)?;

    let mut pipeline = Pipeline::new(config);
    pipeline.run(&mut input, &mut sink);

    if let Some(rupture) = pipeline.check_rupture() {
        info!(pattern = %rupture.pattern, transitions = rupture.transition_count, "rupture oscillation detected at session end");
    }

    Ok(())
}
