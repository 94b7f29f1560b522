//! `monitor`: run the loops and print a line per snapshot until interrupted

use anyhow::Result;
use warden_lib::Orchestrator;

use crate::output::{print_info, print_warning, OutputFormat};

/// Runs until Ctrl-C; transient failures only show up in the summaries
pub async fn run(orchestrator: &Orchestrator, format: OutputFormat) -> Result<bool> {
    let mut snapshots = orchestrator.monitor().subscribe();
    orchestrator.start().await;

    if let OutputFormat::Table = format {
        print_info(&format!(
            "Monitoring {} every {}s, press Ctrl-C to stop",
            orchestrator.config().environment,
            orchestrator.config().monitor.interval_secs
        ));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal?;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    print_warning("Health monitor stopped unexpectedly");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    match format {
                        OutputFormat::Json => println!("{}", serde_json::to_string(&snapshot)?),
                        OutputFormat::Table => println!("{}", snapshot.summary_line()),
                    }
                }
            }
        }
    }

    orchestrator.stop("interrupted").await;
    if let OutputFormat::Table = format {
        print_info("Monitoring stopped");
    }
    Ok(true)
}
