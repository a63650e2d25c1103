use motorlot_services::SweepReport;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// One-line human summary of a sweep.
pub fn summarize(report: &SweepReport, dry_run: bool) -> String {
    let verb = if dry_run { "would repair" } else { "repaired" };
    let mut line = format!(
        "scanned {}, invalid {}, {} {} ({} placeholders)",
        report.scanned, report.invalid, verb, report.repaired, report.placeholders
    );
    if report.failed > 0 {
        line.push_str(&format!(", {} failed", report.failed));
    }
    line
}
