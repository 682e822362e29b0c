// Entry point and high-level CLI flow.
//
// - With `--month` the tool loads the files, renders one scope and exports it.
// - Without it, a menu lets the user reload files, pick scopes and export the
//   last view. Reloading unchanged files is served from the session's memo
//   table, so scope changes stay cheap.
mod aggregate;
mod categorize;
mod dashboard;
mod error;
mod gate;
mod join;
mod loader;
mod output;
mod pipeline;
mod schema;
mod settings;
mod sheet;
mod types;
mod util;

use anyhow::Context;
use clap::Parser;
use dashboard::{detail_rows, ScopeView};
use gate::AccessGate;
use pipeline::{Dataset, Session};
use settings::Settings;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use types::{Period, Scope};

/// Initialise the global `tracing` subscriber on stderr.
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

/// Read one trimmed line. `None` once the input is closed.
fn next_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Print a prompt and read one trimmed line from stdin.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    next_line(&mut io::stdin().lock())
}

fn read_choice() -> Option<String> {
    read_line("Enter choice: ")
}

/// Run the shared-secret prompt. Returns `false` when access is refused.
fn pass_gate(gate: &AccessGate) -> bool {
    if !gate.requires_secret() {
        return true;
    }
    for _ in 0..3 {
        let Some(entered) = read_line("Access password: ") else {
            return false;
        };
        if gate.check(&entered) {
            return true;
        }
        println!("Incorrect password.\n");
    }
    false
}

fn read_file(path: &std::path::Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load (or fetch from the memo table) the dataset named by `settings`.
fn handle_load(session: &mut Session, settings: &Settings) -> Option<Arc<Dataset>> {
    let bytes = match read_file(&settings.report) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{:#}\n", e);
            return None;
        }
    };
    let master = match settings.master.as_deref().map(read_file).transpose() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{:#}\n", e);
            return None;
        }
    };

    match session.load(&bytes, master.as_deref()) {
        Ok(ds) => {
            let load = ds.load_report();
            println!(
                "Processing report... ({} rows read, {} kept, unit column '{}')",
                util::format_int(load.total_rows),
                util::format_int(load.kept_rows),
                ds.unit_column()
            );
            if !load.dropped_columns.is_empty() {
                println!("Ignored layout columns: {}", load.dropped_columns.join(", "));
            }
            if load.dropped_bad_dates > 0 {
                println!(
                    "Note: {} rows dropped for unreadable dates.",
                    util::format_int(load.dropped_bad_dates)
                );
            }
            if load.revenue_defaulted + load.distance_defaulted > 0 {
                println!(
                    "Note: {} revenue and {} distance values counted as 0.",
                    util::format_int(load.revenue_defaulted),
                    util::format_int(load.distance_defaulted)
                );
            }
            if let Dataset::Joined { table, .. } = ds.as_ref() {
                println!(
                    "Joined with master: {} rows classified, {} rows without a master entry excluded.",
                    util::format_int(table.records.len()),
                    util::format_int(table.excluded_rows)
                );
            }
            println!();
            Some(ds)
        }
        Err(e) => {
            eprintln!("Error: {}\n", e);
            None
        }
    }
}

/// Ask for a month and a group selection from the options present in `ds`.
fn prompt_scope(ds: &Dataset) -> Option<Scope> {
    let periods = ds.periods();
    let groups = ds.groups();
    if periods.is_empty() || groups.is_empty() {
        println!("No rows with valid dates in this report.\n");
        return None;
    }

    println!("Months:");
    for (i, p) in periods.iter().enumerate() {
        println!("[{}] {}", i + 1, p);
    }
    let period: Period = *pick_one(&periods)?;

    let label = if ds.is_joined() { "Classifications" } else { "Business units" };
    println!("{}:", label);
    for (i, g) in groups.iter().enumerate() {
        println!("[{}] {}", i + 1, g);
    }
    let selection: Vec<String> = if ds.is_joined() {
        let raw = read_line("Enter choices (comma separated): ")?;
        raw.split(',')
            .filter_map(|s| s.trim().parse::<usize>().ok())
            .filter_map(|i| i.checked_sub(1).and_then(|i| groups.get(i)).cloned())
            .collect()
    } else {
        vec![pick_one(&groups)?.clone()]
    };

    match ds.scope(period, &selection) {
        Ok(scope) => Some(scope),
        Err(e) => {
            println!("{}\n", e);
            None
        }
    }
}

fn pick_one<T>(items: &[T]) -> Option<&T> {
    let choice = read_choice()?.parse::<usize>().ok()?;
    let item = choice.checked_sub(1).and_then(|i| items.get(i));
    if item.is_none() {
        println!("Invalid choice.\n");
    }
    item
}

/// Print headline totals, distributions and the detail table for a view.
fn render_view(view: &ScopeView, preview_rows: usize) {
    let report = match view {
        ScopeView::NoData(warning) => {
            println!("{}\n", warning);
            return;
        }
        ScopeView::Ready(report) => report,
    };

    println!("Monthly summary: {}\n", report.scope);
    println!("Total revenue:          $ {}", util::format_number(report.totals.revenue, 0));
    println!("Trips recorded:         {}", util::format_int(report.totals.rows));
    println!("Active units:           {}", util::format_int(report.totals.active_units));
    println!(
        "Avg revenue per unit:   $ {}\n",
        util::format_number(report.totals.avg_revenue_per_unit, 0)
    );

    let dist = &report.distribution;
    for (title, bins) in [
        ("Units by trip range", &dist.trips),
        ("Units by revenue range", &dist.revenue),
        ("Units by km range", &dist.distance),
    ] {
        let parts: Vec<String> = bins.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        println!("{:<24}{}", title, parts.join(" | "));
    }

    output::preview_table(
        "Detail per unit",
        Some("[critical] / [warning] / [good] mark each metric's band"),
        &detail_rows(report),
        preview_rows,
    );
}

fn handle_export(ds: &Dataset, view: &ScopeView, settings: &Settings, audit_unit: Option<&str>) {
    let (Some(bundle), ScopeView::Ready(report)) = (ds.export(view, audit_unit), view) else {
        println!("Nothing to export for an empty selection.\n");
        return;
    };
    if let Some((unit, rows)) = &bundle.audit_for_unit {
        output::preview_table(
            &format!("Audit rows for {}", unit),
            None,
            rows,
            settings.preview_rows,
        );
    }
    match output::write_bundle(&settings.out_dir, &bundle, report) {
        Ok(paths) => {
            for p in paths {
                println!("(Exported {})", p.display());
            }
            println!();
        }
        Err(e) => eprintln!("Write error: {}\n", e),
    }
}

fn run_batch(session: &mut Session, settings: &Settings, period: Period) -> anyhow::Result<()> {
    let ds = handle_load(session, settings).context("report could not be loaded")?;
    let scope = ds.scope(period, &settings.groups)?;
    let view = ds.view(&scope);
    render_view(&view, settings.preview_rows);
    handle_export(&ds, &view, settings, settings.audit_unit.as_deref());
    Ok(())
}

fn run_menu(session: &mut Session, settings: &Settings) {
    let mut dataset = handle_load(session, settings);
    let mut last_view: Option<ScopeView> = None;

    loop {
        println!("Select an option:");
        println!("[1] Load the files");
        println!("[2] View KPIs for a month");
        println!("[3] Export last view");
        println!("[4] Exit\n");
        let Some(choice) = read_choice() else {
            println!("\nInput closed, exiting.");
            break;
        };
        match choice.as_str() {
            "1" => {
                dataset = handle_load(session, settings);
                last_view = None;
            }
            "2" => {
                let Some(ds) = dataset.as_ref() else {
                    println!("Error: No data loaded. Please load the files first (option 1).\n");
                    continue;
                };
                if let Some(scope) = prompt_scope(ds) {
                    let view = ds.view(&scope);
                    render_view(&view, settings.preview_rows);
                    last_view = Some(view);
                }
            }
            "3" => match (dataset.as_ref(), last_view.as_ref()) {
                (Some(ds), Some(view)) => {
                    let unit = if ds.is_joined() {
                        read_line("Unit for the audit table (blank to skip): ")
                            .filter(|u| !u.is_empty())
                    } else {
                        None
                    };
                    handle_export(ds, view, settings, unit.as_deref());
                }
                _ => println!("Error: View KPIs first (option 2).\n"),
            },
            "4" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-4.\n"),
        }
    }
    tracing::debug!(
        hits = session.cache().hits(),
        misses = session.cache().misses(),
        entries = session.cache().len(),
        "session cache stats"
    );
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    setup_logging(&settings.log_level);
    tracing::info!("fleet_kpi v{} starting", env!("CARGO_PKG_VERSION"));

    let gate = AccessGate::new(settings.access_secret.as_deref());
    if !pass_gate(&gate) {
        anyhow::bail!("access denied");
    }

    let mut session = Session::new(settings.load_options());
    match settings.month {
        Some(period) => run_batch(&mut session, &settings, period),
        None => {
            run_menu(&mut session, &settings);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_next_line_trims_and_stops_at_eof() {
        let mut input = Cursor::new("  2 \n\n");
        assert_eq!(next_line(&mut input).as_deref(), Some("2"));
        assert_eq!(next_line(&mut input).as_deref(), Some(""));
        assert_eq!(next_line(&mut input), None);
        assert_eq!(next_line(&mut input), None);
    }
}
