//! `ipset`: range algebra over addresses given on the command line.

use std::fmt::Write;

use rackdhcp_core::ipset::{AddressRange, AddressSet, RangeReport, SetBound, StatisticsReport};
use tabled::Tabled;

use crate::cli::{GlobalOpts, IpsetArgs, IpsetCommand, IpsetInput};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RangeRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Purpose")]
    purpose: String,
}

impl From<&RangeReport> for RangeRow {
    fn from(r: &RangeReport) -> Self {
        Self {
            start: r.start.to_string(),
            end: r.end.to_string(),
            size: r.num_addresses.to_string(),
            purpose: r.purpose.join(", "),
        }
    }
}

fn stats_detail(report: &StatisticsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Family:            {}", report.ip_version);
    let _ = writeln!(
        out,
        "Range:             {} - {}",
        report.first_address, report.last_address
    );
    let _ = writeln!(out, "Total addresses:   {}", report.total_addresses);
    let _ = writeln!(
        out,
        "Available:         {} ({})",
        report.num_available, report.available_string
    );
    let _ = writeln!(
        out,
        "Used:              {} ({})",
        report.num_unavailable, report.usage_string
    );
    let _ = write!(out, "Largest free:      {}", report.largest_available);
    if let Some(ref s) = report.suggestions {
        if let Some(gw) = s.suggested_gateway {
            let _ = write!(out, "\nSuggested gateway: {gw}");
        }
        if let Some(ref r) = s.suggested_dynamic_range {
            let _ = write!(out, "\nSuggested dynamic: {} - {}", r.start, r.end);
        }
    }
    if let Some(ref ranges) = report.ranges {
        let rows: Vec<RangeRow> = ranges.iter().map(RangeRow::from).collect();
        let _ = write!(out, "\n{}", output::render_table(&rows));
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

fn parse(input: &IpsetInput) -> Result<(AddressSet, SetBound), CliError> {
    let bound: SetBound = input.bound.parse()?;
    let ranges = input
        .ranges
        .iter()
        .map(|r| r.parse::<AddressRange>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok((AddressSet::new(ranges)?, bound))
}

fn render_ranges(set: &AddressSet, global: &GlobalOpts) -> Result<String, CliError> {
    let reports: Vec<RangeReport> = set.iter().map(RangeReport::from).collect();
    output::render_list(&global.output, &reports, RangeRow::from, |r| {
        if r.start == r.end {
            r.start.to_string()
        } else {
            format!("{}-{}", r.start, r.end)
        }
    })
}

pub fn handle(args: IpsetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        IpsetCommand::Stats { input, ranges } => {
            let (set, bound) = parse(&input)?;
            let report = set.statistics(&bound)?.report(ranges, true);
            output::render_single(&global.output, &report, stats_detail, |r| {
                r.usage_string.clone()
            })?
        }
        IpsetCommand::Unused { input } => {
            let (set, bound) = parse(&input)?;
            render_ranges(&set.get_unused_ranges(&bound)?, global)?
        }
        IpsetCommand::Full { input } => {
            let (set, bound) = parse(&input)?;
            render_ranges(&set.get_full_range(&bound)?, global)?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
