//! Command-line front end: build a timetable from GTFS, query it.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;

use takt_core::prelude::*;
use takt_core::storage::{
    read_stops_file, read_timetable_file, write_stops_file, write_timetable_file,
};

const TIMETABLE_FILE: &str = "timetable.bin";
const STOPS_FILE: &str = "stops.bin";

#[derive(Parser)]
#[command(name = "takt", about = "Round-based public transit journey planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a GTFS directory for one service day and write the binary stores.
    Build {
        /// Directory containing the GTFS CSV files.
        #[arg(long)]
        gtfs: PathBuf,
        /// Service day to materialize, e.g. 2024-06-03.
        #[arg(long)]
        date: NaiveDate,
        /// Output directory for the stores.
        #[arg(long)]
        out: PathBuf,
    },
    /// Query a built timetable for the best journey.
    Route {
        /// Directory holding the binary stores written by `build`.
        #[arg(long)]
        data: PathBuf,
        /// Origin stop id.
        #[arg(long)]
        from: String,
        /// Destination stop id; repeat for alternatives.
        #[arg(long, required = true)]
        to: Vec<String>,
        /// Departure time, HH:MM or HH:MM:SS.
        #[arg(long)]
        at: String,
        #[arg(long, default_value_t = 5)]
        max_transfers: usize,
        /// Default footpath cost in seconds.
        #[arg(long, default_value_t = 120)]
        min_transfer_time: u32,
        /// Restrict to vehicle kinds, e.g. rail,bus; all when absent.
        #[arg(long, value_delimiter = ',')]
        modes: Vec<String>,
        /// Emit the journey as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::init();
    if let Err(error) = run(Cli::parse()) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Build { gtfs, date, out } => build(gtfs, date, out),
        Command::Route {
            data,
            from,
            to,
            at,
            max_transfers,
            min_transfer_time,
            modes,
            json,
        } => route(data, from, to, &at, max_transfers, min_transfer_time, &modes, json),
    }
}

fn build(gtfs: PathBuf, date: NaiveDate, out: PathBuf) -> anyhow::Result<()> {
    let config = GtfsLoadConfig {
        gtfs_dir: gtfs,
        date,
    };
    let (stops, timetable) =
        timetable_from_gtfs(&config).context("failed to build the timetable")?;

    std::fs::create_dir_all(&out)
        .with_context(|| format!("cannot create {}", out.display()))?;
    write_stops_file(&stops, &out.join(STOPS_FILE))?;
    write_timetable_file(&timetable, &out.join(TIMETABLE_FILE))?;
    info!("model for {date} written to {}", out.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn route(
    data: PathBuf,
    from: String,
    to: Vec<String>,
    at: &str,
    max_transfers: usize,
    min_transfer_time: u32,
    modes: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let stops = read_stops_file(&data.join(STOPS_FILE))?;
    let timetable = read_timetable_file(&data.join(TIMETABLE_FILE))?;

    let departure_time: Time = at.parse::<Time>()?;
    let mut builder = Query::builder()
        .from(from)
        .to_all(to)
        .departure_time(departure_time)
        .max_transfers(max_transfers)
        .min_transfer_time(Duration::from_seconds(min_transfer_time));
    if !modes.is_empty() {
        let modes = modes
            .iter()
            .map(|name| parse_mode(name))
            .collect::<anyhow::Result<Vec<_>>>()?;
        builder = builder.allowed_modes(modes);
    }
    let query = builder.build();

    let result = Router::new(&timetable, &stops).route(&query);
    match result.best_journey() {
        Some(journey) if json => println!(
            "{}",
            serde_json::to_string_pretty(&journey_json(&journey, &stops, &timetable))?
        ),
        Some(journey) => print_journey(&journey, &stops, &timetable),
        None => println!("no journey found"),
    }
    Ok(())
}

fn parse_mode(name: &str) -> anyhow::Result<RouteType> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "tram" => RouteType::Tram,
        "subway" => RouteType::Subway,
        "rail" => RouteType::Rail,
        "bus" => RouteType::Bus,
        "ferry" => RouteType::Ferry,
        "cable-tram" => RouteType::CableTram,
        "aerial-lift" => RouteType::AerialLift,
        "funicular" => RouteType::Funicular,
        "trolleybus" => RouteType::Trolleybus,
        "monorail" => RouteType::Monorail,
        other => bail!("unknown mode '{other}'"),
    })
}

fn stop_label(stops: &Stops, id: StopId) -> String {
    match stops.by_internal_id(id) {
        Some(stop) if stop.name != stop.external_id => {
            format!("{} ({})", stop.name, stop.external_id)
        }
        Some(stop) => stop.external_id.clone(),
        None => format!("#{id}"),
    }
}

fn print_journey(journey: &Journey, stops: &Stops, timetable: &Timetable) {
    println!(
        "{} -> {}, {} leg(s)",
        journey.departure_time(),
        journey.arrival_time(),
        journey.legs().len()
    );
    for leg in journey.legs() {
        match leg {
            Leg::Vehicle {
                from,
                to,
                service_line,
                departure_time,
                arrival_time,
            } => {
                let line = timetable.service_line(*service_line);
                println!(
                    "  {departure_time}  {}  [{} {:?}]  {arrival_time}  {}",
                    stop_label(stops, *from),
                    line.name,
                    line.kind,
                    stop_label(stops, *to),
                );
            }
            Leg::Transfer {
                from,
                to,
                kind,
                min_transfer_time,
            } => {
                let cost = min_transfer_time
                    .map(|d| format!("{d}"))
                    .unwrap_or_else(|| "default".to_string());
                println!(
                    "  walk  {}  ->  {}  ({kind:?}, {cost})",
                    stop_label(stops, *from),
                    stop_label(stops, *to),
                );
            }
        }
    }
}

fn journey_json(journey: &Journey, stops: &Stops, timetable: &Timetable) -> serde_json::Value {
    let legs: Vec<serde_json::Value> = journey
        .legs()
        .iter()
        .map(|leg| match leg {
            Leg::Vehicle {
                from,
                to,
                service_line,
                departure_time,
                arrival_time,
            } => {
                let line = timetable.service_line(*service_line);
                json!({
                    "kind": "vehicle",
                    "from": stop_json(stops, *from),
                    "to": stop_json(stops, *to),
                    "line": { "name": line.name, "type": format!("{:?}", line.kind) },
                    "departure_time": departure_time,
                    "arrival_time": arrival_time,
                })
            }
            Leg::Transfer {
                from,
                to,
                kind,
                min_transfer_time,
            } => json!({
                "kind": "transfer",
                "from": stop_json(stops, *from),
                "to": stop_json(stops, *to),
                "type": format!("{kind:?}"),
                "min_transfer_time": min_transfer_time.map(|d| d.seconds()),
            }),
        })
        .collect();

    json!({
        "departure_time": journey.departure_time(),
        "arrival_time": journey.arrival_time(),
        "legs": legs,
    })
}

fn stop_json(stops: &Stops, id: StopId) -> serde_json::Value {
    match stops.by_internal_id(id) {
        Some(stop) => json!({ "id": stop.external_id, "name": stop.name }),
        None => json!({ "id": id.to_string() }),
    }
}
