// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use booking_engine_rs::{
    FixedVerdictGateway, Ledger, PayerId, PaymentVerdict, Reservation, ReservationCoordinator,
    ReservationId, Resource, ResourceId, ResourceKind, ResourcePool, SystemClock,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Booking Engine - Process reservation command CSV files
///
/// Loads a resource catalog, replays reservation commands against one pool,
/// and outputs the final reservation ledger to stdout.
#[derive(Parser, Debug)]
#[command(name = "booking-engine-rs")]
#[command(about = "A reservation engine that processes booking command CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with the resource catalog
    ///
    /// Expected format: id,kind,price
    #[arg(long, value_name = "FILE")]
    catalog: PathBuf,

    /// Path to CSV file with booking commands
    ///
    /// Expected format: op,payer,resources,amount,verdict,reservation
    /// Example: cargo run -- --catalog seats.csv commands.csv > ledger.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Hold timeout in seconds before an unconfirmed hold is reclaimed
    #[arg(long, default_value_t = 300)]
    hold_timeout_secs: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    let catalog_file = match File::open(&args.catalog) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening catalog '{}': {}", args.catalog.display(), e);
            process::exit(1);
        }
    };

    let resources = match load_catalog(BufReader::new(catalog_file)) {
        Ok(resources) => resources,
        Err(e) => {
            eprintln!("Error reading catalog: {}", e);
            process::exit(1);
        }
    };

    let pool = Arc::new(ResourcePool::new(
        resources,
        Duration::from_secs(args.hold_timeout_secs),
    ));
    let coordinator =
        ReservationCoordinator::new(pool, Arc::new(Ledger::new()), Arc::new(SystemClock));

    let input_file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Replay booking commands from CSV
    if let Err(e) = process_commands(&coordinator, BufReader::new(input_file)) {
        eprintln!("Error processing commands: {}", e);
        process::exit(1);
    }

    // Write the ledger to stdout
    if let Err(e) = write_ledger(&coordinator, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw catalog record.
///
/// Fields: `id, kind, price`
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: u32,
    kind: String,
    price: Decimal,
}

impl CatalogRecord {
    /// Converts a catalog record into a Resource.
    ///
    /// Returns `None` for unknown kinds.
    fn into_resource(self) -> Option<Resource> {
        let kind = match self.kind.to_lowercase().as_str() {
            "standard" => ResourceKind::Standard,
            "premium" => ResourceKind::Premium,
            "accessible" => ResourceKind::Accessible,
            _ => return None,
        };
        Some(Resource::new(ResourceId(self.id), kind, self.price))
    }
}

/// Raw command record matching the input format.
///
/// Fields: `op, payer, resources, amount, verdict, reservation`
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    payer: Option<u16>,
    resources: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    verdict: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    reservation: Option<u64>,
}

/// A parsed booking command.
#[derive(Debug)]
enum Command {
    Reserve {
        payer: PayerId,
        resource_ids: BTreeSet<ResourceId>,
        amount: Option<Decimal>,
        verdict: PaymentVerdict,
    },
    Cancel {
        id: ReservationId,
    },
}

impl CommandRecord {
    /// Converts a CSV record into a Command.
    ///
    /// Returns `None` for invalid operations or missing required fields.
    fn into_command(self) -> Option<Command> {
        match self.op.to_lowercase().as_str() {
            "reserve" => {
                let payer = PayerId(self.payer?);
                let resource_ids = self
                    .resources?
                    .split(';')
                    .map(|raw| raw.trim().parse::<u32>().map(ResourceId))
                    .collect::<Result<BTreeSet<_>, _>>()
                    .ok()?;
                // A scripted verdict drives the stand-in gateway; missing
                // means approve.
                let verdict = match self.verdict.as_deref().map(str::trim) {
                    Some("failed") => PaymentVerdict::Failed,
                    Some("success") | Some("") | None => PaymentVerdict::Success,
                    Some(_) => return None,
                };
                Some(Command::Reserve {
                    payer,
                    resource_ids,
                    amount: self.amount,
                    verdict,
                })
            }
            "cancel" => Some(Command::Cancel {
                id: ReservationId(self.reservation?),
            }),
            _ => None,
        }
    }
}

/// Loads the resource catalog from a CSV reader.
///
/// # CSV Format
///
/// Expected columns: `id, kind, price`
/// - `id`: Resource ID (u32)
/// - `kind`: standard, premium, or accessible
/// - `price`: Decimal catalog price
///
/// Rows with unknown kinds are silently skipped.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn load_catalog<R: Read>(reader: R) -> Result<Vec<Resource>, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let mut resources = Vec::new();
    for result in rdr.deserialize::<CatalogRecord>() {
        match result {
            Ok(record) => {
                if let Some(resource) = record.into_resource() {
                    resources.push(resource);
                } else {
                    debug!("skipping catalog row with unknown kind");
                }
            }
            Err(e) => {
                debug!(error = %e, "skipping malformed catalog row");
                continue;
            }
        }
    }
    Ok(resources)
}

/// Replays booking commands from a CSV reader against the coordinator.
///
/// Streaming parsing handles arbitrarily large command files without loading
/// everything into memory. Malformed rows and failed bookings are skipped;
/// failures are an expected part of replaying a command log.
///
/// # CSV Format
///
/// Expected columns: `op, payer, resources, amount, verdict, reservation`
/// - `op`: reserve or cancel
/// - `payer`: Payer ID (u16, reserve only)
/// - `resources`: semicolon-separated resource IDs (reserve only)
/// - `amount`: Decimal charge; empty means quote from catalog prices
/// - `verdict`: scripted payment outcome (success/failed, reserve only)
/// - `reservation`: Reservation ID (u64, cancel only)
///
/// # Example
///
/// ```csv
/// op,payer,resources,amount,verdict,reservation
/// reserve,1,1;2,25.00,success,
/// reserve,2,3,,failed,
/// cancel,,,,,1
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_commands<R: Read>(
    coordinator: &ReservationCoordinator,
    reader: R,
) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " reserve "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CommandRecord>() {
        match result {
            Ok(record) => {
                let Some(command) = record.into_command() else {
                    debug!("skipping invalid command record");
                    continue;
                };

                match command {
                    Command::Reserve {
                        payer,
                        resource_ids,
                        amount,
                        verdict,
                    } => {
                        // Missing amount means charge the catalog quote.
                        let amount = match amount {
                            Some(amount) => amount,
                            None => match coordinator.pool().quote(&resource_ids) {
                                Ok(quote) => quote,
                                Err(e) => {
                                    debug!(error = %e, "skipping reserve with unknown resource");
                                    continue;
                                }
                            },
                        };

                        let gateway = FixedVerdictGateway(verdict);
                        if let Err(e) =
                            coordinator.reserve(resource_ids, payer, amount, &gateway)
                        {
                            debug!(%payer, error = %e, "reserve failed");
                        }
                    }
                    Command::Cancel { id } => {
                        if !coordinator.cancel(id) {
                            debug!(%id, "cancel had no effect");
                        }
                    }
                }
            }
            Err(e) => {
                // Skip malformed rows
                debug!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(())
}

/// Write the reservation ledger to a CSV writer.
///
/// Outputs every reservation ever attempted, in ID (append) order.
///
/// # CSV Format
///
/// Columns: `id, payer, resources, amount, status`
///
/// # Example
///
/// ```csv
/// id,payer,resources,amount,status
/// 1,1,1;2,25.00,confirmed
/// 2,2,3,10.00,failed
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_ledger<W: Write>(
    coordinator: &ReservationCoordinator,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut records: Vec<Reservation> = coordinator
        .ledger()
        .reservations()
        .map(|entry| entry.clone())
        .collect();
    records.sort_by_key(Reservation::id);

    for reservation in &records {
        wtr.serialize(reservation)?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CATALOG: &str = "id,kind,price\n\
                           1,standard,10.00\n\
                           2,premium,15.00\n\
                           3,accessible,12.50\n";

    fn coordinator_from_catalog() -> ReservationCoordinator {
        let resources = load_catalog(Cursor::new(CATALOG)).unwrap();
        let pool = Arc::new(ResourcePool::new(resources, Duration::from_secs(300)));
        ReservationCoordinator::new(pool, Arc::new(Ledger::new()), Arc::new(SystemClock))
    }

    #[test]
    fn parse_catalog() {
        let resources = load_catalog(Cursor::new(CATALOG)).unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[1].kind(), ResourceKind::Premium);
    }

    #[test]
    fn catalog_skips_unknown_kind() {
        let csv = "id,kind,price\n1,standard,10.00\n2,throne,99.00\n";
        let resources = load_catalog(Cursor::new(csv)).unwrap();
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn reserve_command_confirms_reservation() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n\
                   reserve,1,1;2,25.00,success,\n";

        process_commands(&coordinator, Cursor::new(csv)).unwrap();

        let reservation = coordinator.ledger().get(ReservationId(1)).unwrap();
        assert_eq!(reservation.status(), booking_engine_rs::ReservationStatus::Confirmed);
        assert_eq!(reservation.amount(), Decimal::new(2500, 2));
    }

    #[test]
    fn missing_amount_is_quoted_from_catalog() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n\
                   reserve,1,1;3,,success,\n";

        process_commands(&coordinator, Cursor::new(csv)).unwrap();

        let reservation = coordinator.ledger().get(ReservationId(1)).unwrap();
        // 10.00 + 12.50
        assert_eq!(reservation.amount(), Decimal::new(2250, 2));
    }

    #[test]
    fn declined_verdict_records_failed_reservation() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n\
                   reserve,1,1,10.00,failed,\n\
                   reserve,2,1,10.00,success,\n";

        process_commands(&coordinator, Cursor::new(csv)).unwrap();

        let first = coordinator.ledger().get(ReservationId(1)).unwrap();
        assert_eq!(first.status(), booking_engine_rs::ReservationStatus::Failed);

        // The decline released the seat, so the second attempt succeeds.
        let second = coordinator.ledger().get(ReservationId(2)).unwrap();
        assert_eq!(second.status(), booking_engine_rs::ReservationStatus::Confirmed);
    }

    #[test]
    fn cancel_command_releases_resources() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n\
                   reserve,1,1,10.00,success,\n\
                   cancel,,,,,1\n\
                   reserve,2,1,10.00,success,\n";

        process_commands(&coordinator, Cursor::new(csv)).unwrap();

        let cancelled = coordinator.ledger().get(ReservationId(1)).unwrap();
        assert_eq!(cancelled.status(), booking_engine_rs::ReservationStatus::Cancelled);
        let rebooked = coordinator.ledger().get(ReservationId(2)).unwrap();
        assert_eq!(rebooked.status(), booking_engine_rs::ReservationStatus::Confirmed);
    }

    #[test]
    fn skip_malformed_rows() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n\
                   nonsense,row,data,here,,\n\
                   reserve,1,2,15.00,success,\n";

        process_commands(&coordinator, Cursor::new(csv)).unwrap();

        assert_eq!(coordinator.ledger().len(), 1);
    }

    #[test]
    fn parse_with_whitespace() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n reserve , 1 , 1 , 10.00 , success ,\n";

        process_commands(&coordinator, Cursor::new(csv)).unwrap();
        assert_eq!(coordinator.ledger().len(), 1);
    }

    #[test]
    fn write_ledger_to_csv() {
        let coordinator = coordinator_from_catalog();
        let csv = "op,payer,resources,amount,verdict,reservation\n\
                   reserve,1,1;2,25.00,success,\n\
                   reserve,2,3,,failed,\n";
        process_commands(&coordinator, Cursor::new(csv)).unwrap();

        let mut output = Vec::new();
        write_ledger(&coordinator, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("id,payer,resources,amount,status"));
        assert!(output_str.contains("1,1,1;2,25.00,confirmed"));
        assert!(output_str.contains("2,2,3,12.50,failed"));
    }
}
