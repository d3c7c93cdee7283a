//! # Seed Data Generator
//!
//! Populates the database with a demo station network for development.
//!
//! ## Usage
//! ```bash
//! # One business with two branches (default)
//! cargo run -p forecourt-db --bin seed
//!
//! # More branches
//! cargo run -p forecourt-db --bin seed -- --branches 5
//!
//! # Specify database path
//! cargo run -p forecourt-db --bin seed -- --db ./data/forecourt.db
//! ```
//!
//! ## Generated Topology
//! Per branch:
//! - Tanks T1 (PMG, 25,000 L) and T2 (HSD, 30,000 L)
//! - Pumps P1..P3, each with a PMG and an HSD nozzle
//! - Opening dips for today and a stock of 11.8 kg / 45.4 kg cylinders

use chrono::Utc;
use forecourt_core::{CylinderTxType, Depth, DipReadingType, LossRate, Money, Volume, Weight};
use forecourt_db::{Database, DbConfig};
use std::env;

/// (code, name, price in cents, permissible loss bps, tank capacity L)
const FUELS: &[(&str, &str, i64, u32, i64)] = &[
    ("PMG", "Premium Motor Gasoline", 27_990, 25, 25_000),
    ("HSD", "High Speed Diesel", 28_515, 20, 30_000),
];

/// (code, name, kg, filled cylinders delivered)
const CYLINDERS: &[(&str, &str, i64, i64)] = &[
    ("12KG", "Domestic 11.8 kg", 12, 85),
    ("45KG", "Commercial 45.4 kg", 45, 20),
];

const PUMPS_PER_BRANCH: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut branches: usize = 2;
    let mut db_path = String::from("./forecourt_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--branches" | "-b" => {
                if i + 1 < args.len() {
                    branches = args[i + 1].parse().unwrap_or(2);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Forecourt Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --branches <N>  Number of branches to generate (default: 2)");
                println!("  -d, --db <PATH>     Database file path (default: ./forecourt_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Forecourt Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Branches: {}", branches);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let registry = db.registry();

    let business = match registry.register_business("DEMO", "Demo Petroleum").await? {
        forecourt_core::UpsertOutcome::Created(business) => business,
        _ => {
            println!("⚠ Business DEMO already exists");
            println!("  Skipping seed to avoid duplicates.");
            println!("  Delete the database file to regenerate.");
            return Ok(());
        }
    };

    let mut fuel_types = Vec::new();
    for (code, name, price, loss, capacity) in FUELS {
        let fuel = registry
            .create_fuel_type(
                &business.id,
                code,
                name,
                Money::from_cents(*price),
                LossRate::from_bps(*loss),
            )
            .await?;
        fuel_types.push((fuel, *capacity));
    }

    let mut cylinder_types = Vec::new();
    for (code, name, kg, delivered) in CYLINDERS {
        let kind = registry
            .create_cylinder_type(&business.id, code, name, Weight::from_kg(*kg))
            .await?;
        cylinder_types.push((kind, *delivered));
    }

    println!();
    println!("Generating branches...");
    let start = std::time::Instant::now();

    for b in 1..=branches {
        let branch = registry
            .create_branch(&business.id, &format!("BR-{:02}", b), &format!("Branch {}", b), 300)
            .await?;
        let today = branch.local_date(Utc::now());

        let mut tanks = Vec::new();
        for (t, (fuel, capacity)) in fuel_types.iter().enumerate() {
            let tank = registry
                .create_tank(&branch.id, &fuel.id, &format!("T{}", t + 1), Volume::from_litres(*capacity))
                .await?;

            // tanks start two thirds full
            let stock = Volume::from_litres(capacity * 2 / 3);
            db.dips()
                .record_dip(&tank.id, today, DipReadingType::Opening, Depth::from_mm(1_850), stock)
                .await?;
            tanks.push(tank);
        }

        for p in 1..=PUMPS_PER_BRANCH {
            let pump = registry
                .create_pump(&branch.id, &format!("P{}", p), &format!("Island {}", p))
                .await?;
            for (n, tank) in tanks.iter().enumerate() {
                registry
                    .create_nozzle(
                        &pump.id,
                        &(n + 1).to_string(),
                        &tank.id,
                        &tank.fuel_type_id,
                        Volume::from_litres((p * 10_000 + n * 1_000) as i64),
                    )
                    .await?;
            }
        }

        for (kind, delivered) in &cylinder_types {
            db.cylinders()
                .apply_transaction(
                    &branch.id,
                    &kind.id,
                    CylinderTxType::Receive,
                    *delivered,
                    Some("Opening stock"),
                )
                .await?;
        }

        let shift = db.shifts().get_or_create_shift(&branch.id, today).await?;
        println!("  {} ({}): shift {} open", branch.code, branch.name, shift.id);
    }

    println!();
    println!("✓ Generated {} branches in {:?}", branches, start.elapsed());
    println!("✓ Seed complete!");

    Ok(())
}
