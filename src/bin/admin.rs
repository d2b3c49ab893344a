use std::collections::VecDeque;

use chrono::Utc;
use sqlx::SqlitePool;

use civic_desk::auth::hash_password;
use civic_desk::domain::{normalize_email, NewOfficer, OfficerId, Polygon, Ward, MIN_PASSWORD_CHARS};
use civic_desk::infra::{
    SlaSweepConfig, SlaSweeper, SqliteAccountStore, SqliteCatalog, SqliteComplaintStore,
    SqliteLedger,
};
use civic_desk::telemetry::{init_telemetry, TelemetryConfig};

fn print_help() {
    eprintln!(
        "\
civic-desk-admin

USAGE:
  civic-desk-admin <command> [options]

COMMANDS:
  migrate                         Run database migrations
  seed                            Load issue types, SLA rules and sample bills
  add-ward                        Create or replace a ward boundary
  register-officer                Create an officer account
  sla-sweep                       Score overdue complaints once and exit

COMMON OPTIONS:
  --database-url <sqlite_url>     (defaults to env DATABASE_URL)

add-ward OPTIONS:
  --ward-id <n>                   (required)
  --name <text>                   (required)
  --polygon <json>                (required) [[lng,lat],[lng,lat],...]

register-officer OPTIONS:
  --off-id <id>                   (required) Badge id used to log in
  --name <text>                   (required)
  --email <address>               (required)
  --ward-id <n>                   (required)
  --phone <number>                (required)
  --designation <text>            (default: Ward Officer)
  --password <secret>             (defaults to env OFFICER_PASSWORD)
"
    );
}

fn require_database_url(database_url: Option<String>) -> anyhow::Result<String> {
    database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (or pass --database-url)"))
}

fn value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn required(name: &str, value: Option<String>) -> anyhow::Result<String> {
    value.ok_or_else(|| anyhow::anyhow!("{name} is required"))
}

async fn open_pool(database_url: Option<String>) -> anyhow::Result<SqlitePool> {
    let database_url = require_database_url(database_url)?;
    let pool = civic_desk::infra::sqlite::connect(&database_url, 1).await?;
    civic_desk::migrations::run_sqlite(&pool).await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::for_cli())?;

    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    match command.as_str() {
        "migrate" | "seed" | "sla-sweep" => {
            let mut database_url: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(value(&mut args, "--database-url")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let pool = open_pool(database_url).await?;
            match command.as_str() {
                "migrate" => println!("ok: migrations applied"),
                "seed" => {
                    let report = civic_desk::seed::seed_reference_data(&pool).await?;
                    println!(
                        "ok: seeded {} issue types, {} SLA rules, {} bills",
                        report.issue_types, report.sla_rules, report.bills
                    );
                }
                _ => {
                    let sweeper = SlaSweeper::new(
                        SlaSweepConfig::default(),
                        SqliteComplaintStore::new(pool.clone()).into(),
                        SqliteCatalog::new(pool.clone()).into(),
                        SqliteLedger::new(pool.clone()).into(),
                    );
                    let report = sweeper.run_once(Utc::now()).await?;
                    println!(
                        "ok: examined {}, scored {}, skipped (no SLA rule) {}",
                        report.examined, report.scored, report.skipped_no_rule
                    );
                }
            }
            Ok(())
        }
        "add-ward" => {
            let mut database_url: Option<String> = None;
            let mut ward_id: Option<i64> = None;
            let mut name: Option<String> = None;
            let mut polygon: Option<Polygon> = None;

            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(value(&mut args, "--database-url")?),
                    "--ward-id" => ward_id = Some(value(&mut args, "--ward-id")?.parse()?),
                    "--name" => name = Some(value(&mut args, "--name")?),
                    "--polygon" => {
                        let raw = value(&mut args, "--polygon")?;
                        let ring: Polygon = serde_json::from_str(&raw)
                            .map_err(|e| anyhow::anyhow!("invalid --polygon: {e}"))?;
                        if ring.0.len() < 3 {
                            anyhow::bail!("--polygon needs at least 3 vertices");
                        }
                        polygon = Some(ring);
                    }
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let ward = Ward {
                ward_id: ward_id.ok_or_else(|| anyhow::anyhow!("--ward-id is required"))?,
                name: required("--name", name)?,
                polygon: polygon.ok_or_else(|| anyhow::anyhow!("--polygon is required"))?,
            };
            let pool = open_pool(database_url).await?;
            SqliteCatalog::new(pool).upsert_ward(&ward).await?;
            println!("ok: ward {} ({}) saved", ward.ward_id, ward.name);
            Ok(())
        }
        "register-officer" => {
            let mut database_url: Option<String> = None;
            let mut off_id: Option<String> = None;
            let mut name: Option<String> = None;
            let mut email: Option<String> = None;
            let mut ward_id: Option<i64> = None;
            let mut phone: Option<String> = None;
            let mut designation = "Ward Officer".to_string();
            let mut password: Option<String> = std::env::var("OFFICER_PASSWORD").ok();

            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => database_url = Some(value(&mut args, "--database-url")?),
                    "--off-id" => off_id = Some(value(&mut args, "--off-id")?),
                    "--name" => name = Some(value(&mut args, "--name")?),
                    "--email" => email = Some(value(&mut args, "--email")?),
                    "--ward-id" => ward_id = Some(value(&mut args, "--ward-id")?.parse()?),
                    "--phone" => phone = Some(value(&mut args, "--phone")?),
                    "--designation" => designation = value(&mut args, "--designation")?,
                    "--password" => password = Some(value(&mut args, "--password")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let password = required("--password (or OFFICER_PASSWORD)", password)?;
            if password.chars().count() < MIN_PASSWORD_CHARS {
                anyhow::bail!("password must be at least {MIN_PASSWORD_CHARS} characters");
            }
            let officer = NewOfficer {
                off_id: OfficerId::new(required("--off-id", off_id)?),
                name: required("--name", name)?,
                email: normalize_email(&required("--email", email)?),
                ward_id: ward_id.ok_or_else(|| anyhow::anyhow!("--ward-id is required"))?,
                phone_number: required("--phone", phone)?,
                designation,
            };

            let hash = hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            let pool = open_pool(database_url).await?;
            SqliteAccountStore::new(pool)
                .create_officer(&officer, &hash)
                .await?;
            println!("ok: officer {} registered for ward {}", officer.off_id, officer.ward_id);
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
