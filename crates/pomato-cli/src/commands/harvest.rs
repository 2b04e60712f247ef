use chrono::NaiveDate;
use clap::Subcommand;
use pomato_core::{today, HarvestStore};

const TOMATO: &str = "\u{1f345}";

#[derive(Subcommand)]
pub enum HarvestAction {
    /// Today's completed sessions
    Today {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count for one calendar day
    Show {
        /// Day to inspect (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Days with completed sessions in a recent window
    Recent {
        /// Window size in days, today included
        #[arg(long, default_value = "7")]
        days: u32,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: HarvestAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = HarvestStore::open()?;

    match action {
        HarvestAction::Today { json } => print_day(&store, today(), json)?,
        HarvestAction::Show { date, json } => print_day(&store, date.unwrap_or_else(today), json)?,
        HarvestAction::Recent { days, json } => {
            let rows = store.recent(days)?;
            if json {
                let entries: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|(day, count)| {
                        serde_json::json!({ "date": day.to_string(), "count": count })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if rows.is_empty() {
                println!("no harvests in the last {days} days");
            } else {
                for (day, count) in rows {
                    println!("{day}  {}", tomato_row(count));
                }
            }
        }
    }
    Ok(())
}

fn print_day(
    store: &HarvestStore,
    day: NaiveDate,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = store.count(day)?;
    if json {
        let entry = serde_json::json!({ "date": day.to_string(), "count": count });
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else if count == 0 {
        println!("{day}  no harvests");
    } else {
        println!("{day}  {}", tomato_row(count));
    }
    Ok(())
}

/// One tomato per completed session, with the number for long rows.
pub(crate) fn tomato_row(count: u32) -> String {
    if count == 0 {
        return "(0)".to_string();
    }
    format!("{} ({count})", TOMATO.repeat(count as usize))
}
