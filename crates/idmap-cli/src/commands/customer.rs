//! Customer row commands

use clap::{Args, Subcommand};
use idmap_core::model::{Customer, FieldValue, Filter};
use idmap_store::fixtures::{add_customer, delete_customer};
use idmap_store::Database;

#[derive(Debug, Args)]
pub struct CustomerArgs {
    #[command(subcommand)]
    pub command: CustomerCommand,
}

#[derive(Debug, Subcommand)]
pub enum CustomerCommand {
    /// Insert a customer and print its id
    Add {
        name: String,
        #[arg(long)]
        state: Option<String>,
    },
    /// Delete a customer by id
    Delete { id: i64 },
    /// List customers, optionally only those in one state
    List {
        #[arg(long)]
        state: Option<String>,
        /// Only customers without a state
        #[arg(long, conflicts_with = "state")]
        no_state: bool,
    },
}

pub fn execute(
    db: &Database,
    args: CustomerArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        CustomerCommand::Add { name, state } => {
            let id = add_customer(db, &name, state.as_deref())?;
            if json {
                println!("{}", serde_json::json!({ "id": id }));
            } else {
                println!("{}", id);
            }
        }
        CustomerCommand::Delete { id } => {
            delete_customer(db, id)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": id }));
            } else {
                println!("deleted {}", id);
            }
        }
        CustomerCommand::List { state, no_state } => {
            let filter = match (state, no_state) {
                (Some(state), _) => Filter::eq("state", state),
                (None, true) => Filter::eq("state", FieldValue::Null),
                (None, false) => Filter::All,
            };
            let mut session = db.session()?;
            let customers: Vec<Customer> = session
                .query::<Customer>()
                .filter(filter)
                .no_tracking()
                .to_list()?
                .iter()
                .map(|c| c.get())
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&customers)?);
            } else {
                for customer in &customers {
                    println!(
                        "{}\t{}\t{}",
                        customer.id,
                        customer.name,
                        customer.state.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}
