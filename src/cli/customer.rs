//! Customer registry commands: add, remove, list.

use clap::Subcommand;

use plow::session::Session;

use super::format::{format_customer, short_id};
use super::resolve_id;

#[derive(Debug, Subcommand)]
pub enum CustomerCommand {
    /// Register a customer. Prints the customer ID.
    Add {
        /// Display name.
        name: String,

        /// Street address.
        address: String,
    },

    /// Remove a customer. A round in progress keeps its stop.
    Remove {
        /// Customer ID: full UUID or unambiguous prefix (e.g. `a3b`).
        id: String,
    },

    /// List customers with their latest visit.
    List,
}

pub(super) fn run(command: &CustomerCommand, session: &mut Session) -> Result<(), String> {
    match command {
        CustomerCommand::Add { name, address } => cmd_add(session, name, address),
        CustomerCommand::Remove { id } => cmd_remove(session, id),
        CustomerCommand::List => {
            cmd_list(session);
            Ok(())
        }
    }
}

fn cmd_add(session: &mut Session, name: &str, address: &str) -> Result<(), String> {
    let customer = session
        .add_customer(name, address)
        .map_err(|e| format!("failed to add customer: {e}"))?;

    println!("{}", customer.id);
    Ok(())
}

fn cmd_remove(session: &mut Session, reference: &str) -> Result<(), String> {
    let id = resolve_id(
        session.customers().iter().map(|c| (c.id, c.name.as_str())),
        reference,
        "customer",
    )?;

    session
        .remove_customer(id)
        .map_err(|e| format!("failed to remove customer: {e}"))?;

    println!("Removed customer {}", short_id(id));
    if session.active_round().is_some_and(|r| r.customer(id).is_some()) {
        println!("The round in progress keeps this stop until it ends.");
    }
    Ok(())
}

fn cmd_list(session: &Session) {
    let customers = session.customers();
    if customers.is_empty() {
        println!("No customers");
        return;
    }

    for customer in customers {
        println!("{}", format_customer(customer));
    }
}
