//! Styled output for the Pasale CLI

use console::style;
use pasale_client::api::Product;
use std::path::Path;
use std::time::Duration;

pub fn display_greeting(base_url: &str) {
    println!("{}", style("─── PASALE ─────────────────────────────────").cyan());
    println!("  {} {}", style("api:").dim(), style(base_url).cyan().dim());
}

pub fn display_status(
    authenticated: bool,
    expires_at: Option<u64>,
    valid_for: Option<Duration>,
    session_file: &Path,
) {
    let state = if authenticated {
        style("logged in").green()
    } else {
        style("logged out").red()
    };
    println!("  {} {}", style("session:").dim(), state);
    println!(
        "  {} {}",
        style("stored at:").dim(),
        style(session_file.display()).dim()
    );

    match (valid_for, expires_at) {
        (Some(left), _) => {
            println!("  {}", style(format!("access token valid for {}s", left.as_secs())).dim());
        }
        // Expired tokens are refreshed on the next request.
        (None, Some(_)) => println!("  {}", style("access token expired").yellow()),
        (None, None) => {}
    }
}

pub fn display_products(products: &[Product]) {
    if products.is_empty() {
        println!("  {}", style("no products").dim());
        return;
    }
    for p in products {
        let qty = if p.quantity <= 5 {
            style(p.quantity.to_string()).red()
        } else {
            style(p.quantity.to_string()).green()
        };
        println!(
            "  {:>5}  {:<32} {:>6}  {}",
            style(p.id).dim(),
            p.product_name,
            qty,
            style(&p.unit_price).dim()
        );
    }
}

pub fn display_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

pub fn display_error(err: &pasale_client::PasaleError) {
    eprintln!("{} {}", style("error:").red().bold(), err);
    if err.is_auth_expired() {
        eprintln!("  {}", style("run `pasale-cli login` to start a new session").dim());
    }
}
