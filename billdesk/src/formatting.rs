use std::fmt::Write;

use anyhow::Result;
use billdesk_engine::{
    registry_types::{ClientRecord, Invoice, OperatorProfile, PaymentRecord, RegistryKey},
    ExchangeRate,
    PlanPrice,
    ResolvedSession,
};
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};
use rust_decimal::Decimal;

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_style(table: &mut Table) {
    table.set_format(markdown_format());
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

/// All the subscribers a search returned, with the focused one marked.
pub fn format_matches(session: &ResolvedSession) -> String {
    let mut table = Table::new();
    table.set_titles(row!["", "ID", "Identification", "Name", "Plan", "Balance", "Status"]);
    for client in session.matches() {
        let marker = if client.id == session.client_id() { "*" } else { "" };
        table.add_row(row![
            marker,
            client.id,
            client.identification,
            client.name,
            or_dash(client.plan.as_deref()),
            client.balance.to_string(),
            client.status.to_string()
        ]);
    }
    markdown_style(&mut table);
    format!("{} match(es) at registry {}\n{table}", session.matches().len(), session.registry_key())
}

pub fn format_client(registry: &RegistryKey, client: &ClientRecord) -> Result<String> {
    let mut table = Table::new();
    table.set_titles(row!["Field", "Value"]);
    table.add_row(row!["Registry", registry.as_str()]);
    table.add_row(row!["ID", client.id]);
    table.add_row(row!["Identification", client.identification]);
    table.add_row(row!["Name", client.name]);
    table.add_row(row!["Phone", or_dash(client.phone.as_deref())]);
    table.add_row(row!["Address", or_dash(client.address.as_deref())]);
    table.add_row(row!["Sector", or_dash(client.sector.as_deref())]);
    table.add_row(row!["Router", or_dash(client.router.as_deref())]);
    table.add_row(row!["IPv4", or_dash(client.ipv4.as_deref())]);
    table.add_row(row!["Plan", or_dash(client.plan.as_deref())]);
    table.add_row(row!["Billing cut-off", or_dash(client.billing_cutoff_date.as_deref())]);
    table.add_row(row!["Balance", client.balance.to_string()]);
    table.add_row(row!["Status", client.status.to_string()]);
    markdown_style(&mut table);
    let mut f = String::new();
    writeln!(f, "{table}")?;
    if !client.is_in_good_standing() {
        writeln!(f, "⚠️  This subscriber owes {}", -client.balance)?;
    }
    if !client.recent_payments.is_empty() {
        writeln!(f, "Recent payments\n{}", format_payments(&client.recent_payments))?;
    }
    Ok(f)
}

pub fn format_payments(payments: &[PaymentRecord]) -> String {
    if payments.is_empty() {
        return "No payments".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Date", "Amount", "Local amount", "Method", "Reference", "Comment"]);
    payments.iter().for_each(|p| {
        table.add_row(row![
            p.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            p.date,
            p.amount_reference.to_string(),
            p.amount_local.to_string(),
            p.method.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
            p.reference,
            or_dash(p.comment.as_deref().or(p.reason.as_deref()))
        ]);
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn format_invoices(invoices: &[Invoice]) -> String {
    if invoices.is_empty() {
        return "No invoices".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Issued", "Due", "Amount", "Status", "Description"]);
    for inv in invoices {
        table.add_row(row![
            inv.id,
            or_dash(inv.issued_at.as_deref()),
            or_dash(inv.due_at.as_deref()),
            inv.amount.to_string(),
            or_dash(inv.status.as_deref()),
            or_dash(inv.description.as_deref())
        ]);
    }
    markdown_style(&mut table);
    table.to_string()
}

pub fn format_plan_prices(rate: Option<&ExchangeRate>, prices: &[PlanPrice]) -> String {
    let mut table = Table::new();
    table.set_titles(row!["Plan", "Price", "Local price"]);
    for p in prices {
        table.add_row(row![p.name, p.reference.to_string(), p.local.to_string()]);
    }
    markdown_style(&mut table);
    match rate {
        Some(rate) => format!("{rate}\n{table}"),
        None => table.to_string(),
    }
}

pub fn format_rate(rate: &ExchangeRate, effective: Decimal, markup: Decimal) -> String {
    let observed = rate.observed_at.format("%Y-%m-%d %H:%M UTC");
    format!(
        "{rate} (observed {observed})\nEffective rate with {}% markup: {effective:.4}",
        (markup * Decimal::ONE_HUNDRED).normalize()
    )
}

pub fn format_operators(me: Option<&OperatorProfile>, operators: &[OperatorProfile]) -> String {
    let mut table = Table::new();
    table.set_titles(row!["", "ID", "Name", "Username"]);
    for op in operators {
        let marker = if me.is_some_and(|m| m.id == op.id) { "*" } else { "" };
        table.add_row(row![marker, op.id.as_str(), or_dash(op.name.as_deref()), or_dash(op.username.as_deref())]);
    }
    markdown_style(&mut table);
    match me {
        Some(me) => format!("Signed in as {me}\n{table}"),
        None => table.to_string(),
    }
}
